//! Error types for RFID frame decoding and the check-in workflow

use thiserror::Error;

/// Result type for decoder and kiosk operations
pub type Result<T> = std::result::Result<T, DecodeError>;

/// Errors encountered while decoding frames or handling scanned tags
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The sampler has not flagged a frame yet
    #[error("No frame ready")]
    NotReady,

    /// Every candidate synchronization marker was rejected
    #[error("No valid frame found")]
    NoValidFrame,

    /// Half-bit pair without a mid-cell transition
    #[error("Invalid Manchester encoding: {0}")]
    InvalidManchester(String),

    /// Not enough samples recorded after a marker to hold a frame
    #[error("Frame too short: {0}")]
    FrameTooShort(String),

    /// The start of a frame was overwritten by newer samples
    #[error("Marker overwritten: {0}")]
    MarkerOverwritten(String),

    /// Stop bit was not zero
    #[error("Stop bit set at offset {0}")]
    StopBitSet(usize),

    /// Column parity check failed
    #[error("Column parity error: {0}")]
    ColumnParity(String),

    /// Row parity check failed (strict policy only)
    #[error("Row parity error: {0}")]
    RowParity(String),

    /// Tag identifier malformed
    #[error("Invalid tag: {0}")]
    InvalidTag(String),

    /// Unknown network action code
    #[error("Invalid action code: {0:?}")]
    InvalidAction(char),

    /// Decoder configuration out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Network bridge rejected or failed a request
    #[error("Uplink error: {0}")]
    Uplink(String),
}

impl DecodeError {
    /// Create a new InvalidManchester error
    pub fn invalid_manchester(msg: impl Into<String>) -> Self {
        DecodeError::InvalidManchester(msg.into())
    }

    /// Create a new FrameTooShort error
    pub fn frame_too_short(msg: impl Into<String>) -> Self {
        DecodeError::FrameTooShort(msg.into())
    }

    /// Create a new MarkerOverwritten error
    pub fn marker_overwritten(msg: impl Into<String>) -> Self {
        DecodeError::MarkerOverwritten(msg.into())
    }

    /// Create a new ColumnParity error
    pub fn column_parity(msg: impl Into<String>) -> Self {
        DecodeError::ColumnParity(msg.into())
    }

    /// Create a new RowParity error
    pub fn row_parity(msg: impl Into<String>) -> Self {
        DecodeError::RowParity(msg.into())
    }

    /// Create a new InvalidTag error
    pub fn invalid_tag(msg: impl Into<String>) -> Self {
        DecodeError::InvalidTag(msg.into())
    }

    /// Create a new InvalidConfig error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        DecodeError::InvalidConfig(msg.into())
    }

    /// Create a new Uplink error
    pub fn uplink(msg: impl Into<String>) -> Self {
        DecodeError::Uplink(msg.into())
    }

    /// True for the outcomes expected between tag presentations
    pub fn is_idle(&self) -> bool {
        matches!(self, DecodeError::NotReady | DecodeError::NoValidFrame)
    }
}
