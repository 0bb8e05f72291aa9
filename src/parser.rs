//! Frame validation for captured bitstreams

use bitfield::bitfield;

use crate::bitstream::{Bitstream, Marker};
use crate::core::TagId;
use crate::encoding::{ManchesterEncoder, ManchesterType, RowParityRule};
use crate::error::{DecodeError, Result};
use crate::layout::{
    BIT_PERIOD_US, DEFAULT_MARKER_QUOTA, DEFAULT_SAMPLE_DELAY_US, MAX_MARKERS, PAYLOAD_BITS,
    ROW_BITS, TAG_CHARS,
};

bitfield! {
    /// Five bits read from the stream, most significant first
    ///
    /// Data rows carry a nibble and its parity bit; the final row carries the
    /// column parity nibble and the stop bit.
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct Row(u8);
    impl Debug;
    u8;
    /// Data or column-parity nibble
    pub nibble, set_nibble: 4, 1;
    /// Row parity bit, or the stop bit on the final row
    pub parity, set_parity: 0;
}

/// What to do when a row parity bit disagrees with its nibble
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ParityPolicy {
    /// Flag the mismatch on the frame and accept it anyway
    Advisory,
    /// Reject the candidate and try the next marker
    Strict,
}

/// Column parity acceptance rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ColumnCheck {
    /// Only the column bit at `index` (read order, 0..4) must be zero
    Designated {
        /// Position within the four column bits
        index: u8,
    },
    /// Every column bit must equal the parity of its column
    Full,
}

/// Decoder tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DecoderConfig {
    /// Delay between an edge and the sample point
    pub sample_delay_us: u32,
    /// Markers collected before a frame is flagged ready
    pub marker_quota: usize,
    /// How row parity bits are computed
    pub row_parity: RowParityRule,
    /// Row parity handling
    pub parity_policy: ParityPolicy,
    /// Column parity handling
    pub column_check: ColumnCheck,
    /// Line polarity used to turn sampled levels into bits
    pub polarity: ManchesterType,
}

impl DecoderConfig {
    /// Configuration matching the deployed readers
    pub const DEFAULT: DecoderConfig = DecoderConfig {
        sample_delay_us: DEFAULT_SAMPLE_DELAY_US,
        marker_quota: DEFAULT_MARKER_QUOTA,
        row_parity: RowParityRule::LowBit,
        parity_policy: ParityPolicy::Advisory,
        column_check: ColumnCheck::Designated { index: 1 },
        polarity: ManchesterType::Ieee,
    };

    /// Check every field is in range
    pub fn validate(&self) -> Result<()> {
        if self.sample_delay_us == 0 || self.sample_delay_us >= BIT_PERIOD_US {
            return Err(DecodeError::invalid_config(format!(
                "sample delay {} us outside (0, {})",
                self.sample_delay_us, BIT_PERIOD_US
            )));
        }
        if self.marker_quota == 0 || self.marker_quota > MAX_MARKERS {
            return Err(DecodeError::invalid_config(format!(
                "marker quota {} outside [1, {}]",
                self.marker_quota, MAX_MARKERS
            )));
        }
        if let ColumnCheck::Designated { index } = self.column_check {
            if index > 3 {
                return Err(DecodeError::invalid_config(format!(
                    "column bit {} outside [0, 3]",
                    index
                )));
            }
        }
        Ok(())
    }

    /// Load and validate a configuration from JSON; missing fields keep their defaults
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self> {
        let config: DecoderConfig =
            serde_json::from_str(json).map_err(|e| DecodeError::invalid_config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Builder for decoder configurations
pub struct DecoderBuilder {
    config: DecoderConfig,
}

impl DecoderBuilder {
    /// Start from the defaults
    pub fn new() -> Self {
        DecoderBuilder {
            config: DecoderConfig::DEFAULT,
        }
    }

    /// Set the edge-to-sample delay
    pub fn with_sample_delay_us(mut self, delay_us: u32) -> Self {
        self.config.sample_delay_us = delay_us;
        self
    }

    /// Set the marker quota
    pub fn with_marker_quota(mut self, quota: usize) -> Self {
        self.config.marker_quota = quota;
        self
    }

    /// Set the row parity rule
    pub fn with_row_parity(mut self, rule: RowParityRule) -> Self {
        self.config.row_parity = rule;
        self
    }

    /// Set the row parity policy
    pub fn with_parity_policy(mut self, policy: ParityPolicy) -> Self {
        self.config.parity_policy = policy;
        self
    }

    /// Set the column parity rule
    pub fn with_column_check(mut self, check: ColumnCheck) -> Self {
        self.config.column_check = check;
        self
    }

    /// Set the line polarity
    pub fn with_polarity(mut self, polarity: ManchesterType) -> Self {
        self.config.polarity = polarity;
        self
    }

    /// Validate and return the configuration
    pub fn build(self) -> Result<DecoderConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for DecoderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A frame that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TagFrame {
    /// Identifier text
    pub tag: TagId,
    /// Decoded nibbles in transmission order
    pub nibbles: [u8; TAG_CHARS],
    /// Row parity bits as received
    pub row_parity: [bool; TAG_CHARS],
    /// Column parity nibble as received
    pub column_parity: u8,
    /// Stop bit as received
    pub stop_bit: bool,
    /// A row parity bit disagreed with its nibble
    pub parity_error: bool,
    /// Buffer offset of the marker the frame was read from
    pub offset: usize,
}

/// Walks the bitstream from synchronization markers and validates frames
#[derive(Debug, Clone, Copy)]
pub struct FrameParser {
    config: DecoderConfig,
}

impl FrameParser {
    /// Create a parser for the given configuration
    pub const fn new(config: DecoderConfig) -> Self {
        FrameParser { config }
    }

    /// Configuration in use
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    fn read_row<const N: usize>(stream: &Bitstream<N>, marker: &Marker, row: usize) -> Row {
        let start = row * ROW_BITS;
        let value = (0..ROW_BITS).fold(0u8, |acc, i| {
            (acc << 1) | u8::from(stream.bit_at(marker, start + i))
        });
        Row(value)
    }

    /// Parse and validate the frame following one marker
    pub fn parse_frame<const N: usize>(
        &self,
        stream: &Bitstream<N>,
        marker: &Marker,
    ) -> Result<TagFrame> {
        if stream.is_overwritten(marker) {
            return Err(DecodeError::marker_overwritten(format!(
                "offset {} is {} samples old",
                marker.offset,
                stream.available(marker)
            )));
        }
        if stream.available(marker) < PAYLOAD_BITS as u64 {
            return Err(DecodeError::frame_too_short(format!(
                "{} of {} samples after offset {}",
                stream.available(marker),
                PAYLOAD_BITS,
                marker.offset
            )));
        }

        let mut nibbles = [0u8; TAG_CHARS];
        let mut row_parity = [false; TAG_CHARS];
        let mut parity_error = false;

        for i in 0..TAG_CHARS {
            let row = Self::read_row(stream, marker, i);
            nibbles[i] = row.nibble();
            row_parity[i] = row.parity();

            if row.parity() != ManchesterEncoder::row_parity(self.config.row_parity, row.nibble()) {
                if self.config.parity_policy == ParityPolicy::Strict {
                    return Err(DecodeError::row_parity(format!(
                        "row {} at offset {}",
                        i, marker.offset
                    )));
                }
                log::warn!("row {} parity mismatch at offset {}", i, marker.offset);
                parity_error = true;
            }
        }

        let trailer = Self::read_row(stream, marker, TAG_CHARS);
        let column_parity = trailer.nibble();
        let stop_bit = trailer.parity();

        if stop_bit {
            return Err(DecodeError::StopBitSet(marker.offset));
        }
        self.check_columns(&nibbles, column_parity)?;

        Ok(TagFrame {
            tag: TagId::from_nibbles(&nibbles),
            nibbles,
            row_parity,
            column_parity,
            stop_bit,
            parity_error,
            offset: marker.offset,
        })
    }

    fn check_columns(&self, nibbles: &[u8; TAG_CHARS], column_parity: u8) -> Result<()> {
        match self.config.column_check {
            ColumnCheck::Designated { index } => {
                if (column_parity >> (3 - index.min(3))) & 1 != 0 {
                    return Err(DecodeError::column_parity(format!(
                        "column bit {} set in {:04b}",
                        index, column_parity
                    )));
                }
            }
            ColumnCheck::Full => {
                let expected = ManchesterEncoder::column_parity(nibbles);
                if column_parity != expected {
                    return Err(DecodeError::column_parity(format!(
                        "expected {:04b}, got {:04b}",
                        expected, column_parity
                    )));
                }
            }
        }
        Ok(())
    }

    /// Try every captured marker in capture order until one validates
    ///
    /// Does not modify the stream; the caller resets it afterwards.
    pub fn decode<const N: usize>(&self, stream: &Bitstream<N>) -> Result<TagFrame> {
        // Oldest first: the earliest marker has the most payload behind it
        // and is the first to be overwritten.
        for marker in stream.markers() {
            match self.parse_frame(stream, marker) {
                Ok(frame) => {
                    log::info!("tag {} read at offset {}", frame.tag, frame.offset);
                    return Ok(frame);
                }
                Err(e) => log::debug!("candidate at offset {} rejected: {}", marker.offset, e),
            }
        }
        Err(DecodeError::NoValidFrame)
    }
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new(DecoderConfig::DEFAULT)
    }
}
