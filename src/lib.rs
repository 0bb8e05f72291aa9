//! # Shelter RFID
//!
//! Decoder and check-in workflow for a 125 kHz RFID animal-shelter kiosk.
//!
//! Tags transmit a Manchester-encoded 64-bit frame over and over while they
//! sit in the reader field. An edge interrupt samples the demodulated line a
//! fixed delay after each transition; this crate provides:
//!
//! - The interrupt-shared bitstream buffer with preamble detection
//! - Frame validation (row parity, column parity, stop bit)
//! - A Manchester encoder and edge-sampling simulator for host testing
//! - The registered-tag table and status toggle
//! - The kiosk loop feeding display, serial log and network bridge sinks
//!
//! ## Features
//!
//! - `std` (default): critical-section implementation for hosted targets
//! - `serde`: Enable serialization/deserialization support
//!
//! ## Example
//!
//! ```
//! use shelter_rfid::{Decoder, ManchesterEncoder, RowParityRule, TagId};
//!
//! static DECODER: Decoder = Decoder::new(shelter_rfid::DecoderConfig::DEFAULT);
//!
//! let tag: TagId = "310037D93D".parse()?;
//! let frame = ManchesterEncoder::encode_tag_frame(RowParityRule::LowBit, &tag)?;
//! for _ in 0..4 {
//!     for &bit in &frame {
//!         DECODER.record_sample(bit);
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod bitstream;
pub mod bridge;
pub mod core;
pub mod encoding;
pub mod error;
pub mod kiosk;
pub mod parser;
pub mod registry;
pub mod sampler;
pub mod serial;

pub use bitstream::{Bitstream, DecoderState, Marker};
pub use bridge::{UploadRequest, Uplink};
pub use crate::core::{Action, Line, Status, TagId};
pub use encoding::{ManchesterDecoder, ManchesterEncoder, ManchesterType, RowParityRule};
pub use error::{DecodeError, Result};
pub use kiosk::{Display, Kiosk, ScanOutcome};
pub use parser::{ColumnCheck, DecoderBuilder, DecoderConfig, FrameParser, ParityPolicy, TagFrame};
pub use registry::{Lookup, RegisteredTag, TagRegistry};
pub use sampler::{Decoder, EdgeSampler, TagSource};
pub use serial::{SerialFrameAssembler, SerialLog};

/// Frame geometry and timing constants
pub mod layout {
    /// Characters in a tag identifier
    pub const TAG_CHARS: usize = 10;

    /// Consecutive ones forming the preamble
    pub const PREAMBLE_BITS: usize = 9;

    /// Bits per row: 4 data bits and 1 parity bit
    pub const ROW_BITS: usize = 5;

    /// Bits following a synchronization marker: 10 data rows plus the column row
    pub const PAYLOAD_BITS: usize = (TAG_CHARS + 1) * ROW_BITS;

    /// Complete frame including preamble
    pub const FRAME_BITS: usize = PREAMBLE_BITS + PAYLOAD_BITS;

    /// Upper bound on synchronization markers tracked per frame
    pub const MAX_MARKERS: usize = 5;

    /// Markers collected before a frame is flagged ready
    pub const DEFAULT_MARKER_QUOTA: usize = 3;

    /// Default bitstream capacity in samples
    pub const DEFAULT_CAPACITY: usize = 480;

    /// Reader carrier frequency in Hz
    pub const CARRIER_HZ: u32 = 125_000;

    /// Carrier cycles per data bit
    pub const CYCLES_PER_BIT: u32 = 64;

    /// Bit cell duration in microseconds
    pub const BIT_PERIOD_US: u32 = CYCLES_PER_BIT * 1_000_000 / CARRIER_HZ;

    /// Delay from edge to sample point, 3/4 of a bit cell
    pub const DEFAULT_SAMPLE_DELAY_US: u32 = BIT_PERIOD_US * 3 / 4;

    /// Columns on the character display
    pub const DISPLAY_WIDTH: usize = 16;
}
