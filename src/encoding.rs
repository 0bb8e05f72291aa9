//! Manchester encoding and edge sampling for 125 kHz RFID frames

use crate::core::TagId;
use crate::error::{DecodeError, Result};
use crate::layout::{FRAME_BITS, PREAMBLE_BITS, TAG_CHARS};

/// Manchester polarity of the demodulated line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ManchesterType {
    /// IEEE 802.3 Manchester: 0 = low-to-high, 1 = high-to-low
    #[default]
    Ieee,
    /// Thomas Manchester: 0 = high-to-low, 1 = low-to-high
    Thomas,
}

impl ManchesterType {
    /// Half-bit line levels `(first, second)` for a data bit
    pub fn levels(self, bit: bool) -> [bool; 2] {
        match self {
            ManchesterType::Ieee => [bit, !bit],
            ManchesterType::Thomas => [!bit, bit],
        }
    }

    /// Data bit carried by a cell whose first half sits at `level`
    pub fn bit_from_first_half(self, level: bool) -> bool {
        match self {
            ManchesterType::Ieee => level,
            ManchesterType::Thomas => !level,
        }
    }
}

/// How the parity bit after each data row is derived from its nibble
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RowParityRule {
    /// Parity bit equals the nibble's least significant bit (deployed readers)
    #[default]
    LowBit,
    /// Even parity over all four nibble bits (EM4100)
    Even,
}

impl RowParityRule {
    /// Expected parity bit for a nibble
    pub fn parity_bit(self, nibble: u8) -> bool {
        match self {
            RowParityRule::LowBit => nibble & 1 == 1,
            RowParityRule::Even => (nibble & 0x0F).count_ones() & 1 == 1,
        }
    }
}

/// Builds frames and line waveforms as a tag would transmit them
pub struct ManchesterEncoder;

impl ManchesterEncoder {
    /// Encode a single bit into two half-bit levels
    pub fn encode_bit(polarity: ManchesterType, bit: bool) -> [bool; 2] {
        polarity.levels(bit)
    }

    /// Encode a bit sequence into half-bit levels, two per bit
    pub fn encode_bits(polarity: ManchesterType, bits: &[bool]) -> Vec<bool> {
        let mut levels = Vec::with_capacity(bits.len() * 2);
        for &bit in bits {
            levels.extend_from_slice(&Self::encode_bit(polarity, bit));
        }
        levels
    }

    /// Parity bit written after a nibble
    pub fn row_parity(rule: RowParityRule, nibble: u8) -> bool {
        rule.parity_bit(nibble)
    }

    /// Even parity of each bit column across all nibbles
    pub fn column_parity(nibbles: &[u8; TAG_CHARS]) -> u8 {
        nibbles.iter().fold(0, |acc, &n| acc ^ (n & 0x0F))
    }

    /// Lay out a complete frame: preamble, ten rows with parity, column bits, stop bit
    ///
    /// `column` and `stop` are written as given so callers can build
    /// deliberately damaged frames.
    pub fn frame_bits(
        rule: RowParityRule,
        nibbles: &[u8; TAG_CHARS],
        column: u8,
        stop: bool,
    ) -> Vec<bool> {
        let mut bits = Vec::with_capacity(FRAME_BITS);
        bits.extend(std::iter::repeat(true).take(PREAMBLE_BITS));

        for &nibble in nibbles {
            push_nibble(&mut bits, nibble);
            bits.push(Self::row_parity(rule, nibble));
        }

        push_nibble(&mut bits, column);
        bits.push(stop);
        bits
    }

    /// Frame for a hex tag with correct row and column parity and a zero stop bit
    pub fn encode_tag_frame(rule: RowParityRule, tag: &TagId) -> Result<Vec<bool>> {
        let nibbles = tag.nibbles()?;
        Ok(Self::frame_bits(rule, &nibbles, Self::column_parity(&nibbles), false))
    }
}

fn push_nibble(bits: &mut Vec<bool>, nibble: u8) {
    for shift in (0..4).rev() {
        bits.push((nibble >> shift) & 1 != 0);
    }
}

/// Recovers bits from Manchester half-bit levels
pub struct ManchesterDecoder;

impl ManchesterDecoder {
    /// Decode one aligned half-bit pair
    pub fn decode_pair(polarity: ManchesterType, pair: [bool; 2]) -> Result<bool> {
        if pair[0] == pair[1] {
            return Err(DecodeError::invalid_manchester(format!(
                "no mid-cell transition in {:?}",
                pair
            )));
        }
        Ok(polarity.bit_from_first_half(pair[0]))
    }

    /// Decode cell-aligned half-bit levels
    pub fn decode_levels(polarity: ManchesterType, levels: &[bool]) -> Result<Vec<bool>> {
        if levels.len() % 2 != 0 {
            return Err(DecodeError::invalid_manchester(format!(
                "odd number of half-bits: {}",
                levels.len()
            )));
        }
        levels
            .chunks_exact(2)
            .map(|pair| Self::decode_pair(polarity, [pair[0], pair[1]]))
            .collect()
    }

    /// Reproduce what the edge interrupt records from a half-bit waveform
    ///
    /// Each transition starts a `delay_us` wait after which the line is
    /// sampled. Transitions that occur while a wait is still running are
    /// lost, which is what locks the sampler onto mid-cell transitions: after
    /// a mid-cell edge the sample lands a quarter cell into the next bit, and
    /// the boundary edge in between is swallowed.
    pub fn sample_edges(
        polarity: ManchesterType,
        levels: &[bool],
        half_period_us: u32,
        delay_us: u32,
    ) -> Vec<bool> {
        let half = u64::from(half_period_us.max(1));
        let mut samples = Vec::with_capacity(levels.len() / 2);
        let mut busy_until: Option<u64> = None;

        for i in 1..levels.len() {
            if levels[i] == levels[i - 1] {
                continue;
            }
            let edge = i as u64 * half;
            if busy_until.is_some_and(|t| edge <= t) {
                continue;
            }

            let at = edge + u64::from(delay_us);
            let cell = (at / half) as usize;
            if cell >= levels.len() {
                break;
            }
            samples.push(polarity.bit_from_first_half(levels[cell]));
            busy_until = Some(at);
        }

        samples
    }
}
