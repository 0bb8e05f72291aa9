//! Sample buffer written by the edge interrupt
//!
//! The buffer is a fixed ring of single-bit samples. Alongside it the
//! sampler counts consecutive ones; every ninth one records a
//! synchronization marker pointing at the sample that follows the preamble.
//! Once the marker quota is reached (or the ring wraps) and a marker has a
//! full payload behind it, the buffer is flagged ready for the validator.

use crate::layout::{DEFAULT_CAPACITY, MAX_MARKERS, PAYLOAD_BITS, PREAMBLE_BITS};

/// Candidate frame start recorded right after a preamble
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker {
    /// Buffer offset of the first payload sample
    pub offset: usize,
    /// Samples recorded before the first payload sample
    pub sequence: u64,
}

impl Marker {
    const EMPTY: Marker = Marker {
        offset: 0,
        sequence: 0,
    };
}

/// Decoder life cycle as seen from the main loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// No synchronization marker captured
    Idle,
    /// At least one marker captured, frame not ready yet
    Sampling,
    /// Waiting for the validator
    FrameReady,
    /// Validator owns the buffer; samples are dropped
    ///
    /// Only observable when driving a `Bitstream` directly. `Decoder::poll`
    /// validates and resets inside one critical section.
    Validating,
}

/// Fixed-capacity ring of line samples plus preamble bookkeeping
#[derive(Debug, Clone)]
pub struct Bitstream<const N: usize = DEFAULT_CAPACITY> {
    samples: [bool; N],
    write_index: usize,
    recorded: u64,
    ones: usize,
    markers: [Marker; MAX_MARKERS],
    marker_count: usize,
    marker_quota: usize,
    wrapped: bool,
    ready: bool,
    validating: bool,
}

impl<const N: usize> Bitstream<N> {
    /// Create an empty buffer; the quota is clamped to `1..=MAX_MARKERS`
    pub const fn new(marker_quota: usize) -> Self {
        let marker_quota = if marker_quota == 0 {
            1
        } else if marker_quota > MAX_MARKERS {
            MAX_MARKERS
        } else {
            marker_quota
        };

        Bitstream {
            samples: [false; N],
            write_index: 0,
            recorded: 0,
            ones: 0,
            markers: [Marker::EMPTY; MAX_MARKERS],
            marker_count: 0,
            marker_quota,
            wrapped: false,
            ready: false,
            validating: false,
        }
    }

    /// Capacity in samples
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Append one sample at the write index
    ///
    /// Runs in interrupt context and must not log. Returns `false` when the
    /// sample was dropped because the validator holds the buffer.
    pub fn push(&mut self, bit: bool) -> bool {
        if self.validating || N == 0 {
            return false;
        }

        self.samples[self.write_index] = bit;
        self.recorded += 1;
        self.write_index += 1;
        if self.write_index == N {
            self.write_index = 0;
            self.wrapped = true;
        }

        if bit {
            self.ones += 1;
            if self.ones == PREAMBLE_BITS {
                self.ones = 0;
                self.capture_marker();
            }
        } else {
            self.ones = 0;
        }

        if !self.ready && self.frame_complete() {
            self.ready = true;
        }
        true
    }

    fn capture_marker(&mut self) {
        if self.ready || self.marker_count >= self.marker_quota {
            return;
        }
        self.markers[self.marker_count] = Marker {
            offset: self.write_index,
            sequence: self.recorded,
        };
        self.marker_count += 1;
    }

    fn frame_complete(&self) -> bool {
        let markers = self.markers();
        match markers.last() {
            Some(last) if self.marker_count >= self.marker_quota && self.is_intact(last) => true,
            _ => self.wrapped && markers.iter().any(|m| self.is_intact(m)),
        }
    }

    /// Samples recorded since the marker, including its first payload sample
    pub fn available(&self, marker: &Marker) -> u64 {
        self.recorded.saturating_sub(marker.sequence)
    }

    /// True once the marker's first payload sample has been overwritten
    pub fn is_overwritten(&self, marker: &Marker) -> bool {
        self.available(marker) > N as u64
    }

    /// A full payload follows the marker and none of it has been overwritten
    pub fn is_intact(&self, marker: &Marker) -> bool {
        self.available(marker) >= PAYLOAD_BITS as u64 && !self.is_overwritten(marker)
    }

    /// Sample `index` positions after the marker, wrapping around the ring
    pub fn bit_at(&self, marker: &Marker, index: usize) -> bool {
        if N == 0 {
            return false;
        }
        self.samples[(marker.offset + index) % N]
    }

    /// Captured markers in capture order
    pub fn markers(&self) -> &[Marker] {
        &self.markers[..self.marker_count]
    }

    /// Current write position
    pub fn write_index(&self) -> usize {
        self.write_index
    }

    /// Samples recorded since the last reset
    pub fn recorded(&self) -> u64 {
        self.recorded
    }

    /// A frame is waiting for the validator
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Where the buffer is in its capture cycle
    pub fn state(&self) -> DecoderState {
        if self.validating {
            DecoderState::Validating
        } else if self.ready {
            DecoderState::FrameReady
        } else if self.marker_count > 0 {
            DecoderState::Sampling
        } else {
            DecoderState::Idle
        }
    }

    /// Hand the buffer to the validator; samples are dropped until `reset`
    ///
    /// For validators that release the lock between parsing and reset.
    pub fn begin_validation(&mut self) {
        self.validating = true;
    }

    /// Discard the current frame and start capturing from offset 0
    pub fn reset(&mut self) {
        self.write_index = 0;
        self.recorded = 0;
        self.ones = 0;
        self.marker_count = 0;
        self.wrapped = false;
        self.ready = false;
        self.validating = false;
    }
}

impl<const N: usize> Default for Bitstream<N> {
    fn default() -> Self {
        Self::new(crate::layout::DEFAULT_MARKER_QUOTA)
    }
}

impl<const N: usize> Extend<bool> for Bitstream<N> {
    fn extend<I: IntoIterator<Item = bool>>(&mut self, iter: I) {
        for bit in iter {
            self.push(bit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::FRAME_BITS;

    fn preamble() -> impl Iterator<Item = bool> {
        std::iter::repeat(true).take(PREAMBLE_BITS)
    }

    #[test]
    fn test_initial_state() {
        let stream: Bitstream = Bitstream::default();
        assert_eq!(stream.state(), DecoderState::Idle);
        assert_eq!(stream.capacity(), 480);
        assert!(stream.markers().is_empty());
    }

    #[test]
    fn test_write_index_wraps() {
        let mut stream: Bitstream<8> = Bitstream::new(1);
        stream.extend([false; 11]);
        assert_eq!(stream.write_index(), 3);
        assert_eq!(stream.recorded(), 11);
    }

    #[test]
    fn test_marker_after_nine_ones() {
        let mut stream: Bitstream<64> = Bitstream::new(3);
        stream.extend([false; 12]);
        stream.extend(preamble());
        assert_eq!(stream.markers(), &[Marker { offset: 21, sequence: 21 }]);
        assert_eq!(stream.state(), DecoderState::Sampling);
    }

    #[test]
    fn test_broken_run_does_not_count() {
        let mut stream: Bitstream<64> = Bitstream::new(3);
        stream.extend([true; 8]);
        stream.push(false);
        stream.extend([true; 8]);
        assert!(stream.markers().is_empty());
        stream.push(true);
        assert_eq!(stream.markers().len(), 1);
    }

    #[test]
    fn test_quota_suspends_marker_capture() {
        let mut stream: Bitstream<480> = Bitstream::new(2);
        for _ in 0..4 {
            stream.extend(preamble());
            stream.push(false);
        }
        assert_eq!(stream.markers().len(), 2);
    }

    #[test]
    fn test_ready_needs_full_payload() {
        let mut stream: Bitstream<480> = Bitstream::new(1);
        stream.extend(preamble());
        stream.extend([false; PAYLOAD_BITS - 1]);
        assert!(!stream.is_ready());
        stream.push(false);
        assert!(stream.is_ready());
        assert_eq!(stream.state(), DecoderState::FrameReady);
    }

    #[test]
    fn test_wrap_flags_ready_below_quota() {
        let mut stream: Bitstream<FRAME_BITS> = Bitstream::new(5);
        stream.extend(preamble());
        stream.extend([false; PAYLOAD_BITS]);
        assert!(stream.is_ready());
    }

    #[test]
    fn test_overwritten_marker() {
        let mut stream: Bitstream<64> = Bitstream::new(5);
        stream.extend(preamble());
        let marker = stream.markers()[0];
        stream.extend([false; 64]);
        assert!(!stream.is_overwritten(&marker));
        stream.push(false);
        assert!(stream.is_overwritten(&marker));
        assert!(!stream.is_intact(&marker));
    }

    #[test]
    fn test_validation_drops_samples() {
        let mut stream: Bitstream<64> = Bitstream::new(1);
        stream.push(true);
        stream.begin_validation();
        assert_eq!(stream.state(), DecoderState::Validating);
        assert!(!stream.push(true));
        assert_eq!(stream.recorded(), 1);

        stream.reset();
        assert_eq!(stream.state(), DecoderState::Idle);
        assert_eq!(stream.write_index(), 0);
        assert!(stream.push(true));
    }
}
