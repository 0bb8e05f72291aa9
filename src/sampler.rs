//! Interrupt-shared decoder and the edge handler that feeds it
//!
//! The bitstream is written only from the edge interrupt and read only from
//! the main loop. Both sides go through a critical section: the handler for
//! each sample, the main loop for the whole read, parse and reset sequence,
//! so the validator always sees a consistent buffer.

use std::cell::RefCell;

use critical_section::Mutex;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::InputPin;

use crate::bitstream::{Bitstream, DecoderState};
use crate::core::TagId;
use crate::error::{DecodeError, Result};
use crate::layout::DEFAULT_CAPACITY;
use crate::parser::{DecoderConfig, FrameParser, TagFrame};

/// Anything the kiosk can pull scanned tags from
pub trait TagSource {
    /// Return the next tag, or `NotReady`/`NoValidFrame` when there is none
    fn poll_tag(&mut self) -> Result<TagId>;
}

/// Manchester tag decoder shared between the edge interrupt and the main loop
///
/// Can be placed in a `static`:
///
/// ```
/// use shelter_rfid::{Decoder, DecoderConfig};
///
/// static DECODER: Decoder = Decoder::new(DecoderConfig::DEFAULT);
/// assert!(!DECODER.is_ready());
/// ```
pub struct Decoder<const N: usize = DEFAULT_CAPACITY> {
    stream: Mutex<RefCell<Bitstream<N>>>,
    parser: FrameParser,
}

impl<const N: usize> Decoder<N> {
    /// Create a decoder without validating the configuration
    pub const fn new(config: DecoderConfig) -> Self {
        Decoder {
            stream: Mutex::new(RefCell::new(Bitstream::new(config.marker_quota))),
            parser: FrameParser::new(config),
        }
    }

    /// Create a decoder after validating the configuration
    pub fn try_new(config: DecoderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config))
    }

    /// Configuration in use
    pub fn config(&self) -> &DecoderConfig {
        self.parser.config()
    }

    /// Record one decoded bit; called from the edge interrupt
    pub fn record_sample(&self, bit: bool) -> bool {
        critical_section::with(|cs| self.stream.borrow_ref_mut(cs).push(bit))
    }

    /// Record a raw line level, translated through the configured polarity
    pub fn record_level(&self, level: bool) -> bool {
        self.record_sample(self.config().polarity.bit_from_first_half(level))
    }

    /// Current capture state
    pub fn state(&self) -> DecoderState {
        critical_section::with(|cs| self.stream.borrow_ref(cs).state())
    }

    /// A frame is waiting to be validated
    pub fn is_ready(&self) -> bool {
        critical_section::with(|cs| self.stream.borrow_ref(cs).is_ready())
    }

    /// Validate the waiting frame, if any, and re-arm the sampler
    ///
    /// The buffer is reset on both accept and reject; `NotReady` leaves it
    /// untouched.
    pub fn poll(&self) -> Result<TagFrame> {
        critical_section::with(|cs| {
            let mut stream = self.stream.borrow_ref_mut(cs);
            if !stream.is_ready() {
                return Err(DecodeError::NotReady);
            }

            log::debug!(
                "validating {} markers at {:?} after {} samples",
                stream.markers().len(),
                stream.markers().iter().map(|m| m.offset).collect::<Vec<_>>(),
                stream.recorded()
            );
            stream.begin_validation();
            let result = self.parser.decode(&*stream);
            stream.reset();
            result
        })
    }

    /// Spin until a frame validates
    pub fn wait_for_frame(&self) -> TagFrame {
        loop {
            match self.poll() {
                Ok(frame) => return frame,
                Err(_) => std::hint::spin_loop(),
            }
        }
    }

    /// Drop whatever has been captured
    pub fn discard(&self) {
        critical_section::with(|cs| self.stream.borrow_ref_mut(cs).reset());
    }
}

impl<const N: usize> Default for Decoder<N> {
    fn default() -> Self {
        Self::new(DecoderConfig::DEFAULT)
    }
}

impl<const N: usize> TagSource for &Decoder<N> {
    fn poll_tag(&mut self) -> Result<TagId> {
        self.poll().map(|frame| frame.tag)
    }
}

/// Edge interrupt body: wait for the sample point, read the line, record it
pub struct EdgeSampler<'a, P, D, const N: usize = DEFAULT_CAPACITY> {
    decoder: &'a Decoder<N>,
    pin: P,
    delay: D,
}

impl<'a, P, D, const N: usize> EdgeSampler<'a, P, D, N>
where
    P: InputPin,
    D: DelayNs,
{
    /// Bind the demodulated input pin and a delay source to a decoder
    pub fn new(decoder: &'a Decoder<N>, pin: P, delay: D) -> Self {
        EdgeSampler {
            decoder,
            pin,
            delay,
        }
    }

    /// Handle one transition of the input line
    ///
    /// Must complete before the next transition is delivered; transitions
    /// arriving during the delay are not seen.
    pub fn on_edge(&mut self) -> std::result::Result<bool, P::Error> {
        self.delay.delay_us(self.decoder.config().sample_delay_us);
        let level = self.pin.is_high()?;
        Ok(self.decoder.record_level(level))
    }

    /// Give back the pin and delay
    pub fn release(self) -> (P, D) {
        (self.pin, self.delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{ManchesterDecoder, ManchesterEncoder, ManchesterType, RowParityRule};
    use crate::layout::{BIT_PERIOD_US, DEFAULT_SAMPLE_DELAY_US, FRAME_BITS, PREAMBLE_BITS};
    use crate::parser::{ColumnCheck, DecoderBuilder};
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct ScriptedPin {
        levels: Vec<bool>,
        next: usize,
    }

    impl embedded_hal::digital::ErrorType for ScriptedPin {
        type Error = Infallible;
    }

    impl InputPin for ScriptedPin {
        fn is_high(&mut self) -> std::result::Result<bool, Infallible> {
            let level = self.levels.get(self.next).copied().unwrap_or(false);
            self.next += 1;
            Ok(level)
        }

        fn is_low(&mut self) -> std::result::Result<bool, Infallible> {
            self.is_high().map(|level| !level)
        }
    }

    #[derive(Default)]
    struct CountingDelay {
        total_ns: u64,
    }

    impl DelayNs for CountingDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.total_ns += u64::from(ns);
        }
    }

    fn line_samples(tag: &str, repeats: usize, polarity: ManchesterType) -> Vec<bool> {
        let tag: TagId = tag.parse().unwrap();
        let frame = ManchesterEncoder::encode_tag_frame(RowParityRule::LowBit, &tag).unwrap();
        let bits: Vec<bool> = frame.iter().copied().cycle().take(frame.len() * repeats).collect();
        let levels = ManchesterEncoder::encode_bits(polarity, &bits);
        ManchesterDecoder::sample_edges(polarity, &levels, BIT_PERIOD_US / 2, DEFAULT_SAMPLE_DELAY_US)
    }

    #[test]
    fn test_decode_from_line() -> Result<()> {
        let decoder: Decoder = Decoder::default();
        for bit in line_samples("2C00AC693E", 5, ManchesterType::Ieee) {
            decoder.record_sample(bit);
        }
        assert_eq!(decoder.state(), DecoderState::FrameReady);

        let frame = decoder.poll()?;
        assert_eq!(frame.tag.as_str(), "2C00AC693E");
        assert_eq!(decoder.state(), DecoderState::Idle);
        assert_eq!(decoder.poll(), Err(DecodeError::NotReady));
        Ok(())
    }

    #[test]
    fn test_sample_frame_at_offset_12() -> Result<()> {
        let decoder: Decoder = Decoder::try_new(DecoderBuilder::new().with_marker_quota(1).build()?)?;
        let nibbles = [3, 1, 0, 0, 3, 7, 0xD, 9, 3, 0xD];
        let frame = ManchesterEncoder::frame_bits(RowParityRule::LowBit, &nibbles, 0, false);

        for _ in 0..12 {
            decoder.record_sample(false);
        }
        for &bit in &frame {
            decoder.record_sample(bit);
        }

        let decoded = decoder.poll()?;
        assert_eq!(decoded.tag.as_str(), "310037D93D");
        assert_eq!(decoded.offset, 12 + PREAMBLE_BITS);
        Ok(())
    }

    #[test]
    fn test_rejected_frame_rearms() {
        let decoder: Decoder = Decoder::new(DecoderBuilder::new().with_marker_quota(1).build().unwrap());
        for bit in ManchesterEncoder::frame_bits(RowParityRule::LowBit, &[1; 10], 0, true) {
            decoder.record_sample(bit);
        }
        assert!(decoder.is_ready());
        assert_eq!(decoder.poll(), Err(DecodeError::NoValidFrame));
        assert_eq!(decoder.state(), DecoderState::Idle);
    }

    #[test]
    fn test_thomas_polarity_levels() -> Result<()> {
        let config = DecoderBuilder::new()
            .with_polarity(ManchesterType::Thomas)
            .with_column_check(ColumnCheck::Full)
            .build()?;
        let decoder: Decoder = Decoder::try_new(config)?;

        // Feed raw first-half levels as the pin would read them
        for bit in line_samples("310037D93D", 5, ManchesterType::Thomas) {
            decoder.record_level(!bit);
        }
        assert_eq!(decoder.poll()?.tag.as_str(), "310037D93D");
        Ok(())
    }

    #[test]
    fn test_edge_sampler_reads_pin_after_delay() {
        let decoder: Decoder<64> = Decoder::new(DecoderBuilder::new().with_marker_quota(1).build().unwrap());
        let pin = ScriptedPin {
            levels: vec![true; PREAMBLE_BITS],
            next: 0,
        };
        let mut sampler = EdgeSampler::new(&decoder, pin, CountingDelay::default());

        for _ in 0..PREAMBLE_BITS {
            assert_eq!(sampler.on_edge(), Ok(true));
        }
        assert_eq!(decoder.state(), DecoderState::Sampling);

        let (pin, delay) = sampler.release();
        assert_eq!(pin.next, PREAMBLE_BITS);
        assert_eq!(delay.total_ns, PREAMBLE_BITS as u64 * u64::from(DEFAULT_SAMPLE_DELAY_US) * 1_000);
    }

    #[test]
    fn test_tag_source() {
        let decoder: Decoder = Decoder::default();
        let mut source = &decoder;
        assert_eq!(source.poll_tag(), Err(DecodeError::NotReady));
    }

    #[test]
    fn test_wait_for_frame() {
        let decoder: Decoder = Decoder::default();
        let samples = line_samples("2C00AC693E", 10, ManchesterType::Ieee);
        let taken = AtomicBool::new(false);

        let frame = std::thread::scope(|s| {
            s.spawn(|| {
                for chunk in samples.chunks(FRAME_BITS) {
                    if taken.load(Ordering::Acquire) {
                        break;
                    }
                    for &bit in chunk {
                        decoder.record_sample(bit);
                    }
                    while decoder.is_ready() && !taken.load(Ordering::Acquire) {
                        std::thread::yield_now();
                    }
                }
            });

            let frame = decoder.wait_for_frame();
            taken.store(true, Ordering::Release);
            frame
        });

        assert_eq!(frame.tag.as_str(), "2C00AC693E");
        assert!(!frame.parity_error);
    }

    #[test]
    fn test_concurrent_sampling_and_polling() {
        static DECODER: Decoder = Decoder::new(DecoderConfig::DEFAULT);
        let samples = line_samples("2C00AC693E", 20, ManchesterType::Ieee);
        let finished = AtomicBool::new(false);

        let decoded = std::thread::scope(|s| {
            s.spawn(|| {
                for frame in samples.chunks(FRAME_BITS) {
                    for &bit in frame {
                        DECODER.record_sample(bit);
                    }
                    // Hold off until the main loop drains the frame
                    while DECODER.is_ready() {
                        std::thread::yield_now();
                    }
                }
                finished.store(true, Ordering::Release);
            });

            let mut decoded = Vec::new();
            loop {
                let done = finished.load(Ordering::Acquire);
                if let Ok(frame) = DECODER.poll() {
                    decoded.push(frame.tag);
                }
                if done {
                    break;
                }
                std::thread::yield_now();
            }
            decoded
        });

        assert!(!decoded.is_empty());
        assert!(decoded.iter().all(|tag| tag.as_str() == "2C00AC693E"));
    }
}
