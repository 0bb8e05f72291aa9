//! Serial log sink and the UART tag reader framing

use crate::core::TagId;
use crate::error::{DecodeError, Result};
use crate::layout::TAG_CHARS;
use crate::sampler::TagSource;

/// First byte of a reader frame (line feed)
pub const FRAME_START: u8 = 0x0A;

/// Last byte of a reader frame (carriage return)
pub const FRAME_END: u8 = 0x0D;

/// Reader frame: start byte, 10 tag characters, end byte
pub const SERIAL_FRAME_LEN: usize = TAG_CHARS + 2;

/// Byte sink for host-side logging
pub trait SerialLog {
    /// Send raw bytes
    fn write_bytes(&mut self, bytes: &[u8]);

    /// Send text followed by CR LF
    fn write_line(&mut self, text: &str) {
        self.write_bytes(text.as_bytes());
        self.write_bytes(b"\r\n");
    }
}

impl SerialLog for Vec<u8> {
    fn write_bytes(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }
}

/// Reassembles tag frames from a UART reader module, one byte per receive interrupt
///
/// A completed frame locks the assembler; further bytes are ignored until
/// the tag is taken.
#[derive(Debug, Clone)]
pub struct SerialFrameAssembler {
    buffer: [u8; SERIAL_FRAME_LEN],
    index: usize,
    done: bool,
}

impl SerialFrameAssembler {
    /// Create an empty assembler
    pub const fn new() -> Self {
        SerialFrameAssembler {
            buffer: [0; SERIAL_FRAME_LEN],
            index: 0,
            done: false,
        }
    }

    /// Feed one received byte; true when it completed a frame
    pub fn push(&mut self, byte: u8) -> bool {
        if self.done {
            return false;
        }

        let misplaced = (self.index == 0 && byte != FRAME_START)
            || (self.index == SERIAL_FRAME_LEN - 1 && byte != FRAME_END);
        if misplaced {
            log::debug!("discarding partial reader frame at byte {}", self.index);
            self.index = 0;
            if byte != FRAME_START {
                return false;
            }
        }

        self.buffer[self.index] = byte;
        self.index += 1;
        if self.index == SERIAL_FRAME_LEN {
            self.index = 0;
            self.done = true;
            return true;
        }
        false
    }

    /// A frame is waiting
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Take the waiting tag and unlock the assembler
    pub fn take(&mut self) -> Result<TagId> {
        if !self.done {
            return Err(DecodeError::NotReady);
        }
        self.done = false;
        TagId::new(&self.buffer[1..=TAG_CHARS])
    }
}

impl Default for SerialFrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl TagSource for SerialFrameAssembler {
    fn poll_tag(&mut self) -> Result<TagId> {
        self.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(tag: &[u8]) -> Vec<u8> {
        let mut bytes = vec![FRAME_START];
        bytes.extend_from_slice(tag);
        bytes.push(FRAME_END);
        bytes
    }

    #[test]
    fn test_assembles_frame() -> Result<()> {
        let mut assembler = SerialFrameAssembler::new();
        let bytes = frame(b"2C00AC693E");
        let (last, rest) = bytes.split_last().unwrap();
        assert!(rest.iter().all(|&b| !assembler.push(b)));
        assert!(assembler.push(*last));

        assert_eq!(assembler.take()?.as_str(), "2C00AC693E");
        assert_eq!(assembler.take(), Err(DecodeError::NotReady));
        Ok(())
    }

    #[test]
    fn test_ignores_noise_before_start() -> Result<()> {
        let mut assembler = SerialFrameAssembler::new();
        for b in b"xyz".iter().chain(frame(b"310037D93D").iter()) {
            assembler.push(*b);
        }
        assert_eq!(assembler.poll_tag()?.as_str(), "310037D93D");
        Ok(())
    }

    #[test]
    fn test_bad_end_byte_resets() -> Result<()> {
        let mut assembler = SerialFrameAssembler::new();
        let mut bad = frame(b"310037D93D");
        bad[SERIAL_FRAME_LEN - 1] = b'!';
        for b in bad {
            assembler.push(b);
        }
        assert!(!assembler.is_done());

        // A start byte in the end position begins a new frame
        let mut restart = frame(b"310037D93D");
        restart.truncate(SERIAL_FRAME_LEN - 1);
        for b in restart.iter().chain(frame(b"2C00AC693E").iter()) {
            assembler.push(*b);
        }
        assert_eq!(assembler.take()?.as_str(), "2C00AC693E");
        Ok(())
    }

    #[test]
    fn test_locked_until_taken() -> Result<()> {
        let mut assembler = SerialFrameAssembler::new();
        for b in frame(b"2C00AC693E").into_iter().chain(frame(b"310037D93D")) {
            assembler.push(b);
        }
        assert_eq!(assembler.take()?.as_str(), "2C00AC693E");
        assert!(!assembler.is_done());
        Ok(())
    }

    #[test]
    fn test_serial_log_lines() {
        let mut out: Vec<u8> = Vec::new();
        out.write_line("310037D93D");
        assert_eq!(out, b"310037D93D\r\n");
    }
}
