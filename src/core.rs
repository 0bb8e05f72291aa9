//! Core value types shared by the decoder, registry and kiosk

use crate::error::{DecodeError, Result};
use crate::layout::TAG_CHARS;

/// A 10-character tag identifier as printed on the display and sent upstream
///
/// Decoded tags are upper-case hex digits. Registered tags and the boot
/// marker may use any printable ASCII character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct TagId([u8; TAG_CHARS]);

impl TagId {
    /// Placeholder identifier uploaded with the boot action
    pub const BOOT: TagId = TagId(*b"----------");

    /// Create a tag from exactly 10 printable ASCII bytes
    pub fn new(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != TAG_CHARS {
            return Err(DecodeError::invalid_tag(format!(
                "expected {} characters, got {}",
                TAG_CHARS,
                bytes.len()
            )));
        }
        if let Some(&b) = bytes.iter().find(|b| !b.is_ascii_graphic()) {
            return Err(DecodeError::invalid_tag(format!(
                "non-printable byte {:#04x}",
                b
            )));
        }

        let mut id = [0u8; TAG_CHARS];
        id.copy_from_slice(bytes);
        Ok(TagId(id))
    }

    /// Build a tag from ten decoded nibbles (values above 0xF are masked)
    pub fn from_nibbles(nibbles: &[u8; TAG_CHARS]) -> Self {
        let mut id = [0u8; TAG_CHARS];
        for (c, &n) in id.iter_mut().zip(nibbles) {
            *c = hex_digit(n & 0x0F);
        }
        TagId(id)
    }

    /// Convert back to nibbles; fails if any character is not a hex digit
    pub fn nibbles(&self) -> Result<[u8; TAG_CHARS]> {
        let mut nibbles = [0u8; TAG_CHARS];
        for (n, &c) in nibbles.iter_mut().zip(&self.0) {
            *n = (c as char).to_digit(16).ok_or_else(|| {
                DecodeError::invalid_tag(format!("{:?} is not a hex digit", c as char))
            })? as u8;
        }
        Ok(nibbles)
    }

    /// Raw ASCII bytes
    pub fn as_bytes(&self) -> &[u8; TAG_CHARS] {
        &self.0
    }

    /// The identifier as text
    pub fn as_str(&self) -> &str {
        // Construction only admits ASCII.
        std::str::from_utf8(&self.0).unwrap_or_default()
    }
}

fn hex_digit(n: u8) -> u8 {
    match n {
        0..=9 => b'0' + n,
        _ => b'A' + (n - 10),
    }
}

impl std::str::FromStr for TagId {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self> {
        TagId::new(s.as_bytes())
    }
}

impl TryFrom<String> for TagId {
    type Error = DecodeError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<TagId> for String {
    fn from(tag: TagId) -> Self {
        tag.as_str().to_string()
    }
}

impl std::fmt::Display for TagId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shelter status of a registered animal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Status {
    /// Animal has left with an adopter
    Adopted,
    /// Animal is in the shelter's care
    Surrendered,
    /// Cabinet alarm raised for this tag
    Alarmed,
}

impl Status {
    /// Status after one more scan of the tag
    pub fn toggled(self) -> Self {
        match self {
            Status::Adopted => Status::Surrendered,
            Status::Surrendered => Status::Adopted,
            Status::Alarmed => Status::Surrendered,
        }
    }

    /// Action code reported upstream when a tag enters this status
    pub fn action(self) -> Option<Action> {
        match self {
            Status::Adopted => Some(Action::Adopted),
            Status::Surrendered => Some(Action::Surrendered),
            Status::Alarmed => None,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Adopted => write!(f, "adopted"),
            Status::Surrendered => write!(f, "surrendered"),
            Status::Alarmed => write!(f, "ALARMED"),
        }
    }
}

/// Single-character action code understood by the network bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// `'a'`
    Adopted,
    /// `'s'`
    Surrendered,
    /// `'b'`, sent once after the kiosk restarts
    Boot,
}

impl Action {
    /// Wire character
    pub fn code(self) -> char {
        match self {
            Action::Adopted => 'a',
            Action::Surrendered => 's',
            Action::Boot => 'b',
        }
    }

    /// Parse a wire character
    pub fn from_code(code: char) -> Result<Self> {
        match code {
            'a' => Ok(Action::Adopted),
            's' => Ok(Action::Surrendered),
            'b' => Ok(Action::Boot),
            other => Err(DecodeError::InvalidAction(other)),
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Row of the two-line character display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    /// Top row
    One,
    /// Bottom row
    Two,
}

impl Line {
    /// DDRAM address of the first column of the row
    pub fn address(self) -> u8 {
        match self {
            Line::One => 0x00,
            Line::Two => 0x40,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_creation() {
        assert!(TagId::new(b"310037D93D").is_ok());
        assert!(TagId::new(b"310037D93").is_err());
        assert!(TagId::new(b"310037D93D0").is_err());
        assert!(TagId::new(b"3100 7D93D").is_err());
    }

    #[test]
    fn test_tag_from_nibbles() -> Result<()> {
        let tag = TagId::from_nibbles(&[3, 1, 0, 0, 3, 7, 0xD, 9, 3, 0xD]);
        assert_eq!(tag.as_str(), "310037D93D");
        assert_eq!(tag.nibbles()?, [3, 1, 0, 0, 3, 7, 0xD, 9, 3, 0xD]);
        Ok(())
    }

    #[test]
    fn test_non_hex_tag_has_no_nibbles() -> Result<()> {
        let tag: TagId = "TF005CAD60".parse()?;
        assert!(tag.nibbles().is_err());
        assert!(TagId::BOOT.nibbles().is_err());
        Ok(())
    }

    #[test]
    fn test_status_toggle() {
        assert_eq!(Status::Surrendered.toggled(), Status::Adopted);
        assert_eq!(Status::Adopted.toggled(), Status::Surrendered);
        assert_eq!(Status::Alarmed.toggled(), Status::Surrendered);
        assert_eq!(Status::Alarmed.action(), None);
    }

    #[test]
    fn test_action_codes() -> Result<()> {
        assert_eq!(Action::from_code('a')?, Action::Adopted);
        assert_eq!(Action::from_code('s')?, Action::Surrendered);
        assert_eq!(Action::Boot.code(), 'b');
        assert_eq!(Action::from_code('x'), Err(DecodeError::InvalidAction('x')));
        Ok(())
    }

    #[test]
    fn test_line_address() {
        assert_eq!(Line::One.address(), 0x00);
        assert_eq!(Line::Two.address(), 0x40);
    }
}
