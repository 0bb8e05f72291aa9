//! Check-in workflow
//!
//! Ties a tag source to the registry and reports each scan to the character
//! display, the serial log and the network uplink.

use crate::bridge::{UploadRequest, Uplink};
use crate::core::{Action, Line, Status, TagId};
use crate::error::Result;
use crate::layout::DISPLAY_WIDTH;
use crate::registry::{Lookup, TagRegistry};
use crate::sampler::TagSource;
use crate::serial::SerialLog;

/// Two-line character display
pub trait Display {
    /// Blank both lines
    fn clear(&mut self);

    /// Write text at the start of a line
    fn write_line(&mut self, line: Line, text: &str);
}

/// What a scan did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// A registered tag was toggled
    Registered {
        /// Position in the registry
        index: usize,
        /// The scanned tag
        tag: TagId,
        /// Status after the toggle
        status: Status,
        /// Code sent upstream
        action: Action,
    },
    /// The tag is unknown
    Unregistered(TagId),
}

/// Cut text to the display width on a character boundary
pub fn fit_to_display(text: &str) -> &str {
    match text.char_indices().nth(DISPLAY_WIDTH) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Kiosk main loop state
pub struct Kiosk<S, D, L, U> {
    source: S,
    display: D,
    serial: L,
    uplink: U,
    registry: TagRegistry,
}

impl<S, D, L, U> Kiosk<S, D, L, U>
where
    S: TagSource,
    D: Display,
    L: SerialLog,
    U: Uplink,
{
    /// Assemble a kiosk
    pub fn new(source: S, display: D, serial: L, uplink: U, registry: TagRegistry) -> Self {
        Kiosk {
            source,
            display,
            serial,
            uplink,
            registry,
        }
    }

    /// Show the idle prompt and announce the restart upstream
    pub fn boot(&mut self) {
        self.display.clear();
        self.show(Line::One, "Scan a tag");
        self.upload(&UploadRequest::boot());
    }

    /// Process at most one scan
    ///
    /// Returns `Ok(None)` when no tag was read.
    pub fn poll(&mut self) -> Result<Option<ScanOutcome>> {
        match self.source.poll_tag() {
            Ok(tag) => Ok(Some(self.process_tag(tag))),
            Err(e) if e.is_idle() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Toggle a scanned tag and report the result
    pub fn process_tag(&mut self, tag: TagId) -> ScanOutcome {
        self.display.clear();

        match self.registry.toggle(&tag) {
            Lookup::Toggled {
                index,
                tag,
                status,
                action,
            } => {
                self.show(Line::One, &format!("Dog {} {}", index + 1, status));
                self.show(Line::Two, &format!("ID: {}", tag));
                self.serial.write_line(tag.as_str());
                self.upload(&UploadRequest::new(tag, action));
                ScanOutcome::Registered {
                    index,
                    tag,
                    status,
                    action,
                }
            }
            Lookup::Unregistered => {
                self.show(Line::One, "This card is");
                self.show(Line::Two, "not registered.");
                ScanOutcome::Unregistered(tag)
            }
        }
    }

    /// Registered tags and their current status
    pub fn registry(&self) -> &TagRegistry {
        &self.registry
    }

    /// Mutable access for alarm arming
    pub fn registry_mut(&mut self) -> &mut TagRegistry {
        &mut self.registry
    }

    /// Hand back the parts
    pub fn into_parts(self) -> (S, D, L, U, TagRegistry) {
        (self.source, self.display, self.serial, self.uplink, self.registry)
    }

    fn show(&mut self, line: Line, text: &str) {
        self.display.write_line(line, fit_to_display(text));
    }

    fn upload(&mut self, request: &UploadRequest) {
        if let Err(e) = self.uplink.upload(request) {
            log::warn!("upload of {} failed: {}", request.tag, e);
        }
    }
}
