//! Requests handed to the Wi-Fi bridge

use crate::core::{Action, TagId};
use crate::error::Result;

/// One status report for the adoption server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadRequest {
    /// Tag the report is about
    pub tag: TagId,
    /// What happened to it
    pub action: Action,
}

impl UploadRequest {
    /// Create a report
    pub fn new(tag: TagId, action: Action) -> Self {
        UploadRequest { tag, action }
    }

    /// Report sent once after the kiosk restarts
    pub fn boot() -> Self {
        UploadRequest::new(TagId::BOOT, Action::Boot)
    }

    /// Request line: `GET /add/<tag>/<action> HTTP/1.0`
    pub fn to_http_get(&self) -> String {
        format!("GET /add/{}/{} HTTP/1.0", self.tag, self.action.code())
    }

    /// Request line followed by the blank line ending the header
    pub fn to_wire(&self) -> String {
        format!("{}\r\n\r\n", self.to_http_get())
    }

    /// Bytes announced to the modem before sending
    pub fn wire_len(&self) -> usize {
        self.to_wire().len()
    }
}

/// Network sink that delivers reports upstream
pub trait Uplink {
    /// Deliver one report
    fn upload(&mut self, request: &UploadRequest) -> Result<()>;
}
