//! Registered-tag table and the scan-to-status workflow

use crate::core::{Action, Status, TagId};

/// One animal known to the kiosk
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegisteredTag {
    /// Collar tag
    pub tag: TagId,
    /// Current shelter status
    pub status: Status,
    /// Next alarm on this tag should be uploaded
    #[cfg_attr(feature = "serde", serde(default))]
    pub armed: bool,
}

impl RegisteredTag {
    /// Create an unarmed entry
    pub fn new(tag: TagId, status: Status) -> Self {
        RegisteredTag {
            tag,
            status,
            armed: false,
        }
    }
}

/// Result of scanning a tag against the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// Tag found; its status was toggled
    Toggled {
        /// Position in the table
        index: usize,
        /// The matched tag
        tag: TagId,
        /// Status after the toggle
        status: Status,
        /// Code to report upstream
        action: Action,
    },
    /// Tag is not in the table; nothing changed
    Unregistered,
}

/// Fixed table of registered tags
///
/// Entries are set when the table is built and never added or removed.
/// Lookups scan linearly; the table holds a handful of animals.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TagRegistry {
    entries: Vec<RegisteredTag>,
}

impl TagRegistry {
    /// Create a table from its entries
    pub fn new(entries: Vec<RegisteredTag>) -> Self {
        TagRegistry { entries }
    }

    /// The three collars issued with the kiosk, all in the shelter's care
    pub fn shelter_defaults() -> Self {
        let tags = [b"2C00AC693E", b"310037D93D", b"TF005CAD60"];
        TagRegistry::new(
            tags.iter()
                .filter_map(|t| TagId::new(*t).ok())
                .map(|tag| RegisteredTag::new(tag, Status::Surrendered))
                .collect(),
        )
    }

    /// Load a table from JSON
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> crate::error::Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| crate::error::DecodeError::invalid_config(e.to_string()))
    }

    /// Position of a tag, if registered
    pub fn lookup(&self, tag: &TagId) -> Option<usize> {
        self.entries.iter().position(|entry| entry.tag == *tag)
    }

    /// Entry at a position
    pub fn get(&self, index: usize) -> Option<&RegisteredTag> {
        self.entries.get(index)
    }

    /// All entries in table order
    pub fn entries(&self) -> &[RegisteredTag] {
        &self.entries
    }

    /// Number of registered tags
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Toggle a scanned tag's status
    pub fn toggle(&mut self, tag: &TagId) -> Lookup {
        let Some(index) = self.lookup(tag) else {
            log::info!("tag {} is not registered", tag);
            return Lookup::Unregistered;
        };

        let entry = &mut self.entries[index];
        entry.status = entry.status.toggled();
        // Toggling never lands on Alarmed, so there is always an action.
        let action = entry.status.action().unwrap_or(Action::Surrendered);
        log::info!("tag {} is now {}", entry.tag, entry.status);

        Lookup::Toggled {
            index,
            tag: entry.tag,
            status: entry.status,
            action,
        }
    }

    /// Arm the alarm upload for a tag; returns false when unregistered
    pub fn arm(&mut self, tag: &TagId) -> bool {
        match self.lookup(tag) {
            Some(index) => {
                self.entries[index].armed = true;
                true
            }
            None => false,
        }
    }

    /// Mark a tag as alarmed
    ///
    /// `Some(true)` the first time after arming, so the caller uploads the
    /// alarm once; `Some(false)` afterwards; `None` for unregistered tags.
    pub fn raise_alarm(&mut self, tag: &TagId) -> Option<bool> {
        let index = self.lookup(tag)?;
        let entry = &mut self.entries[index];
        entry.status = Status::Alarmed;
        let first = entry.armed;
        entry.armed = false;
        if first {
            log::warn!("alarm raised for tag {}", entry.tag);
        }
        Some(first)
    }
}

impl Default for TagRegistry {
    fn default() -> Self {
        Self::shelter_defaults()
    }
}
