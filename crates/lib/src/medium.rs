//! The external medium: a single global read/write text slot shared with a
//! human operator (the system clipboard in production, an in-memory slot in
//! tests). Writes by the process and writes by the human are indistinguishable
//! except by value, which is why the bridge compares samples against its own
//! last publish.

use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediumError {
    #[error("reading the medium failed: {0}")]
    Read(String),

    #[error("writing the medium failed: {0}")]
    Write(String),
}

/// Capability interface over the medium, injectable so the gateway can run
/// against a deterministic fake instead of the real clipboard.
pub trait Medium: Send + Sync {
    /// Current value of the slot. An empty slot reads as `""`.
    fn get_text(&self) -> Result<String, MediumError>;

    /// Replace the slot's value.
    fn set_text(&self, text: &str) -> Result<(), MediumError>;
}

/// The real system clipboard via arboard. A fresh handle per call keeps the
/// type `Send + Sync` on every platform.
#[derive(Default)]
pub struct SystemClipboard;

impl SystemClipboard {
    pub fn new() -> Self {
        Self
    }
}

impl Medium for SystemClipboard {
    fn get_text(&self) -> Result<String, MediumError> {
        let mut clipboard =
            arboard::Clipboard::new().map_err(|e| MediumError::Read(e.to_string()))?;
        match clipboard.get_text() {
            Ok(text) => Ok(text),
            // An empty clipboard is a normal state, not a failure.
            Err(arboard::Error::ContentNotAvailable) => Ok(String::new()),
            Err(e) => Err(MediumError::Read(e.to_string())),
        }
    }

    fn set_text(&self, text: &str) -> Result<(), MediumError> {
        let mut clipboard =
            arboard::Clipboard::new().map_err(|e| MediumError::Write(e.to_string()))?;
        clipboard
            .set_text(text.to_string())
            .map_err(|e| MediumError::Write(e.to_string()))
    }
}

/// In-memory slot: clones share the same value, so a test can play the
/// operator by writing into its clone of the medium.
#[derive(Clone, Default)]
pub struct InMemoryMedium {
    slot: Arc<Mutex<String>>,
}

impl InMemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Medium for InMemoryMedium {
    fn get_text(&self) -> Result<String, MediumError> {
        let slot = self
            .slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(slot.clone())
    }

    fn set_text(&self, text: &str) -> Result<(), MediumError> {
        let mut slot = self
            .slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = text.to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_clones_share_the_slot() {
        let a = InMemoryMedium::new();
        let b = a.clone();
        a.set_text("hello").expect("write");
        assert_eq!(b.get_text().expect("read"), "hello");
    }

    #[test]
    fn in_memory_starts_empty() {
        let medium = InMemoryMedium::new();
        assert_eq!(medium.get_text().expect("read"), "");
    }
}
