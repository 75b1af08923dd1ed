//! Persistence of the accepted event log. State is rebuilt by replaying it.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::events::Event;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub unit_version: String,
    pub activity_id: String,
    pub events: Vec<Event>,
}

impl SessionRecord {
    pub fn to_cbor(&self) -> Result<Vec<u8>, StoreError> {
        Ok(serde_cbor::to_vec(self)?)
    }

    pub fn from_cbor(bytes: &[u8]) -> Result<Self, StoreError> {
        Ok(serde_cbor::from_slice(bytes)?)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session record codec error: {0}")]
    Codec(#[from] serde_cbor::Error),
    #[error("session store i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("session record is for {found}, expected {expected}")]
    Mismatch { expected: String, found: String },
}

pub trait StateStore: Send {
    fn save(&mut self, record: &SessionRecord) -> Result<(), StoreError>;
    fn load(&self) -> Result<Option<SessionRecord>, StoreError>;
}

/// In-memory store. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slot: Arc<Mutex<Option<Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn save(&mut self, record: &SessionRecord) -> Result<(), StoreError> {
        let bytes = record.to_cbor()?;
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(bytes);
        Ok(())
    }

    fn load(&self) -> Result<Option<SessionRecord>, StoreError> {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.as_deref().map(SessionRecord::from_cbor).transpose()
    }
}

/// CBOR file store. Writes go to a sibling temp file that is then renamed.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for FileStore {
    fn save(&mut self, record: &SessionRecord) -> Result<(), StoreError> {
        let bytes = record.to_cbor()?;
        let temp = self.path.with_extension("tmp");
        fs::write(&temp, bytes)?;
        fs::rename(&temp, &self.path)?;
        Ok(())
    }

    fn load(&self) -> Result<Option<SessionRecord>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&self.path)?;
        SessionRecord::from_cbor(&bytes).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    fn record() -> SessionRecord {
        SessionRecord {
            unit_version: "1.0.0".into(),
            activity_id: "https://example.com/units/u".into(),
            events: vec![
                Event::new("containers/main", 10, EventKind::Visible),
                Event::new(
                    "containers/main/blocks/0/questions/0",
                    20,
                    EventKind::Answered {
                        response: "yes".into(),
                    },
                ),
            ],
        }
    }

    #[test]
    fn memory_store_round_trips() {
        let mut store = MemoryStore::new();
        assert_eq!(store.load().expect("empty"), None);
        store.save(&record()).expect("save");
        assert_eq!(store.clone().load().expect("load"), Some(record()));
    }

    #[test]
    fn file_store_replaces_previous_record() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = FileStore::new(dir.path().join("session.cbor"));
        assert_eq!(store.load().expect("missing file"), None);

        let mut first = record();
        first.events.truncate(1);
        store.save(&first).expect("save first");
        store.save(&record()).expect("save second");
        assert_eq!(store.load().expect("load"), Some(record()));
        assert!(!dir.path().join("session.tmp").exists());
    }

    #[test]
    fn corrupt_bytes_are_codec_errors() {
        assert!(matches!(
            SessionRecord::from_cbor(&[0xff, 0x00]),
            Err(StoreError::Codec(_))
        ));
    }
}
