//! Storage of meta-progression that survives across runs
//!
//! The simulation never touches storage directly: it hands the updated
//! `PersistentData` to a backend when a run ends and receives one back at
//! process start. Any read failure falls back to defaults.

use std::collections::BTreeSet;
#[cfg(feature = "persistence")]
use std::path::{Path, PathBuf};
use std::cell::RefCell;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Persistent progress record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistentData {
    /// Purchased unlock identifiers
    pub unlocks: BTreeSet<String>,
    /// Highest level ever reached
    pub high_level: u32,
    /// Spendable currency
    pub currency: u64,
    /// Completed runs
    pub runs_played: u32,
}

/// Persistence errors
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed save data: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("No saved data")]
    NotFound,
}

/// Durable storage for `PersistentData`
pub trait PersistenceBackend {
    fn load(&self) -> Result<PersistentData, PersistenceError>;
    fn save(&self, data: &PersistentData) -> Result<(), PersistenceError>;
}

/// Load from `backend`, falling back to defaults on any failure
pub fn load_or_default(backend: &dyn PersistenceBackend) -> PersistentData {
    match backend.load() {
        Ok(data) => {
            info!(
                currency = data.currency,
                high_level = data.high_level,
                "Loaded persistent progress"
            );
            data
        }
        Err(PersistenceError::NotFound) => {
            info!("No saved progress, starting fresh");
            PersistentData::default()
        }
        Err(e) => {
            warn!("Failed to load persistent progress ({}), using defaults", e);
            PersistentData::default()
        }
    }
}

/// Save to `backend`, logging instead of propagating failures
pub fn save_or_warn(backend: &dyn PersistenceBackend, data: &PersistentData) -> bool {
    match backend.save(data) {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to save persistent progress: {}", e);
            false
        }
    }
}

/// JSON file store; writes go to a temp file first and are renamed into place
#[cfg(feature = "persistence")]
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

#[cfg(feature = "persistence")]
impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }
}

#[cfg(feature = "persistence")]
impl PersistenceBackend for JsonFileStore {
    fn load(&self) -> Result<PersistentData, PersistenceError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PersistenceError::NotFound)
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&raw)?)
    }

    fn save(&self, data: &PersistentData) -> Result<(), PersistenceError> {
        let encoded = serde_json::to_string_pretty(data)?;
        let tmp = self.temp_path();
        std::fs::write(&tmp, encoded)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// In-memory store for tests and replays
#[derive(Debug, Default)]
pub struct MemoryStore {
    slot: RefCell<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw text as if it had been written by an earlier process
    pub fn with_raw(raw: &str) -> Self {
        Self {
            slot: RefCell::new(Some(raw.to_string())),
        }
    }
}

impl PersistenceBackend for MemoryStore {
    fn load(&self) -> Result<PersistentData, PersistenceError> {
        match self.slot.borrow().as_deref() {
            Some(raw) => Ok(serde_json::from_str(raw)?),
            None => Err(PersistenceError::NotFound),
        }
    }

    fn save(&self, data: &PersistentData) -> Result<(), PersistenceError> {
        *self.slot.borrow_mut() = Some(serde_json::to_string(data)?);
        Ok(())
    }
}
