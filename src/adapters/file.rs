//! File Context Store
//!
//! Persists the whole context store as one JSON object (`key -> value`) on
//! disk, so a cache survives across separate process runs the same way it
//! does inside the host platform.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::debug;

use crate::domain::ports::ContextStore;
use crate::error::Result;

/// Context store backed by a single JSON document
#[derive(Debug)]
pub struct FileContextStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FileContextStore {
    /// Open the store at `path`, starting empty if the file does not exist
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let values = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&raw)?
            }
        } else {
            BTreeMap::new()
        };

        debug!(path = %path.display(), keys = values.len(), "Opened file context store");

        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All stored keys, sorted
    pub fn keys(&self) -> Vec<String> {
        self.values.lock().keys().cloned().collect()
    }

    // Sibling temp file, then rename over the document.
    fn persist(&self, values: &BTreeMap<String, String>) -> Result<()> {
        let tmp_path = self.path.with_extension("tmp");
        let json = serde_json::to_string_pretty(values)?;

        if let Err(e) = fs::write(&tmp_path, json) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl ContextStore for FileContextStore {
    fn get_context(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set_context(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.lock();
        values.insert(key.to_string(), value.to_string());
        self.persist(&values)
    }
}

// =============================================================================
// Tests
// =============================================================================
