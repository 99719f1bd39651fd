use std::fs;
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::DataStorage;

/// Pretty-printed JSON array stored in a single file, rewritten whole on every
/// save.
pub struct JsonStorage<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonStorage<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<T> DataStorage<T> for JsonStorage<T>
where
    T: Serialize + DeserializeOwned,
{
    fn load(&self) -> Vec<T> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no data file yet, starting empty");
                return Vec::new();
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "failed to read data file");
                return Vec::new();
            }
        };

        if raw.trim().is_empty() {
            return Vec::new();
        }

        match serde_json::from_str::<Vec<T>>(&raw) {
            Ok(data) => {
                debug!(path = %self.path.display(), records = data.len(), "loaded data file");
                data
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "malformed data file, starting empty");
                Vec::new()
            }
        }
    }

    fn save(&self, data: &[T]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).context("failed to create data directory")?;
            }
        }

        let json = serde_json::to_string_pretty(data).context("failed to serialize records")?;
        fs::write(&self.path, json)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        debug!(path = %self.path.display(), records = data.len(), "saved data file");
        Ok(())
    }
}
