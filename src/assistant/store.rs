use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::StoreError;

/// Fixed key the transcript document lives under inside a session's scope.
pub const TRANSCRIPT_KEY: &str = "albanai-chat";

/// Session-scoped key-value storage for transcript documents.
pub trait TranscriptStore: Send + Sync + 'static {
    fn get(&self, session: &str, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, session: &str, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, session: &str, key: &str) -> Result<(), StoreError>;
    /// Whether entries survive a restart.
    fn is_durable(&self) -> bool;
}

/// Process-lifetime store; transcripts vanish on restart.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<(String, String), String>>,
}

impl MemoryStore {
    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<(String, String), String>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TranscriptStore for MemoryStore {
    fn get(&self, session: &str, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .entries()
            .get(&(session.to_string(), key.to_string()))
            .cloned())
    }

    fn set(&self, session: &str, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries()
            .insert((session.to_string(), key.to_string()), value.to_string());
        Ok(())
    }

    fn remove(&self, session: &str, key: &str) -> Result<(), StoreError> {
        self.entries().remove(&(session.to_string(), key.to_string()));
        Ok(())
    }

    fn is_durable(&self) -> bool {
        false
    }
}

/// One directory per session, one JSON file per key.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path(&self, session: &str, key: &str) -> PathBuf {
        self.root.join(sanitize(session)).join(format!("{}.json", sanitize(key)))
    }
}

fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

fn write_atomically(path: &Path, value: &str) -> io::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, value)?;
    match fs::rename(&tmp, path) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            if path.exists() {
                fs::remove_file(path)?;
                fs::rename(&tmp, path)
            } else {
                Err(rename_err)
            }
        }
    }
}

impl TranscriptStore for FileStore {
    fn get(&self, session: &str, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path(session, key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, session: &str, key: &str, value: &str) -> Result<(), StoreError> {
        write_atomically(&self.path(session, key), value)?;
        Ok(())
    }

    fn remove(&self, session: &str, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path(session, key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn is_durable(&self) -> bool {
        true
    }
}
