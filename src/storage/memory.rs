use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use super::{Storage, StorageError};

#[derive(Default)]
struct MemoryState {
    values: HashMap<String, String>,
    downloads: HashMap<String, String>,
    staged_file: Option<String>,
    writes: usize,
}

/// Process-local storage. Nothing survives the process; useful for tests and
/// throwaway sessions.
#[derive(Default)]
pub struct MemoryStorage {
    state: Mutex<MemoryState>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the payload returned by the next `read_file` calls.
    pub fn stage_file(&self, content: impl Into<String>) {
        self.lock().staged_file = Some(content.into());
    }

    /// Payload previously handed to `download_file` under `name`.
    pub fn downloaded(&self, name: &str) -> Option<String> {
        self.lock().downloads.get(name).cloned()
    }

    /// Raw value stored under `key`.
    pub fn value(&self, key: &str) -> Option<String> {
        self.lock().values.get(key).cloned()
    }

    /// Number of `set` calls so far.
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        // A poisoned lock only means a panicking test; the maps are still usable.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock().values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut state = self.lock();
        state.values.insert(key.to_string(), value.to_string());
        state.writes += 1;
        Ok(())
    }

    async fn download_file(&self, name: &str, content: &str) -> Result<()> {
        self.lock()
            .downloads
            .insert(name.to_string(), content.to_string());
        Ok(())
    }

    async fn read_file(&self) -> Result<String> {
        self.lock()
            .staged_file
            .clone()
            .ok_or_else(|| StorageError::NoImportSource.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_values_and_files() {
        let storage = MemoryStorage::new();

        assert_eq!(storage.get("k").await.unwrap(), None);
        storage.set("k", "v").await.unwrap();
        assert_eq!(storage.get("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(storage.write_count(), 1);

        storage.download_file("a.json", "{}").await.unwrap();
        assert_eq!(storage.downloaded("a.json").as_deref(), Some("{}"));

        assert!(storage.read_file().await.is_err());
        storage.stage_file("payload");
        assert_eq!(storage.read_file().await.unwrap(), "payload");
    }
}
