mod error;
mod memory;
mod retry;
mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

pub use error::*;
pub use memory::*;
pub use retry::*;
pub use sqlite::*;

/// SQL migration for the key-value table
pub const MIGRATION_001_KV_STORE: &str = include_str!("migrations/001_kv_store.sql");

/// Storage collaborator used by the account service.
///
/// Values are opaque serialized blobs; `set` always overwrites the whole value
/// stored under a key. File operations hand text payloads to and from the
/// environment (an export directory, an uploaded file, ...).
#[async_trait]
pub trait Storage: Send + Sync {
    /// Load the value stored under `key`, `None` if nothing was stored yet.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Overwrite the value stored under `key`.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Hand a text payload to the environment under the given file name.
    async fn download_file(&self, name: &str, content: &str) -> Result<()>;

    /// Obtain the text payload selected for import.
    async fn read_file(&self) -> Result<String>;
}
