use std::future::Future;

use anyhow::Result;
use async_trait::async_trait;
use tracing::warn;

use crate::config::RetryPolicy;

use super::{Storage, StorageError, is_transient};

/// Wraps a storage so every call gets a hard timeout and transient failures
/// are retried with exponential backoff. Permanent failures surface at once.
pub struct RetryingStorage<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: Storage> RetryingStorage<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    async fn run<T, F, Fut>(&self, op: &'static str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            let err = match tokio::time::timeout(self.policy.timeout, call()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(err)) => err,
                Err(_) => StorageError::Timeout {
                    operation: op,
                    after: self.policy.timeout,
                }
                .into(),
            };

            if !is_transient(&err) {
                return Err(err);
            }
            if attempt >= self.policy.max_attempts {
                return Err(err.context(format!("{} failed after {} attempt(s)", op, attempt)));
            }

            let delay = self.policy.delay_for(attempt);
            warn!(op, attempt, ?delay, error = %err, "storage call failed, retrying");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[async_trait]
impl<S: Storage> Storage for RetryingStorage<S> {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.run("get", || self.inner.get(key)).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.run("set", || self.inner.set(key, value)).await
    }

    async fn download_file(&self, name: &str, content: &str) -> Result<()> {
        self.run("download_file", || self.inner.download_file(name, content))
            .await
    }

    async fn read_file(&self) -> Result<String> {
        self.run("read_file", || self.inner.read_file()).await
    }
}
