use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use super::provider::{Registry, RegistryEntry, RegistryError, PUBLIC_KEY_SIZE};

/// In-memory registry using a HashMap
#[derive(Debug, Clone, Default)]
pub struct MemoryRegistry {
    inner: Arc<RwLock<HashMap<[u8; PUBLIC_KEY_SIZE], RegistryEntry>>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Registry for MemoryRegistry {
    async fn get(
        &self,
        public_key: &[u8; PUBLIC_KEY_SIZE],
    ) -> Result<Option<RegistryEntry>, RegistryError> {
        let inner = self.inner.read().map_err(|e| {
            RegistryError::Default(anyhow::anyhow!("failed to acquire read lock: {}", e))
        })?;
        Ok(inner.get(public_key).copied())
    }

    async fn set(&self, entry: RegistryEntry) -> Result<(), RegistryError> {
        let mut inner = self.inner.write().map_err(|e| {
            RegistryError::Default(anyhow::anyhow!("failed to acquire write lock: {}", e))
        })?;

        if let Some(current) = inner.get(&entry.public_key) {
            if entry.revision <= current.revision {
                return Err(RegistryError::StaleRevision {
                    key: hex::encode(entry.public_key),
                    attempted: entry.revision,
                    current: current.revision,
                });
            }
        }

        tracing::debug!(
            "MemoryRegistry::set: {} -> {} at revision {}",
            hex::encode(entry.public_key),
            entry.hash,
            entry.revision
        );
        inner.insert(entry.public_key, entry);
        Ok(())
    }
}
