// JSON-file implementation of the policy store.
//
// One document holds every guild's policy. The whole file is read once at
// construction and rewritten on every save.

use crate::core::policy::{GuildPolicy, PolicyStore, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;

pub struct JsonPolicyStore {
    path: PathBuf,
    cache: RwLock<HashMap<u64, GuildPolicy>>,
}

impl JsonPolicyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let cache = if path.exists() {
            match std::fs::File::open(&path) {
                Ok(file) => {
                    let map: HashMap<u64, GuildPolicy> =
                        serde_json::from_reader(file).unwrap_or_else(|e| {
                            tracing::warn!(
                                "Failed to parse policy file {}: {}",
                                path.display(),
                                e
                            );
                            HashMap::new()
                        });
                    RwLock::new(map)
                }
                Err(e) => {
                    tracing::warn!("Failed to open policy file {}: {}", path.display(), e);
                    RwLock::new(HashMap::new())
                }
            }
        } else {
            RwLock::new(HashMap::new())
        };

        Self { path, cache }
    }

    async fn persist(&self) -> Result<(), StoreError> {
        let cache = self.cache.read().await;
        let file = std::fs::File::create(&self.path)?;
        serde_json::to_writer_pretty(file, &*cache)?;
        Ok(())
    }
}

#[async_trait]
impl PolicyStore for JsonPolicyStore {
    async fn load(&self, guild_id: u64) -> Result<Option<GuildPolicy>, StoreError> {
        let cache = self.cache.read().await;
        Ok(cache.get(&guild_id).cloned())
    }

    async fn save(&self, guild_id: u64, policy: GuildPolicy) -> Result<(), StoreError> {
        let mut cache = self.cache.write().await;
        cache.insert(guild_id, policy);
        drop(cache); // Release lock before persisting
        self.persist().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_owned();
        drop(tmp);

        let store = JsonPolicyStore::new(path.clone());
        assert!(store.load(1).await.unwrap().is_none());

        let mut policy = GuildPolicy::default();
        policy.anti_spam = false;
        policy.link_whitelist.insert("example.com".to_string());
        store.save(1, policy.clone()).await.unwrap();

        assert_eq!(store.load(1).await.unwrap(), Some(policy));
    }

    #[tokio::test]
    async fn policies_survive_reload_from_disk() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_owned();
        drop(tmp);

        let store = JsonPolicyStore::new(path.clone());
        let mut policy = GuildPolicy::default();
        policy.timeout_minutes = 25;
        policy.bypass_user_ids.insert(99);
        store.save(7, policy.clone()).await.unwrap();

        // Fresh store instance reads the document written above.
        let reloaded = JsonPolicyStore::new(path);
        assert_eq!(reloaded.load(7).await.unwrap(), Some(policy));
        assert!(reloaded.load(8).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_file_falls_back_to_empty() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_owned();
        std::fs::write(&path, "not json at all").unwrap();

        let store = JsonPolicyStore::new(path);
        assert!(store.load(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn saving_multiple_guilds_keeps_each_document() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_owned();
        drop(tmp);

        let store = JsonPolicyStore::new(path);
        store.save(1, GuildPolicy::default()).await.unwrap();
        let mut other = GuildPolicy::default();
        other.anti_link = false;
        store.save(2, other.clone()).await.unwrap();

        assert_eq!(store.load(1).await.unwrap(), Some(GuildPolicy::default()));
        assert_eq!(store.load(2).await.unwrap(), Some(other));
    }
}
