// Policy service - load/get/set contract over a persistence port.

use super::policy_models::{GuildPolicy, ProtectFeature};
use async_trait::async_trait;
use tokio::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Persistence port for per-guild policy documents.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    async fn load(&self, guild_id: u64) -> Result<Option<GuildPolicy>, StoreError>;
    async fn save(&self, guild_id: u64, policy: GuildPolicy) -> Result<(), StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Read and mutate guild policies. Reads materialize and persist the default
/// policy on first access; writes always overwrite the whole document.
///
/// Mutations run under one internal lock so concurrent read-modify-write
/// cycles for the same guild cannot interleave.
pub struct PolicyService<S: PolicyStore> {
    store: S,
    write_lock: Mutex<()>,
}

impl<S: PolicyStore> PolicyService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Fetches the guild's policy, creating and persisting the default set
    /// the first time the guild is seen.
    pub async fn get(&self, guild_id: u64) -> Result<GuildPolicy, PolicyError> {
        if let Some(policy) = self.store.load(guild_id).await? {
            return Ok(policy);
        }

        let _guard = self.write_lock.lock().await;
        // Re-check: another task may have materialized it while we waited.
        if let Some(policy) = self.store.load(guild_id).await? {
            return Ok(policy);
        }
        let policy = GuildPolicy::default();
        self.store.save(guild_id, policy.clone()).await?;
        Ok(policy)
    }

    /// Flips one protection toggle and returns the updated policy.
    pub async fn set_feature(
        &self,
        guild_id: u64,
        feature: ProtectFeature,
        enabled: bool,
    ) -> Result<GuildPolicy, PolicyError> {
        let _guard = self.write_lock.lock().await;
        let mut policy = self.load_or_default(guild_id).await?;
        match feature {
            ProtectFeature::AntiLink => policy.anti_link = enabled,
            ProtectFeature::AntiSpam => policy.anti_spam = enabled,
            ProtectFeature::AntiRaid => policy.anti_raid = enabled,
            ProtectFeature::AntiBot => policy.anti_bot = enabled,
        }
        self.store.save(guild_id, policy.clone()).await?;
        Ok(policy)
    }

    /// Adds a link-whitelist substring. Returns false when it was already
    /// present.
    pub async fn add_link_whitelist(
        &self,
        guild_id: u64,
        entry: String,
    ) -> Result<bool, PolicyError> {
        let _guard = self.write_lock.lock().await;
        let mut policy = self.load_or_default(guild_id).await?;
        let inserted = policy.link_whitelist.insert(entry);
        if inserted {
            self.store.save(guild_id, policy).await?;
        }
        Ok(inserted)
    }

    /// Adds a user to the bypass list. Returns false when already listed.
    pub async fn add_bypass_user(&self, guild_id: u64, user_id: u64) -> Result<bool, PolicyError> {
        let _guard = self.write_lock.lock().await;
        let mut policy = self.load_or_default(guild_id).await?;
        let inserted = policy.bypass_user_ids.insert(user_id);
        if inserted {
            self.store.save(guild_id, policy).await?;
        }
        Ok(inserted)
    }

    /// Removes a user from the bypass list. Returns false when not listed.
    pub async fn remove_bypass_user(
        &self,
        guild_id: u64,
        user_id: u64,
    ) -> Result<bool, PolicyError> {
        let _guard = self.write_lock.lock().await;
        let mut policy = self.load_or_default(guild_id).await?;
        let removed = policy.bypass_user_ids.remove(&user_id);
        if removed {
            self.store.save(guild_id, policy).await?;
        }
        Ok(removed)
    }

    /// Adds a role to the bypass list. Returns false when already listed.
    pub async fn add_bypass_role(&self, guild_id: u64, role_id: u64) -> Result<bool, PolicyError> {
        let _guard = self.write_lock.lock().await;
        let mut policy = self.load_or_default(guild_id).await?;
        let inserted = policy.bypass_role_ids.insert(role_id);
        if inserted {
            self.store.save(guild_id, policy).await?;
        }
        Ok(inserted)
    }

    /// Removes a role from the bypass list. Returns false when not listed.
    pub async fn remove_bypass_role(
        &self,
        guild_id: u64,
        role_id: u64,
    ) -> Result<bool, PolicyError> {
        let _guard = self.write_lock.lock().await;
        let mut policy = self.load_or_default(guild_id).await?;
        let removed = policy.bypass_role_ids.remove(&role_id);
        if removed {
            self.store.save(guild_id, policy).await?;
        }
        Ok(removed)
    }

    // Callers must hold `write_lock`.
    async fn load_or_default(&self, guild_id: u64) -> Result<GuildPolicy, PolicyError> {
        Ok(self.store.load(guild_id).await?.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashmap::DashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockStore {
        policies: DashMap<u64, GuildPolicy>,
        saves: AtomicUsize,
    }

    impl MockStore {
        fn new() -> Self {
            Self {
                policies: DashMap::new(),
                saves: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PolicyStore for MockStore {
        async fn load(&self, guild_id: u64) -> Result<Option<GuildPolicy>, StoreError> {
            Ok(self.policies.get(&guild_id).map(|entry| entry.clone()))
        }

        async fn save(&self, guild_id: u64, policy: GuildPolicy) -> Result<(), StoreError> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            self.policies.insert(guild_id, policy);
            Ok(())
        }
    }

    #[tokio::test]
    async fn get_materializes_and_persists_defaults_once() {
        let service = PolicyService::new(MockStore::new());

        let policy = service.get(123).await.unwrap();
        assert_eq!(policy, GuildPolicy::default());
        assert_eq!(service.store.saves.load(Ordering::SeqCst), 1);

        // Second read hits the stored document, no extra write.
        let again = service.get(123).await.unwrap();
        assert_eq!(again, policy);
        assert_eq!(service.store.saves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn set_feature_toggles_and_persists() {
        let service = PolicyService::new(MockStore::new());

        let updated = service
            .set_feature(9, ProtectFeature::AntiRaid, false)
            .await
            .unwrap();
        assert!(!updated.anti_raid);
        assert!(updated.anti_link);

        let stored = service.get(9).await.unwrap();
        assert!(!stored.anti_raid);
    }

    #[tokio::test]
    async fn link_whitelist_insert_is_idempotent() {
        let service = PolicyService::new(MockStore::new());

        assert!(service
            .add_link_whitelist(1, "test.com".to_string())
            .await
            .unwrap());
        assert!(!service
            .add_link_whitelist(1, "test.com".to_string())
            .await
            .unwrap());

        let policy = service.get(1).await.unwrap();
        assert!(policy.link_whitelist.contains("test.com"));
        assert_eq!(policy.link_whitelist.len(), 1);
    }

    #[tokio::test]
    async fn bypass_lists_add_and_remove() {
        let service = PolicyService::new(MockStore::new());

        assert!(service.add_bypass_user(1, 42).await.unwrap());
        assert!(!service.add_bypass_user(1, 42).await.unwrap());
        assert!(service.add_bypass_role(1, 7).await.unwrap());

        let policy = service.get(1).await.unwrap();
        assert!(policy.is_bypassed(42, &[]));
        assert!(policy.is_bypassed(0, &[7]));

        assert!(service.remove_bypass_user(1, 42).await.unwrap());
        assert!(!service.remove_bypass_user(1, 42).await.unwrap());
        assert!(service.remove_bypass_role(1, 7).await.unwrap());

        let policy = service.get(1).await.unwrap();
        assert!(!policy.is_bypassed(42, &[7]));
    }
}
