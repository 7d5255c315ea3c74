//! Per-user permission cache with a short TTL.

use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use moka::sync::Cache;
use uuid::Uuid;

use super::PermissionSet;

const MAX_CACHED_USERS: u64 = 10_000;

#[derive(Clone)]
pub struct PermissionCache {
    inner: Cache<Uuid, Arc<PermissionSet>>,
    /// Bumped on every invalidation; a load that straddles one is not cached.
    generation: Arc<AtomicU64>,
}

impl PermissionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(MAX_CACHED_USERS)
                .time_to_live(ttl)
                .build(),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn get(&self, user_id: Uuid) -> Option<Arc<PermissionSet>> {
        self.inner.get(&user_id)
    }

    pub fn insert(&self, user_id: Uuid, set: PermissionSet) -> Arc<PermissionSet> {
        let set = Arc::new(set);
        self.inner.insert(user_id, set.clone());
        set
    }

    /// Returns the cached set, or runs `load` and caches its result.
    /// Load errors are returned as-is and nothing is cached. A result whose
    /// load overlapped an invalidation is returned but not cached.
    pub async fn get_or_load<F, Fut, E>(
        &self,
        user_id: Uuid,
        load: F,
    ) -> Result<Arc<PermissionSet>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<PermissionSet, E>>,
    {
        if let Some(hit) = self.get(user_id) {
            return Ok(hit);
        }
        tracing::debug!(%user_id, "permission cache miss");
        let started = self.generation.load(Ordering::Acquire);
        let set = load().await?;
        if self.generation.load(Ordering::Acquire) != started {
            tracing::debug!(%user_id, "permissions changed during load, not caching");
            return Ok(Arc::new(set));
        }
        Ok(self.insert(user_id, set))
    }

    pub fn invalidate(&self, user_id: Uuid) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.inner.invalidate(&user_id);
    }

    pub fn invalidate_all(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.inner.invalidate_all();
    }
}

impl Default for PermissionCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn set(keys: &[&str]) -> PermissionSet {
        keys.iter().copied().collect()
    }

    #[tokio::test]
    async fn loads_once_then_serves_from_cache() {
        let cache = PermissionCache::default();
        let user = Uuid::new_v4();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let perms = cache
                .get_or_load(user, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ()>(set(&["product:update"]))
                })
                .await
                .unwrap();
            assert!(perms.contains("product:update"));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_load_is_not_cached() {
        let cache = PermissionCache::default();
        let user = Uuid::new_v4();

        let err = cache
            .get_or_load(user, || async { Err::<PermissionSet, _>("db down") })
            .await;
        assert!(err.is_err());
        assert!(cache.get(user).is_none());
    }

    #[tokio::test]
    async fn load_overlapping_an_invalidation_is_not_cached() {
        let cache = PermissionCache::default();
        let user = Uuid::new_v4();

        let perms = cache
            .get_or_load(user, || async {
                // A role change lands while the old grants are being read.
                cache.invalidate(user);
                Ok::<_, ()>(set(&["role:manage"]))
            })
            .await
            .unwrap();
        assert!(perms.contains("role:manage"));
        assert!(cache.get(user).is_none());

        let perms = cache
            .get_or_load(user, || async {
                cache.invalidate_all();
                Ok::<_, ()>(set(&["user:manage"]))
            })
            .await
            .unwrap();
        assert!(perms.contains("user:manage"));
        assert!(cache.get(user).is_none());

        cache
            .get_or_load(user, || async { Ok::<_, ()>(set(&["order:read"])) })
            .await
            .unwrap();
        assert!(cache.get(user).is_some());
    }

    #[test]
    fn invalidating_one_user_keeps_the_others() {
        let cache = PermissionCache::default();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        cache.insert(alice, set(&["order:read"]));
        cache.insert(bob, set(&["order:update"]));

        cache.invalidate(alice);

        assert!(cache.get(alice).is_none());
        let bob_perms = cache.get(bob).expect("bob stays cached");
        assert!(bob_perms.contains("order:update"));
    }

    #[test]
    fn invalidate_all_clears_every_entry() {
        let cache = PermissionCache::default();
        let users: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
        for user in &users {
            cache.insert(*user, set(&["metrics:read"]));
        }

        cache.invalidate_all();

        assert!(users.iter().all(|u| cache.get(*u).is_none()));
    }

    #[test]
    fn entries_expire_after_ttl() {
        let cache = PermissionCache::new(Duration::from_millis(50));
        let user = Uuid::new_v4();
        cache.insert(user, set(&["audit:read"]));
        assert!(cache.get(user).is_some());

        std::thread::sleep(Duration::from_millis(120));
        assert!(cache.get(user).is_none());
    }
}
