use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use super::state::SessionState;

pub struct SessionEntry {
    pub state: SessionState,
    pub last_touched: Instant,
}

pub type SessionHandle = Arc<Mutex<SessionEntry>>;

/// Session states keyed by candidate id.
///
/// The map is split into shards so unrelated sessions rarely share a lock,
/// and every session has its own async mutex that serializes its frames.
/// Shard locks are only held for map lookups, never across an await.
pub struct SessionStore {
    shards: Vec<StdMutex<HashMap<String, SessionHandle>>>,
}

impl SessionStore {
    pub fn new(shard_count: usize) -> Self {
        let shard_count = shard_count.max(1);
        Self {
            shards: (0..shard_count)
                .map(|_| StdMutex::new(HashMap::new()))
                .collect(),
        }
    }

    fn shard(&self, candidate_id: &str) -> MutexGuard<'_, HashMap<String, SessionHandle>> {
        let mut hasher = DefaultHasher::new();
        candidate_id.hash(&mut hasher);
        let index = (hasher.finish() % self.shards.len() as u64) as usize;
        match self.shards[index].lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Handle to the candidate's session, creating fresh state if none exists.
    pub fn checkout(&self, candidate_id: &str, now: Instant) -> SessionHandle {
        let mut shard = self.shard(candidate_id);
        shard
            .entry(candidate_id.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(SessionEntry {
                    state: SessionState::new(candidate_id, now),
                    last_touched: now,
                }))
            })
            .clone()
    }

    pub fn get(&self, candidate_id: &str) -> Option<SessionHandle> {
        self.shard(candidate_id).get(candidate_id).cloned()
    }

    pub fn remove(&self, candidate_id: &str) -> bool {
        self.shard(candidate_id).remove(candidate_id).is_some()
    }

    pub fn contains(&self, candidate_id: &str) -> bool {
        self.shard(candidate_id).contains_key(candidate_id)
    }

    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| match shard.lock() {
                Ok(guard) => guard.len(),
                Err(poisoned) => poisoned.into_inner().len(),
            })
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop sessions untouched for longer than `ttl`. Sessions whose lock is
    /// held by an in-flight frame are skipped. Returns the evicted ids.
    pub fn evict_idle(&self, now: Instant, ttl: Duration) -> Vec<String> {
        let mut evicted = Vec::new();
        for shard in &self.shards {
            let mut guard = match shard.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard.retain(|candidate_id, handle| {
                let Ok(entry) = handle.try_lock() else {
                    return true;
                };
                let expired = now.saturating_duration_since(entry.last_touched) > ttl;
                if expired {
                    evicted.push(candidate_id.clone());
                }
                !expired
            });
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn checkout_reuses_existing_session() {
        let store = SessionStore::new(4);
        let t0 = Instant::now();

        let first = store.checkout("cand-a", t0);
        first.lock().await.state.consecutive_missing_faces = 2;

        let again = store.checkout("cand-a", t0 + Duration::from_secs(1));
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(again.lock().await.state.consecutive_missing_faces, 2);

        store.checkout("cand-b", t0);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn evicts_only_expired_and_unlocked_sessions() {
        let store = SessionStore::new(2);
        let t0 = Instant::now();
        let ttl = Duration::from_secs(60);

        store.checkout("stale", t0);
        let busy = store.checkout("busy", t0);
        let fresh = store.checkout("fresh", t0);
        fresh.lock().await.last_touched = t0 + Duration::from_secs(100);

        let guard = busy.lock().await;
        let mut evicted = store.evict_idle(t0 + Duration::from_secs(120), ttl);
        evicted.sort();
        assert_eq!(evicted, vec!["stale".to_string()]);
        assert!(store.contains("busy"));
        assert!(store.contains("fresh"));
        drop(guard);

        let evicted = store.evict_idle(t0 + Duration::from_secs(120), ttl);
        assert_eq!(evicted, vec!["busy".to_string()]);
    }

    #[tokio::test]
    async fn evicted_session_is_recreated_fresh() {
        let store = SessionStore::new(1);
        let t0 = Instant::now();

        store.checkout("cand", t0).lock().await.state.consecutive_no_lip_frames = 3;
        assert!(store.remove("cand"));

        let recreated = store.checkout("cand", t0 + Duration::from_secs(5));
        assert_eq!(recreated.lock().await.state.consecutive_no_lip_frames, 0);
    }
}
