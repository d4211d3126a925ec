//! Read-through cache of each user's post list.
//!
//! Entries lapse after a fixed time to live, are dropped whenever the owner
//! adds or deletes a post, and are capped at a fixed number of users (the
//! oldest entry is evicted first). A single write counter keeps a list that
//! was read before any write from being stored after it.

use inkpost_common::model::{Id, post::Post, user::UserMarker};
use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

#[derive(Debug)]
pub struct PostsCache {
    ttl: Duration,
    capacity: usize,
    state: Mutex<CacheState>,
}

#[derive(Debug, Default)]
struct CacheState {
    writes: u64,
    entries: HashMap<Id<UserMarker>, Entry>,
}

#[derive(Debug)]
struct Entry {
    stored_at: Instant,
    posts: Vec<Post>,
}

/// Snapshot of the write counter, taken before reading from the store.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Generation(u64);

impl PostsCache {
    /// A zero `ttl` or `capacity` disables caching.
    #[must_use]
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity,
            state: Mutex::new(CacheState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        // No critical section can leave the state half-updated.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, user_id: Id<UserMarker>) -> Option<Vec<Post>> {
        let mut state = self.state();
        let entry = state.entries.get(&user_id)?;

        if entry.stored_at.elapsed() < self.ttl {
            Some(entry.posts.clone())
        } else {
            state.entries.remove(&user_id);
            None
        }
    }

    pub fn generation(&self) -> Generation {
        Generation(self.state().writes)
    }

    /// Stores `posts` unless some write happened since `generation` was taken.
    pub fn insert(&self, user_id: Id<UserMarker>, generation: Generation, posts: Vec<Post>) {
        if self.ttl.is_zero() || self.capacity == 0 {
            return;
        }

        let mut state = self.state();
        if state.writes != generation.0 {
            return;
        }

        let ttl = self.ttl;
        state
            .entries
            .retain(|_, entry| entry.stored_at.elapsed() < ttl);

        if state.entries.len() >= self.capacity && !state.entries.contains_key(&user_id) {
            let oldest = state
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.stored_at)
                .map(|(id, _)| *id);
            if let Some(oldest) = oldest {
                state.entries.remove(&oldest);
            }
        }

        state.entries.insert(
            user_id,
            Entry {
                stored_at: Instant::now(),
                posts,
            },
        );
    }

    pub fn invalidate(&self, user_id: Id<UserMarker>) {
        let mut state = self.state();
        state.writes += 1;
        state.entries.remove(&user_id);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.state().entries.len()
    }
}

#[cfg(test)]
mod tests {
    use crate::server::cache::PostsCache;
    use inkpost_common::model::{Id, post::Post};
    use std::{thread, time::Duration};

    fn post(id: i64, user_id: i64) -> Post {
        Post {
            id: Id::new(id),
            text: format!("post {id}"),
            user_id: Id::new(user_id),
        }
    }

    fn long_lived(capacity: usize) -> PostsCache {
        PostsCache::new(Duration::from_secs(300), capacity)
    }

    #[test]
    fn serves_inserted_lists_per_user() {
        let cache = long_lived(100);
        let alice = Id::new(1);
        let bob = Id::new(2);

        assert_eq!(cache.get(alice), None);

        cache.insert(alice, cache.generation(), vec![post(1, 1)]);

        assert_eq!(cache.get(alice), Some(vec![post(1, 1)]));
        assert_eq!(cache.get(bob), None);
    }

    #[test]
    fn invalidate_removes_the_entry() {
        let cache = long_lived(100);
        let alice = Id::new(1);

        cache.insert(alice, cache.generation(), vec![post(1, 1)]);
        cache.invalidate(alice);

        assert_eq!(cache.get(alice), None);
        assert_eq!(cache.len(), 0);

        // Writers that never read leave nothing behind either.
        cache.invalidate(Id::new(2));
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn read_started_before_a_write_is_not_stored() {
        let cache = long_lived(100);
        let alice = Id::new(1);

        let before_write = cache.generation();
        cache.invalidate(alice);
        cache.insert(alice, before_write, vec![post(1, 1)]);

        assert_eq!(cache.get(alice), None);

        cache.insert(alice, cache.generation(), vec![post(2, 1)]);
        assert_eq!(cache.get(alice), Some(vec![post(2, 1)]));
    }

    #[test]
    fn entries_lapse_after_ttl() {
        let cache = PostsCache::new(Duration::from_millis(20), 100);
        let alice = Id::new(1);

        cache.insert(alice, cache.generation(), vec![post(1, 1)]);
        thread::sleep(Duration::from_millis(40));

        assert_eq!(cache.get(alice), None);
    }

    #[test]
    fn expired_lists_are_purged_on_insert() {
        let cache = PostsCache::new(Duration::from_millis(20), 10_000);

        for user in 1..=1000 {
            cache.insert(Id::new(user), cache.generation(), vec![post(user, user)]);
        }
        assert_eq!(cache.len(), 1000);

        thread::sleep(Duration::from_millis(40));
        cache.insert(Id::new(5000), cache.generation(), Vec::new());

        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn capacity_evicts_the_oldest_entry() {
        let cache = long_lived(2);

        cache.insert(Id::new(1), cache.generation(), vec![post(1, 1)]);
        thread::sleep(Duration::from_millis(2));
        cache.insert(Id::new(2), cache.generation(), vec![post(2, 2)]);
        thread::sleep(Duration::from_millis(2));
        cache.insert(Id::new(3), cache.generation(), vec![post(3, 3)]);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(Id::new(1)), None);
        assert_eq!(cache.get(Id::new(3)), Some(vec![post(3, 3)]));

        // Refreshing a cached user does not evict anyone.
        cache.insert(Id::new(3), cache.generation(), Vec::new());
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(Id::new(2)), Some(vec![post(2, 2)]));
    }

    #[test]
    fn zero_ttl_or_capacity_disables_caching() {
        let alice = Id::new(1);

        for cache in [PostsCache::new(Duration::ZERO, 100), long_lived(0)] {
            cache.insert(alice, cache.generation(), vec![post(1, 1)]);

            assert_eq!(cache.get(alice), None);
        }
    }
}
