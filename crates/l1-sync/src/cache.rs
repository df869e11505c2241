use std::{collections::HashMap, hash::Hash, time::Duration};
use tokio::time::Instant;

/// A map whose entries expire after a fixed time to live. Expiry is checked on read and expired
/// entries are swept on every write, no background task is involved.
#[derive(Debug)]
pub(crate) struct TtlCache<K, V> {
    entries: HashMap<K, (V, Instant)>,
    ttl: Duration,
}

impl<K: Eq + Hash, V> TtlCache<K, V> {
    /// Returns a new [`TtlCache`] with the provided time to live.
    pub(crate) fn new(ttl: Duration) -> Self {
        Self { entries: HashMap::new(), ttl }
    }

    /// Returns the entry for the key if it did not expire.
    pub(crate) fn get(&self, key: &K) -> Option<&V> {
        let now = Instant::now();
        self.entries.get(key).filter(|(_, expiry)| *expiry > now).map(|(value, _)| value)
    }

    /// Inserts the entry, resetting its time to live.
    pub(crate) fn insert(&mut self, key: K, value: V) {
        self.sweep();
        self.entries.insert(key, (value, Instant::now() + self.ttl));
    }

    /// Removes the expired entries.
    pub(crate) fn sweep(&mut self) {
        let now = Instant::now();
        self.entries.retain(|_, (_, expiry)| *expiry > now);
    }

    /// Returns the count of entries, expired or not.
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        // Given
        let mut cache = TtlCache::new(Duration::from_secs(10));
        cache.insert(1, "a");

        // When
        tokio::time::advance(Duration::from_secs(5)).await;
        cache.insert(2, "b");

        // Then
        assert_eq!(cache.get(&1), Some(&"a"));
        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(cache.get(&1), None);
        assert_eq!(cache.get(&2), Some(&"b"));
        assert_eq!(cache.len(), 2);

        cache.insert(3, "c");
        assert_eq!(cache.len(), 2);
    }
}
