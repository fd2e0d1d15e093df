//! Module tracking changes between successive snapshots of simulator state.
//!
//! The key type here is [`ChangeTracker`], which holds the last known value of every key
//! and the keys currently marked as changed. Calling [`ChangeTracker::refresh`] with a fresh
//! snapshot produces a [`Delta`]: the values which changed, and the keys which were marked
//! as changed before but did not change this time (and therefore must be visually reset).
//!
//! One tracker is created for the register file and one for each open memory window.
//!
//! ```
//! use bass_debugger::sim::observer::ChangeTracker;
//!
//! let mut tracker = ChangeTracker::with_baseline([("r0", 0), ("r1", 0)]);
//!
//! let delta = tracker.refresh([("r0", 5), ("r1", 0)]);
//! assert_eq!(delta.changed.get("r0"), Some(&5));
//! assert!(delta.unflagged.is_empty());
//!
//! let delta = tracker.refresh([("r0", 5), ("r1", 0)]);
//! assert!(delta.changed.is_empty());
//! assert!(delta.unflagged.contains("r0"));
//! ```

use std::collections::{BTreeMap, BTreeSet};

/// The result of a [`ChangeTracker::refresh`].
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Delta<K, V> {
    /// The keys whose value differs from the last known value, with their new value.
    pub changed: BTreeMap<K, V>,
    /// The keys marked as changed by the previous refresh which did not change this time.
    pub unflagged: BTreeSet<K>,
}
impl<K, V> Delta<K, V> {
    /// Whether nothing has to be redrawn.
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.unflagged.is_empty()
    }
}
impl<K, V> Default for Delta<K, V> {
    fn default() -> Self {
        Self { changed: BTreeMap::new(), unflagged: BTreeSet::new() }
    }
}

/// A struct that tracks changes of a keyed collection.
#[derive(Debug, Clone)]
pub struct ChangeTracker<K, V> {
    previous: BTreeMap<K, V>,
    flagged: BTreeSet<K>
}
impl<K: Ord + Clone, V: PartialEq + Clone> ChangeTracker<K, V> {
    /// Creates a new tracker with no known values.
    pub fn new() -> Self {
        Self { previous: BTreeMap::new(), flagged: BTreeSet::new() }
    }

    /// Creates a tracker which already knows the given values.
    ///
    /// Nothing is flagged, so the first [`ChangeTracker::refresh`]
    /// only reports keys which differ from these values.
    pub fn with_baseline(baseline: impl IntoIterator<Item=(K, V)>) -> Self {
        Self { previous: baseline.into_iter().collect(), flagged: BTreeSet::new() }
    }

    /// Compares the snapshot against the last known values.
    ///
    /// A key absent from the last known values is reported as changed.
    /// Keys absent from the snapshot are left as they are.
    pub fn refresh(&mut self, current: impl IntoIterator<Item=(K, V)>) -> Delta<K, V> {
        let mut changed = BTreeMap::new();
        for (k, v) in current {
            match self.previous.get_mut(&k) {
                Some(old) if *old == v => {},
                Some(old) => {
                    *old = v.clone();
                    changed.insert(k, v);
                },
                None => {
                    self.previous.insert(k.clone(), v.clone());
                    changed.insert(k, v);
                }
            }
        }

        let newly_flagged: BTreeSet<K> = changed.keys().cloned().collect();
        let unflagged = self.flagged.difference(&newly_flagged).cloned().collect();
        self.flagged = newly_flagged;

        Delta { changed, unflagged }
    }

    /// Gets the last known value of a key.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.previous.get(key)
    }

    /// The keys currently marked as changed.
    pub fn flagged(&self) -> &BTreeSet<K> {
        &self.flagged
    }

    /// Removes every mark without forgetting the values.
    ///
    /// This returns the keys which were marked.
    pub fn take_flagged(&mut self) -> BTreeSet<K> {
        std::mem::take(&mut self.flagged)
    }

    /// Forgets all values and marks.
    pub fn clear(&mut self) {
        self.previous.clear();
        self.flagged.clear();
    }
}
impl<K: Ord + Clone, V: PartialEq + Clone> Default for ChangeTracker<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::ChangeTracker;

    #[test]
    fn test_first_refresh_with_baseline() {
        let mut tracker = ChangeTracker::with_baseline([(0, 1), (1, 2)]);
        let delta = tracker.refresh([(0, 1), (1, 3)]);
        assert_eq!(delta.changed, BTreeMap::from([(1, 3)]));
        assert!(delta.unflagged.is_empty());
    }

    #[test]
    fn test_unflagged() {
        let mut tracker = ChangeTracker::new();
        tracker.refresh([(0, 0), (1, 0), (2, 0)]);

        let delta = tracker.refresh([(0, 1), (1, 1), (2, 0)]);
        assert_eq!(delta.changed, BTreeMap::from([(0, 1), (1, 1)]));

        // 0 changes again, 1 does not
        let delta = tracker.refresh([(0, 2), (1, 1), (2, 0)]);
        assert_eq!(delta.changed, BTreeMap::from([(0, 2)]));
        assert_eq!(delta.unflagged, BTreeSet::from([1]));
        assert_eq!(tracker.flagged(), &BTreeSet::from([0]));
    }

    #[test]
    fn test_idempotent() {
        let mut tracker = ChangeTracker::new();
        tracker.refresh([("a", 1), ("b", 2)]);
        let delta = tracker.refresh([("a", 3), ("b", 4)]);
        let flagged = tracker.flagged().clone();
        assert_eq!(flagged.len(), 2);
        assert!(!delta.is_empty());

        let delta = tracker.refresh([("a", 3), ("b", 4)]);
        assert!(delta.changed.is_empty());
        assert_eq!(delta.unflagged, flagged);

        let delta = tracker.refresh([("a", 3), ("b", 4)]);
        assert!(delta.is_empty());
    }

    #[test]
    fn test_random_snapshots() {
        const KEYS: u32 = 16;
        let mut rng = StdRng::seed_from_u64(0x2110);
        let mut prev: BTreeMap<u32, u8> = (0..KEYS).map(|k| (k, 0)).collect();
        let mut prev_changed = BTreeSet::new();
        let mut tracker = ChangeTracker::with_baseline(prev.clone());

        for _ in 0..200 {
            // change each key with probability 1/4 (values are small to get repeats)
            let snap: BTreeMap<u32, u8> = prev.iter()
                .map(|(&k, &v)| (k, if rng.gen_ratio(1, 4) { rng.gen_range(0..4) } else { v }))
                .collect();

            let delta = tracker.refresh(snap.clone());

            let expected_changed: BTreeMap<u32, u8> = snap.iter()
                .filter(|&(k, v)| prev[k] != *v)
                .map(|(&k, &v)| (k, v))
                .collect();
            let changed_keys: BTreeSet<u32> = expected_changed.keys().copied().collect();
            let expected_unflagged: BTreeSet<u32> = prev_changed.difference(&changed_keys).copied().collect();

            assert_eq!(delta.changed, expected_changed);
            assert_eq!(delta.unflagged, expected_unflagged);

            prev = snap;
            prev_changed = changed_keys;
        }
    }

    #[test]
    fn test_clear() {
        let mut tracker = ChangeTracker::new();
        tracker.refresh([(0, 'a')]);
        tracker.refresh([(0, 'b')]);
        assert_eq!(tracker.take_flagged(), BTreeSet::from([0]));
        assert!(tracker.flagged().is_empty());
        assert_eq!(tracker.get(&0), Some(&'b'));

        tracker.clear();
        assert_eq!(tracker.get(&0), None);
    }
}
