//! Read-only composition of two key-value mappings.
//!
//! A [`Layered`] view answers lookups from its overlay first and falls through to its underlay,
//! without copying or mutating either. The [TLS-SNI-01 responder][crate::responder::tls] uses it
//! to lay its indicator certificates over a server's existing host table: the server keeps
//! resolving SNI names through a [`Mapping`], unaware that some names are challenge traffic.

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::Hash;
use std::sync::Arc;

/// A read-only key-value lookup.
///
/// Values are handed out by clone. Mappings of [`Arc`] values therefore preserve identity:
/// the value returned by [`get`][Mapping::get] is the stored allocation.
pub trait Mapping {
    type Key: Eq + Hash + Clone;
    type Value;

    /// The value stored for `key`, if any.
    fn get(&self, key: &Self::Key) -> Option<Self::Value>;

    /// The keys present at the time of the call, each exactly once.
    fn keys(&self) -> Vec<Self::Key>;

    fn contains_key(&self, key: &Self::Key) -> bool {
        self.get(key).is_some()
    }

    fn len(&self) -> usize {
        self.keys().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> Mapping for HashMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    type Key = K;
    type Value = V;

    fn get(&self, key: &K) -> Option<V> {
        HashMap::get(self, key).cloned()
    }

    fn keys(&self) -> Vec<K> {
        HashMap::keys(self).cloned().collect()
    }
}

impl<K, V> Mapping for BTreeMap<K, V>
where
    K: Ord + Eq + Hash + Clone,
    V: Clone,
{
    type Key = K;
    type Value = V;

    fn get(&self, key: &K) -> Option<V> {
        BTreeMap::get(self, key).cloned()
    }

    fn keys(&self) -> Vec<K> {
        BTreeMap::keys(self).cloned().collect()
    }
}

impl<M: Mapping> Mapping for RwLock<M> {
    type Key = M::Key;
    type Value = M::Value;

    fn get(&self, key: &Self::Key) -> Option<Self::Value> {
        self.read().get(key)
    }

    fn keys(&self) -> Vec<Self::Key> {
        self.read().keys()
    }
}

impl<M: Mapping + ?Sized> Mapping for Arc<M> {
    type Key = M::Key;
    type Value = M::Value;

    fn get(&self, key: &Self::Key) -> Option<Self::Value> {
        (**self).get(key)
    }

    fn keys(&self) -> Vec<Self::Key> {
        (**self).keys()
    }
}

impl<M: Mapping + ?Sized> Mapping for &M {
    type Key = M::Key;
    type Value = M::Value;

    fn get(&self, key: &Self::Key) -> Option<Self::Value> {
        (**self).get(key)
    }

    fn keys(&self) -> Vec<Self::Key> {
        (**self).keys()
    }
}

/// Merges `overlay` and `underlay` into one mapping where the overlay wins.
///
/// A view, not a snapshot: every lookup and every iteration pass reads the current state of
/// both sides.
#[derive(Debug, Clone)]
pub struct Layered<O, U> {
    overlay: O,
    underlay: U,
}

impl<O, U> Layered<O, U>
where
    O: Mapping,
    U: Mapping<Key = O::Key, Value = O::Value>,
{
    pub fn new(overlay: O, underlay: U) -> Self {
        Self { overlay, underlay }
    }

    pub fn overlay(&self) -> &O {
        &self.overlay
    }

    pub fn underlay(&self) -> &U {
        &self.underlay
    }

    /// Keys present on either side, each yielded once: overlay keys first, then the underlay
    /// keys the overlay doesn't shadow.
    ///
    /// Both sides' keys are read when `iter` is called, so a pass is a snapshot of that moment.
    /// Later changes show up in the next pass, not in one already in progress.
    pub fn iter(&self) -> impl Iterator<Item = O::Key> + '_ {
        let overlay_keys = self.overlay.keys();
        let shadowed: HashSet<O::Key> = overlay_keys.iter().cloned().collect();
        overlay_keys.into_iter().chain(
            self.underlay
                .keys()
                .into_iter()
                .filter(move |key| !shadowed.contains(key)),
        )
    }
}

impl<O, U> Mapping for Layered<O, U>
where
    O: Mapping,
    U: Mapping<Key = O::Key, Value = O::Value>,
{
    type Key = O::Key;
    type Value = O::Value;

    fn get(&self, key: &Self::Key) -> Option<Self::Value> {
        self.overlay.get(key).or_else(|| self.underlay.get(key))
    }

    fn keys(&self) -> Vec<Self::Key> {
        self.iter().collect()
    }

    fn len(&self) -> usize {
        self.iter().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    type Table = HashMap<String, Arc<u32>>;

    fn tables() -> impl Strategy<Value = Table> {
        proptest::collection::hash_map("[a-c]{0,3}", any::<u32>().prop_map(Arc::new), 0..12)
    }

    proptest! {
        #[test]
        fn get_overlay(mut underlay in tables(), mut overlay in tables(), key in "[a-c]{0,3}") {
            underlay.remove(&key);
            overlay.insert(key.clone(), Arc::new(0));
            let view = Layered::new(&overlay, &underlay);
            prop_assert!(Arc::ptr_eq(&view.get(&key).unwrap(), &overlay[&key]));
        }

        #[test]
        fn get_underlay(mut underlay in tables(), mut overlay in tables(), key in "[a-c]{0,3}") {
            underlay.insert(key.clone(), Arc::new(0));
            overlay.remove(&key);
            let view = Layered::new(&overlay, &underlay);
            prop_assert!(Arc::ptr_eq(&view.get(&key).unwrap(), &underlay[&key]));
        }

        #[test]
        fn get_both(mut underlay in tables(), mut overlay in tables(), key in "[a-c]{0,3}") {
            underlay.insert(key.clone(), Arc::new(0));
            overlay.insert(key.clone(), Arc::new(0));
            let view = Layered::new(&overlay, &underlay);
            let value = view.get(&key).unwrap();
            prop_assert!(!Arc::ptr_eq(&value, &underlay[&key]));
            prop_assert!(Arc::ptr_eq(&value, &overlay[&key]));
        }

        #[test]
        fn len_does_not_count_duplicates(underlay in tables(), overlay in tables()) {
            let view = Layered::new(&overlay, &underlay);
            let distinct: HashSet<String> = view.iter().collect();
            prop_assert_eq!(view.len(), distinct.len());
            prop_assert_eq!(view.len(), view.iter().count());
        }

        #[test]
        fn iter_does_not_yield_duplicates(underlay in tables(), overlay in tables()) {
            let view = Layered::new(&overlay, &underlay);
            let mut keys: Vec<String> = view.iter().collect();
            let total = keys.len();
            keys.sort();
            keys.dedup();
            prop_assert_eq!(keys.len(), total);
            let expected: HashSet<&String> = overlay.keys().chain(underlay.keys()).collect();
            prop_assert_eq!(keys.len(), expected.len());
        }

        #[test]
        fn contains_iff_gettable(underlay in tables(), overlay in tables(), key in "[a-c]{0,3}") {
            let view = Layered::new(&overlay, &underlay);
            prop_assert_eq!(view.contains_key(&key), view.get(&key).is_some());
        }
    }

    #[test]
    fn merged_example() {
        let underlay: Table = [("foo", 1), ("bar", 2)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), Arc::new(v)))
            .collect();
        let overlay: Table = [("bar", 3), ("baz", 4)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), Arc::new(v)))
            .collect();
        let view = Layered::new(&overlay, &underlay);
        assert_eq!(view.len(), 3);
        assert_eq!(*view.get(&"bar".to_string()).unwrap(), 3);
        assert_eq!(*view.get(&"foo".to_string()).unwrap(), 1);
        assert!(!view.contains_key(&"qux".to_string()));
    }

    #[test]
    fn view_tracks_shared_overlay() {
        let overlay: Arc<RwLock<Table>> = Arc::default();
        let underlay: BTreeMap<String, Arc<u32>> =
            BTreeMap::from([("base".to_string(), Arc::new(1))]);
        let view = Layered::new(overlay.clone(), underlay);
        assert_eq!(view.keys(), vec!["base".to_string()]);

        overlay.write().insert("extra".to_string(), Arc::new(2));
        assert_eq!(view.len(), 2);
        assert_eq!(*view.get(&"extra".to_string()).unwrap(), 2);

        overlay.write().remove("extra");
        assert_eq!(view.len(), 1);
        assert!(!view.contains_key(&"extra".to_string()));
    }

    #[test]
    fn each_pass_reads_current_state() {
        let overlay: Arc<RwLock<Table>> = Arc::default();
        let underlay = Table::from([("base".to_string(), Arc::new(1))]);
        let view = Layered::new(overlay.clone(), &underlay);

        let before = view.iter();
        overlay.write().insert("extra".to_string(), Arc::new(2));
        assert_eq!(before.collect::<Vec<_>>(), vec!["base".to_string()]);

        let mut after: Vec<_> = view.iter().collect();
        after.sort();
        assert_eq!(after, vec!["base".to_string(), "extra".to_string()]);
    }

    #[test]
    fn views_nest() {
        let inner = Layered::new(
            HashMap::from([(1, "a")]),
            HashMap::from([(1, "b"), (2, "c")]),
        );
        let outer = Layered::new(HashMap::from([(2, "d")]), inner);
        assert_eq!(outer.get(&1), Some("a"));
        assert_eq!(outer.get(&2), Some("d"));
        assert_eq!(outer.len(), 2);
    }
}
