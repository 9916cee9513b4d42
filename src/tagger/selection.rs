//! TagSelectionStore - the operator's authoritative tag set
//!
//! Insertion-ordered. `NoTag` is exclusive: whenever it is present it is the
//! only member. Every mutating call bumps the revision and notifies observers
//! exactly once.

use crate::tagger::catalog::TagKey;

type Observer = Box<dyn FnMut(&[TagKey])>;

#[derive(Default)]
pub struct TagSelectionStore {
    keys: Vec<TagKey>,
    revision: u64,
    observers: Vec<Observer>,
}

impl std::fmt::Debug for TagSelectionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagSelectionStore")
            .field("keys", &self.keys)
            .field("revision", &self.revision)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl TagSelectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback run after every mutating call
    pub fn subscribe(&mut self, observer: impl FnMut(&[TagKey]) + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Remove `key` if present (unless `force_select`), otherwise add it.
    /// Returns whether `key` is selected afterwards.
    pub fn toggle(&mut self, key: &TagKey, force_select: bool) -> bool {
        let selected = if self.contains(key) && !force_select {
            self.keys.retain(|k| k != key);
            false
        } else {
            self.insert(key);
            true
        };
        self.changed();
        selected
    }

    pub fn select_no_tag(&mut self) {
        self.keys.clear();
        self.keys.push(TagKey::no_tag());
        self.changed();
    }

    pub fn clear(&mut self) {
        self.keys.clear();
        self.changed();
    }

    /// Add `key` only if absent. Never removes anything except a `NoTag`
    /// displaced by a real key. Returns whether the set changed.
    pub fn auto_assign(&mut self, key: &TagKey) -> bool {
        if self.contains(key) {
            return false;
        }
        self.insert(key);
        self.changed();
        true
    }

    /// Replace the contents with `keys`, applied in order. Later keys win when
    /// `NoTag` and real keys are mixed.
    pub fn restore(&mut self, keys: &[TagKey]) {
        self.keys.clear();
        for key in keys {
            if !self.contains(key) {
                self.insert(key);
            }
        }
        self.changed();
    }

    fn insert(&mut self, key: &TagKey) {
        if key.is_no_tag() {
            self.keys.clear();
            self.keys.push(TagKey::no_tag());
            return;
        }
        self.keys.retain(|k| !k.is_no_tag());
        if !self.keys.contains(key) {
            self.keys.push(key.clone());
        }
    }

    fn changed(&mut self) {
        self.revision += 1;
        for observer in &mut self.observers {
            observer(&self.keys);
        }
    }

    pub fn snapshot(&self) -> Vec<TagKey> {
        self.keys.clone()
    }

    pub fn keys(&self) -> &[TagKey] {
        &self.keys
    }

    pub fn contains(&self, key: &TagKey) -> bool {
        self.keys.contains(key)
    }

    pub fn is_no_tag(&self) -> bool {
        self.keys.first().map(TagKey::is_no_tag).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn keys(raw: &[&str]) -> Vec<TagKey> {
        raw.iter().map(|k| TagKey::new(k)).collect()
    }

    fn holds_invariant(store: &TagSelectionStore) -> bool {
        !store.contains(&TagKey::no_tag()) || store.len() == 1
    }

    #[test]
    fn test_select_no_tag_snapshot() {
        let mut store = TagSelectionStore::new();
        store.toggle(&TagKey::new("f1"), false);
        store.toggle(&TagKey::new("d3"), false);
        store.select_no_tag();
        assert_eq!(store.snapshot(), vec![TagKey::no_tag()]);
    }

    #[test]
    fn test_double_toggle_restores_membership() {
        let mut store = TagSelectionStore::new();
        store.toggle(&TagKey::new("f2"), false);
        let key = TagKey::new("d1");
        let before = store.contains(&key);
        assert!(store.toggle(&key, false));
        assert!(!store.toggle(&key, false));
        assert_eq!(store.contains(&key), before);
        assert_eq!(store.snapshot(), keys(&["f2"]));
    }

    #[test]
    fn test_force_select_keeps_existing() {
        let mut store = TagSelectionStore::new();
        let key = TagKey::new("f4");
        store.toggle(&key, false);
        assert!(store.toggle(&key, true));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_real_tag_displaces_no_tag() {
        let mut store = TagSelectionStore::new();
        store.select_no_tag();
        assert!(store.toggle(&TagKey::new("f7"), false));
        assert_eq!(store.snapshot(), keys(&["f7"]));
    }

    #[test]
    fn test_toggling_no_tag_key() {
        let mut store = TagSelectionStore::new();
        store.toggle(&TagKey::new("f1"), false);
        assert!(store.toggle(&TagKey::no_tag(), false));
        assert_eq!(store.snapshot(), vec![TagKey::no_tag()]);
        assert!(!store.toggle(&TagKey::no_tag(), false));
        assert!(store.is_empty());
    }

    #[test]
    fn test_auto_assign_only_adds() {
        let mut store = TagSelectionStore::new();
        let key = TagKey::new("d2");
        assert!(store.auto_assign(&key));
        let revision = store.revision();
        assert!(!store.auto_assign(&key));
        assert_eq!(store.revision(), revision);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_clear_empties_including_no_tag() {
        let mut store = TagSelectionStore::new();
        store.select_no_tag();
        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_restore_keeps_order_and_invariant() {
        let mut store = TagSelectionStore::new();
        store.restore(&keys(&["f1", "d2"]));
        assert_eq!(store.snapshot(), keys(&["f1", "d2"]));

        store.restore(&keys(&["f1", "no-tag"]));
        assert_eq!(store.snapshot(), vec![TagKey::no_tag()]);

        store.restore(&keys(&["no-tag", "f1", "f1"]));
        assert_eq!(store.snapshot(), keys(&["f1"]));
    }

    #[test]
    fn test_invariant_holds_over_mixed_operations() {
        let mut store = TagSelectionStore::new();
        let ops: [fn(&mut TagSelectionStore); 6] = [
            |s| {
                s.toggle(&TagKey::new("f1"), false);
            },
            |s| s.select_no_tag(),
            |s| {
                s.auto_assign(&TagKey::new("d5"));
            },
            |s| {
                s.toggle(&TagKey::no_tag(), true);
            },
            |s| {
                s.toggle(&TagKey::new("f3"), true);
            },
            |s| s.clear(),
        ];
        for round in 0..3 {
            for (i, op) in ops.iter().enumerate() {
                if (i + round) % 2 == 0 {
                    op(&mut store);
                }
                assert!(holds_invariant(&store));
            }
        }
    }

    #[test]
    fn test_observers_notified_once_per_call() {
        let calls: Rc<RefCell<Vec<Vec<TagKey>>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&calls);
        let mut store = TagSelectionStore::new();
        store.subscribe(move |keys| sink.borrow_mut().push(keys.to_vec()));

        store.toggle(&TagKey::new("f1"), false);
        store.select_no_tag();
        store.restore(&keys(&["f2", "d1"]));

        let calls = calls.borrow();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[2], keys(&["f2", "d1"]));
        assert_eq!(store.revision(), 3);
    }
}
