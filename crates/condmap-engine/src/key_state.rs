//! Held-key bookkeeping
//!
//! Two views are tracked: keys the user physically holds on the input device,
//! and keys the engine currently reports as held on its output ("virtual").
//! Conditions look at the union of both.

use std::collections::{HashMap, HashSet};

use crate::key::Key;

#[derive(Debug, Clone, Default)]
pub struct KeyState {
    physical: HashSet<Key>,
    /// Output key -> number of pinned decisions currently holding it
    virtual_held: HashMap<Key, u32>,
}

impl KeyState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `key` is held physically or by remap output
    pub fn is_held(&self, key: Key) -> bool {
        self.physical.contains(&key) || self.virtual_held.contains_key(&key)
    }

    pub fn is_physically_held(&self, key: Key) -> bool {
        self.physical.contains(&key)
    }

    pub fn is_virtually_held(&self, key: Key) -> bool {
        self.virtual_held.contains_key(&key)
    }

    /// Record a physical press or release
    pub fn set_held(&mut self, key: Key, held: bool) {
        if held {
            self.physical.insert(key);
        } else {
            self.physical.remove(&key);
        }
    }

    /// Add one virtual hold of `key`; returns true if nothing held it before
    pub fn hold_virtual(&mut self, key: Key) -> bool {
        let count = self.virtual_held.entry(key).or_insert(0);
        *count += 1;
        *count == 1
    }

    /// Drop one virtual hold of `key`; returns true once nothing holds it anymore
    pub fn release_virtual(&mut self, key: Key) -> bool {
        match self.virtual_held.get_mut(&key) {
            Some(count) if *count > 1 => {
                *count -= 1;
                false
            }
            Some(_) => {
                self.virtual_held.remove(&key);
                true
            }
            None => true,
        }
    }

    /// Snapshot of every held key, physical or virtual
    pub fn held_set(&self) -> HashSet<Key> {
        self.physical
            .iter()
            .chain(self.virtual_held.keys())
            .copied()
            .collect()
    }

    pub fn physical_keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.physical.iter().copied()
    }

    pub fn virtual_keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.virtual_held.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.physical.is_empty() && self.virtual_held.is_empty()
    }

    pub fn clear(&mut self) {
        self.physical.clear();
        self.virtual_held.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_empty() {
        let state = KeyState::new();
        assert!(state.is_empty());
        assert!(!state.is_held(Key::KEY_A));
        assert!(state.held_set().is_empty());
    }

    #[test]
    fn test_physical_hold_and_release() {
        let mut state = KeyState::new();
        state.set_held(Key::KEY_LEFTCTRL, true);
        assert!(state.is_held(Key::KEY_LEFTCTRL));
        assert!(state.is_physically_held(Key::KEY_LEFTCTRL));
        assert!(!state.is_virtually_held(Key::KEY_LEFTCTRL));

        state.set_held(Key::KEY_LEFTCTRL, false);
        assert!(!state.is_held(Key::KEY_LEFTCTRL));
    }

    #[test]
    fn test_set_held_is_idempotent() {
        let mut state = KeyState::new();
        state.set_held(Key::KEY_A, true);
        state.set_held(Key::KEY_A, true);
        state.set_held(Key::KEY_A, false);
        assert!(!state.is_held(Key::KEY_A));

        // Releasing an unknown key is fine
        state.set_held(Key::KEY_B, false);
        assert!(state.is_empty());
    }

    #[test]
    fn test_virtual_holds_are_counted() {
        let mut state = KeyState::new();
        assert!(state.hold_virtual(Key::KEY_LEFTCTRL));
        assert!(!state.hold_virtual(Key::KEY_LEFTCTRL));

        assert!(!state.release_virtual(Key::KEY_LEFTCTRL));
        assert!(state.is_virtually_held(Key::KEY_LEFTCTRL));

        assert!(state.release_virtual(Key::KEY_LEFTCTRL));
        assert!(!state.is_held(Key::KEY_LEFTCTRL));

        assert!(state.release_virtual(Key::KEY_LEFTCTRL));
    }

    #[test]
    fn test_held_set_is_union() {
        let mut state = KeyState::new();
        state.set_held(Key::KEY_LEFTMETA, true);
        state.hold_virtual(Key::KEY_LEFTCTRL);
        state.hold_virtual(Key::KEY_LEFTMETA);

        let held = state.held_set();
        assert_eq!(held.len(), 2);
        assert!(held.contains(&Key::KEY_LEFTMETA));
        assert!(held.contains(&Key::KEY_LEFTCTRL));
    }

    #[test]
    fn test_clear() {
        let mut state = KeyState::new();
        state.set_held(Key::KEY_A, true);
        state.hold_virtual(Key::KEY_B);
        state.clear();
        assert!(state.is_empty());
    }
}
