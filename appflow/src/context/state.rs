//! Pipeline-owned storage for stateful functions.
//!
//! Each stateful function gets one slot, addressed by the [`FunctionKey`]
//! assigned when its pipeline is built. A slot carries its own lock, so
//! concurrent runs of the same pipeline serialize on that function only.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Stable identity of a function inside a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionKey(Arc<str>);

impl FunctionKey {
    /// Builds the key for the function at `position` in `pipeline_id`.
    #[must_use]
    pub fn new(pipeline_id: &str, position: usize, function_name: &str) -> Self {
        Self(Arc::from(format!("{pipeline_id}/{position}/{function_name}")))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FunctionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Error raised when a slot holds a different type than requested.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("function state '{key}' holds a different type than '{expected}'")]
pub struct StateTypeError {
    /// The slot key.
    pub key: String,
    /// The requested type.
    pub expected: &'static str,
}

type Slot = Arc<Mutex<Box<dyn Any + Send>>>;

/// A concurrent map of per-function state slots.
#[derive(Default)]
pub struct FunctionStateStore {
    slots: DashMap<FunctionKey, Slot>,
}

impl FunctionStateStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &FunctionKey) -> Option<Slot> {
        self.slots.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Returns a clone of the value stored under `key`.
    ///
    /// Returns `None` if the slot is empty or holds another type.
    #[must_use]
    pub fn get<T: Clone + 'static>(&self, key: &FunctionKey) -> Option<T> {
        let slot = self.slot(key)?;
        let guard = slot.lock();
        guard.downcast_ref::<T>().cloned()
    }

    /// Replaces the value stored under `key`.
    pub fn set<T: Send + 'static>(&self, key: &FunctionKey, value: T) {
        match self.slot(key) {
            Some(slot) => *slot.lock() = Box::new(value),
            None => {
                self.slots
                    .insert(key.clone(), Arc::new(Mutex::new(Box::new(value))));
            }
        }
    }

    /// Runs `f` on the value under `key` while holding the slot lock.
    ///
    /// The slot is created with `T::default()` on first use. The whole
    /// closure is one critical section for that slot.
    pub fn with_state<T, R, F>(&self, key: &FunctionKey, f: F) -> Result<R, StateTypeError>
    where
        T: Default + Send + 'static,
        F: FnOnce(&mut T) -> R,
    {
        let slot = Arc::clone(
            self.slots
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(Box::new(T::default()))))
                .value(),
        );

        let mut guard = slot.lock();
        let state = guard.downcast_mut::<T>().ok_or_else(|| StateTypeError {
            key: key.to_string(),
            expected: std::any::type_name::<T>(),
        })?;
        Ok(f(state))
    }

    /// Removes the slot for `key`.
    pub fn remove(&self, key: &FunctionKey) -> bool {
        self.slots.remove(key).is_some()
    }

    /// Returns the number of slots in use.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if no function has stored state.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Drops all slots.
    pub fn clear(&self) {
        self.slots.clear();
    }
}

impl fmt::Debug for FunctionStateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<String> = self.slots.iter().map(|e| e.key().to_string()).collect();
        keys.sort();
        f.debug_struct("FunctionStateStore").field("keys", &keys).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn key() -> FunctionKey {
        FunctionKey::new("p1", 0, "Batch")
    }

    #[test]
    fn test_key_format() {
        assert_eq!(key().as_str(), "p1/0/Batch");
        assert_ne!(FunctionKey::new("p1", 1, "Batch"), key());
    }

    #[test]
    fn test_get_absent() {
        let store = FunctionStateStore::new();
        assert_eq!(store.get::<u32>(&key()), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_set_then_get() {
        let store = FunctionStateStore::new();
        store.set(&key(), vec![1u8, 2]);
        assert_eq!(store.get::<Vec<u8>>(&key()), Some(vec![1, 2]));
        store.set(&key(), vec![3u8]);
        assert_eq!(store.get::<Vec<u8>>(&key()), Some(vec![3]));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_with_state_creates_default() {
        let store = FunctionStateStore::new();
        let len = store
            .with_state(&key(), |items: &mut Vec<u32>| {
                items.push(7);
                items.len()
            })
            .unwrap();
        assert_eq!(len, 1);
        assert_eq!(store.get::<Vec<u32>>(&key()), Some(vec![7]));
    }

    #[test]
    fn test_with_state_type_mismatch() {
        let store = FunctionStateStore::new();
        store.set(&key(), "text".to_string());
        let err = store.with_state(&key(), |n: &mut u64| *n += 1).unwrap_err();
        assert_eq!(err.key, "p1/0/Batch");
    }

    #[test]
    fn test_with_state_is_mutually_exclusive() {
        let store = Arc::new(FunctionStateStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        store.with_state(&key(), |n: &mut u64| *n += 1).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.get::<u64>(&key()), Some(8000));
    }

    #[test]
    fn test_remove_and_clear() {
        let store = FunctionStateStore::new();
        store.set(&key(), 1u8);
        assert!(store.remove(&key()));
        assert!(!store.remove(&key()));
        store.set(&key(), 1u8);
        store.clear();
        assert!(store.is_empty());
    }
}
