//! Executor-local storage behind the `set` and `get` template functions.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::value::{Key, Value};

/// Key/value store owned by one executor and shared by every render it
/// runs. Clones share the same store.
#[derive(Clone, Default)]
pub struct LocalData(Arc<Mutex<BTreeMap<Key, Value>>>);

impl LocalData {
    pub fn new() -> Self {
        LocalData::default()
    }

    pub fn set(&self, key: Key, value: Value) {
        self.0.lock().insert(key, value);
    }

    pub fn get(&self, key: &Key) -> Option<Value> {
        self.0.lock().get(key).cloned()
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.0.lock().contains_key(key)
    }

    pub fn merge<I: IntoIterator<Item = (Key, Value)>>(&self, entries: I) {
        self.0.lock().extend(entries);
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    /// Copy of the whole store as a map value.
    pub fn to_value(&self) -> Value {
        Value::map(self.0.lock().clone())
    }
}

impl fmt::Debug for LocalData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.0.lock().iter()).finish()
    }
}
