//! State management for virtual objects.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::object::ObjectId;

/// A typed state value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum StateValue {
    /// Null/absent value.
    Null,
    /// Boolean value.
    Boolean(bool),
    /// Integer value.
    Integer(i64),
    /// Float value.
    Float(f64),
    /// String value.
    String(String),
    /// Binary data.
    Bytes(Vec<u8>),
    /// JSON value.
    Json(serde_json::Value),
    /// List of values.
    List(Vec<StateValue>),
}

impl StateValue {
    /// Check if the value is null.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Try to get as boolean.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as integer.
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as float.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Try to get as string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Check that every float in the value, at any depth, is finite.
    ///
    /// Non-finite floats cannot be encoded into a snapshot blob.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        match self {
            Self::Float(v) => v.is_finite(),
            Self::List(values) => values.iter().all(Self::is_finite),
            _ => true,
        }
    }

    /// Convert to a plain JSON value.
    ///
    /// Non-finite floats have no JSON representation and become `null`.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Boolean(v) => serde_json::Value::Bool(*v),
            Self::Integer(v) => serde_json::Value::from(*v),
            Self::Float(v) => serde_json::Number::from_f64(*v)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::String(v) => serde_json::Value::String(v.clone()),
            Self::Bytes(v) => serde_json::Value::from(v.clone()),
            Self::Json(v) => v.clone(),
            Self::List(values) => {
                serde_json::Value::Array(values.iter().map(Self::to_json).collect())
            }
        }
    }
}

impl From<bool> for StateValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for StateValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for StateValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for StateValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<String> for StateValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for StateValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<Vec<u8>> for StateValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<serde_json::Value> for StateValue {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

/// A snapshot of an object's domain state.
///
/// This is the externalized blob handed to the blob writer on eviction and
/// returned by the blob reader on rehydration. It never carries the offload
/// record (last access, offload pointer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Object the state belongs to
    pub object_id: ObjectId,
    /// Every domain key and value as of the snapshot
    pub state: HashMap<String, StateValue>,
    /// When the snapshot was taken
    pub taken_at: DateTime<Utc>,
}

impl StateSnapshot {
    /// Create a new snapshot.
    #[must_use]
    pub const fn new(
        object_id: ObjectId,
        state: HashMap<String, StateValue>,
        taken_at: DateTime<Utc>,
    ) -> Self {
        Self {
            object_id,
            state,
            taken_at,
        }
    }

    /// Number of domain keys in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.len()
    }

    /// Check if the snapshot holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    /// Keys whose values cannot be encoded, sorted.
    #[must_use]
    pub fn unencodable_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .state
            .iter()
            .filter(|(_, value)| !value.is_finite())
            .map(|(key, _)| key.as_str())
            .collect();
        keys.sort_unstable();
        keys
    }
}

/// K/V domain state of a virtual object.
///
/// Backed by a persistent map so cloning (shared-handler snapshots, working
/// copies of exclusive invocations) is O(1).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectState {
    kv_store: im::HashMap<String, StateValue>,
}

impl ObjectState {
    /// Create an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a value from the state.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&StateValue> {
        self.kv_store.get(key)
    }

    /// Get a value as string.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.kv_store.get(key).and_then(StateValue::as_str)
    }

    /// Get a value as integer.
    #[must_use]
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.kv_store.get(key).and_then(StateValue::as_i64)
    }

    /// Get a value as boolean.
    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.kv_store.get(key).and_then(StateValue::as_bool)
    }

    /// Get a value deserialized into `T`.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored value does not deserialize into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, serde_json::Error> {
        self.kv_store
            .get(key)
            .map(|value| serde_json::from_value(value.to_json()))
            .transpose()
    }

    /// Set a value in the state.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<StateValue>) {
        self.kv_store.insert(key.into(), value.into());
    }

    /// Remove a value from the state.
    pub fn remove(&mut self, key: &str) -> Option<StateValue> {
        self.kv_store.remove(key)
    }

    /// Check if a key exists.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.kv_store.contains_key(key)
    }

    /// Get all keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.kv_store.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Get the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.kv_store.len()
    }

    /// Check if the state is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kv_store.is_empty()
    }

    /// Clear all state.
    pub fn clear(&mut self) {
        self.kv_store.clear();
    }

    /// Create a snapshot of current state.
    #[must_use]
    pub fn snapshot(&self, object_id: ObjectId, taken_at: DateTime<Utc>) -> StateSnapshot {
        let state = self
            .kv_store
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        StateSnapshot::new(object_id, state, taken_at)
    }

    /// Write every key of a snapshot into this state.
    pub fn restore(&mut self, snapshot: StateSnapshot) {
        for (key, value) in snapshot.state {
            self.kv_store.insert(key, value);
        }
    }
}

impl From<StateSnapshot> for ObjectState {
    fn from(snapshot: StateSnapshot) -> Self {
        let mut state = Self::new();
        state.restore(snapshot);
        state
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn object_id() -> ObjectId {
        ObjectId::new("count", "obj-1")
    }

    #[test]
    fn test_state_value_integer() {
        let value = StateValue::from(42i64);
        assert_eq!(value.as_i64(), Some(42));
        assert_eq!(value.as_f64(), Some(42.0));
        assert!(!value.is_null());
    }

    #[test]
    fn test_state_value_string() {
        let value = StateValue::from("hello");
        assert_eq!(value.as_str(), Some("hello"));
        assert_eq!(value.as_bool(), None);
    }

    #[test]
    fn test_state_value_to_json() {
        let value = StateValue::List(vec![
            StateValue::Integer(1),
            StateValue::Boolean(true),
            StateValue::Null,
        ]);
        assert_eq!(value.to_json(), serde_json::json!([1, true, null]));
        assert_eq!(
            StateValue::Float(f64::NAN).to_json(),
            serde_json::Value::Null
        );
    }

    #[test]
    fn test_non_finite_floats_found_at_any_depth() {
        assert!(StateValue::Float(2.5).is_finite());
        assert!(!StateValue::Float(f64::INFINITY).is_finite());
        assert!(!StateValue::List(vec![StateValue::List(vec![StateValue::Float(f64::NAN)])]).is_finite());

        let mut state = HashMap::new();
        state.insert("ok".to_string(), StateValue::Float(1.0));
        state.insert("z".to_string(), StateValue::Float(f64::NEG_INFINITY));
        state.insert("a".to_string(), StateValue::List(vec![StateValue::Float(f64::NAN)]));
        let snapshot = StateSnapshot::new(object_id(), state, Utc::now());
        assert_eq!(snapshot.unencodable_keys(), vec!["a", "z"]);
    }

    #[test]
    fn test_state_value_serialization() {
        let value = StateValue::Json(serde_json::json!({"nested": "value"}));
        let json = serde_json::to_string(&value).unwrap();
        let back: StateValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_object_state_get_set() {
        let mut state = ObjectState::new();

        state.set("key1", "value1");
        assert_eq!(state.get_str("key1"), Some("value1"));

        state.set("count", 100i64);
        assert_eq!(state.get_i64("count"), Some(100));

        state.set("flag", true);
        assert_eq!(state.get_bool("flag"), Some(true));
    }

    #[test]
    fn test_object_state_get_as() {
        let mut state = ObjectState::new();
        state.set("tags", serde_json::json!(["a", "b"]));
        state.set("count", 3i64);

        let tags: Option<Vec<String>> = state.get_as("tags").unwrap();
        assert_eq!(tags, Some(vec!["a".to_string(), "b".to_string()]));

        let count: Option<u32> = state.get_as("count").unwrap();
        assert_eq!(count, Some(3));

        let missing: Option<u32> = state.get_as("missing").unwrap();
        assert_eq!(missing, None);

        let wrong: Result<Option<u32>, _> = state.get_as("tags");
        assert!(wrong.is_err());
    }

    #[test]
    fn test_object_state_remove() {
        let mut state = ObjectState::new();
        state.set("key1", "value1");
        assert!(state.contains_key("key1"));

        assert_eq!(state.remove("key1"), Some(StateValue::from("value1")));
        assert!(!state.contains_key("key1"));
    }

    #[test]
    fn test_object_state_keys_sorted() {
        let mut state = ObjectState::new();
        state.set("c", "3");
        state.set("a", "1");
        state.set("b", "2");

        assert_eq!(state.keys(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_object_state_clear() {
        let mut state = ObjectState::new();
        state.set("key1", "value1");
        state.set("key2", "value2");
        assert_eq!(state.len(), 2);

        state.clear();
        assert!(state.is_empty());
    }

    #[test]
    fn test_clone_is_isolated() {
        let mut original = ObjectState::new();
        original.set("count", 1i64);

        let copy = original.clone();
        original.set("count", 2i64);

        assert_eq!(copy.get_i64("count"), Some(1));
        assert_eq!(original.get_i64("count"), Some(2));
    }

    #[test]
    fn test_snapshot_and_restore() {
        let mut state = ObjectState::new();
        state.set("key1", "value1");
        state.set("key2", 42i64);

        let snapshot = state.snapshot(object_id(), Utc::now());
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.object_id, object_id());

        let restored = ObjectState::from(snapshot);
        assert_eq!(restored, state);
    }

    #[test]
    fn test_restore_merges_keys() {
        let mut state = ObjectState::new();
        state.set("kept", 1i64);

        let mut other = ObjectState::new();
        other.set("loaded", 2i64);
        state.restore(other.snapshot(object_id(), Utc::now()));

        assert_eq!(state.keys(), vec!["kept", "loaded"]);
    }
}
