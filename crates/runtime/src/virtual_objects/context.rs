//! Handler contexts.
//!
//! An exclusive handler works on a private copy of its object's entry; the
//! host commits the copy only when the invocation succeeds. A shared handler
//! sees an immutable snapshot taken when the invocation started.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::error;

use super::entry::ObjectEntry;
use super::error::InvocationResult;
use super::host::ObjectHost;
use super::object::ObjectId;
use super::state::{StateSnapshot, StateValue};
use crate::storage::BlobPointer;
use crate::timers::TimerId;

/// Context for an exclusive (read-write) invocation.
pub struct ObjectContext {
    object_id: ObjectId,
    entry: ObjectEntry,
    host: ObjectHost,
}

impl ObjectContext {
    pub(crate) const fn new(object_id: ObjectId, entry: ObjectEntry, host: ObjectHost) -> Self {
        Self {
            object_id,
            entry,
            host,
        }
    }

    pub(crate) fn into_entry(self) -> ObjectEntry {
        self.entry
    }

    /// Object being invoked.
    #[must_use]
    pub const fn object_id(&self) -> &ObjectId {
        &self.object_id
    }

    /// Key of the object being invoked.
    #[must_use]
    pub fn key(&self) -> &str {
        self.object_id.key()
    }

    /// Host running the invocation.
    #[must_use]
    pub const fn host(&self) -> &ObjectHost {
        &self.host
    }

    // ------------------------------------------------------------------
    // Domain state
    // ------------------------------------------------------------------

    /// Get a domain value. Always `None` while offloaded.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&StateValue> {
        self.entry.tier().state().and_then(|state| state.get(key))
    }

    #[must_use]
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(StateValue::as_i64)
    }

    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(StateValue::as_str)
    }

    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(StateValue::as_bool)
    }

    /// Get a domain value deserialized into `T`.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if the stored value does not fit `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> InvocationResult<Option<T>> {
        match self.entry.tier().state() {
            Some(state) => Ok(state.get_as(key)?),
            None => Ok(None),
        }
    }

    /// Set a domain value.
    ///
    /// Ignored, with an error logged, while the state is offloaded.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<StateValue>) {
        let key = key.into();
        match self.entry.state_mut() {
            Some(state) => state.set(key, value),
            None => error!(object = %self.object_id, %key, "Write to offloaded state ignored"),
        }
    }

    /// Remove a domain value.
    pub fn clear(&mut self, key: &str) {
        if let Some(state) = self.entry.state_mut() {
            state.remove(key);
        }
    }

    /// Remove every domain value.
    pub fn clear_all(&mut self) {
        if let Some(state) = self.entry.state_mut() {
            state.clear();
        }
    }

    /// Domain keys, sorted. Empty while offloaded.
    #[must_use]
    pub fn state_keys(&self) -> Vec<String> {
        self.entry.domain_keys()
    }

    // ------------------------------------------------------------------
    // Offload record
    // ------------------------------------------------------------------

    /// Pointer to the externalized state, if offloaded.
    #[must_use]
    pub const fn offload_pointer(&self) -> Option<&BlobPointer> {
        self.entry.tier().pointer()
    }

    #[must_use]
    pub const fn is_offloaded(&self) -> bool {
        self.entry.is_offloaded()
    }

    /// Time of the last successful exclusive access.
    #[must_use]
    pub const fn last_access(&self) -> Option<DateTime<Utc>> {
        self.entry.last_access()
    }

    /// Record an access at `at`.
    pub fn touch(&mut self, at: DateTime<Utc>) {
        self.entry.set_last_access(at);
    }

    /// Snapshot of the domain state. Empty while offloaded.
    #[must_use]
    pub fn snapshot(&self, taken_at: DateTime<Utc>) -> StateSnapshot {
        self.entry.tier().state().map_or_else(
            || StateSnapshot::new(self.object_id.clone(), Default::default(), taken_at),
            |state| state.snapshot(self.object_id.clone(), taken_at),
        )
    }

    /// Write a snapshot back into the domain state, dropping the pointer.
    pub fn restore(&mut self, snapshot: StateSnapshot) {
        self.entry.restore(snapshot);
    }

    /// Drop every domain key and the last access, keeping only `pointer`.
    pub fn offload(&mut self, pointer: BlobPointer) {
        self.entry.offload(pointer);
    }

    /// Current entry, for inspection.
    #[must_use]
    pub const fn entry(&self) -> &ObjectEntry {
        &self.entry
    }

    // ------------------------------------------------------------------
    // Messaging
    // ------------------------------------------------------------------

    /// Schedule a one-way message to a handler of this same object.
    ///
    /// The timer is registered immediately and survives a failure of the
    /// current invocation.
    ///
    /// # Errors
    ///
    /// Returns an error if the handler does not exist on this object.
    pub async fn send_after(
        &self,
        handler: &str,
        input: Value,
        delay: Duration,
    ) -> InvocationResult<TimerId> {
        self.host
            .send_after(&self.object_id, handler, input, delay)
            .await
    }
}

/// Context for a shared (read-only) invocation.
pub struct SharedObjectContext {
    object_id: ObjectId,
    entry: ObjectEntry,
    host: ObjectHost,
}

impl SharedObjectContext {
    pub(crate) const fn new(object_id: ObjectId, entry: ObjectEntry, host: ObjectHost) -> Self {
        Self {
            object_id,
            entry,
            host,
        }
    }

    #[must_use]
    pub const fn object_id(&self) -> &ObjectId {
        &self.object_id
    }

    #[must_use]
    pub fn key(&self) -> &str {
        self.object_id.key()
    }

    #[must_use]
    pub const fn host(&self) -> &ObjectHost {
        &self.host
    }

    /// Get a domain value. Always `None` while offloaded.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&StateValue> {
        self.entry.tier().state().and_then(|state| state.get(key))
    }

    #[must_use]
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(StateValue::as_i64)
    }

    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(StateValue::as_str)
    }

    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(StateValue::as_bool)
    }

    /// Get a domain value deserialized into `T`.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if the stored value does not fit `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> InvocationResult<Option<T>> {
        match self.entry.tier().state() {
            Some(state) => Ok(state.get_as(key)?),
            None => Ok(None),
        }
    }

    #[must_use]
    pub fn state_keys(&self) -> Vec<String> {
        self.entry.domain_keys()
    }

    #[must_use]
    pub const fn offload_pointer(&self) -> Option<&BlobPointer> {
        self.entry.tier().pointer()
    }

    #[must_use]
    pub const fn is_offloaded(&self) -> bool {
        self.entry.is_offloaded()
    }

    #[must_use]
    pub const fn last_access(&self) -> Option<DateTime<Utc>> {
        self.entry.last_access()
    }

    /// Synchronously invoke a handler of this same object and await its
    /// result.
    ///
    /// # Errors
    ///
    /// Returns whatever the invoked handler returns.
    pub async fn call_self(&self, handler: &str, input: Value) -> InvocationResult<Value> {
        self.host.invoke(&self.object_id, handler, input).await
    }
}
