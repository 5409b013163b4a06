// Common test infrastructure for archiving tests
#![allow(dead_code)]
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use offload_runtime::archiving::{ArchiveConfig, ArchiveLayer, IDLE_CHECK_HANDLER, ManualClock};
use offload_runtime::storage::{
    BlobPointer, BlobReader, BlobWriter, MemoryBlobStore, StoreError, StoreResult,
};
use offload_runtime::virtual_objects::{
    HandlerFuture, HostConfig, InvocationError, InvocationResult, ObjectContext,
    ObjectDefinition, ObjectEntry, ObjectHost, ObjectId, SharedObjectContext, StateSnapshot,
};

pub const SERVICE: &str = "count";
pub const EXPIRY: Duration = Duration::from_millis(1_000);
pub const CHECK_INTERVAL: Duration = Duration::from_millis(500);

// ═══════════════════════════════════════════════════════════════════════════════
// COUNTER OBJECT
// ═══════════════════════════════════════════════════════════════════════════════

pub fn inc<'a>(ctx: &'a mut ObjectContext, _input: Value) -> HandlerFuture<'a> {
    Box::pin(async move {
        let count = ctx.get_i64("count").unwrap_or(0).saturating_add(1);
        let inc = ctx.get_i64("incCalled").unwrap_or(0).saturating_add(1);
        ctx.set("count", count);
        ctx.set("incCalled", inc);
        Ok(json!({ "count": count, "inc": inc }))
    })
}

pub fn dec<'a>(ctx: &'a mut ObjectContext, _input: Value) -> HandlerFuture<'a> {
    Box::pin(async move {
        let count = ctx.get_i64("count").unwrap_or(0).saturating_sub(1);
        let dec = ctx.get_i64("decCalled").unwrap_or(0).saturating_add(1);
        ctx.set("count", count);
        ctx.set("decCalled", dec);
        Ok(json!({ "count": count, "dec": dec }))
    })
}

pub fn count<'a>(ctx: &'a SharedObjectContext, _input: Value) -> HandlerFuture<'a> {
    Box::pin(async move { Ok(json!(ctx.get_i64("count").unwrap_or(0))) })
}

/// Writes state, then fails with a business error.
pub fn reject<'a>(ctx: &'a mut ObjectContext, _input: Value) -> HandlerFuture<'a> {
    Box::pin(async move {
        ctx.set("count", 999i64);
        Err(InvocationError::terminal("rejected"))
    })
}

/// Stores every field of the input object under its own key.
pub fn put_all<'a>(ctx: &'a mut ObjectContext, input: Value) -> HandlerFuture<'a> {
    Box::pin(async move {
        if let Value::Object(fields) = input {
            for (key, value) in fields {
                ctx.set(key, value);
            }
        }
        Ok(Value::Null)
    })
}

/// Stores a float with no JSON representation.
pub fn set_unbounded<'a>(ctx: &'a mut ObjectContext, _input: Value) -> HandlerFuture<'a> {
    Box::pin(async move {
        ctx.set("ratio", f64::INFINITY);
        Ok(Value::Null)
    })
}

pub fn counter_definition() -> ObjectDefinition {
    ObjectDefinition::builder(SERVICE)
        .exclusive("inc", inc)
        .exclusive("dec", dec)
        .exclusive("reject", reject)
        .exclusive("put_all", put_all)
        .exclusive("set_unbounded", set_unbounded)
        .shared("count", count)
        .build()
        .expect("counter definition is valid")
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONTROLLED STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// Memory store with switchable failures and call counters.
#[derive(Default)]
pub struct ControlledStore {
    pub inner: MemoryBlobStore,
    pub unwritable: AtomicBool,
    pub transient_failures: AtomicU32,
    pub writes: AtomicU32,
    pub reads: AtomicU32,
}

impl ControlledStore {
    pub fn writes(&self) -> u32 {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> u32 {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn set_unwritable(&self, unwritable: bool) {
        self.unwritable.store(unwritable, Ordering::SeqCst);
    }

    pub fn fail_transiently(&self, times: u32) {
        self.transient_failures.store(times, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlobWriter for ControlledStore {
    async fn write(&self, snapshot: &StateSnapshot) -> StoreResult<BlobPointer> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.unwritable.load(Ordering::SeqCst) {
            return Err(StoreError::unwritable("path does not exist"));
        }
        let failing = self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StoreError::transient("store busy"));
        }
        self.inner.write(snapshot).await
    }
}

#[async_trait]
impl BlobReader for ControlledStore {
    async fn read(&self, pointer: &BlobPointer) -> StoreResult<StateSnapshot> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read(pointer).await
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HARNESS
// ═══════════════════════════════════════════════════════════════════════════════

/// A host running the archived counter against a manual clock.
///
/// Idle checks are invoked directly rather than through the timer executor,
/// so every step is deterministic.
pub struct Harness {
    pub host: ObjectHost,
    pub clock: ManualClock,
    pub store: Arc<ControlledStore>,
}

pub fn harness() -> Harness {
    let clock = ManualClock::default();
    let store = Arc::new(ControlledStore::default());

    let layer = ArchiveLayer::builder(ArchiveConfig::new(EXPIRY).with_check_interval(CHECK_INTERVAL))
        .store(Arc::clone(&store))
        .clock(Arc::new(clock.clone()))
        .build()
        .expect("layer builds");

    let host = ObjectHost::builder()
        .config(HostConfig {
            retry_base_backoff_ms: 1,
            retry_max_backoff_ms: 10,
            ..HostConfig::default()
        })
        .bind(layer.wrap(counter_definition()).expect("counter wraps"))
        .build()
        .expect("host builds");

    Harness { host, clock, store }
}

impl Harness {
    pub fn id(key: &str) -> ObjectId {
        ObjectId::new(SERVICE, key)
    }

    pub async fn call(&self, key: &str, handler: &str) -> InvocationResult<Value> {
        self.host.call(SERVICE, key, handler, Value::Null).await
    }

    pub async fn call_with(&self, key: &str, handler: &str, input: Value) -> InvocationResult<Value> {
        self.host.call(SERVICE, key, handler, input).await
    }

    pub async fn idle_check(&self, key: &str) -> InvocationResult<Value> {
        self.call(key, IDLE_CHECK_HANDLER).await
    }

    pub async fn entry(&self, key: &str) -> ObjectEntry {
        self.host
            .inspect(&Self::id(key))
            .await
            .expect("object has been invoked")
    }

    pub async fn pending_checks(&self, key: &str) -> usize {
        self.host
            .timers()
            .pending_for(&Self::id(key), IDLE_CHECK_HANDLER)
            .await
            .len()
    }

    /// Let the object go idle and run the idle check, expecting an offload.
    pub async fn evict(&self, key: &str) -> BlobPointer {
        self.clock.advance(EXPIRY);
        self.idle_check(key).await.expect("idle check succeeds");
        let entry = self.entry(key).await;
        entry
            .tier()
            .pointer()
            .cloned()
            .expect("object is offloaded after idle check")
    }
}

/// Assert the offload invariant: exactly one of {pointer, domain state}.
pub fn assert_tier_invariant(entry: &ObjectEntry) {
    if entry.is_offloaded() {
        assert!(entry.domain_keys().is_empty(), "offloaded entry holds keys");
        assert!(entry.last_access().is_none(), "offloaded entry holds last access");
    } else {
        assert!(entry.tier().pointer().is_none(), "resident entry holds a pointer");
    }
}
