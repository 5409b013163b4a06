//! Handlers the layer adds to every wrapped object.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::layer::Archiver;
use crate::virtual_objects::{ExclusiveHandler, InvocationResult, ObjectContext};

/// Offloads an object's state once it has been idle for the expiry.
pub(crate) struct IdleCheck {
    archiver: Arc<Archiver>,
}

impl IdleCheck {
    pub(crate) fn new(archiver: Arc<Archiver>) -> Self {
        Self { archiver }
    }
}

#[async_trait]
impl ExclusiveHandler for IdleCheck {
    async fn call(&self, ctx: &mut ObjectContext, _input: Value) -> InvocationResult<Value> {
        if ctx.is_offloaded() {
            debug!(object = %ctx.object_id(), "Stale idle check, state already offloaded");
            return Ok(Value::Null);
        }

        let now = self.archiver.now();
        if !self.archiver.is_idle(ctx.last_access(), now) {
            self.archiver.arm_idle_check(ctx).await?;
            return Ok(Value::Null);
        }

        let snapshot = ctx.snapshot(now);
        match self.archiver.writer().write(&snapshot).await {
            Ok(pointer) => {
                info!(
                    object = %ctx.object_id(),
                    %pointer,
                    keys = snapshot.len(),
                    "Offloaded idle object state"
                );
                ctx.offload(pointer);
                Ok(Value::Null)
            }
            Err(err) if err.is_retryable() => Err(err.into()),
            Err(err) => {
                warn!(
                    object = %ctx.object_id(),
                    error = %err,
                    "Offloading state failed, rescheduling idle check"
                );
                self.archiver.arm_idle_check(ctx).await?;
                Err(err.into())
            }
        }
    }
}

/// Loads offloaded state back on behalf of a shared handler.
pub(crate) struct LoadState {
    archiver: Arc<Archiver>,
}

impl LoadState {
    pub(crate) fn new(archiver: Arc<Archiver>) -> Self {
        Self { archiver }
    }
}

#[async_trait]
impl ExclusiveHandler for LoadState {
    async fn call(&self, ctx: &mut ObjectContext, _input: Value) -> InvocationResult<Value> {
        // A concurrent load may have got here first.
        let Some(pointer) = ctx.offload_pointer().cloned() else {
            debug!(object = %ctx.object_id(), "State already loaded");
            return Ok(Value::Null);
        };

        info!(object = %ctx.object_id(), %pointer, "Loading back object state");
        self.archiver.rehydrate(ctx, &pointer).await?;
        ctx.touch(self.archiver.now());
        self.archiver.arm_idle_check(ctx).await?;

        Ok(Value::Null)
    }
}
