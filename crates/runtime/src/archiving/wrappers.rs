//! Decorators applied to every user handler.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use super::layer::{Archiver, LOAD_STATE_HANDLER};
use crate::virtual_objects::{
    ExclusiveHandler, InvocationResult, ObjectContext, SharedHandler, SharedObjectContext,
};

/// Loads offloaded state before an exclusive handler runs, and stamps the
/// access afterwards.
pub(crate) struct ExclusiveArchiving {
    inner: Arc<dyn ExclusiveHandler>,
    archiver: Arc<Archiver>,
}

impl ExclusiveArchiving {
    pub(crate) fn new(inner: Arc<dyn ExclusiveHandler>, archiver: Arc<Archiver>) -> Self {
        Self { inner, archiver }
    }
}

#[async_trait]
impl ExclusiveHandler for ExclusiveArchiving {
    async fn call(&self, ctx: &mut ObjectContext, input: Value) -> InvocationResult<Value> {
        if let Some(pointer) = ctx.offload_pointer().cloned() {
            info!(
                object = %ctx.object_id(),
                %pointer,
                "Object state was offloaded, loading it back"
            );
            self.archiver.rehydrate(ctx, &pointer).await?;
        }

        let output = self.inner.call(ctx, input).await?;

        // First access since creation or since the last offload.
        if ctx.last_access().is_none() {
            self.archiver.arm_idle_check(ctx).await?;
        }
        ctx.touch(self.archiver.now());

        Ok(output)
    }
}

/// Redirects a shared handler that finds its state offloaded: the state is
/// loaded in a separate exclusive call, then the handler is invoked afresh.
///
/// Shared access does not count as use and does not delay offloading.
pub(crate) struct SharedArchiving {
    handler: String,
    inner: Arc<dyn SharedHandler>,
}

impl SharedArchiving {
    pub(crate) fn new(handler: String, inner: Arc<dyn SharedHandler>) -> Self {
        Self { handler, inner }
    }
}

#[async_trait]
impl SharedHandler for SharedArchiving {
    async fn call(&self, ctx: &SharedObjectContext, input: Value) -> InvocationResult<Value> {
        if !ctx.is_offloaded() {
            return self.inner.call(ctx, input).await;
        }

        info!(
            object = %ctx.object_id(),
            handler = %self.handler,
            "Object state was found offloaded in shared handler, triggering load in separate call"
        );
        ctx.call_self(LOAD_STATE_HANDLER, Value::Null).await?;

        // This invocation's view is fixed; a fresh one sees the loaded state.
        ctx.call_self(&self.handler, input).await
    }
}
