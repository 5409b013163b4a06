//! The archiving layer: wraps an object definition so idle state is
//! offloaded to a blob store and transparently loaded back.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use offload_core::{Error, Result};
use serde_json::Value;
use tracing::{debug, info};

use super::clock::{Clock, SystemClock};
use super::config::ArchiveConfig;
use super::tasks::{IdleCheck, LoadState};
use super::wrappers::{ExclusiveArchiving, SharedArchiving};
use crate::storage::{BlobPointer, BlobReader, BlobWriter};
use crate::virtual_objects::{
    ExclusiveHandler, InvocationResult, ObjectContext, ObjectDefinition, SharedHandler,
};

/// Handler that checks whether an object went idle and offloads it.
pub const IDLE_CHECK_HANDLER: &str = "check_idle_and_offload";

/// Handler that loads offloaded state back.
pub const LOAD_STATE_HANDLER: &str = "load_state";

/// State shared by every wrapper and task of one layer.
pub(crate) struct Archiver {
    config: ArchiveConfig,
    writer: Arc<dyn BlobWriter>,
    reader: Arc<dyn BlobReader>,
    clock: Arc<dyn Clock>,
}

impl Archiver {
    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) fn writer(&self) -> &dyn BlobWriter {
        self.writer.as_ref()
    }

    /// An object is idle once `expiry` has fully elapsed since its last
    /// access. Objects never accessed are not idle.
    pub(crate) fn is_idle(&self, last_access: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        let Some(last_access) = last_access else {
            return false;
        };
        chrono::Duration::from_std(self.config.expiry())
            .is_ok_and(|expiry| now.signed_duration_since(last_access) >= expiry)
    }

    /// Read the blob behind `pointer` and restore it into the context.
    pub(crate) async fn rehydrate(
        &self,
        ctx: &mut ObjectContext,
        pointer: &BlobPointer,
    ) -> InvocationResult<()> {
        let snapshot = self.reader.read(pointer).await?;
        debug!(
            object = %ctx.object_id(),
            %pointer,
            keys = snapshot.len(),
            "Restoring offloaded state"
        );
        ctx.restore(snapshot);
        Ok(())
    }

    /// Schedule an idle check on the context's object.
    pub(crate) async fn arm_idle_check(&self, ctx: &ObjectContext) -> InvocationResult<()> {
        ctx.send_after(IDLE_CHECK_HANDLER, Value::Null, self.config.check_interval())
            .await?;
        Ok(())
    }
}

/// Idle-state offloading for virtual objects.
///
/// ```ignore
/// let layer = ArchiveLayer::builder(ArchiveConfig::new(Duration::from_secs(1)))
///     .store(Arc::new(FileBlobStore::default()))
///     .build()?;
/// let counter = layer.wrap(counter_definition)?;
/// ```
#[derive(Clone)]
pub struct ArchiveLayer {
    archiver: Arc<Archiver>,
}

impl std::fmt::Debug for ArchiveLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveLayer")
            .field("config", &self.archiver.config)
            .finish_non_exhaustive()
    }
}

impl ArchiveLayer {
    /// Start building a layer.
    #[must_use]
    pub fn builder(config: ArchiveConfig) -> ArchiveLayerBuilder {
        ArchiveLayerBuilder {
            config,
            writer: None,
            reader: None,
            clock: None,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ArchiveConfig {
        &self.archiver.config
    }

    /// Decorate every handler of `definition` and add the layer's own
    /// handlers ([`IDLE_CHECK_HANDLER`], [`LOAD_STATE_HANDLER`]).
    ///
    /// Handler names and access modes of the definition are preserved.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDefinition` if the definition already has a handler
    /// named like one of the layer's handlers.
    pub fn wrap(&self, definition: ObjectDefinition) -> Result<ObjectDefinition> {
        let tasks = ObjectDefinition::builder(definition.name())
            .exclusive(
                IDLE_CHECK_HANDLER,
                IdleCheck::new(Arc::clone(&self.archiver)),
            )
            .exclusive(
                LOAD_STATE_HANDLER,
                LoadState::new(Arc::clone(&self.archiver)),
            )
            .build()?;

        let decorated = definition.decorate(
            |_opts, inner| -> Arc<dyn ExclusiveHandler> {
                Arc::new(ExclusiveArchiving::new(inner, Arc::clone(&self.archiver)))
            },
            |opts, inner| -> Arc<dyn SharedHandler> {
                Arc::new(SharedArchiving::new(opts.name.clone(), inner))
            },
        );

        let wrapped = decorated.merge(tasks)?;
        info!(
            service = wrapped.name(),
            expiry_ms = self.archiver.config.expiry_ms,
            check_ms = self.archiver.config.check_interval().as_millis(),
            "Archiving enabled"
        );
        Ok(wrapped)
    }
}

/// Builder for [`ArchiveLayer`].
pub struct ArchiveLayerBuilder {
    config: ArchiveConfig,
    writer: Option<Arc<dyn BlobWriter>>,
    reader: Option<Arc<dyn BlobReader>>,
    clock: Option<Arc<dyn Clock>>,
}

impl ArchiveLayerBuilder {
    #[must_use]
    pub fn writer(mut self, writer: Arc<dyn BlobWriter>) -> Self {
        self.writer = Some(writer);
        self
    }

    #[must_use]
    pub fn reader(mut self, reader: Arc<dyn BlobReader>) -> Self {
        self.reader = Some(reader);
        self
    }

    /// Use one store as both writer and reader.
    #[must_use]
    pub fn store<S>(self, store: Arc<S>) -> Self
    where
        S: BlobWriter + BlobReader + 'static,
    {
        let writer: Arc<dyn BlobWriter> = Arc::clone(&store) as Arc<dyn BlobWriter>;
        let reader: Arc<dyn BlobReader> = store;
        self.writer(writer).reader(reader)
    }

    /// Time source; defaults to [`SystemClock`].
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Validate and build the layer.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the configuration is invalid or the writer
    /// or reader is missing.
    pub fn build(self) -> Result<ArchiveLayer> {
        self.config.validate()?;
        let (Some(writer), Some(reader)) = (self.writer, self.reader) else {
            return Err(Error::invalid_config("missing blob writer or reader"));
        };

        Ok(ArchiveLayer {
            archiver: Arc::new(Archiver {
                config: self.config,
                writer,
                reader,
                clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            }),
        })
    }
}
