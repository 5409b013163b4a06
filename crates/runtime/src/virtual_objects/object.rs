//! Object identities, handler traits and object definitions.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use offload_core::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::context::{ObjectContext, SharedObjectContext};
use super::error::InvocationResult;

/// Identity of one virtual object instance: its service name plus key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId {
    service: String,
    key: String,
}

impl ObjectId {
    /// Create a new object ID.
    pub fn new(service: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            key: key.into(),
        }
    }

    /// Service (object type) name.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Instance key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.service, self.key)
    }
}

/// How a handler accesses its object's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    /// Read-write, serialized per object key.
    Exclusive,
    /// Read-only, may run concurrently with anything.
    Shared,
}

/// Boxed future returned by closure-style handlers.
pub type HandlerFuture<'a> = BoxFuture<'a, InvocationResult<Value>>;

/// A read-write handler.
#[async_trait]
pub trait ExclusiveHandler: Send + Sync {
    async fn call(&self, ctx: &mut ObjectContext, input: Value) -> InvocationResult<Value>;
}

/// A read-only handler.
#[async_trait]
pub trait SharedHandler: Send + Sync {
    async fn call(&self, ctx: &SharedObjectContext, input: Value) -> InvocationResult<Value>;
}

#[async_trait]
impl<F> ExclusiveHandler for F
where
    F: for<'a> Fn(&'a mut ObjectContext, Value) -> HandlerFuture<'a> + Send + Sync,
{
    async fn call(&self, ctx: &mut ObjectContext, input: Value) -> InvocationResult<Value> {
        (self)(ctx, input).await
    }
}

#[async_trait]
impl<F> SharedHandler for F
where
    F: for<'a> Fn(&'a SharedObjectContext, Value) -> HandlerFuture<'a> + Send + Sync,
{
    async fn call(&self, ctx: &SharedObjectContext, input: Value) -> InvocationResult<Value> {
        (self)(ctx, input).await
    }
}

/// A registered handler with its access mode.
#[derive(Clone)]
pub enum HandlerKind {
    Exclusive(Arc<dyn ExclusiveHandler>),
    Shared(Arc<dyn SharedHandler>),
}

impl HandlerKind {
    /// Access mode of the handler.
    #[must_use]
    pub const fn mode(&self) -> AccessMode {
        match self {
            Self::Exclusive(_) => AccessMode::Exclusive,
            Self::Shared(_) => AccessMode::Shared,
        }
    }
}

impl fmt::Debug for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exclusive(_) => f.write_str("HandlerKind::Exclusive"),
            Self::Shared(_) => f.write_str("HandlerKind::Shared"),
        }
    }
}

/// Options passed to handler decorators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerOpts {
    /// Service the handler belongs to
    pub service: String,
    /// Handler name
    pub name: String,
}

/// A virtual object type: a name and its handlers.
#[derive(Clone)]
pub struct ObjectDefinition {
    name: String,
    handlers: BTreeMap<String, HandlerKind>,
}

impl ObjectDefinition {
    /// Start building a definition.
    pub fn builder(name: impl Into<String>) -> ObjectDefinitionBuilder {
        ObjectDefinitionBuilder {
            name: name.into(),
            handlers: Vec::new(),
        }
    }

    /// Object type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a handler by name.
    #[must_use]
    pub fn handler(&self, name: &str) -> Option<&HandlerKind> {
        self.handlers.get(name)
    }

    /// Access mode of a handler, if it exists.
    #[must_use]
    pub fn access_mode(&self, name: &str) -> Option<AccessMode> {
        self.handlers.get(name).map(HandlerKind::mode)
    }

    /// Handler names, sorted.
    #[must_use]
    pub fn handler_names(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }

    /// Replace every handler with a decorated version of itself.
    ///
    /// Access modes are preserved: exclusive handlers go through
    /// `exclusive`, shared handlers through `shared`.
    #[must_use]
    pub fn decorate<E, S>(self, exclusive: E, shared: S) -> Self
    where
        E: Fn(&HandlerOpts, Arc<dyn ExclusiveHandler>) -> Arc<dyn ExclusiveHandler>,
        S: Fn(&HandlerOpts, Arc<dyn SharedHandler>) -> Arc<dyn SharedHandler>,
    {
        let name = self.name;
        let handlers = self
            .handlers
            .into_iter()
            .map(|(handler, kind)| {
                let opts = HandlerOpts {
                    service: name.clone(),
                    name: handler.clone(),
                };
                let decorated = match kind {
                    HandlerKind::Exclusive(h) => HandlerKind::Exclusive(exclusive(&opts, h)),
                    HandlerKind::Shared(h) => HandlerKind::Shared(shared(&opts, h)),
                };
                (handler, decorated)
            })
            .collect();
        Self { name, handlers }
    }

    /// Add the handlers of `extra` to this definition.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDefinition` if a handler name exists in both.
    pub fn merge(mut self, extra: Self) -> Result<Self> {
        for (handler, kind) in extra.handlers {
            if self.handlers.contains_key(&handler) {
                return Err(Error::invalid_definition(
                    &self.name,
                    format!("handler '{handler}' is already defined"),
                ));
            }
            self.handlers.insert(handler, kind);
        }
        Ok(self)
    }
}

impl fmt::Debug for ObjectDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectDefinition")
            .field("name", &self.name)
            .field("handlers", &self.handlers)
            .finish()
    }
}

/// Builder for [`ObjectDefinition`].
pub struct ObjectDefinitionBuilder {
    name: String,
    handlers: Vec<(String, HandlerKind)>,
}

impl ObjectDefinitionBuilder {
    /// Register a read-write handler.
    #[must_use]
    pub fn exclusive(mut self, name: impl Into<String>, handler: impl ExclusiveHandler + 'static) -> Self {
        self.handlers
            .push((name.into(), HandlerKind::Exclusive(Arc::new(handler))));
        self
    }

    /// Register a read-only handler.
    #[must_use]
    pub fn shared(mut self, name: impl Into<String>, handler: impl SharedHandler + 'static) -> Self {
        self.handlers
            .push((name.into(), HandlerKind::Shared(Arc::new(handler))));
        self
    }

    /// Validate and build the definition.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDefinition` if the object name or a handler name is
    /// empty, or if a handler name is registered twice.
    pub fn build(self) -> Result<ObjectDefinition> {
        if self.name.trim().is_empty() {
            return Err(Error::invalid_definition(
                &self.name,
                "object name must not be empty",
            ));
        }

        let mut handlers = BTreeMap::new();
        for (handler, kind) in self.handlers {
            if handler.trim().is_empty() {
                return Err(Error::invalid_definition(
                    &self.name,
                    "handler name must not be empty",
                ));
            }
            if handlers.contains_key(&handler) {
                return Err(Error::invalid_definition(
                    &self.name,
                    format!("duplicate handler '{handler}'"),
                ));
            }
            handlers.insert(handler, kind);
        }

        Ok(ObjectDefinition {
            name: self.name,
            handlers,
        })
    }
}
