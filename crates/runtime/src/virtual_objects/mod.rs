//! Virtual Objects for stateful entity management.
//!
//! This module provides Restate-style Virtual Objects - keyed stateful
//! entities that keep isolated key-value state and handle messages.
//!
//! # Architecture
//!
//! Virtual Objects provide:
//! 1. Isolated state per object key (K/V store)
//! 2. Exclusive handlers, serialized per key, whose writes commit only on
//!    success
//! 3. Shared handlers running concurrently on a snapshot
//! 4. Delayed self-messages through the host's timers
//!
//! # Key Types
//!
//! - `ObjectDefinition`: an object type and its handlers
//! - `ObjectHost`: routes invocations and owns per-object entries
//! - `ObjectEntry`: residency tier plus the offload record of one object

mod context;
mod entry;
mod error;
mod host;
mod isolation;
mod object;
mod state;

pub use context::{ObjectContext, SharedObjectContext};
pub use entry::{ObjectEntry, Tier};
pub use error::{InvocationError, InvocationResult};
pub use host::{HostConfig, ObjectHost, ObjectHostBuilder, calculate_backoff};
pub use isolation::{LockManager, ObjectLock};
pub use object::{
    AccessMode, ExclusiveHandler, HandlerFuture, HandlerKind, HandlerOpts, ObjectDefinition,
    ObjectDefinitionBuilder, ObjectId, SharedHandler,
};
pub use state::{ObjectState, StateSnapshot, StateValue};
