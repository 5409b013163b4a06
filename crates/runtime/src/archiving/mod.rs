//! Idle-state offloading for virtual objects.
//!
//! [`ArchiveLayer::wrap`] decorates an [`ObjectDefinition`] so that:
//!
//! - the first successful exclusive access arms a periodic idle check;
//! - an idle check finding the object unused for at least the expiry writes
//!   its domain state to the blob writer and keeps only the returned pointer;
//! - any later access loads the state back first. Exclusive handlers do so
//!   inline; shared handlers trigger a separate load and re-invoke
//!   themselves.
//!
//! Wrapped handlers never observe the offloaded tier.
//!
//! [`ObjectDefinition`]: crate::virtual_objects::ObjectDefinition

mod clock;
mod config;
mod layer;
mod tasks;
mod wrappers;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ArchiveConfig;
pub use layer::{ArchiveLayer, ArchiveLayerBuilder, IDLE_CHECK_HANDLER, LOAD_STATE_HANDLER};
