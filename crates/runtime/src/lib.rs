//! # offload-runtime
//!
//! Restate-style virtual objects with transparent idle-state offloading.
//!
//! - [`virtual_objects`]: object definitions, handler contexts and the
//!   in-process [`ObjectHost`](virtual_objects::ObjectHost)
//! - [`timers`]: delayed self-messages
//! - [`storage`]: blob writers and readers for offloaded state
//! - [`archiving`]: the layer that offloads idle objects and loads them back

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod archiving;
pub mod storage;
pub mod timers;
pub mod virtual_objects;

pub use offload_core::{Error, Result};
