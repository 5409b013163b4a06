//! Delayed self-messages.
//!
//! A handler schedules a one-way invocation of a handler on its own object
//! to run after a delay. The scheduler keeps pending timers ordered by due
//! time; the executor polls it on a fixed tick and hands due timers to a
//! callback, which for an [`ObjectHost`](crate::virtual_objects::ObjectHost)
//! invokes the target handler.
//!
//! Timers are fire-and-forget: once registered they are delivered even if
//! the invocation that scheduled them fails afterwards.

mod executor;
mod scheduler;

pub use executor::{ExecutionResult, TimerCallback, TimerExecutor, TimerExecutorConfig};
pub use scheduler::{DurableTimer, TimerId, TimerScheduler, TimerStatus, TimerTarget};
