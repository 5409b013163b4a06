//! Timer scheduling and management.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::virtual_objects::ObjectId;

/// Type alias for the timer priority queue.
type TimerQueue = Arc<RwLock<BinaryHeap<Reverse<(DateTime<Utc>, TimerId)>>>>;

/// Unique identifier for a timer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimerId(String);

impl TimerId {
    /// Create a new unique timer ID.
    #[must_use]
    pub fn new() -> Self {
        Self(format!("timer-{}", Uuid::new_v4()))
    }

    /// Get the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TimerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TimerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerStatus {
    /// Timer is waiting to fire.
    Pending,
    /// Timer has fired and was handed to the executor.
    Fired,
}

impl TimerStatus {
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    #[must_use]
    pub const fn is_fired(&self) -> bool {
        matches!(self, Self::Fired)
    }
}

/// The message a timer delivers: a handler invocation on one object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerTarget {
    /// Object receiving the message
    pub object_id: ObjectId,
    /// Handler to invoke
    pub handler: String,
    /// Handler input
    pub input: serde_json::Value,
}

impl TimerTarget {
    /// Create a new target.
    pub fn new(object_id: ObjectId, handler: impl Into<String>, input: serde_json::Value) -> Self {
        Self {
            object_id,
            handler: handler.into(),
            input,
        }
    }
}

fn deadline_after(delay: Duration) -> DateTime<Utc> {
    let now = Utc::now();
    chrono::Duration::from_std(delay)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// A delayed message that fires at a scheduled time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DurableTimer {
    id: TimerId,
    execute_at: DateTime<Utc>,
    target: TimerTarget,
    status: TimerStatus,
    created_at: DateTime<Utc>,
    /// Number of delivery attempts so far
    attempts: u32,
}

impl DurableTimer {
    /// Create a new timer.
    #[must_use]
    pub fn new(execute_at: DateTime<Utc>, target: TimerTarget) -> Self {
        Self {
            id: TimerId::new(),
            execute_at,
            target,
            status: TimerStatus::Pending,
            created_at: Utc::now(),
            attempts: 0,
        }
    }

    /// Create a timer firing `delay` from now.
    #[must_use]
    pub fn after(delay: Duration, target: TimerTarget) -> Self {
        Self::new(deadline_after(delay), target)
    }

    #[must_use]
    pub const fn id(&self) -> &TimerId {
        &self.id
    }

    #[must_use]
    pub const fn execute_at(&self) -> DateTime<Utc> {
        self.execute_at
    }

    #[must_use]
    pub const fn target(&self) -> &TimerTarget {
        &self.target
    }

    #[must_use]
    pub const fn status(&self) -> TimerStatus {
        self.status
    }

    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Check if the timer is due (should fire now).
    #[must_use]
    pub fn is_due(&self) -> bool {
        self.status.is_pending() && Utc::now() >= self.execute_at
    }

    /// Mark the timer as fired, counting one delivery attempt.
    pub fn mark_fired(&mut self) {
        self.status = TimerStatus::Fired;
        self.attempts = self.attempts.saturating_add(1);
    }

    /// Put the timer back to pending, firing `delay` from now.
    pub fn reschedule_after(&mut self, delay: Duration) {
        self.status = TimerStatus::Pending;
        self.execute_at = deadline_after(delay);
    }
}

impl PartialEq for DurableTimer {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for DurableTimer {}

/// Schedules and manages pending timers.
///
/// Fired timers leave the scheduler; the executor hands them back through
/// [`TimerScheduler::reschedule`] when delivery must be retried.
#[derive(Default)]
pub struct TimerScheduler {
    /// Pending timers indexed by ID
    timers: Arc<RwLock<HashMap<TimerId, DurableTimer>>>,
    /// Priority queue of timer IDs by execution time
    queue: TimerQueue,
}

impl TimerScheduler {
    /// Create a new in-memory timer scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a new timer.
    pub async fn schedule(&self, timer: DurableTimer) -> TimerId {
        let timer_id = timer.id().clone();
        let execute_at = timer.execute_at();

        {
            let mut timers = self.timers.write().await;
            timers.insert(timer_id.clone(), timer);
        }

        {
            let mut queue = self.queue.write().await;
            queue.push(Reverse((execute_at, timer_id.clone())));
        }

        timer_id
    }

    /// Reschedule a fired timer after a delay.
    pub async fn reschedule(&self, mut timer: DurableTimer, delay: Duration) {
        timer.reschedule_after(delay);
        self.schedule(timer).await;
    }

    /// Get a pending timer by ID.
    pub async fn get(&self, timer_id: &TimerId) -> Option<DurableTimer> {
        let timers = self.timers.read().await;
        timers.get(timer_id).cloned()
    }

    /// Poll for due timers.
    ///
    /// Returns timers that are ready to fire.
    pub async fn poll_due(&self) -> Vec<DurableTimer> {
        self.poll_due_with_limit(usize::MAX).await
    }

    /// Poll for due timers with a limit.
    pub async fn poll_due_with_limit(&self, limit: usize) -> Vec<DurableTimer> {
        if limit == 0 {
            return Vec::new();
        }

        let now = Utc::now();
        let mut due_timers = Vec::new();

        let mut queue = self.queue.write().await;
        let mut timers = self.timers.write().await;

        while let Some(Reverse((execute_at, timer_id))) = queue.pop() {
            if due_timers.len() >= limit || execute_at > now {
                queue.push(Reverse((execute_at, timer_id)));
                break;
            }

            // Queue entries of rescheduled timers go stale; skip them.
            let is_current = timers
                .get(&timer_id)
                .is_some_and(|timer| timer.execute_at() == execute_at);
            if is_current {
                if let Some(mut timer) = timers.remove(&timer_id) {
                    timer.mark_fired();
                    due_timers.push(timer);
                }
            }
        }

        due_timers
    }

    /// Get the next time a timer will fire.
    pub async fn peek_next(&self) -> Option<DateTime<Utc>> {
        let timers = self.timers.read().await;
        timers.values().map(DurableTimer::execute_at).min()
    }

    /// Get the number of pending timers.
    pub async fn pending_count(&self) -> usize {
        let timers = self.timers.read().await;
        timers.len()
    }

    /// Pending timers addressed to `handler` on `object_id`.
    pub async fn pending_for(&self, object_id: &ObjectId, handler: &str) -> Vec<DurableTimer> {
        let timers = self.timers.read().await;
        let mut pending: Vec<DurableTimer> = timers
            .values()
            .filter(|t| t.target().object_id == *object_id && t.target().handler == handler)
            .cloned()
            .collect();
        pending.sort_by_key(DurableTimer::execute_at);
        pending
    }

    /// Drop every pending timer.
    pub async fn clear(&self) {
        let mut queue = self.queue.write().await;
        let mut timers = self.timers.write().await;
        queue.clear();
        timers.clear();
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::indexing_slicing)]

    use super::*;

    fn target(handler: &str) -> TimerTarget {
        TimerTarget::new(
            ObjectId::new("count", "obj-1"),
            handler,
            serde_json::Value::Null,
        )
    }

    #[test]
    fn test_timer_id_generation() {
        let id1 = TimerId::new();
        let id2 = TimerId::new();
        assert_ne!(id1, id2);
        assert!(id1.as_str().starts_with("timer-"));
    }

    #[test]
    fn test_timer_after_delay_is_not_due() {
        let timer = DurableTimer::after(Duration::from_secs(60), target("tick"));
        assert!(timer.status().is_pending());
        assert!(!timer.is_due());
        assert_eq!(timer.attempts(), 0);
    }

    #[test]
    fn test_huge_delay_saturates() {
        let timer = DurableTimer::after(Duration::MAX, target("tick"));
        assert_eq!(timer.execute_at(), DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn test_mark_fired_counts_attempts() {
        let mut timer = DurableTimer::after(Duration::ZERO, target("tick"));
        timer.mark_fired();
        assert!(timer.status().is_fired());
        assert_eq!(timer.attempts(), 1);

        timer.reschedule_after(Duration::ZERO);
        assert!(timer.status().is_pending());
        assert_eq!(timer.attempts(), 1);
    }

    #[tokio::test]
    async fn test_schedule_and_poll_due() {
        let scheduler = TimerScheduler::new();

        let due_id = scheduler
            .schedule(DurableTimer::after(Duration::ZERO, target("now")))
            .await;
        scheduler
            .schedule(DurableTimer::after(Duration::from_secs(60), target("later")))
            .await;
        assert_eq!(scheduler.pending_count().await, 2);

        let due = scheduler.poll_due().await;
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id(), &due_id);
        assert!(due[0].status().is_fired());
        assert_eq!(scheduler.pending_count().await, 1);

        // Fired timers are not handed out twice
        assert!(scheduler.poll_due().await.is_empty());
    }

    #[tokio::test]
    async fn test_poll_due_with_limit() {
        let scheduler = TimerScheduler::new();
        for _ in 0..5 {
            scheduler
                .schedule(DurableTimer::after(Duration::ZERO, target("tick")))
                .await;
        }

        assert_eq!(scheduler.poll_due_with_limit(2).await.len(), 2);
        assert_eq!(scheduler.poll_due_with_limit(0).await.len(), 0);
        assert_eq!(scheduler.poll_due().await.len(), 3);
    }

    #[tokio::test]
    async fn test_reschedule_returns_timer_to_pending() {
        let scheduler = TimerScheduler::new();
        scheduler
            .schedule(DurableTimer::after(Duration::ZERO, target("tick")))
            .await;

        let mut due = scheduler.poll_due().await;
        let timer = due.pop().unwrap();
        scheduler.reschedule(timer, Duration::ZERO).await;

        let due = scheduler.poll_due().await;
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].attempts(), 2);
    }

    #[tokio::test]
    async fn test_pending_for_filters_by_target() {
        let scheduler = TimerScheduler::new();
        scheduler
            .schedule(DurableTimer::after(Duration::from_secs(5), target("check")))
            .await;
        scheduler
            .schedule(DurableTimer::after(Duration::from_secs(5), target("other")))
            .await;

        let object_id = ObjectId::new("count", "obj-1");
        assert_eq!(scheduler.pending_for(&object_id, "check").await.len(), 1);
        assert!(
            scheduler
                .pending_for(&ObjectId::new("count", "obj-2"), "check")
                .await
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_peek_next_and_clear() {
        let scheduler = TimerScheduler::new();
        assert!(scheduler.peek_next().await.is_none());

        let timer = DurableTimer::after(Duration::from_secs(5), target("tick"));
        let at = timer.execute_at();
        scheduler.schedule(timer).await;
        assert_eq!(scheduler.peek_next().await, Some(at));

        scheduler.clear().await;
        assert_eq!(scheduler.pending_count().await, 0);
    }
}
