//! Timer execution handling.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

use super::scheduler::{DurableTimer, TimerScheduler};

/// Result of timer execution.
#[derive(Debug, Clone)]
pub enum ExecutionResult {
    /// Timer executed successfully.
    Success,
    /// Timer execution failed.
    Failed {
        /// Error message
        error: String,
    },
    /// Timer execution should be retried.
    Retry {
        /// Delay before retry
        delay: Duration,
    },
}

impl ExecutionResult {
    /// Check if execution was successful.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Check if execution should be retried.
    #[must_use]
    pub const fn should_retry(&self) -> bool {
        matches!(self, Self::Retry { .. })
    }
}

/// Callback for timer execution.
#[async_trait]
pub trait TimerCallback: Send + Sync {
    /// Execute the timer.
    ///
    /// Called when the timer fires.
    async fn execute(&self, timer: &DurableTimer) -> ExecutionResult;
}

/// Configuration for the timer executor.
#[derive(Debug, Clone)]
pub struct TimerExecutorConfig {
    /// Tick interval for polling timers.
    pub tick_interval: Duration,
    /// Maximum concurrent executions.
    pub max_concurrent: usize,
    /// Maximum delivery attempts per timer. `None` keeps redelivering a
    /// timer for as long as its callback asks for a retry.
    pub max_attempts: Option<u32>,
}

impl Default for TimerExecutorConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(50),
            max_concurrent: 100,
            max_attempts: Some(3),
        }
    }
}

/// Executes fired timers.
pub struct TimerExecutor {
    config: TimerExecutorConfig,
    scheduler: Arc<TimerScheduler>,
    callback: Arc<dyn TimerCallback>,
    running: Arc<RwLock<bool>>,
    in_flight: Arc<RwLock<usize>>,
}

impl TimerExecutor {
    /// Create a new timer executor.
    #[must_use]
    pub fn new(
        config: TimerExecutorConfig,
        scheduler: Arc<TimerScheduler>,
        callback: Arc<dyn TimerCallback>,
    ) -> Self {
        Self {
            config,
            scheduler,
            callback,
            running: Arc::new(RwLock::new(false)),
            in_flight: Arc::new(RwLock::new(0)),
        }
    }

    /// Start the executor loop.
    ///
    /// Each due timer is delivered on its own task so a slow object does not
    /// hold up timers addressed to other objects. Runs until `stop()` is
    /// called.
    pub async fn start(&self) {
        {
            let mut running = self.running.write().await;
            if *running {
                return;
            }
            *running = true;
        }

        info!(
            tick_ms = self.config.tick_interval.as_millis(),
            "Timer executor starting"
        );

        let mut ticker = interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            if !self.is_running().await {
                break;
            }

            let in_flight = self.in_flight_count().await;
            let available = self.config.max_concurrent.saturating_sub(in_flight);
            if available == 0 {
                debug!("Concurrency limit reached, deferring execution");
                continue;
            }

            for timer in self.scheduler.poll_due_with_limit(available).await {
                self.spawn_execution(timer).await;
            }
        }

        info!("Timer executor stopped");
    }

    /// Stop the executor.
    pub async fn stop(&self) {
        let mut running = self.running.write().await;
        *running = false;
    }

    /// Check if the executor is running.
    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Get the number of in-flight executions.
    pub async fn in_flight_count(&self) -> usize {
        *self.in_flight.read().await
    }

    async fn spawn_execution(&self, timer: DurableTimer) {
        {
            let mut in_flight = self.in_flight.write().await;
            *in_flight = in_flight.saturating_add(1);
        }

        let callback = Arc::clone(&self.callback);
        let scheduler = Arc::clone(&self.scheduler);
        let in_flight = Arc::clone(&self.in_flight);
        let max_attempts = self.config.max_attempts;

        tokio::spawn(async move {
            execute_timer(callback.as_ref(), &scheduler, timer, max_attempts).await;
            let mut in_flight = in_flight.write().await;
            *in_flight = in_flight.saturating_sub(1);
        });
    }

    /// Deliver every due timer inline, in order.
    ///
    /// Used to drive timers deterministically without the executor loop.
    pub async fn tick(&self) -> usize {
        let due_timers = self.scheduler.poll_due().await;
        let delivered = due_timers.len();

        for timer in due_timers {
            execute_timer(
                self.callback.as_ref(),
                &self.scheduler,
                timer,
                self.config.max_attempts,
            )
            .await;
        }

        delivered
    }
}

async fn execute_timer(
    callback: &dyn TimerCallback,
    scheduler: &TimerScheduler,
    timer: DurableTimer,
    max_attempts: Option<u32>,
) {
    let timer_id = timer.id().clone();

    match callback.execute(&timer).await {
        ExecutionResult::Success => {
            debug!(timer_id = %timer_id, "Timer execution succeeded");
        }
        ExecutionResult::Failed { error } => {
            error!(
                timer_id = %timer_id,
                object = %timer.target().object_id,
                handler = %timer.target().handler,
                error = %error,
                "Timer execution failed"
            );
        }
        ExecutionResult::Retry { delay } if max_attempts.is_none_or(|max| timer.attempts() < max) => {
            debug!(
                timer_id = %timer_id,
                delay_ms = delay.as_millis(),
                attempt = timer.attempts(),
                "Timer execution requested retry"
            );
            scheduler.reschedule(timer, delay).await;
        }
        ExecutionResult::Retry { .. } => {
            warn!(
                timer_id = %timer_id,
                object = %timer.target().object_id,
                handler = %timer.target().handler,
                attempts = timer.attempts(),
                "Timer delivery attempts exhausted, dropping"
            );
        }
    }
}
