//! In-process host for virtual objects.
//!
//! The host routes invocations to object definitions, serializes exclusive
//! invocations per object key, runs shared invocations on a snapshot, retries
//! retryable failures with exponential backoff, and delivers delayed
//! self-messages through the timer executor.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use offload_core::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::context::{ObjectContext, SharedObjectContext};
use super::entry::ObjectEntry;
use super::error::{InvocationError, InvocationResult};
use super::isolation::LockManager;
use super::object::{ExclusiveHandler, HandlerKind, ObjectDefinition, ObjectId, SharedHandler};
use crate::timers::{
    DurableTimer, ExecutionResult, TimerCallback, TimerExecutor, TimerExecutorConfig, TimerId,
    TimerScheduler, TimerTarget,
};

const fn default_timer_tick_ms() -> u64 {
    50
}

const fn default_retry_max_attempts() -> u32 {
    3
}

const fn default_retry_base_backoff_ms() -> u64 {
    50
}

const fn default_retry_max_backoff_ms() -> u64 {
    2_000
}

/// Host configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    /// How often the timer executor polls for due timers.
    #[serde(default = "default_timer_tick_ms")]
    pub timer_tick_ms: u64,
    /// Total attempts for an invocation failing with a retryable error.
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,
    #[serde(default = "default_retry_base_backoff_ms")]
    pub retry_base_backoff_ms: u64,
    #[serde(default = "default_retry_max_backoff_ms")]
    pub retry_max_backoff_ms: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            timer_tick_ms: default_timer_tick_ms(),
            retry_max_attempts: default_retry_max_attempts(),
            retry_base_backoff_ms: default_retry_base_backoff_ms(),
            retry_max_backoff_ms: default_retry_max_backoff_ms(),
        }
    }
}

impl HostConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the tick or the attempt count is zero.
    pub fn validate(&self) -> Result<()> {
        if self.timer_tick_ms == 0 {
            return Err(Error::invalid_config("timer_tick_ms must be greater than 0"));
        }
        if self.retry_max_attempts == 0 {
            return Err(Error::invalid_config(
                "retry_max_attempts must be greater than 0",
            ));
        }
        Ok(())
    }

    fn backoff(&self, attempt: u32) -> Duration {
        calculate_backoff(
            attempt,
            self.retry_base_backoff_ms,
            self.retry_max_backoff_ms,
        )
    }
}

/// Calculate exponential backoff duration.
#[must_use]
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    let backoff = base_ms.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(backoff.min(max_ms))
}

struct HostInner {
    config: HostConfig,
    definitions: HashMap<String, ObjectDefinition>,
    locks: LockManager,
    timers: Arc<TimerScheduler>,
    executor: Arc<TimerExecutor>,
}

/// Handle to an in-process virtual object host. Cheap to clone.
#[derive(Clone)]
pub struct ObjectHost {
    inner: Arc<HostInner>,
}

impl std::fmt::Debug for ObjectHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectHost")
            .field("config", &self.inner.config)
            .field("services", &self.services())
            .finish_non_exhaustive()
    }
}

impl ObjectHost {
    /// Start building a host.
    #[must_use]
    pub fn builder() -> ObjectHostBuilder {
        ObjectHostBuilder::default()
    }

    #[must_use]
    pub fn config(&self) -> &HostConfig {
        &self.inner.config
    }

    /// Bound service names, sorted.
    #[must_use]
    pub fn services(&self) -> Vec<&str> {
        let mut services: Vec<&str> = self.inner.definitions.keys().map(String::as_str).collect();
        services.sort_unstable();
        services
    }

    /// Definition bound under `service`.
    #[must_use]
    pub fn definition(&self, service: &str) -> Option<&ObjectDefinition> {
        self.inner.definitions.get(service)
    }

    /// Pending delayed messages.
    #[must_use]
    pub fn timers(&self) -> &Arc<TimerScheduler> {
        &self.inner.timers
    }

    /// Invoke `handler` on the object `service/key` and await its result.
    ///
    /// # Errors
    ///
    /// Returns the handler's error once retries are exhausted, or a routing
    /// error if the service or handler is unknown.
    pub async fn call(
        &self,
        service: &str,
        key: &str,
        handler: &str,
        input: Value,
    ) -> InvocationResult<Value> {
        self.invoke(&ObjectId::new(service, key), handler, input)
            .await
    }

    /// Invoke `handler` on `object_id` and await its result.
    ///
    /// Calling an exclusive handler of an object from inside an exclusive
    /// handler of the same object deadlocks; use `send_after` instead.
    ///
    /// # Errors
    ///
    /// Returns the handler's error once retries are exhausted, or a routing
    /// error if the service or handler is unknown.
    pub async fn invoke(
        &self,
        object_id: &ObjectId,
        handler: &str,
        input: Value,
    ) -> InvocationResult<Value> {
        let kind = self.resolve(object_id, handler)?;
        match kind {
            HandlerKind::Exclusive(h) => self.invoke_exclusive(object_id, handler, h, input).await,
            HandlerKind::Shared(h) => self.invoke_shared(object_id, handler, h, input).await,
        }
    }

    /// Schedule a one-way invocation of `handler` on `object_id` after
    /// `delay`.
    ///
    /// # Errors
    ///
    /// Returns a routing error if the service or handler is unknown.
    pub async fn send_after(
        &self,
        object_id: &ObjectId,
        handler: &str,
        input: Value,
        delay: Duration,
    ) -> InvocationResult<TimerId> {
        self.resolve(object_id, handler)?;
        let timer = DurableTimer::after(delay, TimerTarget::new(object_id.clone(), handler, input));
        let timer_id = self.inner.timers.schedule(timer).await;
        debug!(
            object = %object_id,
            handler,
            delay_ms = delay.as_millis(),
            timer_id = %timer_id,
            "Scheduled delayed message"
        );
        Ok(timer_id)
    }

    /// Current committed entry of an object, if it was ever invoked.
    pub async fn inspect(&self, object_id: &ObjectId) -> Option<ObjectEntry> {
        match self.inner.locks.peek(object_id).await {
            Some(lock) => Some(lock.snapshot().await),
            None => None,
        }
    }

    /// Objects the host has seen, sorted.
    pub async fn object_ids(&self) -> Vec<ObjectId> {
        self.inner.locks.object_ids().await
    }

    /// Spawn the timer executor loop.
    #[must_use = "dropping the handle detaches the executor loop"]
    pub fn start(&self) -> JoinHandle<()> {
        let executor = Arc::clone(&self.inner.executor);
        info!(services = ?self.services(), "Object host starting");
        tokio::spawn(async move { executor.start().await })
    }

    /// Stop the timer executor loop. Pending timers are kept.
    pub async fn shutdown(&self) {
        self.inner.executor.stop().await;
        info!("Object host stopped");
    }

    /// Deliver every due delayed message inline, returning how many fired.
    pub async fn tick(&self) -> usize {
        self.inner.executor.tick().await
    }

    fn resolve(&self, object_id: &ObjectId, handler: &str) -> InvocationResult<HandlerKind> {
        let definition = self
            .inner
            .definitions
            .get(object_id.service())
            .ok_or_else(|| InvocationError::unknown_service(object_id.service()))?;
        definition
            .handler(handler)
            .cloned()
            .ok_or_else(|| InvocationError::unknown_handler(object_id.service(), handler))
    }

    async fn invoke_exclusive(
        &self,
        object_id: &ObjectId,
        handler_name: &str,
        handler: Arc<dyn ExclusiveHandler>,
        input: Value,
    ) -> InvocationResult<Value> {
        let lock = self.inner.locks.get_lock(object_id).await;
        let mut guard = lock.write().await;
        let mut attempt: u32 = 0;

        loop {
            attempt = attempt.saturating_add(1);
            let mut ctx = ObjectContext::new(
                object_id.clone(),
                ObjectEntry::clone(&guard),
                self.clone(),
            );

            match handler.call(&mut ctx, input.clone()).await {
                Ok(output) => {
                    *guard = ctx.into_entry();
                    return Ok(output);
                }
                Err(err) if err.is_retryable() && attempt < self.inner.config.retry_max_attempts => {
                    let backoff = self.inner.config.backoff(attempt.saturating_sub(1));
                    warn!(
                        object = %object_id,
                        handler = handler_name,
                        attempt,
                        backoff_ms = backoff.as_millis(),
                        error = %err,
                        "Invocation failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(err) => {
                    debug!(
                        object = %object_id,
                        handler = handler_name,
                        attempt,
                        error = %err,
                        "Invocation failed, state rolled back"
                    );
                    return Err(err);
                }
            }
        }
    }

    async fn invoke_shared(
        &self,
        object_id: &ObjectId,
        handler_name: &str,
        handler: Arc<dyn SharedHandler>,
        input: Value,
    ) -> InvocationResult<Value> {
        let lock = self.inner.locks.get_lock(object_id).await;
        let mut attempt: u32 = 0;

        loop {
            attempt = attempt.saturating_add(1);
            let ctx = SharedObjectContext::new(object_id.clone(), lock.snapshot().await, self.clone());

            match handler.call(&ctx, input.clone()).await {
                Ok(output) => return Ok(output),
                Err(err) if err.is_retryable() && attempt < self.inner.config.retry_max_attempts => {
                    let backoff = self.inner.config.backoff(attempt.saturating_sub(1));
                    warn!(
                        object = %object_id,
                        handler = handler_name,
                        attempt,
                        backoff_ms = backoff.as_millis(),
                        error = %err,
                        "Shared invocation failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Delivers fired timers to the host that scheduled them.
struct DeliveryCallback {
    host: Weak<HostInner>,
}

#[async_trait]
impl TimerCallback for DeliveryCallback {
    async fn execute(&self, timer: &DurableTimer) -> ExecutionResult {
        let Some(inner) = self.host.upgrade() else {
            return ExecutionResult::Failed {
                error: InvocationError::HostUnavailable.to_string(),
            };
        };
        let host = ObjectHost { inner };
        let target = timer.target();

        match host
            .invoke(&target.object_id, &target.handler, target.input.clone())
            .await
        {
            Ok(_) => ExecutionResult::Success,
            Err(err) if err.is_retryable() => ExecutionResult::Retry {
                delay: host.inner.config.backoff(timer.attempts()),
            },
            Err(err) => ExecutionResult::Failed {
                error: err.to_string(),
            },
        }
    }
}

/// Builder for [`ObjectHost`].
#[derive(Default)]
pub struct ObjectHostBuilder {
    config: HostConfig,
    definitions: Vec<ObjectDefinition>,
}

impl ObjectHostBuilder {
    #[must_use]
    pub fn config(mut self, config: HostConfig) -> Self {
        self.config = config;
        self
    }

    /// Bind an object definition under its name.
    #[must_use]
    pub fn bind(mut self, definition: ObjectDefinition) -> Self {
        self.definitions.push(definition);
        self
    }

    /// Validate and build the host. The timer executor is not started.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for an invalid configuration, or
    /// `InvalidDefinition` if two definitions share a name.
    pub fn build(self) -> Result<ObjectHost> {
        self.config.validate()?;

        let mut definitions = HashMap::new();
        for definition in self.definitions {
            let name = definition.name().to_string();
            if definitions.contains_key(&name) {
                return Err(Error::invalid_definition(name, "service is already bound"));
            }
            definitions.insert(name, definition);
        }

        let config = self.config;
        let inner = Arc::new_cyclic(|weak: &Weak<HostInner>| {
            let timers = Arc::new(TimerScheduler::new());
            let executor_config = TimerExecutorConfig {
                tick_interval: Duration::from_millis(config.timer_tick_ms),
                // Delayed messages are at-least-once; retryable failures are
                // redelivered with capped backoff until they succeed.
                max_attempts: None,
                ..TimerExecutorConfig::default()
            };
            let callback = Arc::new(DeliveryCallback { host: weak.clone() });
            let executor = Arc::new(TimerExecutor::new(
                executor_config,
                Arc::clone(&timers),
                callback,
            ));
            HostInner {
                config,
                definitions,
                locks: LockManager::new(),
                timers,
                executor,
            }
        });

        Ok(ObjectHost { inner })
    }
}
