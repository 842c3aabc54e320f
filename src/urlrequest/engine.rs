//! Request execution engine.
//!
//! The engine owns the registry of in-flight tasks, keyed by the transport
//! handle of the current attempt. Every transport event is routed through
//! [`EngineInner::on_event`]; registry access is serialized by one mutex and
//! no callback or transport call ever runs while it is held.

use crate::base::neterror::{NetError, TransportError, TransportErrorKind};
use crate::http::request::{RequestDescriptor, WireRequest};
use crate::http::response::Response;
use crate::http::retry::{calculate_backoff, RetryConfig};
use crate::transport::hyperclient::HyperTransport;
use crate::transport::{EventSink, HandleId, TransferMode, Transport, TransportEvent};
use crate::urlrequest::task::{CallbackContext, Callbacks, Notifier, Task, TaskId};
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::{Handle, Runtime};

/// Engine-wide settings.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Worker threads of the delivery runtime built by
    /// [`EngineConfig::build_runtime`] and by the shared engine.
    pub delivery_threads: usize,
    /// Thread name of the delivery runtime.
    pub thread_name: String,
    /// Default retry policy. `max_attempts` is the budget used when a task
    /// does not set its own.
    pub retry: RetryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            delivery_threads: 2,
            thread_name: "tasknet-delivery".to_string(),
            retry: RetryConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn delivery_threads(mut self, threads: usize) -> Self {
        self.delivery_threads = threads;
        self
    }

    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Build a multi-thread runtime with `delivery_threads` workers named
    /// `thread_name`, suitable for [`Engine::new`].
    pub fn build_runtime(&self) -> Result<Runtime, NetError> {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.delivery_threads.max(1))
            .thread_name(self.thread_name.clone())
            .enable_all()
            .build()
            .map_err(|e| {
                NetError::Transport(TransportError::new(
                    TransportErrorKind::Io,
                    format!("cannot start delivery runtime: {e}"),
                ))
            })
    }
}

static DELIVERY_RUNTIME: OnceCell<Runtime> = OnceCell::new();
static SHARED: OnceCell<Engine> = OnceCell::new();

/// Cheap, cloneable handle to an engine.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("in_flight", &self.in_flight())
            .field("config", &self.inner.config)
            .finish()
    }
}

impl Engine {
    /// Create an engine over `transport`. Background callbacks and retry
    /// backoff timers run on `runtime`.
    pub fn new(transport: Arc<dyn Transport>, runtime: Handle, config: EngineConfig) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                registry: Mutex::new(HashMap::new()),
                transport,
                runtime,
                config,
                next_handle: AtomicU64::new(1),
                next_task: AtomicU64::new(1),
            }),
        }
    }

    /// The process-wide engine, created on first use with
    /// [`EngineConfig::default`] unless [`Engine::init_shared`] ran first.
    ///
    /// It runs on its own multi-thread runtime and uses [`HyperTransport`].
    pub fn shared() -> Result<Engine, NetError> {
        SHARED
            .get_or_try_init(|| Self::create_shared(EngineConfig::default()))
            .cloned()
    }

    /// Create the process-wide engine with `config`.
    ///
    /// Succeeds if the shared engine does not exist yet, or already exists
    /// with an equal configuration. A different configuration is rejected,
    /// since the running engine cannot be reconfigured.
    pub fn init_shared(config: EngineConfig) -> Result<Engine, NetError> {
        let engine = SHARED.get_or_try_init(|| Self::create_shared(config.clone()))?;
        if engine.config() != &config {
            return Err(NetError::Unknown(
                "shared engine already initialized with another configuration".to_string(),
            ));
        }
        Ok(engine.clone())
    }

    fn create_shared(config: EngineConfig) -> Result<Engine, NetError> {
        let runtime = DELIVERY_RUNTIME.get_or_try_init(|| config.build_runtime())?;
        let handle = runtime.handle().clone();
        let transport = HyperTransport::builder().build(handle.clone());
        tracing::debug!(
            threads = config.delivery_threads,
            thread_name = %config.thread_name,
            "shared engine created"
        );
        Ok(Engine::new(Arc::new(transport), handle, config))
    }

    /// Encode `descriptor`, register a task and dispatch its first attempt.
    ///
    /// Returns `None` when encoding fails; the failure is then delivered
    /// through `callbacks` and nothing is registered.
    pub fn start(&self, descriptor: RequestDescriptor, callbacks: Callbacks) -> Option<TaskId> {
        self.inner.start(descriptor, callbacks)
    }

    /// Cancel the in-flight task whose current wire request equals the
    /// encoding of `descriptor`. Returns whether a task was cancelled.
    ///
    /// If several tasks match, exactly one of them is cancelled.
    pub fn cancel(&self, descriptor: &RequestDescriptor) -> bool {
        let wire = match descriptor.encode() {
            Ok(wire) => wire,
            Err(err) => {
                tracing::debug!(error = %err, "cancel: descriptor does not encode, ignored");
                return false;
            }
        };
        self.inner.cancel_where(|task| task.wire() == &wire)
    }

    /// Cancel the task started as `id`.
    pub fn cancel_task(&self, id: TaskId) -> bool {
        self.inner.cancel_where(|task| task.id() == id)
    }

    /// Number of registered tasks.
    pub fn in_flight(&self) -> usize {
        self.inner.lock_registry().len()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }
}

enum Outcome {
    Deliver(Task, Result<Response, NetError>),
    Retry(Arc<RequestDescriptor>),
}

pub(crate) struct EngineInner {
    registry: Mutex<HashMap<HandleId, Task>>,
    transport: Arc<dyn Transport>,
    runtime: Handle,
    config: EngineConfig,
    next_handle: AtomicU64,
    next_task: AtomicU64,
}

impl EngineInner {
    fn lock_registry(&self) -> MutexGuard<'_, HashMap<HandleId, Task>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_handle(&self) -> HandleId {
        HandleId::new(self.next_handle.fetch_add(1, Ordering::Relaxed))
    }

    fn start(self: &Arc<Self>, descriptor: RequestDescriptor, callbacks: Callbacks) -> Option<TaskId> {
        let id = TaskId::new(self.next_task.fetch_add(1, Ordering::Relaxed));
        let Callbacks {
            completion,
            progress,
            context,
            retry_count,
        } = callbacks;

        let runtime = match context {
            CallbackContext::Background => self.runtime.clone(),
            CallbackContext::Runtime(handle) => handle,
        };
        let notifier = Notifier::spawn(completion, progress, &runtime);

        let wire = match descriptor.encode() {
            Ok(wire) => wire,
            Err(err) => {
                tracing::debug!(task = %id, error = %err, "encoding failed, task not started");
                notifier.finish(Err(err));
                return None;
            }
        };

        let retries = retry_count.unwrap_or(self.config.retry.max_attempts);
        let mode = descriptor.transfer_mode();
        let handle = self.next_handle();
        let task = Task::new(id, Arc::new(descriptor), wire.clone(), retries, notifier);
        self.lock_registry().insert(handle, task);

        tracing::debug!(
            task = %id,
            handle = %handle,
            method = %wire.method,
            url = %wire.url,
            retries,
            "task started"
        );
        self.launch(handle, wire, mode);
        Some(id)
    }

    fn launch(self: &Arc<Self>, handle: HandleId, wire: WireRequest, mode: TransferMode) {
        let sink = EventSink::new(handle, Arc::downgrade(self));
        self.transport.launch(handle, wire, mode, sink);
    }

    pub(crate) fn on_event(self: &Arc<Self>, handle: HandleId, event: TransportEvent) {
        match event {
            TransportEvent::Complete(error) => self.finish(handle, error),
            TransportEvent::DownloadFinished { path, data } => {
                match self.lock_registry().get_mut(&handle) {
                    Some(task) => {
                        tracing::trace!(
                            handle = %handle,
                            path = %path.display(),
                            len = data.len(),
                            "download materialized"
                        );
                        task.replace_buffer(data);
                    }
                    None => tracing::debug!(handle = %handle, "download for unknown handle ignored"),
                }
            }
            event => match self.lock_registry().get_mut(&handle) {
                Some(task) => task.apply(event),
                None => tracing::trace!(handle = %handle, "event for unknown handle ignored"),
            },
        }
    }

    fn finish(self: &Arc<Self>, handle: HandleId, error: Option<TransportError>) {
        let outcome = {
            let mut registry = self.lock_registry();
            let Some(mut task) = registry.remove(&handle) else {
                tracing::debug!(handle = %handle, "completion for unknown handle ignored");
                return;
            };
            task.record_completion(error);
            match task.take_verdict() {
                Err(err) if err.is_retryable() && task.begin_retry() => {
                    tracing::warn!(
                        task = %task.id(),
                        handle = %handle,
                        attempt = task.attempt(),
                        remaining = task.retries_remaining(),
                        error = %err,
                        "attempt failed, retrying"
                    );
                    let descriptor = Arc::clone(task.descriptor());
                    // Stays registered under the old handle until re-dispatched.
                    registry.insert(handle, task);
                    Outcome::Retry(descriptor)
                }
                verdict => Outcome::Deliver(task, verdict),
            }
        };

        match outcome {
            Outcome::Deliver(task, verdict) => {
                tracing::debug!(
                    task = %task.id(),
                    handle = %handle,
                    ok = verdict.is_ok(),
                    "task completed"
                );
                task.complete(verdict);
            }
            Outcome::Retry(descriptor) => {
                // Re-encoding may read payload files; keep it off the thread
                // delivering transport events.
                let engine = Arc::clone(self);
                self.runtime.spawn(async move {
                    let source = Arc::clone(&descriptor);
                    let encoded = tokio::task::spawn_blocking(move || source.encode())
                        .await
                        .unwrap_or_else(|e| {
                            Err(NetError::Unknown(format!("re-encoding task failed: {e}")))
                        });
                    let Some((next, wire, attempt)) = engine.swap_handle(handle, encoded) else {
                        return;
                    };

                    let delay = calculate_backoff(attempt, &engine.config.retry);
                    tracing::debug!(old = %handle, handle = %next, ?delay, "re-dispatching");
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                        if !engine.lock_registry().contains_key(&next) {
                            tracing::debug!(handle = %next, "task cancelled during backoff");
                            return;
                        }
                    }
                    engine.launch(next, wire, descriptor.transfer_mode());
                });
            }
        }
    }

    /// Move a retrying task from `old` to a fresh handle in one registry
    /// critical section. Returns the new handle, the wire request and the
    /// attempt number, or `None` if the task is gone or could not be
    /// re-encoded (the latter is delivered as its final result).
    fn swap_handle(
        &self,
        old: HandleId,
        encoded: Result<WireRequest, NetError>,
    ) -> Option<(HandleId, WireRequest, usize)> {
        let mut registry = self.lock_registry();
        let Some(mut task) = registry.remove(&old) else {
            tracing::debug!(handle = %old, "task cancelled before retry");
            return None;
        };

        match encoded {
            Ok(wire) => {
                let handle = self.next_handle();
                task.redispatch(wire.clone());
                let attempt = task.attempt();
                registry.insert(handle, task);
                Some((handle, wire, attempt))
            }
            Err(err) => {
                drop(registry);
                tracing::warn!(task = %task.id(), error = %err, "re-encoding failed, giving up");
                task.complete(Err(err));
                None
            }
        }
    }

    fn cancel_where<F>(&self, matches: F) -> bool
    where
        F: Fn(&Task) -> bool,
    {
        let removed = {
            let mut registry = self.lock_registry();
            let handle = registry
                .iter()
                .find(|(_, task)| matches(task))
                .map(|(handle, _)| *handle);
            handle.and_then(|h| registry.remove(&h).map(|task| (h, task)))
        };

        match removed {
            Some((handle, task)) => {
                tracing::debug!(task = %task.id(), handle = %handle, "task cancelled");
                self.transport.cancel(handle);
                task.cancel();
                true
            }
            None => false,
        }
    }
}
