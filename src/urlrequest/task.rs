//! One tracked request across all of its attempts.

use crate::base::loadstate::TaskState;
use crate::base::neterror::{NetError, TransportError};
use crate::http::classify::classify;
use crate::http::request::{RequestDescriptor, WireRequest};
use crate::http::response::{Response, ResponseMeta};
use crate::transport::TransportEvent;
use bytes::{Bytes, BytesMut};
use std::fmt;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

/// Identity of a task, stable across retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    pub(crate) fn new(raw: u64) -> Self {
        TaskId(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

pub type CompletionFn = Box<dyn FnOnce(Result<Response, NetError>) + Send + 'static>;
pub type ProgressFn = Arc<dyn Fn(f64) + Send + Sync + 'static>;

/// Where callbacks for a task run.
#[derive(Debug, Clone, Default)]
pub enum CallbackContext {
    /// The engine's own delivery runtime.
    #[default]
    Background,
    /// A caller-chosen runtime.
    Runtime(Handle),
}

/// Per-task callbacks and options supplied to [`Engine::start`](super::Engine::start).
#[derive(Default)]
pub struct Callbacks {
    pub(crate) completion: Option<CompletionFn>,
    pub(crate) progress: Option<ProgressFn>,
    pub(crate) context: CallbackContext,
    pub(crate) retry_count: Option<usize>,
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("completion", &self.completion.is_some())
            .field("progress", &self.progress.is_some())
            .field("context", &self.context)
            .field("retry_count", &self.retry_count)
            .finish()
    }
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called exactly once with the final verdict, unless the task is cancelled.
    pub fn on_complete<F>(mut self, f: F) -> Self
    where
        F: FnOnce(Result<Response, NetError>) + Send + 'static,
    {
        self.completion = Some(Box::new(f));
        self
    }

    /// Called with non-decreasing fractions in `[0, 1]`, ending with `1.0`.
    pub fn on_progress<F>(mut self, f: F) -> Self
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(f));
        self
    }

    pub fn context(mut self, context: CallbackContext) -> Self {
        self.context = context;
        self
    }

    /// Override the engine's default retry budget for this task.
    pub fn retry_count(mut self, retries: usize) -> Self {
        self.retry_count = Some(retries);
        self
    }
}

enum Notification {
    Progress(f64),
    Finished(Result<Response, NetError>),
}

/// Serializes one task's callbacks on its callback context.
///
/// Dropping the notifier without `finish` ends delivery silently.
pub(crate) struct Notifier {
    tx: mpsc::UnboundedSender<Notification>,
    last_progress: f64,
}

impl Notifier {
    pub(crate) fn spawn(
        completion: Option<CompletionFn>,
        progress: Option<ProgressFn>,
        runtime: &Handle,
    ) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut completion = completion;

        runtime.spawn(async move {
            while let Some(notification) = rx.recv().await {
                match notification {
                    Notification::Progress(fraction) => {
                        if let Some(cb) = &progress {
                            cb(fraction);
                        }
                    }
                    Notification::Finished(result) => {
                        if let Some(cb) = completion.take() {
                            cb(result);
                        }
                        if let Some(cb) = &progress {
                            cb(1.0);
                        }
                        break;
                    }
                }
            }
        });

        Self {
            tx,
            last_progress: 0.0,
        }
    }

    pub(crate) fn progress(&mut self, fraction: f64) {
        if fraction.is_nan() {
            return;
        }
        let fraction = fraction.clamp(0.0, 1.0);
        if fraction < self.last_progress {
            return;
        }
        self.last_progress = fraction;
        let _ = self.tx.send(Notification::Progress(fraction));
    }

    pub(crate) fn finish(self, result: Result<Response, NetError>) {
        let _ = self.tx.send(Notification::Finished(result));
    }
}

/// Registry entry. Owned by the engine's registry under the current handle.
pub(crate) struct Task {
    id: TaskId,
    descriptor: Arc<RequestDescriptor>,
    wire: WireRequest,
    buffer: BytesMut,
    meta: Option<ResponseMeta>,
    error: Option<TransportError>,
    retries_remaining: usize,
    attempt: usize,
    state: TaskState,
    notifier: Notifier,
}

impl Task {
    pub(crate) fn new(
        id: TaskId,
        descriptor: Arc<RequestDescriptor>,
        wire: WireRequest,
        retries: usize,
        notifier: Notifier,
    ) -> Self {
        Self {
            id,
            descriptor,
            wire,
            buffer: BytesMut::new(),
            meta: None,
            error: None,
            retries_remaining: retries,
            attempt: 0,
            state: TaskState::Dispatched,
            notifier,
        }
    }

    pub(crate) fn id(&self) -> TaskId {
        self.id
    }

    pub(crate) fn descriptor(&self) -> &Arc<RequestDescriptor> {
        &self.descriptor
    }

    pub(crate) fn wire(&self) -> &WireRequest {
        &self.wire
    }

    pub(crate) fn attempt(&self) -> usize {
        self.attempt
    }

    pub(crate) fn retries_remaining(&self) -> usize {
        self.retries_remaining
    }

    /// Fold a non-terminal transport event into the attempt's state.
    pub(crate) fn apply(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Response(meta) => self.meta = Some(meta),
            TransportEvent::Data(chunk) => self.buffer.extend_from_slice(&chunk),
            TransportEvent::BytesSent { sent, total } if total > 0 => {
                self.notifier.progress(sent as f64 / total as f64);
            }
            TransportEvent::BytesWritten {
                written,
                total: Some(total),
            } if total > 0 => {
                self.notifier.progress(written as f64 / total as f64);
            }
            TransportEvent::BytesSent { .. }
            | TransportEvent::BytesWritten { .. }
            | TransportEvent::DownloadFinished { .. }
            | TransportEvent::Complete(_) => {}
        }
    }

    /// Replace the buffer with a materialized download.
    pub(crate) fn replace_buffer(&mut self, data: Bytes) {
        self.buffer = BytesMut::from(&data[..]);
    }

    pub(crate) fn record_completion(&mut self, error: Option<TransportError>) {
        if let Some(err) = error {
            self.error = Some(err);
        }
    }

    /// Classify the attempt, consuming its buffer.
    pub(crate) fn take_verdict(&mut self) -> Result<Response, NetError> {
        let body = std::mem::take(&mut self.buffer).freeze();
        let body = (!body.is_empty()).then_some(body);
        classify(body, self.meta.as_ref(), self.error.as_ref())
    }

    /// Spend one retry. Returns false when the budget is exhausted.
    pub(crate) fn begin_retry(&mut self) -> bool {
        if self.retries_remaining == 0 {
            return false;
        }
        self.retries_remaining -= 1;
        self.transition(TaskState::Retrying);
        true
    }

    /// Reset per-attempt state for a fresh dispatch of `wire`.
    pub(crate) fn redispatch(&mut self, wire: WireRequest) {
        self.wire = wire;
        self.buffer.clear();
        self.meta = None;
        self.error = None;
        self.attempt += 1;
        self.transition(TaskState::Dispatched);
    }

    pub(crate) fn complete(mut self, result: Result<Response, NetError>) {
        self.transition(TaskState::Completed);
        self.notifier.finish(result);
    }

    /// Drop the task without delivering anything.
    pub(crate) fn cancel(mut self) {
        self.transition(TaskState::Cancelled);
    }

    fn transition(&mut self, next: TaskState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal task transition {:?} -> {:?}",
            self.state,
            next
        );
        self.state = next;
    }
}
