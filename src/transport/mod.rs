//! Transport boundary.
//!
//! The engine hands each attempt to a [`Transport`] together with an
//! [`EventSink`]. The transport reports what happens to the exchange through
//! the sink, on whatever thread it runs on. For one handle, events must arrive
//! in order: `Response`, then any `Data`/progress events, then exactly one
//! `Complete`. Events for handles the engine no longer tracks are dropped.

pub mod hyperclient;

use crate::base::neterror::TransportError;
use crate::http::request::WireRequest;
use crate::http::response::ResponseMeta;
use crate::urlrequest::engine::EngineInner;
use bytes::Bytes;
use std::fmt;
use std::path::PathBuf;
use std::sync::Weak;

/// Identity of one transport operation. Never reused, including across retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl HandleId {
    pub(crate) fn new(raw: u64) -> Self {
        HandleId(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h{}", self.0)
    }
}

/// What the transport should do with the response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferMode {
    /// Deliver the body as `Data` events.
    Data,
    /// Stream the body into this file, reporting `BytesWritten`, then
    /// `DownloadFinished` with the file read back.
    Download(PathBuf),
    /// Deliver the body as `Data` events and report `BytesSent` for the
    /// request body.
    Upload,
}

/// Something that happened to one transport operation.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// Status line and headers arrived.
    Response(ResponseMeta),
    /// A chunk of the response body.
    Data(Bytes),
    /// Request body bytes handed to the connection so far.
    BytesSent { sent: u64, total: u64 },
    /// Response bytes written to the download file so far.
    BytesWritten { written: u64, total: Option<u64> },
    /// The download file is complete. `data` is its content.
    DownloadFinished { path: PathBuf, data: Bytes },
    /// Terminal event, with the transport error if the exchange failed.
    Complete(Option<TransportError>),
}

/// Executes wire requests. Implementations must be cheap to call from any
/// thread and must not block in `launch`.
pub trait Transport: Send + Sync + 'static {
    /// Begin the exchange for `handle`, reporting through `sink`.
    fn launch(&self, handle: HandleId, request: WireRequest, mode: TransferMode, sink: EventSink);

    /// Abort the exchange for `handle`. No further events are required.
    fn cancel(&self, handle: HandleId);
}

/// Routes transport events for one handle back to the engine.
#[derive(Clone)]
pub struct EventSink {
    handle: HandleId,
    engine: Weak<EngineInner>,
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink").field("handle", &self.handle).finish()
    }
}

impl EventSink {
    pub(crate) fn new(handle: HandleId, engine: Weak<EngineInner>) -> Self {
        Self { handle, engine }
    }

    pub fn handle(&self) -> HandleId {
        self.handle
    }

    /// Deliver an event. A no-op once the engine is gone.
    pub fn deliver(&self, event: TransportEvent) {
        if let Some(engine) = self.engine.upgrade() {
            engine.on_event(self.handle, event);
        }
    }

    pub fn response(&self, meta: ResponseMeta) {
        self.deliver(TransportEvent::Response(meta));
    }

    pub fn data(&self, chunk: Bytes) {
        self.deliver(TransportEvent::Data(chunk));
    }

    pub fn bytes_sent(&self, sent: u64, total: u64) {
        self.deliver(TransportEvent::BytesSent { sent, total });
    }

    pub fn bytes_written(&self, written: u64, total: Option<u64>) {
        self.deliver(TransportEvent::BytesWritten { written, total });
    }

    pub fn download_finished(&self, path: PathBuf, data: Bytes) {
        self.deliver(TransportEvent::DownloadFinished { path, data });
    }

    pub fn complete(&self, error: Option<TransportError>) {
        self.deliver(TransportEvent::Complete(error));
    }
}
