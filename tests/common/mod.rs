//! Shared helpers for engine tests.

#![allow(dead_code)]

use bytes::Bytes;
use http::StatusCode;
use std::sync::{Arc, Mutex};
use tasknet::base::neterror::{TransportError, TransportErrorKind};
use tasknet::http::request::WireRequest;
use tasknet::http::response::ResponseMeta;
use tasknet::transport::{EventSink, HandleId, TransferMode, Transport};
use tasknet::urlrequest::{Engine, EngineConfig};
use tokio::runtime::Handle;

/// What the mock does with one launched attempt.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Answer with a status and body, delivered in small chunks.
    Respond { status: u16, body: Bytes },
    /// Fail the attempt with a transport error.
    Fail(TransportErrorKind),
    /// Never deliver anything.
    Hang,
}

impl Reply {
    pub fn ok(body: &'static str) -> Self {
        Reply::Respond {
            status: 200,
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    pub fn status(status: u16) -> Self {
        Reply::Respond {
            status,
            body: Bytes::from_static(b"status body"),
        }
    }
}

type Responder = Box<dyn Fn(&WireRequest, usize) -> Reply + Send + Sync>;

/// Transport that answers from a script, delivering events from spawned
/// tasks the way a real transport does.
pub struct MockTransport {
    responder: Responder,
    launches: Mutex<Vec<(HandleId, WireRequest)>>,
    cancelled: Mutex<Vec<HandleId>>,
}

impl MockTransport {
    /// `responder` gets the request and the zero-based launch number.
    pub fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&WireRequest, usize) -> Reply + Send + Sync + 'static,
    {
        Arc::new(Self {
            responder: Box::new(responder),
            launches: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
        })
    }

    pub fn always(reply: Reply) -> Arc<Self> {
        Self::new(move |_, _| reply.clone())
    }

    pub fn launches(&self) -> usize {
        self.launches.lock().unwrap().len()
    }

    pub fn handles(&self) -> Vec<HandleId> {
        self.launches.lock().unwrap().iter().map(|(h, _)| *h).collect()
    }

    pub fn cancelled(&self) -> Vec<HandleId> {
        self.cancelled.lock().unwrap().clone()
    }
}

impl Transport for MockTransport {
    fn launch(&self, handle: HandleId, request: WireRequest, mode: TransferMode, sink: EventSink) {
        let attempt = {
            let mut launches = self.launches.lock().unwrap();
            launches.push((handle, request.clone()));
            launches.len() - 1
        };
        let reply = (self.responder)(&request, attempt);
        if matches!(reply, Reply::Hang) {
            return;
        }
        tokio::spawn(deliver(reply, request, mode, sink));
    }

    fn cancel(&self, handle: HandleId) {
        self.cancelled.lock().unwrap().push(handle);
    }
}

async fn deliver(reply: Reply, request: WireRequest, mode: TransferMode, sink: EventSink) {
    let (status, body) = match reply {
        Reply::Respond { status, body } => (status, body),
        Reply::Fail(kind) => {
            sink.complete(Some(TransportError::new(kind, "scripted failure")));
            return;
        }
        Reply::Hang => return,
    };

    if mode == TransferMode::Upload {
        let total = request.body.len() as u64;
        for step in 1..=4u64 {
            sink.bytes_sent(total * step / 4, total);
            tokio::task::yield_now().await;
        }
    }

    sink.response(ResponseMeta::with_status(
        StatusCode::from_u16(status).unwrap(),
    ));

    match mode {
        TransferMode::Download(path) => {
            let total = body.len() as u64;
            tokio::fs::write(&path, &body).await.unwrap();
            sink.bytes_written(total / 2, Some(total));
            sink.bytes_written(total, Some(total));
            let data = tokio::fs::read(&path).await.unwrap();
            sink.download_finished(path, Bytes::from(data));
        }
        TransferMode::Data | TransferMode::Upload => {
            for chunk in body.chunks(3) {
                sink.data(Bytes::copy_from_slice(chunk));
                tokio::task::yield_now().await;
            }
        }
    }

    sink.complete(None);
}

/// Engine over `transport` using the current runtime for callbacks.
pub fn engine(transport: Arc<MockTransport>) -> Engine {
    Engine::new(transport, Handle::current(), EngineConfig::default())
}

pub fn engine_with(transport: Arc<MockTransport>, config: EngineConfig) -> Engine {
    Engine::new(transport, Handle::current(), config)
}
