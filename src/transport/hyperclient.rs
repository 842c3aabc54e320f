//! Pooled HTTP transport on top of hyper-util's client.
//!
//! Connection pooling, keep-alive and HTTP/2 negotiation stay inside
//! hyper-util. This type only runs one exchange per handle, turns it into
//! [`TransportEvent`](super::TransportEvent)s and keeps an abort handle per
//! in-flight exchange so the engine can cancel it.

use crate::base::context::IoResultExt;
use crate::base::neterror::{TransportError, TransportErrorKind};
use crate::http::request::WireRequest;
use crate::http::response::ResponseMeta;
use crate::transport::{EventSink, HandleId, TransferMode, Transport};
use bytes::Bytes;
use dashmap::DashMap;
use futures::StreamExt;
use http::header::CONTENT_LENGTH;
use http::HeaderValue;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::Frame;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;

/// Upload bodies are fed to the connection in chunks of this size so that
/// sent-bytes progress has useful granularity.
const UPLOAD_CHUNK: usize = 64 * 1024;

type OutgoingBody = BoxBody<Bytes, Infallible>;

/// Builder for [`HyperTransport`].
#[derive(Debug, Clone)]
pub struct HyperTransportBuilder {
    connect_timeout: Option<Duration>,
    pool_idle_timeout: Option<Duration>,
    pool_max_idle_per_host: usize,
}

impl Default for HyperTransportBuilder {
    fn default() -> Self {
        Self {
            connect_timeout: Some(Duration::from_secs(30)),
            pool_idle_timeout: Some(Duration::from_secs(90)),
            pool_max_idle_per_host: usize::MAX,
        }
    }
}

impl HyperTransportBuilder {
    /// Set TCP connect timeout (`None` waits indefinitely).
    pub fn connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set how long idle pooled connections are kept.
    pub fn pool_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.pool_idle_timeout = timeout;
        self
    }

    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.pool_max_idle_per_host = max;
        self
    }

    /// Build the transport. Exchanges are spawned on `runtime`.
    pub fn build(self, runtime: Handle) -> HyperTransport {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(self.connect_timeout);
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_timer(TokioTimer::new())
            .pool_idle_timeout(self.pool_idle_timeout)
            .pool_max_idle_per_host(self.pool_max_idle_per_host)
            .build(connector);

        HyperTransport {
            client,
            runtime,
            in_flight: Arc::new(DashMap::new()),
        }
    }
}

/// The default transport: one spawned exchange per handle over a shared
/// hyper-util connection pool.
pub struct HyperTransport {
    client: Client<HttpConnector, OutgoingBody>,
    runtime: Handle,
    in_flight: Arc<DashMap<HandleId, AbortHandle>>,
}

impl std::fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperTransport")
            .field("in_flight", &self.in_flight.len())
            .finish()
    }
}

impl HyperTransport {
    pub fn builder() -> HyperTransportBuilder {
        HyperTransportBuilder::default()
    }

    /// Number of exchanges currently running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

impl Transport for HyperTransport {
    fn launch(&self, handle: HandleId, request: WireRequest, mode: TransferMode, sink: EventSink) {
        let client = self.client.clone();
        let in_flight = Arc::clone(&self.in_flight);
        let (registered_tx, registered_rx) = oneshot::channel::<()>();

        let task = self.runtime.spawn(async move {
            // The abort handle must be in the map before the exchange can remove it.
            if registered_rx.await.is_err() {
                return;
            }
            let outcome = exchange(&client, request, mode, &sink).await;
            in_flight.remove(&handle);
            if let Err(ref e) = outcome {
                tracing::debug!(handle = %handle, error = %e, "exchange failed");
            }
            sink.complete(outcome.err());
        });

        self.in_flight.insert(handle, task.abort_handle());
        let _ = registered_tx.send(());
    }

    fn cancel(&self, handle: HandleId) {
        if let Some((_, abort)) = self.in_flight.remove(&handle) {
            tracing::debug!(handle = %handle, "aborting exchange");
            abort.abort();
        }
    }
}

async fn exchange(
    client: &Client<HttpConnector, OutgoingBody>,
    request: WireRequest,
    mode: TransferMode,
    sink: &EventSink,
) -> Result<(), TransportError> {
    if request.url.host_str().is_none() {
        return Err(TransportError::malformed_url(format!(
            "{} has no host",
            request.url
        )));
    }

    let http_request = to_http_request(request, &mode, sink)?;
    let response = client.request(http_request).await.map_err(client_error)?;

    let (parts, mut body) = response.into_parts();
    let meta = ResponseMeta::from_parts(&parts);
    let expected = meta.content_length();
    sink.response(meta);

    match mode {
        TransferMode::Download(path) => {
            let mut file = tokio::fs::File::create(&path)
                .await
                .download_context(&path)?;
            let mut written = 0u64;
            while let Some(frame) = body.frame().await {
                let frame = frame.map_err(body_error)?;
                if let Ok(chunk) = frame.into_data() {
                    file.write_all(&chunk).await.download_context(&path)?;
                    written += chunk.len() as u64;
                    sink.bytes_written(written, expected);
                }
            }
            file.flush().await.download_context(&path)?;
            drop(file);
            let data = tokio::fs::read(&path).await.download_context(&path)?;
            sink.download_finished(path, Bytes::from(data));
        }
        TransferMode::Data | TransferMode::Upload => {
            while let Some(frame) = body.frame().await {
                let frame = frame.map_err(body_error)?;
                if let Ok(chunk) = frame.into_data() {
                    tracing::trace!(handle = %sink.handle(), len = chunk.len(), "body chunk");
                    sink.data(chunk);
                }
            }
        }
    }

    Ok(())
}

fn to_http_request(
    request: WireRequest,
    mode: &TransferMode,
    sink: &EventSink,
) -> Result<http::Request<OutgoingBody>, TransportError> {
    let WireRequest {
        method,
        url,
        mut headers,
        body,
    } = request;

    let body = match mode {
        TransferMode::Upload => {
            // Streamed bodies carry no size hint; keep the request length-delimited.
            if !headers.contains_key(CONTENT_LENGTH) {
                headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len() as u64));
            }
            progress_body(body, sink.clone())
        }
        _ => Full::new(body).boxed(),
    };

    let mut http_request = http::Request::builder()
        .method(method)
        .uri(url.as_str())
        .body(body)
        .map_err(|e| TransportError::malformed_url(e.to_string()))?;
    *http_request.headers_mut() = headers;
    Ok(http_request)
}

/// Wrap an upload body so each chunk pulled by the connection reports progress.
fn progress_body(body: Bytes, sink: EventSink) -> OutgoingBody {
    let total = body.len() as u64;
    let chunks: Vec<Bytes> = (0..body.len())
        .step_by(UPLOAD_CHUNK)
        .map(|start| body.slice(start..(start + UPLOAD_CHUNK).min(body.len())))
        .collect();

    let mut sent = 0u64;
    let stream = futures::stream::iter(chunks).map(move |chunk| {
        sent += chunk.len() as u64;
        sink.bytes_sent(sent, total);
        Ok::<_, Infallible>(Frame::data(chunk))
    });

    BodyExt::boxed(StreamBody::new(stream))
}

fn client_error(err: hyper_util::client::legacy::Error) -> TransportError {
    let mut message = err.to_string();
    let mut timed_out = false;

    let mut source = std::error::Error::source(&err);
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        if let Some(io) = inner.downcast_ref::<std::io::Error>() {
            timed_out |= io.kind() == std::io::ErrorKind::TimedOut;
        }
        source = inner.source();
    }

    let kind = if timed_out {
        TransportErrorKind::Timeout
    } else if err.is_connect() {
        TransportErrorKind::Connect
    } else {
        TransportErrorKind::Other
    };
    TransportError::new(kind, message)
}

fn body_error(err: hyper::Error) -> TransportError {
    let kind = if err.is_timeout() {
        TransportErrorKind::Timeout
    } else {
        TransportErrorKind::Body
    };
    TransportError::new(kind, err.to_string())
}
