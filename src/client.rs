//! HTTP client with builder pattern.
//!
//! A thin, ergonomic layer over [`Engine`]: it assembles a
//! [`RequestDescriptor`], starts it and hands back a [`TaskHandle`] that
//! resolves to the task's result.
//!
//! # Example
//!
//! ```rust,ignore
//! use tasknet::Client;
//!
//! let client = Client::new()?;
//!
//! let resp = client.get("http://example.com/search")
//!     .param("q", "rust")
//!     .retry(2)
//!     .send()
//!     .await?;
//! ```

use crate::base::neterror::{NetError, TransportError};
use crate::http::encoding::ParameterEncoding;
use crate::http::multipart::Form;
use crate::http::parameters::Parameters;
use crate::http::request::RequestDescriptor;
use crate::http::requestbody::Payload;
use crate::http::response::Response;
use crate::urlrequest::engine::Engine;
use crate::urlrequest::task::{CallbackContext, Callbacks, ProgressFn, TaskId};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use futures::channel::mpsc;
use http::header::{HeaderMap, HeaderValue, IntoHeaderName, AUTHORIZATION};
use http::Method;
use serde_json::Value;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Progress fractions of one task, ending with `1.0`.
pub type ProgressStream = mpsc::UnboundedReceiver<f64>;

/// HTTP client for starting requests.
///
/// Use [`Client::builder()`] to configure and create a client.
#[derive(Clone, Debug)]
pub struct Client {
    engine: Engine,
    default_headers: HeaderMap,
}

impl Client {
    /// Create a client over the shared engine.
    pub fn new() -> Result<Self, NetError> {
        Self::builder().build()
    }

    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Start building a GET request.
    pub fn get<U: AsRef<str>>(&self, url: U) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    /// Start building a POST request.
    pub fn post<U: AsRef<str>>(&self, url: U) -> RequestBuilder {
        self.request(Method::POST, url)
    }

    /// Start building a PUT request.
    pub fn put<U: AsRef<str>>(&self, url: U) -> RequestBuilder {
        self.request(Method::PUT, url)
    }

    /// Start building a DELETE request.
    pub fn delete<U: AsRef<str>>(&self, url: U) -> RequestBuilder {
        self.request(Method::DELETE, url)
    }

    /// Start building a HEAD request.
    pub fn head<U: AsRef<str>>(&self, url: U) -> RequestBuilder {
        self.request(Method::HEAD, url)
    }

    /// Start building a PATCH request.
    pub fn patch<U: AsRef<str>>(&self, url: U) -> RequestBuilder {
        self.request(Method::PATCH, url)
    }

    /// Start building a request with custom method.
    pub fn request<U: AsRef<str>>(&self, method: Method, url: U) -> RequestBuilder {
        RequestBuilder {
            client: self.clone(),
            method,
            url: url.as_ref().to_string(),
            headers: HeaderMap::new(),
            parameters: None,
            encoding: ParameterEncoding::default(),
            payload: Payload::None,
            download_to: None,
            retry_count: None,
            context: CallbackContext::default(),
            progress: None,
            error: None,
        }
    }
}

/// Builder for creating a [`Client`].
#[derive(Default)]
pub struct ClientBuilder {
    engine: Option<Engine>,
    default_headers: HeaderMap,
}

impl ClientBuilder {
    /// Run requests on `engine` instead of the shared one.
    pub fn engine(mut self, engine: Engine) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Add a header sent with every request. Per-request headers win.
    pub fn default_header<K, V>(mut self, key: K, value: V) -> Self
    where
        K: IntoHeaderName,
        V: TryInto<HeaderValue>,
    {
        if let Ok(val) = value.try_into() {
            self.default_headers.insert(key, val);
        }
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<Client, NetError> {
        let engine = match self.engine {
            Some(engine) => engine,
            None => Engine::shared()?,
        };
        Ok(Client {
            engine,
            default_headers: self.default_headers,
        })
    }
}

/// Builder for a single request.
pub struct RequestBuilder {
    client: Client,
    method: Method,
    url: String,
    headers: HeaderMap,
    parameters: Option<Parameters>,
    encoding: ParameterEncoding,
    payload: Payload,
    download_to: Option<PathBuf>,
    retry_count: Option<usize>,
    context: CallbackContext,
    progress: Option<ProgressFn>,
    error: Option<NetError>,
}

impl RequestBuilder {
    /// Add a header.
    pub fn header<K, V>(mut self, key: K, value: V) -> Self
    where
        K: IntoHeaderName,
        V: TryInto<HeaderValue>,
    {
        if let Ok(val) = value.try_into() {
            self.headers.insert(key, val);
        }
        self
    }

    /// Set HTTP basic credentials.
    pub fn basic_auth(self, username: &str, password: &str) -> Self {
        let token = STANDARD.encode(format!("{username}:{password}"));
        self.header(AUTHORIZATION, format!("Basic {token}"))
    }

    /// Add one parameter. A later value for the same key replaces the earlier one.
    pub fn param<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.parameters
            .get_or_insert_with(Parameters::new)
            .insert(key.into(), value.into());
        self
    }

    /// Merge a parameter map into the request.
    pub fn params(mut self, parameters: Parameters) -> Self {
        self.parameters
            .get_or_insert_with(Parameters::new)
            .extend(parameters);
        self
    }

    /// Choose how parameters are encoded.
    pub fn encoding(mut self, encoding: ParameterEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Set parameters from a serializable object and encode them as a JSON body.
    #[cfg(feature = "json")]
    pub fn json<T: serde::Serialize>(mut self, json: &T) -> Self {
        match serde_json::to_value(json) {
            Ok(Value::Object(map)) => {
                self.encoding = ParameterEncoding::Json;
                self.params(map)
            }
            Ok(other) => {
                self.error = Some(NetError::encoding(format!(
                    "JSON parameters must be an object, got {other}"
                )));
                self
            }
            Err(e) => {
                self.error = Some(NetError::encoding(e.to_string()));
                self
            }
        }
    }

    /// Upload `payload` as the request body.
    pub fn body<P: Into<Payload>>(mut self, payload: P) -> Self {
        self.payload = payload.into();
        self
    }

    /// Upload the contents of a file.
    pub fn upload_file<P: AsRef<Path>>(self, path: P) -> Self {
        self.body(Payload::File(path.as_ref().to_path_buf()))
    }

    /// Upload a multipart form.
    pub fn multipart(self, form: Form) -> Self {
        self.body(form)
    }

    /// Stream the response into `path`. The result still carries the bytes.
    pub fn download_to<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.download_to = Some(path.as_ref().to_path_buf());
        self
    }

    /// Re-issue a failed attempt up to `retries` times.
    pub fn retry(mut self, retries: usize) -> Self {
        self.retry_count = Some(retries);
        self
    }

    /// Where progress and completion callbacks run.
    pub fn callback_context(mut self, context: CallbackContext) -> Self {
        self.context = context;
        self
    }

    pub fn on_progress<F>(mut self, f: F) -> Self
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(f));
        self
    }

    /// Assemble the descriptor without starting it.
    pub fn build(&self) -> Result<RequestDescriptor, NetError> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }

        let mut headers = self.client.default_headers.clone();
        headers.extend(self.headers.clone());

        let mut descriptor = RequestDescriptor::parse(self.method.clone(), &self.url)?
            .with_headers(headers)
            .with_encoding(self.encoding)
            .with_payload(self.payload.clone());
        if let Some(parameters) = &self.parameters {
            descriptor = descriptor.with_parameters(parameters.clone());
        }
        if let Some(path) = &self.download_to {
            descriptor = descriptor.with_download_to(path);
        }
        Ok(descriptor)
    }

    /// Start the request.
    pub fn send(self) -> TaskHandle {
        let (result_tx, result_rx) = oneshot::channel();
        let (progress_tx, progress_rx) = mpsc::unbounded();
        let engine = self.client.engine.clone();

        let descriptor = match self.build() {
            Ok(descriptor) => descriptor,
            Err(err) => {
                let _ = result_tx.send(Err(err));
                return TaskHandle {
                    engine,
                    task: None,
                    result: result_rx,
                    progress: Some(progress_rx),
                };
            }
        };

        let user_progress = self.progress;
        let mut callbacks = Callbacks::new()
            .context(self.context)
            .on_complete(move |result| {
                let _ = result_tx.send(result);
            })
            .on_progress(move |fraction| {
                if let Some(cb) = &user_progress {
                    cb(fraction);
                }
                let _ = progress_tx.unbounded_send(fraction);
            });
        if let Some(retries) = self.retry_count {
            callbacks = callbacks.retry_count(retries);
        }

        let task = engine.start(descriptor, callbacks);
        TaskHandle {
            engine,
            task,
            result: result_rx,
            progress: Some(progress_rx),
        }
    }
}

/// A started request. Await it for the result.
///
/// A cancelled task resolves to a `Cancelled` transport error.
pub struct TaskHandle {
    engine: Engine,
    task: Option<TaskId>,
    result: oneshot::Receiver<Result<Response, NetError>>,
    progress: Option<ProgressStream>,
}

impl TaskHandle {
    /// The engine's id for this task, `None` if it never started.
    pub fn id(&self) -> Option<TaskId> {
        self.task
    }

    /// Take the progress stream. Only the first call returns it.
    pub fn progress(&mut self) -> Option<ProgressStream> {
        self.progress.take()
    }

    /// Cancel the task. Returns whether it was still in flight.
    pub fn cancel(&self) -> bool {
        self.task.map_or(false, |id| self.engine.cancel_task(id))
    }
}

impl Future for TaskHandle {
    type Output = Result<Response, NetError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.result).poll(cx).map(|received| {
            received.unwrap_or_else(|_| Err(NetError::Transport(TransportError::cancelled())))
        })
    }
}
