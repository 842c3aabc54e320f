//! # tasknet
//!
//! An HTTP request execution engine.
//!
//! `tasknet` turns request descriptors into wire requests, runs them through
//! a pluggable transport and tracks every in-flight request in one shared
//! registry, so that results, progress and retries always reach the task that
//! started them.
//!
//! ## Features
//!
//! - **Parameter Encoding**: query string, form body or JSON body
//! - **Uploads**: raw bytes, files and multipart/form-data
//! - **Downloads**: stream to a file, get the bytes back as the result
//! - **Bounded Retry**: per-task budget, optional exponential backoff
//! - **Cancellation**: by descriptor or by task id, never delivers a result
//! - **Progress**: monotonic fractions ending at 1.0
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tasknet::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tasknet::NetError> {
//!     let client = Client::new()?;
//!     let response = client
//!         .post("http://localhost:8080/items")
//!         .json(&serde_json::json!({"name": "tasknet"}))
//!         .send()
//!         .await?;
//!     println!("{}", response.text()?);
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Error types and task lifecycle states
//! - [`http`] - Descriptors, parameter encoding, multipart, classification
//! - [`transport`] - Transport boundary and the hyper-based transport
//! - [`urlrequest`] - The engine and its task registry
//! - [`client`] - Builder-style request API

pub mod base;
pub mod client;
pub mod http;
pub mod transport;
pub mod urlrequest;

pub use base::neterror::{NetError, TransportError, TransportErrorKind};
pub use client::{Client, ClientBuilder, RequestBuilder, TaskHandle};
pub use crate::http::multipart::{Form, Part};
pub use crate::http::{ParameterEncoding, Parameters, Payload, RequestDescriptor, Response};
pub use urlrequest::{CallbackContext, Callbacks, Engine, EngineConfig, TaskId};
