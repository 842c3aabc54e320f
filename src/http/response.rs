//! Successful responses.

use crate::base::neterror::NetError;
use bytes::Bytes;
use http::header::CONTENT_LENGTH;
use http::{HeaderMap, StatusCode, Version};

/// Response metadata reported by the transport before any body bytes.
#[derive(Debug, Clone)]
pub struct ResponseMeta {
    status: StatusCode,
    version: Version,
    headers: HeaderMap,
}

impl ResponseMeta {
    pub fn new(status: StatusCode, version: Version, headers: HeaderMap) -> Self {
        Self {
            status,
            version,
            headers,
        }
    }

    /// Metadata with only a status code, for transports that report nothing else.
    pub fn with_status(status: StatusCode) -> Self {
        Self::new(status, Version::HTTP_11, HeaderMap::new())
    }

    pub fn from_parts(parts: &http::response::Parts) -> Self {
        Self::new(parts.status, parts.version, parts.headers.clone())
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Declared body length, if the server sent a parsable Content-Length.
    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get(CONTENT_LENGTH)?
            .to_str()
            .ok()?
            .parse()
            .ok()
    }
}

/// Immutable wrapper over the bytes received for a successful task.
#[derive(Debug, Clone)]
pub struct Response {
    body: Bytes,
    meta: Option<ResponseMeta>,
}

impl Response {
    pub(crate) fn new(body: Bytes, meta: Option<ResponseMeta>) -> Self {
        Self { body, meta }
    }

    /// Get the status code, when the transport reported one.
    pub fn status(&self) -> Option<StatusCode> {
        self.meta.as_ref().map(ResponseMeta::status)
    }

    pub fn meta(&self) -> Option<&ResponseMeta> {
        self.meta.as_ref()
    }

    /// The received body.
    pub fn bytes(&self) -> &Bytes {
        &self.body
    }

    pub fn into_bytes(self) -> Bytes {
        self.body
    }

    /// Body as UTF-8 text.
    pub fn text(&self) -> Result<String, NetError> {
        String::from_utf8(self.body.to_vec()).map_err(|e| NetError::Decoding(e.to_string()))
    }

    /// Body deserialized as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, NetError> {
        serde_json::from_slice(&self.body).map_err(|e| NetError::Decoding(e.to_string()))
    }
}
