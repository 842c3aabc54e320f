//! Request descriptors and the wire requests they encode into.

use crate::base::neterror::NetError;
use crate::http::encoding::ParameterEncoding;
use crate::http::parameters::Parameters;
use crate::http::requestbody::Payload;
use crate::transport::TransferMode;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue, Method};
use std::path::{Path, PathBuf};
use url::Url;

/// A fully encoded request as handed to the transport.
///
/// Compared by value (method, URL, headers, body) when cancelling by
/// descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct WireRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl WireRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn has_content_type(&self) -> bool {
        self.headers.contains_key(CONTENT_TYPE)
    }

    /// Set Content-Type unless the caller already chose one.
    pub(crate) fn default_content_type(&mut self, value: &str) -> Result<(), NetError> {
        if !self.has_content_type() {
            let value = HeaderValue::from_str(value)
                .map_err(|e| NetError::Encoding(format!("content-type {value:?}: {e}")))?;
            self.headers.insert(CONTENT_TYPE, value);
        }
        Ok(())
    }
}

/// Immutable description of one request before encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    method: Method,
    url: Url,
    headers: HeaderMap,
    parameters: Option<Parameters>,
    encoding: ParameterEncoding,
    payload: Payload,
    download_to: Option<PathBuf>,
}

impl RequestDescriptor {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            parameters: None,
            encoding: ParameterEncoding::default(),
            payload: Payload::None,
            download_to: None,
        }
    }

    /// Build a descriptor from a URL string.
    pub fn parse(method: Method, url: &str) -> Result<Self, NetError> {
        let url = Url::parse(url)?;
        Ok(Self::new(method, url))
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub fn with_encoding(mut self, encoding: ParameterEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_payload<P: Into<Payload>>(mut self, payload: P) -> Self {
        self.payload = payload.into();
        self
    }

    /// Stream the response body into `path`; the file is read back into the
    /// result buffer when the transfer finishes.
    pub fn with_download_to<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.download_to = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn parameters(&self) -> Option<&Parameters> {
        self.parameters.as_ref()
    }

    pub fn encoding(&self) -> ParameterEncoding {
        self.encoding
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn download_to(&self) -> Option<&Path> {
        self.download_to.as_deref()
    }

    /// Which kind of transfer the transport should run.
    pub fn transfer_mode(&self) -> TransferMode {
        match (&self.download_to, &self.payload) {
            (Some(path), _) => TransferMode::Download(path.clone()),
            (None, Payload::None) => TransferMode::Data,
            (None, _) => TransferMode::Upload,
        }
    }

    /// Encode into a wire request. Never mutates `self`.
    ///
    /// Upload descriptors place parameters in the query string and use the
    /// payload as the body.
    pub fn encode(&self) -> Result<WireRequest, NetError> {
        if self.download_to.is_some() && !self.payload.is_none() {
            return Err(NetError::encoding(
                "a download request cannot carry an upload payload",
            ));
        }

        let mut base = WireRequest::new(self.method.clone(), self.url.clone());
        base.headers = self.headers.clone();

        if self.payload.is_none() {
            return self.encoding.encode(&base, self.parameters.as_ref());
        }

        let mut wire = ParameterEncoding::Query.encode(&base, self.parameters.as_ref())?;
        let (body, multipart_type) = self.payload.to_body()?;
        match multipart_type {
            Some(content_type) => {
                let value = HeaderValue::from_str(&content_type)
                    .map_err(|e| NetError::Encoding(format!("multipart content-type: {e}")))?;
                wire.headers.insert(CONTENT_TYPE, value);
            }
            None => wire.default_content_type("application/octet-stream")?,
        }
        wire.body = body;
        Ok(wire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::multipart::{Form, Part};
    use serde_json::json;

    fn params() -> Parameters {
        let mut p = Parameters::new();
        p.insert("q".into(), json!("rust"));
        p
    }

    #[test]
    fn test_parse_invalid_url() {
        let err = RequestDescriptor::parse(Method::GET, "not a url").unwrap_err();
        assert!(matches!(err, NetError::UrlConversion(_)));
    }

    #[test]
    fn test_transfer_modes() {
        let base = RequestDescriptor::parse(Method::GET, "http://example.com/").unwrap();
        assert_eq!(base.transfer_mode(), TransferMode::Data);

        let upload = base.clone().with_payload("data");
        assert_eq!(upload.transfer_mode(), TransferMode::Upload);

        let download = base.with_download_to("/tmp/out.bin");
        assert_eq!(
            download.transfer_mode(),
            TransferMode::Download(PathBuf::from("/tmp/out.bin"))
        );
    }

    #[test]
    fn test_upload_params_go_to_query() {
        let desc = RequestDescriptor::parse(Method::POST, "http://example.com/up")
            .unwrap()
            .with_parameters(params())
            .with_encoding(ParameterEncoding::Json)
            .with_payload("raw body");

        let wire = desc.encode().unwrap();
        assert_eq!(wire.url.query(), Some("q=rust"));
        assert_eq!(wire.body, Bytes::from_static(b"raw body"));
        assert_eq!(wire.headers[CONTENT_TYPE], "application/octet-stream");
    }

    #[test]
    fn test_multipart_overrides_content_type() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        let form = Form::with_boundary("B").part(Part::bytes("x"));
        let desc = RequestDescriptor::parse(Method::POST, "http://example.com/up")
            .unwrap()
            .with_headers(headers)
            .with_payload(form);

        let wire = desc.encode().unwrap();
        assert_eq!(wire.headers[CONTENT_TYPE], "multipart/form-data; boundary=B");
    }

    #[test]
    fn test_encode_is_deterministic_for_multipart() {
        let form = Form::new().part(Part::bytes("x").file_name("x.json"));
        let desc = RequestDescriptor::parse(Method::POST, "http://example.com/up")
            .unwrap()
            .with_payload(form);

        assert_eq!(desc.encode().unwrap(), desc.encode().unwrap());
    }

    #[test]
    fn test_download_with_payload_rejected() {
        let desc = RequestDescriptor::parse(Method::GET, "http://example.com/")
            .unwrap()
            .with_payload("x")
            .with_download_to("/tmp/x");
        assert!(matches!(desc.encode(), Err(NetError::Encoding(_))));
    }

    #[test]
    fn test_encode_leaves_descriptor_untouched() {
        let desc = RequestDescriptor::parse(Method::GET, "http://example.com/a?b=1")
            .unwrap()
            .with_parameters(params());
        let before = desc.clone();
        let _ = desc.encode().unwrap();
        assert_eq!(desc, before);
    }
}
