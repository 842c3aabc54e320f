//! Parameter encoders.
//!
//! Each strategy takes a wire request and an optional parameter map and
//! returns a modified copy; the input request is never touched.

use crate::base::neterror::NetError;
use crate::http::parameters::{to_pairs, Parameters};
use crate::http::request::WireRequest;
use bytes::Bytes;
use http::Method;
use url::form_urlencoded;

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// How parameters are placed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParameterEncoding {
    /// Percent-encoded into the URL query.
    Query,
    /// `key=value&...` body with a form content type.
    Form,
    /// JSON object body.
    Json,
    /// Query for `GET`, form body for every other method.
    #[default]
    MethodDependent,
}

impl ParameterEncoding {
    /// The concrete strategy used for `method`.
    pub fn resolve(self, method: &Method) -> ParameterEncoding {
        match self {
            ParameterEncoding::MethodDependent if *method == Method::GET => ParameterEncoding::Query,
            ParameterEncoding::MethodDependent => ParameterEncoding::Form,
            other => other,
        }
    }

    pub fn encode(
        self,
        request: &WireRequest,
        parameters: Option<&Parameters>,
    ) -> Result<WireRequest, NetError> {
        let mut encoded = request.clone();
        let Some(parameters) = parameters else {
            return Ok(encoded);
        };

        match self {
            ParameterEncoding::MethodDependent => {
                return self.resolve(&request.method).encode(request, Some(parameters));
            }
            ParameterEncoding::Query => {
                if !parameters.is_empty() {
                    encoded.url.query_pairs_mut().extend_pairs(to_pairs(parameters));
                }
            }
            ParameterEncoding::Form => {
                encoded.body = Bytes::from(form_body(parameters));
                encoded.default_content_type(FORM_CONTENT_TYPE)?;
            }
            ParameterEncoding::Json => {
                let body = serde_json::to_vec(parameters)
                    .map_err(|e| NetError::Encoding(format!("json body: {e}")))?;
                encoded.body = Bytes::from(body);
                encoded.default_content_type(JSON_CONTENT_TYPE)?;
            }
        }

        Ok(encoded)
    }
}

fn form_body(parameters: &Parameters) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(to_pairs(parameters))
        .finish()
}
