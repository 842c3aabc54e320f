//! Response classification.
//!
//! Turns the raw outcome of one attempt into a verdict:
//! 1. a transport error wins over everything else;
//! 2. a status outside 200..=299 is a `StatusCode` failure;
//! 3. no body bytes is `MissingData`, even for a 2xx (a 204 included);
//! 4. otherwise the buffer becomes the `Response`.

use crate::base::neterror::{NetError, TransportError};
use crate::http::response::{Response, ResponseMeta};
use bytes::Bytes;

pub fn classify(
    buffer: Option<Bytes>,
    meta: Option<&ResponseMeta>,
    transport_error: Option<&TransportError>,
) -> Result<Response, NetError> {
    if let Some(err) = transport_error {
        return Err(err.clone().into());
    }

    if let Some(meta) = meta {
        if !meta.status().is_success() {
            return Err(NetError::StatusCode(meta.status().as_u16()));
        }
    }

    match buffer {
        Some(body) if !body.is_empty() => Ok(Response::new(body, meta.cloned())),
        _ => Err(NetError::MissingData),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::neterror::TransportErrorKind;
    use http::StatusCode;

    fn meta(code: u16) -> ResponseMeta {
        ResponseMeta::with_status(StatusCode::from_u16(code).unwrap())
    }

    #[test]
    fn test_no_content_is_missing_data() {
        let verdict = classify(Some(Bytes::new()), Some(&meta(204)), None);
        assert_eq!(verdict.unwrap_err(), NetError::MissingData);

        let verdict = classify(None, Some(&meta(200)), None);
        assert_eq!(verdict.unwrap_err(), NetError::MissingData);
    }

    #[test]
    fn test_success_wraps_body() {
        let body = Bytes::from_static(b"payload");
        let resp = classify(Some(body.clone()), Some(&meta(200)), None).unwrap();
        assert_eq!(resp.bytes(), &body);
        assert_eq!(resp.status(), Some(StatusCode::OK));
    }

    #[test]
    fn test_status_error_regardless_of_body() {
        let verdict = classify(Some(Bytes::from_static(b"busy")), Some(&meta(503)), None);
        assert_eq!(verdict.unwrap_err(), NetError::StatusCode(503));

        let verdict = classify(None, Some(&meta(404)), None);
        assert_eq!(verdict.unwrap_err(), NetError::StatusCode(404));
    }

    #[test]
    fn test_transport_error_wins() {
        let err = TransportError::new(TransportErrorKind::Connect, "refused");
        let verdict = classify(Some(Bytes::from_static(b"x")), Some(&meta(503)), Some(&err));
        assert_eq!(verdict.unwrap_err(), NetError::Transport(err));
    }

    #[test]
    fn test_malformed_url_kind() {
        let err = TransportError::malformed_url("missing host");
        let verdict = classify(None, None, Some(&err));
        assert_eq!(verdict.unwrap_err(), NetError::MalformedUrl("missing host".into()));
    }

    #[test]
    fn test_no_metadata_with_body_succeeds() {
        let resp = classify(Some(Bytes::from_static(b"raw")), None, None).unwrap();
        assert_eq!(resp.status(), None);
    }
}
