//! Upload payload sources.

use crate::base::context::IoResultExt;
use crate::base::neterror::NetError;
use crate::http::multipart::Form;
use bytes::Bytes;
use std::path::PathBuf;

/// The single payload source a descriptor may carry.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Payload {
    /// No upload body (plain data and download requests).
    #[default]
    None,
    /// Upload the contents of a file, read when the request is encoded.
    File(PathBuf),
    /// Upload an in-memory buffer.
    Bytes(Bytes),
    /// Upload an ordered list of multipart parts.
    Multipart(Form),
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Payload::Bytes(Bytes::from(s))
    }
}

impl From<Vec<u8>> for Payload {
    fn from(v: Vec<u8>) -> Self {
        Payload::Bytes(Bytes::from(v))
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Payload::Bytes(Bytes::from(s.to_owned()))
    }
}

impl From<Bytes> for Payload {
    fn from(b: Bytes) -> Self {
        Payload::Bytes(b)
    }
}

impl From<Form> for Payload {
    fn from(form: Form) -> Self {
        Payload::Multipart(form)
    }
}

impl Payload {
    /// Whether this descriptor uploads anything.
    pub fn is_none(&self) -> bool {
        matches!(self, Payload::None)
    }

    /// Produce the body bytes and, for multipart, the content type the body
    /// requires.
    pub(crate) fn to_body(&self) -> Result<(Bytes, Option<String>), NetError> {
        match self {
            Payload::None => Ok((Bytes::new(), None)),
            Payload::File(path) => {
                let data = std::fs::read(path).file_context(path)?;
                Ok((Bytes::from(data), None))
            }
            Payload::Bytes(b) => Ok((b.clone(), None)),
            Payload::Multipart(form) => Ok((form.encode()?, Some(form.content_type()))),
        }
    }
}
