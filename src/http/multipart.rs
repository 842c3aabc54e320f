//! Multipart form data support.
//!
//! Provides RFC 2046 multipart/form-data encoding for uploads.
//!
//! Parts are kept in insertion order. Before writing, the list is sealed: the
//! first part is tagged to emit the initial boundary (`--B\r\n`) and the last
//! part is tagged to emit the closing boundary (`\r\n--B--\r\n`). Every other
//! part opens with the encapsulating boundary (`\r\n--B\r\n`).
//!
//! # Example
//! ```ignore
//! use tasknet::http::multipart::{Form, Part};
//!
//! let form = Form::new()
//!     .text("username", "user123")
//!     .part(Part::bytes(b"file content".as_slice()).name("doc").file_name("doc.txt"));
//!
//! let body = form.encode()?;
//! ```

use crate::base::context::IoResultExt;
use crate::base::neterror::NetError;
use bytes::{BufMut, Bytes, BytesMut};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use uuid::Uuid;

/// Field name used when a part does not set one.
pub const DEFAULT_FIELD_NAME: &str = "userfile";
/// MIME type used when a part does not set one.
pub const DEFAULT_MIME_TYPE: &str = "application/json";

/// A multipart form for uploads.
#[derive(Debug, Clone, PartialEq)]
pub struct Form {
    boundary: String,
    parts: Vec<Part>,
}

impl Default for Form {
    fn default() -> Self {
        Self::new()
    }
}

impl Form {
    /// Create a new empty form with a random boundary.
    pub fn new() -> Self {
        Self::with_boundary(generate_boundary())
    }

    /// Create a new empty form with a fixed boundary.
    pub fn with_boundary<S: Into<String>>(boundary: S) -> Self {
        Self {
            boundary: boundary.into(),
            parts: Vec::new(),
        }
    }

    /// Get the boundary string.
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Add a text field.
    pub fn text<N, V>(self, name: N, value: V) -> Self
    where
        N: Into<String>,
        V: Into<Cow<'static, str>>,
    {
        self.part(Part::text(value).name(name))
    }

    /// Add a custom part.
    pub fn part(mut self, part: Part) -> Self {
        self.parts.push(part);
        self
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Get the Content-Type header value.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Tag the first part as boundary-initial and the last as boundary-final.
    ///
    /// Sealing again recomputes the tags, so parts added after an earlier
    /// seal are handled.
    pub fn seal(mut self) -> Self {
        let last = self.parts.len().saturating_sub(1);
        for (idx, part) in self.parts.iter_mut().enumerate() {
            part.initial = idx == 0;
            part.closing = idx == last;
        }
        self
    }

    /// Compute the total encoded length if possible.
    ///
    /// Returns None if any part is backed by a file.
    pub fn content_length(&self) -> Option<usize> {
        let sealed = self.clone().seal();
        let blen = sealed.boundary.len();
        let mut length = 0usize;

        for part in &sealed.parts {
            let data_len = match &part.source {
                PartSource::Bytes(b) => b.len(),
                PartSource::File(_) => return None,
            };

            // --boundary\r\n, or \r\n--boundary\r\n
            length += if part.initial { 2 + blen + 2 } else { 4 + blen + 2 };
            length += part.format_headers().len();
            length += data_len;
            if part.closing {
                // \r\n--boundary--\r\n
                length += 4 + blen + 4;
            }
        }

        Some(length)
    }

    /// Seal the form and write it into body bytes.
    pub fn encode(&self) -> Result<Bytes, NetError> {
        let sealed = self.clone().seal();
        let mut output = BytesMut::with_capacity(sealed.content_length().unwrap_or(0));

        for part in &sealed.parts {
            part.write_to(&sealed.boundary, &mut output)?;
        }

        Ok(output.freeze())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum PartSource {
    Bytes(Bytes),
    File(PathBuf),
}

/// A part of a multipart form.
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    source: PartSource,
    name: String,
    file_name: String,
    content_type: String,
    initial: bool,
    closing: bool,
}

impl Part {
    fn with_source(source: PartSource) -> Self {
        Self {
            source,
            name: DEFAULT_FIELD_NAME.to_string(),
            file_name: timestamp_file_name(),
            content_type: DEFAULT_MIME_TYPE.to_string(),
            initial: false,
            closing: false,
        }
    }

    /// Create a part from bytes.
    pub fn bytes<B>(data: B) -> Self
    where
        B: Into<Bytes>,
    {
        Self::with_source(PartSource::Bytes(data.into()))
    }

    /// Create a text part.
    pub fn text<V>(value: V) -> Self
    where
        V: Into<Cow<'static, str>>,
    {
        let s = value.into();
        Self::bytes(Bytes::from(s.into_owned())).content_type("text/plain; charset=utf-8")
    }

    /// Create a part whose content is read from `path` at encode time.
    ///
    /// The file name defaults to the last path component.
    pub fn file<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let mut part = Self::with_source(PartSource::File(path.to_path_buf()));
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            part.file_name = name.to_string();
        }
        part
    }

    /// Set the form field name.
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Set the file name.
    pub fn file_name<S: Into<String>>(mut self, name: S) -> Self {
        self.file_name = name.into();
        self
    }

    /// Set the content type.
    pub fn content_type<S: Into<String>>(mut self, mime: S) -> Self {
        self.content_type = mime.into();
        self
    }

    pub fn field_name(&self) -> &str {
        &self.name
    }

    pub fn filename(&self) -> &str {
        &self.file_name
    }

    pub fn mime_type(&self) -> &str {
        &self.content_type
    }

    /// Whether this part opens the body with the initial boundary.
    pub fn is_initial(&self) -> bool {
        self.initial
    }

    /// Whether this part closes the body with the final boundary.
    pub fn is_final(&self) -> bool {
        self.closing
    }

    /// Format the part headers, including the blank line that ends them.
    fn format_headers(&self) -> String {
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
            escape_quotes(&self.name),
            escape_quotes(&self.file_name),
            escape_line_breaks(&self.content_type)
        )
    }

    fn write_to(&self, boundary: &str, out: &mut BytesMut) -> Result<(), NetError> {
        if self.initial {
            out.put_slice(b"--");
        } else {
            out.put_slice(b"\r\n--");
        }
        out.put_slice(boundary.as_bytes());
        out.put_slice(b"\r\n");

        out.put_slice(self.format_headers().as_bytes());

        match &self.source {
            PartSource::Bytes(b) => out.put_slice(b),
            PartSource::File(path) => {
                let data = std::fs::read(path).file_context(path)?;
                out.put_slice(&data);
            }
        }

        if self.closing {
            out.put_slice(b"\r\n--");
            out.put_slice(boundary.as_bytes());
            out.put_slice(b"--\r\n");
        }
        Ok(())
    }
}

/// Escape quotes and backslashes in a string.
fn escape_quotes(s: &str) -> Cow<'_, str> {
    if s.contains('"') || s.contains('\\') || s.contains('\r') || s.contains('\n') {
        Cow::Owned(
            s.replace('\\', "\\\\")
                .replace('"', "\\\"")
                .replace('\r', "\\r")
                .replace('\n', "\\n"),
        )
    } else {
        Cow::Borrowed(s)
    }
}

/// Escape CR and LF so a header value cannot start a new header line.
fn escape_line_breaks(s: &str) -> Cow<'_, str> {
    if s.contains('\r') || s.contains('\n') {
        Cow::Owned(s.replace('\r', "\\r").replace('\n', "\\n"))
    } else {
        Cow::Borrowed(s)
    }
}

/// Generate a random boundary string.
fn generate_boundary() -> String {
    format!("tasknet.boundary.{}", Uuid::new_v4().simple())
}

fn timestamp_file_name() -> String {
    OffsetDateTime::now_utc().unix_timestamp().to_string()
}
