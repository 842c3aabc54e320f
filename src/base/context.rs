//! Ergonomic error context helpers.
//!
//! Provides extension traits for adding context to `Result` types,
//! converting IO errors into context-rich `NetError` / `TransportError` values.

use crate::base::neterror::{NetError, TransportError, TransportErrorKind};
use std::io;
use std::path::Path;

/// Extension trait for adding context to IO Results.
pub trait IoResultExt<T> {
    /// Add payload context to an IO error raised while building a request.
    ///
    /// # Example
    /// ```ignore
    /// use tasknet::base::context::IoResultExt;
    ///
    /// let bytes = std::fs::read(&path).file_context(&path)?;
    /// // Error: "Request encoding failed: cannot read /tmp/upload.bin: not found"
    /// ```
    fn file_context(self, path: &Path) -> Result<T, NetError>;

    /// Add download context to an IO error raised while materializing a file.
    fn download_context(self, path: &Path) -> Result<T, TransportError>;
}

impl<T> IoResultExt<T> for Result<T, io::Error> {
    fn file_context(self, path: &Path) -> Result<T, NetError> {
        self.map_err(|e| NetError::Encoding(format!("cannot read {}: {}", path.display(), e)))
    }

    fn download_context(self, path: &Path) -> Result<T, TransportError> {
        self.map_err(|e| {
            TransportError::new(
                TransportErrorKind::Io,
                format!("download file {}: {}", path.display(), e),
            )
        })
    }
}
