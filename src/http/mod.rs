pub mod classify;
pub mod encoding;
pub mod multipart;
pub mod parameters;
pub mod request;
pub mod requestbody;
pub mod response;
pub mod retry;

// Re-exports for convenience
pub use encoding::ParameterEncoding;
pub use parameters::Parameters;
pub use request::{RequestDescriptor, WireRequest};
pub use requestbody::Payload;
pub use response::{Response, ResponseMeta};
