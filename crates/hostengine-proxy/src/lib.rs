//! Request relay between the HTTP surface and the supervised engine.
//!
//! [`ProxyForwarder`] sends requests to the engine's loopback endpoint and
//! hands back the upstream status, headers and body (buffered or as a byte
//! stream) without interpreting them. [`models`] holds the OpenAI-compatible
//! request types and their validation.
#![deny(unsafe_code)]

mod forward;
pub mod models;

pub use forward::{
    ByteStream, ProxyBody, ProxyError, ProxyForwarder, ProxyRequest, ProxyResponse,
    should_forward_header,
};
pub use models::{ChatCompletionRequest, ChatMessage, ValidationError};
