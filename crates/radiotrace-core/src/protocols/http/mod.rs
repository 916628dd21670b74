//! HTTP/1.x request head decoding.
//!
//! Request heads are located in the reassembled uplink stream of a session.
//! Only the request line, the `Host` header and `Content-Length` are decoded;
//! bodies are skipped by length so pipelined requests are found too.

pub mod error;
pub mod layout;
pub mod parser;

pub use parser::{HttpRequestHead, find_requests, object_name, parse_request_head};
