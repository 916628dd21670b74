//! Protocol decoding modules.
//!
//! Each protocol follows a layered structure:
//! - `layout`: byte offsets and constants (source of truth)
//! - `reader`: safe byte access and protocol conventions
//! - `parser`: domain-level decoding (no direct byte indexing)
//! - `error`: explicit, actionable errors
//!
//! Parsers are pure and contain no I/O. Only what session reassembly needs is
//! decoded: DNS name resolution, HTTP request heads and TLS record headers.

pub(crate) mod common;
pub mod dns;
pub mod http;
pub mod tls;
