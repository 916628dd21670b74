//! TLS record header detection.
//!
//! Payloads are never decrypted; a session is only marked as TLS when one of
//! its payloads starts with a plausible record header.

pub mod layout;
pub mod parser;

pub use parser::{TlsRecordHeader, is_tls_record, parse_record_header};
