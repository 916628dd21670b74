//! DNS message decoding.
//!
//! Only the parts the session stage needs are decoded: the message id, the
//! query/response bit, the first question name and the A/AAAA addresses of
//! the answer section. Compressed names are followed with a bounded number of
//! pointer jumps.
//!
pub mod error;
pub mod layout;
pub mod parser;
pub mod reader;

pub use parser::{DnsMessage, parse_dns};
