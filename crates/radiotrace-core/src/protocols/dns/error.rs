use thiserror::Error;

/// Errors returned by DNS parsing and reading.
///
/// Note: this error type lives in an internal module; the example is
/// illustrative and not compiled as a public doctest.
///
/// # Examples
/// ```text
/// use radiotrace_core::protocols::dns::error::DnsError;
///
/// let err = DnsError::PointerLoop { jumps: 16 };
/// assert!(err.to_string().contains("compression pointer"));
/// ```
#[derive(Debug, Error)]
pub enum DnsError {
    #[error("payload too short: need {needed} bytes, got {actual}")]
    TooShort { needed: usize, actual: usize },
    #[error("too many compression pointer jumps: {jumps}")]
    PointerLoop { jumps: usize },
    #[error("invalid label length byte: {value:#04x}")]
    InvalidLabel { value: u8 },
}
