use thiserror::Error;

/// Errors returned by link/network/transport decoding.
///
/// Note: this error type lives in an internal module; the example is
/// illustrative and not compiled as a public doctest.
///
/// # Examples
/// ```text
/// use radiotrace_core::decode::error::DecodeError;
///
/// let err = DecodeError::MissingNetworkLayer;
/// assert!(err.to_string().contains("missing network layer"));
/// ```
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("packet slice error: {0}")]
    Slice(String),
    #[error("missing network layer in packet")]
    MissingNetworkLayer,
    #[error("missing IP payload in packet")]
    MissingIpPayload,
}
