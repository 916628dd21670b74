use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("malformed request line: {line:?}")]
    MalformedRequestLine { line: String },
    #[error("unsupported HTTP version: {version:?}")]
    UnsupportedVersion { version: String },
    #[error("invalid Content-Length header: {value:?}")]
    InvalidContentLength { value: String },
}
