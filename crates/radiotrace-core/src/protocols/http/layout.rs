pub const METHODS: &[&str] = &[
    "GET", "POST", "PUT", "DELETE", "HEAD", "OPTIONS", "PATCH", "CONNECT", "TRACE",
];

pub const LINE_END: &[u8] = b"\r\n";
pub const HEAD_END: &[u8] = b"\r\n\r\n";
pub const VERSION_PREFIX: &str = "HTTP/";

pub const HOST_HEADER: &str = "host";
pub const CONTENT_LENGTH_HEADER: &str = "content-length";

/// Longest method name in `METHODS` plus the separating space.
pub const MAX_METHOD_PREFIX: usize = 8;
