use tracing::debug;

use crate::protocols::common::reader::find_subslice;

use super::error::HttpError;
use super::layout;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequestHead {
    pub method: String,
    pub target: String,
    pub version: String,
    pub host: Option<String>,
    pub content_length: usize,
    /// Length of the head including the blank line that ends it.
    pub head_len: usize,
}

/// Decode a request head at the start of `bytes`.
///
/// Returns `Ok(None)` when `bytes` does not start with a request line. A head
/// cut short by the end of the capture is decoded up to the available bytes.
pub fn parse_request_head(bytes: &[u8]) -> Result<Option<HttpRequestHead>, HttpError> {
    if !starts_with_method(bytes) {
        return Ok(None);
    }
    let Some(line_end) = find_subslice(bytes, layout::LINE_END) else {
        return Ok(None);
    };

    let line = String::from_utf8_lossy(&bytes[..line_end]);
    let mut parts = line.split(' ').filter(|part| !part.is_empty());
    let (Some(method), Some(target), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(HttpError::MalformedRequestLine {
            line: line.into_owned(),
        });
    };
    if !version.starts_with(layout::VERSION_PREFIX) {
        return Err(HttpError::UnsupportedVersion {
            version: version.to_string(),
        });
    }

    let head_len = find_subslice(bytes, layout::HEAD_END)
        .map(|pos| pos + layout::HEAD_END.len())
        .unwrap_or(bytes.len());
    let headers_start = (line_end + layout::LINE_END.len()).min(head_len);
    let headers = String::from_utf8_lossy(&bytes[headers_start..head_len]);

    let mut host = None;
    let mut content_length = 0;
    for header in headers.split("\r\n") {
        let Some((name, value)) = header.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match name.trim().to_ascii_lowercase().as_str() {
            layout::HOST_HEADER if host.is_none() => host = Some(value.to_string()),
            layout::CONTENT_LENGTH_HEADER => {
                content_length =
                    value
                        .parse()
                        .map_err(|_| HttpError::InvalidContentLength {
                            value: value.to_string(),
                        })?;
            }
            _ => {}
        }
    }

    Ok(Some(HttpRequestHead {
        method: method.to_string(),
        target: target.to_string(),
        version: version.to_string(),
        host,
        content_length,
        head_len,
    }))
}

/// Locate every request head in an uplink byte stream.
///
/// Returns `(offset, head)` pairs in stream order. Bodies announced by
/// `Content-Length` are skipped; anything else is scanned line by line.
pub fn find_requests(stream: &[u8]) -> Vec<(usize, HttpRequestHead)> {
    let mut found = Vec::new();
    let mut pos = 0;
    while pos < stream.len() {
        match parse_request_head(&stream[pos..]) {
            Ok(Some(head)) => {
                let next = pos + head.head_len + head.content_length;
                found.push((pos, head));
                pos = next;
                continue;
            }
            Ok(None) => {}
            Err(err) => debug!(offset = pos, error = %err, "skipping malformed request head"),
        }
        match find_subslice(&stream[pos..], layout::LINE_END) {
            Some(line_end) => pos += line_end + layout::LINE_END.len(),
            None => break,
        }
    }
    found
}

/// Request target reduced to its path, without scheme, authority or query.
///
/// # Examples
/// ```
/// use radiotrace_core::protocols::http::object_name;
///
/// assert_eq!(object_name("/feed?since=10"), "/feed");
/// assert_eq!(object_name("http://example.com/a/b?x=1"), "/a/b");
/// ```
pub fn object_name(target: &str) -> &str {
    let path = match target.find("://") {
        Some(scheme_end) => {
            let rest = &target[scheme_end + 3..];
            rest.find('/').map(|slash| &rest[slash..]).unwrap_or("/")
        }
        None => target,
    };
    let end = path.find(['?', '#']).unwrap_or(path.len());
    &path[..end]
}

fn starts_with_method(bytes: &[u8]) -> bool {
    let prefix = &bytes[..bytes.len().min(layout::MAX_METHOD_PREFIX)];
    layout::METHODS.iter().any(|method| {
        prefix.len() > method.len()
            && prefix.starts_with(method.as_bytes())
            && prefix[method.len()] == b' '
    })
}

#[cfg(test)]
mod tests {
    use super::{find_requests, object_name, parse_request_head};
    use crate::protocols::http::error::HttpError;

    #[test]
    fn parse_get_with_host() {
        let bytes = b"GET /feed?x=1 HTTP/1.1\r\nHost: api.example.com\r\nAccept: */*\r\n\r\n";
        let head = parse_request_head(bytes).unwrap().unwrap();
        assert_eq!(head.method, "GET");
        assert_eq!(head.target, "/feed?x=1");
        assert_eq!(head.version, "HTTP/1.1");
        assert_eq!(head.host.as_deref(), Some("api.example.com"));
        assert_eq!(head.head_len, bytes.len());
    }

    #[test]
    fn non_request_bytes_are_ignored() {
        assert!(parse_request_head(b"HTTP/1.1 200 OK\r\n\r\n").unwrap().is_none());
        assert!(parse_request_head(b"\x16\x03\x01\x00\x10").unwrap().is_none());
        assert!(parse_request_head(b"GETTER / HTTP/1.1\r\n").unwrap().is_none());
    }

    #[test]
    fn malformed_request_line_is_an_error() {
        let err = parse_request_head(b"GET /only-two\r\n\r\n").unwrap_err();
        assert!(matches!(err, HttpError::MalformedRequestLine { .. }));
    }

    #[test]
    fn find_pipelined_requests_skips_bodies() {
        let mut stream = b"POST /up HTTP/1.1\r\nHost: a\r\nContent-Length: 5\r\n\r\nGET /".to_vec();
        stream.extend_from_slice(b"GET /next HTTP/1.1\r\nHost: b\r\n\r\n");
        let requests = find_requests(&stream);
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].0, 0);
        assert_eq!(requests[1].1.target, "/next");
        assert_eq!(requests[1].1.host.as_deref(), Some("b"));
    }

    #[test]
    fn object_name_strips_query_and_authority() {
        assert_eq!(object_name("/a?b"), "/a");
        assert_eq!(object_name("https://example.com"), "/");
        assert_eq!(object_name("/plain"), "/plain");
    }
}
