use crate::protocols::common::reader::read_u16_be;

use super::layout;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlsRecordHeader {
    pub content_type: u8,
    pub version: (u8, u8),
    pub length: u16,
}

/// Decode a TLS record header at the start of `payload`.
pub fn parse_record_header(payload: &[u8]) -> Option<TlsRecordHeader> {
    if payload.len() < layout::RECORD_HEADER_LEN {
        return None;
    }
    let content_type = payload[layout::CONTENT_TYPE_OFFSET];
    let major = payload[layout::VERSION_MAJOR_OFFSET];
    let minor = payload[layout::VERSION_MINOR_OFFSET];
    let length = read_u16_be(payload, layout::LENGTH_OFFSET)?;
    if !layout::CONTENT_TYPES.contains(&content_type)
        || major != layout::VERSION_MAJOR
        || length == 0
        || length > layout::MAX_RECORD_LEN
    {
        return None;
    }
    Some(TlsRecordHeader {
        content_type,
        version: (major, minor),
        length,
    })
}

pub fn is_tls_record(payload: &[u8]) -> bool {
    parse_record_header(payload).is_some()
}

#[cfg(test)]
mod tests {
    use super::{is_tls_record, parse_record_header};

    #[test]
    fn client_hello_header_is_detected() {
        let header = parse_record_header(&[0x16, 0x03, 0x01, 0x02, 0x00, 0x01]).unwrap();
        assert_eq!(header.content_type, 0x16);
        assert_eq!(header.version, (3, 1));
        assert_eq!(header.length, 0x200);
    }

    #[test]
    fn plain_text_is_not_tls() {
        assert!(!is_tls_record(b"GET / HTTP/1.1\r\n"));
        assert!(!is_tls_record(&[0x17, 0x03, 0x03]));
        assert!(!is_tls_record(&[0x17, 0x02, 0x00, 0x00, 0x10]));
        assert!(!is_tls_record(&[0x17, 0x03, 0x03, 0x00, 0x00]));
    }
}
