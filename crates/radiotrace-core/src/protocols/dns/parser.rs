use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use super::error::DnsError;
use super::layout;
use super::reader::DnsReader;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsMessage {
    pub id: u16,
    pub is_response: bool,
    /// Name of the first question.
    pub domain_name: String,
    /// A and AAAA records of the answer section, in message order.
    pub addresses: Vec<IpAddr>,
}

/// Decode a DNS message carried in a UDP payload.
///
/// Returns `Ok(None)` for messages without a question.
pub fn parse_dns(payload: &[u8]) -> Result<Option<DnsMessage>, DnsError> {
    let reader = DnsReader::new(payload);
    reader.require_len(layout::HEADER_LEN)?;

    let id = reader.read_u16_be(layout::ID_OFFSET)?;
    let flags = reader.read_u16_be(layout::FLAGS_OFFSET)?;
    let qdcount = reader.read_u16_be(layout::QDCOUNT_OFFSET)?;
    let ancount = reader.read_u16_be(layout::ANCOUNT_OFFSET)?;
    if qdcount == 0 {
        return Ok(None);
    }

    let (domain_name, mut offset) = reader.read_name(layout::HEADER_LEN)?;
    offset += layout::QUESTION_TAIL_LEN;
    for _ in 1..qdcount {
        let (_, next) = reader.read_name(offset)?;
        offset = next + layout::QUESTION_TAIL_LEN;
    }

    let is_response = flags & layout::FLAG_RESPONSE != 0;
    let mut addresses = Vec::new();
    if is_response {
        for _ in 0..ancount {
            let (_, fixed) = reader.read_name(offset)?;
            let rtype = reader.read_u16_be(fixed + layout::ANSWER_TYPE_OFFSET)?;
            let rdlength = reader.read_u16_be(fixed + layout::ANSWER_RDLENGTH_OFFSET)? as usize;
            let data_start = fixed + layout::ANSWER_FIXED_LEN;
            let data = reader.read_slice(data_start..data_start + rdlength)?;
            match (rtype, data.len()) {
                (layout::TYPE_A, 4) => {
                    addresses.push(IpAddr::V4(Ipv4Addr::new(data[0], data[1], data[2], data[3])));
                }
                (layout::TYPE_AAAA, 16) => {
                    let mut octets = [0u8; 16];
                    octets.copy_from_slice(data);
                    addresses.push(IpAddr::V6(Ipv6Addr::from(octets)));
                }
                _ => {}
            }
            offset = data_start + rdlength;
        }
    }

    Ok(Some(DnsMessage {
        id,
        is_response,
        domain_name,
        addresses,
    }))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::parse_dns;
    use crate::protocols::dns::error::DnsError;
    use std::net::IpAddr;

    /// Build a query or a response carrying A records for `name`.
    pub(crate) fn dns_message(id: u16, name: &str, answers: &[[u8; 4]]) -> Vec<u8> {
        let mut msg = Vec::new();
        msg.extend_from_slice(&id.to_be_bytes());
        let flags: u16 = if answers.is_empty() { 0x0100 } else { 0x8180 };
        msg.extend_from_slice(&flags.to_be_bytes());
        msg.extend_from_slice(&1u16.to_be_bytes());
        msg.extend_from_slice(&(answers.len() as u16).to_be_bytes());
        msg.extend_from_slice(&[0, 0, 0, 0]);
        for label in name.split('.') {
            msg.push(label.len() as u8);
            msg.extend_from_slice(label.as_bytes());
        }
        msg.push(0);
        msg.extend_from_slice(&[0, 1, 0, 1]);
        for addr in answers {
            msg.extend_from_slice(&[0xc0, 0x0c]);
            msg.extend_from_slice(&[0, 1, 0, 1]);
            msg.extend_from_slice(&60u32.to_be_bytes());
            msg.extend_from_slice(&4u16.to_be_bytes());
            msg.extend_from_slice(addr);
        }
        msg
    }

    #[test]
    fn parse_query() {
        let msg = dns_message(7, "example.com", &[]);
        let parsed = parse_dns(&msg).unwrap().unwrap();
        assert_eq!(parsed.id, 7);
        assert!(!parsed.is_response);
        assert_eq!(parsed.domain_name, "example.com");
        assert!(parsed.addresses.is_empty());
    }

    #[test]
    fn parse_response_with_compressed_answers() {
        let msg = dns_message(7, "api.example.com", &[[93, 184, 216, 34], [93, 184, 216, 35]]);
        let parsed = parse_dns(&msg).unwrap().unwrap();
        assert!(parsed.is_response);
        assert_eq!(
            parsed.addresses,
            vec![
                "93.184.216.34".parse::<IpAddr>().unwrap(),
                "93.184.216.35".parse::<IpAddr>().unwrap()
            ]
        );
    }

    #[test]
    fn message_without_question_is_ignored() {
        let msg = [0u8; 12];
        assert!(parse_dns(&msg).unwrap().is_none());
    }

    #[test]
    fn truncated_answer_is_an_error() {
        let mut msg = dns_message(7, "example.com", &[[1, 2, 3, 4]]);
        msg.truncate(msg.len() - 2);
        let err = parse_dns(&msg).unwrap_err();
        assert!(matches!(err, DnsError::TooShort { .. }));
    }

    #[test]
    fn short_header_is_an_error() {
        let err = parse_dns(&[0u8; 5]).unwrap_err();
        assert!(matches!(
            err,
            DnsError::TooShort {
                needed: 12,
                actual: 5
            }
        ));
    }
}
