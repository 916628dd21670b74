use super::error::DnsError;
use super::layout;

pub struct DnsReader<'a> {
    payload: &'a [u8],
}

impl<'a> DnsReader<'a> {
    pub fn new(payload: &'a [u8]) -> Self {
        Self { payload }
    }

    pub fn require_len(&self, needed: usize) -> Result<(), DnsError> {
        if self.payload.len() < needed {
            return Err(DnsError::TooShort {
                needed,
                actual: self.payload.len(),
            });
        }
        Ok(())
    }

    pub fn read_u8(&self, offset: usize) -> Result<u8, DnsError> {
        self.payload
            .get(offset)
            .copied()
            .ok_or(DnsError::TooShort {
                needed: offset + 1,
                actual: self.payload.len(),
            })
    }

    pub fn read_u16_be(&self, offset: usize) -> Result<u16, DnsError> {
        let bytes = self.read_slice(offset..offset + 2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_slice(&self, range: std::ops::Range<usize>) -> Result<&'a [u8], DnsError> {
        self.payload.get(range.clone()).ok_or(DnsError::TooShort {
            needed: range.end,
            actual: self.payload.len(),
        })
    }

    /// Read a possibly compressed domain name starting at `offset`.
    ///
    /// Returns the dotted name and the offset just past the name in the
    /// original position (pointers do not advance it beyond the pointer).
    pub fn read_name(&self, offset: usize) -> Result<(String, usize), DnsError> {
        let mut labels: Vec<String> = Vec::new();
        let mut cursor = offset;
        let mut resume = None;
        let mut jumps = 0;

        loop {
            let len = self.read_u8(cursor)?;
            if len == 0 {
                cursor += 1;
                break;
            }
            match len & layout::LABEL_POINTER_MASK {
                0x00 => {
                    let start = cursor + 1;
                    let label = self.read_slice(start..start + len as usize)?;
                    labels.push(String::from_utf8_lossy(label).into_owned());
                    cursor = start + len as usize;
                }
                layout::LABEL_POINTER_MASK => {
                    jumps += 1;
                    if jumps > layout::MAX_POINTER_JUMPS {
                        return Err(DnsError::PointerLoop { jumps });
                    }
                    let low = self.read_u8(cursor + 1)?;
                    if resume.is_none() {
                        resume = Some(cursor + 2);
                    }
                    cursor = (usize::from(len & !layout::LABEL_POINTER_MASK) << 8) | usize::from(low);
                }
                _ => return Err(DnsError::InvalidLabel { value: len }),
            }
        }

        Ok((labels.join("."), resume.unwrap_or(cursor)))
    }
}

#[cfg(test)]
mod tests {
    use super::DnsReader;
    use crate::protocols::dns::error::DnsError;

    #[test]
    fn read_plain_name() {
        let bytes = b"\x03www\x07example\x03com\x00rest";
        let reader = DnsReader::new(bytes);
        let (name, next) = reader.read_name(0).unwrap();
        assert_eq!(name, "www.example.com");
        assert_eq!(next, 17);
    }

    #[test]
    fn read_compressed_name() {
        let mut bytes = b"\x07example\x03com\x00".to_vec();
        bytes.extend_from_slice(b"\x03api\xc0\x00");
        let reader = DnsReader::new(&bytes);
        let (name, next) = reader.read_name(13).unwrap();
        assert_eq!(name, "api.example.com");
        assert_eq!(next, bytes.len());
    }

    #[test]
    fn pointer_loop_is_rejected() {
        let bytes = [0xc0, 0x00];
        let reader = DnsReader::new(&bytes);
        let err = reader.read_name(0).unwrap_err();
        assert!(matches!(err, DnsError::PointerLoop { .. }));
    }

    #[test]
    fn truncated_label_is_too_short() {
        let bytes = b"\x05ab";
        let reader = DnsReader::new(bytes);
        let err = reader.read_name(0).unwrap_err();
        assert!(matches!(err, DnsError::TooShort { .. }));
    }
}
