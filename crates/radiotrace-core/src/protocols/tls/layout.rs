pub const RECORD_HEADER_LEN: usize = 5;
pub const CONTENT_TYPE_OFFSET: usize = 0;
pub const VERSION_MAJOR_OFFSET: usize = 1;
pub const VERSION_MINOR_OFFSET: usize = 2;
pub const LENGTH_OFFSET: usize = 3;

/// change_cipher_spec, alert, handshake, application_data
pub const CONTENT_TYPES: std::ops::RangeInclusive<u8> = 20..=23;
pub const VERSION_MAJOR: u8 = 3;
/// 2^14 plus the largest expansion allowed for protected records.
pub const MAX_RECORD_LEN: u16 = 16384 + 2048;
