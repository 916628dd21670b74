pub const DNS_PORT: u16 = 53;

pub const HEADER_LEN: usize = 12;
pub const ID_OFFSET: usize = 0;
pub const FLAGS_OFFSET: usize = 2;
pub const QDCOUNT_OFFSET: usize = 4;
pub const ANCOUNT_OFFSET: usize = 6;

pub const FLAG_RESPONSE: u16 = 0x8000;

/// Type and class following a question name.
pub const QUESTION_TAIL_LEN: usize = 4;
/// Type, class, TTL and data length following an answer name.
pub const ANSWER_FIXED_LEN: usize = 10;
pub const ANSWER_TYPE_OFFSET: usize = 0;
pub const ANSWER_RDLENGTH_OFFSET: usize = 8;

pub const TYPE_A: u16 = 1;
pub const TYPE_AAAA: u16 = 28;

pub const LABEL_POINTER_MASK: u8 = 0xc0;
pub const MAX_POINTER_JUMPS: usize = 16;
