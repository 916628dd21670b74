/// Buffer size handed to the streaming pcap readers.
pub const PCAP_READER_BUFFER_SIZE: usize = 64 * 1024;

/// Section header block type, which doubles as the PCAPNG file magic.
pub const PCAPNG_MAGIC: [u8; 4] = [0x0a, 0x0d, 0x0d, 0x0a];

/// Classic pcap magic with microsecond timestamps.
pub const PCAP_MAGIC_MICROS: u32 = 0xa1b2_c3d4;
/// Classic pcap magic with nanosecond timestamps.
pub const PCAP_MAGIC_NANOS: u32 = 0xa1b2_3c4d;

/// PCAPNG interfaces without `if_tsresol` count microseconds.
pub const DEFAULT_TICK: f64 = 1e-6;
