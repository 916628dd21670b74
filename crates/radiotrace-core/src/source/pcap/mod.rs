//! Capture file source.
//!
//! Opens a trace recorded on the device, tells classic pcap (micro- or
//! nanosecond clock, either byte order) from PCAPNG by its magic, and yields
//! one `PacketEvent` per captured frame stamped with the link type and clock
//! of the interface that recorded it.

pub mod error;
pub mod layout;
pub mod parser;
pub mod reader;

pub use parser::PcapFileSource;
