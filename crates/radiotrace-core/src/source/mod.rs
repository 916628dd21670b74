mod pcap;

pub use pcap::PcapFileSource;

use std::collections::VecDeque;

use pcap_parser::Linktype;
use thiserror::Error;

/// One captured frame as delivered by a capture source.
#[derive(Debug, Clone)]
pub struct PacketEvent {
    /// Capture timestamp in seconds, when the source provides one.
    pub ts: Option<f64>,
    pub linktype: Linktype,
    /// Frame length on the wire (may exceed `data.len()` for snapped captures).
    pub orig_len: u32,
    pub data: Vec<u8>,
}

pub trait PacketSource {
    fn next_packet(&mut self) -> Result<Option<PacketEvent>, SourceError>;
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unreadable capture: {0}")]
    Pcap(String),
}

impl From<pcap::error::CaptureError> for SourceError {
    fn from(value: pcap::error::CaptureError) -> Self {
        match value {
            pcap::error::CaptureError::Read(err) => SourceError::Io(err),
            other => SourceError::Pcap(other.to_string()),
        }
    }
}

/// In-memory packet source, mainly for tests and pre-decoded traces.
///
/// # Examples
/// ```
/// use pcap_parser::Linktype;
/// use radiotrace_core::{PacketEvent, PacketSource, VecSource};
///
/// let mut source = VecSource::new(vec![PacketEvent {
///     ts: Some(1.0),
///     linktype: Linktype::RAW,
///     orig_len: 0,
///     data: Vec::new(),
/// }]);
/// assert!(source.next_packet()?.is_some());
/// assert!(source.next_packet()?.is_none());
/// # Ok::<(), radiotrace_core::SourceError>(())
/// ```
#[derive(Debug, Default)]
pub struct VecSource {
    events: VecDeque<PacketEvent>,
}

impl VecSource {
    pub fn new(events: Vec<PacketEvent>) -> Self {
        Self {
            events: events.into(),
        }
    }
}

impl PacketSource for VecSource {
    fn next_packet(&mut self) -> Result<Option<PacketEvent>, SourceError> {
        Ok(self.events.pop_front())
    }
}
