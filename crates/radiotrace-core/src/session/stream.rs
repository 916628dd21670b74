use std::collections::BTreeMap;

use crate::packet::PacketId;

/// Reassembled application bytes of one direction of a session.
///
/// Every appended payload records the offset it starts at, so any byte of
/// the stream can be traced back to the packet that carried it.
///
/// # Examples
/// ```
/// use radiotrace_core::PacketId;
/// use radiotrace_core::session::ByteStream;
///
/// let mut stream = ByteStream::default();
/// stream.append(PacketId(3), b"GET ");
/// stream.append(PacketId(5), b"/ HTTP/1.1");
/// assert_eq!(stream.packet_at(2), Some(PacketId(3)));
/// assert_eq!(stream.packet_at(4), Some(PacketId(5)));
/// assert_eq!(stream.packet_at(14), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ByteStream {
    data: Vec<u8>,
    offsets: BTreeMap<usize, PacketId>,
}

impl ByteStream {
    /// Append a payload. Empty payloads are ignored.
    pub fn append(&mut self, packet: PacketId, payload: &[u8]) {
        if payload.is_empty() {
            return;
        }
        self.offsets.insert(self.data.len(), packet);
        self.data.extend_from_slice(payload);
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Start offset of every appended payload, mapped to its packet.
    pub fn offsets(&self) -> &BTreeMap<usize, PacketId> {
        &self.offsets
    }

    /// Packet that carried the byte at `offset`.
    pub fn packet_at(&self, offset: usize) -> Option<PacketId> {
        if offset >= self.data.len() {
            return None;
        }
        self.offsets
            .range(..=offset)
            .next_back()
            .map(|(_, packet)| *packet)
    }
}
