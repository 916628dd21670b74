use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::packet::{Direction, Packet, PacketId, TcpInfo};

use super::stream::ByteStream;
use super::{Termination, TerminationKind};

/// Sequence tracking for one direction of a TCP session.
#[derive(Debug, Default)]
struct DirectionState {
    base_seq: Option<u32>,
    /// Next expected sequence number, relative to `base_seq`.
    expected: Option<u32>,
    /// Segments that arrived ahead of `expected`, by relative sequence number.
    pending: BTreeMap<u32, Vec<PacketId>>,
    stream: ByteStream,
}

impl DirectionState {
    fn relative(&self, seq: u32) -> u32 {
        seq.wrapping_sub(self.base_seq.unwrap_or(seq))
    }

    /// Whether `relative` lies ahead of the next expected sequence number,
    /// comparing in serial-number space.
    fn is_ahead(&self, relative: u32) -> bool {
        let expected = self.expected.unwrap_or(relative);
        relative != expected && relative.wrapping_sub(expected) < 1 << 31
    }

    /// Consume the segment sitting exactly at `expected`.
    fn accept(&mut self, packets: &mut [Packet], id: PacketId) {
        let packet = &mut packets[id.0];
        let Some(segment) = packet.tcp().copied() else {
            return;
        };
        let mut next = self.expected.unwrap_or(0);
        if !packet.payload.is_empty() {
            packet.labels.tcp_info = Some(TcpInfo::Data);
            self.stream.append(id, &packet.payload);
            next = next.wrapping_add(packet.payload.len() as u32);
        }
        if segment.flags.syn() || segment.flags.fin() {
            next = next.wrapping_add(1);
        }
        self.expected = Some(next);
    }

    /// Append buffered segments that became contiguous, until none do. A
    /// second segment buffered at the same position is a retransmission.
    fn drain_pending(&mut self, packets: &mut [Packet]) {
        while let Some(expected) = self.expected {
            let Some(ids) = self.pending.remove(&expected) else {
                break;
            };
            for id in ids {
                let relative = packets[id.0].tcp().map(|segment| self.relative(segment.seq));
                if relative == self.expected {
                    self.accept(packets, id);
                } else {
                    mark_duplicate(&mut packets[id.0]);
                }
            }
        }
    }

    /// Buffered segments that never became contiguous were overtaken by
    /// overlapping data.
    fn mark_duplicates(&self, packets: &mut [Packet]) {
        for id in self.pending.values().flatten() {
            mark_duplicate(&mut packets[id.0]);
        }
    }
}

fn mark_duplicate(packet: &mut Packet) {
    if !packet.payload.is_empty() {
        packet.labels.tcp_info = Some(TcpInfo::DataDup);
    }
}

pub(crate) struct Reassembled {
    /// Packets that stay in the session.
    pub packets: Vec<PacketId>,
    /// Packets from a reused key, starting at the new establish packet.
    pub remainder: Option<Vec<PacketId>>,
    pub uplink: ByteStream,
    pub downlink: ByteStream,
    pub termination: Option<Termination>,
}

/// Rebuild both byte streams of one TCP session and tag its packets.
pub(crate) fn reassemble(packets: &mut [Packet], ids: &[PacketId]) -> Reassembled {
    let mut uplink = DirectionState::default();
    let mut downlink = DirectionState::default();
    let mut terminated = false;
    let mut termination = None;
    let mut last_ts: Option<f64> = None;
    let mut last_data_ts: Option<f64> = None;
    let mut split_at = None;

    for (index, &id) in ids.iter().enumerate() {
        packets[id.0].labels.tcp_info = None;
        let Some(segment) = packets[id.0].tcp().copied() else {
            continue;
        };
        let timestamp = packets[id.0].timestamp;
        let payload_len = packets[id.0].payload_len();
        let (this, other) = match packets[id.0].direction {
            Direction::Uplink => (&mut uplink, &mut downlink),
            Direction::Downlink => (&mut downlink, &mut uplink),
            Direction::Unknown => {
                warn!(packet = id.0, "no direction for packet");
                continue;
            }
        };

        if segment.flags.syn() {
            packets[id.0].labels.tcp_info = Some(TcpInfo::Establish);
            match this.base_seq {
                Some(base) if base != segment.seq => {
                    if !terminated {
                        warn!(
                            packet = id.0,
                            "session key reused before termination was seen"
                        );
                    }
                    split_at = Some(index);
                    break;
                }
                _ => {
                    this.base_seq = Some(segment.seq);
                    if payload_len != 0 {
                        debug!(packet = id.0, "payload in establish packet");
                    }
                }
            }
        } else {
            if segment.flags.fin() || segment.flags.rst() {
                let kind = if segment.flags.fin() {
                    TerminationKind::Close
                } else {
                    TerminationKind::Reset
                };
                if !terminated {
                    if let Some(previous) = last_data_ts.or(last_ts) {
                        termination = Some(Termination {
                            packet: id,
                            kind,
                            delay: timestamp - previous,
                        });
                    }
                }
                terminated = true;
                packets[id.0].labels.tcp_info = Some(match kind {
                    TerminationKind::Close => TcpInfo::Close,
                    TerminationKind::Reset => TcpInfo::Reset,
                });
            }

            // Capture started mid-connection.
            if this.base_seq.is_none() {
                this.base_seq = Some(segment.seq);
                if other.base_seq.is_none() {
                    other.base_seq = Some(segment.ack);
                }
            }
        }

        let relative = this.relative(segment.seq);
        let expected = *this.expected.get_or_insert(relative);
        if relative == expected {
            this.accept(packets, id);
            this.drain_pending(packets);
        } else if payload_len == 0
            && relative == expected.wrapping_sub(1)
            && segment.flags.ack()
            && !segment.flags.is_control()
        {
            packets[id.0].labels.tcp_info = Some(TcpInfo::KeepAlive);
        } else if this.is_ahead(relative) {
            this.pending.entry(relative).or_default().push(id);
        } else {
            mark_duplicate(&mut packets[id.0]);
        }

        if payload_len > 0 {
            last_data_ts = Some(timestamp);
        }
        last_ts = Some(timestamp);
    }

    uplink.mark_duplicates(packets);
    downlink.mark_duplicates(packets);

    let (kept, remainder) = match split_at {
        Some(index) => (ids[..index].to_vec(), Some(ids[index..].to_vec())),
        None => (ids.to_vec(), None),
    };
    Reassembled {
        packets: kept,
        remainder,
        uplink: uplink.stream,
        downlink: downlink.stream,
        termination,
    }
}
