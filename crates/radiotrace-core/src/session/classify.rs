//! Second-pass TCP classification: acknowledgements, window changes and
//! recovery of lost segments.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::packet::{Direction, Packet, PacketId, TcpInfo, TcpSegment};

const UPLINK: usize = 0;
const DOWNLINK: usize = 1;

fn direction_index(packet: &Packet) -> Option<usize> {
    match packet.direction {
        Direction::Uplink => Some(UPLINK),
        Direction::Downlink => Some(DOWNLINK),
        Direction::Unknown => None,
    }
}

/// Control flag a segment carries, in the precedence FIN, SYN, RST.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum FlagSignature {
    Plain,
    Fin,
    Syn,
    Rst,
}

/// Acknowledgement number together with the control flag it was sent with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct AckKey {
    ack: u32,
    signature: FlagSignature,
}

impl AckKey {
    fn new(segment: &TcpSegment) -> Self {
        let signature = if segment.flags.fin() {
            FlagSignature::Fin
        } else if segment.flags.syn() {
            FlagSignature::Syn
        } else if segment.flags.rst() {
            FlagSignature::Rst
        } else {
            FlagSignature::Plain
        };
        Self {
            ack: segment.ack,
            signature,
        }
    }
}

/// Sequence number just past a segment's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct SeqEnd(u32);

impl SeqEnd {
    fn new(segment: &TcpSegment, payload_len: usize) -> Self {
        Self(segment.seq.wrapping_add(payload_len as u32))
    }
}

fn is_bare(packet: &Packet, segment: &TcpSegment) -> bool {
    packet.payload_len() == 0 && !segment.flags.is_control()
}

/// Tag acknowledgements: first sightings, duplicates, window updates and
/// answers to keep-alive segments.
pub(crate) fn analyze_acks(packets: &mut [Packet], ids: &[PacketId]) {
    let mut windows: [HashMap<AckKey, u16>; 2] = Default::default();
    let mut keep_alives: [HashSet<u32>; 2] = Default::default();

    for &id in ids {
        let packet = &mut packets[id.0];
        let Some(segment) = packet.tcp().copied() else {
            continue;
        };
        if !segment.flags.ack() {
            continue;
        }
        let Some(dir) = direction_index(packet) else {
            warn!(packet = id.0, "no direction for acknowledgement");
            continue;
        };
        let other = 1 - dir;

        if packet.labels.tcp_info == Some(TcpInfo::KeepAlive) {
            keep_alives[dir].insert(segment.seq);
            continue;
        }

        let bare = is_bare(packet, &segment);
        let tag = if bare && keep_alives[other].contains(&segment.ack.wrapping_sub(1)) {
            Some(TcpInfo::KeepAliveAck)
        } else {
            match windows[dir].entry(AckKey::new(&segment)) {
                Entry::Vacant(entry) => {
                    entry.insert(segment.window);
                    bare.then_some(TcpInfo::Ack)
                }
                Entry::Occupied(mut entry) => {
                    let changed = *entry.get() != segment.window;
                    if changed {
                        entry.insert(segment.window);
                    }
                    match (packet.payload_len() == 0 && !segment.flags.rst(), changed) {
                        (true, false) => Some(TcpInfo::AckDup),
                        (true, true) => Some(TcpInfo::WindowUpdate),
                        (false, _) => None,
                    }
                }
            }
        };
        if let Some(tag) = tag {
            if matches!(tag, TcpInfo::KeepAliveAck | TcpInfo::Ack) {
                if let Some(previous) = packet.labels.tcp_info {
                    debug!(packet = id.0, ?previous, ?tag, "packet already tagged");
                }
            }
            packet.labels.tcp_info = Some(tag);
        }
    }
}

/// Bare segments advertising a zero receive window.
pub(crate) fn analyze_zero_window(packets: &mut [Packet], ids: &[PacketId]) {
    for &id in ids {
        let packet = &mut packets[id.0];
        let Some(segment) = packet.tcp().copied() else {
            continue;
        };
        if segment.window == 0 && is_bare(packet, &segment) {
            packet.labels.tcp_info = Some(TcpInfo::ZeroWindow);
        }
    }
}

/// Tag data answering a duplicate ACK and ACKs answering duplicate data.
pub(crate) fn analyze_recovery(packets: &mut [Packet], ids: &[PacketId]) {
    let mut dup_seq: [HashSet<SeqEnd>; 2] = Default::default();
    let mut dup_ack: [HashSet<u32>; 2] = Default::default();

    for &id in ids {
        let packet = &mut packets[id.0];
        let Some(segment) = packet.tcp().copied() else {
            continue;
        };
        let Some(dir) = direction_index(packet) else {
            continue;
        };
        let other = 1 - dir;
        let Some(info) = packet.labels.tcp_info else {
            continue;
        };

        if info == TcpInfo::DataDup {
            dup_seq[dir].insert(SeqEnd::new(&segment, packet.payload_len()));
        }
        // Duplicated data duplicates its acknowledgement too.
        if matches!(info, TcpInfo::AckDup | TcpInfo::DataDup) {
            dup_ack[dir].insert(segment.ack);
        }

        if info == TcpInfo::Data && dup_ack[other].contains(&segment.seq) {
            packet.labels.tcp_info = Some(TcpInfo::DataRecover);
        }
        if info == TcpInfo::Ack && dup_seq[other].contains(&SeqEnd(segment.ack)) {
            packet.labels.tcp_info = Some(TcpInfo::AckRecover);
        }

        // Once the sender has moved on, later data at the same sequence is
        // ordinary data again.
        if matches!(info, TcpInfo::Ack | TcpInfo::AckDup | TcpInfo::AckRecover) {
            dup_ack[other].remove(&segment.seq);
        }
        if matches!(info, TcpInfo::Data | TcpInfo::DataRecover) {
            dup_ack[dir].remove(&segment.ack);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{analyze_acks, analyze_recovery, analyze_zero_window};
    use crate::packet::{Direction, PacketId, TcpFlags, TcpInfo, Transport};
    use crate::session::reassembly::reassemble;
    use crate::session::tests::tcp_packet;

    const ACK: u8 = TcpFlags::ACK;

    fn ids(len: usize) -> Vec<PacketId> {
        (0..len).map(PacketId).collect()
    }

    #[test]
    fn repeated_ack_is_duplicate_and_window_change_is_update() {
        let mut packets = vec![
            tcp_packet(0, 0.0, Direction::Uplink, ACK, 1, 100, b""),
            tcp_packet(1, 0.1, Direction::Uplink, ACK, 1, 100, b""),
            tcp_packet(2, 0.2, Direction::Uplink, ACK, 1, 100, b""),
        ];
        if let Transport::Tcp(segment) = &mut packets[2].transport {
            segment.window = 2048;
        }
        let ids = ids(packets.len());
        analyze_acks(&mut packets, &ids);
        assert_eq!(packets[0].labels.tcp_info, Some(TcpInfo::Ack));
        assert_eq!(packets[1].labels.tcp_info, Some(TcpInfo::AckDup));
        assert_eq!(packets[2].labels.tcp_info, Some(TcpInfo::WindowUpdate));
    }

    #[test]
    fn answer_to_keep_alive() {
        let mut packets = vec![
            tcp_packet(0, 0.0, Direction::Uplink, ACK, 10, 1, b"abc"),
            tcp_packet(1, 0.1, Direction::Downlink, ACK, 1, 13, b""),
            tcp_packet(2, 30.0, Direction::Uplink, ACK, 12, 1, b""),
            tcp_packet(3, 30.1, Direction::Downlink, ACK, 1, 13, b""),
        ];
        let ids = ids(packets.len());
        reassemble(&mut packets, &ids);
        analyze_acks(&mut packets, &ids);
        assert_eq!(packets[2].labels.tcp_info, Some(TcpInfo::KeepAlive));
        assert_eq!(packets[3].labels.tcp_info, Some(TcpInfo::KeepAliveAck));
    }

    #[test]
    fn zero_window_overrides_ack() {
        let mut packets = vec![tcp_packet(0, 0.0, Direction::Downlink, ACK, 1, 1, b"")];
        if let Transport::Tcp(segment) = &mut packets[0].transport {
            segment.window = 0;
        }
        let ids = ids(1);
        analyze_acks(&mut packets, &ids);
        analyze_zero_window(&mut packets, &ids);
        assert_eq!(packets[0].labels.tcp_info, Some(TcpInfo::ZeroWindow));
    }

    #[test]
    fn data_after_duplicate_acks_is_recovery() {
        let mut packets = vec![
            tcp_packet(0, 0.0, Direction::Downlink, ACK, 1, 500, b""),
            tcp_packet(1, 0.1, Direction::Downlink, ACK, 1, 500, b""),
            tcp_packet(2, 0.2, Direction::Uplink, ACK, 500, 1, b"resent"),
        ];
        let ids = ids(packets.len());
        packets[2].labels.tcp_info = Some(TcpInfo::Data);
        analyze_acks(&mut packets, &ids);
        analyze_recovery(&mut packets, &ids);
        assert_eq!(packets[1].labels.tcp_info, Some(TcpInfo::AckDup));
        assert_eq!(packets[2].labels.tcp_info, Some(TcpInfo::DataRecover));
    }

    #[test]
    fn ack_after_duplicate_data_is_recovery() {
        let mut packets = vec![
            tcp_packet(0, 0.0, Direction::Downlink, ACK, 200, 1, b"xy"),
            tcp_packet(1, 0.5, Direction::Uplink, ACK, 1, 202, b""),
        ];
        packets[0].labels.tcp_info = Some(TcpInfo::DataDup);
        packets[1].labels.tcp_info = Some(TcpInfo::Ack);
        let ids = ids(packets.len());
        analyze_recovery(&mut packets, &ids);
        assert_eq!(packets[1].labels.tcp_info, Some(TcpInfo::AckRecover));
    }
}
