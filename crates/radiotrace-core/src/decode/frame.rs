use std::net::IpAddr;

use etherparse::{NetSlice, SlicedPacket, TransportSlice};
use pcap_parser::Linktype;

use crate::packet::{TcpFlags, TcpSegment, Transport};

use super::error::DecodeError;

/// IP-level view of one captured frame.
#[derive(Debug)]
pub struct Frame<'a> {
    pub src: IpAddr,
    pub dst: IpAddr,
    /// Datagram length from the IP header.
    pub ip_len: u32,
    pub transport: Transport,
    pub payload: &'a [u8],
}

/// Decode a link-layer frame down to its transport payload.
///
/// Returns `Ok(None)` for unsupported link types and frames that do not carry IP.
pub fn decode_frame(linktype: Linktype, data: &[u8]) -> Result<Option<Frame<'_>>, DecodeError> {
    let sliced = match linktype {
        Linktype::ETHERNET => SlicedPacket::from_ethernet(data),
        Linktype::LINUX_SLL => SlicedPacket::from_linux_sll(data),
        Linktype::RAW | Linktype::IPV4 | Linktype::IPV6 => SlicedPacket::from_ip(data),
        _ => return Ok(None),
    }
    .map_err(|e| DecodeError::Slice(e.to_string()))?;

    let net = match sliced.net {
        Some(net) => net,
        None if sliced.transport.is_none() => return Ok(None),
        None => return Err(DecodeError::MissingNetworkLayer),
    };

    let (src, dst, ip_len) = match net {
        NetSlice::Ipv4(ref ipv4) => (
            IpAddr::V4(ipv4.header().source_addr()),
            IpAddr::V4(ipv4.header().destination_addr()),
            u32::from(ipv4.header().total_len()),
        ),
        NetSlice::Ipv6(ref ipv6) => (
            IpAddr::V6(ipv6.header().source_addr()),
            IpAddr::V6(ipv6.header().destination_addr()),
            u32::from(ipv6.header().payload_length()) + 40,
        ),
    };
    let ip_payload = net.ip_payload_ref().ok_or(DecodeError::MissingIpPayload)?;

    let (transport, payload) = match sliced.transport {
        Some(TransportSlice::Tcp(tcp)) => {
            let mut bits = 0u8;
            for (set, bit) in [
                (tcp.fin(), TcpFlags::FIN),
                (tcp.syn(), TcpFlags::SYN),
                (tcp.rst(), TcpFlags::RST),
                (tcp.psh(), TcpFlags::PSH),
                (tcp.ack(), TcpFlags::ACK),
            ] {
                if set {
                    bits |= bit;
                }
            }
            let segment = TcpSegment {
                src_port: tcp.source_port(),
                dst_port: tcp.destination_port(),
                seq: tcp.sequence_number(),
                ack: tcp.acknowledgment_number(),
                flags: TcpFlags::new(bits),
                window: tcp.window_size(),
            };
            (Transport::Tcp(segment), tcp.payload())
        }
        Some(TransportSlice::Udp(udp)) => (
            Transport::Udp {
                src_port: udp.source_port(),
                dst_port: udp.destination_port(),
            },
            udp.payload(),
        ),
        _ => (Transport::Other(ip_payload.ip_number.0), ip_payload.payload),
    };

    Ok(Some(Frame {
        src,
        dst,
        ip_len,
        transport,
        payload,
    }))
}

#[cfg(test)]
mod tests {
    use super::decode_frame;
    use crate::decode::error::DecodeError;
    use crate::packet::Transport;
    use etherparse::PacketBuilder;
    use pcap_parser::Linktype;

    #[test]
    fn decode_tcp_segment() {
        let builder = PacketBuilder::ethernet2([1, 2, 3, 4, 5, 6], [7, 8, 9, 10, 11, 12])
            .ipv4([10, 0, 0, 2], [93, 184, 216, 34], 64)
            .tcp(40000, 80, 1000, 4096)
            .syn()
            .ack(77);
        let payload = [];
        let mut packet = Vec::<u8>::with_capacity(builder.size(payload.len()));
        builder.write(&mut packet, &payload).unwrap();

        let frame = decode_frame(Linktype::ETHERNET, &packet).unwrap().unwrap();
        let segment = frame.transport.tcp().copied().unwrap();
        assert_eq!(segment.src_port, 40000);
        assert_eq!(segment.seq, 1000);
        assert_eq!(segment.ack, 77);
        assert_eq!(segment.window, 4096);
        assert!(segment.flags.syn() && segment.flags.ack());
        assert_eq!(frame.ip_len, 40);
    }

    #[test]
    fn decode_raw_udp_datagram() {
        let builder = PacketBuilder::ipv4([10, 0, 0, 2], [8, 8, 8, 8], 64).udp(5353, 53);
        let payload = [1, 2, 3, 4];
        let mut packet = Vec::<u8>::with_capacity(builder.size(payload.len()));
        builder.write(&mut packet, &payload).unwrap();

        let frame = decode_frame(Linktype::RAW, &packet).unwrap().unwrap();
        assert!(matches!(
            frame.transport,
            Transport::Udp {
                src_port: 5353,
                dst_port: 53
            }
        ));
        assert_eq!(frame.payload, payload);
    }

    #[test]
    fn unsupported_linktype_is_skipped() {
        let parsed = decode_frame(Linktype::NULL, &[0u8; 4]).unwrap();
        assert!(parsed.is_none());
    }

    #[test]
    fn empty_frame_is_a_slice_error() {
        let result = decode_frame(Linktype::ETHERNET, &[]);
        assert!(matches!(result, Err(DecodeError::Slice(_))));
    }
}
