//! Frame builders and capture writers shared by the integration tests.
#![allow(dead_code)]

use std::fs;
use std::net::IpAddr;
use std::path::Path;

use etherparse::PacketBuilder;
use pcap_parser::Linktype;
use radiotrace_core::decode::{DirectionResolver, TraceDecoder};
use radiotrace_core::{Packet, PacketEvent};

pub const DEVICE: [u8; 4] = [10, 0, 0, 2];
pub const SERVER: [u8; 4] = [93, 184, 216, 34];
pub const SERVER_PORT: u16 = 80;

const DEVICE_MAC: [u8; 6] = [0x02, 0x00, 0x00, 0x00, 0x00, 0x02];
const GATEWAY_MAC: [u8; 6] = [0x02, 0x00, 0x00, 0x00, 0x00, 0x01];

pub const FIN: u8 = 0x01;
pub const SYN: u8 = 0x02;
pub const RST: u8 = 0x04;
pub const PSH: u8 = 0x08;
pub const ACK: u8 = 0x10;

/// Timestamped Ethernet frame.
pub type Frame = (f64, Vec<u8>);

/// Ethernet/IPv4/TCP frame between the device and the server. `uplink`
/// frames go from the device's `local_port` to the server.
pub fn tcp(uplink: bool, local_port: u16, flags: u8, seq: u32, ack: u32, payload: &[u8]) -> Vec<u8> {
    let (src_mac, dst_mac, src, dst, src_port, dst_port) = if uplink {
        (DEVICE_MAC, GATEWAY_MAC, DEVICE, SERVER, local_port, SERVER_PORT)
    } else {
        (GATEWAY_MAC, DEVICE_MAC, SERVER, DEVICE, SERVER_PORT, local_port)
    };
    let mut builder = PacketBuilder::ethernet2(src_mac, dst_mac)
        .ipv4(src, dst, 64)
        .tcp(src_port, dst_port, seq, 65535);
    if flags & SYN != 0 {
        builder = builder.syn();
    }
    if flags & FIN != 0 {
        builder = builder.fin();
    }
    if flags & RST != 0 {
        builder = builder.rst();
    }
    if flags & PSH != 0 {
        builder = builder.psh();
    }
    if flags & ACK != 0 {
        builder = builder.ack(ack);
    }
    let mut frame = Vec::with_capacity(builder.size(payload.len()));
    builder.write(&mut frame, payload).expect("build tcp frame");
    frame
}

pub fn udp(uplink: bool, local_port: u16, remote_port: u16, payload: &[u8]) -> Vec<u8> {
    let (src_mac, dst_mac, src, dst, src_port, dst_port) = if uplink {
        (DEVICE_MAC, GATEWAY_MAC, DEVICE, SERVER, local_port, remote_port)
    } else {
        (GATEWAY_MAC, DEVICE_MAC, SERVER, DEVICE, remote_port, local_port)
    };
    let builder = PacketBuilder::ethernet2(src_mac, dst_mac)
        .ipv4(src, dst, 64)
        .udp(src_port, dst_port);
    let mut frame = Vec::with_capacity(builder.size(payload.len()));
    builder.write(&mut frame, payload).expect("build udp frame");
    frame
}

/// One HTTP connection: handshake and a GET for `path` on `host`, then a
/// short response. Sequence numbers are derived from `n` so repeated
/// connections on the same port stay distinct sessions.
pub fn http_poll(start: f64, n: u32, host: &str, path: &str) -> Vec<Frame> {
    let client = 1_000 * (n + 1);
    let server = 50_000 * (n + 1);
    let request = format!("GET {path} HTTP/1.1\r\nHost: {host}\r\n\r\n");
    let response = b"HTTP/1.1 204 No Content\r\n\r\n";
    vec![
        (start, tcp(true, 40000, SYN, client, 0, &[])),
        (start + 0.05, tcp(false, 40000, SYN | ACK, server, client + 1, &[])),
        (start + 0.06, tcp(true, 40000, ACK | PSH, client + 1, server + 1, request.as_bytes())),
        (
            start + 0.11,
            tcp(
                false,
                40000,
                ACK | PSH,
                server + 1,
                client + 1 + request.len() as u32,
                response,
            ),
        ),
    ]
}

/// Decode frames the way the pipeline does, with the device as the only
/// local address. Timestamps are rebased to the first frame.
pub fn decode(frames: &[Frame]) -> Vec<Packet> {
    let mut decoder = TraceDecoder::new();
    for (ts, data) in frames {
        decoder.push(&PacketEvent {
            ts: Some(*ts),
            linktype: Linktype::ETHERNET,
            orig_len: data.len() as u32,
            data: data.clone(),
        });
    }
    decoder
        .finish(Some(DirectionResolver::new([IpAddr::from(DEVICE)])))
        .packets
}

/// Little-endian PCAPNG with one Ethernet interface counting nanoseconds.
pub fn write_pcapng(path: &Path, frames: &[Frame]) {
    let mut output = Vec::new();

    let mut shb = Vec::new();
    shb.extend_from_slice(&0x1A2B_3C4Du32.to_le_bytes());
    shb.extend_from_slice(&1u16.to_le_bytes());
    shb.extend_from_slice(&0u16.to_le_bytes());
    shb.extend_from_slice(&(-1i64).to_le_bytes());
    output.extend_from_slice(&block(0x0A0D_0D0A, &shb));

    let mut idb = Vec::new();
    idb.extend_from_slice(&1u16.to_le_bytes());
    idb.extend_from_slice(&0u16.to_le_bytes());
    idb.extend_from_slice(&65535u32.to_le_bytes());
    // if_tsresol = 9
    idb.extend_from_slice(&9u16.to_le_bytes());
    idb.extend_from_slice(&1u16.to_le_bytes());
    idb.extend_from_slice(&[9, 0, 0, 0]);
    // opt_endofopt
    idb.extend_from_slice(&[0, 0, 0, 0]);
    output.extend_from_slice(&block(1, &idb));

    for (ts, data) in frames {
        let ticks = (ts * 1e9).round() as u64;
        let mut epb = Vec::new();
        epb.extend_from_slice(&0u32.to_le_bytes());
        epb.extend_from_slice(&((ticks >> 32) as u32).to_le_bytes());
        epb.extend_from_slice(&(ticks as u32).to_le_bytes());
        epb.extend_from_slice(&(data.len() as u32).to_le_bytes());
        epb.extend_from_slice(&(data.len() as u32).to_le_bytes());
        epb.extend_from_slice(data);
        epb.resize(epb.len().next_multiple_of(4), 0);
        output.extend_from_slice(&block(6, &epb));
    }

    fs::write(path, output).expect("write pcapng");
}

fn block(block_type: u32, body: &[u8]) -> Vec<u8> {
    let total_len = (8 + body.len() + 4) as u32;
    let mut block = Vec::with_capacity(total_len as usize);
    block.extend_from_slice(&block_type.to_le_bytes());
    block.extend_from_slice(&total_len.to_le_bytes());
    block.extend_from_slice(body);
    block.extend_from_slice(&total_len.to_le_bytes());
    block
}

/// Classic little-endian pcap with microsecond timestamps.
pub fn write_pcap(path: &Path, frames: &[Frame]) {
    let mut output = Vec::new();
    output.extend_from_slice(&0xa1b2_c3d4u32.to_le_bytes());
    output.extend_from_slice(&2u16.to_le_bytes());
    output.extend_from_slice(&4u16.to_le_bytes());
    output.extend_from_slice(&0i32.to_le_bytes());
    output.extend_from_slice(&0u32.to_le_bytes());
    output.extend_from_slice(&65535u32.to_le_bytes());
    output.extend_from_slice(&1u32.to_le_bytes());

    for (ts, data) in frames {
        let micros = (ts * 1e6).round() as u64;
        output.extend_from_slice(&((micros / 1_000_000) as u32).to_le_bytes());
        output.extend_from_slice(&((micros % 1_000_000) as u32).to_le_bytes());
        output.extend_from_slice(&(data.len() as u32).to_le_bytes());
        output.extend_from_slice(&(data.len() as u32).to_le_bytes());
        output.extend_from_slice(data);
    }

    fs::write(path, output).expect("write pcap");
}
