//! TCP and UDP session reconstruction.
//!
//! Packets are grouped by `(local port, remote port, remote address)`. TCP
//! sessions are reassembled per direction in sequence order, then tagged in a
//! second pass (acknowledgements, window changes, recovery). UDP datagrams that
//! are not name resolution for a TCP session form sessions of their own, with
//! payloads appended in arrival order.
//!
//! Sessions carry the remote host name learned from DNS or from the first
//! HTTP `Host` header, the HTTP request heads found in the uplink stream and a
//! TLS flag.

pub(crate) mod classify;
pub(crate) mod reassembly;
mod stream;
mod udp;

use std::collections::HashMap;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::analysis::{AnalysisError, CancelToken};
use crate::packet::{Packet, PacketId, SessionId};
use crate::protocols::dns::{DnsMessage, layout::DNS_PORT, parse_dns};
use crate::protocols::http::{find_requests, object_name};
use crate::protocols::tls::is_tls_record;

pub use stream::ByteStream;

/// Identity of a conversation as seen from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SessionKey {
    pub local_port: u16,
    pub remote_port: u16,
    pub remote_addr: IpAddr,
}

impl SessionKey {
    pub fn of(packet: &Packet) -> Option<Self> {
        let (local_port, remote_port) = packet.local_remote_ports()?;
        Some(Self {
            local_port,
            remote_port,
            remote_addr: packet.remote_addr()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionProtocol {
    Tcp,
    Udp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationKind {
    Close,
    Reset,
}

/// First FIN or RST of a session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Termination {
    pub packet: PacketId,
    pub kind: TerminationKind,
    /// Seconds since the last payload-bearing packet (or the previous packet).
    pub delay: f64,
}

/// HTTP request head located in a session's uplink stream.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// Offset of the request line in the uplink stream.
    pub offset: usize,
    /// Packet carrying the first byte of the request.
    pub packet: PacketId,
    pub timestamp: f64,
    pub method: String,
    pub host: Option<String>,
    /// Request path without query string.
    pub object: String,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub key: SessionKey,
    pub protocol: SessionProtocol,
    /// Member packets in trace order.
    pub packets: Vec<PacketId>,
    pub uplink: ByteStream,
    pub downlink: ByteStream,
    pub termination: Option<Termination>,
    pub tls: bool,
    pub remote_host: Option<String>,
    /// Host name used for reporting: HTTP host, DNS name or the remote address.
    pub domain_name: String,
    pub dns_request: Option<PacketId>,
    pub dns_response: Option<PacketId>,
    pub requests: Vec<HttpRequest>,
    /// Sum of on-wire IP lengths.
    pub bytes_transferred: u64,
}

impl Session {
    fn new(key: SessionKey, protocol: SessionProtocol) -> Self {
        Self {
            id: SessionId(0),
            key,
            protocol,
            packets: Vec::new(),
            uplink: ByteStream::default(),
            downlink: ByteStream::default(),
            termination: None,
            tls: false,
            remote_host: None,
            domain_name: String::new(),
            dns_request: None,
            dns_response: None,
            requests: Vec::new(),
            bytes_transferred: 0,
        }
    }

    pub fn start_time(&self, packets: &[Packet]) -> Option<f64> {
        self.packets.first().map(|id| packets[id.0].timestamp)
    }

    pub fn end_time(&self, packets: &[Packet]) -> Option<f64> {
        self.packets.last().map(|id| packets[id.0].timestamp)
    }
}

/// DNS messages seen so far, in trace order.
#[derive(Debug, Default)]
struct DnsLog {
    messages: Vec<(PacketId, DnsMessage)>,
    /// Messages not yet claimed by a TCP session.
    unclaimed: Vec<usize>,
    hosts: HashMap<IpAddr, String>,
}

impl DnsLog {
    fn observe(&mut self, packet: &Packet) {
        let Some((src_port, dst_port)) = packet.transport.ports() else {
            return;
        };
        if src_port != DNS_PORT && dst_port != DNS_PORT {
            return;
        }
        match parse_dns(&packet.payload) {
            Ok(Some(message)) => {
                if message.is_response {
                    for addr in &message.addresses {
                        self.hosts.insert(*addr, message.domain_name.clone());
                    }
                }
                self.unclaimed.push(self.messages.len());
                self.messages.push((packet.id, message));
            }
            Ok(None) => {}
            Err(err) => debug!(packet = packet.id.0, error = %err, "undecodable DNS payload"),
        }
    }

    fn message(&self, packet: PacketId) -> Option<&DnsMessage> {
        self.messages
            .iter()
            .find(|(id, _)| *id == packet)
            .map(|(_, message)| message)
    }

    /// Name a new TCP session after the latest response resolving its remote
    /// address. The query and response of that lookup are claimed so later
    /// sessions do not reuse them.
    fn associate(&mut self, session: &mut Session) {
        let remote = session.key.remote_addr;
        let response = self.unclaimed.iter().rev().copied().find(|&index| {
            let message = &self.messages[index].1;
            message.is_response && message.addresses.contains(&remote)
        });
        let Some(response) = response else {
            session.remote_host = self.hosts.get(&remote).cloned();
            return;
        };

        let response_packet = self.messages[response].0;
        let domain = self.messages[response].1.domain_name.clone();
        session.dns_response = Some(response_packet);
        session.remote_host = Some(domain.clone());

        let mut position = 0;
        while position < self.unclaimed.len() {
            let index = self.unclaimed[position];
            let (packet, message) = &self.messages[index];
            if message.domain_name != domain {
                position += 1;
                continue;
            }
            if session.dns_request.is_none() && !message.is_response {
                session.dns_request = Some(*packet);
            }
            self.unclaimed.remove(position);
            if index == response {
                break;
            }
        }
    }
}

/// Reconstruct every TCP and UDP session of a trace.
///
/// Packets receive their TCP classification and session label. Sessions are
/// returned TCP first, ordered by start time, followed by UDP sessions in
/// order of appearance.
pub fn build_sessions(
    packets: &mut [Packet],
    cancel: &CancelToken,
) -> Result<Vec<Session>, AnalysisError> {
    let mut dns = DnsLog::default();
    let mut udp_packets = Vec::new();
    let mut index: HashMap<SessionKey, usize> = HashMap::new();
    let mut sessions: Vec<Session> = Vec::new();

    for packet in packets.iter_mut() {
        cancel.check()?;
        packet.labels.tcp_info = None;
        packet.labels.session = None;
        if packet.is_udp() {
            udp_packets.push(packet.id);
            dns.observe(packet);
            continue;
        }
        if packet.tcp().is_none() {
            continue;
        }
        let Some(key) = SessionKey::of(packet) else {
            warn!(packet = packet.id.0, "unable to determine packet direction");
            continue;
        };
        let slot = *index.entry(key).or_insert_with(|| {
            let mut session = Session::new(key, SessionProtocol::Tcp);
            dns.associate(&mut session);
            sessions.push(session);
            sessions.len() - 1
        });
        sessions[slot].packets.push(packet.id);
    }

    // Splits append new sessions, so the list grows while it is walked.
    let mut position = 0;
    while position < sessions.len() {
        cancel.check()?;
        let ids = std::mem::take(&mut sessions[position].packets);
        let out = reassembly::reassemble(packets, &ids);
        let session = &mut sessions[position];
        session.packets = out.packets;
        session.uplink = out.uplink;
        session.downlink = out.downlink;
        session.termination = out.termination;
        if let Some(remainder) = out.remainder {
            let mut reused = Session::new(session.key, SessionProtocol::Tcp);
            reused.remote_host = session.remote_host.clone();
            reused.packets = remainder;
            sessions.push(reused);
        }
        position += 1;
    }

    for session in &mut sessions {
        classify::analyze_acks(packets, &session.packets);
        classify::analyze_zero_window(packets, &session.packets);
        classify::analyze_recovery(packets, &session.packets);
        finish_session(packets, session);
    }
    sessions.sort_by(|a, b| {
        let a = a.start_time(packets).unwrap_or(f64::INFINITY);
        let b = b.start_time(packets).unwrap_or(f64::INFINITY);
        a.total_cmp(&b)
    });
    sessions.retain(|session| !session.packets.is_empty());

    let mut udp_sessions = udp::build_udp_sessions(packets, &udp_packets, &dns, &sessions);
    for session in &mut udp_sessions {
        finish_session(packets, session);
    }
    sessions.extend(udp_sessions);

    for (position, session) in sessions.iter_mut().enumerate() {
        session.id = SessionId(position);
        for id in &session.packets {
            packets[id.0].labels.session = Some(session.id);
        }
    }

    info!(
        sessions = sessions.len(),
        tcp = sessions
            .iter()
            .filter(|s| s.protocol == SessionProtocol::Tcp)
            .count(),
        "sessions reconstructed"
    );
    Ok(sessions)
}

/// Byte totals, TLS detection, HTTP requests and the reporting name.
fn finish_session(packets: &[Packet], session: &mut Session) {
    session.bytes_transferred = session
        .packets
        .iter()
        .map(|id| u64::from(packets[id.0].len))
        .sum();
    session.tls = session.protocol == SessionProtocol::Tcp
        && session
            .packets
            .iter()
            .any(|id| is_tls_record(&packets[id.0].payload));

    session.requests = find_requests(session.uplink.data())
        .into_iter()
        .filter_map(|(offset, head)| {
            let packet = session.uplink.packet_at(offset)?;
            Some(HttpRequest {
                offset,
                packet,
                timestamp: packets[packet.0].timestamp,
                object: object_name(&head.target).to_string(),
                method: head.method,
                host: head.host,
            })
        })
        .collect();

    if let Some(host) = session.requests.iter().find_map(|r| r.host.clone()) {
        session.remote_host = Some(host);
    }
    session.domain_name = session
        .remote_host
        .clone()
        .unwrap_or_else(|| session.key.remote_addr.to_string());
}
