use std::net::IpAddr;

use crate::burst::Burst;
use crate::packet::{Direction, Packet};
use crate::session::Session;
use crate::{BurstSummary, SessionSummary, TerminationSummary};

pub(crate) fn build_session_summaries(
    sessions: &[Session],
    packets: &[Packet],
) -> Vec<SessionSummary> {
    sessions
        .iter()
        .map(|session| {
            let (mut uplink_packets, mut downlink_packets) = (0u64, 0u64);
            for id in &session.packets {
                match packets[id.0].direction {
                    Direction::Uplink => uplink_packets += 1,
                    Direction::Downlink => downlink_packets += 1,
                    Direction::Unknown => {}
                }
            }
            SessionSummary {
                id: session.id.0,
                protocol: session.protocol,
                local_port: session.key.local_port,
                remote: format_endpoint(session.key.remote_addr, session.key.remote_port),
                domain_name: session.domain_name.clone(),
                tls: session.tls,
                start: session.start_time(packets),
                end: session.end_time(packets),
                uplink_packets,
                downlink_packets,
                uplink_payload: session.uplink.len() as u64,
                downlink_payload: session.downlink.len() as u64,
                bytes_transferred: session.bytes_transferred,
                http_requests: session.requests.len() as u64,
                termination: session.termination.map(|termination| TerminationSummary {
                    kind: termination.kind,
                    delay: termination.delay,
                }),
            }
        })
        .collect()
}

pub(crate) fn build_burst_summaries(bursts: &[Burst]) -> Vec<BurstSummary> {
    bursts
        .iter()
        .map(|burst| BurstSummary {
            id: burst.id.0,
            begin: burst.begin,
            end: burst.end,
            packets: burst.packets.len() as u64,
            payload: burst.payload,
            category: burst.category,
            replaced: burst.replaced,
            long_gap: burst.long_gap,
            first_uplink_data: burst.first_uplink_data.map(|id| id.0),
            energy: burst.energy,
            active_time: burst.active_time,
        })
        .collect()
}

fn format_endpoint(ip: IpAddr, port: u16) -> String {
    match ip {
        IpAddr::V4(addr) => format!("{}:{}", addr, port),
        IpAddr::V6(addr) => format!("[{}]:{}", addr, port),
    }
}
