use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::packet::{Direction, Packet, PacketId};

use super::{DnsLog, Session, SessionKey, SessionProtocol};

/// DNS packets that resolved a TCP session's remote host.
fn tcp_lookups(dns: &DnsLog, tcp_sessions: &[Session]) -> HashSet<PacketId> {
    let mut claimed = HashSet::new();
    for session in tcp_sessions {
        let request = session.dns_request.and_then(|id| dns.message(id));
        let response = session.dns_response.and_then(|id| dns.message(id));
        for (packet, message) in &dns.messages {
            let matches_request = !message.is_response
                && request.is_some_and(|request| request.domain_name == message.domain_name);
            let matches_response = message.is_response
                && response.is_some_and(|response| response.domain_name == message.domain_name)
                && message.addresses.contains(&session.key.remote_addr);
            if matches_request || matches_response {
                claimed.insert(*packet);
            }
        }
    }
    claimed
}

/// Group the remaining UDP datagrams into sessions keyed like TCP sessions.
pub(super) fn build_udp_sessions(
    packets: &[Packet],
    udp_packets: &[PacketId],
    dns: &DnsLog,
    tcp_sessions: &[Session],
) -> Vec<Session> {
    let claimed = tcp_lookups(dns, tcp_sessions);
    let mut index: HashMap<SessionKey, usize> = HashMap::new();
    let mut sessions: Vec<Session> = Vec::new();

    for &id in udp_packets {
        if claimed.contains(&id) {
            continue;
        }
        let packet = &packets[id.0];
        let Some(key) = SessionKey::of(packet) else {
            warn!(packet = id.0, "unable to determine packet direction");
            continue;
        };
        let slot = *index.entry(key).or_insert_with(|| {
            let mut session = Session::new(key, SessionProtocol::Udp);
            session.remote_host = dns.message(id).map(|message| message.domain_name.clone());
            sessions.push(session);
            sessions.len() - 1
        });

        let session = &mut sessions[slot];
        session.packets.push(id);
        match packet.direction {
            Direction::Uplink => session.uplink.append(id, &packet.payload),
            Direction::Downlink => session.downlink.append(id, &packet.payload),
            Direction::Unknown => {}
        }
    }
    sessions
}
