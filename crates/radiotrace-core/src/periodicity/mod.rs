//! Periodic transfer detection.
//!
//! Connection and request times are collected per remote address, per host
//! and per object. Targets whose occurrences repeat on a regular cycle mark
//! the application bursts that reach them as periodic.

mod cluster;

use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::analysis::{AnalysisError, CancelToken};
use crate::burst::{Burst, BurstCategory};
use crate::packet::{Packet, PacketId, TcpInfo};
use crate::profile::AnalysisParams;
use crate::session::{Session, SessionProtocol};

/// Targets found to be contacted on a regular cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodicTargets {
    pub hosts: BTreeSet<String>,
    pub objects: BTreeSet<String>,
    pub addresses: BTreeSet<IpAddr>,
}

impl PeriodicTargets {
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty() && self.objects.is_empty() && self.addresses.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodicitySummary {
    pub periodic_bursts: u64,
    /// Distinct targets that periodic bursts were attributed to.
    pub distinct_targets: u64,
    /// Shortest gap between the starts of consecutive periodic bursts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_repeat: Option<f64>,
    pub targets: PeriodicTargets,
}

#[derive(Default)]
struct Occurrences {
    hosts: BTreeMap<String, Vec<f64>>,
    objects: BTreeMap<String, Vec<f64>>,
    addresses: BTreeMap<IpAddr, Vec<f64>>,
}

fn occurrences(sessions: &[Session], packets: &[Packet]) -> Occurrences {
    let mut found = Occurrences::default();
    for session in sessions {
        if session.protocol != SessionProtocol::Tcp {
            continue;
        }
        if let Some(first) = session.packets.first().map(|id| &packets[id.0]) {
            if first.labels.tcp_info == Some(TcpInfo::Establish) {
                found
                    .addresses
                    .entry(session.key.remote_addr)
                    .or_default()
                    .push(first.timestamp);
            }
        }
        for request in &session.requests {
            if let Some(host) = &request.host {
                found
                    .hosts
                    .entry(host.clone())
                    .or_default()
                    .push(request.timestamp);
            }
            found
                .objects
                .entry(request.object.clone())
                .or_default()
                .push(request.timestamp);
        }
    }
    found
}

fn periodic_keys<K: Ord + Clone>(
    times: &BTreeMap<K, Vec<f64>>,
    params: &AnalysisParams,
    cancel: &CancelToken,
) -> Result<BTreeSet<K>, AnalysisError> {
    let mut keys = BTreeSet::new();
    for (key, times) in times {
        cancel.check()?;
        if cluster::is_periodic(times, params) {
            keys.insert(key.clone());
        }
    }
    Ok(keys)
}

/// Find the hosts, objects and remote addresses contacted periodically.
pub fn find_periodic_targets(
    sessions: &[Session],
    packets: &[Packet],
    params: &AnalysisParams,
    cancel: &CancelToken,
) -> Result<PeriodicTargets, AnalysisError> {
    let found = occurrences(sessions, packets);
    let targets = PeriodicTargets {
        hosts: periodic_keys(&found.hosts, params, cancel)?,
        objects: periodic_keys(&found.objects, params, cancel)?,
        addresses: periodic_keys(&found.addresses, params, cancel)?,
    };
    debug!(
        hosts = targets.hosts.len(),
        objects = targets.objects.len(),
        addresses = targets.addresses.len(),
        "periodic targets"
    );
    Ok(targets)
}

fn close_spaced(bursts: &[Burst], index: usize, threshold: f64) -> bool {
    let burst = &bursts[index];
    let after_previous = index
        .checked_sub(1)
        .is_some_and(|previous| burst.begin - bursts[previous].end < threshold);
    let before_next = bursts
        .get(index + 1)
        .is_some_and(|next| next.begin - burst.end < threshold);
    after_previous || before_next
}

/// The periodic target a burst reaches, if any. Addresses are matched on the
/// burst's first packet, hosts and objects on the request whose first packet
/// is the burst's first uplink payload packet.
fn matching_target(
    burst: &Burst,
    targets: &PeriodicTargets,
    sessions: &[Session],
    packets: &[Packet],
) -> Option<String> {
    let first = &packets[burst.begin_packet.0];
    for addr in [first.dst, first.src] {
        if targets.addresses.contains(&addr) {
            return Some(addr.to_string());
        }
    }

    let uplink: PacketId = burst.first_uplink_data?;
    sessions
        .iter()
        .filter(|session| session.protocol == SessionProtocol::Tcp)
        .flat_map(|session| &session.requests)
        .filter(|request| request.packet == uplink)
        .find_map(|request| match &request.host {
            Some(host) if targets.hosts.contains(host) => Some(host.clone()),
            _ if targets.objects.contains(&request.object) => Some(request.object.clone()),
            _ => None,
        })
}

/// Relabel application bursts that reach a periodic target and summarise the
/// periodic bursts. Bursts close to a neighbour are left alone.
pub fn detect_periodicity(
    sessions: &[Session],
    packets: &[Packet],
    bursts: &mut [Burst],
    params: &AnalysisParams,
    cancel: &CancelToken,
) -> Result<PeriodicitySummary, AnalysisError> {
    let targets = find_periodic_targets(sessions, packets, params, cancel)?;

    let mut attributed = BTreeSet::new();
    if !targets.is_empty() {
        for index in 0..bursts.len() {
            if bursts[index].category != BurstCategory::ClientApp
                || close_spaced(bursts, index, params.close_spaced_burst_threshold)
            {
                continue;
            }
            if let Some(target) = matching_target(&bursts[index], &targets, sessions, packets) {
                bursts[index].reclassify(BurstCategory::Periodic);
                attributed.insert(target);
            }
        }
    }

    let mut periodic_bursts = 0;
    let mut previous: Option<f64> = None;
    let mut shortest: Option<f64> = None;
    for burst in bursts.iter().filter(|burst| burst.category == BurstCategory::Periodic) {
        if let Some(previous) = previous {
            let gap = burst.begin - previous;
            if shortest.is_none_or(|shortest| gap < shortest) {
                shortest = Some(gap);
            }
        }
        previous = Some(burst.begin);
        periodic_bursts += 1;
    }

    let summary = PeriodicitySummary {
        periodic_bursts,
        distinct_targets: attributed.len() as u64,
        min_repeat: shortest.filter(|_| periodic_bursts >= params.period_repeat_bursts),
        targets,
    };
    info!(
        periodic_bursts = summary.periodic_bursts,
        distinct_targets = summary.distinct_targets,
        "periodicity analysed"
    );
    Ok(summary)
}
