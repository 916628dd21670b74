//! Bursts: runs of packets separated by idle gaps, with a category and the
//! radio energy spent on them.

mod classify;
mod energy;
mod grouping;
mod stats;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::events::{CpuSample, UserEvent};
use crate::packet::{BurstId, Direction, Packet, PacketId};
use crate::profile::AnalysisParams;
use crate::radio::{EnergyModel, RadioStateInterval};

pub use stats::{CategoryStats, category_stats};

use classify::Classifier;

/// What most likely caused a burst. Declaration order is report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BurstCategory {
    Long,
    TcpProtocol,
    TcpLossOrDup,
    ServerNetDelay,
    UserInput,
    ScreenRotation,
    Cpu,
    Periodic,
    ClientApp,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Burst {
    pub id: BurstId,
    pub packets: Vec<PacketId>,
    pub begin: f64,
    pub end: f64,
    pub begin_packet: PacketId,
    pub end_packet: PacketId,
    /// First uplink packet carrying payload, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_uplink_data: Option<PacketId>,
    pub payload: u64,
    /// The gap to the next burst exceeds the long burst threshold. Always set
    /// on the last burst.
    pub long_gap: bool,
    pub category: BurstCategory,
    /// Category this burst had before a later pass replaced it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replaced: Option<BurstCategory>,
    pub energy: f64,
    pub active_time: f64,
}

impl Burst {
    fn new(id: BurstId, packets: &[Packet]) -> Self {
        debug_assert!(!packets.is_empty(), "burst without packets");
        let first = &packets[0];
        let last = &packets[packets.len() - 1];
        Self {
            id,
            packets: packets.iter().map(|packet| packet.id).collect(),
            begin: first.timestamp,
            end: last.timestamp,
            begin_packet: first.id,
            end_packet: last.id,
            first_uplink_data: packets
                .iter()
                .find(|packet| packet.direction == Direction::Uplink && packet.payload_len() > 0)
                .map(|packet| packet.id),
            payload: packets.iter().map(|packet| packet.payload_len() as u64).sum(),
            long_gap: false,
            category: BurstCategory::Unknown,
            replaced: None,
            energy: 0.0,
            active_time: 0.0,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.begin
    }

    /// Replace the category, keeping the previous one for the report.
    pub(crate) fn reclassify(&mut self, category: BurstCategory) {
        if category == self.category {
            return;
        }
        if let Some(replaced) = self.replaced {
            warn!(
                burst = self.id.0,
                first = ?replaced,
                current = ?self.category,
                next = ?category,
                "burst matched more than two categories"
            );
        } else {
            debug!(burst = self.id.0, from = ?self.category, to = ?category, "burst reclassified");
        }
        self.replaced = Some(self.category);
        self.category = category;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BurstAnalysis {
    pub bursts: Vec<Burst>,
    /// Bursts followed by a long gap.
    pub long_bursts: u64,
    pub total_energy: f64,
}

/// Group packets into bursts, classify them and charge radio energy to them.
/// Each packet is labelled with the burst it belongs to.
pub fn analyze_bursts(
    packets: &mut [Packet],
    intervals: &[RadioStateInterval],
    model: &impl EnergyModel,
    params: &AnalysisParams,
    user_events: &[UserEvent],
    cpu: &[CpuSample],
) -> BurstAnalysis {
    let ranges = grouping::group(packets, intervals, params.burst_threshold);
    let mut bursts: Vec<Burst> = ranges
        .iter()
        .enumerate()
        .map(|(index, range)| Burst::new(BurstId(index), &packets[range.clone()]))
        .collect();

    let starts: Vec<f64> = bursts.iter().map(|burst| burst.begin).collect();
    for (index, burst) in bursts.iter_mut().enumerate() {
        burst.long_gap = starts
            .get(index + 1)
            .is_none_or(|next| next - burst.end > params.long_burst_threshold);
    }

    let classifier = Classifier::new(packets, params, user_events, cpu);
    let categories: Vec<BurstCategory> = (0..bursts.len())
        .map(|index| {
            let previous = index.checked_sub(1).map(|previous| &bursts[previous]);
            classifier.classify(&bursts[index], previous)
        })
        .collect();
    for (burst, category) in bursts.iter_mut().zip(categories) {
        burst.category = category;
    }

    let total_energy = energy::assign_energy(&mut bursts, intervals, model, packets);

    for (burst, range) in bursts.iter().zip(&ranges) {
        for packet in &mut packets[range.clone()] {
            packet.labels.burst = Some(burst.id);
        }
    }

    let long_bursts = bursts.iter().filter(|burst| burst.long_gap).count() as u64;
    info!(bursts = bursts.len(), long_bursts, total_energy, "bursts analysed");
    BurstAnalysis {
        bursts,
        long_bursts,
        total_energy,
    }
}
