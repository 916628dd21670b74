//! Radio resource state inference.
//!
//! The device's radio state is never captured; it is reconstructed from packet
//! timing against a [`RadioProfile`]. Every family produces a sorted, gap-free
//! list of [`RadioStateInterval`]s covering `[0, duration)`, with adjacent
//! intervals of the same state merged.

mod energy;
mod lte;
mod stats;
mod timeline;
mod umts;
mod wifi;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::packet::Packet;
use crate::profile::{RadioFamily, RadioProfile};

pub use energy::EnergyModel;
pub use stats::{RadioStats, StateStats, radio_stats};
pub use timeline::compress;

/// Radio states of every supported family.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RadioState {
    Idle,
    PromoIdleDch,
    PromoFachDch,
    Dch,
    TailDch,
    Fach,
    TailFach,
    LteIdle,
    LtePromotion,
    LteContinuous,
    LteCrTail,
    LteDrxShort,
    LteDrxLong,
    WifiActive,
    WifiTail,
    WifiIdle,
}

impl RadioState {
    /// Lowest-power state of a family; used to pad the timeline.
    pub fn idle(family: RadioFamily) -> Self {
        match family {
            RadioFamily::Umts => RadioState::Idle,
            RadioFamily::Lte => RadioState::LteIdle,
            RadioFamily::Wifi => RadioState::WifiIdle,
        }
    }

    pub fn is_promotion(&self) -> bool {
        matches!(
            self,
            RadioState::PromoIdleDch | RadioState::PromoFachDch | RadioState::LtePromotion
        )
    }

    /// High-power states counted as a burst's active time.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            RadioState::Dch
                | RadioState::TailDch
                | RadioState::LteContinuous
                | RadioState::LteCrTail
                | RadioState::WifiActive
                | RadioState::WifiTail
        )
    }

    /// The state a tail belongs to.
    pub fn parent(&self) -> Option<RadioState> {
        match self {
            RadioState::TailDch => Some(RadioState::Dch),
            RadioState::TailFach => Some(RadioState::Fach),
            RadioState::LteCrTail => Some(RadioState::LteContinuous),
            RadioState::WifiTail => Some(RadioState::WifiActive),
            _ => None,
        }
    }
}

/// Half-open range `[begin, end)` spent in one radio state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadioStateInterval {
    pub begin: f64,
    pub end: f64,
    pub state: RadioState,
}

impl RadioStateInterval {
    pub fn duration(&self) -> f64 {
        self.end - self.begin
    }

    pub fn contains(&self, timestamp: f64) -> bool {
        self.begin <= timestamp && timestamp < self.end
    }
}

/// Infer the radio state timeline of a trace.
///
/// `packets` must be in timestamp order. The result covers `[0, duration)`;
/// an empty trace yields a single idle interval.
///
/// # Examples
/// ```
/// use radiotrace_core::radio::{RadioState, simulate};
/// use radiotrace_core::RadioProfile;
///
/// let intervals = simulate(&[], &RadioProfile::default(), 12.0);
/// assert_eq!(intervals.len(), 1);
/// assert_eq!(intervals[0].state, RadioState::Idle);
/// assert_eq!(intervals[0].end, 12.0);
/// ```
pub fn simulate(
    packets: &[Packet],
    profile: &RadioProfile,
    duration: f64,
) -> Vec<RadioStateInterval> {
    let timeline = match profile {
        RadioProfile::Umts(umts) => umts::simulate(packets, umts),
        RadioProfile::Lte(lte) => lte::simulate(packets, lte, duration),
        RadioProfile::Wifi(wifi) => wifi::simulate(packets, wifi, duration),
    };
    let intervals = timeline.finish(duration, RadioState::idle(profile.family()));
    debug_assert!(
        intervals.windows(2).all(|pair| pair[0].end == pair[1].begin),
        "radio intervals must be contiguous"
    );
    debug_assert!(intervals.iter().all(|interval| interval.begin <= interval.end));
    debug!(
        intervals = intervals.len(),
        family = ?profile.family(),
        "radio timeline simulated"
    );
    intervals
}

/// Index of the interval a timestamp falls into. A timestamp on a boundary
/// belongs to the later interval; timestamps past the end map to the last.
pub fn interval_at(intervals: &[RadioStateInterval], timestamp: f64) -> Option<usize> {
    if intervals.is_empty() {
        return None;
    }
    let after = intervals.partition_point(|interval| interval.begin <= timestamp);
    Some(after.saturating_sub(1))
}

/// Record on each packet the radio state at its timestamp.
pub fn label_packets(packets: &mut [Packet], intervals: &[RadioStateInterval]) {
    for packet in packets {
        packet.labels.radio_state =
            interval_at(intervals, packet.timestamp).map(|index| intervals[index].state);
    }
}
