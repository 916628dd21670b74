//! Burst categories, assigned by the first matching rule.

use crate::events::{CpuSample, UserEvent, UserEventKind};
use crate::packet::{Direction, Packet, TcpInfo};
use crate::profile::AnalysisParams;

use super::{Burst, BurstCategory};

/// Closest user interaction before a burst.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Trigger {
    gap: f64,
    kind: UserEventKind,
}

impl Trigger {
    fn category(&self) -> BurstCategory {
        if self.kind.is_orientation_change() {
            BurstCategory::ScreenRotation
        } else {
            BurstCategory::UserInput
        }
    }
}

pub(crate) struct Classifier<'a> {
    packets: &'a [Packet],
    params: &'a AnalysisParams,
    /// Sorted by press time.
    user_events: Vec<UserEvent>,
    /// Sorted by timestamp.
    cpu: Vec<CpuSample>,
}

impl<'a> Classifier<'a> {
    pub(crate) fn new(
        packets: &'a [Packet],
        params: &'a AnalysisParams,
        user_events: &[UserEvent],
        cpu: &[CpuSample],
    ) -> Self {
        let mut user_events = user_events.to_vec();
        user_events.sort_by(|a, b| a.press.total_cmp(&b.press));
        let mut cpu = cpu.to_vec();
        cpu.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        Self {
            packets,
            params,
            user_events,
            cpu,
        }
    }

    pub(crate) fn classify(&self, burst: &Burst, previous: Option<&Burst>) -> BurstCategory {
        let params = self.params;
        let first = &self.packets[burst.begin_packet.0];
        let info = first.labels.tcp_info;

        if burst.duration() > params.large_burst_duration && burst.payload > params.large_burst_size
        {
            return BurstCategory::Long;
        }
        if burst.payload == 0 {
            let all_control = burst.packets.iter().all(|id| {
                self.packets[id.0]
                    .labels
                    .tcp_info
                    .is_some_and(|info| info.is_protocol_control())
            });
            if all_control {
                return BurstCategory::TcpProtocol;
            }
            if matches!(info, Some(TcpInfo::AckRecover | TcpInfo::AckDup)) {
                return BurstCategory::TcpLossOrDup;
            }
        }
        if first.direction == Direction::Downlink
            && matches!(info, Some(TcpInfo::Data | TcpInfo::Ack))
        {
            return BurstCategory::ServerNetDelay;
        }
        if info.is_some_and(|info| info.is_loss_or_dup()) {
            return BurstCategory::TcpLossOrDup;
        }

        if burst.payload > 0 {
            if let Some(category) = self.user_triggered(burst, previous) {
                return category;
            }
        }
        if burst.payload == 0 {
            BurstCategory::Unknown
        } else {
            BurstCategory::ClientApp
        }
    }

    /// Most recent press or release strictly inside the look-back window.
    fn trigger(&self, start: f64) -> Option<Trigger> {
        let tolerance = self.params.user_event_tolerance;
        let within = |time: f64| time < start && time > start - tolerance;
        let candidates = self.user_events.partition_point(|event| event.press < start);

        let mut best: Option<Trigger> = None;
        for event in &self.user_events[..candidates] {
            for time in [event.press, event.release] {
                if !within(time) {
                    continue;
                }
                let gap = start - time;
                if best.is_none_or(|best| gap < best.gap) {
                    best = Some(Trigger {
                        gap,
                        kind: event.kind,
                    });
                }
            }
        }
        best
    }

    fn user_triggered(&self, burst: &Burst, previous: Option<&Burst>) -> Option<BurstCategory> {
        let start = self.packets[burst.begin_packet.0].timestamp;
        let trigger = self.trigger(start)?;
        if trigger.gap < self.params.user_input_threshold {
            return Some(trigger.category());
        }
        let quiet_before = previous.is_none_or(|previous| previous.end < burst.begin - trigger.gap);
        if trigger.gap < self.params.user_event_tolerance && quiet_before {
            if self.cpu_busy(start - trigger.gap, start) {
                return Some(BurstCategory::Cpu);
            }
            return Some(trigger.category());
        }
        None
    }

    /// Average usage of the samples strictly inside `(from, to)` is above the
    /// busy threshold.
    fn cpu_busy(&self, from: f64, to: f64) -> bool {
        let first = self.cpu.partition_point(|sample| sample.timestamp <= from);
        let last = self.cpu.partition_point(|sample| sample.timestamp < to);
        let samples = &self.cpu[first..last.max(first)];
        if samples.is_empty() {
            return false;
        }
        let average = samples.iter().map(|sample| sample.usage).sum::<f64>() / samples.len() as f64;
        average > self.params.cpu_busy_threshold
    }
}
