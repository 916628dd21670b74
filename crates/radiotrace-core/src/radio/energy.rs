//! Energy spent in radio states.

use crate::packet::{Direction, Packet};
use crate::profile::{LteProfile, RadioProfile, UmtsProfile, WifiProfile};

use super::RadioState;

/// Joules consumed by the radio.
pub trait EnergyModel {
    /// Energy spent in `state` over `[begin, end)`. `packets` is the whole
    /// trace in timestamp order; models that depend on throughput read it.
    fn energy(&self, begin: f64, end: f64, state: RadioState, packets: &[Packet]) -> f64;
}

impl EnergyModel for RadioProfile {
    fn energy(&self, begin: f64, end: f64, state: RadioState, packets: &[Packet]) -> f64 {
        match self {
            RadioProfile::Umts(profile) => profile.energy(begin, end, state, packets),
            RadioProfile::Lte(profile) => profile.energy(begin, end, state, packets),
            RadioProfile::Wifi(profile) => profile.energy(begin, end, state, packets),
        }
    }
}

impl EnergyModel for UmtsProfile {
    fn energy(&self, begin: f64, end: f64, state: RadioState, _packets: &[Packet]) -> f64 {
        let power = &self.power;
        let watts = match state {
            RadioState::Dch | RadioState::TailDch => power.dch,
            RadioState::Fach | RadioState::TailFach => power.fach,
            RadioState::Idle => power.idle,
            RadioState::PromoIdleDch => power.idle_dch,
            RadioState::PromoFachDch => power.fach_dch,
            _ => 0.0,
        };
        (end - begin) * watts
    }
}

/// Bytes moved in one throughput sampling window.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ThroughputSample {
    period: f64,
    up_bytes: u64,
    down_bytes: u64,
}

impl ThroughputSample {
    fn up_mbps(&self) -> f64 {
        self.up_bytes as f64 * 8.0 / 1_000_000.0 / self.period
    }

    fn down_mbps(&self) -> f64 {
        self.down_bytes as f64 * 8.0 / 1_000_000.0 / self.period
    }
}

/// Split `[begin, end)` into windows of `window` seconds plus a shorter last
/// window, and total the on-wire bytes per direction in each.
fn throughput(begin: f64, end: f64, window: f64, packets: &[Packet]) -> Vec<ThroughputSample> {
    let mut samples = Vec::new();
    if end <= begin || window <= 0.0 {
        return samples;
    }
    let bytes_in = |from: f64, to: f64| {
        let first = packets.partition_point(|packet| packet.timestamp < from);
        let last = packets.partition_point(|packet| packet.timestamp < to);
        packets[first..last]
            .iter()
            .fold((0u64, 0u64), |(up, down), packet| match packet.direction {
                Direction::Uplink => (up + u64::from(packet.len), down),
                Direction::Downlink => (up, down + u64::from(packet.len)),
                Direction::Unknown => (up, down),
            })
    };

    let steps = ((end - begin) / window) as u64;
    let mut from = begin;
    for step in 1..=steps {
        let to = begin + step as f64 * window;
        let (up_bytes, down_bytes) = bytes_in(from, to);
        samples.push(ThroughputSample {
            period: to - from,
            up_bytes,
            down_bytes,
        });
        from = to;
    }
    if end > from {
        let (up_bytes, down_bytes) = bytes_in(from, end);
        samples.push(ThroughputSample {
            period: end - from,
            up_bytes,
            down_bytes,
        });
    }
    samples
}

impl LteProfile {
    /// DRX energy: one ping per cycle, tail power for the rest of it.
    fn drx_energy(&self, duration: f64, period: f64, ping_power: f64) -> f64 {
        (duration / period)
            * (self.drx_ping_time * ping_power + (period - self.drx_ping_time) * self.power.tail)
    }

    /// Whole paging cycles, then the partial cycle that is left.
    fn idle_energy(&self, duration: f64) -> f64 {
        let period = self.idle_ping_period;
        let ping = self.idle_ping_time;
        let power = &self.power;
        let cycles = (duration / period).floor();
        let mut energy = cycles * (ping * power.idle_ping + (period - ping) * power.idle);
        let residual = duration - cycles * period;
        energy += if residual <= ping {
            residual * power.idle_ping
        } else {
            ping * power.idle_ping + (residual - ping) * power.idle
        };
        energy
    }
}

impl EnergyModel for LteProfile {
    fn energy(&self, begin: f64, end: f64, state: RadioState, packets: &[Packet]) -> f64 {
        let duration = end - begin;
        let model = &self.throughput;
        match state {
            RadioState::LtePromotion => duration * self.power.promotion,
            // A tail carries no traffic.
            RadioState::LteCrTail => duration * model.beta,
            RadioState::LteContinuous => throughput(begin, end, model.window, packets)
                .iter()
                .map(|sample| {
                    (model.alpha_up / 1000.0 * sample.up_mbps()
                        + model.alpha_down / 1000.0 * sample.down_mbps()
                        + model.beta)
                        * sample.period
                })
                .sum(),
            RadioState::LteDrxShort => self.drx_energy(
                duration,
                self.drx_short_ping_period,
                self.power.drx_short_ping,
            ),
            RadioState::LteDrxLong => {
                self.drx_energy(duration, self.drx_long_ping_period, self.power.drx_long_ping)
            }
            RadioState::LteIdle => self.idle_energy(duration),
            _ => 0.0,
        }
    }
}

impl EnergyModel for WifiProfile {
    fn energy(&self, begin: f64, end: f64, state: RadioState, _packets: &[Packet]) -> f64 {
        let watts = match state {
            RadioState::WifiActive | RadioState::WifiTail => self.power.active,
            RadioState::WifiIdle => self.power.idle,
            _ => 0.0,
        };
        (end - begin) * watts
    }
}
