//! WiFi power-save model: active while packets flow, a fixed tail, then idle.

use crate::packet::Packet;
use crate::profile::WifiProfile;

use super::RadioState;
use super::timeline::Timeline;

fn tail(timeline: &mut Timeline, profile: &WifiProfile, since: f64, last: f64, end: f64) -> f64 {
    timeline.push_until(since, RadioState::WifiActive, last);
    timeline.push(last, profile.tail_time, RadioState::WifiTail, end)
}

pub(super) fn simulate(packets: &[Packet], profile: &WifiProfile, duration: f64) -> Timeline {
    let mut timeline = Timeline::default();
    let Some((first, rest)) = packets.split_first() else {
        return timeline;
    };

    let mut last = first.timestamp;
    let mut since = timeline.push_until(0.0, RadioState::WifiIdle, last).max(last);
    for packet in rest {
        let current = packet.timestamp;
        if current - last > profile.tail_time {
            since = tail(&mut timeline, profile, since, last, current);
            since = timeline.push_until(since, RadioState::WifiIdle, current);
        }
        last = current;
    }
    tail(&mut timeline, profile, since, last, duration);
    timeline
}

#[cfg(test)]
mod tests {
    use crate::packet::{Direction, Packet};
    use crate::profile::RadioProfile;
    use crate::profile::RadioFamily;
    use crate::radio::tests::{assert_contiguous, timed_packet};
    use crate::radio::{RadioState, simulate};

    #[test]
    fn tail_then_idle_between_separated_packets() {
        let packets: Vec<Packet> = [1.0, 1.1, 3.0]
            .iter()
            .enumerate()
            .map(|(id, &ts)| timed_packet(id, ts, Direction::Uplink, 100))
            .collect();
        let intervals = simulate(&packets, &RadioProfile::for_family(RadioFamily::Wifi), 4.0);
        assert_contiguous(&intervals, 4.0);
        let spans: Vec<(f64, f64, RadioState)> = intervals
            .iter()
            .map(|i| {
                let round = |v: f64| (v * 1e6).round() / 1e6;
                (round(i.begin), round(i.end), i.state)
            })
            .collect();
        assert_eq!(
            spans,
            vec![
                (0.0, 1.0, RadioState::WifiIdle),
                (1.0, 1.1, RadioState::WifiActive),
                (1.1, 1.35, RadioState::WifiTail),
                (1.35, 3.0, RadioState::WifiIdle),
                (3.0, 3.25, RadioState::WifiTail),
                (3.25, 4.0, RadioState::WifiIdle),
            ]
        );
    }
}
