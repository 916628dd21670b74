//! LTE RRC simulation: continuous reception held by an inactivity timer,
//! then a fixed DRX cascade down to idle.

use crate::packet::Packet;
use crate::profile::LteProfile;

use super::RadioState;
use super::timeline::Timeline;

/// Idle until the promotion window, then promotion up to `end`.
fn promote(timeline: &mut Timeline, profile: &LteProfile, start: f64, end: f64) -> f64 {
    let promotion_start = (end - profile.promotion_time).max(start);
    timeline.push_until(start, RadioState::LteIdle, promotion_start);
    timeline.push_until(promotion_start, RadioState::LtePromotion, end);
    end
}

/// Continuous reception from `since` to the last packet at `last`, then the
/// tail cascade cut off at `end`. Returns where the cascade stopped.
fn tail(timeline: &mut Timeline, profile: &LteProfile, since: f64, last: f64, end: f64) -> f64 {
    timeline.push_until(since, RadioState::LteContinuous, last);
    let at = timeline.push(last, profile.inactivity_timer, RadioState::LteCrTail, end);
    let at = timeline.push(at, profile.drx_short_time, RadioState::LteDrxShort, end);
    timeline.push(at, profile.drx_long_time, RadioState::LteDrxLong, end)
}

pub(super) fn simulate(packets: &[Packet], profile: &LteProfile, duration: f64) -> Timeline {
    let mut timeline = Timeline::default();
    let Some((first, rest)) = packets.split_first() else {
        return timeline;
    };

    let mut last = first.timestamp;
    let mut since = promote(&mut timeline, profile, 0.0, last);
    for packet in rest {
        let current = packet.timestamp;
        if current - last > profile.inactivity_timer {
            since = tail(&mut timeline, profile, since, last, current);
            if since < current {
                since = promote(&mut timeline, profile, since, current);
            }
        }
        last = current;
    }
    tail(&mut timeline, profile, since, last, duration);
    timeline
}

#[cfg(test)]
mod tests {
    use crate::packet::{Direction, Packet};
    use crate::profile::{LteProfile, RadioProfile};
    use crate::radio::tests::{assert_contiguous, timed_packet};
    use crate::radio::{RadioState, RadioStateInterval, simulate};

    fn lte(timestamps: &[f64], duration: f64) -> Vec<RadioStateInterval> {
        let packets: Vec<Packet> = timestamps
            .iter()
            .enumerate()
            .map(|(id, &ts)| timed_packet(id, ts, Direction::Downlink, 500))
            .collect();
        simulate(&packets, &RadioProfile::Lte(LteProfile::default()), duration)
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn packet_during_drx_continues_without_promotion() {
        let intervals = lte(&[1.0, 1.05, 5.0], 20.0);
        assert_contiguous(&intervals, 20.0);
        let states: Vec<RadioState> = intervals.iter().map(|i| i.state).collect();
        assert_eq!(
            states,
            vec![
                RadioState::LteIdle,
                RadioState::LtePromotion,
                RadioState::LteContinuous,
                RadioState::LteCrTail,
                RadioState::LteDrxShort,
                RadioState::LteDrxLong,
                RadioState::LteCrTail,
                RadioState::LteDrxShort,
                RadioState::LteDrxLong,
                RadioState::LteIdle,
            ]
        );
        assert!(close(intervals[1].begin, 0.74));
        assert!(close(intervals[5].end, 5.0));
        assert!(close(intervals[8].end, 15.12));
    }

    #[test]
    fn gap_past_drx_long_promotes_from_idle() {
        let intervals = lte(&[1.0, 30.0], 35.0);
        assert_contiguous(&intervals, 35.0);
        let promotion = intervals
            .iter()
            .rfind(|i| i.state == RadioState::LtePromotion)
            .unwrap();
        assert!(close(promotion.begin, 29.74));
        assert!(close(promotion.end, 30.0));
        let idle = intervals
            .iter()
            .find(|i| i.state == RadioState::LteIdle && i.begin > 1.0)
            .unwrap();
        assert!(close(idle.begin, 11.12));
    }

    #[test]
    fn trace_end_cuts_the_tail() {
        let intervals = lte(&[1.0], 1.115);
        assert_contiguous(&intervals, 1.115);
        assert_eq!(intervals.last().unwrap().state, RadioState::LteDrxShort);
    }
}
