use crate::packet::Packet;
use crate::radio::{EnergyModel, RadioStateInterval};

use super::Burst;

/// Charge radio energy and active time to bursts and return the total.
///
/// A burst owns the time from its first packet to the next burst's first
/// packet. The first burst also owns the start of the trace and the last one
/// owns everything up to the end of the timeline.
pub(crate) fn assign_energy(
    bursts: &mut [Burst],
    intervals: &[RadioStateInterval],
    model: &impl EnergyModel,
    packets: &[Packet],
) -> f64 {
    let (Some(first), Some(last)) = (intervals.first(), intervals.last()) else {
        return 0.0;
    };
    let timeline_begin = first.begin;
    let timeline_end = last.end;

    let starts: Vec<f64> = bursts.iter().map(|burst| burst.begin).collect();
    let mut total = 0.0;
    let mut cursor = 0;
    for (index, burst) in bursts.iter_mut().enumerate() {
        let from = if index == 0 { timeline_begin } else { starts[index] };
        let to = starts.get(index + 1).copied().unwrap_or(timeline_end);

        while cursor < intervals.len() && intervals[cursor].end <= from {
            cursor += 1;
        }
        let mut energy = 0.0;
        let mut active = 0.0;
        for interval in intervals[cursor..].iter().take_while(|i| i.begin < to) {
            let begin = interval.begin.max(from);
            let end = interval.end.min(to);
            if end <= begin {
                continue;
            }
            energy += model.energy(begin, end, interval.state, packets);
            if interval.state.is_active() {
                active += end - begin;
            }
        }
        burst.energy = energy;
        burst.active_time = active;
        total += energy;
    }
    total
}

#[cfg(test)]
mod tests {
    use super::assign_energy;
    use crate::burst::tests::burst_of;
    use crate::packet::{Direction, Packet};
    use crate::profile::UmtsProfile;
    use crate::radio::tests::timed_packet;
    use crate::radio::{RadioState, RadioStateInterval};

    #[test]
    fn energy_is_split_at_burst_starts() {
        let packets: Vec<Packet> = [2.0, 6.0]
            .iter()
            .enumerate()
            .map(|(id, &ts)| timed_packet(id, ts, Direction::Uplink, 100))
            .collect();
        let mut bursts = vec![burst_of(&packets, 0..1), burst_of(&packets, 1..2)];
        let interval = |begin, end, state| RadioStateInterval { begin, end, state };
        let intervals = vec![
            interval(0.0, 2.0, RadioState::PromoIdleDch),
            interval(2.0, 5.0, RadioState::Dch),
            interval(5.0, 8.0, RadioState::TailDch),
            interval(8.0, 10.0, RadioState::Fach),
        ];
        let total = assign_energy(&mut bursts, &intervals, &UmtsProfile::default(), &packets);

        let first = 2.0 * 0.53 + 3.0 * 0.7 + 1.0 * 0.7;
        let second = 2.0 * 0.7 + 2.0 * 0.35;
        assert!((bursts[0].energy - first).abs() < 1e-9);
        assert!((bursts[1].energy - second).abs() < 1e-9);
        assert!((total - first - second).abs() < 1e-9);
        assert!((bursts[0].active_time - 4.0).abs() < 1e-9);
        assert!((bursts[1].active_time - 2.0).abs() < 1e-9);
    }
}
