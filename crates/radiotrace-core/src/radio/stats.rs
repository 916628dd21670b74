use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::packet::Packet;

use super::{EnergyModel, RadioState, RadioStateInterval};

/// Time and energy spent in one state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateStats {
    pub state: RadioState,
    /// Seconds in the state. For a parent state this includes its tail.
    pub time: f64,
    pub energy: f64,
    /// Number of intervals; for promotions, the number of promotions.
    pub occurrences: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RadioStats {
    pub states: Vec<StateStats>,
    pub total_energy: f64,
    /// Total energy over all transferred kilobytes; 0 without traffic.
    pub joules_per_kilobyte: f64,
}

impl RadioStats {
    pub fn state(&self, state: RadioState) -> Option<&StateStats> {
        self.states.iter().find(|stats| stats.state == state)
    }
}

/// Aggregate a radio timeline per state.
pub fn radio_stats(
    intervals: &[RadioStateInterval],
    model: &impl EnergyModel,
    packets: &[Packet],
    total_bytes: u64,
) -> RadioStats {
    let mut per_state: BTreeMap<RadioState, StateStats> = BTreeMap::new();
    let mut total_energy = 0.0;

    let mut add = |state: RadioState, time: f64, energy: f64, occurrences: u64| {
        let entry = per_state.entry(state).or_insert(StateStats {
            state,
            time: 0.0,
            energy: 0.0,
            occurrences: 0,
        });
        entry.time += time;
        entry.energy += energy;
        entry.occurrences += occurrences;
    };

    for interval in intervals {
        let time = interval.duration();
        let energy = model.energy(interval.begin, interval.end, interval.state, packets);
        total_energy += energy;
        add(interval.state, time, energy, 1);
        if let Some(parent) = interval.state.parent() {
            add(parent, time, energy, 0);
        }
    }

    let joules_per_kilobyte = if total_bytes == 0 {
        0.0
    } else {
        total_energy / (total_bytes as f64 / 1000.0)
    };
    RadioStats {
        states: per_state.into_values().collect(),
        total_energy,
        joules_per_kilobyte,
    }
}

#[cfg(test)]
mod tests {
    use super::radio_stats;
    use crate::profile::UmtsProfile;
    use crate::radio::{RadioState, RadioStateInterval};

    #[test]
    fn tail_time_counts_toward_parent() {
        let intervals = vec![
            RadioStateInterval {
                begin: 0.0,
                end: 2.0,
                state: RadioState::PromoIdleDch,
            },
            RadioStateInterval {
                begin: 2.0,
                end: 3.0,
                state: RadioState::Dch,
            },
            RadioStateInterval {
                begin: 3.0,
                end: 8.0,
                state: RadioState::TailDch,
            },
            RadioStateInterval {
                begin: 8.0,
                end: 10.0,
                state: RadioState::Idle,
            },
        ];
        let stats = radio_stats(&intervals, &UmtsProfile::default(), &[], 2000);

        let dch = stats.state(RadioState::Dch).unwrap();
        assert!((dch.time - 6.0).abs() < 1e-9);
        assert!((dch.energy - 4.2).abs() < 1e-9);
        assert_eq!(dch.occurrences, 1);
        assert!((stats.state(RadioState::TailDch).unwrap().time - 5.0).abs() < 1e-9);
        assert_eq!(stats.state(RadioState::PromoIdleDch).unwrap().occurrences, 1);

        let expected_total = 2.0 * 0.53 + 6.0 * 0.7;
        assert!((stats.total_energy - expected_total).abs() < 1e-9);
        assert!((stats.joules_per_kilobyte - expected_total / 2.0).abs() < 1e-9);
    }

    #[test]
    fn no_traffic_means_zero_joules_per_kilobyte() {
        let stats = radio_stats(&[], &UmtsProfile::default(), &[], 0);
        assert_eq!(stats.joules_per_kilobyte, 0.0);
        assert!(stats.states.is_empty());
    }
}
