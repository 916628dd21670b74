use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Burst, BurstCategory};

/// Totals for one burst category, with shares of the trace totals in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub category: BurstCategory,
    pub bursts: u64,
    pub payload: u64,
    pub payload_share: f64,
    pub energy: f64,
    pub energy_share: f64,
    pub active_time: f64,
    pub active_share: f64,
    /// Energy per kilobit of payload; absent for categories without payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub joules_per_kilobit: Option<f64>,
}

fn share(part: f64, total: f64) -> f64 {
    if total > 0.0 { part / total * 100.0 } else { 0.0 }
}

/// Per-category totals in category order.
pub fn category_stats(bursts: &[Burst]) -> Vec<CategoryStats> {
    let mut totals: BTreeMap<BurstCategory, (u64, u64, f64, f64)> = BTreeMap::new();
    for burst in bursts {
        let entry = totals.entry(burst.category).or_default();
        entry.0 += 1;
        entry.1 += burst.payload;
        entry.2 += burst.energy;
        entry.3 += burst.active_time;
    }
    let payload_total = totals.values().map(|t| t.1).sum::<u64>() as f64;
    let energy_total: f64 = totals.values().map(|t| t.2).sum();
    let active_total: f64 = totals.values().map(|t| t.3).sum();

    totals
        .into_iter()
        .map(|(category, (count, payload, energy, active_time))| CategoryStats {
            category,
            bursts: count,
            payload,
            payload_share: share(payload as f64, payload_total),
            energy,
            energy_share: share(energy, energy_total),
            active_time,
            active_share: share(active_time, active_total),
            joules_per_kilobit: (payload > 0).then(|| energy / (payload as f64 * 8.0 / 1000.0)),
        })
        .collect()
}
