//! Inter-arrival time clustering.

use std::collections::HashMap;

use crate::profile::AnalysisParams;

/// Gap between two occurrences of the same target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct IatPair {
    /// Index of the earlier occurrence.
    pub begin_event: usize,
    /// Index of the later occurrence.
    pub end_event: usize,
    pub begin_time: f64,
    pub iat: f64,
}

/// Every pairwise gap, sorted by gap.
pub(crate) fn pairs(times: &[f64]) -> Vec<IatPair> {
    let mut pairs = Vec::with_capacity(times.len() * times.len().saturating_sub(1) / 2);
    for i in 0..times.len() {
        for j in i + 1..times.len() {
            let (begin_event, end_event) = if times[i] <= times[j] { (i, j) } else { (j, i) };
            pairs.push(IatPair {
                begin_event,
                end_event,
                begin_time: times[begin_event],
                iat: times[end_event] - times[begin_event],
            });
        }
    }
    pairs.sort_by(|a, b| a.iat.total_cmp(&b.iat));
    pairs
}

/// Longest run of pairs where each pair starts at the event the previous one
/// ended on.
pub(crate) fn chain_length(cluster: &[IatPair]) -> usize {
    let mut cluster = cluster.to_vec();
    cluster.sort_by(|a, b| a.begin_time.total_cmp(&b.begin_time));

    // Longest chain seen so far that ends on each event.
    let mut ending_at: HashMap<usize, usize> = HashMap::new();
    let mut best = 0;
    for pair in &cluster {
        let length = ending_at.get(&pair.begin_event).map_or(1, |length| length + 1);
        let entry = ending_at.entry(pair.end_event).or_default();
        *entry = (*entry).max(length);
        best = best.max(length);
    }
    best
}

/// Best chain over all clusters whose average gap exceeds the minimum cycle.
/// Returns the chain length and the cluster's average gap.
fn best_cluster(times: &[f64], params: &AnalysisParams) -> Option<(usize, f64)> {
    let pairs = pairs(times);
    let mut best: Option<(usize, f64)> = None;
    // Clusters are contiguous runs of the sorted pairs and their ends only
    // move forward.
    let mut end = 0;
    let mut sum = 0.0;
    for start in 0..pairs.len() {
        let smallest = pairs[start].iat;
        while end < pairs.len() && pairs[end].iat - smallest < params.period_cycle_tolerance {
            sum += pairs[end].iat;
            end += 1;
        }
        if end <= start {
            // Zero tolerance leaves every cluster empty.
            end = start + 1;
            continue;
        }
        let average = sum / (end - start) as f64;
        sum -= smallest;
        if average <= params.period_min_cycle {
            continue;
        }
        let length = chain_length(&pairs[start..end]);
        if best.is_none_or(|(best, _)| length > best) {
            best = Some((length, average));
        }
    }
    best
}

fn is_periodic_chunk(times: &[f64], params: &AnalysisParams) -> bool {
    best_cluster(times, params)
        .is_some_and(|(length, cycle)| length >= params.period_min_samples && cycle > 0.0)
}

/// A target is periodic when some cluster of similar gaps forms a long enough
/// chain of consecutive occurrences. Targets with no more than
/// `period_sample_floor` samples are skipped. Long sample lists are split
/// into chunks of `period_chunk_size` and the target is periodic if any chunk
/// is; a pattern spanning a chunk boundary may be missed.
pub(crate) fn is_periodic(times: &[f64], params: &AnalysisParams) -> bool {
    if times.len() <= params.period_sample_floor {
        return false;
    }
    times
        .chunks(params.period_chunk_size.max(1))
        .any(|chunk| is_periodic_chunk(chunk, params))
}
