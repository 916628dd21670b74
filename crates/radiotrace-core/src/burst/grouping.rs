use std::collections::{HashMap, HashSet};

use crate::packet::Packet;
use crate::radio::RadioStateInterval;

/// Payloads above this size are candidates for the segment size.
const LARGE_PAYLOAD: usize = 1000;
/// Share of large packets a size needs to count as a segment size.
const SEGMENT_SHARE: f64 = 0.3;
const DEFAULT_SEGMENT_SIZE: usize = 1460;
const PROMOTION_EPS: f64 = 1e-6;

/// Payload sizes that look like full TCP segments. A gap after such a packet
/// is part of a transfer, not the end of a burst.
pub(crate) fn segment_sizes(packets: &[Packet]) -> HashSet<usize> {
    let mut counts: HashMap<usize, u64> = HashMap::new();
    for packet in packets {
        *counts.entry(packet.payload_len()).or_default() += 1;
    }
    let large: Vec<(usize, u64)> = counts
        .into_iter()
        .filter(|&(size, count)| size > LARGE_PAYLOAD && count > 1)
        .collect();
    let total: u64 = large.iter().map(|&(_, count)| count).sum();
    if total == 0 {
        return HashSet::from([DEFAULT_SEGMENT_SIZE]);
    }
    large
        .into_iter()
        .filter(|&(_, count)| count as f64 / total as f64 > SEGMENT_SHARE)
        .map(|(size, _)| size)
        .collect()
}

/// Packet timestamps with the time spent in promotions taken out.
///
/// A packet sitting inside a promotion shifts by the part of the promotion
/// before it; later packets in the same promotion only add the time since the
/// previous one.
pub(crate) fn without_promotions(packets: &[Packet], intervals: &[RadioStateInterval]) -> Vec<f64> {
    let promotions: Vec<&RadioStateInterval> = intervals
        .iter()
        .filter(|interval| interval.state.is_promotion())
        .collect();

    let mut shifted = Vec::with_capacity(packets.len());
    let mut shift = 0.0;
    let mut next = 0;
    let mut inside: Option<f64> = None;
    for packet in packets {
        let timestamp = packet.timestamp;
        while next < promotions.len() && timestamp >= promotions[next].end - PROMOTION_EPS {
            let promotion = promotions[next];
            shift += match inside.take() {
                Some(position) => promotion.end - position,
                None => promotion.duration(),
            };
            next += 1;
        }
        if let Some(promotion) = promotions.get(next) {
            if promotion.begin - PROMOTION_EPS < timestamp
                && timestamp < promotion.end + PROMOTION_EPS
            {
                shift += timestamp - inside.unwrap_or(promotion.begin);
                inside = Some(timestamp);
            }
        }
        shifted.push(timestamp - shift);
    }
    shifted
}

/// Split the trace into bursts (as ranges of packet positions).
///
/// A burst ends where the gap exceeds `threshold`, unless the packet before
/// the gap has a segment-sized payload. Neighbours whose gap falls under the
/// threshold once promotions are removed are merged back.
pub(crate) fn group(
    packets: &[Packet],
    intervals: &[RadioStateInterval],
    threshold: f64,
) -> Vec<std::ops::Range<usize>> {
    if packets.is_empty() {
        return Vec::new();
    }
    let segments = segment_sizes(packets);

    let mut raw = Vec::new();
    let mut start = 0;
    for index in 1..packets.len() {
        let previous = &packets[index - 1];
        if packets[index].timestamp - previous.timestamp > threshold
            && !segments.contains(&previous.payload_len())
        {
            raw.push(start..index);
            start = index;
        }
    }
    raw.push(start..packets.len());

    let normalized = without_promotions(packets, intervals);
    let mut merged: Vec<std::ops::Range<usize>> = Vec::with_capacity(raw.len());
    for range in raw {
        match merged.last_mut() {
            Some(current) if normalized[range.start] - normalized[current.end - 1] < threshold => {
                current.end = range.end;
            }
            _ => merged.push(range),
        }
    }
    merged
}
