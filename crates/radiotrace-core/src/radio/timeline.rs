use super::{RadioState, RadioStateInterval};

/// Tolerance for timer comparisons and look-back rewriting.
pub(crate) const EPS: f64 = 1e-5;

/// Append-only interval list with a bounded rewrite of its tail.
#[derive(Debug, Default)]
pub(crate) struct Timeline {
    intervals: Vec<RadioStateInterval>,
}

impl Timeline {
    /// Append `[begin, begin + duration)` clipped to `limit` and return where
    /// it ends. Nothing is appended when `begin >= limit` or the duration is
    /// not positive; `begin` is returned unchanged then.
    pub(crate) fn push(&mut self, begin: f64, duration: f64, state: RadioState, limit: f64) -> f64 {
        if begin >= limit || duration <= 0.0 {
            return begin;
        }
        let end = if begin + duration > limit {
            limit
        } else {
            begin + duration
        };
        self.intervals.push(RadioStateInterval { begin, end, state });
        end
    }

    /// Append `[begin, limit)`.
    pub(crate) fn push_until(&mut self, begin: f64, state: RadioState, limit: f64) -> f64 {
        self.push(begin, f64::INFINITY, state, limit)
    }

    /// Relabel the newest intervals, walking backwards until `duration`
    /// seconds are covered. Whole intervals are relabeled.
    pub(crate) fn relabel_back(&mut self, duration: f64, state: RadioState) {
        let mut remaining = duration;
        if remaining < EPS {
            return;
        }
        for interval in self.intervals.iter_mut().rev() {
            interval.state = state;
            remaining -= interval.duration();
            if remaining <= EPS {
                break;
            }
        }
    }

    /// Merge, clip to `[0, duration)` and pad the remainder with `idle`.
    pub(crate) fn finish(self, duration: f64, idle: RadioState) -> Vec<RadioStateInterval> {
        let mut intervals = compress(&self.intervals);
        intervals.retain(|interval| interval.begin < duration);
        for interval in &mut intervals {
            interval.end = interval.end.min(duration);
        }

        let covered = intervals.last().map_or(0.0, |interval| interval.end);
        let empty = intervals.is_empty();
        match intervals.last_mut() {
            Some(last) if covered < duration && last.state == idle => last.end = duration,
            _ if covered < duration || empty => {
                intervals.push(RadioStateInterval {
                    begin: covered,
                    end: duration.max(covered),
                    state: idle,
                });
            }
            _ => {}
        }
        intervals
    }
}

/// Sort by start time and merge runs of the same state. A merged interval
/// ends where the last interval of its run ends.
///
/// # Examples
/// ```
/// use radiotrace_core::radio::{RadioState, RadioStateInterval, compress};
///
/// let intervals = [
///     RadioStateInterval { begin: 0.0, end: 1.0, state: RadioState::Dch },
///     RadioStateInterval { begin: 1.0, end: 2.0, state: RadioState::Dch },
///     RadioStateInterval { begin: 2.0, end: 3.0, state: RadioState::Fach },
/// ];
/// let merged = compress(&intervals);
/// assert_eq!(merged.len(), 2);
/// assert_eq!(merged[0].end, 2.0);
/// assert_eq!(compress(&merged), merged);
/// ```
pub fn compress(intervals: &[RadioStateInterval]) -> Vec<RadioStateInterval> {
    let mut sorted = intervals.to_vec();
    sorted.sort_by(|a, b| a.begin.total_cmp(&b.begin));

    let mut merged: Vec<RadioStateInterval> = Vec::with_capacity(sorted.len());
    for interval in sorted {
        match merged.last_mut() {
            Some(last) if last.state == interval.state => last.end = interval.end,
            _ => merged.push(interval),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::{Timeline, compress};
    use crate::radio::{RadioState, RadioStateInterval};

    fn interval(begin: f64, end: f64, state: RadioState) -> RadioStateInterval {
        RadioStateInterval { begin, end, state }
    }

    #[test]
    fn push_is_clipped_to_limit() {
        let mut timeline = Timeline::default();
        assert_eq!(timeline.push(0.0, 5.0, RadioState::TailDch, 2.0), 2.0);
        assert_eq!(timeline.push(2.0, 1.0, RadioState::Fach, 2.0), 2.0);
        assert_eq!(timeline.push(2.0, 0.0, RadioState::Fach, 9.0), 2.0);
        assert_eq!(timeline.push_until(2.0, RadioState::Idle, 4.0), 4.0);
        assert_eq!(
            timeline.intervals,
            vec![
                interval(0.0, 2.0, RadioState::TailDch),
                interval(2.0, 4.0, RadioState::Idle)
            ]
        );
    }

    #[test]
    fn relabel_back_rewrites_whole_intervals() {
        let mut timeline = Timeline::default();
        timeline.push(0.0, 1.0, RadioState::Dch, 10.0);
        timeline.push(1.0, 1.0, RadioState::Dch, 10.0);
        timeline.push(2.0, 0.5, RadioState::Dch, 10.0);
        timeline.relabel_back(1.2, RadioState::TailDch);
        let states: Vec<RadioState> = timeline.intervals.iter().map(|i| i.state).collect();
        assert_eq!(
            states,
            vec![RadioState::Dch, RadioState::TailDch, RadioState::TailDch]
        );

        timeline.relabel_back(1e-7, RadioState::Idle);
        assert_eq!(timeline.intervals[2].state, RadioState::TailDch);
    }

    #[test]
    fn compress_merges_runs_and_is_idempotent() {
        let intervals = vec![
            interval(2.0, 3.0, RadioState::Fach),
            interval(0.0, 1.0, RadioState::Dch),
            interval(1.0, 2.0, RadioState::Dch),
            interval(3.0, 4.0, RadioState::Fach),
            interval(4.0, 6.0, RadioState::Idle),
        ];
        let once = compress(&intervals);
        assert_eq!(
            once,
            vec![
                interval(0.0, 2.0, RadioState::Dch),
                interval(2.0, 4.0, RadioState::Fach),
                interval(4.0, 6.0, RadioState::Idle),
            ]
        );
        assert_eq!(compress(&once), once);
    }

    #[test]
    fn finish_clips_and_pads_with_idle() {
        let mut timeline = Timeline::default();
        timeline.push(0.0, 2.0, RadioState::Dch, 10.0);
        timeline.push(2.0, 5.0, RadioState::TailDch, 10.0);
        timeline.push(7.0, 5.0, RadioState::TailFach, 20.0);
        let clipped = Timeline {
            intervals: timeline.intervals.clone(),
        }
        .finish(5.0, RadioState::Idle);
        assert_eq!(
            clipped,
            vec![
                interval(0.0, 2.0, RadioState::Dch),
                interval(2.0, 5.0, RadioState::TailDch)
            ]
        );

        let padded = timeline.finish(15.0, RadioState::Idle);
        assert_eq!(padded.last(), Some(&interval(12.0, 15.0, RadioState::Idle)));
    }
}
