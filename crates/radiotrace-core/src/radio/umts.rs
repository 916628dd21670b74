//! 3G RRC simulation: IDLE, FACH and DCH with dynamic DCH tails.
//!
//! Promotions are placed so they end exactly at the packet that triggered
//! them. Whatever slack is left before the promotion becomes tail, FACH or
//! IDLE time depending on the timers. A promotion lasts its average delay,
//! falls back to the minimum delay when the average does not fit after the
//! previous packet, and is clipped to the previous packet otherwise.

use tracing::debug;

use crate::packet::{Direction, Packet};
use crate::profile::{PromotionDelay, UmtsProfile};

use super::RadioState;
use super::timeline::{EPS, Timeline};

/// Recent traffic volume per direction. Enough bytes inside the reset window
/// restart the DCH inactivity timer, which makes the tail dynamic.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DemotionQueue {
    uplink: u64,
    downlink: u64,
    last_uplink: f64,
    last_downlink: f64,
    reset_at: f64,
    reset_size: u64,
    reset_window: f64,
    dch_fach_timer: f64,
}

impl DemotionQueue {
    pub(crate) fn new(profile: &UmtsProfile) -> Self {
        Self {
            uplink: 0,
            downlink: 0,
            last_uplink: 0.0,
            last_downlink: 0.0,
            reset_at: 0.0,
            reset_size: u64::from(profile.dch_timer_reset_size),
            reset_window: profile.dch_timer_reset_window,
            dch_fach_timer: profile.dch_fach_timer,
        }
    }

    /// Start over on entering DCH with one packet.
    pub(crate) fn init(&mut self, timestamp: f64, size: u32, direction: Direction) {
        let size = u64::from(size);
        match direction {
            Direction::Uplink => {
                self.uplink = size;
                self.downlink = 0;
                self.last_uplink = timestamp;
                self.last_downlink = -9999.0;
            }
            Direction::Downlink => {
                self.uplink = 0;
                self.downlink = size;
                self.last_downlink = timestamp;
                self.last_uplink = -9999.0;
            }
            Direction::Unknown => {
                self.last_uplink = timestamp;
                self.last_downlink = timestamp;
            }
        }
        self.reset_at = timestamp;
    }

    /// Account one more packet while in DCH.
    pub(crate) fn update(&mut self, timestamp: f64, size: u32, direction: Direction) {
        let size = u64::from(size);
        let (queue, last, other_queue, other_last) = match direction {
            Direction::Uplink => (
                &mut self.uplink,
                &mut self.last_uplink,
                &mut self.downlink,
                self.last_downlink,
            ),
            Direction::Downlink => (
                &mut self.downlink,
                &mut self.last_downlink,
                &mut self.uplink,
                self.last_uplink,
            ),
            Direction::Unknown => return,
        };
        if timestamp > *last + self.reset_window {
            *queue = size;
        } else {
            *queue += size;
        }
        if timestamp > other_last + self.reset_window {
            *other_queue = 0;
        }
        *last = timestamp;

        if self.uplink >= self.reset_size || self.downlink >= self.reset_size {
            self.reset_at = timestamp;
        }
    }

    /// DCH time left after the most recent packet.
    pub(crate) fn tail(&self) -> f64 {
        let last = self.last_uplink.max(self.last_downlink);
        (self.dch_fach_timer - (last - self.reset_at)).max(0.0)
    }
}

/// RLC buffer occupancy while in FACH. A buffer over its threshold forces a
/// promotion to DCH.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FachQueue {
    uplink: f64,
    downlink: f64,
    last_uplink: f64,
    last_downlink: f64,
}

impl Default for FachQueue {
    fn default() -> Self {
        Self {
            uplink: 0.0,
            downlink: 0.0,
            last_uplink: -1000.0,
            last_downlink: -1000.0,
        }
    }
}

impl FachQueue {
    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }

    /// Queue one packet and report whether either buffer is over threshold.
    pub(crate) fn overflows(
        &mut self,
        profile: &UmtsProfile,
        timestamp: f64,
        direction: Direction,
        size: u32,
    ) -> bool {
        let (queue, last, rate) = match direction {
            Direction::Uplink => (&mut self.uplink, &mut self.last_uplink, &profile.rlc_ul_rate),
            Direction::Downlink => (
                &mut self.downlink,
                &mut self.last_downlink,
                &profile.rlc_dl_rate,
            ),
            Direction::Unknown => {
                return self.over_threshold(profile);
            }
        };
        if timestamp - *last > rate.drain_time(*queue) {
            *queue = 0.0;
        }
        *queue += f64::from(size);
        *last = timestamp;
        self.over_threshold(profile)
    }

    fn over_threshold(&self, profile: &UmtsProfile) -> bool {
        self.downlink > f64::from(profile.rlc_dl_threshold)
            || self.uplink > f64::from(profile.rlc_ul_threshold)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Dch,
    Fach,
}

struct UmtsSimulator<'a> {
    profile: &'a UmtsProfile,
    timeline: Timeline,
    demotion: DemotionQueue,
    fach: FachQueue,
    mode: Mode,
    previous: Option<f64>,
}

impl<'a> UmtsSimulator<'a> {
    fn new(profile: &'a UmtsProfile) -> Self {
        Self {
            profile,
            timeline: Timeline::default(),
            demotion: DemotionQueue::new(profile),
            fach: FachQueue::default(),
            mode: Mode::Dch,
            previous: None,
        }
    }

    fn on_packet(&mut self, packet: &Packet) {
        let timestamp = packet.timestamp;
        match self.previous {
            None => self.promote(0.0, timestamp, RadioState::Idle, packet),
            Some(previous) => match self.mode {
                Mode::Dch => self.from_dch(previous, packet),
                Mode::Fach => self.from_fach(previous, packet),
            },
        }
        self.previous = Some(timestamp);
    }

    /// Fill `[from, promotion start)` with `waiting` and put the promotion
    /// right before the packet. Ends in DCH.
    fn promote(&mut self, from: f64, timestamp: f64, waiting: RadioState, packet: &Packet) {
        let (delay, promotion) = match waiting {
            RadioState::Fach => (&self.profile.fach_dch_promo, RadioState::PromoFachDch),
            _ => (&self.profile.idle_dch_promo, RadioState::PromoIdleDch),
        };
        let start = promotion_start(delay, from, timestamp);
        if timestamp - start < delay.min - EPS {
            debug!(
                packet = packet.id.0,
                available = timestamp - start,
                min = delay.min,
                "promotion shorter than the profile minimum"
            );
        }
        self.timeline.push_until(from, waiting, start);
        self.timeline.push_until(start, promotion, timestamp);
        self.mode = Mode::Dch;
        self.demotion.init(timestamp, packet.len, packet.direction);
    }

    fn from_dch(&mut self, previous: f64, packet: &Packet) {
        let profile = self.profile;
        let timestamp = packet.timestamp;
        let gap = timestamp - previous;
        let tail = self.demotion.tail();

        if gap <= tail + EPS {
            self.timeline.push_until(previous, RadioState::Dch, timestamp);
            self.demotion
                .update(timestamp, packet.len, packet.direction);
        } else if gap <= tail + profile.fach_idle_timer {
            self.timeline
                .relabel_back(profile.dch_fach_timer - tail, RadioState::TailDch);
            self.fach.reset();
            if self
                .fach
                .overflows(profile, timestamp, packet.direction, packet.len)
            {
                let start = promotion_start(&profile.fach_dch_promo, previous, timestamp);
                let at = self.timeline.push(previous, tail, RadioState::TailDch, start);
                self.promote(at, timestamp, RadioState::Fach, packet);
            } else {
                let at = self
                    .timeline
                    .push(previous, tail, RadioState::TailDch, timestamp);
                self.timeline.push_until(at, RadioState::Fach, timestamp);
                self.mode = Mode::Fach;
            }
        } else {
            self.timeline
                .relabel_back(profile.dch_fach_timer - tail, RadioState::TailDch);
            let start = promotion_start(&profile.idle_dch_promo, previous, timestamp);
            let at = self.timeline.push(previous, tail, RadioState::TailDch, start);
            let at = self
                .timeline
                .push(at, profile.fach_idle_timer, RadioState::TailFach, start);
            self.promote(at, timestamp, RadioState::Idle, packet);
        }
    }

    fn from_fach(&mut self, previous: f64, packet: &Packet) {
        let profile = self.profile;
        let timestamp = packet.timestamp;
        let gap = timestamp - previous;

        if gap <= profile.fach_idle_timer {
            if self
                .fach
                .overflows(profile, timestamp, packet.direction, packet.len)
            {
                self.promote(previous, timestamp, RadioState::Fach, packet);
            } else {
                self.timeline.push_until(previous, RadioState::Fach, timestamp);
            }
        } else {
            let start = promotion_start(&profile.idle_dch_promo, previous, timestamp);
            let at = self
                .timeline
                .push(previous, profile.fach_idle_timer, RadioState::TailFach, start);
            self.promote(at, timestamp, RadioState::Idle, packet);
        }
    }

    /// Tails after the last packet run to completion; the trace end clips them.
    fn finish(mut self) -> Timeline {
        let profile = self.profile;
        let Some(previous) = self.previous else {
            return self.timeline;
        };
        let at = match self.mode {
            Mode::Dch => {
                let tail = self.demotion.tail();
                self.timeline
                    .relabel_back(profile.dch_fach_timer - tail, RadioState::TailDch);
                self.timeline
                    .push(previous, tail, RadioState::TailDch, f64::INFINITY)
            }
            Mode::Fach => previous,
        };
        self.timeline.push(
            at,
            profile.fach_idle_timer,
            RadioState::TailFach,
            f64::INFINITY,
        );
        self.timeline
    }
}

/// Start of a promotion ending at `timestamp` that may not begin before
/// `from`: the average delay if it fits, else the minimum, else `from`.
fn promotion_start(delay: &PromotionDelay, from: f64, timestamp: f64) -> f64 {
    [delay.avg, delay.min]
        .into_iter()
        .map(|length| timestamp - length)
        .find(|&start| start >= from)
        .unwrap_or(from)
}

pub(super) fn simulate(packets: &[Packet], profile: &UmtsProfile) -> Timeline {
    let mut simulator = UmtsSimulator::new(profile);
    for packet in packets {
        simulator.on_packet(packet);
    }
    simulator.finish()
}

#[cfg(test)]
mod tests {
    use super::{DemotionQueue, FachQueue, promotion_start};
    use crate::packet::{Direction, Packet};
    use crate::profile::{RadioProfile, UmtsProfile};
    use crate::radio::tests::{assert_contiguous, timed_packet};
    use crate::radio::{RadioState, RadioStateInterval, simulate};

    fn umts(packets: &[Packet], duration: f64) -> Vec<RadioStateInterval> {
        simulate(packets, &RadioProfile::Umts(UmtsProfile::default()), duration)
    }

    fn spans(intervals: &[RadioStateInterval]) -> Vec<(f64, f64, RadioState)> {
        intervals
            .iter()
            .map(|i| {
                let round = |v: f64| (v * 1e6).round() / 1e6;
                (round(i.begin), round(i.end), i.state)
            })
            .collect()
    }

    #[test]
    fn promotion_ends_at_the_triggering_packet() {
        let packets = vec![
            timed_packet(0, 3.0, Direction::Uplink, 60),
            timed_packet(1, 3.5, Direction::Uplink, 1400),
        ];
        let intervals = umts(&packets, 30.0);
        assert_eq!(
            spans(&intervals),
            vec![
                (0.0, 1.0, RadioState::Idle),
                (1.0, 3.0, RadioState::PromoIdleDch),
                (3.0, 3.5, RadioState::Dch),
                (3.5, 8.5, RadioState::TailDch),
                (8.5, 20.5, RadioState::TailFach),
                (20.5, 30.0, RadioState::Idle),
            ]
        );
    }

    #[test]
    fn small_packet_after_tail_stays_in_fach() {
        let packets = vec![
            timed_packet(0, 2.0, Direction::Downlink, 1000),
            timed_packet(1, 10.0, Direction::Uplink, 40),
        ];
        let intervals = umts(&packets, 40.0);
        assert_contiguous(&intervals, 40.0);
        assert_eq!(
            spans(&intervals),
            vec![
                (0.0, 2.0, RadioState::PromoIdleDch),
                (2.0, 7.0, RadioState::TailDch),
                (7.0, 10.0, RadioState::Fach),
                (10.0, 22.0, RadioState::TailFach),
                (22.0, 40.0, RadioState::Idle),
            ]
        );
    }

    #[test]
    fn large_packet_in_fach_promotes_back_to_dch() {
        let packets = vec![
            timed_packet(0, 2.0, Direction::Downlink, 1000),
            timed_packet(1, 10.0, Direction::Downlink, 1200),
        ];
        let intervals = umts(&packets, 40.0);
        assert_contiguous(&intervals, 40.0);
        assert_eq!(
            spans(&intervals)[..4],
            [
                (0.0, 2.0, RadioState::PromoIdleDch),
                (2.0, 7.0, RadioState::TailDch),
                (7.0, 8.5, RadioState::Fach),
                (8.5, 10.0, RadioState::PromoFachDch),
            ]
        );
        assert_eq!(intervals[4].state, RadioState::TailDch);
    }

    #[test]
    fn fach_promotion_keeps_its_length_after_a_short_tail() {
        let packets = vec![
            timed_packet(0, 2.0, Direction::Downlink, 1000),
            timed_packet(1, 7.5, Direction::Downlink, 1200),
        ];
        let intervals = umts(&packets, 40.0);
        assert_contiguous(&intervals, 40.0);
        assert_eq!(
            spans(&intervals)[..3],
            [
                (0.0, 2.0, RadioState::PromoIdleDch),
                (2.0, 6.0, RadioState::TailDch),
                (6.0, 7.5, RadioState::PromoFachDch),
            ]
        );
        let promotion = &intervals[2];
        assert!(promotion.end - promotion.begin >= UmtsProfile::default().fach_dch_promo.min);
        assert_eq!(intervals[3].state, RadioState::TailDch);
    }

    #[test]
    fn fach_burst_right_after_a_packet_uses_minimum_promotion() {
        // 1.0 s after the last FACH packet only the 0.8 s minimum fits.
        let packets = vec![
            timed_packet(0, 2.0, Direction::Downlink, 1000),
            timed_packet(1, 8.0, Direction::Uplink, 100),
            timed_packet(2, 9.0, Direction::Downlink, 1200),
        ];
        let intervals = umts(&packets, 40.0);
        assert_contiguous(&intervals, 40.0);
        assert_eq!(
            spans(&intervals)[..4],
            [
                (0.0, 2.0, RadioState::PromoIdleDch),
                (2.0, 7.0, RadioState::TailDch),
                (7.0, 8.2, RadioState::Fach),
                (8.2, 9.0, RadioState::PromoFachDch),
            ]
        );

        // Not even the minimum fits 0.5 s later: clipped to the FACH packet.
        let packets = vec![
            timed_packet(0, 2.0, Direction::Downlink, 1000),
            timed_packet(1, 8.0, Direction::Uplink, 100),
            timed_packet(2, 8.5, Direction::Downlink, 1200),
        ];
        let intervals = umts(&packets, 40.0);
        assert_eq!(
            spans(&intervals)[2..4],
            [
                (7.0, 8.0, RadioState::Fach),
                (8.0, 8.5, RadioState::PromoFachDch),
            ]
        );
    }

    #[test]
    fn promotion_start_prefers_average_then_minimum() {
        let delay = UmtsProfile::default().idle_dch_promo;
        assert_eq!(promotion_start(&delay, 0.0, 10.0), 8.0);
        assert_eq!(promotion_start(&delay, 8.2, 10.0), 8.5);
        assert_eq!(promotion_start(&delay, 9.0, 10.0), 9.0);
    }

    #[test]
    fn long_gap_demotes_to_idle_and_promotes_again() {
        let packets = vec![
            timed_packet(0, 2.0, Direction::Uplink, 1000),
            timed_packet(1, 60.0, Direction::Downlink, 100),
        ];
        let intervals = umts(&packets, 80.0);
        assert_contiguous(&intervals, 80.0);
        let states: Vec<RadioState> = intervals.iter().map(|i| i.state).collect();
        assert_eq!(
            states,
            vec![
                RadioState::PromoIdleDch,
                RadioState::TailDch,
                RadioState::TailFach,
                RadioState::Idle,
                RadioState::PromoIdleDch,
                RadioState::TailDch,
                RadioState::TailFach,
                RadioState::Idle,
            ]
        );
        assert!((intervals[4].begin - 58.0).abs() < 1e-9);
        assert!((intervals[4].end - 60.0).abs() < 1e-9);
    }

    #[test]
    fn demotion_queue_restarts_timer_on_volume() {
        let profile = UmtsProfile::default();
        let mut queue = DemotionQueue::new(&profile);
        queue.init(1.0, 100, Direction::Uplink);
        queue.update(2.0, 100, Direction::Uplink);
        assert!((queue.tail() - 4.0).abs() < 1e-9);
        queue.update(2.1, 300, Direction::Uplink);
        assert!((queue.tail() - 5.0).abs() < 1e-9);
        queue.update(3.0, 10, Direction::Unknown);
        assert!((queue.tail() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn fach_queue_drains_between_packets() {
        let profile = UmtsProfile::default();
        let mut queue = FachQueue::default();
        assert!(!queue.overflows(&profile, 1.0, Direction::Uplink, 300));
        // 300 queued bytes need well over 10 ms to drain.
        assert!(queue.overflows(&profile, 1.01, Direction::Uplink, 300));
        queue.reset();
        assert!(!queue.overflows(&profile, 5.0, Direction::Uplink, 300));
        assert!(!queue.overflows(&profile, 9.0, Direction::Uplink, 300));
    }
}
