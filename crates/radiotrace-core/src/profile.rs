//! Radio timing/power profiles and analysis thresholds.
//!
//! Profiles are plain data supplied by the caller (usually from the CLI
//! configuration file). Every struct deserializes with defaults so partial
//! configuration files are valid; `validate` rejects values the simulators
//! cannot work with.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ProfileError {
    #[error("{name} must be a finite, non-negative number of seconds, got {value}")]
    InvalidTimer { name: &'static str, value: f64 },
    #[error("{name} promotion delays must satisfy min <= avg, got {min}/{avg}")]
    InvalidPromotion {
        name: &'static str,
        min: f64,
        avg: f64,
    },
    #[error("{name} must be greater than zero")]
    ZeroPeriod { name: &'static str },
    #[error("{name} must be a finite, non-negative number, got {value}")]
    InvalidValue { name: &'static str, value: f64 },
    #[error("{name} must be greater than zero")]
    ZeroCount { name: &'static str },
}

fn check_timer(name: &'static str, value: f64) -> Result<(), ProfileError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ProfileError::InvalidTimer { name, value });
    }
    Ok(())
}

fn check_value(name: &'static str, value: f64) -> Result<(), ProfileError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ProfileError::InvalidValue { name, value });
    }
    Ok(())
}

fn check_period(name: &'static str, value: f64) -> Result<(), ProfileError> {
    check_timer(name, value)?;
    if value == 0.0 {
        return Err(ProfileError::ZeroPeriod { name });
    }
    Ok(())
}

/// Radio technology a profile describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RadioFamily {
    Umts,
    Lte,
    Wifi,
}

/// Timing and power model of the device's radio.
///
/// # Examples
/// ```
/// use radiotrace_core::{RadioFamily, RadioProfile};
///
/// let profile = RadioProfile::for_family(RadioFamily::Lte);
/// assert_eq!(profile.family(), RadioFamily::Lte);
/// assert!(profile.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "lowercase")]
pub enum RadioProfile {
    Umts(UmtsProfile),
    Lte(LteProfile),
    Wifi(WifiProfile),
}

impl Default for RadioProfile {
    fn default() -> Self {
        RadioProfile::Umts(UmtsProfile::default())
    }
}

impl RadioProfile {
    pub fn for_family(family: RadioFamily) -> Self {
        match family {
            RadioFamily::Umts => RadioProfile::Umts(UmtsProfile::default()),
            RadioFamily::Lte => RadioProfile::Lte(LteProfile::default()),
            RadioFamily::Wifi => RadioProfile::Wifi(WifiProfile::default()),
        }
    }

    pub fn family(&self) -> RadioFamily {
        match self {
            RadioProfile::Umts(_) => RadioFamily::Umts,
            RadioProfile::Lte(_) => RadioFamily::Lte,
            RadioProfile::Wifi(_) => RadioFamily::Wifi,
        }
    }

    pub fn validate(&self) -> Result<(), ProfileError> {
        match self {
            RadioProfile::Umts(profile) => profile.validate(),
            RadioProfile::Lte(profile) => profile.validate(),
            RadioProfile::Wifi(profile) => profile.validate(),
        }
    }
}

/// Duration of one promotion kind. Promotions normally take `avg`; `min` is
/// used when the traffic before the triggering packet leaves no room for it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PromotionDelay {
    pub min: f64,
    pub avg: f64,
}

impl PromotionDelay {
    fn validate(&self, name: &'static str) -> Result<(), ProfileError> {
        check_timer(name, self.min)?;
        check_timer(name, self.avg)?;
        if self.min > self.avg {
            return Err(ProfileError::InvalidPromotion {
                name,
                min: self.min,
                avg: self.avg,
            });
        }
        Ok(())
    }
}

/// Quadratic cost of draining a FACH buffer: `(p2 * q^2 + p1 * q + p0)` ms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QueueRate {
    pub p2: f64,
    pub p1: f64,
    pub p0: f64,
}

impl QueueRate {
    /// Seconds needed to drain `bytes` queued bytes.
    pub fn drain_time(&self, bytes: f64) -> f64 {
        (bytes * bytes * self.p2 + bytes * self.p1 + self.p0) / 1000.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UmtsPower {
    pub dch: f64,
    pub fach: f64,
    pub idle: f64,
    pub idle_dch: f64,
    pub fach_dch: f64,
}

impl Default for UmtsPower {
    fn default() -> Self {
        Self {
            dch: 0.7,
            fach: 0.35,
            idle: 0.0,
            idle_dch: 0.53,
            fach_dch: 0.55,
        }
    }
}

/// 3G (UMTS) RRC model with DCH, FACH and IDLE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UmtsProfile {
    /// DCH inactivity timer before demotion to FACH.
    pub dch_fach_timer: f64,
    /// FACH inactivity timer before demotion to IDLE.
    pub fach_idle_timer: f64,
    pub idle_dch_promo: PromotionDelay,
    pub fach_dch_promo: PromotionDelay,
    /// Uplink RLC buffer size (bytes) that forces FACH to DCH.
    pub rlc_ul_threshold: u32,
    /// Downlink RLC buffer size (bytes) that forces FACH to DCH.
    pub rlc_dl_threshold: u32,
    /// Bytes within the reset window that restart the DCH tail.
    pub dch_timer_reset_size: u32,
    pub dch_timer_reset_window: f64,
    pub rlc_ul_rate: QueueRate,
    pub rlc_dl_rate: QueueRate,
    pub power: UmtsPower,
}

impl Default for UmtsProfile {
    fn default() -> Self {
        Self {
            dch_fach_timer: 5.0,
            fach_idle_timer: 12.0,
            idle_dch_promo: PromotionDelay { min: 1.5, avg: 2.0 },
            fach_dch_promo: PromotionDelay { min: 0.8, avg: 1.5 },
            rlc_ul_threshold: 543,
            rlc_dl_threshold: 475,
            dch_timer_reset_size: 320,
            dch_timer_reset_window: 0.3,
            rlc_ul_rate: QueueRate {
                p2: 0.0014,
                p1: 1.6,
                p0: 20.0,
            },
            rlc_dl_rate: QueueRate {
                p2: 0.0,
                p1: 0.1,
                p0: 10.0,
            },
            power: UmtsPower::default(),
        }
    }
}

impl UmtsProfile {
    pub fn validate(&self) -> Result<(), ProfileError> {
        check_timer("dch_fach_timer", self.dch_fach_timer)?;
        check_timer("fach_idle_timer", self.fach_idle_timer)?;
        check_timer("dch_timer_reset_window", self.dch_timer_reset_window)?;
        self.idle_dch_promo.validate("idle_dch_promo")?;
        self.fach_dch_promo.validate("fach_dch_promo")?;
        for (name, rate) in [("rlc_ul_rate", &self.rlc_ul_rate), ("rlc_dl_rate", &self.rlc_dl_rate)]
        {
            check_value(name, rate.p2)?;
            check_value(name, rate.p1)?;
            check_value(name, rate.p0)?;
        }
        let power = &self.power;
        for (name, value) in [
            ("power.dch", power.dch),
            ("power.fach", power.fach),
            ("power.idle", power.idle),
            ("power.idle_dch", power.idle_dch),
            ("power.fach_dch", power.fach_dch),
        ] {
            check_value(name, value)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LtePower {
    pub promotion: f64,
    pub drx_short_ping: f64,
    pub drx_long_ping: f64,
    pub tail: f64,
    pub idle_ping: f64,
    pub idle: f64,
}

impl Default for LtePower {
    fn default() -> Self {
        Self {
            promotion: 1.21,
            drx_short_ping: 1.68,
            drx_long_ping: 1.68,
            tail: 1.06,
            idle_ping: 0.594,
            idle: 0.0,
        }
    }
}

/// Continuous-reception power as a function of throughput:
/// `alpha_up/1000 * up_mbps + alpha_down/1000 * down_mbps + beta` watts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThroughputModel {
    pub alpha_up: f64,
    pub alpha_down: f64,
    pub beta: f64,
    /// Width of the throughput sampling window in seconds.
    pub window: f64,
}

impl Default for ThroughputModel {
    fn default() -> Self {
        Self {
            alpha_up: 438.39,
            alpha_down: 51.97,
            beta: 1.2,
            window: 0.5,
        }
    }
}

/// LTE RRC model with continuous reception and DRX cycles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LteProfile {
    pub promotion_time: f64,
    /// Continuous reception holds this long after the last packet.
    pub inactivity_timer: f64,
    pub drx_short_time: f64,
    pub drx_ping_time: f64,
    pub drx_long_time: f64,
    pub idle_ping_time: f64,
    pub drx_short_ping_period: f64,
    pub drx_long_ping_period: f64,
    pub idle_ping_period: f64,
    pub power: LtePower,
    pub throughput: ThroughputModel,
}

impl Default for LteProfile {
    fn default() -> Self {
        Self {
            promotion_time: 0.26,
            inactivity_timer: 0.1,
            drx_short_time: 0.02,
            drx_ping_time: 0.002,
            drx_long_time: 10.0,
            idle_ping_time: 0.043,
            drx_short_ping_period: 0.02,
            drx_long_ping_period: 0.04,
            idle_ping_period: 1.28,
            power: LtePower::default(),
            throughput: ThroughputModel::default(),
        }
    }
}

impl LteProfile {
    pub fn validate(&self) -> Result<(), ProfileError> {
        for (name, value) in [
            ("promotion_time", self.promotion_time),
            ("inactivity_timer", self.inactivity_timer),
            ("drx_short_time", self.drx_short_time),
            ("drx_ping_time", self.drx_ping_time),
            ("drx_long_time", self.drx_long_time),
            ("idle_ping_time", self.idle_ping_time),
        ] {
            check_timer(name, value)?;
        }
        check_period("drx_short_ping_period", self.drx_short_ping_period)?;
        check_period("drx_long_ping_period", self.drx_long_ping_period)?;
        check_period("idle_ping_period", self.idle_ping_period)?;
        check_period("throughput.window", self.throughput.window)?;
        let power = &self.power;
        for (name, value) in [
            ("power.promotion", power.promotion),
            ("power.drx_short_ping", power.drx_short_ping),
            ("power.drx_long_ping", power.drx_long_ping),
            ("power.tail", power.tail),
            ("power.idle_ping", power.idle_ping),
            ("power.idle", power.idle),
            ("throughput.alpha_up", self.throughput.alpha_up),
            ("throughput.alpha_down", self.throughput.alpha_down),
            ("throughput.beta", self.throughput.beta),
        ] {
            check_value(name, value)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WifiPower {
    pub active: f64,
    pub idle: f64,
}

impl Default for WifiPower {
    fn default() -> Self {
        Self {
            active: 0.403,
            idle: 0.02,
        }
    }
}

/// WiFi model: active while traffic flows, a fixed tail, then idle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WifiProfile {
    pub tail_time: f64,
    pub power: WifiPower,
}

impl Default for WifiProfile {
    fn default() -> Self {
        Self {
            tail_time: 0.25,
            power: WifiPower::default(),
        }
    }
}

impl WifiProfile {
    pub fn validate(&self) -> Result<(), ProfileError> {
        check_timer("tail_time", self.tail_time)?;
        check_value("power.active", self.power.active)?;
        check_value("power.idle", self.power.idle)?;
        Ok(())
    }
}

/// Burst, classification and periodicity thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisParams {
    /// Gap (seconds) that separates two bursts.
    pub burst_threshold: f64,
    /// Gap to the next burst that marks a burst as followed by a long pause.
    pub long_burst_threshold: f64,
    /// Bursts closer than this to a neighbour are never relabeled periodic.
    pub close_spaced_burst_threshold: f64,
    pub large_burst_duration: f64,
    pub large_burst_size: u64,
    /// Maximum delay between a user event and the burst it triggers.
    pub user_input_threshold: f64,
    /// Look-back window for user events and CPU activity.
    pub user_event_tolerance: f64,
    /// Average CPU usage (percent) above which a burst is CPU-triggered.
    pub cpu_busy_threshold: f64,
    pub period_min_cycle: f64,
    pub period_cycle_tolerance: f64,
    /// Shortest chain of similar gaps that makes a target periodic.
    pub period_min_samples: usize,
    /// Targets seen this many times or fewer are never periodic.
    pub period_sample_floor: usize,
    /// Occurrence lists longer than this are clustered chunk by chunk.
    pub period_chunk_size: usize,
    /// Periodic bursts needed before a minimum repeat interval is reported.
    pub period_repeat_bursts: u64,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            burst_threshold: 1.5,
            long_burst_threshold: 5.0,
            close_spaced_burst_threshold: 10.0,
            large_burst_duration: 5.0,
            large_burst_size: 100_000,
            user_input_threshold: 1.0,
            user_event_tolerance: 4.0,
            cpu_busy_threshold: 70.0,
            period_min_cycle: 10.0,
            period_cycle_tolerance: 1.0,
            period_min_samples: 3,
            period_sample_floor: 3,
            period_chunk_size: 200,
            period_repeat_bursts: 3,
        }
    }
}

impl AnalysisParams {
    pub fn validate(&self) -> Result<(), ProfileError> {
        for (name, value) in [
            ("burst_threshold", self.burst_threshold),
            ("long_burst_threshold", self.long_burst_threshold),
            ("close_spaced_burst_threshold", self.close_spaced_burst_threshold),
            ("large_burst_duration", self.large_burst_duration),
            ("user_input_threshold", self.user_input_threshold),
            ("user_event_tolerance", self.user_event_tolerance),
            ("period_min_cycle", self.period_min_cycle),
            ("period_cycle_tolerance", self.period_cycle_tolerance),
        ] {
            check_timer(name, value)?;
        }
        check_value("cpu_busy_threshold", self.cpu_busy_threshold)?;
        for (name, value) in [
            ("period_min_samples", self.period_min_samples),
            ("period_chunk_size", self.period_chunk_size),
        ] {
            if value == 0 {
                return Err(ProfileError::ZeroCount { name });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{
        AnalysisParams, LteProfile, ProfileError, PromotionDelay, QueueRate, RadioFamily,
        RadioProfile, UmtsProfile,
    };

    #[test]
    fn defaults_validate() {
        for family in [RadioFamily::Umts, RadioFamily::Lte, RadioFamily::Wifi] {
            let profile = RadioProfile::for_family(family);
            assert_eq!(profile.family(), family);
            profile.validate().unwrap();
        }
        AnalysisParams::default().validate().unwrap();
    }

    #[test]
    fn unordered_promotion_is_rejected() {
        let profile = UmtsProfile {
            idle_dch_promo: PromotionDelay { min: 3.0, avg: 2.0 },
            ..UmtsProfile::default()
        };
        assert!(matches!(
            profile.validate(),
            Err(ProfileError::InvalidPromotion {
                name: "idle_dch_promo",
                ..
            })
        ));
    }

    #[test]
    fn zero_ping_period_is_rejected() {
        let profile = LteProfile {
            idle_ping_period: 0.0,
            ..LteProfile::default()
        };
        assert_eq!(
            profile.validate(),
            Err(ProfileError::ZeroPeriod {
                name: "idle_ping_period"
            })
        );
    }

    #[test]
    fn negative_and_nan_timers_are_rejected() {
        let params = AnalysisParams {
            burst_threshold: f64::NAN,
            ..AnalysisParams::default()
        };
        assert!(params.validate().is_err());
        let params = AnalysisParams {
            period_min_samples: 0,
            ..AnalysisParams::default()
        };
        assert_eq!(
            params.validate(),
            Err(ProfileError::ZeroCount {
                name: "period_min_samples"
            })
        );
        let params = AnalysisParams {
            period_chunk_size: 0,
            ..AnalysisParams::default()
        };
        assert_eq!(
            params.validate(),
            Err(ProfileError::ZeroCount {
                name: "period_chunk_size"
            })
        );
    }

    #[test]
    fn drain_time_is_quadratic_in_milliseconds() {
        let rate = QueueRate {
            p2: 0.0014,
            p1: 1.6,
            p0: 20.0,
        };
        let expected = (0.0014 * 100.0 * 100.0 + 1.6 * 100.0 + 20.0) / 1000.0;
        assert!((rate.drain_time(100.0) - expected).abs() < 1e-12);
    }

    #[test]
    fn profile_round_trips_through_family_tag() {
        let json = serde_json::json!({ "family": "wifi", "tail_time": 0.5 });
        let profile: RadioProfile = serde_json::from_value(json).unwrap();
        match profile {
            RadioProfile::Wifi(wifi) => {
                assert_eq!(wifi.tail_time, 0.5);
                assert_eq!(wifi.power.active, 0.403);
            }
            other => panic!("unexpected profile {other:?}"),
        }
    }
}
