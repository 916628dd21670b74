//! radiotrace core library for offline analysis of mobile packet traces.
//!
//! A capture is decoded into time-ordered packets, which flow through four
//! stages: TCP/UDP session reassembly, radio resource state simulation, burst
//! grouping and classification, and periodic transfer detection. The results
//! are collected into a deterministic, serialisable report.
//! All I/O is isolated in `source` modules; protocol helpers follow a
//! layout/reader/parser split and stay free of side effects.
//!
//! Invariants:
//! - Radio state intervals are sorted, contiguous and cover the whole trace.
//! - Every packet belongs to exactly one burst, and every burst has one category.
//! - Report outputs are deterministic and stable across runs.
//!
//! # Examples
//! ```no_run
//! use std::path::Path;
//!
//! use radiotrace_core::{AnalysisOptions, analyze_pcap_file};
//!
//! let report = analyze_pcap_file(Path::new("trace.pcap"), &AnalysisOptions::default())?;
//! println!("report version: {}", report.report_version);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use serde::{Deserialize, Serialize};

mod analysis;
pub mod burst;
pub mod decode;
pub mod events;
pub mod packet;
pub mod periodicity;
mod profile;
pub mod protocols;
pub mod radio;
pub mod session;
mod source;

pub use analysis::{
    AnalysisError, AnalysisOptions, CancelToken, TraceAnalysis, analyze_packets,
    analyze_pcap_file, analyze_source, fill_report,
};
pub use burst::{BurstCategory, CategoryStats};
pub use events::{CpuSample, UserEvent, UserEventKind};
pub use packet::{Direction, Packet, PacketId, TcpFlags, TcpInfo};
pub use periodicity::PeriodicitySummary;
pub use profile::{
    AnalysisParams, LtePower, LteProfile, ProfileError, PromotionDelay, QueueRate, RadioFamily,
    RadioProfile, ThroughputModel, UmtsPower, UmtsProfile, WifiPower, WifiProfile,
};
pub use radio::{RadioState, RadioStateInterval, RadioStats};
pub use session::{SessionProtocol, TerminationKind};
pub use source::{PacketEvent, PacketSource, PcapFileSource, SourceError, VecSource};

/// Current report schema version.
pub const REPORT_VERSION: u32 = 1;
/// Default timestamp used when no capture time is available.
pub const DEFAULT_GENERATED_AT: &str = "1970-01-01T00:00:00Z";

/// Aggregated analysis report with deterministic ordering.
///
/// # Examples
/// ```
/// use radiotrace_core::make_stub_report;
///
/// let report = make_stub_report("trace.pcap", 123);
/// assert_eq!(report.report_version, radiotrace_core::REPORT_VERSION);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Report schema version (not the binary version).
    pub report_version: u32,
    /// Tool identification metadata.
    pub tool: ToolInfo,
    /// RFC3339 timestamp representing the report generation time.
    pub generated_at: String,

    /// Input capture metadata.
    pub input: InputInfo,

    /// Optional capture summary (may be empty when unavailable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capture_summary: Option<CaptureSummary>,
    /// Sessions, TCP by start time first, then UDP.
    pub sessions: Vec<SessionSummary>,
    /// Simulated radio timeline and per-state totals.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radio: Option<RadioSummary>,
    /// Bursts in time order.
    pub bursts: Vec<BurstSummary>,
    /// Per-category burst totals in category order.
    pub burst_categories: Vec<CategoryStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub periodicity: Option<PeriodicitySummary>,
}

/// Tool metadata embedded in reports.
///
/// # Examples
/// ```
/// use radiotrace_core::ToolInfo;
///
/// let tool = ToolInfo {
///     name: "radiotrace".to_string(),
///     version: "0.1.0".to_string(),
/// };
/// assert_eq!(tool.name, "radiotrace");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    /// Tool name (e.g., "radiotrace").
    pub name: String,
    /// Tool version (semver).
    pub version: String,
}

/// Input capture metadata embedded in reports.
///
/// # Examples
/// ```
/// use radiotrace_core::InputInfo;
///
/// let input = InputInfo {
///     path: "trace.pcap".to_string(),
///     bytes: 1024,
/// };
/// assert_eq!(input.bytes, 1024);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputInfo {
    /// Input path as provided to the analyzer.
    pub path: String,
    /// Input size in bytes.
    pub bytes: u64,
}

/// Capture totals (timestamps may be absent).
///
/// # Examples
/// ```
/// use radiotrace_core::CaptureSummary;
///
/// let summary = CaptureSummary {
///     packets_total: 10,
///     packets_decoded: 9,
///     packets_skipped: 1,
///     bytes_total: 4200,
///     time_start: None,
///     time_end: None,
///     duration: 12.5,
///     local_addresses: vec!["10.0.0.2".to_string()],
/// };
/// assert_eq!(summary.packets_total, 10);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSummary {
    /// Frames read from the capture.
    pub packets_total: u64,
    /// Frames decoded into IP packets.
    pub packets_decoded: u64,
    /// Frames that were not IP or could not be decoded.
    pub packets_skipped: u64,
    /// Sum of on-wire frame lengths.
    pub bytes_total: u64,
    /// RFC3339 timestamp of the first packet (if known).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_start: Option<String>,
    /// RFC3339 timestamp of the last packet (if known).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_end: Option<String>,
    /// Analysed trace duration in seconds.
    pub duration: f64,
    /// Addresses treated as the device.
    pub local_addresses: Vec<String>,
}

/// One reconstructed conversation.
///
/// # Examples
/// ```
/// use radiotrace_core::{SessionProtocol, SessionSummary};
///
/// let session = SessionSummary {
///     id: 0,
///     protocol: SessionProtocol::Tcp,
///     local_port: 40000,
///     remote: "93.184.216.34:443".to_string(),
///     domain_name: "example.com".to_string(),
///     tls: true,
///     start: Some(0.5),
///     end: Some(2.0),
///     uplink_packets: 4,
///     downlink_packets: 6,
///     uplink_payload: 517,
///     downlink_payload: 4096,
///     bytes_transferred: 5013,
///     http_requests: 0,
///     termination: None,
/// };
/// assert!(session.tls);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: usize,
    pub protocol: SessionProtocol,
    pub local_port: u16,
    /// Remote endpoint in `ip:port` form.
    pub remote: String,
    /// Host name from HTTP or DNS, or the remote address.
    pub domain_name: String,
    pub tls: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<f64>,
    pub uplink_packets: u64,
    pub downlink_packets: u64,
    /// Reassembled payload bytes sent by the device.
    pub uplink_payload: u64,
    /// Reassembled payload bytes received by the device.
    pub downlink_payload: u64,
    /// Sum of on-wire packet lengths.
    pub bytes_transferred: u64,
    pub http_requests: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub termination: Option<TerminationSummary>,
}

/// How and when a TCP session ended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminationSummary {
    pub kind: TerminationKind,
    /// Seconds between the last data packet and the terminating packet.
    pub delay: f64,
}

/// Radio timeline of the trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadioSummary {
    pub family: RadioFamily,
    pub intervals: Vec<RadioStateInterval>,
    pub stats: RadioStats,
}

/// One burst as reported.
///
/// # Examples
/// ```
/// use radiotrace_core::{BurstCategory, BurstSummary};
///
/// let burst = BurstSummary {
///     id: 3,
///     begin: 10.0,
///     end: 10.4,
///     packets: 12,
///     payload: 5400,
///     category: BurstCategory::UserInput,
///     replaced: None,
///     long_gap: true,
///     first_uplink_data: Some(40),
///     energy: 6.2,
///     active_time: 5.4,
/// };
/// assert_eq!(burst.category, BurstCategory::UserInput);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BurstSummary {
    pub id: usize,
    pub begin: f64,
    pub end: f64,
    /// Packet count.
    pub packets: u64,
    /// Payload bytes.
    pub payload: u64,
    pub category: BurstCategory,
    /// Category replaced by a later pass (e.g. periodicity).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replaced: Option<BurstCategory>,
    /// Followed by a gap longer than the long burst threshold.
    pub long_gap: bool,
    /// Index of the first uplink packet carrying payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_uplink_data: Option<usize>,
    /// Joules charged to the burst.
    pub energy: f64,
    /// Seconds spent in high-power states.
    pub active_time: f64,
}

/// Build a stub report with base fields filled and empty aggregates.
///
/// # Examples
/// ```
/// use radiotrace_core::make_stub_report;
///
/// let report = make_stub_report("trace.pcap", 123);
/// assert_eq!(report.report_version, radiotrace_core::REPORT_VERSION);
/// assert!(report.sessions.is_empty());
/// assert!(report.radio.is_none());
/// ```
pub fn make_stub_report(input_path: &str, input_bytes: u64) -> Report {
    Report {
        report_version: REPORT_VERSION,
        tool: ToolInfo {
            name: "radiotrace".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
        generated_at: DEFAULT_GENERATED_AT.to_string(),
        input: InputInfo {
            path: input_path.to_string(),
            bytes: input_bytes,
        },
        capture_summary: None,
        sessions: vec![],
        radio: None,
        bursts: vec![],
        burst_categories: vec![],
        periodicity: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_omits_optional_fields_when_none() {
        let mut report = make_stub_report("trace.pcap", 1);
        report.capture_summary = Some(CaptureSummary {
            packets_total: 1,
            packets_decoded: 1,
            packets_skipped: 0,
            bytes_total: 60,
            time_start: None,
            time_end: None,
            duration: 0.0,
            local_addresses: vec![],
        });
        report.bursts = vec![BurstSummary {
            id: 0,
            begin: 0.0,
            end: 0.0,
            packets: 1,
            payload: 0,
            category: BurstCategory::Unknown,
            replaced: None,
            long_gap: true,
            first_uplink_data: None,
            energy: 0.0,
            active_time: 0.0,
        }];

        let value = serde_json::to_value(&report).expect("report json");
        assert!(value.get("radio").is_none());
        assert!(value.get("periodicity").is_none());
        let capture = value.get("capture_summary").expect("capture_summary");
        assert!(capture.get("time_start").is_none());
        assert!(capture.get("time_end").is_none());

        let burst = &value["bursts"][0];
        assert_eq!(burst["category"], "unknown");
        assert!(burst.get("replaced").is_none());
        assert!(burst.get("first_uplink_data").is_none());
    }

    #[test]
    fn report_round_trips_through_json() {
        let mut report = make_stub_report("trace.pcap", 1);
        report.radio = Some(RadioSummary {
            family: RadioFamily::Lte,
            intervals: vec![RadioStateInterval {
                begin: 0.0,
                end: 4.0,
                state: RadioState::LteIdle,
            }],
            stats: RadioStats::default(),
        });
        let json = serde_json::to_string(&report).expect("serialize");
        let parsed: Report = serde_json::from_str(&json).expect("deserialize");
        let radio = parsed.radio.expect("radio");
        assert_eq!(radio.family, RadioFamily::Lte);
        assert_eq!(radio.intervals[0].state, RadioState::LteIdle);
    }
}
