use std::net::IpAddr;
use std::path::Path;

use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::info;

use crate::burst::{BurstAnalysis, CategoryStats, analyze_bursts, category_stats};
use crate::decode::{DecodedTrace, DirectionResolver, TraceDecoder};
use crate::events::{CpuSample, UserEvent};
use crate::packet::Packet;
use crate::periodicity::{PeriodicitySummary, detect_periodicity};
use crate::profile::{AnalysisParams, ProfileError, RadioProfile};
use crate::radio::{RadioStateInterval, RadioStats, label_packets, radio_stats, simulate};
use crate::session::{Session, build_sessions};
use crate::source::{PacketSource, PcapFileSource, SourceError};
use crate::{CaptureSummary, DEFAULT_GENERATED_AT, RadioSummary, Report, make_stub_report};

mod cancel;
mod summaries;

pub use cancel::CancelToken;

use summaries::{build_burst_summaries, build_session_summaries};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Source error: {0}")]
    Source(#[from] SourceError),
    #[error("invalid profile: {0}")]
    Profile(#[from] ProfileError),
    #[error("analysis cancelled")]
    Cancelled,
}

/// Inputs of one analysis run besides the packets themselves.
#[derive(Debug, Clone, Default)]
pub struct AnalysisOptions {
    pub profile: RadioProfile,
    pub params: AnalysisParams,
    /// Device addresses. Inferred from the capture when empty.
    pub local_addresses: Vec<IpAddr>,
    /// Trace duration in seconds. Defaults to the last packet's timestamp.
    pub duration: Option<f64>,
    pub user_events: Vec<UserEvent>,
    pub cpu_samples: Vec<CpuSample>,
    pub cancel: CancelToken,
}

/// Everything the pipeline derives from one trace.
#[derive(Debug, Clone)]
pub struct TraceAnalysis {
    /// Packets with their session, burst and radio state labels.
    pub packets: Vec<Packet>,
    pub sessions: Vec<Session>,
    pub duration: f64,
    pub intervals: Vec<RadioStateInterval>,
    pub radio: RadioStats,
    pub bursts: BurstAnalysis,
    pub categories: Vec<CategoryStats>,
    pub periodicity: PeriodicitySummary,
}

pub fn analyze_pcap_file(path: &Path, options: &AnalysisOptions) -> Result<Report, AnalysisError> {
    let source = PcapFileSource::open(path)?;
    analyze_source(path, source, options)
}

pub fn analyze_source<S: PacketSource>(
    path: &Path,
    mut source: S,
    options: &AnalysisOptions,
) -> Result<Report, AnalysisError> {
    let mut decoder = TraceDecoder::new();
    while let Some(event) = source.next_packet()? {
        options.cancel.check()?;
        decoder.push(&event);
    }
    let resolver = DirectionResolver::new(options.local_addresses.iter().copied());
    let decoded = decoder.finish(Some(resolver));
    info!(
        frames = decoded.frames_total,
        skipped = decoded.frames_skipped,
        packets = decoded.packets.len(),
        "capture decoded"
    );

    let mut report = make_stub_report(&path.display().to_string(), path.metadata()?.len());
    let capture = capture_summary(&decoded);
    let analysis = analyze_packets(decoded.packets, options)?;

    report.generated_at = capture
        .time_end
        .clone()
        .or(capture.time_start.clone())
        .unwrap_or_else(|| DEFAULT_GENERATED_AT.to_string());
    report.capture_summary = Some(CaptureSummary {
        duration: analysis.duration,
        ..capture
    });
    fill_report(&mut report, &analysis, &options.profile);
    Ok(report)
}

/// Run every stage over decoded packets: sessions, radio states, bursts and
/// periodicity.
pub fn analyze_packets(
    mut packets: Vec<Packet>,
    options: &AnalysisOptions,
) -> Result<TraceAnalysis, AnalysisError> {
    options.profile.validate()?;
    options.params.validate()?;
    let cancel = &options.cancel;

    let duration = options
        .duration
        .unwrap_or_else(|| packets.last().map_or(0.0, |packet| packet.timestamp))
        .max(0.0);

    let sessions = build_sessions(&mut packets, cancel)?;

    cancel.check()?;
    let intervals = simulate(&packets, &options.profile, duration);
    label_packets(&mut packets, &intervals);

    cancel.check()?;
    let mut bursts = analyze_bursts(
        &mut packets,
        &intervals,
        &options.profile,
        &options.params,
        &options.user_events,
        &options.cpu_samples,
    );
    let periodicity = detect_periodicity(
        &sessions,
        &packets,
        &mut bursts.bursts,
        &options.params,
        cancel,
    )?;
    let categories = category_stats(&bursts.bursts);

    let total_bytes = packets.iter().map(|packet| u64::from(packet.len)).sum();
    let radio = radio_stats(&intervals, &options.profile, &packets, total_bytes);

    Ok(TraceAnalysis {
        packets,
        sessions,
        duration,
        intervals,
        radio,
        bursts,
        categories,
        periodicity,
    })
}

/// Copy an analysis into a report.
pub fn fill_report(report: &mut Report, analysis: &TraceAnalysis, profile: &RadioProfile) {
    report.sessions = build_session_summaries(&analysis.sessions, &analysis.packets);
    report.radio = Some(RadioSummary {
        family: profile.family(),
        intervals: analysis.intervals.clone(),
        stats: analysis.radio.clone(),
    });
    report.bursts = build_burst_summaries(&analysis.bursts.bursts);
    report.burst_categories = analysis.categories.clone();
    report.periodicity = Some(analysis.periodicity.clone());
}

fn capture_summary(decoded: &DecodedTrace) -> CaptureSummary {
    let first = decoded.base_ts;
    let last = decoded
        .packets
        .last()
        .zip(decoded.base_ts)
        .map(|(packet, base)| base + packet.timestamp);
    CaptureSummary {
        packets_total: decoded.frames_total,
        packets_decoded: decoded.packets.len() as u64,
        packets_skipped: decoded.frames_skipped,
        bytes_total: decoded.captured_bytes,
        time_start: ts_to_rfc3339(first),
        time_end: ts_to_rfc3339(last),
        duration: 0.0,
        local_addresses: decoded
            .local_addresses
            .iter()
            .map(|addr| addr.to_string())
            .collect(),
    }
}

fn ts_to_rfc3339(ts: Option<f64>) -> Option<String> {
    let ts = ts?;
    let nanos = (ts * 1_000_000_000.0) as i128;
    OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .ok()
        .and_then(|dt| dt.format(&Rfc3339).ok())
}
