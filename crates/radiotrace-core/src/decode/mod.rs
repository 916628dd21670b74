//! Frame decoding and packet construction.
//!
//! Frames are decoded as they are read; directions are resolved once the whole
//! capture has been seen, because the device address may have to be inferred
//! from every conversation in the trace.

pub mod direction;
pub mod error;
pub mod frame;

use std::net::IpAddr;

use tracing::debug;

use crate::packet::{Packet, PacketId, PacketLabels, Transport};
use crate::source::PacketEvent;

pub use direction::{DirectionResolver, LocalAddressInference};
pub use frame::{Frame, decode_frame};

struct PendingPacket {
    ts: f64,
    src: IpAddr,
    dst: IpAddr,
    len: u32,
    transport: Transport,
    payload: Vec<u8>,
}

/// Output of the decoding stage.
#[derive(Debug, Clone, Default)]
pub struct DecodedTrace {
    /// Time-ordered packets with trace-relative timestamps.
    pub packets: Vec<Packet>,
    /// Absolute capture time of trace time zero.
    pub base_ts: Option<f64>,
    pub frames_total: u64,
    pub frames_skipped: u64,
    pub captured_bytes: u64,
    pub local_addresses: Vec<IpAddr>,
}

/// Accumulates capture frames into packets.
#[derive(Default)]
pub struct TraceDecoder {
    pending: Vec<PendingPacket>,
    inference: LocalAddressInference,
    last_ts: Option<f64>,
    frames_total: u64,
    frames_skipped: u64,
    captured_bytes: u64,
}

impl TraceDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one frame. Frames that are not IP or cannot be sliced are
    /// counted and skipped.
    pub fn push(&mut self, event: &PacketEvent) {
        self.frames_total += 1;
        self.captured_bytes += u64::from(event.orig_len);
        let ts = event.ts.or(self.last_ts).unwrap_or(0.0);
        self.last_ts = Some(ts);

        let frame = match decode_frame(event.linktype, &event.data) {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                self.frames_skipped += 1;
                return;
            }
            Err(err) => {
                debug!(frame = self.frames_total, error = %err, "skipping undecodable frame");
                self.frames_skipped += 1;
                return;
            }
        };
        self.inference.observe(&frame);
        self.pending.push(PendingPacket {
            ts,
            src: frame.src,
            dst: frame.dst,
            len: frame.ip_len,
            transport: frame.transport,
            payload: frame.payload.to_vec(),
        });
    }

    /// Resolve directions and rebase timestamps. With no configured resolver
    /// the device address is inferred from the decoded frames.
    pub fn finish(self, resolver: Option<DirectionResolver>) -> DecodedTrace {
        let resolver = match resolver {
            Some(resolver) if !resolver.is_empty() => resolver,
            _ => self.inference.finish(),
        };
        let mut pending = self.pending;
        pending.sort_by(|a, b| a.ts.total_cmp(&b.ts));
        let base_ts = pending.first().map(|p| p.ts);
        let base = base_ts.unwrap_or(0.0);

        let packets = pending
            .into_iter()
            .enumerate()
            .map(|(index, p)| Packet {
                id: PacketId(index),
                timestamp: p.ts - base,
                direction: resolver.resolve(p.src, p.dst),
                src: p.src,
                dst: p.dst,
                len: p.len,
                transport: p.transport,
                payload: p.payload,
                labels: PacketLabels::default(),
            })
            .collect();

        DecodedTrace {
            packets,
            base_ts,
            frames_total: self.frames_total,
            frames_skipped: self.frames_skipped,
            captured_bytes: self.captured_bytes,
            local_addresses: resolver.local_addresses(),
        }
    }
}
