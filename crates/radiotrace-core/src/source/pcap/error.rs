//! Failures while opening or walking a capture file.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("cannot read capture: {0}")]
    Read(#[from] std::io::Error),
    #[error("not a pcap or pcapng file (magic {magic:02x?})")]
    UnknownFormat { magic: [u8; 4] },
    /// pcap-parser rejected a block; `stage` names the reader step.
    #[error("malformed capture during {stage}: {detail}")]
    Malformed { stage: &'static str, detail: String },
}
