use std::io::{Read, Seek, SeekFrom};

use super::error::CaptureError;
use super::layout;
use pcap_parser::Linktype;

/// Container format identified from the first four bytes of a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureFormat {
    Pcapng,
    /// Classic pcap; `nanos` when the fractional field counts nanoseconds.
    Pcap { nanos: bool },
}

/// Read the magic bytes and rewind the reader to the start.
///
/// # Errors
/// Returns `CaptureError::Read` when fewer than four bytes can be read or
/// the reader cannot seek back.
pub fn read_magic_and_rewind<R: Read + Seek>(reader: &mut R) -> Result<[u8; 4], CaptureError> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    reader.seek(SeekFrom::Start(0))?;
    Ok(magic)
}

/// Identify the capture format, in either byte order for classic pcap.
///
/// # Examples
/// Internal helper; shown as text.
/// ```text
/// let format = capture_format([0x4d, 0x3c, 0xb2, 0xa1])?;
/// assert_eq!(format, CaptureFormat::Pcap { nanos: true });
/// ```
pub fn capture_format(magic: [u8; 4]) -> Result<CaptureFormat, CaptureError> {
    if magic == layout::PCAPNG_MAGIC {
        return Ok(CaptureFormat::Pcapng);
    }
    let le = u32::from_le_bytes(magic);
    let be = u32::from_be_bytes(magic);
    if le == layout::PCAP_MAGIC_MICROS || be == layout::PCAP_MAGIC_MICROS {
        Ok(CaptureFormat::Pcap { nanos: false })
    } else if le == layout::PCAP_MAGIC_NANOS || be == layout::PCAP_MAGIC_NANOS {
        Ok(CaptureFormat::Pcap { nanos: true })
    } else {
        Err(CaptureError::UnknownFormat { magic })
    }
}

/// Timestamp of a classic pcap record.
pub fn legacy_timestamp(ts_sec: u32, ts_frac: u32, nanos: bool) -> f64 {
    let unit = if nanos { 1e-9 } else { 1e-6 };
    ts_sec as f64 + ts_frac as f64 * unit
}

/// Seconds per tick for a PCAPNG `if_tsresol` value. The high bit selects a
/// negative power of two, otherwise a negative power of ten.
pub fn tick_for_resolution(tsresol: u8) -> f64 {
    let exponent = i32::from(tsresol & 0x7f);
    if tsresol & 0x80 != 0 {
        2f64.powi(-exponent)
    } else {
        10f64.powi(-exponent)
    }
}

/// Link type and clock of one PCAPNG interface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interface {
    pub linktype: Linktype,
    /// Seconds per timestamp tick.
    pub tick: f64,
    /// Seconds added to every timestamp (`if_tsoffset`).
    pub offset: f64,
}

impl Default for Interface {
    fn default() -> Self {
        Self {
            linktype: Linktype::ETHERNET,
            tick: layout::DEFAULT_TICK,
            offset: 0.0,
        }
    }
}

impl Interface {
    pub fn new(linktype: Linktype, tsresol: u8, tsoffset: i64) -> Self {
        Self {
            linktype,
            tick: tick_for_resolution(tsresol),
            offset: tsoffset as f64,
        }
    }

    /// Convert a split 64-bit PCAPNG timestamp to seconds.
    pub fn timestamp(&self, ts_high: u32, ts_low: u32) -> f64 {
        let ticks = (u64::from(ts_high) << 32) | u64::from(ts_low);
        ticks as f64 * self.tick + self.offset
    }
}

/// Interface for a packet's interface id. Unknown ids fall back to Ethernet
/// with microsecond timestamps.
pub fn interface_for(interfaces: &[Interface], if_id: u32) -> Interface {
    interfaces
        .get(if_id as usize)
        .copied()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::{
        CaptureFormat, Interface, capture_format, interface_for, legacy_timestamp,
        read_magic_and_rewind, tick_for_resolution,
    };
    use crate::source::pcap::error::CaptureError;
    use pcap_parser::Linktype;
    use std::io::{Cursor, Read};

    #[test]
    fn formats_are_detected_in_both_byte_orders() {
        assert_eq!(
            capture_format([0x0a, 0x0d, 0x0d, 0x0a]).unwrap(),
            CaptureFormat::Pcapng
        );
        assert_eq!(
            capture_format([0xd4, 0xc3, 0xb2, 0xa1]).unwrap(),
            CaptureFormat::Pcap { nanos: false }
        );
        assert_eq!(
            capture_format([0xa1, 0xb2, 0xc3, 0xd4]).unwrap(),
            CaptureFormat::Pcap { nanos: false }
        );
        assert_eq!(
            capture_format([0x4d, 0x3c, 0xb2, 0xa1]).unwrap(),
            CaptureFormat::Pcap { nanos: true }
        );
        assert!(matches!(
            capture_format(*b"GET "),
            Err(CaptureError::UnknownFormat { .. })
        ));
    }

    #[test]
    fn read_magic_rewinds() {
        let mut cursor = Cursor::new([0x0a, 0x0d, 0x0d, 0x0a, 0x01]);
        assert_eq!(
            read_magic_and_rewind(&mut cursor).unwrap(),
            [0x0a, 0x0d, 0x0d, 0x0a]
        );
        let mut first = [0u8; 1];
        cursor.read_exact(&mut first).unwrap();
        assert_eq!(first[0], 0x0a);

        let mut short = Cursor::new([0x0a, 0x0d]);
        assert!(matches!(
            read_magic_and_rewind(&mut short),
            Err(CaptureError::Read(_))
        ));
    }

    #[test]
    fn resolutions_cover_decimal_and_binary() {
        assert!((tick_for_resolution(6) - 1e-6).abs() < 1e-18);
        assert!((tick_for_resolution(9) - 1e-9).abs() < 1e-21);
        assert!((tick_for_resolution(0x80 | 10) - 1.0 / 1024.0).abs() < 1e-15);
    }

    #[test]
    fn interface_clock_applies_resolution_and_offset() {
        let nanos = Interface::new(Linktype::RAW, 9, 100);
        assert!((nanos.timestamp(0, 1_500_000_000) - 101.5).abs() < 1e-9);

        let fallback = interface_for(&[nanos], 3);
        assert_eq!(fallback.linktype, Linktype::ETHERNET);
        assert!((fallback.timestamp(0, 2_000_000) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn legacy_fraction_follows_precision() {
        assert!((legacy_timestamp(10, 500_000, false) - 10.5).abs() < 1e-9);
        assert!((legacy_timestamp(10, 500_000_000, true) - 10.5).abs() < 1e-9);
    }
}
