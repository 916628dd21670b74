//! Decoded packet records shared by every analysis stage.
//!
//! A `Packet` is built once by the decoder and afterwards only receives
//! labels (TCP classification, session, burst, radio state). Stages refer to
//! packets by `PacketId`, which is the packet's index in the trace.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::radio::RadioState;

/// Index of a packet within the decoded trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PacketId(pub usize);

/// Index of a session within the session list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub usize);

/// Index of a burst within the burst list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BurstId(pub usize);

/// Direction relative to the device that recorded the trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Uplink,
    Downlink,
    Unknown,
}

/// Raw TCP flag bits as they appear in the header.
///
/// # Examples
/// ```
/// use radiotrace_core::TcpFlags;
///
/// let flags = TcpFlags::new(TcpFlags::SYN | TcpFlags::ACK);
/// assert!(flags.syn() && flags.ack());
/// assert!(flags.is_control());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TcpFlags(u8);

impl TcpFlags {
    pub const FIN: u8 = 0x01;
    pub const SYN: u8 = 0x02;
    pub const RST: u8 = 0x04;
    pub const PSH: u8 = 0x08;
    pub const ACK: u8 = 0x10;

    pub fn new(bits: u8) -> Self {
        Self(bits)
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn fin(&self) -> bool {
        self.0 & Self::FIN != 0
    }

    pub fn syn(&self) -> bool {
        self.0 & Self::SYN != 0
    }

    pub fn rst(&self) -> bool {
        self.0 & Self::RST != 0
    }

    pub fn ack(&self) -> bool {
        self.0 & Self::ACK != 0
    }

    /// SYN, FIN or RST is set.
    pub fn is_control(&self) -> bool {
        self.syn() || self.fin() || self.rst()
    }
}

/// TCP header fields needed by reassembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpSegment {
    pub src_port: u16,
    pub dst_port: u16,
    pub seq: u32,
    pub ack: u32,
    pub flags: TcpFlags,
    pub window: u16,
}

/// Transport layer carried by a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Tcp(TcpSegment),
    Udp { src_port: u16, dst_port: u16 },
    /// Any other IP protocol, identified by its protocol number.
    Other(u8),
}

impl Transport {
    pub fn tcp(&self) -> Option<&TcpSegment> {
        match self {
            Transport::Tcp(segment) => Some(segment),
            _ => None,
        }
    }

    pub fn ports(&self) -> Option<(u16, u16)> {
        match *self {
            Transport::Tcp(segment) => Some((segment.src_port, segment.dst_port)),
            Transport::Udp { src_port, dst_port } => Some((src_port, dst_port)),
            Transport::Other(_) => None,
        }
    }
}

/// Per-packet TCP classification assigned during reassembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TcpInfo {
    Establish,
    Close,
    Reset,
    Data,
    DataDup,
    DataRecover,
    Ack,
    AckDup,
    AckRecover,
    KeepAlive,
    KeepAliveAck,
    WindowUpdate,
    ZeroWindow,
}

impl TcpInfo {
    /// Tags that describe connection management rather than application data.
    pub fn is_protocol_control(&self) -> bool {
        matches!(
            self,
            TcpInfo::Establish
                | TcpInfo::Close
                | TcpInfo::Reset
                | TcpInfo::Ack
                | TcpInfo::KeepAlive
                | TcpInfo::KeepAliveAck
                | TcpInfo::ZeroWindow
                | TcpInfo::WindowUpdate
        )
    }

    pub fn is_loss_or_dup(&self) -> bool {
        matches!(
            self,
            TcpInfo::DataDup | TcpInfo::DataRecover | TcpInfo::AckDup | TcpInfo::AckRecover
        )
    }
}

/// Labels attached to a packet by the analysis stages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PacketLabels {
    pub tcp_info: Option<TcpInfo>,
    pub session: Option<SessionId>,
    pub burst: Option<BurstId>,
    pub radio_state: Option<RadioState>,
}

/// One decoded packet of the trace.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub id: PacketId,
    /// Seconds since the first packet of the trace.
    pub timestamp: f64,
    pub direction: Direction,
    pub src: IpAddr,
    pub dst: IpAddr,
    /// IP datagram length as seen on the wire.
    pub len: u32,
    pub transport: Transport,
    pub payload: Vec<u8>,
    pub labels: PacketLabels,
}

impl Packet {
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    pub fn tcp(&self) -> Option<&TcpSegment> {
        self.transport.tcp()
    }

    pub fn is_udp(&self) -> bool {
        matches!(self.transport, Transport::Udp { .. })
    }

    /// Address of the far end, when the direction is known.
    pub fn remote_addr(&self) -> Option<IpAddr> {
        match self.direction {
            Direction::Uplink => Some(self.dst),
            Direction::Downlink => Some(self.src),
            Direction::Unknown => None,
        }
    }

    /// `(local port, remote port)`, when the direction is known.
    pub fn local_remote_ports(&self) -> Option<(u16, u16)> {
        let (src_port, dst_port) = self.transport.ports()?;
        match self.direction {
            Direction::Uplink => Some((src_port, dst_port)),
            Direction::Downlink => Some((dst_port, src_port)),
            Direction::Unknown => None,
        }
    }
}
