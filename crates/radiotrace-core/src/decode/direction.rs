use std::collections::{BTreeSet, HashMap, HashSet};
use std::net::IpAddr;

use crate::packet::{Direction, Transport};

use super::frame::Frame;

/// Maps source/destination addresses to a direction relative to the device.
#[derive(Debug, Clone, Default)]
pub struct DirectionResolver {
    local: HashSet<IpAddr>,
}

impl DirectionResolver {
    pub fn new(local: impl IntoIterator<Item = IpAddr>) -> Self {
        Self {
            local: local.into_iter().collect(),
        }
    }

    pub fn resolve(&self, src: IpAddr, dst: IpAddr) -> Direction {
        if self.local.contains(&src) {
            Direction::Uplink
        } else if self.local.contains(&dst) {
            Direction::Downlink
        } else {
            Direction::Unknown
        }
    }

    pub fn is_empty(&self) -> bool {
        self.local.is_empty()
    }

    /// Local addresses in sorted order.
    pub fn local_addresses(&self) -> Vec<IpAddr> {
        let mut addrs: Vec<IpAddr> = self.local.iter().copied().collect();
        addrs.sort();
        addrs
    }
}

#[derive(Debug, Default)]
struct Observed {
    peers: BTreeSet<IpAddr>,
    opened: usize,
    first_seen: usize,
}

/// Guesses the device address when none is configured.
///
/// The device is the address talking to the most distinct peers. Ties go to
/// the address that opened more TCP connections, then to private addresses,
/// then to the address seen first.
#[derive(Debug, Default)]
pub struct LocalAddressInference {
    observed: HashMap<IpAddr, Observed>,
    frames: usize,
}

impl LocalAddressInference {
    pub fn observe(&mut self, frame: &Frame<'_>) {
        let index = self.frames;
        self.frames += 1;
        let opens = matches!(
            frame.transport,
            Transport::Tcp(segment) if segment.flags.syn() && !segment.flags.ack()
        );
        for (addr, peer) in [(frame.src, frame.dst), (frame.dst, frame.src)] {
            let entry = self.observed.entry(addr).or_insert_with(|| Observed {
                first_seen: index,
                ..Observed::default()
            });
            entry.peers.insert(peer);
        }
        if opens {
            if let Some(entry) = self.observed.get_mut(&frame.src) {
                entry.opened += 1;
            }
        }
    }

    pub fn finish(self) -> DirectionResolver {
        let best = self
            .observed
            .into_iter()
            .max_by(|(a_addr, a), (b_addr, b)| {
                a.peers
                    .len()
                    .cmp(&b.peers.len())
                    .then_with(|| a.opened.cmp(&b.opened))
                    .then_with(|| is_private(a_addr).cmp(&is_private(b_addr)))
                    .then_with(|| b.first_seen.cmp(&a.first_seen))
            })
            .map(|(addr, _)| addr);
        DirectionResolver::new(best)
    }
}

fn is_private(addr: &IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => v4.is_private() || v4.is_link_local() || v4.is_loopback(),
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            (first & 0xfe00) == 0xfc00 || (first & 0xffc0) == 0xfe80 || v6.is_loopback()
        }
    }
}
