use std::fs::File;
use std::path::Path;

use pcap_parser::{
    Block, LegacyPcapReader, Linktype, PcapBlockOwned, PcapError, PcapNGReader,
    traits::PcapReaderIterator,
};

use crate::source::{PacketEvent, PacketSource, SourceError};

use super::error::CaptureError;
use super::layout;
use super::reader::{
    CaptureFormat, Interface, capture_format, interface_for, legacy_timestamp,
    read_magic_and_rewind,
};

/// Packet source backed by a `.pcap` or `.pcapng` file.
pub struct PcapFileSource {
    inner: CaptureReader,
}

enum CaptureReader {
    Legacy {
        reader: LegacyPcapReader<File>,
        linktype: Option<Linktype>,
        nanos: bool,
    },
    Ng {
        reader: PcapNGReader<File>,
        interfaces: Vec<Interface>,
    },
}

impl PcapFileSource {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let file = File::open(path)?;
        let inner = open_reader(file)?;
        Ok(Self { inner })
    }
}

impl PacketSource for PcapFileSource {
    fn next_packet(&mut self) -> Result<Option<PacketEvent>, SourceError> {
        match &mut self.inner {
            CaptureReader::Legacy {
                reader,
                linktype,
                nanos,
            } => next_legacy(reader, linktype, *nanos),
            CaptureReader::Ng { reader, interfaces } => next_ng(reader, interfaces),
        }
        .map_err(SourceError::from)
    }
}

fn open_reader(mut file: File) -> Result<CaptureReader, CaptureError> {
    let magic = read_magic_and_rewind(&mut file)?;
    match capture_format(magic)? {
        CaptureFormat::Pcapng => {
            let reader = PcapNGReader::new(layout::PCAP_READER_BUFFER_SIZE, file)
                .map_err(malformed("opening pcapng"))?;
            Ok(CaptureReader::Ng {
                reader,
                interfaces: Vec::new(),
            })
        }
        CaptureFormat::Pcap { nanos } => {
            let reader = LegacyPcapReader::new(layout::PCAP_READER_BUFFER_SIZE, file)
                .map_err(malformed("opening pcap"))?;
            Ok(CaptureReader::Legacy {
                reader,
                linktype: None,
                nanos,
            })
        }
    }
}

fn malformed<E: std::fmt::Display>(stage: &'static str) -> impl Fn(E) -> CaptureError {
    move |err| CaptureError::Malformed {
        stage,
        detail: err.to_string(),
    }
}

fn next_legacy(
    reader: &mut LegacyPcapReader<File>,
    linktype: &mut Option<Linktype>,
    nanos: bool,
) -> Result<Option<PacketEvent>, CaptureError> {
    loop {
        match reader.next() {
            Ok((offset, block)) => {
                let event = match block {
                    PcapBlockOwned::LegacyHeader(header) => {
                        *linktype = Some(header.network);
                        None
                    }
                    PcapBlockOwned::Legacy(packet) => Some(PacketEvent {
                        ts: Some(legacy_timestamp(packet.ts_sec, packet.ts_usec, nanos)),
                        linktype: linktype.unwrap_or(Linktype::ETHERNET),
                        orig_len: packet.origlen,
                        data: packet.data.to_vec(),
                    }),
                    _ => None,
                };
                reader.consume(offset);
                if event.is_some() {
                    return Ok(event);
                }
            }
            Err(PcapError::Eof) => return Ok(None),
            Err(PcapError::Incomplete(_)) => {
                reader.refill().map_err(malformed("refilling pcap buffer"))?;
            }
            Err(err) => return Err(malformed("reading pcap record")(err)),
        }
    }
}

fn next_ng(
    reader: &mut PcapNGReader<File>,
    interfaces: &mut Vec<Interface>,
) -> Result<Option<PacketEvent>, CaptureError> {
    loop {
        match reader.next() {
            Ok((offset, block)) => {
                let event = match block {
                    PcapBlockOwned::NG(Block::SectionHeader(_)) => {
                        // Interface ids restart with every section.
                        interfaces.clear();
                        None
                    }
                    PcapBlockOwned::NG(Block::InterfaceDescription(intf)) => {
                        interfaces.push(Interface::new(
                            intf.linktype,
                            intf.if_tsresol,
                            intf.if_tsoffset,
                        ));
                        None
                    }
                    PcapBlockOwned::NG(Block::EnhancedPacket(packet)) => {
                        let interface = interface_for(interfaces, packet.if_id);
                        Some(PacketEvent {
                            ts: Some(interface.timestamp(packet.ts_high, packet.ts_low)),
                            linktype: interface.linktype,
                            orig_len: packet.origlen,
                            data: packet.data.to_vec(),
                        })
                    }
                    // Simple packets carry no timestamp and always belong to
                    // the first interface.
                    PcapBlockOwned::NG(Block::SimplePacket(packet)) => Some(PacketEvent {
                        ts: None,
                        linktype: interface_for(interfaces, 0).linktype,
                        orig_len: packet.origlen,
                        data: packet.data.to_vec(),
                    }),
                    _ => None,
                };
                reader.consume(offset);
                if event.is_some() {
                    return Ok(event);
                }
            }
            Err(PcapError::Eof) => return Ok(None),
            Err(PcapError::Incomplete(_)) => {
                reader.refill().map_err(malformed("refilling pcapng buffer"))?;
            }
            Err(err) => return Err(malformed("reading pcapng block")(err)),
        }
    }
}
