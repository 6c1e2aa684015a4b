//! RIPv2 message codec (RFC 2453) embedded in UDP/IPv4.
//!
//! The packet format is:
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +---------------+---------------+-------------------------------+
//! |  command (1)  |  version (1)  |       must be zero (2)        |
//! +---------------+---------------+-------------------------------+
//! | Address Family Identifier (2) |        Route Tag (2)          |
//! +-------------------------------+-------------------------------+
//! |                         IP Address (4)                        |
//! +---------------------------------------------------------------+
//! |                         Subnet Mask (4)                       |
//! +---------------------------------------------------------------+
//! |                         Next Hop (4)                          |
//! +---------------------------------------------------------------+
//! |                         Metric (4)                            |
//! +---------------------------------------------------------------+
//! ```
//!
//! `decode` takes the whole IPv4 frame (IHL honored) and performs every
//! structural check; a packet that fails any of them is dropped by the
//! caller. `encode` writes only the RIP region; the surrounding IPv4+UDP
//! headers are built by `announce`.

use std::net::Ipv4Addr;

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

use crate::wire::ipv4;

/// RIP speaks from and to UDP port 520.
pub const RIP_PORT: u16 = 520;

/// Hard per-packet entry cap from RFC 2453.
pub const MAX_RTES: usize = 25;

/// Metric value meaning unreachable.
pub const METRIC_INFINITY: u32 = 16;

pub const VERSION: u8 = 2;

const HDR_LEN: usize = 4;
const RTE_LEN: usize = 20;
const UDP_HDR_LEN: usize = 8;

const AF_UNSPEC: u16 = 0;
const AF_INET: u16 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Request = 1,
    Response = 2,
}

impl Command {
    fn from_u8(value: u8) -> Option<Command> {
        match value {
            1 => Some(Command::Request),
            2 => Some(Command::Response),
            _ => None,
        }
    }

    /// Address family every entry must carry for this command.
    fn family(self) -> u16 {
        match self {
            Command::Request => AF_UNSPEC,
            Command::Response => AF_INET,
        }
    }
}

/// One 20-byte route entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RipEntry {
    pub addr: Ipv4Addr,
    pub mask: Ipv4Addr,
    pub nexthop: Ipv4Addr,
    /// Host-order metric, 1..=16 for any decoded entry.
    pub metric: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RipPacket {
    pub command: Command,
    pub entries: Vec<RipEntry>,
}

/// Why a frame was rejected. Logged at debug, then the frame is dropped;
/// nothing is ever reported back to the sender.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("frame shorter than the headers claim")]
    Truncated,
    #[error("not a UDP datagram (protocol {0})")]
    NotUdp(u8),
    #[error("UDP length below the 8-byte header")]
    UdpLength,
    #[error("UDP source port {0} is not 520")]
    SourcePort(u16),
    #[error("RIP region shorter than the 4-byte header")]
    RipHeader,
    #[error("unknown RIP command {0}")]
    BadCommand(u8),
    #[error("unsupported RIP version {0}")]
    BadVersion(u8),
    #[error("reserved header bytes are non-zero")]
    Reserved,
    #[error("RIP body of {0} bytes is not a whole number of entries")]
    BodyLength(usize),
    #[error("{0} entries exceed the 25-entry cap")]
    TooManyEntries(usize),
    #[error("address family {family} is invalid for command {command}")]
    BadFamily { command: u8, family: u16 },
    #[error("non-zero route tag {0}")]
    RouteTag(u16),
    #[error("metric {0} outside 1..=16")]
    BadMetric(u32),
    #[error("subnet mask {0} is not a contiguous prefix")]
    BadMask(Ipv4Addr),
}

impl RipPacket {
    /// Parse a RIP message out of a raw IPv4 frame.
    pub fn decode(frame: &[u8]) -> Result<RipPacket, DecodeError> {
        if frame.len() < ipv4::HEADER_LEN {
            return Err(DecodeError::Truncated);
        }
        let hdr = ipv4::header_len(frame);
        if hdr < ipv4::HEADER_LEN || usize::from(ipv4::total_len(frame)) > frame.len() {
            return Err(DecodeError::Truncated);
        }
        if ipv4::protocol(frame) != ipv4::PROTO_UDP {
            return Err(DecodeError::NotUdp(ipv4::protocol(frame)));
        }
        if frame.len() < hdr + UDP_HDR_LEN {
            return Err(DecodeError::Truncated);
        }

        let udp = &frame[hdr..];
        let src_port = u16::from_be_bytes([udp[0], udp[1]]);
        let udp_len = usize::from(u16::from_be_bytes([udp[4], udp[5]]));
        if udp_len < UDP_HDR_LEN {
            return Err(DecodeError::UdpLength);
        }
        if udp.len() < udp_len {
            return Err(DecodeError::Truncated);
        }
        if src_port != RIP_PORT {
            return Err(DecodeError::SourcePort(src_port));
        }

        let mut body = &udp[UDP_HDR_LEN..udp_len];
        if body.len() < HDR_LEN {
            return Err(DecodeError::RipHeader);
        }
        let command_raw = body.get_u8();
        let command = Command::from_u8(command_raw).ok_or(DecodeError::BadCommand(command_raw))?;
        let version = body.get_u8();
        if version != VERSION {
            return Err(DecodeError::BadVersion(version));
        }
        if body.get_u16() != 0 {
            return Err(DecodeError::Reserved);
        }

        if body.remaining() % RTE_LEN != 0 {
            return Err(DecodeError::BodyLength(body.remaining()));
        }
        let count = body.remaining() / RTE_LEN;
        if count > MAX_RTES {
            return Err(DecodeError::TooManyEntries(count));
        }

        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            let family = body.get_u16();
            if family != command.family() {
                return Err(DecodeError::BadFamily { command: command as u8, family });
            }
            let tag = body.get_u16();
            if tag != 0 {
                return Err(DecodeError::RouteTag(tag));
            }
            let addr = Ipv4Addr::from(body.get_u32());
            let mask = Ipv4Addr::from(body.get_u32());
            if mask_len(mask).is_none() {
                return Err(DecodeError::BadMask(mask));
            }
            let nexthop = Ipv4Addr::from(body.get_u32());
            let metric = body.get_u32();
            if !(1..=METRIC_INFINITY).contains(&metric) {
                return Err(DecodeError::BadMetric(metric));
            }
            entries.push(RipEntry { addr, mask, nexthop, metric });
        }

        Ok(RipPacket { command, entries })
    }

    /// Append the RIP region (header + entries) to `buf`.
    ///
    /// Returns the number of bytes written, `4 + 20 * entries`. The caller
    /// guarantees the entry count is within [`MAX_RTES`].
    pub fn encode(&self, buf: &mut BytesMut) -> usize {
        let start = buf.len();
        buf.put_u8(self.command as u8);
        buf.put_u8(VERSION);
        buf.put_u16(0);
        for entry in &self.entries {
            buf.put_u16(self.command.family());
            buf.put_u16(0);
            buf.put_u32(entry.addr.into());
            buf.put_u32(entry.mask.into());
            buf.put_u32(entry.nexthop.into());
            buf.put_u32(entry.metric);
        }
        buf.len() - start
    }

    /// Encoded size of the RIP region.
    pub fn wire_len(&self) -> usize {
        HDR_LEN + RTE_LEN * self.entries.len()
    }
}

/// Prefix length of a contiguous netmask, `None` when the mask has holes.
pub fn mask_len(mask: Ipv4Addr) -> Option<u8> {
    let bits = u32::from(mask);
    let ones = bits.leading_ones() as u8;
    (bits == mask_bits(ones)).then_some(ones)
}

/// Canonical contiguous netmask for a prefix length (0..=32).
pub fn prefix_mask(len: u8) -> Ipv4Addr {
    Ipv4Addr::from(mask_bits(len))
}

fn mask_bits(len: u8) -> u32 {
    match len {
        0 => 0,
        1..=31 => u32::MAX << (32 - len),
        _ => u32::MAX,
    }
}
