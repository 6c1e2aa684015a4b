//! Outbound RIP datagram construction.
//!
//! Pure byte-building only; ARP resolution and transmission stay in the
//! router so this half is testable without a HAL. Every datagram is
//! IPv4 (IHL 5, TTL 1) + UDP (520 -> 520, checksum 0, permitted by RFC 768)
//! + RIP, with the length fields and header checksum patched in last.

use std::net::Ipv4Addr;

use bytes::{BufMut, BytesMut};

use crate::table::Route;
use crate::wire::ipv4;
use crate::wire::rip::{Command, RipEntry, RipPacket, MAX_RTES, METRIC_INFINITY, RIP_PORT};

const UDP_HDR_LEN: usize = 8;

/// Chunk routes into RESPONSE packets of at most 25 entries each.
///
/// Directly connected routes advertise a zero next hop, which tells
/// listeners to route via the sender.
pub fn response_packets(routes: &[Route]) -> Vec<RipPacket> {
    routes
        .chunks(MAX_RTES)
        .map(|chunk| RipPacket {
            command: Command::Response,
            entries: chunk.iter().map(route_entry).collect(),
        })
        .collect()
}

fn route_entry(route: &Route) -> RipEntry {
    RipEntry {
        addr: route.net.addr(),
        mask: route.net.netmask(),
        nexthop: route.nexthop.unwrap_or(Ipv4Addr::UNSPECIFIED),
        metric: u32::from(route.metric),
    }
}

/// The whole-table solicitation from RFC 2453 §3.9.1: a single entry with
/// family 0 and metric 16, everything else zero.
pub fn whole_table_request() -> RipPacket {
    RipPacket {
        command: Command::Request,
        entries: vec![RipEntry {
            addr: Ipv4Addr::UNSPECIFIED,
            mask: Ipv4Addr::UNSPECIFIED,
            nexthop: Ipv4Addr::UNSPECIFIED,
            metric: METRIC_INFINITY,
        }],
    }
}

/// Build one complete IPv4+UDP+RIP frame from `src` to `dst`.
pub fn build_datagram(src: Ipv4Addr, dst: Ipv4Addr, rip: &RipPacket) -> BytesMut {
    let rip_len = rip.wire_len();
    let udp_len = UDP_HDR_LEN + rip_len;
    let total_len = ipv4::HEADER_LEN + udp_len;
    let mut buf = BytesMut::with_capacity(total_len);

    buf.put_u8(0x45); // version 4, IHL 5
    buf.put_u8(0); // TOS
    buf.put_u16(total_len as u16);
    buf.put_u16(0); // id
    buf.put_u16(0); // flags, fragment offset
    buf.put_u8(1); // TTL: listeners are always on-link
    buf.put_u8(ipv4::PROTO_UDP);
    buf.put_u16(0); // checksum, patched below
    buf.put_u32(src.into());
    buf.put_u32(dst.into());

    buf.put_u16(RIP_PORT);
    buf.put_u16(RIP_PORT);
    buf.put_u16(udp_len as u16);
    buf.put_u16(0); // UDP checksum unused

    rip.encode(&mut buf);

    let csum = ipv4::header_checksum(&buf);
    ipv4::store_checksum(&mut buf, csum);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::rip::RipPacket;
    use ipnet::Ipv4Net;

    fn route(prefix: &str, if_index: usize, metric: u8) -> Route {
        let net: Ipv4Net = prefix.parse().unwrap_or_else(|_| panic!("bad net: {prefix}"));
        Route { net, if_index, nexthop: None, metric }
    }

    #[test]
    fn chunks_respect_the_25_entry_cap() {
        let routes: Vec<Route> = (0..60u8).map(|i| route(&format!("10.{i}.0.0/16"), 0, 1)).collect();
        let packets = response_packets(&routes);
        assert_eq!(packets.len(), 3);
        assert_eq!(packets[0].entries.len(), 25);
        assert_eq!(packets[1].entries.len(), 25);
        assert_eq!(packets[2].entries.len(), 10);
        assert!(response_packets(&[]).is_empty());
    }

    #[test]
    fn datagram_is_valid_and_decodes_back() {
        let routes = [route("10.0.5.0/24", 2, 3)];
        let packets = response_packets(&routes);
        let frame = build_datagram(
            Ipv4Addr::new(10, 0, 2, 1),
            crate::hal::RIP_MCAST_ADDR,
            &packets[0],
        );

        assert_eq!(frame.len(), 52);
        assert!(ipv4::validate_checksum(&frame));
        assert_eq!(ipv4::ttl(&frame), 1);
        assert_eq!(ipv4::protocol(&frame), ipv4::PROTO_UDP);
        assert_eq!(ipv4::dst(&frame), Ipv4Addr::new(224, 0, 0, 9));

        let decoded = RipPacket::decode(&frame);
        assert_eq!(decoded, Ok(packets[0].clone()));
    }

    #[test]
    fn request_datagram_carries_the_infinity_probe() {
        let frame = build_datagram(
            Ipv4Addr::new(192, 168, 3, 2),
            crate::hal::RIP_MCAST_ADDR,
            &whole_table_request(),
        );
        let decoded = RipPacket::decode(&frame);
        let Ok(pkt) = decoded else {
            panic!("request frame failed to decode: {decoded:?}");
        };
        assert_eq!(pkt.command, Command::Request);
        assert_eq!(pkt.entries.len(), 1);
        assert_eq!(pkt.entries[0].metric, METRIC_INFINITY);
    }
}
