//! The router control loop.
//!
//! Single-threaded by design: one loop owns the table, the timers, and the
//! receive buffer, and the only blocking point is the HAL receive call.
//! Each iteration services the announcement timers first, then handles at
//! most one inbound frame.

use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use rand::{rng, Rng};
use tracing::{debug, info, trace, warn};

use crate::announce;
use crate::config::Config;
use crate::error::{Result, RouterError};
use crate::hal::{Hal, Recv, RIP_MCAST_ADDR};
use crate::table::{Route, RoutingTable, METRIC_INFINITY};
use crate::wire::rip::{Command, RipEntry, RipPacket};
use crate::wire::{ipv4, rip};

const RECV_BUF_LEN: usize = 2048;
const RECV_TIMEOUT_MS: u64 = 1000;

pub struct Router<H: Hal> {
    hal: H,
    local_addrs: Vec<Ipv4Addr>,
    table: RoutingTable,

    periodic_ms: u64,
    triggered_min_ms: u64,
    triggered_max_ms: u64,

    last_periodic: u64,
    last_triggered: u64,
    triggered_deadline: u64,
    triggered_pending: bool,

    buf: Vec<u8>,
}

impl<H: Hal> Router<H> {
    /// Build a router over `hal`, seeding one directly connected route per
    /// configured interface.
    pub fn new(hal: H, cfg: &Config) -> Result<Self> {
        let mut table = RoutingTable::new();
        let mut local_addrs = Vec::with_capacity(cfg.interfaces.len());
        for (if_index, iface) in cfg.interfaces.iter().enumerate() {
            let net = Ipv4Net::new(iface.addr, iface.prefix_len).map_err(|_| {
                RouterError::Config(format!(
                    "prefix length {} on {} is out of range",
                    iface.prefix_len, iface.addr
                ))
            })?;
            table.insert(Route { net: net.trunc(), if_index, nexthop: None, metric: 1 });
            local_addrs.push(iface.addr);
        }
        // Connected seeds are not triggered-update material.
        table.drain_changed();
        info!(
            interfaces = local_addrs.len(),
            periodic_secs = cfg.timers.periodic_secs,
            "router initialized with connected routes"
        );

        Ok(Router {
            hal,
            local_addrs,
            table,
            periodic_ms: cfg.timers.periodic_secs * 1000,
            triggered_min_ms: cfg.timers.triggered_min_ms,
            triggered_max_ms: cfg.timers.triggered_max_ms,
            last_periodic: 0,
            last_triggered: 0,
            triggered_deadline: 0,
            triggered_pending: false,
            buf: vec![0u8; RECV_BUF_LEN],
        })
    }

    pub fn table(&self) -> &RoutingTable {
        &self.table
    }

    pub fn hal(&self) -> &H {
        &self.hal
    }

    /// Run until the HAL reports end of input.
    ///
    /// A fresh router knows nothing beyond its own links, so it solicits
    /// every neighbor's table once before settling into the loop.
    pub fn run(&mut self) -> Result<()> {
        self.multicast_request();
        loop {
            self.service_timers();
            if !self.poll()? {
                info!("end of input, shutting down");
                return Ok(());
            }
        }
    }

    fn service_timers(&mut self) {
        let now = self.hal.ticks_ms();
        if now.saturating_sub(self.last_periodic) >= self.periodic_ms {
            let routes = self.table.routes();
            debug!(routes = routes.len(), "periodic announcement");
            self.multicast(&routes);
            self.last_periodic = now;
            self.triggered_pending = false;
            self.triggered_deadline = 0;
        } else if self.triggered_pending
            && now.saturating_sub(self.last_triggered) >= self.triggered_deadline
        {
            let changed = self.table.drain_changed();
            debug!(routes = changed.len(), "triggered update");
            self.multicast(&changed);
            for route in &changed {
                if route.metric == METRIC_INFINITY {
                    trace!(net = %route.net, "dropping poisoned route after advertising it");
                    self.table.remove(route.net);
                }
            }
            self.last_triggered = now;
            self.triggered_deadline =
                rng().random_range(self.triggered_min_ms..=self.triggered_max_ms);
            self.triggered_pending = false;
        }
    }

    /// One receive-and-handle step. Returns false when the HAL reached EOF.
    fn poll(&mut self) -> Result<bool> {
        let if_mask = u32::try_from((1u64 << self.local_addrs.len()) - 1).unwrap_or(u32::MAX);
        let recv = self.hal.recv(if_mask, &mut self.buf, RECV_TIMEOUT_MS)?;
        match recv {
            Recv::Eof => Ok(false),
            Recv::Timeout => Ok(true),
            Recv::Packet { len, if_index } => {
                if len > self.buf.len() {
                    debug!(len, if_index, "frame larger than the receive buffer, dropped");
                } else {
                    self.handle_frame(len, if_index);
                }
                Ok(true)
            }
        }
    }

    fn handle_frame(&mut self, len: usize, if_index: usize) {
        if len < ipv4::HEADER_LEN {
            trace!(len, "runt frame dropped");
            return;
        }
        if !ipv4::validate_checksum(&self.buf[..len]) {
            debug!(if_index, "invalid IP checksum, dropped");
            return;
        }
        let src = ipv4::src(&self.buf[..len]);
        let dst = ipv4::dst(&self.buf[..len]);

        let dst_is_me = dst == RIP_MCAST_ADDR || self.local_addrs.contains(&dst);
        if dst_is_me {
            match RipPacket::decode(&self.buf[..len]) {
                Ok(pkt) => match pkt.command {
                    Command::Request => {
                        // Whole-table reply straight back to the asker,
                        // no split horizon on request replies.
                        debug!(%src, if_index, "answering table request");
                        let routes = self.table.routes();
                        self.make_response(if_index, src, &routes);
                    }
                    Command::Response => self.import_response(&pkt, if_index, src),
                },
                Err(err) => debug!(%err, %src, if_index, "malformed rip packet, dropped"),
            }
        } else {
            self.forward(len, dst);
        }
    }

    /// Distance-vector import of one RESPONSE (RFC 2453 §3.9.2 flavor).
    fn import_response(&mut self, pkt: &RipPacket, if_index: usize, src: Ipv4Addr) {
        for entry in &pkt.entries {
            let new_metric = entry.metric.saturating_add(1).min(rip::METRIC_INFINITY) as u8;
            let Some(net) = entry_net(entry) else {
                continue;
            };
            match self.table.exact_match(net).copied() {
                None => {
                    // No point storing a route that was born unreachable.
                    if new_metric < METRIC_INFINITY {
                        trace!(net = %net, metric = new_metric, %src, "learned route");
                        self.table.insert(Route {
                            net,
                            if_index,
                            nexthop: Some(src),
                            metric: new_metric,
                        });
                        self.triggered_pending = true;
                    }
                }
                Some(existing) => {
                    let from_current_hop =
                        existing.nexthop == Some(src) && existing.metric != new_metric;
                    if from_current_hop || existing.metric > new_metric {
                        trace!(net = %net, metric = new_metric, %src, "route updated");
                        self.table.insert(Route {
                            net,
                            if_index,
                            nexthop: Some(src),
                            metric: new_metric,
                        });
                        self.triggered_pending = true;
                    }
                }
            }
        }
    }

    fn forward(&mut self, len: usize, dst: Ipv4Addr) {
        let Some(route) = self.table.best_match(dst).copied() else {
            // Active discovery beats silence: ask the neighbors, drop the
            // packet.
            debug!(%dst, "no route, soliciting neighbors");
            self.multicast_request();
            return;
        };
        let arp_target = route.nexthop.unwrap_or(dst);
        let Some(mac) = self.hal.arp_lookup(route.if_index, arp_target) else {
            debug!(%arp_target, if_index = route.if_index, "ARP miss, dropped");
            return;
        };
        let mut out = self.buf[..len].to_vec();
        if ipv4::decrement_ttl(&mut out) == 0 {
            trace!(%dst, "TTL expired, dropped");
            return;
        }
        if let Err(err) = self.hal.send(route.if_index, &out, mac) {
            warn!(%err, if_index = route.if_index, "forwarding send failed");
        }
    }

    /// Send `routes` to `dst` out of `if_index`, chunked to 25-entry
    /// packets. ARP misses and empty route lists produce nothing.
    fn make_response(&mut self, if_index: usize, dst: Ipv4Addr, routes: &[Route]) {
        if routes.is_empty() {
            return;
        }
        let Some(mac) = self.hal.arp_lookup(if_index, dst) else {
            trace!(%dst, if_index, "ARP miss on response target");
            return;
        };
        let src = self.local_addrs[if_index];
        for pkt in announce::response_packets(routes) {
            let frame = announce::build_datagram(src, dst, &pkt);
            if let Err(err) = self.hal.send(if_index, &frame, mac) {
                warn!(%err, if_index, "announcement send failed");
            }
        }
    }

    /// Multicast `routes` on every interface with split horizon: a route
    /// is never advertised back through the interface it was learned on.
    fn multicast(&mut self, routes: &[Route]) {
        for if_index in 0..self.local_addrs.len() {
            let filtered: Vec<Route> =
                routes.iter().filter(|r| r.if_index != if_index).copied().collect();
            self.make_response(if_index, RIP_MCAST_ADDR, &filtered);
        }
    }

    /// Multicast a whole-table REQUEST on every interface.
    fn multicast_request(&mut self) {
        let pkt = announce::whole_table_request();
        for if_index in 0..self.local_addrs.len() {
            let Some(mac) = self.hal.arp_lookup(if_index, RIP_MCAST_ADDR) else {
                continue;
            };
            let frame = announce::build_datagram(self.local_addrs[if_index], RIP_MCAST_ADDR, &pkt);
            if let Err(err) = self.hal.send(if_index, &frame, mac) {
                warn!(%err, if_index, "request send failed");
            }
        }
    }
}

fn entry_net(entry: &RipEntry) -> Option<Ipv4Net> {
    let len = rip::mask_len(entry.mask)?;
    Ipv4Net::new(entry.addr, len).ok().map(|net| net.trunc())
}
