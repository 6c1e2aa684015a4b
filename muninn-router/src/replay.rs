//! Deterministic frame-replay HAL.
//!
//! The lab binary has no privileged network access, so the platform side is
//! a line-oriented script: frames come in on stdin, emitted frames go out
//! on stdout, the clock only moves when the script says so. ARP is a static
//! table from the configuration.
//!
//! Input directives, one per line (`#` starts a comment):
//!
//! ```text
//! tick <ms>           advance the clock; the receive call reports a timeout
//! recv <if> <hex>     deliver a raw IPv4 frame on interface <if>
//! ```
//!
//! Every transmitted frame is written as `send <if> <dst-mac> <hex>`.

use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::net::Ipv4Addr;

use muninn_router_lib::{
    format_mac, Config, Hal, HalError, MacAddr, Recv, RIP_MCAST_ADDR, RIP_MCAST_MAC,
};
use tracing::warn;

pub struct ReplayHal<R, W> {
    input: R,
    output: W,
    clock_ms: u64,
    arp: HashMap<(usize, Ipv4Addr), MacAddr>,
}

impl<R: BufRead, W: Write> ReplayHal<R, W> {
    pub fn new(input: R, output: W, cfg: &Config) -> Self {
        let mut arp = HashMap::new();
        for (if_index, iface) in cfg.interfaces.iter().enumerate() {
            for neighbor in &iface.neighbors {
                arp.insert((if_index, neighbor.ip), neighbor.mac);
            }
        }
        ReplayHal { input, output, clock_ms: 0, arp }
    }
}

impl<R: BufRead, W: Write> Hal for ReplayHal<R, W> {
    fn ticks_ms(&self) -> u64 {
        self.clock_ms
    }

    fn arp_lookup(&mut self, if_index: usize, addr: Ipv4Addr) -> Option<MacAddr> {
        if addr == RIP_MCAST_ADDR {
            return Some(RIP_MCAST_MAC);
        }
        self.arp.get(&(if_index, addr)).copied()
    }

    fn recv(&mut self, _if_mask: u32, buf: &mut [u8], timeout_ms: u64) -> Result<Recv, HalError> {
        loop {
            let mut line = String::new();
            let read = self.input.read_line(&mut line).map_err(|_| HalError { code: -1 })?;
            if read == 0 {
                return Ok(Recv::Eof);
            }
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.split_whitespace();
            match parts.next() {
                Some("tick") => {
                    let ms = parts.next().and_then(|v| v.parse().ok()).unwrap_or(timeout_ms);
                    self.clock_ms += ms;
                    return Ok(Recv::Timeout);
                }
                Some("recv") => {
                    let if_index = parts.next().and_then(|v| v.parse().ok());
                    let bytes = parts.next().and_then(decode_hex);
                    let (Some(if_index), Some(bytes)) = (if_index, bytes) else {
                        warn!(%line, "malformed recv directive, skipped");
                        continue;
                    };
                    let copied = bytes.len().min(buf.len());
                    buf[..copied].copy_from_slice(&bytes[..copied]);
                    // Report the platform-side length even when it exceeds
                    // the buffer; the router drops truncated frames.
                    return Ok(Recv::Packet { len: bytes.len(), if_index });
                }
                _ => warn!(%line, "unrecognized replay directive, skipped"),
            }
        }
    }

    fn send(&mut self, if_index: usize, frame: &[u8], dst_mac: MacAddr) -> Result<(), HalError> {
        writeln!(self.output, "send {if_index} {} {}", format_mac(dst_mac), encode_hex(frame))
            .map_err(|_| HalError { code: -2 })
    }
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
        .collect()
}

fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
