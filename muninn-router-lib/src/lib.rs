#![forbid(unsafe_code)]

pub mod announce;
pub mod config;
pub mod error;
pub mod hal;
pub mod router;
pub mod table;
pub mod wire;

pub use config::{load_from_path, Config};
pub use error::{Result, RouterError};
pub use hal::{format_mac, parse_mac, Hal, HalError, MacAddr, Recv, RIP_MCAST_ADDR, RIP_MCAST_MAC};
pub use router::Router;
pub use table::{Route, RoutingTable, METRIC_INFINITY};
pub use wire::rip::{Command, DecodeError, RipEntry, RipPacket, MAX_RTES, RIP_PORT};
