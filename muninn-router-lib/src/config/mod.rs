mod loader;
mod root;

pub use loader::load_from_path;
pub use root::{Config, InterfaceConfig, NeighborConfig, TimerConfig};
