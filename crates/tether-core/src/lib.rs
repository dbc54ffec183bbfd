//! tether-core: shared register types, wire constants, and configuration.
//! All other Tether crates depend on this one.

pub mod config;
pub mod name;
pub mod wire;

pub use config::TetherConfig;
pub use name::{NameBuffer, PeerNameRecord};
pub use wire::{ControlWord, LinkRole, WireError};
