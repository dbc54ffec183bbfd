//! tether-link: the link-cable protocol.
//!
//! Two devices, each running a [`LinkStateMachine`], agree on who drives the
//! shared clock and then swap their names one byte per tick. The devices only
//! meet through a [`Transport`]; [`cable`] provides a simulated one built on
//! message passing.

pub mod cable;
pub mod error;
pub mod exchange;
pub mod machine;
pub mod name_exchange;
pub mod negotiator;
pub mod peripheral;
pub mod transport;

pub use cable::{Cable, CableConfig, CableHandle, LinkPort, PortId, SimFaults};
pub use error::LinkError;
pub use exchange::{ByteExchange, WaitPolicy};
pub use machine::{ConnectionState, LinkSession, LinkStateMachine};
pub use peripheral::{
    ConfirmButton, ConfirmHandle, ConfirmInput, Render, ScriptedConfirm, TracingRender,
};
pub use transport::{SerialRegisters, TickSource, Transport};
