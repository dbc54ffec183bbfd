//! Link-level errors.

use tether_core::WireError;

use crate::machine::ConnectionState;

/// Errors surfaced by the link state machine and its transport.
///
/// Under the default wait policy the protocol never reports a silent peer;
/// it simply keeps waiting. `LinkLost` only appears when a deadline is set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    #[error("link lost while {state}")]
    LinkLost { state: ConnectionState },

    #[error("cable closed")]
    CableClosed,

    #[error(transparent)]
    Wire(#[from] WireError),
}
