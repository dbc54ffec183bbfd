//! Link role negotiation.
//!
//! Runs once per tick while the device waits for local confirmation. The
//! first device to confirm takes the clock (Internal). A device that sees the
//! peer already broadcasting Internal concedes to External, even if its own
//! confirm fired on the same tick. There is no timeout: an idle peer just
//! means another tick of waiting.

use tether_core::wire::{ROLE_INTERNAL, ROLE_UNCONNECTED};
use tether_core::LinkRole;

use crate::peripheral::ConfirmInput;
use crate::transport::Transport;

/// Outcome of one negotiation tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Negotiation {
    /// Nothing decided, Unconnected re-broadcast.
    Waiting,
    /// Peer owns the clock.
    Conceded,
    /// Local confirm fired, this device owns the clock.
    Claimed,
}

impl Negotiation {
    pub fn role(self) -> Option<LinkRole> {
        match self {
            Negotiation::Waiting => None,
            Negotiation::Conceded => Some(LinkRole::External),
            Negotiation::Claimed => Some(LinkRole::Internal),
        }
    }
}

/// Sample the line and the confirm edge once and decide.
pub fn negotiate_tick<P, I>(port: &mut P, input: &mut I) -> Negotiation
where
    P: Transport,
    I: ConfirmInput,
{
    let received = port.poll_received();
    let confirmed = input.read_confirm_edge();

    if received == Some(ROLE_INTERNAL) {
        if confirmed {
            tracing::debug!("confirm fired but peer already owns the clock");
        }
        return Negotiation::Conceded;
    }

    if confirmed {
        port.send_byte(LinkRole::Internal, ROLE_INTERNAL);
        return Negotiation::Claimed;
    }

    port.send_byte(LinkRole::Unconnected, ROLE_UNCONNECTED);
    Negotiation::Waiting
}

/// An Internal device that hears the peer's Internal broadcast lost a clock
/// collision and must follow.
pub fn must_concede(role: LinkRole, received: u8) -> bool {
    role == LinkRole::Internal && received == ROLE_INTERNAL
}
