//! Byte exchange primitive.
//!
//! `send_byte` stages, `poll_received` consumes, neither blocks. The only
//! blocking operation is [`ByteExchange::next_byte`], an explicit
//! tick-by-tick polling loop that the wait policy may bound.

use std::time::Duration;

use tokio::time::Instant;

use tether_core::LinkRole;

use crate::error::LinkError;
use crate::machine::ConnectionState;
use crate::transport::{TickSource, Transport};

/// How long a post-negotiation wait may last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitPolicy {
    /// Wait until the peer answers, however long that takes.
    #[default]
    Indefinite,
    /// Give up after this long and report `LinkLost`.
    Deadline(Duration),
}

impl WaitPolicy {
    pub fn from_timeout(timeout: Option<Duration>) -> Self {
        match timeout {
            Some(d) => WaitPolicy::Deadline(d),
            None => WaitPolicy::Indefinite,
        }
    }

    /// Absolute deadline for a wait starting now.
    pub fn deadline(&self) -> Option<Instant> {
        match self {
            WaitPolicy::Indefinite => None,
            WaitPolicy::Deadline(d) => Some(Instant::now() + *d),
        }
    }
}

/// One-byte round trips over a transport, from the point of view of `role`.
pub struct ByteExchange<'a, P> {
    port: &'a mut P,
    role: LinkRole,
    policy: WaitPolicy,
}

impl<'a, P> ByteExchange<'a, P>
where
    P: Transport + TickSource + Send,
{
    pub fn new(port: &'a mut P, role: LinkRole, policy: WaitPolicy) -> Self {
        Self {
            port,
            role,
            policy,
        }
    }

    pub fn role(&self) -> LinkRole {
        self.role
    }

    pub fn send_byte(&mut self, value: u8) {
        self.port.send_byte(self.role, value);
    }

    pub fn poll_received(&mut self) -> Option<u8> {
        self.port.poll_received()
    }

    /// Wait a tick, then keep polling once per tick until a byte arrives.
    ///
    /// Only used once both sides are linked, so an expired deadline is
    /// reported against `Transferring`.
    pub async fn next_byte(&mut self) -> Result<u8, LinkError> {
        let state = ConnectionState::Transferring;
        match self.policy.deadline() {
            None => self.poll_loop().await,
            Some(deadline) => tokio::time::timeout_at(deadline, self.poll_loop())
                .await
                .map_err(|_| LinkError::LinkLost { state })?,
        }
    }

    async fn poll_loop(&mut self) -> Result<u8, LinkError> {
        loop {
            self.port.wait_for_tick().await?;
            if let Some(byte) = self.port.poll_received() {
                return Ok(byte);
            }
        }
    }
}
