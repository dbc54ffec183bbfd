//! Link state machine.
//!
//! One machine runs per device. Each tick it decides, renders the resulting
//! state, and waits for the boundary:
//!
//!   AwaitingLocalConfirm ─ role chosen ─▶ AwaitingRemote ─ peer heard ─▶
//!   Transferring ─ names swapped ─▶ Done
//!
//! The only coupling between the two machines is the byte each one finds
//! latched in its port after a tick boundary.

use std::fmt;

use bytes::Bytes;
use tokio::time::Instant;

use tether_core::wire::ROLE_CONNECTED;
use tether_core::{LinkRole, NameBuffer, PeerNameRecord};

use crate::error::LinkError;
use crate::exchange::{ByteExchange, WaitPolicy};
use crate::name_exchange::exchange_names;
use crate::negotiator::{must_concede, negotiate_tick};
use crate::peripheral::{ConfirmInput, Render};
use crate::transport::{TickSource, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    AwaitingLocalConfirm,
    AwaitingRemote,
    Transferring,
    Done,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::AwaitingLocalConfirm => "awaiting local confirm",
            ConnectionState::AwaitingRemote => "awaiting remote",
            ConnectionState::Transferring => "transferring",
            ConnectionState::Done => "done",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a finished session leaves behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSession {
    pub role: LinkRole,
    /// Length byte as the peer declared it, before clamping.
    pub peer_declared: u8,
    pub peer_name: Bytes,
    /// Ticks spent from the start of the session until Done.
    pub ticks: u64,
}

pub struct LinkStateMachine<P, I, R> {
    device: String,
    port: P,
    input: I,
    render: R,
    name: NameBuffer,
    policy: WaitPolicy,
    state: ConnectionState,
    role: LinkRole,
    peer: PeerNameRecord,
    peer_declared: u8,
    ticks: u64,
}

impl<P, I, R> LinkStateMachine<P, I, R>
where
    P: Transport + TickSource + Send,
    I: ConfirmInput + Send,
    R: Render + Send,
{
    pub fn new(device: impl Into<String>, port: P, input: I, render: R, name: NameBuffer) -> Self {
        Self {
            device: device.into(),
            port,
            input,
            render,
            name,
            policy: WaitPolicy::Indefinite,
            state: ConnectionState::AwaitingLocalConfirm,
            role: LinkRole::Unconnected,
            peer: PeerNameRecord::default(),
            peer_declared: 0,
            ticks: 0,
        }
    }

    /// Bound post-negotiation waits. Negotiation itself always waits forever.
    pub fn with_policy(mut self, policy: WaitPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn role(&self) -> LinkRole {
        self.role
    }

    pub fn peer_name(&self) -> &[u8] {
        self.peer.as_bytes()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn renderer(&self) -> &R {
        &self.render
    }

    /// Back to AwaitingLocalConfirm for a fresh session.
    pub fn reset(&mut self) {
        tracing::debug!(device = %self.device, from = %self.state, "session reset");
        self.state = ConnectionState::AwaitingLocalConfirm;
        self.role = LinkRole::Unconnected;
        self.peer.clear();
        self.peer_declared = 0;
        self.ticks = 0;
    }

    /// Drive the machine until Done.
    ///
    /// Under `WaitPolicy::Indefinite` this only returns an error if the
    /// transport itself goes away. On error the port is parked so the peer
    /// keeps ticking; calling `run` again resumes from the failed state.
    pub async fn run(&mut self) -> Result<LinkSession, LinkError> {
        let result = self.drive().await;
        if let Err(e) = &result {
            tracing::warn!(device = %self.device, state = %self.state, error = %e, "link failed");
            self.port.park();
        }
        result
    }

    async fn drive(&mut self) -> Result<LinkSession, LinkError> {
        // A resumed AwaitingRemote gets a fresh deadline.
        let mut remote_deadline = match self.state {
            ConnectionState::AwaitingRemote => self.policy.deadline(),
            _ => None,
        };

        loop {
            match self.state {
                ConnectionState::AwaitingLocalConfirm => {
                    if let Some(role) = negotiate_tick(&mut self.port, &mut self.input).role() {
                        self.role = role;
                        self.announce();
                        self.transition(ConnectionState::AwaitingRemote);
                        tracing::info!(device = %self.device, %role, "role assigned");
                        remote_deadline = self.policy.deadline();
                    }
                }
                ConnectionState::AwaitingRemote => {
                    if self.await_remote() {
                        // The exchange starts in the same tick both sides saw each other.
                        continue;
                    }
                }
                ConnectionState::Transferring => {
                    self.transfer().await?;
                    continue;
                }
                ConnectionState::Done => return Ok(self.session()),
            }

            let deadline = match self.state {
                ConnectionState::AwaitingRemote => remote_deadline,
                _ => None,
            };
            self.tick(deadline).await?;
        }
    }

    /// Stage (and for Internal, clock) this device's role byte.
    fn announce(&mut self) {
        self.port.send_byte(self.role, self.role.announcement());
    }

    /// One AwaitingRemote tick. Returns true on the move to Transferring.
    fn await_remote(&mut self) -> bool {
        let received = self.port.poll_received();

        match (self.role, received) {
            (LinkRole::Internal, Some(ROLE_CONNECTED)) => {
                tracing::debug!(device = %self.device, "peer acknowledged");
                self.transition(ConnectionState::Transferring);
                return true;
            }
            (role, Some(byte)) if must_concede(role, byte) => {
                tracing::info!(device = %self.device, "clock collision lost, following peer");
                self.role = LinkRole::External;
            }
            (LinkRole::External, Some(byte)) => {
                tracing::debug!(device = %self.device, byte, "clock owner reached us");
                self.transition(ConnectionState::Transferring);
                return true;
            }
            (_, Some(byte)) => {
                tracing::trace!(device = %self.device, byte, "still waiting for acknowledgement");
            }
            (_, None) => {}
        }

        self.announce();
        false
    }

    async fn transfer(&mut self) -> Result<(), LinkError> {
        let mut rendered = Rendered {
            port: &mut self.port,
            render: &mut self.render,
            ticks: &mut self.ticks,
            state: ConnectionState::Transferring,
        };
        let mut link = ByteExchange::new(&mut rendered, self.role, self.policy);
        let exchanged = exchange_names(&mut link, &self.name).await?;

        self.peer_declared = exchanged.peer_declared;
        self.peer = exchanged.record;
        tracing::info!(
            device = %self.device,
            role = %self.role,
            peer_name = hex::encode(self.peer.as_bytes()),
            ticks = self.ticks,
            "names exchanged"
        );
        self.transition(ConnectionState::Done);
        Ok(())
    }

    /// Render the current state, then wait out the tick.
    async fn tick(&mut self, deadline: Option<Instant>) -> Result<(), LinkError> {
        let state = self.state;
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(LinkError::LinkLost { state });
        }
        self.render.render(state);
        match deadline {
            None => self.port.wait_for_tick().await?,
            Some(deadline) => tokio::time::timeout_at(deadline, self.port.wait_for_tick())
                .await
                .map_err(|_| LinkError::LinkLost { state })??,
        }
        self.ticks += 1;
        Ok(())
    }

    fn transition(&mut self, next: ConnectionState) {
        tracing::debug!(device = %self.device, from = %self.state, to = %next, "state");
        self.state = next;
    }

    fn session(&self) -> LinkSession {
        LinkSession {
            role: self.role,
            peer_declared: self.peer_declared,
            peer_name: Bytes::copy_from_slice(self.peer.as_bytes()),
            ticks: self.ticks,
        }
    }
}

/// Port view used during the exchange: renders and counts every tick, the
/// same way `LinkStateMachine::tick` does outside it.
struct Rendered<'a, P, R> {
    port: &'a mut P,
    render: &'a mut R,
    ticks: &'a mut u64,
    state: ConnectionState,
}

impl<P, R> Transport for Rendered<'_, P, R>
where
    P: Transport,
{
    fn send_byte(&mut self, role: LinkRole, value: u8) {
        self.port.send_byte(role, value);
    }

    fn poll_received(&mut self) -> Option<u8> {
        self.port.poll_received()
    }
}

impl<P, R> TickSource for Rendered<'_, P, R>
where
    P: TickSource + Send,
    R: Render + Send,
{
    async fn wait_for_tick(&mut self) -> Result<(), LinkError> {
        self.render.render(self.state);
        self.port.wait_for_tick().await?;
        *self.ticks += 1;
        Ok(())
    }
}
