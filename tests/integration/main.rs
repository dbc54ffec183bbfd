//! Tether integration test harness.
//!
//! Every test here runs two complete devices against one simulated cable,
//! in process:
//!
//!   cargo test --test integration
//!
//! Cables are unpaced unless a test says otherwise, so a full session takes
//! a few milliseconds.

use std::time::Duration;

use anyhow::{Context, Result};

use tether_core::NameBuffer;
use tether_link::{
    Cable, CableConfig, CableHandle, LinkPort, LinkSession, LinkStateMachine, ScriptedConfirm,
    TracingRender, WaitPolicy,
};

mod config;
mod faults;
mod names;

// ── Harness ───────────────────────────────────────────────────────────────────

pub type Device = LinkStateMachine<LinkPort, ScriptedConfirm, TracingRender>;

/// Upper bound for any session that is expected to finish.
pub const SESSION_LIMIT: Duration = Duration::from_secs(5);

/// One side of a test setup.
pub struct Side<'a> {
    pub name: &'a [u8],
    pub confirm: ScriptedConfirm,
    pub policy: WaitPolicy,
}

impl<'a> Side<'a> {
    pub fn new(name: &'a [u8], confirm: ScriptedConfirm) -> Self {
        Self {
            name,
            confirm,
            policy: WaitPolicy::Indefinite,
        }
    }

    pub fn with_policy(mut self, policy: WaitPolicy) -> Self {
        self.policy = policy;
        self
    }
}

fn device(label: &str, port: LinkPort, side: Side<'_>) -> Result<Device> {
    let name = NameBuffer::new(side.name).with_context(|| format!("bad name for {label}"))?;
    Ok(
        LinkStateMachine::new(label, port, side.confirm, TracingRender::new(label), name)
            .with_policy(side.policy),
    )
}

/// Spawn a cable and one device on each end.
pub fn rig(config: CableConfig, a: Side<'_>, b: Side<'_>) -> Result<(CableHandle, Device, Device)> {
    let (cable, port_a, port_b) = Cable::spawn(config);
    Ok((cable, device("A", port_a, a)?, device("B", port_b, b)?))
}

/// Unpaced, fault-free cable with a fixed seed.
pub fn seeded(seed: u64) -> CableConfig {
    CableConfig {
        seed: Some(seed),
        ..CableConfig::default()
    }
}

/// Run both devices to completion, failing if either errors or stalls.
pub async fn run_both(a: &mut Device, b: &mut Device) -> Result<(LinkSession, LinkSession)> {
    let (ra, rb) = tokio::time::timeout(SESSION_LIMIT, async {
        tokio::join!(a.run(), b.run())
    })
    .await
    .context("session did not finish in time")?;
    Ok((ra.context("device A")?, rb.context("device B")?))
}
