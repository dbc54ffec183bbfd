//! tetherd: runs two simulated devices joined by a link cable.
//!
//! Usage: `tetherd [interactive]`. In interactive mode device A's confirm
//! button is the Enter key; otherwise both devices follow the confirm ticks
//! from the config file.

use std::time::Duration;

use anyhow::{Context, Result};

use tether_core::TetherConfig;
use tether_link::{
    Cable, CableConfig, ConfirmButton, ConfirmInput, LinkSession, ScriptedConfirm, WaitPolicy,
};

mod device;

use device::Device;

/// Confirm source chosen at startup.
enum Confirm {
    Scripted(ScriptedConfirm),
    Keyboard(ConfirmButton),
}

impl ConfirmInput for Confirm {
    fn read_confirm_edge(&mut self) -> bool {
        match self {
            Confirm::Scripted(s) => s.read_confirm_edge(),
            Confirm::Keyboard(k) => k.read_confirm_edge(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = TetherConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = TetherConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        TetherConfig::default()
    });

    let interactive = std::env::args().nth(1).as_deref() == Some("interactive");
    let policy = WaitPolicy::from_timeout(config.link.wait_timeout());
    tracing::info!(
        interactive,
        tick_hz = config.link.tick_hz,
        paced = config.link.paced,
        ?policy,
        latency_ticks = config.sim.latency_ticks,
        drop_rate = config.sim.drop_rate,
        "tetherd starting"
    );

    let input_a = if interactive {
        let (button, handle) = ConfirmButton::new();
        tokio::task::spawn_blocking(move || {
            for line in std::io::stdin().lines() {
                if line.is_err() || !handle.press() {
                    break;
                }
            }
        });
        println!("Press Enter to confirm on device A.");
        Confirm::Keyboard(button)
    } else {
        Confirm::Scripted(ScriptedConfirm::from_tick(config.demo.confirm_a()))
    };
    let input_b = Confirm::Scripted(ScriptedConfirm::from_tick(config.demo.confirm_b()));

    let device_a = Device::new("A", &config.demo.name_a, input_a)?;
    let device_b = Device::new("B", &config.demo.name_b, input_b)?;

    let (cable, port_a, port_b) = Cable::spawn(CableConfig::from_config(&config));

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    // ── Spawn tasks ──────────────────────────────────────────────────────────

    let task_a = tokio::spawn(device_a.run(port_a, policy, shutdown_tx.subscribe()));
    let task_b = tokio::spawn(device_b.run(port_b, policy, shutdown_tx.subscribe()));

    let tick_printer = {
        let cable = cable.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(5));
            loop {
                interval.tick().await;
                tracing::info!(tick = cable.tick(), "cable snapshot");
            }
        })
    };

    // ── Wait for exit ────────────────────────────────────────────────────────

    let (a, b) = tokio::join!(task_a, task_b);
    tick_printer.abort();

    let a = a.context("device A task panicked")??;
    let b = b.context("device B task panicked")??;
    report("A", a.as_ref());
    report("B", b.as_ref());
    tracing::info!(ticks = cable.tick(), "tetherd finished");

    Ok(())
}

fn report(label: &str, session: Option<&LinkSession>) {
    match session {
        Some(s) => tracing::info!(
            device = label,
            role = %s.role,
            peer_name = %String::from_utf8_lossy(&s.peer_name),
            peer_hex = hex::encode(&s.peer_name),
            peer_declared = s.peer_declared,
            ticks = s.ticks,
            "session complete"
        ),
        None => tracing::info!(device = label, "session interrupted"),
    }
}
