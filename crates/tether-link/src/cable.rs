//! Simulated link cable.
//!
//! The cable is an actor task. Each end is a [`LinkPort`] that owns its own
//! registers and only talks to the cable over channels: on every
//! `wait_for_tick` the port reports its outbound byte and control word, and
//! the cable answers once both attached ends have reported. That answer is
//! the tick boundary. Shifts, collisions, latency, and drops are all resolved
//! there, so the two devices stay in lockstep without sharing memory.
//! A parked or dropped port stops holding up boundaries; a parked port
//! rejoins with its next report.

use std::collections::VecDeque;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{self, MissedTickBehavior};

use tether_core::wire::LINE_IDLE;
use tether_core::{ControlWord, LinkRole, TetherConfig};

use crate::error::LinkError;
use crate::transport::{SerialRegisters, TickSource, Transport};

// ── Configuration ─────────────────────────────────────────────────────────────

/// Which end of the cable a port is plugged into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortId {
    A,
    B,
}

impl PortId {
    pub fn as_str(&self) -> &'static str {
        match self {
            PortId::A => "A",
            PortId::B => "B",
        }
    }

    pub fn peer(self) -> PortId {
        match self {
            PortId::A => PortId::B,
            PortId::B => PortId::A,
        }
    }

    fn index(self) -> usize {
        match self {
            PortId::A => 0,
            PortId::B => 1,
        }
    }
}

/// Injectable line faults.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimFaults {
    /// Extra boundaries a shifted byte waits before it is latched.
    pub latency_ticks: u32,
    /// Probability that a shifted byte never gets latched.
    pub drop_rate: f64,
}

impl Default for SimFaults {
    fn default() -> Self {
        Self {
            latency_ticks: 0,
            drop_rate: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CableConfig {
    /// Minimum wall time between boundaries. None = as fast as both ends report.
    pub tick_period: Option<Duration>,
    pub faults: SimFaults,
    /// Seed for drops and clock arbitration. None = entropy.
    pub seed: Option<u64>,
}

impl CableConfig {
    pub fn from_config(config: &TetherConfig) -> Self {
        Self {
            tick_period: config.link.paced.then(|| config.link.tick_period()),
            faults: SimFaults {
                latency_ticks: config.sim.latency_ticks,
                drop_rate: config.sim.drop_rate.clamp(0.0, 1.0),
            },
            seed: (config.sim.seed != 0).then_some(config.sim.seed),
        }
    }
}

// ── Messages ──────────────────────────────────────────────────────────────────

enum CableMsg {
    Tick {
        port: PortId,
        outbound: u8,
        control: ControlWord,
        reply: oneshot::Sender<Latch>,
    },
    /// Port stops reporting until its next tick.
    Park(PortId),
    /// Port is gone for good.
    Detach(PortId),
    SetFaults(SimFaults),
}

/// What a port learns at a boundary.
#[derive(Debug, Clone, Copy)]
struct Latch {
    inbound: Option<u8>,
    control: ControlWord,
}

struct Report {
    outbound: u8,
    control: ControlWord,
    reply: oneshot::Sender<Latch>,
}

// ── Cable actor ───────────────────────────────────────────────────────────────

pub struct Cable {
    rx: mpsc::UnboundedReceiver<CableMsg>,
    attached: [bool; 2],
    dropped: [bool; 2],
    pending: [Option<Report>; 2],
    // (boundary at which the byte is latched, byte)
    in_flight: [VecDeque<(u64, u8)>; 2],
    faults: SimFaults,
    rng: StdRng,
    tick: u64,
    tick_tx: watch::Sender<u64>,
    pacer: Option<time::Interval>,
}

impl Cable {
    /// Start the cable task and hand out both ends plus a control handle.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(config: CableConfig) -> (CableHandle, LinkPort, LinkPort) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (tick_tx, tick_rx) = watch::channel(0);

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let pacer = config.tick_period.map(|period| {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        let cable = Cable {
            rx,
            attached: [true, true],
            dropped: [false, false],
            pending: [None, None],
            in_flight: [VecDeque::new(), VecDeque::new()],
            faults: sanitize(config.faults),
            rng,
            tick: 0,
            tick_tx,
            pacer,
        };

        tracing::debug!(
            paced = config.tick_period.is_some(),
            latency_ticks = config.faults.latency_ticks,
            drop_rate = config.faults.drop_rate,
            "cable starting"
        );
        tokio::spawn(cable.run());

        (
            CableHandle {
                tx: tx.clone(),
                ticks: tick_rx,
            },
            LinkPort::new(PortId::A, tx.clone()),
            LinkPort::new(PortId::B, tx),
        )
    }

    async fn run(mut self) {
        loop {
            while !self.boundary_ready() {
                if self.dropped.iter().all(|d| *d) {
                    tracing::debug!(tick = self.tick, "both ends detached, cable stopping");
                    return;
                }
                match self.rx.recv().await {
                    Some(msg) => self.handle(msg),
                    None => return,
                }
            }

            if let Some(pacer) = self.pacer.as_mut() {
                pacer.tick().await;
            }
            self.boundary();
        }
    }

    /// Every attached end has reported, and at least one end is attached.
    fn boundary_ready(&self) -> bool {
        let mut any = false;
        for i in 0..2 {
            if self.attached[i] {
                if self.pending[i].is_none() {
                    return false;
                }
                any = true;
            }
        }
        any
    }

    fn handle(&mut self, msg: CableMsg) {
        match msg {
            CableMsg::Tick {
                port,
                outbound,
                control,
                reply,
            } => {
                if !self.attached[port.index()] {
                    tracing::debug!(port = port.as_str(), tick = self.tick, "port rejoined");
                    self.attached[port.index()] = true;
                }
                self.pending[port.index()] = Some(Report {
                    outbound,
                    control,
                    reply,
                });
            }
            CableMsg::Park(port) => {
                tracing::debug!(port = port.as_str(), tick = self.tick, "port parked");
                self.unplug(port);
            }
            CableMsg::Detach(port) => {
                tracing::debug!(port = port.as_str(), tick = self.tick, "port detached");
                self.unplug(port);
                self.dropped[port.index()] = true;
            }
            CableMsg::SetFaults(faults) => {
                tracing::debug!(?faults, "line faults updated");
                self.faults = sanitize(faults);
            }
        }
    }

    fn unplug(&mut self, port: PortId) {
        self.attached[port.index()] = false;
        self.pending[port.index()] = None;
        self.in_flight[port.index()].clear();
    }

    fn boundary(&mut self) {
        self.tick += 1;
        let reports = [self.pending[0].take(), self.pending[1].take()];
        let mut controls = [
            reports[0].as_ref().map(|r| r.control),
            reports[1].as_ref().map(|r| r.control),
        ];
        let drives = |i: usize| controls[i].is_some_and(|c| c.drives_transfer());

        match (drives(0), drives(1)) {
            (true, true) => {
                let winner = if self.rng.gen_bool(0.5) { PortId::A } else { PortId::B };
                let loser = winner.peer();
                if let Some(r) = &reports[winner.index()] {
                    self.deliver(loser, r.outbound);
                }
                tracing::debug!(
                    tick = self.tick,
                    winner = winner.as_str(),
                    "clock collision, loser pre-empted"
                );
                for c in controls.iter_mut().flatten() {
                    *c = c.complete();
                }
            }
            (true, false) => self.shift(PortId::A, &reports, &mut controls),
            (false, true) => self.shift(PortId::B, &reports, &mut controls),
            (false, false) => {}
        }

        for (i, report) in reports.into_iter().enumerate() {
            let Some(report) = report else { continue };
            let inbound = match self.in_flight[i].front() {
                Some(&(due, byte)) if due <= self.tick => {
                    self.in_flight[i].pop_front();
                    Some(byte)
                }
                _ => None,
            };
            let latch = Latch {
                inbound,
                control: controls[i].unwrap_or(report.control),
            };
            // A port that stopped waiting has nothing left to update.
            let _ = report.reply.send(latch);
        }

        self.tick_tx.send_replace(self.tick);
    }

    /// One clean transfer driven by `master`: each side shifts in the other's byte.
    fn shift(
        &mut self,
        master: PortId,
        reports: &[Option<Report>; 2],
        controls: &mut [Option<ControlWord>; 2],
    ) {
        let m = master.index();
        let s = master.peer().index();
        let Some(master_report) = &reports[m] else { return };

        let slave_byte = match &reports[s] {
            Some(slave) => {
                self.deliver(master.peer(), master_report.outbound);
                slave.outbound
            }
            None => LINE_IDLE,
        };
        self.deliver(master, slave_byte);

        if let Some(c) = controls[m].as_mut() {
            *c = c.complete();
        }
        tracing::trace!(
            tick = self.tick,
            master = master.as_str(),
            out = master_report.outbound,
            back = slave_byte,
            "shift"
        );
    }

    fn deliver(&mut self, to: PortId, byte: u8) {
        if self.faults.drop_rate > 0.0 && self.rng.gen_bool(self.faults.drop_rate) {
            tracing::trace!(tick = self.tick, port = to.as_str(), byte, "byte dropped on the line");
            return;
        }
        let due = self.tick + u64::from(self.faults.latency_ticks);
        self.in_flight[to.index()].push_back((due, byte));
    }
}

fn sanitize(faults: SimFaults) -> SimFaults {
    let drop_rate = if faults.drop_rate.is_nan() {
        0.0
    } else {
        faults.drop_rate.clamp(0.0, 1.0)
    };
    SimFaults {
        drop_rate,
        ..faults
    }
}

// ── Handle ────────────────────────────────────────────────────────────────────

/// Out-of-band control over a running cable.
#[derive(Clone)]
pub struct CableHandle {
    tx: mpsc::UnboundedSender<CableMsg>,
    ticks: watch::Receiver<u64>,
}

impl CableHandle {
    /// Change latency/drop behaviour from the next boundary on.
    pub fn set_faults(&self, faults: SimFaults) -> Result<(), LinkError> {
        self.tx
            .send(CableMsg::SetFaults(faults))
            .map_err(|_| LinkError::CableClosed)
    }

    /// Number of boundaries resolved so far.
    pub fn tick(&self) -> u64 {
        *self.ticks.borrow()
    }

    /// Wait until the cable has resolved at least `n` boundaries.
    pub async fn wait_for_boundary(&mut self, n: u64) -> Result<u64, LinkError> {
        let tick = self
            .ticks
            .wait_for(|t| *t >= n)
            .await
            .map_err(|_| LinkError::CableClosed)?;
        Ok(*tick)
    }
}

// ── Port ──────────────────────────────────────────────────────────────────────

/// One end of the cable, owned by a single device.
pub struct LinkPort {
    id: PortId,
    regs: SerialRegisters,
    tx: mpsc::UnboundedSender<CableMsg>,
    ticks: u64,
}

impl LinkPort {
    fn new(id: PortId, tx: mpsc::UnboundedSender<CableMsg>) -> Self {
        Self {
            id,
            regs: SerialRegisters::default(),
            tx,
            ticks: 0,
        }
    }

    pub fn id(&self) -> PortId {
        self.id
    }

    pub fn registers(&self) -> SerialRegisters {
        self.regs
    }

    /// Boundaries this port has waited through.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

impl Transport for LinkPort {
    fn send_byte(&mut self, role: LinkRole, value: u8) {
        self.regs.stage(role, value);
    }

    fn poll_received(&mut self) -> Option<u8> {
        self.regs.take()
    }
}

impl TickSource for LinkPort {
    async fn wait_for_tick(&mut self) -> Result<(), LinkError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(CableMsg::Tick {
                port: self.id,
                outbound: self.regs.outbound,
                control: self.regs.control,
                reply,
            })
            .map_err(|_| LinkError::CableClosed)?;

        let latch = rx.await.map_err(|_| LinkError::CableClosed)?;
        self.regs.control = latch.control;
        if let Some(byte) = latch.inbound {
            if self.regs.latch(byte) {
                tracing::trace!(port = self.id.as_str(), byte, "inbound overrun");
            }
        }
        self.ticks += 1;
        Ok(())
    }

    fn park(&mut self) {
        let _ = self.tx.send(CableMsg::Park(self.id));
    }
}

impl Drop for LinkPort {
    fn drop(&mut self) {
        let _ = self.tx.send(CableMsg::Detach(self.id));
    }
}
