//! Collaborators outside the protocol: the confirm button and the display.

use tokio::sync::mpsc;

use crate::machine::ConnectionState;

/// Local confirm action, sampled once per tick.
pub trait ConfirmInput {
    /// True only on the tick the confirm action is newly pressed.
    fn read_confirm_edge(&mut self) -> bool;
}

/// Presentation of the current state. Fire-and-forget.
pub trait Render {
    fn render(&mut self, state: ConnectionState);
}

// ── Inputs ────────────────────────────────────────────────────────────────────

/// Presses confirm on a fixed sample (0-based), or never.
#[derive(Debug, Clone)]
pub struct ScriptedConfirm {
    press_at: Option<u64>,
    samples: u64,
}

impl ScriptedConfirm {
    pub fn at(sample: u64) -> Self {
        Self {
            press_at: Some(sample),
            samples: 0,
        }
    }

    pub fn never() -> Self {
        Self {
            press_at: None,
            samples: 0,
        }
    }

    pub fn from_tick(tick: Option<u64>) -> Self {
        Self {
            press_at: tick,
            samples: 0,
        }
    }
}

impl ConfirmInput for ScriptedConfirm {
    fn read_confirm_edge(&mut self) -> bool {
        let fired = self.press_at == Some(self.samples);
        self.samples += 1;
        fired
    }
}

/// Confirm button fed from another task.
pub struct ConfirmButton {
    rx: mpsc::UnboundedReceiver<()>,
}

/// Pressing end of a [`ConfirmButton`].
#[derive(Clone)]
pub struct ConfirmHandle {
    tx: mpsc::UnboundedSender<()>,
}

impl ConfirmButton {
    pub fn new() -> (ConfirmButton, ConfirmHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ConfirmButton { rx }, ConfirmHandle { tx })
    }
}

impl ConfirmHandle {
    /// Returns false once the button has been dropped.
    pub fn press(&self) -> bool {
        self.tx.send(()).is_ok()
    }
}

impl ConfirmInput for ConfirmButton {
    fn read_confirm_edge(&mut self) -> bool {
        // Several presses between two samples collapse into one edge.
        let mut pressed = false;
        while self.rx.try_recv().is_ok() {
            pressed = true;
        }
        pressed
    }
}

// ── Render ────────────────────────────────────────────────────────────────────

/// Logs state changes instead of drawing them.
pub struct TracingRender {
    device: String,
    last: Option<ConnectionState>,
}

impl TracingRender {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            last: None,
        }
    }
}

impl Render for TracingRender {
    fn render(&mut self, state: ConnectionState) {
        if self.last != Some(state) {
            tracing::debug!(device = %self.device, %state, "screen");
            self.last = Some(state);
        }
    }
}
