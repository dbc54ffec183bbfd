//! Configuration system for Tether.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $TETHER_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/tether/config.toml
//!   3. ~/.config/tether/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::wire::TICK_HZ;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TetherConfig {
    pub link: LinkConfig,
    pub sim: SimConfig,
    pub demo: DemoConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Tick frequency of the cable clock.
    pub tick_hz: f64,
    /// Pace tick boundaries in real time. false = run as fast as both ends allow.
    pub paced: bool,
    /// Bound on every post-negotiation wait, in milliseconds. 0 = wait forever.
    pub wait_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Extra ticks a shifted byte spends on the line before it is latched.
    pub latency_ticks: u32,
    /// Probability in [0, 1] that a latched byte is lost.
    pub drop_rate: f64,
    /// RNG seed for drops and clock arbitration. 0 = seed from entropy.
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub name_a: String,
    pub name_b: String,
    /// Tick on which device A presses confirm. Negative = never.
    pub confirm_a_tick: i64,
    /// Tick on which device B presses confirm. Negative = never.
    pub confirm_b_tick: i64,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            tick_hz: TICK_HZ,
            paced: true,
            wait_timeout_ms: 0,
        }
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            latency_ticks: 0,
            drop_rate: 0.0,
            seed: 0,
        }
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            name_a: "ABC".to_string(),
            name_b: "XY".to_string(),
            confirm_a_tick: 30,
            confirm_b_tick: -1,
        }
    }
}

impl LinkConfig {
    /// Wall-clock length of one tick.
    pub fn tick_period(&self) -> Duration {
        let hz = if self.tick_hz > 0.0 { self.tick_hz } else { TICK_HZ };
        Duration::from_secs_f64(1.0 / hz)
    }

    /// None means every wait is unbounded.
    pub fn wait_timeout(&self) -> Option<Duration> {
        match self.wait_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

impl DemoConfig {
    pub fn confirm_a(&self) -> Option<u64> {
        u64::try_from(self.confirm_a_tick).ok()
    }

    pub fn confirm_b(&self) -> Option<u64> {
        u64::try_from(self.confirm_b_tick).ok()
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("tether")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl TetherConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            TetherConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("TETHER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&TetherConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text)
                .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply TETHER_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("TETHER_LINK__WAIT_TIMEOUT_MS") {
            if let Ok(ms) = v.parse() {
                self.link.wait_timeout_ms = ms;
            }
        }
        if let Ok(v) = std::env::var("TETHER_LINK__PACED") {
            self.link.paced = v == "true" || v == "1";
        }
        if let Ok(v) = std::env::var("TETHER_SIM__DROP_RATE") {
            if let Ok(rate) = v.parse::<f64>() {
                self.sim.drop_rate = rate.clamp(0.0, 1.0);
            }
        }
        if let Ok(v) = std::env::var("TETHER_SIM__LATENCY_TICKS") {
            if let Ok(ticks) = v.parse() {
                self.sim.latency_ticks = ticks;
            }
        }
        if let Ok(v) = std::env::var("TETHER_DEMO__NAME_A") {
            self.demo.name_a = v;
        }
        if let Ok(v) = std::env::var("TETHER_DEMO__NAME_B") {
            self.demo.name_b = v;
        }
    }
}
