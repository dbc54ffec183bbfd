//! Tether wire contract: the register-level view of the link cable.
//!
//! These values ARE the protocol. Both devices must agree on every bit of the
//! control word and on every role byte. Retargeting the link to another
//! physical transport must preserve these semantics exactly.
//!
//! A single transfer shifts one byte in each direction. Only the device that
//! owns the clock (Internal) may start a transfer; the other side (External)
//! stages a byte and waits for the peer's clock edge.

use static_assertions::const_assert;
use std::fmt;

// ── Control Word ─────────────────────────────────────────────────────────────

/// The 2-bit serial control word.
///
/// Layout:
///   bit 7: start-transfer: set to request a shift, cleared by the cable
///          once the shift completes
///   bit 0: clock-source: 1 = internal (this device drives the clock),
///          0 = external (peer drives the clock)
///   bits 1-6: unused, must be zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlWord(u8);

impl ControlWord {
    pub const START_TRANSFER: u8 = 0b1000_0000;
    pub const CLOCK_INTERNAL: u8 = 0b0000_0001;
    const VALID_BITS: u8 = Self::START_TRANSFER | Self::CLOCK_INTERNAL;

    /// Nothing requested, external clock.
    pub const IDLE: ControlWord = ControlWord(0);

    /// Start a transfer driven by this device's clock.
    pub const MASTER_START: ControlWord =
        ControlWord(Self::START_TRANSFER | Self::CLOCK_INTERNAL);

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn start_transfer(self) -> bool {
        self.0 & Self::START_TRANSFER != 0
    }

    pub fn clock_internal(self) -> bool {
        self.0 & Self::CLOCK_INTERNAL != 0
    }

    /// True when this word makes the device drive a shift at the next boundary.
    pub fn drives_transfer(self) -> bool {
        self.start_transfer() && self.clock_internal()
    }

    /// Clear the start bit after a completed (or pre-empted) shift.
    pub fn complete(self) -> Self {
        ControlWord(self.0 & !Self::START_TRANSFER)
    }
}

impl TryFrom<u8> for ControlWord {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value & !Self::VALID_BITS != 0 {
            return Err(WireError::ReservedControlBits(value));
        }
        Ok(ControlWord(value))
    }
}

impl From<ControlWord> for u8 {
    fn from(c: ControlWord) -> u8 {
        c.0
    }
}

// ── Roles ─────────────────────────────────────────────────────────────────────

/// Which side of the cable owns the shared clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkRole {
    /// No role chosen yet. Behaves like External on the wire.
    #[default]
    Unconnected,
    /// Master: drives the clock and starts every transfer.
    Internal,
    /// Slave: stages bytes and follows the peer's clock.
    External,
}

impl LinkRole {
    /// Human readable label used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkRole::Unconnected => "unconnected",
            LinkRole::Internal => "internal",
            LinkRole::External => "external",
        }
    }

    /// The byte a device broadcasts while announcing this role.
    pub fn announcement(self) -> u8 {
        match self {
            LinkRole::Unconnected => ROLE_UNCONNECTED,
            LinkRole::Internal => ROLE_INTERNAL,
            LinkRole::External => ROLE_CONNECTED,
        }
    }

    /// Control word used when this role sends a byte.
    pub fn control_word(self) -> ControlWord {
        match self {
            LinkRole::Internal => ControlWord::MASTER_START,
            LinkRole::External | LinkRole::Unconnected => ControlWord::IDLE,
        }
    }
}

impl fmt::Display for LinkRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Constants ─────────────────────────────────────────────────────────────────

/// Broadcast while waiting for the local confirm action.
pub const ROLE_UNCONNECTED: u8 = 0x00;

/// Broadcast by the device that took clock ownership.
pub const ROLE_INTERNAL: u8 = 0x01;

/// Acknowledgement staged by the External device once it has conceded.
pub const ROLE_CONNECTED: u8 = 0x02;

/// What a master shifts in when nothing is attached to the other end.
pub const LINE_IDLE: u8 = 0xFF;

/// Capacity of a name payload in bytes.
pub const NAME_CAPACITY: usize = 16;

// The declared length travels as a single byte.
const_assert!(NAME_CAPACITY <= u8::MAX as usize);

/// Nominal tick frequency of the synchronization source.
pub const TICK_HZ: f64 = 59.73;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors that can arise when interpreting register or payload values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("reserved control bits are non-zero: 0x{0:02x}")]
    ReservedControlBits(u8),

    #[error("name length {0} exceeds capacity {}", NAME_CAPACITY)]
    NameTooLong(usize),

    #[error("peer name record already holds its limit of {0} bytes")]
    RecordFull(usize),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
