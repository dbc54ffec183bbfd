//! Transport and tick seams.
//!
//! A device sees the cable as a small register file: one outbound byte, a
//! control word, one inbound byte and a "new data" flag. Nothing moves until
//! a tick boundary, so every wait in the protocol goes through
//! [`TickSource::wait_for_tick`].

use std::future::Future;

use tether_core::{ControlWord, LinkRole};

use crate::error::LinkError;

/// Byte-level access to the shared line.
pub trait Transport {
    /// Stage `value` for the next shift. An Internal role also asserts
    /// start-transfer with the internal clock. Never blocks.
    fn send_byte(&mut self, role: LinkRole, value: u8);

    /// Take the latched inbound byte, if one arrived since the last poll.
    fn poll_received(&mut self) -> Option<u8>;
}

/// The periodic synchronization boundary.
pub trait TickSource {
    /// Suspend until the next tick boundary.
    fn wait_for_tick(&mut self) -> impl Future<Output = Result<(), LinkError>> + Send;

    /// Stop holding up tick boundaries until the next `wait_for_tick`.
    fn park(&mut self) {}
}

/// Local copy of the serial registers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SerialRegisters {
    pub outbound: u8,
    pub control: ControlWord,
    pub inbound: u8,
    pub new_data: bool,
}

impl SerialRegisters {
    pub fn stage(&mut self, role: LinkRole, value: u8) {
        self.outbound = value;
        self.control = role.control_word();
    }

    /// Consume the new-data flag. Returns the byte exactly once per latch.
    pub fn take(&mut self) -> Option<u8> {
        if self.new_data {
            self.new_data = false;
            Some(self.inbound)
        } else {
            None
        }
    }

    /// Hardware side: a shift completed and `byte` landed in the inbound register.
    /// Returns true if an unconsumed byte was overwritten.
    pub fn latch(&mut self, byte: u8) -> bool {
        let overrun = self.new_data;
        self.inbound = byte;
        self.new_data = true;
        overrun
    }
}
