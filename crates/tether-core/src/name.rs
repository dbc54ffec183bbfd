//! Name payloads exchanged once the link is established.
//!
//! The local name is fixed before a session starts. The peer's name is
//! accumulated one byte per tick and never grows past the agreed length.

use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

use crate::wire::{WireError, NAME_CAPACITY};

/// This device's identifying payload.
#[derive(Clone, PartialEq, Eq)]
pub struct NameBuffer {
    bytes: [u8; NAME_CAPACITY],
    len: u8,
}

impl NameBuffer {
    pub fn new(name: &[u8]) -> Result<Self, WireError> {
        if name.len() > NAME_CAPACITY {
            return Err(WireError::NameTooLong(name.len()));
        }
        let mut bytes = [0u8; NAME_CAPACITY];
        bytes[..name.len()].copy_from_slice(name);
        Ok(Self {
            bytes,
            len: name.len() as u8,
        })
    }

    pub fn empty() -> Self {
        Self {
            bytes: [0u8; NAME_CAPACITY],
            len: 0,
        }
    }

    /// Declared length, as sent on the wire.
    pub fn declared_len(&self) -> u8 {
        self.len
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len()]
    }

    pub fn get(&self, index: usize) -> Option<u8> {
        self.as_bytes().get(index).copied()
    }
}

impl fmt::Debug for NameBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NameBuffer")
            .field("name", &String::from_utf8_lossy(self.as_bytes()))
            .field("len", &self.len)
            .finish()
    }
}

impl TryFrom<&str> for NameBuffer {
    type Error = WireError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value.as_bytes())
    }
}

/// Bytes received from the peer during a name exchange.
#[derive(Debug, Clone, Default)]
pub struct PeerNameRecord {
    buf: BytesMut,
    limit: usize,
}

impl PeerNameRecord {
    /// A record that accepts at most `limit` bytes (clamped to capacity).
    pub fn with_limit(limit: usize) -> Self {
        let limit = limit.min(NAME_CAPACITY);
        Self {
            buf: BytesMut::with_capacity(limit),
            limit,
        }
    }

    pub fn push(&mut self, byte: u8) -> Result<(), WireError> {
        if self.buf.len() >= self.limit {
            return Err(WireError::RecordFull(self.limit));
        }
        self.buf.put_u8(byte);
        Ok(())
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.buf.len() == self.limit
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Discard everything received so far.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.limit = 0;
    }

    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }
}
