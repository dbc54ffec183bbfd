//! Name exchange protocol.
//!
//! Both sides send their declared length, then swap `min(local, peer)` name
//! bytes, one per tick. The peer's length is untrusted and is clamped to the
//! name capacity before it sizes anything.

use tether_core::wire::NAME_CAPACITY;
use tether_core::{NameBuffer, PeerNameRecord};

use crate::error::LinkError;
use crate::exchange::ByteExchange;
use crate::transport::{TickSource, Transport};

/// Result of a completed exchange.
#[derive(Debug, Clone)]
pub struct ExchangedName {
    /// Length byte exactly as the peer sent it.
    pub peer_declared: u8,
    pub record: PeerNameRecord,
}

pub async fn exchange_names<P>(
    link: &mut ByteExchange<'_, P>,
    local: &NameBuffer,
) -> Result<ExchangedName, LinkError>
where
    P: Transport + TickSource + Send,
{
    link.send_byte(local.declared_len());
    let peer_declared = link.next_byte().await?;

    let peer_len = usize::from(peer_declared);
    if peer_len > NAME_CAPACITY {
        tracing::warn!(
            declared = peer_len,
            capacity = NAME_CAPACITY,
            "peer declared an oversized name, clamping"
        );
    }
    let n = local.len().min(peer_len.min(NAME_CAPACITY));
    tracing::debug!(
        role = %link.role(),
        local_len = local.len(),
        peer_len,
        rounds = n,
        "name lengths exchanged"
    );

    let mut record = PeerNameRecord::with_limit(n);
    for &byte in &local.as_bytes()[..n] {
        link.send_byte(byte);
        let received = link.next_byte().await?;
        record.push(received)?;
    }

    Ok(ExchangedName {
        peer_declared,
        record,
    })
}
