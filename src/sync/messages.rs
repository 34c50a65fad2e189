//! Sync wire message and its length-prefixed framing
//!
//! The wire form is `{ "type": "update", "resources": [Layer, ...] }`.
//! Anything else that arrives on the channel is ignored.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use tracing::debug;

use crate::constants::sync::{MAX_MESSAGE_SIZE, UPDATE_TAG};
use crate::layer::Snapshot;

/// Messages carried by the broadcast channel
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SyncMessage {
    /// Full snapshot of the latest saved layer list
    Update { resources: Snapshot },
}

impl SyncMessage {
    pub fn update(snapshot: &Snapshot) -> Self {
        SyncMessage::Update {
            resources: snapshot.clone(),
        }
    }
}

/// Extract the snapshot from raw message bytes, or `None` if the message is
/// not a well-formed update
pub fn decode_update(bytes: &[u8]) -> Option<Snapshot> {
    let value: serde_json::Value = match serde_json::from_slice(bytes) {
        Ok(value) => value,
        Err(e) => {
            debug!(error = %e, "Ignoring non-JSON sync message");
            return None;
        }
    };
    if value.get("type").and_then(|t| t.as_str()) != Some(UPDATE_TAG) {
        debug!("Ignoring sync message with unknown tag");
        return None;
    }
    match serde_json::from_value::<SyncMessage>(value) {
        Ok(SyncMessage::Update { resources }) => Some(resources),
        Err(e) => {
            debug!(error = %e, "Ignoring malformed update message");
            None
        }
    }
}

/// Write length-prefixed message to stream
pub fn write_message<W: Write, T: Serialize>(stream: &mut W, msg: &T) -> Result<()> {
    let json = serde_json::to_vec(msg).context("Failed to serialize message to JSON")?;
    write_frame(stream, &json)
}

/// Write an already-encoded payload with its length prefix
pub fn write_frame<W: Write>(stream: &mut W, payload: &[u8]) -> Result<()> {
    if payload.len() > MAX_MESSAGE_SIZE {
        return Err(anyhow!("Message too large: {} bytes (max: {})", payload.len(), MAX_MESSAGE_SIZE));
    }

    // Write length prefix (u32 little-endian)
    let len = payload.len() as u32;
    stream
        .write_all(&len.to_le_bytes())
        .context("Failed to write message length")?;

    stream
        .write_all(payload)
        .context("Failed to write message payload")?;

    stream.flush().context("Failed to flush stream")?;

    Ok(())
}

/// Read length-prefixed payload from stream
pub fn read_frame<R: Read>(stream: &mut R) -> Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    stream
        .read_exact(&mut len_buf)
        .context("Failed to read message length")?;
    let len = u32::from_le_bytes(len_buf) as usize;

    // Sanity check (prevent DoS via huge allocation)
    if len > MAX_MESSAGE_SIZE {
        return Err(anyhow!("Message too large: {} bytes (max: {})", len, MAX_MESSAGE_SIZE));
    }

    let mut payload = vec![0u8; len];
    stream
        .read_exact(&mut payload)
        .context("Failed to read message payload")?;

    Ok(payload)
}
