// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Courier queue.
//!
//! Outbound messages are handed to the downstream courier via per-channel
//! sorted sets in Redis. Each queued member is a JSON array of message
//! objects (one batch per sprint per channel) scored with the queueing time,
//! and every queue key is registered in the `msgs:active` set so courier
//! workers can discover it. Delivery is at-least-once; the courier is
//! responsible for its own dedup.

use chrono::{DateTime, Utc};
use redis::aio::MultiplexedConnection;
use serde::Serialize;
use uuid::Uuid;

use crate::error::Result;
use crate::ids::{ContactID, OrgID};

/// An outbound message in the courier wire format.
#[derive(Debug, Clone, Serialize)]
pub struct CourierMsg {
    /// Message UUID.
    pub uuid: Uuid,
    /// Owning organization.
    pub org_id: OrgID,
    /// Destination contact.
    pub contact_id: ContactID,
    /// Destination URN, absent when the channel addresses by contact.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urn: Option<String>,
    /// The channel to send on.
    pub channel_uuid: Uuid,
    /// Message text.
    pub text: String,
    /// Attachment URLs.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
    /// When the engine created the message.
    pub created_on: DateTime<Utc>,
}

/// Pushes one batch of messages onto a channel's queue.
///
/// The key embeds the channel's configured rate so courier workers can pace
/// sends without a config lookup. Push order across calls matches sprint
/// event order, which is all the ordering the courier is promised.
pub async fn queue_messages(
    conn: &mut MultiplexedConnection,
    channel_uuid: Uuid,
    tps: u32,
    batch: &[&CourierMsg],
    now: DateTime<Utc>,
) -> Result<()> {
    if batch.is_empty() {
        return Ok(());
    }

    let key = format!("msgs:{}-{}", channel_uuid, tps);
    let member = serde_json::to_string(batch)?;
    let score = now.timestamp_micros() as f64 / 1_000_000.0;

    redis::pipe()
        .cmd("ZADD")
        .arg(&key)
        .arg(score)
        .arg(member)
        .ignore()
        .cmd("SADD")
        .arg("msgs:active")
        .arg(&key)
        .ignore()
        .query_async::<_, ()>(conn)
        .await?;

    Ok(())
}
