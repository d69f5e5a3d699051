// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Post-commit effect application.
//!
//! Effects that must only become visible after the write transaction commits:
//! courier queue pushes and campaign event fires. The caller commits its
//! transaction, then applies the [`PostCommit`] set returned by the write or
//! update call. Failures here are reported but the committed state stands;
//! every effect must tolerate at-least-once application on retry.

use chrono::{DateTime, Utc};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::courier::{self, CourierMsg};
use crate::error::Result;
use crate::ids::{CampaignEventID, ContactID};
use crate::runtime::Runtime;

/// A campaign event fire scheduled for a contact newly added to a group.
#[derive(Debug, Clone)]
pub struct CampaignFire {
    /// The campaign event to fire.
    pub event_id: CampaignEventID,
    /// The enrolled contact.
    pub contact_id: ContactID,
    /// When the event should fire.
    pub scheduled: DateTime<Utc>,
}

/// The effects of one write or update call that run after commit.
#[derive(Debug, Default)]
pub struct PostCommit {
    msgs: Vec<CourierMsg>,
    fires: Vec<CampaignFire>,
}

impl PostCommit {
    pub(crate) fn new(msgs: Vec<CourierMsg>, fires: Vec<CampaignFire>) -> Self {
        Self { msgs, fires }
    }

    /// Returns true if there is nothing to apply.
    pub fn is_empty(&self) -> bool {
        self.msgs.is_empty() && self.fires.is_empty()
    }

    /// The outbound messages awaiting courier queueing, in sprint event order.
    pub fn msgs(&self) -> &[CourierMsg] {
        &self.msgs
    }

    /// The campaign fires awaiting scheduling.
    pub fn campaign_fires(&self) -> &[CampaignFire] {
        &self.fires
    }

    /// Folds another call's effects into this one, preserving order, so a
    /// batch of updates can be applied with a single call.
    pub fn merge(&mut self, other: PostCommit) {
        self.msgs.extend(other.msgs);
        self.fires.extend(other.fires);
    }
}

/// Applies post-commit effects: campaign fires in a fresh transaction, then
/// courier pushes grouped per channel in first-seen order.
#[instrument(skip_all, fields(msgs = post.msgs.len(), fires = post.fires.len()))]
pub async fn apply(rt: &Runtime, post: &PostCommit, now: DateTime<Utc>) -> Result<()> {
    if post.is_empty() {
        return Ok(());
    }

    if !post.fires.is_empty() {
        let event_ids: Vec<CampaignEventID> = post.fires.iter().map(|f| f.event_id).collect();
        let contact_ids: Vec<ContactID> = post.fires.iter().map(|f| f.contact_id).collect();
        let scheduled: Vec<DateTime<Utc>> = post.fires.iter().map(|f| f.scheduled).collect();

        let mut tx = rt.db.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO campaigns_eventfire (event_id, contact_id, scheduled)
            SELECT unnest($1::bigint[]), unnest($2::bigint[]), unnest($3::timestamptz[])
            "#,
        )
        .bind(event_ids)
        .bind(contact_ids)
        .bind(scheduled)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        debug!(count = post.fires.len(), "scheduled campaign fires");
    }

    if !post.msgs.is_empty() {
        let mut conn = rt.redis.get_multiplexed_async_connection().await?;

        // batch per channel, preserving first-seen channel order
        let mut batches: Vec<(Uuid, Vec<&CourierMsg>)> = Vec::new();
        for msg in &post.msgs {
            match batches.iter_mut().find(|(uuid, _)| *uuid == msg.channel_uuid) {
                Some((_, batch)) => batch.push(msg),
                None => batches.push((msg.channel_uuid, vec![msg])),
            }
        }

        for (channel_uuid, batch) in batches {
            courier::queue_messages(
                &mut conn,
                channel_uuid,
                rt.config.courier_default_tps,
                &batch,
                now,
            )
            .await?;
        }

        debug!(count = post.msgs.len(), "queued courier messages");
    }

    Ok(())
}
