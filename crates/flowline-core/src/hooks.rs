// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Event-hook pipeline.
//!
//! Each engine event maps by variant to a handler that enqueues pre-commit
//! writes (applied inside the write transaction) and post-commit effects
//! (applied after the caller commits). Handlers run in event emission order;
//! effects of the same kind are applied as one bulk statement.

use chrono::{DateTime, Utc};
use flowline_engine::Event;
use tracing::warn;

use crate::assets::OrgAssets;
use crate::courier::CourierMsg;
use crate::error::Result;
use crate::ids::{ContactID, GroupID};
use crate::post_commit::{CampaignFire, PostCommit};
use crate::sessions::Session;
use crate::PgTransaction;

/// Accumulated side effects of one write or update call, grouped by kind.
#[derive(Default)]
pub(crate) struct Effects {
    name_changes: Vec<(ContactID, String)>,
    language_changes: Vec<(ContactID, String)>,
    group_adds: Vec<(GroupID, ContactID)>,
    group_removes: Vec<(GroupID, ContactID)>,
    field_changes: Vec<(ContactID, String, Option<serde_json::Value>)>,
    urn_adds: Vec<(ContactID, String)>,
    msgs: Vec<CourierMsg>,
    fires: Vec<CampaignFire>,
}

impl Effects {
    /// Dispatches one event to its handler. Events that reference assets the
    /// organization no longer has (a deleted group, an unroutable message)
    /// are logged and skipped rather than failing the sprint.
    pub(crate) fn apply_event(
        &mut self,
        org: &OrgAssets,
        session: &Session,
        event: &Event,
        now: DateTime<Utc>,
    ) {
        let contact_id = session.contact_id();

        match event {
            Event::MsgCreated { created_on, msg } => match &msg.channel {
                Some(channel) => self.msgs.push(CourierMsg {
                    uuid: msg.uuid,
                    org_id: org.org_id(),
                    contact_id,
                    urn: msg.urn.clone(),
                    channel_uuid: channel.uuid,
                    text: msg.text.clone(),
                    attachments: msg.attachments.clone(),
                    created_on: *created_on,
                }),
                None => {
                    warn!(msg_uuid = %msg.uuid, "message has no channel, not queued");
                }
            },

            // responded flags are computed when records are built
            Event::MsgReceived { .. } => {}

            Event::ContactNameChanged { name, .. } => {
                self.name_changes.push((contact_id, name.clone()));
            }

            Event::ContactLanguageChanged { language, .. } => {
                self.language_changes.push((contact_id, language.clone()));
            }

            Event::ContactGroupsChanged {
                groups_added,
                groups_removed,
                ..
            } => {
                for group in groups_added {
                    match org.group_by_uuid(group.uuid) {
                        Some(g) => {
                            self.group_adds.push((g.id, contact_id));
                            for ce in org.campaign_events_for_group(group.uuid) {
                                self.fires.push(CampaignFire {
                                    event_id: ce.id,
                                    contact_id,
                                    scheduled: now + chrono::Duration::minutes(ce.offset_minutes),
                                });
                            }
                        }
                        None => warn!(group_uuid = %group.uuid, "unknown group, add skipped"),
                    }
                }
                for group in groups_removed {
                    match org.group_by_uuid(group.uuid) {
                        Some(g) => self.group_removes.push((g.id, contact_id)),
                        None => warn!(group_uuid = %group.uuid, "unknown group, remove skipped"),
                    }
                }
            }

            Event::ContactFieldChanged { field, value, .. } => {
                self.field_changes
                    .push((contact_id, field.key.clone(), value.clone()));
            }

            Event::ContactUrnsChanged { urns, .. } => {
                for urn in urns {
                    self.urn_adds.push((contact_id, urn.clone()));
                }
            }

            Event::Error { .. } => {}
        }
    }

    /// Applies all pre-commit effects inside the write transaction, one bulk
    /// statement per effect kind.
    pub(crate) async fn apply_pre_commit(
        &self,
        tx: &mut PgTransaction<'_>,
        org: &OrgAssets,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if !self.name_changes.is_empty() {
            let ids: Vec<ContactID> = self.name_changes.iter().map(|c| c.0).collect();
            let names: Vec<&str> = self.name_changes.iter().map(|c| c.1.as_str()).collect();
            sqlx::query(
                r#"
                UPDATE contacts_contact c SET name = u.name, modified_on = $3
                FROM (SELECT unnest($1::bigint[]) AS id, unnest($2::text[]) AS name) u
                WHERE c.id = u.id
                "#,
            )
            .bind(ids)
            .bind(names)
            .bind(now)
            .execute(&mut **tx)
            .await?;
        }

        if !self.language_changes.is_empty() {
            let ids: Vec<ContactID> = self.language_changes.iter().map(|c| c.0).collect();
            let languages: Vec<&str> = self.language_changes.iter().map(|c| c.1.as_str()).collect();
            sqlx::query(
                r#"
                UPDATE contacts_contact c SET language = u.language, modified_on = $3
                FROM (SELECT unnest($1::bigint[]) AS id, unnest($2::text[]) AS language) u
                WHERE c.id = u.id
                "#,
            )
            .bind(ids)
            .bind(languages)
            .bind(now)
            .execute(&mut **tx)
            .await?;
        }

        if !self.group_adds.is_empty() {
            let group_ids: Vec<GroupID> = self.group_adds.iter().map(|g| g.0).collect();
            let contact_ids: Vec<ContactID> = self.group_adds.iter().map(|g| g.1).collect();
            sqlx::query(
                r#"
                INSERT INTO contacts_contactgroup_contacts (contactgroup_id, contact_id)
                SELECT unnest($1::bigint[]), unnest($2::bigint[])
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(group_ids)
            .bind(contact_ids)
            .execute(&mut **tx)
            .await?;
        }

        if !self.group_removes.is_empty() {
            let group_ids: Vec<GroupID> = self.group_removes.iter().map(|g| g.0).collect();
            let contact_ids: Vec<ContactID> = self.group_removes.iter().map(|g| g.1).collect();
            sqlx::query(
                r#"
                DELETE FROM contacts_contactgroup_contacts
                WHERE (contactgroup_id, contact_id) IN
                      (SELECT unnest($1::bigint[]), unnest($2::bigint[]))
                "#,
            )
            .bind(group_ids)
            .bind(contact_ids)
            .execute(&mut **tx)
            .await?;
        }

        // field changes are rare enough per sprint to apply one at a time
        for (contact_id, key, value) in &self.field_changes {
            match value {
                Some(value) => {
                    sqlx::query(
                        r#"
                        UPDATE contacts_contact
                        SET fields = COALESCE(fields, '{}'::jsonb) || jsonb_build_object($2::text, $3::jsonb),
                            modified_on = $4
                        WHERE id = $1
                        "#,
                    )
                    .bind(contact_id)
                    .bind(key)
                    .bind(sqlx::types::Json(value))
                    .bind(now)
                    .execute(&mut **tx)
                    .await?;
                }
                None => {
                    sqlx::query(
                        r#"
                        UPDATE contacts_contact SET fields = fields - $2::text, modified_on = $3
                        WHERE id = $1
                        "#,
                    )
                    .bind(contact_id)
                    .bind(key)
                    .bind(now)
                    .execute(&mut **tx)
                    .await?;
                }
            }
        }

        if !self.urn_adds.is_empty() {
            let contact_ids: Vec<ContactID> = self.urn_adds.iter().map(|u| u.0).collect();
            let identities: Vec<&str> = self.urn_adds.iter().map(|u| u.1.as_str()).collect();
            let schemes: Vec<&str> = identities
                .iter()
                .map(|i| i.split_once(':').map(|(s, _)| s).unwrap_or(""))
                .collect();
            let paths: Vec<&str> = identities
                .iter()
                .map(|i| i.split_once(':').map(|(_, p)| p).unwrap_or(i))
                .collect();

            sqlx::query(
                r#"
                INSERT INTO contacts_contacturn (org_id, contact_id, identity, scheme, path, priority)
                SELECT $1, unnest($2::bigint[]), unnest($3::text[]), unnest($4::text[]), unnest($5::text[]), 1000
                ON CONFLICT (org_id, identity) DO NOTHING
                "#,
            )
            .bind(org.org_id())
            .bind(contact_ids)
            .bind(identities.clone())
            .bind(schemes)
            .bind(paths)
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }

    /// Consumes the accumulated post-commit effects for the caller to apply
    /// after the transaction commits.
    pub(crate) fn into_post_commit(self) -> PostCommit {
        PostCommit::new(self.msgs, self.fires)
    }

    #[cfg(test)]
    pub(crate) fn counts(&self) -> (usize, usize, usize, usize) {
        (
            self.msgs.len(),
            self.group_adds.len(),
            self.fires.len(),
            self.name_changes.len(),
        )
    }
}
