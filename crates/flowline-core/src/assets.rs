// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Organization assets.
//!
//! The real asset layer (loading, caching, invalidation) is an external
//! collaborator; this is the minimal read-only view the core needs to
//! resolve engine references against database ids. Assets are loaded once
//! per advance and shared immutably.

use std::collections::HashMap;

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::ids::{CampaignEventID, FlowID, GroupID, OrgID};
use crate::status::FlowType;

/// A flow as seen by the core.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FlowAsset {
    /// Database id.
    pub id: FlowID,
    /// Asset UUID, the form engine references use.
    pub uuid: Uuid,
    /// Flow name.
    pub name: String,
    /// Flow type.
    pub flow_type: FlowType,
}

/// A contact group as seen by the core.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GroupAsset {
    /// Database id.
    pub id: GroupID,
    /// Asset UUID.
    pub uuid: Uuid,
    /// Group name.
    pub name: String,
}

/// A campaign event hanging off a group, fired for newly added members.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CampaignEventAsset {
    /// Database id.
    pub id: CampaignEventID,
    /// UUID of the group whose members the event targets.
    pub group_uuid: Uuid,
    /// Minutes after enrollment at which the event fires.
    pub offset_minutes: i64,
}

/// Read-only asset view for one organization.
#[derive(Debug)]
pub struct OrgAssets {
    org_id: OrgID,
    flows: Vec<FlowAsset>,
    flows_by_uuid: HashMap<Uuid, usize>,
    flows_by_id: HashMap<FlowID, usize>,
    groups_by_uuid: HashMap<Uuid, GroupAsset>,
    campaign_events_by_group: HashMap<Uuid, Vec<CampaignEventAsset>>,
}

impl OrgAssets {
    /// Assemble assets from already-loaded parts.
    pub fn from_parts(
        org_id: OrgID,
        flows: Vec<FlowAsset>,
        groups: Vec<GroupAsset>,
        campaign_events: Vec<CampaignEventAsset>,
    ) -> Self {
        let flows_by_uuid = flows.iter().enumerate().map(|(i, f)| (f.uuid, i)).collect();
        let flows_by_id = flows.iter().enumerate().map(|(i, f)| (f.id, i)).collect();
        let groups_by_uuid = groups.into_iter().map(|g| (g.uuid, g)).collect();

        let mut campaign_events_by_group: HashMap<Uuid, Vec<CampaignEventAsset>> = HashMap::new();
        for event in campaign_events {
            campaign_events_by_group
                .entry(event.group_uuid)
                .or_default()
                .push(event);
        }

        Self {
            org_id,
            flows,
            flows_by_uuid,
            flows_by_id,
            groups_by_uuid,
            campaign_events_by_group,
        }
    }

    /// Load assets for an organization from the database.
    pub async fn load(db: &PgPool, org_id: OrgID) -> Result<Self> {
        let flows = sqlx::query_as::<_, FlowAsset>(
            r#"
            SELECT id, uuid, name, flow_type
            FROM flows_flow
            WHERE org_id = $1 AND is_active = TRUE
            ORDER BY id
            "#,
        )
        .bind(org_id)
        .fetch_all(db)
        .await?;

        let groups = sqlx::query_as::<_, GroupAsset>(
            r#"
            SELECT id, uuid, name
            FROM contacts_contactgroup
            WHERE org_id = $1
            ORDER BY id
            "#,
        )
        .bind(org_id)
        .fetch_all(db)
        .await?;

        let campaign_events = sqlx::query_as::<_, CampaignEventAsset>(
            r#"
            SELECT ce.id, g.uuid AS group_uuid, ce.offset_minutes
            FROM campaigns_campaignevent ce
            JOIN contacts_contactgroup g ON g.id = ce.group_id
            WHERE ce.org_id = $1
            ORDER BY ce.id
            "#,
        )
        .bind(org_id)
        .fetch_all(db)
        .await?;

        Ok(Self::from_parts(org_id, flows, groups, campaign_events))
    }

    /// The organization these assets belong to.
    pub fn org_id(&self) -> OrgID {
        self.org_id
    }

    /// Looks up a flow by its asset UUID.
    pub fn flow_by_uuid(&self, uuid: Uuid) -> Option<&FlowAsset> {
        self.flows_by_uuid.get(&uuid).map(|&i| &self.flows[i])
    }

    /// Looks up a flow by its database id.
    pub fn flow_by_id(&self, id: FlowID) -> Option<&FlowAsset> {
        self.flows_by_id.get(&id).map(|&i| &self.flows[i])
    }

    /// Resolves a flow reference UUID to its database id, failing validation
    /// when the organization has no such flow.
    pub fn flow_id_for_uuid(&self, uuid: Uuid) -> Result<FlowID> {
        self.flow_by_uuid(uuid)
            .map(|f| f.id)
            .ok_or_else(|| CoreError::validation(format!("unable to load flow with uuid: {uuid}")))
    }

    /// Looks up a group by its asset UUID.
    pub fn group_by_uuid(&self, uuid: Uuid) -> Option<&GroupAsset> {
        self.groups_by_uuid.get(&uuid)
    }

    /// The campaign events attached to a group, empty for groups without
    /// campaigns.
    pub fn campaign_events_for_group(&self, group_uuid: Uuid) -> &[CampaignEventAsset] {
        self.campaign_events_by_group
            .get(&group_uuid)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
