// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Persisted run records.
//!
//! One run row exists per frame entered during a session's lifetime; runs
//! are created on flow entry and never deleted. All runs emitted by a sprint
//! insert in a single statement; updates to already-persisted runs are
//! likewise batched.

use chrono::{DateTime, Utc};
use flowline_engine as engine;
use sqlx::PgPool;

use crate::assets::OrgAssets;
use crate::error::Result;
use crate::ids::{ConnectionID, ContactID, FlowID, OrgID, RunID, SessionID, StartID};
use crate::sessions::Session;
use crate::status::{ExitType, FlowType, RunStatus};
use crate::PgTransaction;

// Postgres caps binds per statement at 65535; stay well under it.
const INSERT_CHUNK: usize = 1000;

/// A persisted run: one frame of a session's call stack.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FlowRun {
    pub(crate) id: RunID,
    pub(crate) uuid: String,
    pub(crate) status: RunStatus,
    pub(crate) is_active: bool,
    pub(crate) exit_type: Option<ExitType>,
    pub(crate) created_on: DateTime<Utc>,
    pub(crate) modified_on: DateTime<Utc>,
    pub(crate) exited_on: Option<DateTime<Utc>>,
    pub(crate) expires_on: Option<DateTime<Utc>>,
    pub(crate) responded: bool,
    pub(crate) results: String,
    pub(crate) path: String,
    pub(crate) current_node_uuid: Option<String>,
    pub(crate) contact_id: ContactID,
    pub(crate) flow_id: FlowID,
    pub(crate) org_id: OrgID,
    pub(crate) parent_uuid: Option<String>,
    pub(crate) session_id: SessionID,
    pub(crate) start_id: Option<StartID>,
    pub(crate) connection_id: Option<ConnectionID>,
}

impl FlowRun {
    /// Database id, zero until inserted.
    pub fn id(&self) -> RunID {
        self.id
    }

    /// The engine run's UUID.
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// Current status.
    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// The session that owns this run.
    pub fn session_id(&self) -> SessionID {
        self.session_id
    }

    /// When this run was last modified.
    pub fn modified_on(&self) -> DateTime<Utc> {
        self.modified_on
    }

    /// Builds a record from an engine run belonging to the given session.
    ///
    /// Resolves the flow id from the engine run's flow reference, marks the
    /// run responded if it observed a received message, and mirrors the
    /// session's connection. The session id is carried from the owning
    /// session record and may still be the pre-insert placeholder.
    pub(crate) fn from_engine(
        org: &OrgAssets,
        session: &Session,
        fr: &engine::Run,
        now: DateTime<Utc>,
    ) -> Result<FlowRun> {
        let flow_id = org.flow_id_for_uuid(fr.flow.uuid)?;
        let status = RunStatus::from_engine(fr.status);

        Ok(FlowRun {
            id: RunID(0),
            uuid: fr.uuid.to_string(),
            status,
            is_active: status.is_active(),
            exit_type: status.exit_type(),
            created_on: fr.created_on,
            modified_on: now,
            exited_on: fr.exited_on,
            expires_on: fr.expires_on,
            responded: fr.received_input(),
            results: serde_json::to_string(&fr.results)?,
            path: serde_json::to_string(&fr.path)?,
            current_node_uuid: fr.path.last().map(|s| s.node_uuid.to_string()),
            contact_id: session.contact_id(),
            flow_id,
            org_id: org.org_id(),
            parent_uuid: fr.parent_uuid.map(|u| u.to_string()),
            session_id: session.id(),
            start_id: None,
            connection_id: session.connection_id(),
        })
    }
}

/// Inserts the given runs in batches, assigning their returned ids.
pub(crate) async fn insert_runs(tx: &mut PgTransaction<'_>, runs: &mut [FlowRun]) -> Result<()> {
    for chunk in runs.chunks_mut(INSERT_CHUNK) {
        let mut qb = sqlx::QueryBuilder::<sqlx::Postgres>::new(
            r#"INSERT INTO flows_flowrun (uuid, status, is_active, exit_type, created_on, modified_on,
               exited_on, expires_on, responded, results, path, current_node_uuid, contact_id,
               flow_id, org_id, session_id, start_id, parent_uuid, connection_id) "#,
        );
        qb.push_values(chunk.iter(), |mut b, r| {
            b.push_bind(&r.uuid)
                .push_bind(r.status)
                .push_bind(r.is_active)
                .push_bind(r.exit_type)
                .push_bind(r.created_on)
                .push_bind(r.modified_on)
                .push_bind(r.exited_on)
                .push_bind(r.expires_on)
                .push_bind(r.responded)
                .push_bind(&r.results)
                .push_bind(&r.path)
                .push_bind(&r.current_node_uuid)
                .push_bind(r.contact_id)
                .push_bind(r.flow_id)
                .push_bind(r.org_id)
                .push_bind(r.session_id)
                .push_bind(r.start_id)
                .push_bind(&r.parent_uuid)
                .push_bind(r.connection_id);
        });
        qb.push(" RETURNING id");

        let ids: Vec<(RunID,)> = qb.build_query_as().fetch_all(&mut **tx).await?;
        for (run, (id,)) in chunk.iter_mut().zip(ids) {
            run.id = id;
        }
    }

    Ok(())
}

const UPDATE_RUNS_SQL: &str = r#"
UPDATE flows_flowrun r SET
    status = u.status,
    is_active = u.is_active,
    exit_type = u.exit_type,
    exited_on = u.exited_on,
    expires_on = u.expires_on,
    responded = r.responded OR u.responded,
    results = u.results,
    path = u.path,
    current_node_uuid = u.current_node_uuid,
    modified_on = $1
FROM (
    SELECT unnest($2::text[]) AS uuid,
           unnest($3::text[]) AS status,
           unnest($4::bool[]) AS is_active,
           unnest($5::text[]) AS exit_type,
           unnest($6::timestamptz[]) AS exited_on,
           unnest($7::timestamptz[]) AS expires_on,
           unnest($8::bool[]) AS responded,
           unnest($9::text[]) AS results,
           unnest($10::text[]) AS path,
           unnest($11::text[]) AS current_node_uuid
) u
WHERE r.uuid = u.uuid
"#;

/// Updates already-persisted runs in one statement. `responded` is sticky:
/// a run that has responded never unbecomes so.
pub(crate) async fn update_runs(
    tx: &mut PgTransaction<'_>,
    runs: &[FlowRun],
    now: DateTime<Utc>,
) -> Result<()> {
    if runs.is_empty() {
        return Ok(());
    }

    let uuids: Vec<&str> = runs.iter().map(|r| r.uuid.as_str()).collect();
    let statuses: Vec<RunStatus> = runs.iter().map(|r| r.status).collect();
    let is_actives: Vec<bool> = runs.iter().map(|r| r.is_active).collect();
    let exit_types: Vec<Option<ExitType>> = runs.iter().map(|r| r.exit_type).collect();
    let exited_ons: Vec<Option<DateTime<Utc>>> = runs.iter().map(|r| r.exited_on).collect();
    let expires_ons: Vec<Option<DateTime<Utc>>> = runs.iter().map(|r| r.expires_on).collect();
    let respondeds: Vec<bool> = runs.iter().map(|r| r.responded).collect();
    let results: Vec<&str> = runs.iter().map(|r| r.results.as_str()).collect();
    let paths: Vec<&str> = runs.iter().map(|r| r.path.as_str()).collect();
    let nodes: Vec<Option<&str>> = runs.iter().map(|r| r.current_node_uuid.as_deref()).collect();

    sqlx::query(UPDATE_RUNS_SQL)
        .bind(now)
        .bind(uuids)
        .bind(statuses)
        .bind(is_actives)
        .bind(exit_types)
        .bind(exited_ons)
        .bind(expires_ons)
        .bind(respondeds)
        .bind(results)
        .bind(paths)
        .bind(nodes)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

/// Looks up the wait expiration for a run, returning None if the run is no
/// longer waiting.
pub async fn run_expiration(db: &PgPool, run_id: RunID) -> Result<Option<DateTime<Utc>>> {
    let row: Option<(Option<DateTime<Utc>>,)> =
        sqlx::query_as(r#"SELECT expires_on FROM flows_flowrun WHERE id = $1 AND status = 'W'"#)
            .bind(run_id)
            .fetch_optional(db)
            .await?;

    Ok(row.and_then(|r| r.0))
}

/// Returns the contact ids among those passed in that have a waiting session
/// in a flow of the given type. Background flows check against messaging
/// flows, since a background flow can never itself be waiting.
pub async fn active_session_overlap(
    db: &PgPool,
    flow_type: FlowType,
    contact_ids: &[ContactID],
) -> Result<Vec<ContactID>> {
    let flow_type = match flow_type {
        FlowType::Background => FlowType::Messaging,
        other => other,
    };

    let overlap = sqlx::query_scalar::<_, ContactID>(
        r#"
        SELECT DISTINCT(fs.contact_id)
        FROM flows_flowsession fs
        JOIN flows_flow ff ON fs.current_flow_id = ff.id
        WHERE fs.status = 'W' AND ff.is_active = TRUE AND ff.is_archived = FALSE
          AND ff.flow_type = $1 AND fs.contact_id = ANY($2)
        "#,
    )
    .bind(flow_type)
    .bind(contact_ids)
    .fetch_all(db)
    .await?;

    Ok(overlap)
}

/// Returns the contact ids among those passed in that have ever run the
/// given flow.
pub async fn flow_started_overlap(
    db: &PgPool,
    flow_id: FlowID,
    contact_ids: &[ContactID],
) -> Result<Vec<ContactID>> {
    let overlap = sqlx::query_scalar::<_, ContactID>(
        r#"
        SELECT DISTINCT(contact_id)
        FROM flows_flowrun
        WHERE contact_id = ANY($1) AND flow_id = $2
        "#,
    )
    .bind(contact_ids)
    .bind(flow_id)
    .fetch_all(db)
    .await?;

    Ok(overlap)
}
