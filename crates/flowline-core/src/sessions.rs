// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Persisted session records and the sprint write paths.
//!
//! A session is the per-contact aggregate of one flow execution: its status,
//! wait fields, current flow and serialized engine state, owning a set of
//! run frames. [`write_sessions`] persists freshly started executions;
//! [`Session::update`] advances an existing one by a resume sprint. Both run
//! inside a caller-owned transaction: every row write and pre-commit effect
//! of one sprint becomes visible together or not at all.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use flowline_engine as engine;
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use crate::assets::OrgAssets;
use crate::error::{CoreError, Result};
use crate::hooks::Effects;
use crate::ids::{ConnectionID, ContactID, FlowID, OrgID, SessionID, StartID};
use crate::post_commit::PostCommit;
use crate::runs::{self, FlowRun};
use crate::runtime::Runtime;
use crate::status::{FlowType, SessionStatus};
use crate::PgTransaction;

/// A caller-supplied hook invoked once per write or update call, inside the
/// transaction, after all bulk writes and event pre-commit effects. Returning
/// an error aborts the transaction.
#[async_trait]
pub trait SessionCommitHook: Send + Sync {
    /// Runs the hook against the freshly written session records.
    async fn execute(
        &self,
        rt: &Runtime,
        tx: &mut PgTransaction<'_>,
        org: &OrgAssets,
        sessions: &[Session],
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// A persisted session: one contact's flow execution.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Session {
    pub(crate) id: SessionID,
    pub(crate) uuid: String,
    pub(crate) session_type: FlowType,
    pub(crate) status: SessionStatus,
    pub(crate) responded: bool,
    pub(crate) output: String,
    pub(crate) contact_id: ContactID,
    pub(crate) org_id: OrgID,
    pub(crate) created_on: DateTime<Utc>,
    pub(crate) ended_on: Option<DateTime<Utc>>,
    pub(crate) current_flow_id: Option<FlowID>,
    pub(crate) connection_id: Option<ConnectionID>,
    pub(crate) wait_started_on: Option<DateTime<Utc>>,
    pub(crate) wait_expires_on: Option<DateTime<Utc>>,
    pub(crate) wait_resume_on_expire: bool,
    pub(crate) timeout_on: Option<DateTime<Utc>>,
}

impl Session {
    /// Database id, zero until inserted.
    pub fn id(&self) -> SessionID {
        self.id
    }

    /// The engine session's UUID.
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// The type of flows this session runs.
    pub fn session_type(&self) -> FlowType {
        self.session_type
    }

    /// Current status.
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// The contact this session runs for.
    pub fn contact_id(&self) -> ContactID {
        self.contact_id
    }

    /// The owning organization.
    pub fn org_id(&self) -> OrgID {
        self.org_id
    }

    /// The flow the session is currently waiting in, None once terminal.
    pub fn current_flow_id(&self) -> Option<FlowID> {
        self.current_flow_id
    }

    /// The channel connection driving this session, voice sessions only.
    pub fn connection_id(&self) -> Option<ConnectionID> {
        self.connection_id
    }

    /// True once the contact has sent a message during this session. Sticky.
    pub fn responded(&self) -> bool {
        self.responded
    }

    /// When the session was created.
    pub fn created_on(&self) -> DateTime<Utc> {
        self.created_on
    }

    /// When the session reached a terminal status.
    pub fn ended_on(&self) -> Option<DateTime<Utc>> {
        self.ended_on
    }

    /// When the current wait began.
    pub fn wait_started_on(&self) -> Option<DateTime<Utc>> {
        self.wait_started_on
    }

    /// When the current wait expires.
    pub fn wait_expires_on(&self) -> Option<DateTime<Utc>> {
        self.wait_expires_on
    }

    /// Whether wait expiry should resume to the parent run rather than end
    /// the session; true iff the waiting run has a parent frame.
    pub fn wait_resume_on_expire(&self) -> bool {
        self.wait_resume_on_expire
    }

    /// When the current wait times out and continues down its timeout exit.
    pub fn timeout(&self) -> Option<DateTime<Utc>> {
        self.timeout_on
    }

    /// Rehydrates the engine session from the stored output blob.
    pub fn flow_session(&self) -> Result<engine::Session> {
        if self.output.is_empty() {
            return Err(CoreError::SessionDeserialization {
                session_uuid: self.uuid_value(),
                reason: "session has no stored output".to_string(),
            });
        }

        serde_json::from_str(&self.output).map_err(|e| CoreError::SessionDeserialization {
            session_uuid: self.uuid_value(),
            reason: e.to_string(),
        })
    }

    fn uuid_value(&self) -> Uuid {
        Uuid::parse_str(&self.uuid).unwrap_or(Uuid::nil())
    }

    /// Recomputes the columns derived from the engine's post-sprint state:
    /// status, current flow, connection, wait fields, ended_on and the
    /// output blob. `wait_resume_on_expire` is recomputed from the
    /// post-sprint waiting run, not carried over, so a sub-flow returning to
    /// a parent that then waits gets a fresh value.
    fn apply_engine_state(
        &mut self,
        org: &OrgAssets,
        fs: &engine::Session,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let status = SessionStatus::from_engine(fs.status).ok_or_else(|| {
            CoreError::validation(format!(
                "engine session '{}' is still active and cannot be persisted",
                fs.uuid
            ))
        })?;

        self.status = status;
        self.output = serde_json::to_string(fs)?;
        // voice sessions carry the call's connection id in the snapshot; it
        // survives rehydration, so resumes keep it without extra plumbing
        self.connection_id = fs.connection_id.map(ConnectionID);

        if status == SessionStatus::Waiting {
            let waiting = fs.waiting_run().ok_or_else(|| {
                CoreError::validation(format!(
                    "waiting session '{}' has no waiting run",
                    fs.uuid
                ))
            })?;

            self.current_flow_id = Some(org.flow_id_for_uuid(waiting.flow.uuid)?);
            self.wait_started_on = Some(now);
            self.wait_expires_on = fs.wait.as_ref().and_then(|w| w.expires_on);
            self.timeout_on = fs
                .wait
                .as_ref()
                .and_then(|w| w.timeout_seconds)
                .map(|s| now + Duration::seconds(s));
            self.wait_resume_on_expire = waiting.parent_uuid.is_some();
            self.ended_on = None;
        } else {
            self.current_flow_id = None;
            self.wait_started_on = None;
            self.wait_expires_on = None;
            self.timeout_on = None;
            self.wait_resume_on_expire = false;
            self.ended_on = Some(now);
        }

        Ok(())
    }

    /// Builds a new record from an engine session produced by a trigger.
    /// `responded` always starts false; received messages only mark runs at
    /// creation time.
    fn from_engine(org: &OrgAssets, fs: &engine::Session, now: DateTime<Utc>) -> Result<Session> {
        let mut session = Session {
            id: SessionID(0),
            uuid: fs.uuid.to_string(),
            session_type: fs.session_type.into(),
            status: SessionStatus::Failed,
            responded: false,
            output: String::new(),
            contact_id: ContactID(fs.contact.id),
            org_id: org.org_id(),
            created_on: now,
            ended_on: None,
            current_flow_id: None,
            connection_id: None,
            wait_started_on: None,
            wait_expires_on: None,
            wait_resume_on_expire: false,
            timeout_on: None,
        };
        session.apply_engine_state(org, fs, now)?;
        Ok(session)
    }

    /// Advances this session with the sprint produced by resuming it.
    ///
    /// Recomputes the session columns from the engine's post-sprint state,
    /// inserts runs created this sprint, bulk-updates already-persisted
    /// runs, applies event effects, and runs the caller hook, all within the
    /// passed transaction. Rejected with an illegal-transition error when
    /// the persisted status is already terminal.
    #[instrument(skip_all, fields(session_id = %self.id, session_uuid = %self.uuid))]
    pub async fn update(
        &mut self,
        rt: &Runtime,
        tx: &mut PgTransaction<'_>,
        org: &OrgAssets,
        fs: &engine::Session,
        sprint: &engine::Sprint,
        hook: Option<&dyn SessionCommitHook>,
        now: DateTime<Utc>,
    ) -> Result<PostCommit> {
        if self.status.is_terminal() {
            return Err(CoreError::IllegalTransition {
                session_uuid: self.uuid_value(),
                status: self.status.as_code(),
            });
        }

        self.apply_engine_state(org, fs, now)?;

        // once a contact has responded they stay responded
        self.responded = self.responded || sprint.received_input();

        // partition the engine's runs into new vs already persisted
        let existing: HashSet<String> =
            sqlx::query_scalar(r#"SELECT uuid FROM flows_flowrun WHERE session_id = $1"#)
                .bind(self.id)
                .fetch_all(&mut **tx)
                .await?
                .into_iter()
                .collect();

        let mut new_runs = Vec::new();
        let mut updated_runs = Vec::new();
        for fr in &fs.runs {
            let run = FlowRun::from_engine(org, self, fr, now)?;
            if existing.contains(&run.uuid) {
                updated_runs.push(run);
            } else {
                new_runs.push(run);
            }
        }

        runs::insert_runs(tx, &mut new_runs).await?;
        runs::update_runs(tx, &updated_runs, now).await?;

        sqlx::query(
            r#"
            UPDATE flows_flowsession
            SET status = $2, responded = $3, current_flow_id = $4, output = $5, ended_on = $6,
                wait_started_on = $7, wait_expires_on = $8, wait_resume_on_expire = $9, timeout_on = $10
            WHERE id = $1
            "#,
        )
        .bind(self.id)
        .bind(self.status)
        .bind(self.responded)
        .bind(self.current_flow_id)
        .bind(&self.output)
        .bind(self.ended_on)
        .bind(self.wait_started_on)
        .bind(self.wait_expires_on)
        .bind(self.wait_resume_on_expire)
        .bind(self.timeout_on)
        .execute(&mut **tx)
        .await?;

        let mut effects = Effects::default();
        for event in &sprint.events {
            effects.apply_event(org, self, event, now);
        }
        effects.apply_pre_commit(tx, org, now).await?;

        if let Some(hook) = hook {
            hook.execute(rt, tx, org, std::slice::from_ref(self))
                .await
                .map_err(|e| CoreError::Hook {
                    details: e.to_string(),
                })?;
        }

        Ok(effects.into_post_commit())
    }
}

/// Writes a batch of freshly started executions.
///
/// `engine_sessions` and `sprints` are paired by index and must have equal
/// length. Session rows insert in one statement, their runs in another;
/// events apply through the hook pipeline in emission order; the caller
/// hook runs last inside the transaction. The returned [`PostCommit`] holds
/// the effects the caller must apply after committing.
///
/// `start_id` is recorded on each session's root run when the batch was
/// produced by a flow start.
#[instrument(skip_all, fields(org_id = %org.org_id(), count = engine_sessions.len()))]
pub async fn write_sessions(
    rt: &Runtime,
    tx: &mut PgTransaction<'_>,
    org: &OrgAssets,
    engine_sessions: &[engine::Session],
    sprints: &[engine::Sprint],
    start_id: Option<StartID>,
    hook: Option<&dyn SessionCommitHook>,
    now: DateTime<Utc>,
) -> Result<(Vec<Session>, PostCommit)> {
    if engine_sessions.len() != sprints.len() {
        return Err(CoreError::validation(format!(
            "mismatched lengths: {} engine sessions, {} sprints",
            engine_sessions.len(),
            sprints.len()
        )));
    }
    if engine_sessions.is_empty() {
        return Ok((Vec::new(), PostCommit::default()));
    }

    // build all records up front so validation failures write nothing;
    // runs reference their session by batch index until ids are known
    let mut sessions = Vec::with_capacity(engine_sessions.len());
    let mut runs_by_session = Vec::with_capacity(engine_sessions.len());
    for fs in engine_sessions {
        let session = Session::from_engine(org, fs, now)?;

        let mut session_runs = Vec::with_capacity(fs.runs.len());
        for fr in &fs.runs {
            let mut run = FlowRun::from_engine(org, &session, fr, now)?;
            if fr.parent_uuid.is_none() {
                run.start_id = start_id;
            }
            session_runs.push(run);
        }

        sessions.push(session);
        runs_by_session.push(session_runs);
    }

    insert_sessions(tx, &mut sessions).await?;

    let mut all_runs = Vec::new();
    for (session, session_runs) in sessions.iter().zip(runs_by_session) {
        for mut run in session_runs {
            run.session_id = session.id;
            all_runs.push(run);
        }
    }
    runs::insert_runs(tx, &mut all_runs).await?;

    let mut effects = Effects::default();
    for (session, sprint) in sessions.iter().zip(sprints) {
        for event in &sprint.events {
            effects.apply_event(org, session, event, now);
        }
    }
    effects.apply_pre_commit(tx, org, now).await?;

    if let Some(hook) = hook {
        hook.execute(rt, tx, org, &sessions)
            .await
            .map_err(|e| CoreError::Hook {
                details: e.to_string(),
            })?;
    }

    Ok((sessions, effects.into_post_commit()))
}

/// Inserts session rows in one statement, assigning their returned ids.
async fn insert_sessions(tx: &mut PgTransaction<'_>, sessions: &mut [Session]) -> Result<()> {
    let mut qb = sqlx::QueryBuilder::<sqlx::Postgres>::new(
        r#"INSERT INTO flows_flowsession (uuid, session_type, status, responded, output, contact_id,
           org_id, created_on, ended_on, current_flow_id, connection_id, wait_started_on,
           wait_expires_on, wait_resume_on_expire, timeout_on) "#,
    );
    qb.push_values(sessions.iter(), |mut b, s| {
        b.push_bind(&s.uuid)
            .push_bind(s.session_type)
            .push_bind(s.status)
            .push_bind(s.responded)
            .push_bind(&s.output)
            .push_bind(s.contact_id)
            .push_bind(s.org_id)
            .push_bind(s.created_on)
            .push_bind(s.ended_on)
            .push_bind(s.current_flow_id)
            .push_bind(s.connection_id)
            .push_bind(s.wait_started_on)
            .push_bind(s.wait_expires_on)
            .push_bind(s.wait_resume_on_expire)
            .push_bind(s.timeout_on);
    });
    qb.push(" RETURNING id");

    let ids: Vec<(SessionID,)> = qb.build_query_as().fetch_all(&mut **tx).await?;
    for (session, (id,)) in sessions.iter_mut().zip(ids) {
        session.id = id;
    }

    Ok(())
}

const SESSION_COLUMNS: &str = r#"id, uuid, session_type, status, responded, output, contact_id,
    org_id, created_on, ended_on, current_flow_id, connection_id, wait_started_on,
    wait_expires_on, wait_resume_on_expire, timeout_on"#;

/// Loads the waiting session for a contact of the given session type, if
/// one exists. Under the per-contact advisory lock held by the scheduler
/// there is at most one.
pub async fn active_session_for_contact(
    db: &PgPool,
    org: &OrgAssets,
    session_type: FlowType,
    contact_id: ContactID,
) -> Result<Option<Session>> {
    let sql = format!(
        r#"SELECT {SESSION_COLUMNS}
           FROM flows_flowsession
           WHERE org_id = $1 AND contact_id = $2 AND session_type = $3 AND status = 'W'
           ORDER BY created_on DESC
           LIMIT 1"#
    );

    let session = sqlx::query_as::<_, Session>(&sql)
        .bind(org.org_id())
        .bind(contact_id)
        .bind(session_type)
        .fetch_optional(db)
        .await?;

    Ok(session)
}
