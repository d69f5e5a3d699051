// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for flowline-core integration tests.
//!
//! Provides TestContext for setting up a clean database, seed data helpers
//! mirroring a small fixed roster of contacts/flows/channels, and builders
//! for the engine snapshots the write paths consume.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use flowline_core::assets::OrgAssets;
use flowline_core::config::Config;
use flowline_core::sessions::{Session, SessionCommitHook};
use flowline_core::{
    ChannelID, ConnectionID, ContactID, FlowID, GroupID, OrgID, PgTransaction, Runtime, RunID,
    SessionID,
};
use flowline_engine as engine;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub const ORG: OrgID = OrgID(1);

/// Test context that manages a database pool and runtime handles.
pub struct TestContext {
    pub pool: PgPool,
    pub rt: Runtime,
}

impl TestContext {
    /// Create a new test context from TEST_DATABASE_URL, run migrations and
    /// wipe all data so every test starts from a clean database.
    pub async fn new() -> Option<Self> {
        let database_url = std::env::var("TEST_DATABASE_URL").ok()?;

        let pool = PgPool::connect(&database_url).await.ok()?;
        MIGRATOR.run(&pool).await.ok()?;

        let config = Config {
            database_url: database_url.clone(),
            redis_url: std::env::var("TEST_REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379/15".to_string()),
            courier_default_tps: 10,
        };
        let redis = redis::Client::open(config.redis_url.as_str()).ok()?;
        let rt = Runtime::with_handles(pool.clone(), redis, config);

        let ctx = Self { pool, rt };
        ctx.reset().await;
        Some(ctx)
    }

    /// Delete all rows, respecting foreign keys.
    pub async fn reset(&self) {
        for table in [
            "campaigns_eventfire",
            "campaigns_campaignevent",
            "flows_flowrun",
            "flows_flowsession",
            "channels_channelconnection",
            "channels_channel",
            "flows_flow",
            "contacts_contacturn",
            "contacts_contactgroup_contacts",
            "contacts_contactgroup",
            "contacts_contact",
        ] {
            sqlx::query(&format!("DELETE FROM {table}"))
                .execute(&self.pool)
                .await
                .expect("failed to reset table");
        }
    }

    pub async fn org_assets(&self) -> OrgAssets {
        OrgAssets::load(&self.pool, ORG)
            .await
            .expect("failed to load org assets")
    }

    pub async fn begin(&self) -> PgTransaction<'static> {
        self.pool.begin().await.expect("failed to begin transaction")
    }

    // ========================================================================
    // Seed data
    // ========================================================================

    pub async fn insert_contact(&self, name: &str) -> Contact {
        let uuid = Uuid::new_v4();
        let id: ContactID = sqlx::query_scalar(
            r#"INSERT INTO contacts_contact (org_id, uuid, name) VALUES ($1, $2, $3) RETURNING id"#,
        )
        .bind(ORG)
        .bind(uuid)
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .expect("failed to insert contact");

        Contact { id, uuid }
    }

    pub async fn insert_flow(&self, name: &str, flow_type: &str) -> Flow {
        let uuid = Uuid::new_v4();
        let id: FlowID = sqlx::query_scalar(
            r#"INSERT INTO flows_flow (org_id, uuid, name, flow_type) VALUES ($1, $2, $3, $4) RETURNING id"#,
        )
        .bind(ORG)
        .bind(uuid)
        .bind(name)
        .bind(flow_type)
        .fetch_one(&self.pool)
        .await
        .expect("failed to insert flow");

        Flow {
            id,
            uuid,
            name: name.to_string(),
        }
    }

    pub async fn insert_group(&self, name: &str) -> (GroupID, Uuid) {
        let uuid = Uuid::new_v4();
        let id: GroupID = sqlx::query_scalar(
            r#"INSERT INTO contacts_contactgroup (org_id, uuid, name) VALUES ($1, $2, $3) RETURNING id"#,
        )
        .bind(ORG)
        .bind(uuid)
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .expect("failed to insert group");

        (id, uuid)
    }

    pub async fn insert_campaign_event(&self, group_id: GroupID, offset_minutes: i64) -> i64 {
        sqlx::query_scalar(
            r#"INSERT INTO campaigns_campaignevent (org_id, group_id, offset_minutes) VALUES ($1, $2, $3) RETURNING id"#,
        )
        .bind(ORG)
        .bind(group_id)
        .bind(offset_minutes)
        .fetch_one(&self.pool)
        .await
        .expect("failed to insert campaign event")
    }

    pub async fn insert_channel(&self, name: &str) -> (ChannelID, Uuid) {
        let uuid = Uuid::new_v4();
        let id: ChannelID = sqlx::query_scalar(
            r#"INSERT INTO channels_channel (org_id, uuid, name) VALUES ($1, $2, $3) RETURNING id"#,
        )
        .bind(ORG)
        .bind(uuid)
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .expect("failed to insert channel");

        (id, uuid)
    }

    pub async fn insert_connection(
        &self,
        channel_id: ChannelID,
        contact_id: ContactID,
    ) -> ConnectionID {
        sqlx::query_scalar(
            r#"INSERT INTO channels_channelconnection (org_id, channel_id, contact_id) VALUES ($1, $2, $3) RETURNING id"#,
        )
        .bind(ORG)
        .bind(channel_id)
        .bind(contact_id)
        .fetch_one(&self.pool)
        .await
        .expect("failed to insert connection")
    }

    /// Insert a session row and one run with the same status, seeding the
    /// status matrices the selector tests start from, including states the
    /// write path only reaches over several sprints (already Completed,
    /// already Interrupted).
    pub async fn insert_session_and_run(
        &self,
        contact: &Contact,
        session_type: &str,
        status: &str,
        flow: &Flow,
        connection_id: Option<ConnectionID>,
    ) -> (SessionID, RunID) {
        let now = Utc::now();
        let waiting = status == "W";

        let session_id: SessionID = sqlx::query_scalar(
            r#"
            INSERT INTO flows_flowsession (uuid, session_type, status, responded, output, contact_id,
                org_id, created_on, ended_on, current_flow_id, connection_id, wait_started_on,
                wait_expires_on, wait_resume_on_expire, timeout_on)
            VALUES ($1, $2, $3, FALSE, '', $4, $5, $6, $7, $8, $9, $10, $11, FALSE, NULL)
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(session_type)
        .bind(status)
        .bind(contact.id)
        .bind(ORG)
        .bind(now)
        .bind(if waiting { None } else { Some(now) })
        .bind(if waiting { Some(flow.id) } else { None })
        .bind(connection_id)
        .bind(if waiting { Some(now) } else { None })
        .bind(if waiting {
            Some(now + Duration::days(7))
        } else {
            None
        })
        .fetch_one(&self.pool)
        .await
        .expect("failed to insert session");

        let active = status == "A" || status == "W";
        let run_id: RunID = sqlx::query_scalar(
            r#"
            INSERT INTO flows_flowrun (uuid, status, is_active, exit_type, created_on, modified_on,
                exited_on, responded, results, path, contact_id, flow_id, org_id, session_id, connection_id)
            VALUES ($1, $2, $3, $4, $5, $5, $6, FALSE, '{}', '[]', $7, $8, $9, $10, $11)
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(status)
        .bind(active)
        .bind(if active { None } else { Some("C") })
        .bind(now)
        .bind(if active { None } else { Some(now) })
        .bind(contact.id)
        .bind(flow.id)
        .bind(ORG)
        .bind(session_id)
        .bind(connection_id)
        .fetch_one(&self.pool)
        .await
        .expect("failed to insert run");

        (session_id, run_id)
    }

    // ========================================================================
    // Assertions
    // ========================================================================

    pub async fn session_status(&self, session_id: SessionID) -> String {
        sqlx::query_scalar(r#"SELECT status FROM flows_flowsession WHERE id = $1"#)
            .bind(session_id)
            .fetch_one(&self.pool)
            .await
            .expect("failed to select session status")
    }

    pub async fn assert_session_and_run_status(&self, session_id: SessionID, status: &str) {
        assert_eq!(self.session_status(session_id).await, status);

        let run_statuses: Vec<String> =
            sqlx::query_scalar(r#"SELECT status FROM flows_flowrun WHERE session_id = $1"#)
                .bind(session_id)
                .fetch_all(&self.pool)
                .await
                .expect("failed to select run statuses");
        assert!(!run_statuses.is_empty());
        for run_status in run_statuses {
            assert_eq!(run_status, status);
        }
    }

    /// Count sessions whose terminal columns are fully cleared.
    pub async fn count_cleanly_ended(&self, session_id: SessionID) -> i64 {
        sqlx::query_scalar(
            r#"
            SELECT count(*) FROM flows_flowsession
            WHERE ended_on IS NOT NULL AND wait_started_on IS NULL AND wait_expires_on IS NULL
              AND timeout_on IS NULL AND current_flow_id IS NULL AND id = $1
            "#,
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .expect("failed to count sessions")
    }
}

/// Helper macro to skip tests if TEST_DATABASE_URL is not set.
#[macro_export]
macro_rules! skip_if_no_db {
    () => {
        if std::env::var("TEST_DATABASE_URL").is_err() {
            eprintln!("Skipping test: TEST_DATABASE_URL not set");
            return;
        }
    };
}

/// The current time truncated to microseconds, the precision Postgres
/// stores, so values read back compare equal.
pub fn now_micros() -> DateTime<Utc> {
    DateTime::from_timestamp_micros(Utc::now().timestamp_micros()).unwrap()
}

/// A seeded contact.
#[derive(Debug, Clone, Copy)]
pub struct Contact {
    pub id: ContactID,
    pub uuid: Uuid,
}

/// A seeded flow.
#[derive(Debug, Clone)]
pub struct Flow {
    pub id: FlowID,
    pub uuid: Uuid,
    pub name: String,
}

impl Flow {
    pub fn reference(&self) -> engine::FlowRef {
        engine::FlowRef {
            uuid: self.uuid,
            name: self.name.clone(),
        }
    }
}

// ============================================================================
// Engine snapshot builders
// ============================================================================

pub fn engine_contact(contact: &Contact, name: &str) -> engine::Contact {
    engine::Contact {
        uuid: contact.uuid,
        id: contact.id.0,
        name: name.to_string(),
        language: None,
        urns: vec!["tel:+593979123456".to_string()],
    }
}

pub fn make_step(exit: bool) -> engine::Step {
    engine::Step {
        uuid: Uuid::new_v4(),
        node_uuid: Uuid::new_v4(),
        arrived_on: Utc::now(),
        exit_uuid: exit.then(Uuid::new_v4),
    }
}

pub fn make_run(
    flow: &Flow,
    status: engine::RunStatus,
    parent_uuid: Option<Uuid>,
    events: Vec<engine::Event>,
) -> engine::Run {
    let now = Utc::now();
    let terminal = status.is_terminal();
    engine::Run {
        uuid: Uuid::new_v4(),
        flow: flow.reference(),
        status,
        parent_uuid,
        path: vec![make_step(true), make_step(false)],
        results: BTreeMap::new(),
        events,
        created_on: now,
        modified_on: now,
        exited_on: terminal.then_some(now),
        expires_on: (status == engine::RunStatus::Waiting)
            .then(|| now + Duration::days(7)),
    }
}

pub fn make_session(
    session_type: engine::FlowType,
    status: engine::SessionStatus,
    contact: engine::Contact,
    runs: Vec<engine::Run>,
    wait: Option<engine::Wait>,
) -> engine::Session {
    engine::Session {
        uuid: Uuid::new_v4(),
        session_type,
        status,
        contact,
        connection_id: None,
        runs,
        wait,
    }
}

pub fn msg_created(channel: Option<(Uuid, &str)>, text: &str) -> engine::Event {
    engine::Event::MsgCreated {
        created_on: Utc::now(),
        msg: engine::MsgOut {
            uuid: Uuid::new_v4(),
            urn: Some("tel:+593979123456".to_string()),
            channel: channel.map(|(uuid, name)| engine::ChannelRef {
                uuid,
                name: name.to_string(),
            }),
            text: text.to_string(),
            attachments: vec![],
        },
    }
}

pub fn msg_received(text: &str) -> engine::Event {
    engine::Event::MsgReceived {
        created_on: Utc::now(),
        msg: engine::MsgIn {
            uuid: Uuid::new_v4(),
            urn: Some("tel:+593979123456".to_string()),
            channel: None,
            text: text.to_string(),
        },
    }
}

// ============================================================================
// Hooks
// ============================================================================

/// Pre-commit hook that counts its invocations.
#[derive(Default)]
pub struct CountingHook {
    pub calls: AtomicUsize,
}

impl CountingHook {
    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SessionCommitHook for CountingHook {
    async fn execute(
        &self,
        _rt: &Runtime,
        _tx: &mut PgTransaction<'_>,
        _org: &OrgAssets,
        _sessions: &[Session],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Pre-commit hook that always fails, to prove the transaction aborts.
pub struct FailingHook;

#[async_trait::async_trait]
impl SessionCommitHook for FailingHook {
    async fn execute(
        &self,
        _rt: &Runtime,
        _tx: &mut PgTransaction<'_>,
        _org: &OrgAssets,
        _sessions: &[Session],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Err("hook refused".into())
    }
}
