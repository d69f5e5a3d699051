// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Bulk session interruption.
//!
//! Lifecycle changes outside a session (a contact blocked, a channel
//! deleted, a flow archived) force its waiting execution to the Interrupted
//! terminal state. Each selector is atomic per call: the session update runs
//! first and returns the matched ids, then those sessions' active and
//! waiting runs are closed in a second statement inside the same
//! transaction. Only Waiting sessions are ever touched; Completed sessions
//! stay as they are even when a selector matches them.

use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use crate::error::Result;
use crate::ids::{ChannelID, ContactID, FlowID, SessionID};
use crate::status::FlowType;
use crate::PgTransaction;

const INTERRUPT_SESSIONS_FOR_CONTACTS_SQL: &str = r#"
UPDATE flows_flowsession
SET status = 'I', ended_on = $2, wait_started_on = NULL, wait_expires_on = NULL,
    timeout_on = NULL, current_flow_id = NULL
WHERE status = 'W' AND contact_id = ANY($1)
RETURNING id
"#;

const INTERRUPT_SESSIONS_OF_TYPE_FOR_CONTACTS_SQL: &str = r#"
UPDATE flows_flowsession
SET status = 'I', ended_on = $2, wait_started_on = NULL, wait_expires_on = NULL,
    timeout_on = NULL, current_flow_id = NULL
WHERE status = 'W' AND contact_id = ANY($1) AND session_type = $3
RETURNING id
"#;

const INTERRUPT_SESSIONS_FOR_CHANNELS_SQL: &str = r#"
UPDATE flows_flowsession
SET status = 'I', ended_on = $2, wait_started_on = NULL, wait_expires_on = NULL,
    timeout_on = NULL, current_flow_id = NULL
WHERE status = 'W' AND connection_id IN
      (SELECT id FROM channels_channelconnection WHERE channel_id = ANY($1))
RETURNING id
"#;

const INTERRUPT_SESSIONS_FOR_FLOWS_SQL: &str = r#"
UPDATE flows_flowsession
SET status = 'I', ended_on = $2, wait_started_on = NULL, wait_expires_on = NULL,
    timeout_on = NULL, current_flow_id = NULL
WHERE status = 'W' AND current_flow_id = ANY($1)
RETURNING id
"#;

const INTERRUPT_SESSION_RUNS_SQL: &str = r#"
UPDATE flows_flowrun
SET status = 'I', exited_on = $2, is_active = FALSE, exit_type = 'I', modified_on = $2
WHERE session_id = ANY($1) AND status IN ('A', 'W')
"#;

/// Closes the still-open runs of the given interrupted sessions. Must run
/// after the session update within the same transaction.
async fn interrupt_session_runs(
    tx: &mut PgTransaction<'_>,
    session_ids: &[SessionID],
    now: DateTime<Utc>,
) -> Result<()> {
    if session_ids.is_empty() {
        return Ok(());
    }

    sqlx::query(INTERRUPT_SESSION_RUNS_SQL)
        .bind(session_ids)
        .bind(now)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

/// Interrupts all waiting sessions for the given contacts, across all
/// session types.
#[instrument(skip(tx, contact_ids), fields(count = contact_ids.len()))]
pub async fn interrupt_sessions_for_contacts(
    tx: &mut PgTransaction<'_>,
    contact_ids: &[ContactID],
    now: DateTime<Utc>,
) -> Result<()> {
    if contact_ids.is_empty() {
        return Ok(());
    }

    let session_ids: Vec<SessionID> = sqlx::query_scalar(INTERRUPT_SESSIONS_FOR_CONTACTS_SQL)
        .bind(contact_ids)
        .bind(now)
        .fetch_all(&mut **tx)
        .await?;

    debug!(sessions = session_ids.len(), "interrupted sessions for contacts");

    interrupt_session_runs(tx, &session_ids, now).await
}

/// Interrupts waiting sessions of one type for the given contacts, leaving
/// sessions of other types (e.g. an in-progress voice call) untouched.
#[instrument(skip(tx, contact_ids), fields(count = contact_ids.len(), session_type = session_type.as_code()))]
pub async fn interrupt_sessions_of_type_for_contacts(
    tx: &mut PgTransaction<'_>,
    contact_ids: &[ContactID],
    session_type: FlowType,
    now: DateTime<Utc>,
) -> Result<()> {
    if contact_ids.is_empty() {
        return Ok(());
    }

    let session_ids: Vec<SessionID> =
        sqlx::query_scalar(INTERRUPT_SESSIONS_OF_TYPE_FOR_CONTACTS_SQL)
            .bind(contact_ids)
            .bind(now)
            .bind(session_type)
            .fetch_all(&mut **tx)
            .await?;

    debug!(sessions = session_ids.len(), "interrupted sessions of type for contacts");

    interrupt_session_runs(tx, &session_ids, now).await
}

/// Interrupts waiting sessions whose connection is on any of the given
/// channels, messaging and voice alike.
#[instrument(skip(tx, channel_ids), fields(count = channel_ids.len()))]
pub async fn interrupt_sessions_for_channels(
    tx: &mut PgTransaction<'_>,
    channel_ids: &[ChannelID],
    now: DateTime<Utc>,
) -> Result<()> {
    if channel_ids.is_empty() {
        return Ok(());
    }

    let session_ids: Vec<SessionID> = sqlx::query_scalar(INTERRUPT_SESSIONS_FOR_CHANNELS_SQL)
        .bind(channel_ids)
        .bind(now)
        .fetch_all(&mut **tx)
        .await?;

    debug!(sessions = session_ids.len(), "interrupted sessions for channels");

    interrupt_session_runs(tx, &session_ids, now).await
}

/// Interrupts waiting sessions currently in any of the given flows.
#[instrument(skip(tx, flow_ids), fields(count = flow_ids.len()))]
pub async fn interrupt_sessions_for_flows(
    tx: &mut PgTransaction<'_>,
    flow_ids: &[FlowID],
    now: DateTime<Utc>,
) -> Result<()> {
    if flow_ids.is_empty() {
        return Ok(());
    }

    let session_ids: Vec<SessionID> = sqlx::query_scalar(INTERRUPT_SESSIONS_FOR_FLOWS_SQL)
        .bind(flow_ids)
        .bind(now)
        .fetch_all(&mut **tx)
        .await?;

    debug!(sessions = session_ids.len(), "interrupted sessions for flows");

    interrupt_session_runs(tx, &session_ids, now).await
}
