// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Wait expiration.
//!
//! The task scheduler finds sessions whose `wait_expires_on` has passed and
//! whose wait is not resumable to a parent, and hands their run and session
//! ids here. Sessions with `wait_resume_on_expire` set are never expired
//! this way; they resume into their parent frame through a normal update
//! sprint instead.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, instrument};

use crate::error::Result;
use crate::ids::{RunID, SessionID};

const EXPIRE_RUNS_SQL: &str = r#"
UPDATE flows_flowrun
SET status = 'X', exited_on = $2, exit_type = 'E', is_active = FALSE, modified_on = $2
WHERE id = ANY($1)
"#;

const EXPIRE_SESSIONS_SQL: &str = r#"
UPDATE flows_flowsession
SET status = 'X', ended_on = $2, wait_started_on = NULL, wait_expires_on = NULL,
    timeout_on = NULL, current_flow_id = NULL
WHERE id = ANY($1)
"#;

/// Moves the given runs and sessions to the Expired terminal state in one
/// transaction. Only call this for runs with no parent or no way of
/// continuing.
#[instrument(skip_all, fields(runs = run_ids.len(), sessions = session_ids.len()))]
pub async fn expire_runs_and_sessions(
    db: &PgPool,
    run_ids: &[RunID],
    session_ids: &[SessionID],
    now: DateTime<Utc>,
) -> Result<()> {
    if run_ids.is_empty() {
        return Ok(());
    }

    let mut tx = db.begin().await?;

    sqlx::query(EXPIRE_RUNS_SQL)
        .bind(run_ids)
        .bind(now)
        .execute(&mut *tx)
        .await?;

    if !session_ids.is_empty() {
        sqlx::query(EXPIRE_SESSIONS_SQL)
            .bind(session_ids)
            .bind(now)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    debug!("expired runs and sessions");

    Ok(())
}
