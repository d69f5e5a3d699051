// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Engine-level status enumerations.
//!
//! These are the statuses the engine reports on its own snapshots. They are
//! distinct from the persisted single-character statuses: the backend maps
//! between the two, and some persisted statuses (Interrupted) have no engine
//! counterpart because they are produced only by backend operations.

use serde::{Deserialize, Serialize};

/// Status of an engine session after a sprint.
///
/// `Active` only ever appears mid-sprint; a session handed back to the
/// backend is either waiting or terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Session is still executing (never returned to the backend).
    Active,
    /// Session is paused at a wait node.
    Waiting,
    /// Session ran to completion.
    Completed,
    /// Session failed with an error.
    Failed,
}

impl SessionStatus {
    /// Returns the string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Waiting => "waiting",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Status of an engine run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Run is active but not at a wait (e.g. a parent of the waiting run).
    Active,
    /// Run is paused at a wait node.
    Waiting,
    /// Run reached an exit node.
    Completed,
    /// Run's wait expired and could not continue.
    Expired,
    /// Run failed with an error.
    Failed,
}

impl RunStatus {
    /// Returns the string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Waiting => "waiting",
            Self::Completed => "completed",
            Self::Expired => "expired",
            Self::Failed => "failed",
        }
    }

    /// Returns true if this run can make no further progress.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Expired | Self::Failed)
    }
}
