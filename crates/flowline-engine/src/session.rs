// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Session and run snapshots.
//!
//! A [`Session`] is the engine's complete state after one invocation: the
//! contact being run, the stack of [`Run`] frames entered so far, and the
//! wait the session is parked on (if any). The backend serializes the whole
//! snapshot as the session's output blob and rehydrates it to resume.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::Event;
use crate::path::{Step, StepResult};
use crate::status::{RunStatus, SessionStatus};

/// The type of flow a session is executing.
///
/// Doubles as the session type: a session only ever runs flows of one type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowType {
    /// Text-based messaging flows.
    Messaging,
    /// IVR flows driven over a channel call.
    Voice,
    /// Non-interactive flows with no waits.
    Background,
}

/// Reference to a flow asset by UUID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRef {
    /// The flow's UUID.
    pub uuid: Uuid,
    /// The flow's name at time of reference.
    pub name: String,
}

/// Reference to a contact group asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRef {
    /// The group's UUID.
    pub uuid: Uuid,
    /// The group's name at time of reference.
    pub name: String,
}

/// Reference to a contact field asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRef {
    /// The field's key.
    pub key: String,
    /// The field's name.
    pub name: String,
}

/// Reference to a channel asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRef {
    /// The channel's UUID.
    pub uuid: Uuid,
    /// The channel's name at time of reference.
    pub name: String,
}

/// The contact a session is executing for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    /// The contact's UUID.
    pub uuid: Uuid,
    /// The contact's database id in the owning organization.
    pub id: i64,
    /// The contact's name.
    #[serde(default)]
    pub name: String,
    /// The contact's language, if set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// The contact's URNs in priority order.
    #[serde(default)]
    pub urns: Vec<String>,
}

/// The wait a session is parked on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wait {
    /// When the wait expires and the session should be expired or resumed
    /// to its parent, absent for waits that never expire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_on: Option<DateTime<Utc>>,
    /// Seconds after which the wait times out and the flow continues down
    /// its timeout exit, absent for waits without a timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<i64>,
}

/// One frame in a session's call stack.
///
/// Runs are created on flow entry and accumulate for the life of the
/// session; entering a sub-flow pushes a new run whose `parent_uuid` points
/// at the frame that entered it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    /// Unique identifier of this run.
    pub uuid: Uuid,
    /// The flow this run is executing.
    pub flow: FlowRef,
    /// Current status of this run.
    pub status: RunStatus,
    /// UUID of the run that entered this one, absent on the root frame.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_uuid: Option<Uuid>,
    /// Ordered nodes visited by this run. Never empty.
    pub path: Vec<Step>,
    /// Results saved by this run, keyed by snake-cased result name.
    #[serde(default)]
    pub results: BTreeMap<String, StepResult>,
    /// Events logged by this run during the current sprint.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<Event>,
    /// When this run was created.
    pub created_on: DateTime<Utc>,
    /// When this run was last modified.
    pub modified_on: DateTime<Utc>,
    /// When this run exited, absent while it can still proceed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exited_on: Option<DateTime<Utc>>,
    /// When this run's wait expires, absent when not waiting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_on: Option<DateTime<Utc>>,
}

impl Run {
    /// Returns true if this run observed a received message.
    pub fn received_input(&self) -> bool {
        self.events.iter().any(|e| matches!(e, Event::MsgReceived { .. }))
    }
}

/// The engine's complete state for one contact's flow execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier of this session.
    pub uuid: Uuid,
    /// The type of flows this session runs.
    #[serde(rename = "type")]
    pub session_type: FlowType,
    /// Current status of the session.
    pub status: SessionStatus,
    /// The contact being run.
    pub contact: Contact,
    /// Database id of the channel connection driving this session, set by
    /// the caller for voice sessions when the call is placed or answered.
    /// Carried the same way as the contact's id, and mirrored onto the
    /// session's persisted runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<i64>,
    /// All runs entered during this session's lifetime, in creation order.
    pub runs: Vec<Run>,
    /// The wait the session is parked on, present iff status is waiting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait: Option<Wait>,
}

impl Session {
    /// Returns the run currently parked at a wait, if any. Runs are in
    /// creation order, so with a parent and child both waiting this is the
    /// child, the frame actually at the wait.
    pub fn waiting_run(&self) -> Option<&Run> {
        self.runs.iter().rev().find(|r| r.status == RunStatus::Waiting)
    }

    /// Returns the run with the given UUID.
    pub fn find_run(&self, uuid: Uuid) -> Option<&Run> {
        self.runs.iter().find(|r| r.uuid == uuid)
    }
}
