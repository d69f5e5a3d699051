// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Run path steps and evaluated results.
//!
//! Field names are fixed at the wire level: the backend stores paths and
//! results verbatim as JSON columns and downstream consumers read them by
//! these names. Results live in a `BTreeMap` so serialization is key-sorted
//! and bytewise stable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single visited node in a run's path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Unique identifier of this step.
    pub uuid: Uuid,
    /// The node this step arrived at.
    pub node_uuid: Uuid,
    /// When the run arrived at this node.
    pub arrived_on: DateTime<Utc>,
    /// The exit taken out of the node, absent on the terminal step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_uuid: Option<Uuid>,
}

/// An evaluated result saved by a run, keyed by its snake-cased name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    /// Human name of the result.
    pub name: String,
    /// The evaluated value.
    pub value: String,
    /// The category the value matched.
    pub category: String,
    /// Localized category, if the flow carries translations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_localized: Option<String>,
    /// The node that produced this result.
    pub node_uuid: Uuid,
    /// Raw input the result was evaluated from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    /// Extra payload attached by the node (e.g. a webhook response).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
    /// When the result was saved.
    pub created_on: DateTime<Utc>,
}
