// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tagged event variants emitted by the engine during a sprint.
//!
//! Events are the engine's only way of requesting side effects: the backend
//! applies them in emission order through its hook pipeline. The envelope is
//! internally tagged by `type` with snake-cased tokens, which is also the
//! wire form stored alongside messages on the courier queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::{ChannelRef, FieldRef, GroupRef};

/// An outgoing message created by a send-message node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MsgOut {
    /// Unique identifier of the message.
    pub uuid: Uuid,
    /// Destination URN, absent when the contact is unreachable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urn: Option<String>,
    /// Channel the message should go out on, absent when unroutable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<ChannelRef>,
    /// Rendered message text.
    pub text: String,
    /// Attachment URLs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
}

/// An incoming message that resumed or triggered the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MsgIn {
    /// Unique identifier of the message.
    pub uuid: Uuid,
    /// Source URN.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urn: Option<String>,
    /// Channel the message arrived on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<ChannelRef>,
    /// Message text.
    pub text: String,
}

/// A side effect requested by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// An outgoing message was created and must be queued to the courier.
    MsgCreated {
        /// When the event was emitted.
        created_on: DateTime<Utc>,
        /// The message to send.
        msg: MsgOut,
    },

    /// An incoming message was handled by the session.
    MsgReceived {
        /// When the event was emitted.
        created_on: DateTime<Utc>,
        /// The message that was received.
        msg: MsgIn,
    },

    /// The contact's name was changed.
    ContactNameChanged {
        /// When the event was emitted.
        created_on: DateTime<Utc>,
        /// The new name.
        name: String,
    },

    /// The contact's language was changed.
    ContactLanguageChanged {
        /// When the event was emitted.
        created_on: DateTime<Utc>,
        /// The new ISO-639-3 language code.
        language: String,
    },

    /// The contact was added to and/or removed from groups.
    ContactGroupsChanged {
        /// When the event was emitted.
        created_on: DateTime<Utc>,
        /// Groups the contact was added to.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        groups_added: Vec<GroupRef>,
        /// Groups the contact was removed from.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        groups_removed: Vec<GroupRef>,
    },

    /// A contact field value was set or cleared.
    ContactFieldChanged {
        /// When the event was emitted.
        created_on: DateTime<Utc>,
        /// The field that changed.
        field: FieldRef,
        /// The new value, or null when cleared.
        value: Option<serde_json::Value>,
    },

    /// The contact's URN set changed.
    ContactUrnsChanged {
        /// When the event was emitted.
        created_on: DateTime<Utc>,
        /// The full new URN list in priority order.
        urns: Vec<String>,
    },

    /// A non-fatal error was logged by the engine.
    Error {
        /// When the event was emitted.
        created_on: DateTime<Utc>,
        /// Error description.
        text: String,
    },
}

impl Event {
    /// Returns the wire token for this event's type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::MsgCreated { .. } => "msg_created",
            Self::MsgReceived { .. } => "msg_received",
            Self::ContactNameChanged { .. } => "contact_name_changed",
            Self::ContactLanguageChanged { .. } => "contact_language_changed",
            Self::ContactGroupsChanged { .. } => "contact_groups_changed",
            Self::ContactFieldChanged { .. } => "contact_field_changed",
            Self::ContactUrnsChanged { .. } => "contact_urns_changed",
            Self::Error { .. } => "error",
        }
    }
}
