// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Resume envelopes.
//!
//! A resume is the input that unblocks a waiting session: an inbound message,
//! a wait expiring, a wait timing out, or a channel call changing state. The
//! backend does not interpret resumes; it reads them off the wire and hands
//! them to the engine alongside the rehydrated session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::events::MsgIn;

/// Errors reading a resume from the wire.
#[derive(Debug, thiserror::Error)]
pub enum ResumeError {
    /// The payload was not valid JSON for the declared type.
    #[error("unable to read resume: {0}")]
    Json(#[from] serde_json::Error),

    /// The declared type is not a known resume type.
    #[error("unknown type: {0}")]
    UnknownType(String),
}

/// The input that unblocks a waiting session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Resume {
    /// An inbound message from the contact.
    Msg {
        /// When the resume was created.
        resumed_on: DateTime<Utc>,
        /// The message that arrived.
        msg: MsgIn,
    },

    /// The waiting run's expiration passed; the session should continue to
    /// its parent frame or end.
    RunExpiration {
        /// When the resume was created.
        resumed_on: DateTime<Utc>,
    },

    /// The wait's timeout passed; the flow continues down its timeout exit.
    WaitTimeout {
        /// When the resume was created.
        resumed_on: DateTime<Utc>,
    },

    /// A channel call changed state (voice sessions only).
    Dial {
        /// When the resume was created.
        resumed_on: DateTime<Utc>,
        /// The new call status, e.g. "answered" or "busy".
        status: String,
    },
}

const RESUME_TYPES: &[&str] = &["msg", "run_expiration", "wait_timeout", "dial"];

/// Reads a resume from its JSON wire form, rejecting unknown types with a
/// distinct error so callers can tell schema drift from corruption.
pub fn read_resume(data: &str) -> Result<Resume, ResumeError> {
    #[derive(Deserialize)]
    struct TypePeek {
        #[serde(rename = "type")]
        kind: String,
    }

    let peek: TypePeek = serde_json::from_str(data)?;
    if !RESUME_TYPES.contains(&peek.kind.as_str()) {
        return Err(ResumeError::UnknownType(peek.kind));
    }
    Ok(serde_json::from_str(data)?)
}
