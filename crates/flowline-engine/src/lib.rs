// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Flowline Engine Vocabulary
//!
//! This crate defines the data shapes exchanged with the flow engine: the
//! engine itself (node evaluation, expression rendering) runs as an external
//! collaborator which, given assets and a trigger or resume, returns a new
//! [`Session`] snapshot plus a [`Sprint`] of ordered [`Event`]s. Flowline's
//! core consumes those snapshots and persists them; it never evaluates nodes.
//!
//! # Shapes
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Session`] | Full engine state after one invocation: contact, runs, wait |
//! | [`Run`] | One frame in the session's call stack, with path and results |
//! | [`Step`] | One visited node in a run's path |
//! | [`Sprint`] | The ordered events emitted by a single engine invocation |
//! | [`Event`] | A side effect the backend must apply (message, contact change) |
//! | [`Resume`] | The input that unblocks a waiting session |
//!
//! All types serialize with `serde`; the serialized [`Session`] is what the
//! backend stores as a session's output blob and later rehydrates.

#![deny(missing_docs)]

/// Tagged event variants emitted by the engine during a sprint.
pub mod events;

/// Run path steps and evaluated results.
pub mod path;

/// Resume envelopes for unblocking waiting sessions.
pub mod resumes;

/// Session and run snapshots plus asset references.
pub mod session;

/// The ordered event list produced by one engine invocation.
pub mod sprint;

/// Engine-level status enumerations.
pub mod status;

pub use events::{Event, MsgIn, MsgOut};
pub use path::{Step, StepResult};
pub use resumes::{read_resume, Resume, ResumeError};
pub use session::{
    ChannelRef, Contact, FieldRef, FlowRef, FlowType, GroupRef, Run, Session, Wait,
};
pub use sprint::Sprint;
pub use status::{RunStatus, SessionStatus};
