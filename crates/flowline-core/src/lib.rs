// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Flowline Core - Session & Sprint Engine
//!
//! This crate is the execution backend for a messaging-flow platform: it
//! persists per-contact flow executions (sessions) and their call-stack
//! frames (runs), commits one engine sprint at a time atomically with its
//! side effects, and enforces the invariant that a contact has at most one
//! waiting session per session type.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Task Scheduler / API                              │
//! │          (loads assets, holds the per-contact advisory lock)             │
//! └─────────────────────────────────────────────────────────────────────────┘
//!            │ trigger / resume                         ▲
//!            ▼                                          │ session + sprint
//! ┌───────────────────────┐      invoke      ┌─────────────────────────────┐
//! │    flowline-core      │─────────────────►│        Flow Engine          │
//! │  (This Crate)         │                  │   (flowline-engine types,   │
//! │  Sessions/Runs/Hooks  │◄─────────────────│    evaluation is external)  │
//! └───────────────────────┘                  └─────────────────────────────┘
//!     │               │
//!     ▼               ▼ (post-commit only)
//! ┌───────────┐   ┌───────────┐
//! │PostgreSQL │   │   Redis   │
//! │ (truth)   │   │ (courier) │
//! └───────────┘   └───────────┘
//! ```
//!
//! # Advancing a session
//!
//! 1. The caller loads [`assets::OrgAssets`], builds a trigger (new session)
//!    or rehydrates an existing one via [`sessions::Session::flow_session`],
//!    and invokes the engine to produce a post-sprint session snapshot plus
//!    a [`flowline_engine::Sprint`] of events.
//! 2. Inside a transaction it calls [`sessions::write_sessions`] (new) or
//!    [`sessions::Session::update`] (resume). Row writes, event pre-commit
//!    effects and the caller's [`sessions::SessionCommitHook`] all land in
//!    that transaction.
//! 3. After committing, the caller applies the returned
//!    [`post_commit::PostCommit`] with [`post_commit::apply`]: campaign
//!    fires in a fresh transaction, outbound messages onto the courier
//!    queue. Post-commit failures are reported but never undo the commit.
//!
//! # Session Status State Machine
//!
//! ```text
//!                  ┌──────────┐
//!        ┌─────────│ (sprint) │─────────┐
//!        │         └────┬─────┘         │
//!        │              │               │
//!        ▼              ▼               ▼
//!   ┌─────────┐    ┌─────────┐    ┌────────┐
//!   │ WAITING │───►│COMPLETED│    │ FAILED │
//!   └─┬─┬─┬───┘    └─────────┘    └────────┘
//!     │ │ │ resume sprint ▲ re-arms WAITING
//!     │ │ └───────────────┘
//!     │ │ interrupt             expire
//!     │ └──────────────┐      ┌─────────────┐
//!     │                ▼      ▼             │
//!     │         ┌─────────────┐      ┌──────┴───┐
//!     └────────►│ INTERRUPTED │      │ EXPIRED  │
//!               └─────────────┘      └──────────┘
//! ```
//!
//! Terminal statuses permit no further transitions; an update against a
//! terminal session is rejected. The engine's Active state never persists.
//!
//! # Concurrency
//!
//! The database is the single source of truth. The "at most one waiting
//! session per (contact, session type)" invariant relies on the external
//! scheduler serializing advances per contact with an advisory lock; if that
//! lock is ever removed, add a partial unique index on
//! `(contact_id, session_type) WHERE status = 'W'` and treat the resulting
//! constraint violation as a retriable conflict. "Now" is captured once per
//! operation and threaded explicitly, so all timestamps written by one call
//! agree and tests are deterministic.
//!
//! # Modules
//!
//! - [`assets`]: Read-only organization asset view (flows, groups, campaigns)
//! - [`config`]: Configuration from environment variables
//! - [`courier`]: Outbound message queueing to the courier's Redis sorted sets
//! - [`error`]: Error types with stable error codes
//! - [`expires`]: Wait expiration of runs and sessions
//! - [`hooks`]: Event-hook pipeline mapping engine events to side effects
//! - [`ids`]: Typed identifiers
//! - [`interrupts`]: Bulk interruption by contact, type, channel or flow
//! - [`migrations`]: Embedded database migrations
//! - [`post_commit`]: Effects applied after the write transaction commits
//! - [`runs`]: Persisted run records
//! - [`runtime`]: Shared database/Redis/config handles
//! - [`sessions`]: Persisted session records and the sprint write paths
//! - [`status`]: Persisted status vocabulary and engine mappings

#![deny(missing_docs)]

/// Read-only organization asset view.
pub mod assets;

/// Configuration loading from environment variables.
pub mod config;

/// Courier queue pushes.
pub mod courier;

/// Error types for core operations.
pub mod error;

/// Expiration of runs and sessions.
pub mod expires;

/// Event-hook pipeline.
pub mod hooks;

/// Typed identifiers.
pub mod ids;

/// Bulk session interruption.
pub mod interrupts;

/// Embedded database migrations.
pub mod migrations;

/// Post-commit effect application.
pub mod post_commit;

/// Persisted run records.
pub mod runs;

/// Shared runtime handles.
pub mod runtime;

/// Persisted session records and write paths.
pub mod sessions;

/// Persisted status vocabulary.
pub mod status;

/// An open Postgres transaction, owned by the caller of a write path.
pub type PgTransaction<'a> = sqlx::Transaction<'a, sqlx::Postgres>;

pub use assets::OrgAssets;
pub use config::Config;
pub use error::{CoreError, Result};
pub use ids::{
    CampaignEventID, ChannelID, ConnectionID, ContactID, FlowID, GroupID, OrgID, RunID, SessionID,
    StartID,
};
pub use post_commit::PostCommit;
pub use runs::FlowRun;
pub use runtime::Runtime;
pub use sessions::{write_sessions, Session, SessionCommitHook};
pub use status::{ExitType, FlowType, RunStatus, SessionStatus};
