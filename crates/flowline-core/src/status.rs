// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Persisted status vocabulary.
//!
//! Statuses are stored as single characters. This module is the only place
//! the engine-level ↔ persisted mapping lives: the engine never reports
//! Interrupted (that status is produced only by interruption operations),
//! and the engine's Active session state never persists.

use flowline_engine as engine;

/// Status of a persisted session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Paused at a wait node.
    Waiting,
    /// Ran to completion.
    Completed,
    /// Wait expired without being resumable to a parent.
    Expired,
    /// Forcibly ended by a lifecycle change outside the session.
    Interrupted,
    /// Failed with an error.
    Failed,
}

impl SessionStatus {
    /// Returns the single-character storage code.
    pub fn as_code(&self) -> &'static str {
        match self {
            Self::Waiting => "W",
            Self::Completed => "C",
            Self::Expired => "X",
            Self::Interrupted => "I",
            Self::Failed => "F",
        }
    }

    /// Parses a storage code.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "W" => Some(Self::Waiting),
            "C" => Some(Self::Completed),
            "X" => Some(Self::Expired),
            "I" => Some(Self::Interrupted),
            "F" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Maps an engine session status to its persisted form. Returns None for
    /// Active, which only exists mid-sprint and must never persist.
    pub fn from_engine(status: engine::SessionStatus) -> Option<Self> {
        match status {
            engine::SessionStatus::Active => None,
            engine::SessionStatus::Waiting => Some(Self::Waiting),
            engine::SessionStatus::Completed => Some(Self::Completed),
            engine::SessionStatus::Failed => Some(Self::Failed),
        }
    }

    /// Returns true if no further transitions are permitted.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Waiting)
    }
}

/// Status of a persisted run. Unlike sessions, runs may persist as Active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Executing but not at a wait (a parent of the waiting run).
    Active,
    /// Paused at a wait node.
    Waiting,
    /// Reached an exit node.
    Completed,
    /// Wait expired.
    Expired,
    /// Forcibly ended alongside its session.
    Interrupted,
    /// Failed with an error.
    Failed,
}

impl RunStatus {
    /// Returns the single-character storage code.
    pub fn as_code(&self) -> &'static str {
        match self {
            Self::Active => "A",
            Self::Waiting => "W",
            Self::Completed => "C",
            Self::Expired => "X",
            Self::Interrupted => "I",
            Self::Failed => "F",
        }
    }

    /// Parses a storage code.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "A" => Some(Self::Active),
            "W" => Some(Self::Waiting),
            "C" => Some(Self::Completed),
            "X" => Some(Self::Expired),
            "I" => Some(Self::Interrupted),
            "F" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Maps an engine run status to its persisted form. Total: every engine
    /// status has a persisted counterpart.
    pub fn from_engine(status: engine::RunStatus) -> Self {
        match status {
            engine::RunStatus::Active => Self::Active,
            engine::RunStatus::Waiting => Self::Waiting,
            engine::RunStatus::Completed => Self::Completed,
            engine::RunStatus::Expired => Self::Expired,
            engine::RunStatus::Failed => Self::Failed,
        }
    }

    /// Returns true if no further transitions are permitted.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active | Self::Waiting)
    }

    /// The legacy `is_active` column value for this status.
    ///
    /// Written alongside `status` until database triggers are rewritten to
    /// look only at status.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// The legacy `exit_type` column value for this status; None while the
    /// run can still proceed.
    pub fn exit_type(&self) -> Option<ExitType> {
        match self {
            Self::Interrupted => Some(ExitType::Interrupted),
            Self::Completed => Some(ExitType::Completed),
            Self::Expired => Some(ExitType::Expired),
            Self::Failed => Some(ExitType::Failed),
            Self::Active | Self::Waiting => None,
        }
    }
}

/// Legacy exit type written alongside terminal run statuses.
///
/// Note the code mismatch with [`RunStatus`]: an expired run persists
/// status `X` but exit type `E`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitType {
    /// Run was interrupted.
    Interrupted,
    /// Run completed.
    Completed,
    /// Run expired.
    Expired,
    /// Run failed.
    Failed,
}

impl ExitType {
    /// Returns the single-character storage code.
    pub fn as_code(&self) -> &'static str {
        match self {
            Self::Interrupted => "I",
            Self::Completed => "C",
            Self::Expired => "E",
            Self::Failed => "F",
        }
    }

    /// Parses a storage code.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "I" => Some(Self::Interrupted),
            "C" => Some(Self::Completed),
            "E" => Some(Self::Expired),
            "F" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// The type of flows a session runs; doubles as the persisted session type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowType {
    /// Text-based messaging flows.
    Messaging,
    /// IVR flows driven over a channel call.
    Voice,
    /// Non-interactive flows with no waits.
    Background,
}

impl FlowType {
    /// Returns the single-character storage code.
    pub fn as_code(&self) -> &'static str {
        match self {
            Self::Messaging => "M",
            Self::Voice => "V",
            Self::Background => "B",
        }
    }

    /// Parses a storage code.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "M" => Some(Self::Messaging),
            "V" => Some(Self::Voice),
            "B" => Some(Self::Background),
            _ => None,
        }
    }
}

impl From<engine::FlowType> for FlowType {
    fn from(t: engine::FlowType) -> Self {
        match t {
            engine::FlowType::Messaging => Self::Messaging,
            engine::FlowType::Voice => Self::Voice,
            engine::FlowType::Background => Self::Background,
        }
    }
}

// Statuses bind and decode as single-character SQL text.
macro_rules! impl_text_codec {
    ($name:ident) => {
        impl sqlx::Type<sqlx::Postgres> for $name {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <&str as sqlx::Type<sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
                <&str as sqlx::Type<sqlx::Postgres>>::compatible(ty)
            }
        }

        impl<'q> sqlx::Encode<'q, sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut sqlx::postgres::PgArgumentBuffer,
            ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
                <&str as sqlx::Encode<'q, sqlx::Postgres>>::encode_by_ref(&self.as_code(), buf)
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::Postgres> for $name {
            fn decode(
                value: sqlx::postgres::PgValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let code = <&str as sqlx::Decode<'r, sqlx::Postgres>>::decode(value)?;
                Self::from_code(code).ok_or_else(|| {
                    format!(concat!("invalid ", stringify!($name), " code: {}"), code).into()
                })
            }
        }

        impl sqlx::postgres::PgHasArrayType for $name {
            fn array_type_info() -> sqlx::postgres::PgTypeInfo {
                <&str as sqlx::postgres::PgHasArrayType>::array_type_info()
            }

            fn array_compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
                <&str as sqlx::postgres::PgHasArrayType>::array_compatible(ty)
            }
        }
    };
}

impl_text_codec!(SessionStatus);
impl_text_codec!(RunStatus);
impl_text_codec!(ExitType);
impl_text_codec!(FlowType);
