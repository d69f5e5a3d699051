// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for flowline-core.
//!
//! The core recovers nothing internally: every error surfaces to the caller,
//! who owns the transaction and decides whether to roll back or retry.

use std::fmt;

use uuid::Uuid;

/// Result type using CoreError
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors that can occur while writing, updating, interrupting or
/// expiring sessions.
#[derive(Debug)]
#[non_exhaustive]
pub enum CoreError {
    /// Input referenced an unknown asset or was structurally invalid.
    Validation {
        /// What was wrong with the input.
        message: String,
    },

    /// A stored session output blob could not be rehydrated.
    SessionDeserialization {
        /// The session whose output was unreadable.
        session_uuid: Uuid,
        /// Why rehydration failed.
        reason: String,
    },

    /// Update() was invoked on a session already in a terminal status.
    IllegalTransition {
        /// The session that was updated.
        session_uuid: Uuid,
        /// The terminal status it holds.
        status: &'static str,
    },

    /// A database or queue operation failed.
    Storage {
        /// The operation that failed.
        operation: &'static str,
        /// Error details.
        details: String,
    },

    /// The caller-supplied pre-commit hook returned an error.
    Hook {
        /// Error details from the hook.
        details: String,
    },

    /// The ambient cancellation fired before the operation completed.
    Cancelled,
}

impl CoreError {
    /// Get the error code string for this error type.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::SessionDeserialization { .. } => "DESERIALIZATION_ERROR",
            Self::IllegalTransition { .. } => "ILLEGAL_TRANSITION",
            Self::Storage { .. } => "STORAGE_ERROR",
            Self::Hook { .. } => "HOOK_ERROR",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation { message } => {
                write!(f, "Validation error: {}", message)
            }
            Self::SessionDeserialization {
                session_uuid,
                reason,
            } => {
                write!(
                    f,
                    "Unable to rehydrate session '{}': {}",
                    session_uuid, reason
                )
            }
            Self::IllegalTransition {
                session_uuid,
                status,
            } => {
                write!(
                    f,
                    "Session '{}' is in terminal status '{}' and cannot be updated",
                    session_uuid, status
                )
            }
            Self::Storage { operation, details } => {
                write!(f, "Storage error during '{}': {}", operation, details)
            }
            Self::Hook { details } => {
                write!(f, "Pre-commit hook failed: {}", details)
            }
            Self::Cancelled => write!(f, "Operation cancelled"),
        }
    }
}

impl std::error::Error for CoreError {}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        CoreError::Storage {
            operation: "query",
            details: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Storage {
            operation: "json",
            details: err.to_string(),
        }
    }
}

impl From<redis::RedisError> for CoreError {
    fn from(err: redis::RedisError) -> Self {
        CoreError::Storage {
            operation: "redis",
            details: err.to_string(),
        }
    }
}
