//! Order intent pipeline errors.

use std::fmt;

use super::value_objects::OrderStatus;

/// Errors that can occur in the intent pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentError {
    /// A record with this command ID already exists.
    ///
    /// Non-fatal: the submitting side treats this as a duplicate outcome,
    /// not a failure.
    DuplicateCommandId {
        /// The colliding command ID.
        command_id: String,
    },

    /// No record exists for this command ID.
    UnknownCommand {
        /// The missing command ID.
        command_id: String,
    },

    /// A status write would regress or skip the lifecycle.
    ///
    /// This is an integrity violation: the operation that requested it is
    /// aborted and the record is left untouched.
    InvalidTransition {
        /// Current record status.
        from: OrderStatus,
        /// Attempted status.
        to: OrderStatus,
    },

    /// Intent field validation failed before any record was written.
    InvalidIntent {
        /// Field with invalid value.
        field: String,
        /// Error message.
        message: String,
    },

    /// The storage backend failed.
    Storage {
        /// Backend error description.
        message: String,
    },
}

impl fmt::Display for IntentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateCommandId { command_id } => {
                write!(f, "Duplicate command ID: {command_id}")
            }
            Self::UnknownCommand { command_id } => {
                write!(f, "Unknown command ID: {command_id}")
            }
            Self::InvalidTransition { from, to } => {
                write!(f, "Invalid order status transition: {from} -> {to}")
            }
            Self::InvalidIntent { field, message } => {
                write!(f, "Invalid intent field '{field}': {message}")
            }
            Self::Storage { message } => {
                write!(f, "Order storage error: {message}")
            }
        }
    }
}

impl std::error::Error for IntentError {}
