//! Database layer.
//!
//! [`connection::ConnectionManager`] owns the pool and its retry state
//! machine. [`MessageStore`] is the data-access interface for the single
//! `messages` table; [`sql::SqlMessageStore`] implements it on top of the
//! sqlx `Any` driver so the same code runs against MySQL in production and
//! SQLite in tests.
//!
//! All trait methods use `impl Future` in their signatures, so no extra
//! `async-trait` crate is required.

pub mod connection;
pub mod schema;
pub mod sql;

#[cfg(test)]
pub mod testing;

use std::future::Future;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Upper bound on message length, counted in Unicode scalar values.
pub const MAX_CONTENT_CHARS: usize = 1000;

/// A single row in the `messages` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Database-assigned, strictly increasing, never reused.
    pub id: i64,
    /// Trimmed message body.
    pub content: String,
    /// Server-side insertion time.
    pub created_at: DateTime<Utc>,
}

/// Rejected message input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("message cannot be empty")]
    Empty,

    #[error("message too long ({len} characters, max {max})")]
    TooLong { len: usize, max: usize },
}

impl ValidationError {
    /// Stable machine-readable code returned to API clients.
    pub fn reason(&self) -> &'static str {
        match self {
            ValidationError::Empty => "empty",
            ValidationError::TooLong { .. } => "too_long",
        }
    }
}

/// Errors produced by the store and the connection manager.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No live connection could be produced or used within its timeout.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The database answered, but with an error that retrying won't fix.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal store error: {0}")]
    Internal(String),
}

/// Trim `raw` and check it against the emptiness and length rules.
pub fn validate_content(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty);
    }
    let len = trimmed.chars().count();
    if len > MAX_CONTENT_CHARS {
        return Err(ValidationError::TooLong {
            len,
            max: MAX_CONTENT_CHARS,
        });
    }
    Ok(trimmed.to_owned())
}

/// Data access for board messages.
///
/// Implement this trait to swap the SQL backend without touching any
/// handler code.
pub trait MessageStore: Send + Sync + 'static {
    /// Validate and persist a new message, returning it with its assigned id.
    fn append(
        &self,
        content: &str,
    ) -> impl Future<Output = Result<Message, StoreError>> + Send;

    /// Every message, newest first.
    fn list_all(&self) -> impl Future<Output = Result<Vec<Message>, StoreError>> + Send;
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn blank_content_is_rejected() {
        assert_eq!(validate_content(""), Err(ValidationError::Empty));
        assert_eq!(validate_content("   \n\t"), Err(ValidationError::Empty));
    }

    #[test]
    fn content_is_trimmed() {
        assert_eq!(validate_content("  hello  ").as_deref(), Ok("hello"));
    }

    #[test]
    fn length_bound_counts_characters_not_bytes() {
        let at_limit = "é".repeat(MAX_CONTENT_CHARS);
        assert!(validate_content(&at_limit).is_ok());

        let over = "a".repeat(MAX_CONTENT_CHARS + 1);
        assert_eq!(
            validate_content(&over),
            Err(ValidationError::TooLong {
                len: MAX_CONTENT_CHARS + 1,
                max: MAX_CONTENT_CHARS,
            })
        );
    }

    #[test]
    fn reasons_are_stable() {
        assert_eq!(ValidationError::Empty.reason(), "empty");
        assert_eq!(ValidationError::TooLong { len: 2, max: 1 }.reason(), "too_long");
    }
}
