//! Error type definitions for reelstats
//!
//! The hierarchy mirrors the layers of the service: repository failures,
//! extraction adapter failures, refresh orchestration failures and the
//! top-level application error the web layer maps to HTTP status codes.

use serde::Serialize;
use thiserror::Error;

use crate::models::Platform;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Repository layer errors
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Refresh orchestration errors
    #[error("Refresh error: {0}")]
    Refresh(#[from] RefreshError),

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Resource not found errors
    #[error("Not found: {resource} with id {id}")]
    NotFound { resource: String, id: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Repository layer specific errors
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// SQL query execution failures
    #[error("Query failed: {query} - {message}")]
    QueryFailed { query: String, message: String },

    /// Constraint violations (unique, foreign key, etc.)
    #[error("Constraint violation: {constraint} - {message}")]
    ConstraintViolation { constraint: String, message: String },

    /// Record not found
    #[error("Record not found: {table} with {field} = {value}")]
    RecordNotFound {
        table: String,
        field: String,
        value: String,
    },

    /// Stored value could not be decoded into a model
    #[error("Invalid stored value: {field} - {message}")]
    InvalidValue { field: String, message: String },

    /// Migration failures
    #[error("Migration failed: {version} - {message}")]
    MigrationFailed { version: String, message: String },
}

/// Classification of extraction adapter failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionErrorKind {
    /// The platform throttled the request (HTTP 429)
    RateLimited,
    /// Credentials/cookies were rejected or are required
    Unauthorized,
    /// The extractor could not parse the platform response
    Blocked,
    /// The channel does not exist or is private
    NotFound,
    /// The fetch succeeded but produced no videos
    EmptyResult,
    /// The extraction tool produced output that could not be decoded
    InvalidOutput,
    /// Anything the classifier does not recognise
    Other,
}

/// Failure reported by an extraction adapter for one channel
#[derive(Error, Debug, Clone)]
pub enum ExtractionError {
    /// The extraction tool itself cannot be invoked
    #[error("Extraction tool unavailable: {message}")]
    AdapterUnavailable { message: String },

    /// The tool ran but produced no usable data
    #[error("Extraction failed for {platform}: {message}")]
    Failed {
        platform: Platform,
        kind: ExtractionErrorKind,
        message: String,
    },
}

/// Errors surfaced by the refresh orchestrator
#[derive(Error, Debug)]
pub enum RefreshError {
    /// Extraction is impossible for every channel; aborts a batch
    #[error("Extraction adapter unavailable: {message}")]
    AdapterUnavailable { message: String },

    /// A batch refresh is already active
    #[error("A refresh job is already running ({job_id})")]
    AlreadyRunning { job_id: uuid::Uuid },

    /// Unknown refresh job id
    #[error("Refresh job not found: {job_id}")]
    JobNotFound { job_id: uuid::Uuid },

    /// Single refresh of a channel that does not exist
    #[error("Channel not found: {channel_id}")]
    ChannelNotFound { channel_id: i64 },

    /// Persistence failure outside a per-channel transaction
    #[error("Store error: {0}")]
    Store(#[from] RepositoryError),

    /// Unclassified internal failure; aborts a batch
    #[error("Internal refresh error: {message}")]
    Internal { message: String },
}

impl AppError {
    /// Create a validation error with a custom message
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a not found error for a specific resource
    pub fn not_found<R: Into<String>, I: Into<String>>(resource: R, id: I) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl RepositoryError {
    /// Create a query failed error
    pub fn query_failed<Q: Into<String>, M: Into<String>>(query: Q, message: M) -> Self {
        Self::QueryFailed {
            query: query.into(),
            message: message.into(),
        }
    }

    /// Create a record not found error
    pub fn record_not_found<T: Into<String>, F: Into<String>, V: Into<String>>(
        table: T,
        field: F,
        value: V,
    ) -> Self {
        Self::RecordNotFound {
            table: table.into(),
            field: field.into(),
            value: value.into(),
        }
    }

    /// Create a constraint violation error
    pub fn constraint_violation<C: Into<String>, M: Into<String>>(
        constraint: C,
        message: M,
    ) -> Self {
        Self::ConstraintViolation {
            constraint: constraint.into(),
            message: message.into(),
        }
    }

    pub fn invalid_value<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Wrap a sqlx error with the name of the failing operation
    pub fn from_sqlx<Q: Into<String>>(query: Q, err: sqlx::Error) -> Self {
        let query = query.into();
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return Self::constraint_violation(query, db_err.message().to_string());
            }
        }
        Self::query_failed(query, err.to_string())
    }
}

impl ExtractionError {
    /// Create a classified extraction failure
    pub fn failed<M: Into<String>>(platform: Platform, kind: ExtractionErrorKind, message: M) -> Self {
        Self::Failed {
            platform,
            kind,
            message: message.into(),
        }
    }

    /// Create an adapter unavailable error
    pub fn unavailable<M: Into<String>>(message: M) -> Self {
        Self::AdapterUnavailable {
            message: message.into(),
        }
    }

    /// Failure kind, `None` for an unavailable adapter
    pub fn kind(&self) -> Option<ExtractionErrorKind> {
        match self {
            Self::AdapterUnavailable { .. } => None,
            Self::Failed { kind, .. } => Some(*kind),
        }
    }

    /// Human readable reason stored as the channel's last error
    pub fn reason(&self) -> String {
        match self {
            Self::AdapterUnavailable { message } => message.clone(),
            Self::Failed { message, .. } => message.clone(),
        }
    }
}

impl RefreshError {
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error must abort a whole batch
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::AdapterUnavailable { .. } | Self::Internal { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_reason_uses_message() {
        let err = ExtractionError::failed(
            Platform::TikTok,
            ExtractionErrorKind::RateLimited,
            "Source rate-limited the request (HTTP 429)",
        );
        assert_eq!(err.reason(), "Source rate-limited the request (HTTP 429)");
        assert_eq!(err.kind(), Some(ExtractionErrorKind::RateLimited));
    }

    #[test]
    fn test_fatal_classification() {
        assert!(RefreshError::AdapterUnavailable {
            message: "yt-dlp missing".to_string()
        }
        .is_fatal());
        assert!(RefreshError::internal("boom").is_fatal());
        assert!(!RefreshError::AlreadyRunning {
            job_id: uuid::Uuid::new_v4()
        }
        .is_fatal());
    }
}
