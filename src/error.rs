//! Error types for datastore operations.
//!
//! Client and parse errors are plain unit enums so callers (and tests) can
//! compare them directly; everything else is wrapped in [`DatastorersError`].

use serde::Deserialize;
use thiserror::Error;

/// Failures reported by the datastore semantics layer: lookups, queries and commits.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatastoreClientError {
    #[error("no entity was found")]
    NotFound,
    #[error("the datastore kept deferring the lookup")]
    LookupDeferred,
    #[error("more than one result where exactly one was expected")]
    AmbiguousResult,
    #[error("the entity has no key")]
    KeyMissing,
    #[error("the datastore did not assign a key to the inserted entity")]
    KeyAssignmentFailed,
    #[error("the datastore did not confirm the delete")]
    DeleteFailed,
    #[error("the entity was modified concurrently")]
    DataConflict,
    #[error("there are no more pages to fetch")]
    NoMorePages,
    #[error("a transaction is in progress on this connection; push mutations onto it instead")]
    TransactionInProgress,
}

/// Failures converting datastore values into Rust values.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatastoreParseError {
    #[error("the property has no value")]
    NoSuchValue,
    #[error("the property holds a value of another type")]
    UnexpectedValueType,
    #[error("the integer does not fit the target type")]
    IntegerOutOfRange,
    #[error("the entity key belongs to another kind")]
    KindMismatch,
}

/// Top level error returned by every public operation.
#[derive(Error, Debug)]
pub enum DatastorersError {
    #[error(transparent)]
    DatastoreClientError(#[from] DatastoreClientError),

    #[error(transparent)]
    ParseError(#[from] DatastoreParseError),

    #[error("datastore request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("datastore returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<std::convert::Infallible> for DatastorersError {
    fn from(never: std::convert::Infallible) -> Self {
        match never {}
    }
}

impl DatastorersError {
    /// The client error wrapped by this error, if any.
    pub fn client_error(&self) -> Option<DatastoreClientError> {
        match self {
            DatastorersError::DatastoreClientError(e) => Some(*e),
            _ => None,
        }
    }

    /// The parse error wrapped by this error, if any.
    pub fn parse_error(&self) -> Option<DatastoreParseError> {
        match self {
            DatastorersError::ParseError(e) => Some(*e),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    error: GoogleError,
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// Maps a non-success HTTP response onto a [`DatastorersError`].
///
/// Contention (HTTP 409 / `ABORTED`) is reported as [`DatastoreClientError::DataConflict`].
pub(crate) fn from_api_response(status: u16, body: &str) -> DatastorersError {
    let parsed = serde_json::from_str::<GoogleErrorBody>(body).ok();
    let aborted = parsed
        .as_ref()
        .map(|b| b.error.status == "ABORTED")
        .unwrap_or(false);
    if status == 409 || aborted {
        return DatastoreClientError::DataConflict.into();
    }
    let message = match parsed {
        Some(b) if !b.error.message.is_empty() => b.error.message,
        _ => body.trim().to_string(),
    };
    DatastorersError::Api { status, message }
}
