//! Error types for the aggregation core and its collaborators.
//!
//! Unavailable items are not errors (they are skipped) and display-name
//! failures degrade to the user id, so neither appears in `AggregateError`.

use std::path::PathBuf;
use thiserror::Error;

/// Conditions that abort a run before any aggregate is produced.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AggregateError {
    /// Pages must arrive in strictly ascending offset order.
    #[error("pages out of offset order: offset {found} after offset {previous}")]
    PagesOutOfOrder { previous: u32, found: u32 },

    /// An entry breaks the input contract.
    #[error("malformed entry at page offset {offset}, index {index}: {reason}")]
    MalformedInput {
        offset: u32,
        index: usize,
        reason: String,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An earlier page was rejected; the run can no longer produce an aggregate.
    #[error("aggregation aborted by an earlier rejected page")]
    Aborted,
}

/// Display-name lookup failure. Never fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no display name known for user {0}")]
    NotFound(String),

    #[error("display name lookup failed for user {user_id}: {reason}")]
    Failed { user_id: String, reason: String },
}

/// Failures while loading pages, metadata or name files.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("page file {0} has no offset field and no trailing digits in its name")]
    MissingOffset(PathBuf),

    #[error("page offset {offset} appears in both {first} and {second}")]
    DuplicateOffset {
        offset: u32,
        first: PathBuf,
        second: PathBuf,
    },
}

/// Failures of the SQLite publication store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("failed to serialize aggregate: {0}")]
    Serialize(#[from] serde_json::Error),
}
