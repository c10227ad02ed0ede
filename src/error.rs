//! Error types for every stage of a sync run.
//!
//! Errors are grouped by where they stop the run:
//!
//! * [`FeedError`] aborts one feed; the run moves on to the next one.
//! * [`TransferError`] aborts one item; the stage file stays for a later
//!   resume.  [`TransferError::Io`] is the exception: a local filesystem
//!   failure is promoted to [`SyncError`] by the caller.
//! * [`SyncError`] reaches the operator and ends the run.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Why a feed document could not be turned into a [`Channel`](crate::feed::Channel).
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("error retrieving feed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("XML parse error, invalid feed? {0}")]
    Parse(String),

    #[error("{0}")]
    Validation(String),
}

/// Failure while moving bytes from an enclosure URL to disk.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server answered {status} for {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("connection dropped while reading {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: io::Error,
    },

    #[error("server resumed {url} at byte {got}, expected {expected}")]
    RangeMismatch {
        url: String,
        expected: u64,
        got: u64,
    },

    #[error("file error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A failure that ends the whole run.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("cannot write {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
