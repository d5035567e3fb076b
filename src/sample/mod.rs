//! Sample workflows
//!
//! Everything here runs against a [`WriteService`](crate::service::WriteService)
//! and reports through [`Outcome`]: expected failures (resource exists,
//! resource missing, records rejected) come back as values the caller can
//! print or inspect, while anything else is an `Err`.

pub mod ingest;
pub mod lifecycle;
pub mod partition_key;
pub mod report;
pub mod runner;
pub mod upsert;

pub use ingest::Ingestor;
pub use lifecycle::{Lifecycle, Listing, Paginator};
pub use partition_key::{CompositePartitionKeySample, PartitionKeyReport};
pub use report::{Printer, Summary};
pub use runner::{BasicSample, Cleanup, RunSummary};
pub use upsert::{StepResult, UpsertReport, UpsertStep, UpsertWorkflow};

use crate::error::{Error, Result};
use crate::model::RejectedRecord;

/// Result of one sample operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Done(T),
    /// Create found a resource with the same name.
    AlreadyExists(String),
    /// The resource addressed does not exist.
    NotFound(String),
    /// Some or all records of a write were rejected.
    Rejected(Vec<RejectedRecord>),
    /// The call was not issued.
    Skipped(String),
}

impl<T> Outcome<T> {
    /// Recovers the domain error kinds and propagates the rest.
    ///
    /// ```rust
    /// use tswrite::error::Error;
    /// use tswrite::Outcome;
    ///
    /// let missing = Outcome::<()>::from_result(Err(Error::NotFound("Database x does not exist".into())));
    /// assert!(matches!(missing, Ok(Outcome::NotFound(_))));
    ///
    /// let failed = Outcome::<()>::from_result(Err(Error::Transport("connection refused".into())));
    /// assert!(failed.is_err());
    /// ```
    pub fn from_result(result: Result<T>) -> Result<Self> {
        match result {
            Ok(value) => Ok(Outcome::Done(value)),
            Err(Error::Conflict(message)) => Ok(Outcome::AlreadyExists(message)),
            Err(Error::NotFound(message)) => Ok(Outcome::NotFound(message)),
            Err(Error::RejectedRecords(rejected)) => Ok(Outcome::Rejected(rejected)),
            Err(other) => Err(other),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Outcome::Done(_))
    }

    pub fn as_done(&self) -> Option<&T> {
        match self {
            Outcome::Done(value) => Some(value),
            _ => None,
        }
    }

    pub fn done(self) -> Option<T> {
        match self {
            Outcome::Done(value) => Some(value),
            _ => None,
        }
    }

    /// Rejected records, empty unless the outcome is `Rejected`.
    pub fn rejected(&self) -> &[RejectedRecord] {
        match self {
            Outcome::Rejected(rejected) => rejected,
            _ => &[],
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Done(value) => Outcome::Done(f(value)),
            Outcome::AlreadyExists(m) => Outcome::AlreadyExists(m),
            Outcome::NotFound(m) => Outcome::NotFound(m),
            Outcome::Rejected(r) => Outcome::Rejected(r),
            Outcome::Skipped(m) => Outcome::Skipped(m),
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Outcome::Done(_) => "done",
            Outcome::AlreadyExists(_) => "already_exists",
            Outcome::NotFound(_) => "not_found",
            Outcome::Rejected(_) => "rejected",
            Outcome::Skipped(_) => "skipped",
        }
    }
}
