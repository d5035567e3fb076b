// tswrite - Time-series write samples
// Database/table lifecycle, batched ingestion and versioned upsert

#![warn(rust_2018_idioms)]

pub mod clock;
pub mod config;
pub mod model;
pub mod sample;
pub mod server;
pub mod service;

// Re-exports for convenience
pub use clock::{Clock, ManualClock, SystemClock};
pub use model::{Dimension, MeasureValueType, Record, RejectedRecord, WriteRecordsRequest};
pub use sample::Outcome;
pub use service::{HttpService, MemoryService, WriteService};

/// tswrite error types
pub mod error {
    use crate::model::RejectedRecord;
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum Error {
        #[error("Resource not found: {0}")]
        NotFound(String),

        #[error("Conflict: {0}")]
        Conflict(String),

        #[error("{} record(s) rejected", .0.len())]
        RejectedRecords(Vec<RejectedRecord>),

        #[error("Validation error: {0}")]
        Validation(String),

        #[error("Transport error: {0}")]
        Transport(String),

        #[error("Serialization error: {0}")]
        Serialization(String),

        #[error("Configuration error: {0}")]
        Config(String),

        #[error("Internal error: {0}")]
        Internal(String),

        #[error("I/O error: {0}")]
        Io(#[from] std::io::Error),
    }

    impl Error {
        /// Stable wire code, shared by the emulator server and the HTTP client.
        pub fn code(&self) -> &'static str {
            match self {
                Error::NotFound(_) => "ResourceNotFound",
                Error::Conflict(_) => "Conflict",
                Error::RejectedRecords(_) => "RejectedRecords",
                Error::Validation(_) => "Validation",
                Error::Transport(_) => "Transport",
                Error::Serialization(_) => "Serialization",
                Error::Config(_) => "Config",
                Error::Internal(_) | Error::Io(_) => "Internal",
            }
        }
    }

    pub type Result<T> = std::result::Result<T, Error>;
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::error::Error;
    use super::model::RejectedRecord;

    #[test]
    fn test_rejected_records_display() {
        let err = Error::RejectedRecords(vec![
            RejectedRecord::new(0, "bad value"),
            RejectedRecord::new(1, "bad value"),
        ]);
        assert_eq!(err.to_string(), "2 record(s) rejected");
        assert_eq!(err.code(), "RejectedRecords");
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::NotFound("db".into()).code(), "ResourceNotFound");
        assert_eq!(Error::Conflict("db".into()).code(), "Conflict");
        assert_eq!(Error::Internal("boom".into()).code(), "Internal");
    }
}
