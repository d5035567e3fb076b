//! Write batches and their results

use serde::{Deserialize, Serialize};

use super::record::Record;

/// Largest batch a single write call accepts.
pub const MAX_RECORDS_PER_WRITE: usize = 100;

/// A batch of records for one table, plus optional common attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteRecordsRequest {
    pub database_name: String,
    pub table_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common_attributes: Option<Record>,
    pub records: Vec<Record>,
}

impl WriteRecordsRequest {
    pub fn new(database_name: impl Into<String>, table_name: impl Into<String>, records: Vec<Record>) -> Self {
        Self {
            database_name: database_name.into(),
            table_name: table_name.into(),
            common_attributes: None,
            records,
        }
    }

    pub fn with_common_attributes(mut self, common: Record) -> Self {
        self.common_attributes = Some(common);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordsIngested {
    pub total: usize,
}

/// Result of a fully accepted write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteRecordsResponse {
    pub records_ingested: RecordsIngested,
    pub status_code: u16,
}

/// Why one record of a batch was not applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedRecord {
    /// Position of the record in the batch.
    pub record_index: usize,
    pub reason: String,
    /// Version currently stored for the record's identity, when the
    /// rejection is a version conflict.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_version: Option<i64>,
}

impl RejectedRecord {
    pub fn new(record_index: usize, reason: impl Into<String>) -> Self {
        Self {
            record_index,
            reason: reason.into(),
            existing_version: None,
        }
    }

    pub fn conflict(record_index: usize, reason: impl Into<String>, existing_version: i64) -> Self {
        Self {
            existing_version: Some(existing_version),
            ..Self::new(record_index, reason)
        }
    }
}
