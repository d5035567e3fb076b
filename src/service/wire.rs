//! JSON bodies of the emulator HTTP API
//!
//! Shared by the axum handlers and [`super::HttpService`] so both ends agree
//! on field names. Resource names travel in the URL path, not in bodies.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::model::{Record, RejectedRecord, RetentionProperties, Schema};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDatabaseBody {
    pub kms_key_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTableBody {
    pub table_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_properties: Option<RetentionProperties>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTableBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_properties: Option<RetentionProperties>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteRecordsBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common_attributes: Option<Record>,
    pub records: Vec<Record>,
}

/// Error envelope returned with every non-2xx status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejected_records: Vec<RejectedRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ErrorBody {
    pub fn from_error(err: &Error) -> Self {
        let (message, rejected_records) = match err {
            Error::NotFound(m)
            | Error::Conflict(m)
            | Error::Validation(m)
            | Error::Transport(m)
            | Error::Serialization(m)
            | Error::Config(m)
            | Error::Internal(m) => (m.clone(), Vec::new()),
            Error::RejectedRecords(rejected) => (err.to_string(), rejected.clone()),
            Error::Io(e) => (e.to_string(), Vec::new()),
        };

        Self {
            code: err.code().to_string(),
            message,
            rejected_records,
            request_id: Some(uuid::Uuid::new_v4().to_string()),
        }
    }

    /// Maps the envelope back to the error kind the server reported.
    pub fn into_error(self) -> Error {
        match self.code.as_str() {
            "ResourceNotFound" => Error::NotFound(self.message),
            "Conflict" => Error::Conflict(self.message),
            "RejectedRecords" => Error::RejectedRecords(self.rejected_records),
            "Validation" => Error::Validation(self.message),
            "Serialization" => Error::Serialization(self.message),
            _ => Error::Internal(format!("{}: {}", self.code, self.message)),
        }
    }
}
