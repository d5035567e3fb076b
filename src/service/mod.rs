//! Service layer
//!
//! # Architecture
//!
//! The sample talks to a time-series write service through the
//! [`WriteService`] trait. Two implementations are provided:
//!
//! - [`MemoryService`]: in-process emulator holding the catalog and the
//!   latest value of every record identity
//! - [`HttpService`]: JSON/HTTP client for a remote endpoint, normally the
//!   emulator started with `tswrite serve`
//!
//! Both report failures through [`crate::error::Error`], so callers see the
//! same error kinds whichever one they use.

pub mod http;
pub mod memory;
pub mod wire;

pub use http::HttpService;
pub use memory::{MemoryService, StoredRecord};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{
    Database, RetentionProperties, Schema, Table, WriteRecordsRequest, WriteRecordsResponse,
};

/// Page size used when a list call does not ask for one.
pub const DEFAULT_PAGE_SIZE: usize = 20;
/// Largest page a list call may ask for.
pub const MAX_PAGE_SIZE: usize = 20;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDatabaseRequest {
    pub database_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kms_key_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDatabaseRequest {
    pub database_name: String,
    pub kms_key_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTableRequest {
    pub database_name: String,
    pub table_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_properties: Option<RetentionProperties>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTableRequest {
    pub database_name: String,
    pub table_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_properties: Option<RetentionProperties>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
}

/// One list call: page size and the token returned by the previous call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_results: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

impl ListRequest {
    pub fn first(max_results: usize) -> Self {
        Self {
            max_results: Some(max_results),
            next_token: None,
        }
    }

    pub fn after(max_results: usize, next_token: impl Into<String>) -> Self {
        Self {
            max_results: Some(max_results),
            next_token: Some(next_token.into()),
        }
    }
}

/// One page of a listing. `next_token` is `None` on the last page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

/// Operations consumed from the time-series write service.
#[async_trait]
pub trait WriteService: Send + Sync {
    async fn create_database(&self, request: CreateDatabaseRequest) -> Result<Database>;

    async fn describe_database(&self, database_name: &str) -> Result<Database>;

    async fn list_databases(&self, request: ListRequest) -> Result<Page<Database>>;

    async fn update_database(&self, request: UpdateDatabaseRequest) -> Result<Database>;

    /// Fails with a validation error while the database still has tables.
    async fn delete_database(&self, database_name: &str) -> Result<()>;

    async fn create_table(&self, request: CreateTableRequest) -> Result<Table>;

    async fn describe_table(&self, database_name: &str, table_name: &str) -> Result<Table>;

    async fn list_tables(&self, database_name: &str, request: ListRequest) -> Result<Page<Table>>;

    async fn update_table(&self, request: UpdateTableRequest) -> Result<Table>;

    async fn delete_table(&self, database_name: &str, table_name: &str) -> Result<()>;

    /// Applies a batch. Records that fail are reported through
    /// `Error::RejectedRecords`; the others stay applied.
    async fn write_records(&self, request: WriteRecordsRequest) -> Result<WriteRecordsResponse>;
}
