//! HTTP client for a remote write service
//!
//! Speaks the emulator's JSON API (see `server::routes`). Non-2xx responses
//! carry an [`ErrorBody`] that is mapped back to the error kind the server reported, so
//! not-found, conflict and rejected records look the same as with
//! [`super::MemoryService`].

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument};

use super::wire::{CreateTableBody, ErrorBody, UpdateDatabaseBody, UpdateTableBody, WriteRecordsBody};
use super::{
    CreateDatabaseRequest, CreateTableRequest, ListRequest, Page, UpdateDatabaseRequest,
    UpdateTableRequest, WriteService,
};
use crate::error::{Error, Result};
use crate::model::{Database, Table, WriteRecordsRequest, WriteRecordsResponse};

/// [`WriteService`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpService {
    client: Client,
    base_url: Url,
}

impl HttpService {
    /// Creates a client for `endpoint`, e.g. `http://127.0.0.1:8086`.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(endpoint)
            .map_err(|e| Error::Config(format!("Invalid endpoint '{}': {}", endpoint, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "Endpoint '{}' cannot be used as a base URL",
                endpoint
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    pub fn endpoint(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| Error::Config(format!("Invalid endpoint '{}'", self.base_url)))?;
            path.pop_if_empty().push("v1").extend(segments);
        }
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        let status = response.status();
        debug!(status = status.as_u16(), "Response received");

        if status.is_success() {
            response
                .json::<T>()
                .await
                .map_err(|e| Error::Serialization(format!("Invalid response body: {}", e)))
        } else {
            Err(Self::error_from(status, response).await)
        }
    }

    async fn send_empty(&self, request: RequestBuilder) -> Result<()> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        let status = response.status();
        debug!(status = status.as_u16(), "Response received");

        if status.is_success() {
            Ok(())
        } else {
            Err(Self::error_from(status, response).await)
        }
    }

    async fn error_from(status: StatusCode, response: reqwest::Response) -> Error {
        let text = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => body.into_error(),
            Err(_) => Error::Internal(format!("HTTP {}: {}", status, text)),
        }
    }
}

#[async_trait]
impl WriteService for HttpService {
    #[instrument(skip(self, request), fields(database = %request.database_name))]
    async fn create_database(&self, request: CreateDatabaseRequest) -> Result<Database> {
        let url = self.url(&["databases"])?;
        self.send(self.client.post(url).json(&request)).await
    }

    #[instrument(skip(self))]
    async fn describe_database(&self, database_name: &str) -> Result<Database> {
        let url = self.url(&["databases", database_name])?;
        self.send(self.client.get(url)).await
    }

    #[instrument(skip(self))]
    async fn list_databases(&self, request: ListRequest) -> Result<Page<Database>> {
        let url = self.url(&["databases"])?;
        self.send(self.client.get(url).query(&request)).await
    }

    #[instrument(skip(self, request), fields(database = %request.database_name))]
    async fn update_database(&self, request: UpdateDatabaseRequest) -> Result<Database> {
        let url = self.url(&["databases", &request.database_name])?;
        let body = UpdateDatabaseBody {
            kms_key_id: request.kms_key_id,
        };
        self.send(self.client.patch(url).json(&body)).await
    }

    #[instrument(skip(self))]
    async fn delete_database(&self, database_name: &str) -> Result<()> {
        let url = self.url(&["databases", database_name])?;
        self.send_empty(self.client.delete(url)).await
    }

    #[instrument(skip(self, request), fields(database = %request.database_name, table = %request.table_name))]
    async fn create_table(&self, request: CreateTableRequest) -> Result<Table> {
        let url = self.url(&["databases", &request.database_name, "tables"])?;
        let body = CreateTableBody {
            table_name: request.table_name,
            retention_properties: request.retention_properties,
            schema: request.schema,
        };
        self.send(self.client.post(url).json(&body)).await
    }

    #[instrument(skip(self))]
    async fn describe_table(&self, database_name: &str, table_name: &str) -> Result<Table> {
        let url = self.url(&["databases", database_name, "tables", table_name])?;
        self.send(self.client.get(url)).await
    }

    #[instrument(skip(self))]
    async fn list_tables(&self, database_name: &str, request: ListRequest) -> Result<Page<Table>> {
        let url = self.url(&["databases", database_name, "tables"])?;
        self.send(self.client.get(url).query(&request)).await
    }

    #[instrument(skip(self, request), fields(database = %request.database_name, table = %request.table_name))]
    async fn update_table(&self, request: UpdateTableRequest) -> Result<Table> {
        let url = self.url(&["databases", &request.database_name, "tables", &request.table_name])?;
        let body = UpdateTableBody {
            retention_properties: request.retention_properties,
            schema: request.schema,
        };
        self.send(self.client.patch(url).json(&body)).await
    }

    #[instrument(skip(self))]
    async fn delete_table(&self, database_name: &str, table_name: &str) -> Result<()> {
        let url = self.url(&["databases", database_name, "tables", table_name])?;
        self.send_empty(self.client.delete(url)).await
    }

    #[instrument(
        skip(self, request),
        fields(database = %request.database_name, table = %request.table_name, records = request.records.len())
    )]
    async fn write_records(&self, request: WriteRecordsRequest) -> Result<WriteRecordsResponse> {
        let url = self.url(&[
            "databases",
            &request.database_name,
            "tables",
            &request.table_name,
            "records",
        ])?;
        let body = WriteRecordsBody {
            common_attributes: request.common_attributes,
            records: request.records,
        };
        self.send(self.client.post(url).json(&body)).await
    }
}
