//! HTTP handlers for the emulator API
//!
//! Each handler forwards to the shared [`WriteService`](crate::service::WriteService)
//! and maps [`Error`] to a status code plus an [`ErrorBody`].

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Extension, FromRequest, FromRequestParts, Json, Path, Query,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use super::{metrics, AppState};
use crate::error::Error;
use crate::model::{Database, Table, WriteRecordsRequest, WriteRecordsResponse};
use crate::service::wire::{
    CreateTableBody, ErrorBody, UpdateDatabaseBody, UpdateTableBody, WriteRecordsBody,
};
use crate::service::{
    CreateDatabaseRequest, CreateTableRequest, ListRequest, Page, UpdateDatabaseRequest,
    UpdateTableRequest,
};

/// Error returned by handlers.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

/// HTTP status for an error kind.
pub fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::Conflict(_) => StatusCode::CONFLICT,
        Error::RejectedRecords(_) | Error::Validation(_) | Error::Serialization(_) => {
            StatusCode::BAD_REQUEST
        }
        Error::Transport(_) => StatusCode::BAD_GATEWAY,
        Error::Config(_) | Error::Internal(_) | Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        } else {
            warn!(status = status.as_u16(), error = %self.0, "Request refused");
        }
        (status, Json(ErrorBody::from_error(&self.0))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(Error::Validation(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self(Error::Validation(rejection.body_text()))
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// JSON body whose parse failures come back as an [`ErrorBody`].
#[derive(FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Query string whose parse failures come back as an [`ErrorBody`].
#[derive(FromRequestParts)]
#[from_request(via(Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
}

/// GET /health
pub async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        version: crate::VERSION,
    })
}

/// GET /_metrics
pub async fn metrics_endpoint() -> String {
    metrics::export_metrics()
}

// ===== Database Handlers =====

/// POST /v1/databases
#[instrument(skip(state, request), fields(database = %request.database_name))]
pub async fn create_database(
    Extension(state): Extension<Arc<AppState>>,
    ApiJson(request): ApiJson<CreateDatabaseRequest>,
) -> ApiResult<(StatusCode, Json<Database>)> {
    let result = state.service.create_database(request).await;
    metrics::observe("create_database", &result);
    Ok((StatusCode::CREATED, Json(result?)))
}

/// GET /v1/databases/:database
#[instrument(skip(state))]
pub async fn describe_database(
    Extension(state): Extension<Arc<AppState>>,
    Path(database): Path<String>,
) -> ApiResult<Json<Database>> {
    let result = state.service.describe_database(&database).await;
    metrics::observe("describe_database", &result);
    Ok(Json(result?))
}

/// GET /v1/databases?maxResults=&nextToken=
#[instrument(skip(state))]
pub async fn list_databases(
    Extension(state): Extension<Arc<AppState>>,
    ApiQuery(request): ApiQuery<ListRequest>,
) -> ApiResult<Json<Page<Database>>> {
    let result = state.service.list_databases(request).await;
    metrics::observe("list_databases", &result);
    Ok(Json(result?))
}

/// PATCH /v1/databases/:database
#[instrument(skip(state, body))]
pub async fn update_database(
    Extension(state): Extension<Arc<AppState>>,
    Path(database): Path<String>,
    ApiJson(body): ApiJson<UpdateDatabaseBody>,
) -> ApiResult<Json<Database>> {
    let result = state
        .service
        .update_database(UpdateDatabaseRequest {
            database_name: database,
            kms_key_id: body.kms_key_id,
        })
        .await;
    metrics::observe("update_database", &result);
    Ok(Json(result?))
}

/// DELETE /v1/databases/:database
#[instrument(skip(state))]
pub async fn delete_database(
    Extension(state): Extension<Arc<AppState>>,
    Path(database): Path<String>,
) -> ApiResult<StatusCode> {
    let result = state.service.delete_database(&database).await;
    metrics::observe("delete_database", &result);
    result?;
    info!(database = %database, "Database deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ===== Table Handlers =====

/// POST /v1/databases/:database/tables
#[instrument(skip(state, body), fields(table = %body.table_name))]
pub async fn create_table(
    Extension(state): Extension<Arc<AppState>>,
    Path(database): Path<String>,
    ApiJson(body): ApiJson<CreateTableBody>,
) -> ApiResult<(StatusCode, Json<Table>)> {
    let result = state
        .service
        .create_table(CreateTableRequest {
            database_name: database,
            table_name: body.table_name,
            retention_properties: body.retention_properties,
            schema: body.schema,
        })
        .await;
    metrics::observe("create_table", &result);
    Ok((StatusCode::CREATED, Json(result?)))
}

/// GET /v1/databases/:database/tables/:table
#[instrument(skip(state))]
pub async fn describe_table(
    Extension(state): Extension<Arc<AppState>>,
    Path((database, table)): Path<(String, String)>,
) -> ApiResult<Json<Table>> {
    let result = state.service.describe_table(&database, &table).await;
    metrics::observe("describe_table", &result);
    Ok(Json(result?))
}

/// GET /v1/databases/:database/tables?maxResults=&nextToken=
#[instrument(skip(state))]
pub async fn list_tables(
    Extension(state): Extension<Arc<AppState>>,
    Path(database): Path<String>,
    ApiQuery(request): ApiQuery<ListRequest>,
) -> ApiResult<Json<Page<Table>>> {
    let result = state.service.list_tables(&database, request).await;
    metrics::observe("list_tables", &result);
    Ok(Json(result?))
}

/// PATCH /v1/databases/:database/tables/:table
#[instrument(skip(state, body))]
pub async fn update_table(
    Extension(state): Extension<Arc<AppState>>,
    Path((database, table)): Path<(String, String)>,
    ApiJson(body): ApiJson<UpdateTableBody>,
) -> ApiResult<Json<Table>> {
    let result = state
        .service
        .update_table(UpdateTableRequest {
            database_name: database,
            table_name: table,
            retention_properties: body.retention_properties,
            schema: body.schema,
        })
        .await;
    metrics::observe("update_table", &result);
    Ok(Json(result?))
}

/// DELETE /v1/databases/:database/tables/:table
#[instrument(skip(state))]
pub async fn delete_table(
    Extension(state): Extension<Arc<AppState>>,
    Path((database, table)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let result = state.service.delete_table(&database, &table).await;
    metrics::observe("delete_table", &result);
    result?;
    info!(database = %database, table = %table, "Table deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ===== Ingestion =====

/// POST /v1/databases/:database/tables/:table/records
#[instrument(skip(state, body), fields(records = body.records.len()))]
pub async fn write_records(
    Extension(state): Extension<Arc<AppState>>,
    Path((database, table)): Path<(String, String)>,
    ApiJson(body): ApiJson<WriteRecordsBody>,
) -> ApiResult<Json<WriteRecordsResponse>> {
    let batch_size = body.records.len();
    let request = WriteRecordsRequest {
        database_name: database,
        table_name: table,
        common_attributes: body.common_attributes,
        records: body.records,
    };

    let result = state.service.write_records(request).await;
    metrics::observe("write_records", &result);
    metrics::observe_write(batch_size, &result);
    Ok(Json(result?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(&Error::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_for(&Error::Conflict("x".into())), StatusCode::CONFLICT);
        assert_eq!(
            status_for(&Error::RejectedRecords(vec![])),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&Error::Internal("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_api_error_response_status() {
        let response = ApiError(Error::Conflict("Database x already exists".into())).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
