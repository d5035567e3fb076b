//! Route definitions for the emulator server

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers;

/// Resource API under `/v1`
pub fn service_routes() -> Router {
    Router::new()
        .route(
            "/v1/databases",
            get(handlers::list_databases).post(handlers::create_database),
        )
        .route(
            "/v1/databases/:database",
            get(handlers::describe_database)
                .patch(handlers::update_database)
                .delete(handlers::delete_database),
        )
        .route(
            "/v1/databases/:database/tables",
            get(handlers::list_tables).post(handlers::create_table),
        )
        .route(
            "/v1/databases/:database/tables/:table",
            get(handlers::describe_table)
                .patch(handlers::update_table)
                .delete(handlers::delete_table),
        )
        .route(
            "/v1/databases/:database/tables/:table/records",
            post(handlers::write_records),
        )
}

/// Health and metrics
pub fn health_routes() -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/_metrics", get(handlers::metrics_endpoint))
}
