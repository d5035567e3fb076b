//! Database and table lifecycle
//!
//! Thin wrappers over [`WriteService`] that turn the expected failures into
//! [`Outcome`] values, plus a [`Paginator`] that walks continuation tokens.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::Outcome;
use crate::error::{Error, Result};
use crate::model::{Database, RetentionProperties, Schema, Table};
use crate::service::{
    CreateDatabaseRequest, CreateTableRequest, ListRequest, Page, UpdateDatabaseRequest,
    UpdateTableRequest, WriteService,
};

/// A list operation that can be called page by page.
#[async_trait]
pub trait Listing: Send + Sync {
    type Item: Send;

    async fn fetch(&self, request: ListRequest) -> Result<Page<Self::Item>>;
}

/// Every database of the service.
pub struct Databases {
    service: Arc<dyn WriteService>,
}

#[async_trait]
impl Listing for Databases {
    type Item = Database;

    async fn fetch(&self, request: ListRequest) -> Result<Page<Database>> {
        self.service.list_databases(request).await
    }
}

/// Every table of one database.
pub struct Tables {
    service: Arc<dyn WriteService>,
    database_name: String,
}

#[async_trait]
impl Listing for Tables {
    type Item = Table;

    async fn fetch(&self, request: ListRequest) -> Result<Page<Table>> {
        self.service.list_tables(&self.database_name, request).await
    }
}

/// Pulls a [`Listing`] one page at a time, feeding back the continuation
/// token until the service stops returning one.
///
/// A token the service already returned once is an error, so a misbehaving
/// endpoint cannot keep the loop alive forever.
pub struct Paginator<L: Listing> {
    listing: L,
    page_size: usize,
    next_token: Option<String>,
    seen_tokens: HashSet<String>,
    pages: usize,
    exhausted: bool,
}

impl<L: Listing> Paginator<L> {
    pub fn new(listing: L, page_size: usize) -> Self {
        Self {
            listing,
            page_size,
            next_token: None,
            seen_tokens: HashSet::new(),
            pages: 0,
            exhausted: false,
        }
    }

    /// Next page, or `None` once the last page has been returned.
    ///
    /// A failed fetch leaves the cursor in place, so the next call retries
    /// the same page.
    pub async fn next_page(&mut self) -> Result<Option<Vec<L::Item>>> {
        if self.exhausted {
            return Ok(None);
        }

        let request = ListRequest {
            max_results: Some(self.page_size),
            next_token: self.next_token.clone(),
        };
        let page = self.listing.fetch(request).await?;
        self.pages += 1;

        match page.next_token {
            Some(token) => {
                if !self.seen_tokens.insert(token.clone()) {
                    self.exhausted = true;
                    return Err(Error::Internal(format!(
                        "List call returned continuation token '{}' twice",
                        token
                    )));
                }
                self.next_token = Some(token);
            }
            None => {
                self.next_token = None;
                self.exhausted = true;
            }
        }

        debug!(page = self.pages, items = page.items.len(), "Fetched page");
        Ok(Some(page.items))
    }

    /// Drains the remaining pages.
    pub async fn collect_all(mut self) -> Result<Vec<L::Item>> {
        let mut items = Vec::new();
        while let Some(page) = self.next_page().await? {
            items.extend(page);
        }
        Ok(items)
    }

    /// Pages fetched so far.
    pub fn pages(&self) -> usize {
        self.pages
    }
}

/// Lifecycle helper for databases and tables.
#[derive(Clone)]
pub struct Lifecycle {
    service: Arc<dyn WriteService>,
    page_size: usize,
}

impl Lifecycle {
    pub fn new(service: Arc<dyn WriteService>, page_size: usize) -> Self {
        Self { service, page_size }
    }

    pub fn service(&self) -> &Arc<dyn WriteService> {
        &self.service
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    // ===== Databases =====

    #[instrument(skip(self, kms_key_id))]
    pub async fn create_database(
        &self,
        database_name: &str,
        kms_key_id: Option<String>,
    ) -> Result<Outcome<Database>> {
        info!("Creating database");
        let request = CreateDatabaseRequest {
            database_name: database_name.to_string(),
            kms_key_id,
        };
        Outcome::from_result(self.service.create_database(request).await)
    }

    #[instrument(skip(self))]
    pub async fn describe_database(&self, database_name: &str) -> Result<Outcome<Database>> {
        Outcome::from_result(self.service.describe_database(database_name).await)
    }

    /// Sets the database's KMS key. Skipped when no key is given.
    #[instrument(skip(self, kms_key_id))]
    pub async fn update_database(
        &self,
        database_name: &str,
        kms_key_id: Option<&str>,
    ) -> Result<Outcome<Database>> {
        let Some(kms_key_id) = kms_key_id else {
            return Ok(Outcome::Skipped(
                "Skipping database update; no KMS key id was given".to_string(),
            ));
        };

        info!("Updating database");
        let request = UpdateDatabaseRequest {
            database_name: database_name.to_string(),
            kms_key_id: kms_key_id.to_string(),
        };
        Outcome::from_result(self.service.update_database(request).await)
    }

    #[instrument(skip(self))]
    pub async fn delete_database(&self, database_name: &str) -> Result<Outcome<()>> {
        info!("Deleting database");
        Outcome::from_result(self.service.delete_database(database_name).await)
    }

    pub fn databases(&self) -> Paginator<Databases> {
        Paginator::new(
            Databases {
                service: self.service.clone(),
            },
            self.page_size,
        )
    }

    /// Every database, across all pages.
    #[instrument(skip(self))]
    pub async fn list_databases(&self) -> Result<Vec<Database>> {
        self.databases().collect_all().await
    }

    // ===== Tables =====

    #[instrument(skip(self, retention, schema))]
    pub async fn create_table(
        &self,
        database_name: &str,
        table_name: &str,
        retention: RetentionProperties,
        schema: Option<Schema>,
    ) -> Result<Outcome<Table>> {
        info!("Creating table");
        let request = CreateTableRequest {
            database_name: database_name.to_string(),
            table_name: table_name.to_string(),
            retention_properties: Some(retention),
            schema,
        };
        Outcome::from_result(self.service.create_table(request).await)
    }

    #[instrument(skip(self))]
    pub async fn describe_table(&self, database_name: &str, table_name: &str) -> Result<Outcome<Table>> {
        Outcome::from_result(self.service.describe_table(database_name, table_name).await)
    }

    #[instrument(skip(self, retention, schema))]
    pub async fn update_table(
        &self,
        database_name: &str,
        table_name: &str,
        retention: Option<RetentionProperties>,
        schema: Option<Schema>,
    ) -> Result<Outcome<Table>> {
        info!("Updating table");
        let request = UpdateTableRequest {
            database_name: database_name.to_string(),
            table_name: table_name.to_string(),
            retention_properties: retention,
            schema,
        };
        Outcome::from_result(self.service.update_table(request).await)
    }

    #[instrument(skip(self))]
    pub async fn delete_table(&self, database_name: &str, table_name: &str) -> Result<Outcome<()>> {
        info!("Deleting table");
        Outcome::from_result(self.service.delete_table(database_name, table_name).await)
    }

    pub fn tables(&self, database_name: &str) -> Paginator<Tables> {
        Paginator::new(
            Tables {
                service: self.service.clone(),
                database_name: database_name.to_string(),
            },
            self.page_size,
        )
    }

    /// Every table of `database_name`, across all pages.
    #[instrument(skip(self))]
    pub async fn list_tables(&self, database_name: &str) -> Result<Outcome<Vec<Table>>> {
        Outcome::from_result(self.tables(database_name).collect_all().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::MemoryService;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn lifecycle() -> Lifecycle {
        Lifecycle::new(Arc::new(MemoryService::default()), 15)
    }

    #[tokio::test]
    async fn test_create_twice_reports_already_exists() {
        let lifecycle = lifecycle();
        let first = lifecycle.create_database("sample_db", None).await.unwrap();
        assert!(first.is_done());

        let second = lifecycle.create_database("sample_db", None).await.unwrap();
        assert!(matches!(second, Outcome::AlreadyExists(_)));

        lifecycle
            .create_table("sample_db", "sample_table", RetentionProperties::new(24, 7), None)
            .await
            .unwrap();
        let again = lifecycle
            .create_table("sample_db", "sample_table", RetentionProperties::new(24, 7), None)
            .await
            .unwrap();
        assert!(matches!(again, Outcome::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_missing_resources_report_not_found() {
        let lifecycle = lifecycle();
        assert!(matches!(
            lifecycle.describe_database("missing_db").await.unwrap(),
            Outcome::NotFound(_)
        ));
        assert!(matches!(
            lifecycle.update_database("missing_db", Some("key")).await.unwrap(),
            Outcome::NotFound(_)
        ));
        assert!(matches!(
            lifecycle.delete_database("missing_db").await.unwrap(),
            Outcome::NotFound(_)
        ));
        assert!(matches!(
            lifecycle.describe_table("missing_db", "t_1").await.unwrap(),
            Outcome::NotFound(_)
        ));
        assert!(matches!(
            lifecycle
                .update_table("missing_db", "t_1", Some(RetentionProperties::new(24, 7)), None)
                .await
                .unwrap(),
            Outcome::NotFound(_)
        ));
        assert!(matches!(
            lifecycle.delete_table("missing_db", "t_1").await.unwrap(),
            Outcome::NotFound(_)
        ));
        assert!(matches!(
            lifecycle.list_tables("missing_db").await.unwrap(),
            Outcome::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_missing_table_in_existing_database_reports_not_found() {
        let lifecycle = lifecycle();
        lifecycle.create_database("sample_db", None).await.unwrap();

        let described = lifecycle.describe_table("sample_db", "missing_table").await.unwrap();
        assert!(matches!(described, Outcome::NotFound(ref m) if m.contains("missing_table")));
        assert!(matches!(
            lifecycle
                .update_table("sample_db", "missing_table", Some(RetentionProperties::new(24, 7)), None)
                .await
                .unwrap(),
            Outcome::NotFound(_)
        ));
        assert!(matches!(
            lifecycle.delete_table("sample_db", "missing_table").await.unwrap(),
            Outcome::NotFound(_)
        ));
        assert!(lifecycle.describe_database("sample_db").await.unwrap().is_done());
    }

    #[tokio::test]
    async fn test_update_database_without_key_is_skipped() {
        let lifecycle = lifecycle();
        lifecycle.create_database("sample_db", None).await.unwrap();
        assert!(matches!(
            lifecycle.update_database("sample_db", None).await.unwrap(),
            Outcome::Skipped(_)
        ));

        let updated = lifecycle
            .update_database("sample_db", Some("custom-key"))
            .await
            .unwrap()
            .done()
            .unwrap();
        assert_eq!(updated.kms_key_id.as_deref(), Some("custom-key"));
    }

    #[tokio::test]
    async fn test_delete_non_empty_database_propagates() {
        let lifecycle = lifecycle();
        lifecycle.create_database("sample_db", None).await.unwrap();
        lifecycle
            .create_table("sample_db", "sample_table", RetentionProperties::new(24, 7), None)
            .await
            .unwrap();
        assert!(matches!(
            lifecycle.delete_database("sample_db").await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_paginator_visits_every_database_once() {
        let lifecycle = lifecycle();
        for i in 0..32 {
            lifecycle.create_database(&format!("db_{:02}", i), None).await.unwrap();
        }

        let mut paginator = lifecycle.databases();
        let mut names = Vec::new();
        while let Some(page) = paginator.next_page().await.unwrap() {
            assert!(page.len() <= 15);
            names.extend(page.into_iter().map(|d| d.database_name));
        }
        assert_eq!(paginator.pages(), 3);
        assert!(paginator.next_page().await.unwrap().is_none());

        let expected: Vec<String> = (0..32).map(|i| format!("db_{:02}", i)).collect();
        assert_eq!(names, expected);
        assert_eq!(lifecycle.list_databases().await.unwrap().len(), 32);
    }

    #[tokio::test]
    async fn test_list_tables_across_pages() {
        let lifecycle = Lifecycle::new(Arc::new(MemoryService::default()), 2);
        lifecycle.create_database("sample_db", None).await.unwrap();
        for name in ["t_a", "t_b", "t_c", "t_d", "t_e"] {
            lifecycle
                .create_table("sample_db", name, RetentionProperties::new(24, 7), None)
                .await
                .unwrap();
        }

        let tables = lifecycle.list_tables("sample_db").await.unwrap().done().unwrap();
        let names: Vec<_> = tables.iter().map(|t| t.table_name.as_str()).collect();
        assert_eq!(names, ["t_a", "t_b", "t_c", "t_d", "t_e"]);
    }

    struct StuckListing {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Listing for StuckListing {
        type Item = usize;

        async fn fetch(&self, _request: ListRequest) -> Result<Page<usize>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Page {
                items: vec![call],
                next_token: Some("same".to_string()),
            })
        }
    }

    #[tokio::test]
    async fn test_repeated_token_stops_pagination() {
        let paginator = Paginator::new(
            StuckListing {
                calls: AtomicUsize::new(0),
            },
            10,
        );
        assert!(matches!(paginator.collect_all().await, Err(Error::Internal(_))));
    }

    /// Pages `[1]`, then `[2, 3]`; the second call fails once.
    struct FlakyListing {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Listing for FlakyListing {
        type Item = usize;

        async fn fetch(&self, request: ListRequest) -> Result<Page<usize>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            match request.next_token.as_deref() {
                None => Ok(Page {
                    items: vec![1],
                    next_token: Some("p2".to_string()),
                }),
                Some("p2") if call == 1 => Err(Error::Transport("connection reset".into())),
                Some("p2") => Ok(Page {
                    items: vec![2, 3],
                    next_token: None,
                }),
                Some(other) => Err(Error::Validation(format!("unexpected token {}", other))),
            }
        }
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_cursor() {
        let mut paginator = Paginator::new(
            FlakyListing {
                calls: AtomicUsize::new(0),
            },
            10,
        );

        assert_eq!(paginator.next_page().await.unwrap(), Some(vec![1]));
        assert!(matches!(paginator.next_page().await, Err(Error::Transport(_))));
        assert_eq!(paginator.next_page().await.unwrap(), Some(vec![2, 3]));
        assert!(paginator.next_page().await.unwrap().is_none());
        assert_eq!(paginator.pages(), 2);
    }
}
