//! End-to-end sample runs

use std::io::Write;
use std::sync::Arc;
use tracing::{info, instrument};

use super::ingest::Ingestor;
use super::lifecycle::Lifecycle;
use super::report::Printer;
use super::upsert::{UpsertReport, UpsertWorkflow};
use super::Outcome;
use crate::clock::Clock;
use crate::config::SampleConfig;
use crate::error::Result;
use crate::service::WriteService;

/// What a basic run observed.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub databases: Vec<String>,
    pub tables: Vec<String>,
    pub upsert: UpsertReport,
    pub cleaned_up: bool,
}

/// CRUD and simple ingestion against the configured database and table.
pub struct BasicSample {
    lifecycle: Lifecycle,
    clock: Arc<dyn Clock>,
    config: SampleConfig,
}

impl BasicSample {
    pub fn new(service: Arc<dyn WriteService>, clock: Arc<dyn Clock>, config: SampleConfig) -> Self {
        Self {
            lifecycle: Lifecycle::new(service, config.page_size),
            clock,
            config,
        }
    }

    fn ingestor(&self) -> Ingestor {
        Ingestor::new(
            self.lifecycle.service().clone(),
            &self.config.database_name,
            &self.config.table_name,
        )
    }

    /// Runs every step in order. Unless `skip_deletion` is set the table and
    /// database are deleted at the end, also when a step failed.
    #[instrument(skip(self, printer), fields(database = %self.config.database_name, table = %self.config.table_name))]
    pub async fn run<W: Write + Send>(&self, printer: &mut Printer<W>) -> Result<RunSummary> {
        let result = self.run_steps(printer).await;

        if self.config.skip_deletion {
            return result;
        }

        let cleanup = Cleanup::new(self.lifecycle.clone(), self.config.clone())
            .run(printer)
            .await;
        let mut summary = result?;
        cleanup?;
        summary.cleaned_up = true;
        Ok(summary)
    }

    async fn run_steps<W: Write + Send>(&self, printer: &mut Printer<W>) -> Result<RunSummary> {
        let database = &self.config.database_name;
        let table = &self.config.table_name;

        let created = self
            .lifecycle
            .create_database(database, self.config.kms_key_id.clone())
            .await?;
        printer.outcome("Create database", &created)?;

        let described = self.lifecycle.describe_database(database).await?;
        printer.outcome("Describe database", &described)?;

        let databases = self.lifecycle.list_databases().await?;
        printer.outcome("List databases", &Outcome::Done(databases.clone()))?;

        let updated = self
            .lifecycle
            .update_database(database, self.config.kms_key_id.as_deref())
            .await?;
        printer.outcome("Update database", &updated)?;

        let created = self
            .lifecycle
            .create_table(database, table, self.config.retention(), None)
            .await?;
        printer.outcome("Create table", &created)?;

        let described = self.lifecycle.describe_table(database, table).await?;
        printer.outcome("Describe table", &described)?;

        let tables = self.lifecycle.list_tables(database).await?;
        printer.outcome("List tables", &tables)?;

        let updated = self
            .lifecycle
            .update_table(database, table, Some(self.config.retention()), None)
            .await?;
        printer.outcome("Update table", &updated)?;

        let ingestor = self.ingestor();
        let written = ingestor.write_records(self.clock.now_millis()).await?;
        printer.outcome("Write records", &written)?;

        let written = ingestor
            .write_records_with_common_attributes(self.clock.now_millis())
            .await?;
        printer.outcome("Write records with common attributes", &written)?;

        printer.line("Writing records with upsert")?;
        let upsert = UpsertWorkflow::new(
            self.lifecycle.service().clone(),
            self.clock.clone(),
            database.as_str(),
            table.as_str(),
        )
        .run()
        .await?;
        printer.upsert_report(&upsert)?;

        let written = ingestor
            .write_multi_measure_records(self.clock.now_millis())
            .await?;
        printer.outcome("Write multi-measure records", &written)?;

        info!("Basic sample finished");
        Ok(RunSummary {
            databases: databases.into_iter().map(|d| d.database_name).collect(),
            tables: tables
                .done()
                .unwrap_or_default()
                .into_iter()
                .map(|t| t.table_name)
                .collect(),
            upsert,
            cleaned_up: false,
        })
    }
}

/// Deletes the configured table, then the database.
pub struct Cleanup {
    lifecycle: Lifecycle,
    config: SampleConfig,
}

impl Cleanup {
    pub fn new(lifecycle: Lifecycle, config: SampleConfig) -> Self {
        Self { lifecycle, config }
    }

    #[instrument(skip(self, printer), fields(database = %self.config.database_name))]
    pub async fn run<W: Write + Send>(&self, printer: &mut Printer<W>) -> Result<()> {
        let deleted = self
            .lifecycle
            .delete_table(&self.config.database_name, &self.config.table_name)
            .await?;
        printer.outcome("Delete table", &deleted)?;

        let deleted = self
            .lifecycle
            .delete_database(&self.config.database_name)
            .await?;
        printer.outcome("Delete database", &deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::sample::UpsertStep;
    use crate::service::MemoryService;

    fn config(skip_deletion: bool) -> SampleConfig {
        SampleConfig {
            skip_deletion,
            ..SampleConfig::default()
        }
    }

    #[tokio::test]
    async fn test_basic_run_keeps_resources() {
        let service = Arc::new(MemoryService::default());
        let sample = BasicSample::new(service.clone(), Arc::new(ManualClock::stepping(1_000, 5)), config(true));
        let mut printer = Printer::new(Vec::new());

        let summary = sample.run(&mut printer).await.unwrap();
        assert_eq!(summary.databases, ["devops_multi_sample_application"]);
        assert_eq!(summary.tables, ["host_metrics_sample_application"]);
        assert!(!summary.cleaned_up);
        assert!(summary
            .upsert
            .step(UpsertStep::LowerVersion)
            .unwrap()
            .outcome
            .rejected()
            .iter()
            .all(|r| r.existing_version.is_some()));

        let output = String::from_utf8(printer.into_inner()).unwrap();
        assert!(output.contains("Skipping database update"));
        assert!(output.contains("Rejected record existing version:"));

        // A second run finds everything in place.
        let mut printer = Printer::new(Vec::new());
        sample.run(&mut printer).await.unwrap();
        let output = String::from_utf8(printer.into_inner()).unwrap();
        assert!(output.contains("already exists. Skipping."));
    }

    #[tokio::test]
    async fn test_basic_run_with_deletion() {
        let service = Arc::new(MemoryService::default());
        let mut config = config(false);
        config.kms_key_id = Some("custom-key".to_string());
        let sample = BasicSample::new(service.clone(), Arc::new(ManualClock::stepping(1_000, 5)), config);

        let summary = sample.run(&mut Printer::new(Vec::new())).await.unwrap();
        assert!(summary.cleaned_up);
        assert!(service
            .record_count("devops_multi_sample_application", "host_metrics_sample_application")
            .is_none());
    }

    #[tokio::test]
    async fn test_cleanup_of_missing_resources_is_not_fatal() {
        let lifecycle = Lifecycle::new(Arc::new(MemoryService::default()), 15);
        let mut printer = Printer::new(Vec::new());
        Cleanup::new(lifecycle, config(false)).run(&mut printer).await.unwrap();

        let output = String::from_utf8(printer.into_inner()).unwrap();
        assert!(output.contains("does not exist"));
    }
}
