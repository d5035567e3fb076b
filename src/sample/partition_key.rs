//! Composite partition key sample
//!
//! Dimension key: a table keyed on `hostId` accepts records without that
//! dimension while enforcement is `OPTIONAL` and rejects them once it is
//! `REQUIRED`. Measure key: a table keyed on the measure name accepts the
//! same batch unconditionally.

use std::io::Write;
use std::sync::Arc;
use tracing::{info, instrument};

use super::ingest::{Ingestor, CPU_MEMORY, CPU_UTILIZATION, MEMORY_UTILIZATION};
use super::lifecycle::Lifecycle;
use super::report::Printer;
use super::Outcome;
use crate::clock::Clock;
use crate::config::SampleConfig;
use crate::error::Result;
use crate::model::{
    Dimension, MeasureValue, MeasureValueType, PartitionKeyEnforcement, Record, Schema,
    WriteRecordsResponse,
};
use crate::service::WriteService;

pub const DIMENSION_KEY_TABLE: &str = "host_metrics_dim_pk";
pub const MEASURE_KEY_TABLE: &str = "host_metrics_measure_pk";

/// High-cardinality dimension used as the partition key.
pub const PARTITION_KEY_DIMENSION: &str = "hostId";
/// Dimension name that does not match the partition key.
pub const OTHER_DIMENSION: &str = "hostIdDiff";

/// Common attributes and records of one write. The host dimension is named
/// `host_dimension`, so the batch may or may not carry the partition key.
pub fn partition_key_batch(time_ms: i64, host_dimension: &str) -> (Record, Vec<Record>) {
    let common = Record::new()
        .with_dimensions(vec![
            Dimension::new("region", "us-east-1"),
            Dimension::new("az", "az1"),
            Dimension::new(host_dimension, "host1"),
        ])
        .with_time(time_ms);

    let records = vec![
        Record::new().with_measure(CPU_UTILIZATION, "13.5", MeasureValueType::Double),
        Record::new().with_measure(MEMORY_UTILIZATION, "40", MeasureValueType::Double),
        Record::new().with_multi_measure(
            CPU_MEMORY,
            vec![
                MeasureValue::new(CPU_UTILIZATION, "13.5", MeasureValueType::Double),
                MeasureValue::new(MEMORY_UTILIZATION, "40", MeasureValueType::Double),
            ],
        ),
    ];

    (common, records)
}

/// Write outcomes of each phase.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionKeyReport {
    /// Records without the key, `OPTIONAL` enforcement
    pub optional_missing_key: Outcome<WriteRecordsResponse>,
    /// Records with the key, `REQUIRED` enforcement
    pub required_with_key: Outcome<WriteRecordsResponse>,
    /// Records without the key, `REQUIRED` enforcement
    pub required_missing_key: Outcome<WriteRecordsResponse>,
    /// Any records, measure-name key
    pub measure_key: Outcome<WriteRecordsResponse>,
}

pub struct CompositePartitionKeySample {
    lifecycle: Lifecycle,
    clock: Arc<dyn Clock>,
    config: SampleConfig,
}

impl CompositePartitionKeySample {
    pub fn new(service: Arc<dyn WriteService>, clock: Arc<dyn Clock>, config: SampleConfig) -> Self {
        Self {
            lifecycle: Lifecycle::new(service, config.page_size),
            clock,
            config,
        }
    }

    /// Runs both samples. The tables and the database are deleted afterwards
    /// unless `skip_deletion` is set, also when a step failed.
    #[instrument(skip(self, printer), fields(database = %self.config.database_name))]
    pub async fn run<W: Write + Send>(&self, printer: &mut Printer<W>) -> Result<PartitionKeyReport> {
        let database = &self.config.database_name;
        let created = self
            .lifecycle
            .create_database(database, self.config.kms_key_id.clone())
            .await?;
        printer.outcome("Create database", &created)?;

        let result = self.run_samples(printer).await;

        if !self.config.skip_deletion {
            let cleanup = self.cleanup(printer).await;
            let report = result?;
            cleanup?;
            return Ok(report);
        }
        result
    }

    async fn run_samples<W: Write + Send>(&self, printer: &mut Printer<W>) -> Result<PartitionKeyReport> {
        let database = &self.config.database_name;

        printer.line("Starting example for dimension type partition key")?;
        let optional = Schema::dimension_key(PARTITION_KEY_DIMENSION, PartitionKeyEnforcement::Optional);
        let created = self
            .lifecycle
            .create_table(database, DIMENSION_KEY_TABLE, self.config.retention(), Some(optional))
            .await?;
        printer.outcome("Create table", &created)?;
        let described = self.lifecycle.describe_table(database, DIMENSION_KEY_TABLE).await?;
        printer.outcome("Describe table", &described)?;

        printer.line("Writing records without the partition key dimension; enforcement is OPTIONAL so they are accepted")?;
        let optional_missing_key = self.write(DIMENSION_KEY_TABLE, OTHER_DIMENSION).await?;
        printer.outcome("Write records", &optional_missing_key)?;

        let required = Schema::dimension_key(PARTITION_KEY_DIMENSION, PartitionKeyEnforcement::Required);
        let updated = self
            .lifecycle
            .update_table(database, DIMENSION_KEY_TABLE, None, Some(required))
            .await?;
        printer.outcome("Update table", &updated)?;
        let described = self.lifecycle.describe_table(database, DIMENSION_KEY_TABLE).await?;
        printer.outcome("Describe table", &described)?;

        printer.line("Writing records with the partition key dimension")?;
        let required_with_key = self.write(DIMENSION_KEY_TABLE, PARTITION_KEY_DIMENSION).await?;
        printer.outcome("Write records", &required_with_key)?;

        printer.line("Writing records without the partition key dimension; enforcement is REQUIRED so they are rejected")?;
        let required_missing_key = self.write(DIMENSION_KEY_TABLE, OTHER_DIMENSION).await?;
        printer.outcome("Write records", &required_missing_key)?;

        printer.line("Starting example for measure name type partition key")?;
        let created = self
            .lifecycle
            .create_table(database, MEASURE_KEY_TABLE, self.config.retention(), Some(Schema::measure_key()))
            .await?;
        printer.outcome("Create table", &created)?;
        let described = self.lifecycle.describe_table(database, MEASURE_KEY_TABLE).await?;
        printer.outcome("Describe table", &described)?;

        let measure_key = self.write(MEASURE_KEY_TABLE, PARTITION_KEY_DIMENSION).await?;
        printer.outcome("Write records", &measure_key)?;

        Ok(PartitionKeyReport {
            optional_missing_key,
            required_with_key,
            required_missing_key,
            measure_key,
        })
    }

    async fn write(&self, table_name: &str, host_dimension: &str) -> Result<Outcome<WriteRecordsResponse>> {
        let ingestor = Ingestor::new(
            self.lifecycle.service().clone(),
            &self.config.database_name,
            table_name,
        );
        let (common, records) = partition_key_batch(self.clock.now_millis(), host_dimension);
        ingestor.write(records, Some(common)).await
    }

    async fn cleanup<W: Write + Send>(&self, printer: &mut Printer<W>) -> Result<()> {
        let database = &self.config.database_name;
        info!("Cleaning up partition key sample");
        for table in [DIMENSION_KEY_TABLE, MEASURE_KEY_TABLE] {
            let deleted = self.lifecycle.delete_table(database, table).await?;
            printer.outcome(&format!("Delete table {}", table), &deleted)?;
        }
        let deleted = self.lifecycle.delete_database(database).await?;
        printer.outcome("Delete database", &deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::service::MemoryService;

    fn sample(service: Arc<MemoryService>, skip_deletion: bool) -> CompositePartitionKeySample {
        let config = SampleConfig {
            skip_deletion,
            ..SampleConfig::default()
        };
        CompositePartitionKeySample::new(service, Arc::new(ManualClock::stepping(1_000, 10)), config)
    }

    #[tokio::test]
    async fn test_enforcement_levels() {
        let service = Arc::new(MemoryService::default());
        let mut printer = Printer::new(Vec::new());
        let report = sample(service.clone(), true).run(&mut printer).await.unwrap();

        assert_eq!(report.optional_missing_key.as_done().unwrap().records_ingested.total, 3);
        assert_eq!(report.required_with_key.as_done().unwrap().records_ingested.total, 3);
        assert_eq!(report.measure_key.as_done().unwrap().records_ingested.total, 3);

        let rejected = report.required_missing_key.rejected();
        assert_eq!(rejected.len(), 3);
        assert!(rejected.iter().all(|r| r.reason.contains(PARTITION_KEY_DIMENSION)));

        let output = String::from_utf8(printer.into_inner()).unwrap();
        assert!(output.contains("RecordIndex 2 : "));
        assert!(service
            .record_count("devops_multi_sample_application", DIMENSION_KEY_TABLE)
            .is_some());
    }

    #[tokio::test]
    async fn test_cleanup_removes_everything() {
        let service = Arc::new(MemoryService::default());
        let mut printer = Printer::new(Vec::new());
        sample(service.clone(), false).run(&mut printer).await.unwrap();

        assert!(matches!(
            service.describe_database("devops_multi_sample_application").await,
            Err(crate::error::Error::NotFound(_))
        ));
    }
}
