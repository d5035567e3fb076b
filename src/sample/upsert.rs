//! Upsert via record versions
//!
//! The workflow writes the same two records four times:
//!
//! 1. `FirstWrite` with version = now: accepted
//! 2. `IdempotentRetry`, the identical request: accepted again
//! 3. `LowerVersion`, new values at version - 1: every record rejected
//! 4. `HigherVersion`, new values at a fresh version: accepted
//!
//! Rejections are recorded in the report and the next step runs anyway.

use std::fmt;
use std::sync::Arc;
use tracing::{info, instrument};

use super::ingest::{common_attributes, measure_records, Ingestor};
use super::Outcome;
use crate::clock::Clock;
use crate::error::Result;
use crate::model::WriteRecordsResponse;
use crate::service::WriteService;

pub const INITIAL_CPU: &str = "13.5";
pub const INITIAL_MEMORY: &str = "40";
pub const UPDATED_CPU: &str = "14.5";
pub const UPDATED_MEMORY: &str = "50";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertStep {
    FirstWrite,
    IdempotentRetry,
    LowerVersion,
    HigherVersion,
}

impl UpsertStep {
    pub fn description(&self) -> &'static str {
        match self {
            UpsertStep::FirstWrite => "Write records for the first time",
            UpsertStep::IdempotentRetry => "Retry the same write",
            UpsertStep::LowerVersion => "Upsert with a lower version",
            UpsertStep::HigherVersion => "Upsert with a higher version",
        }
    }
}

impl fmt::Display for UpsertStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub step: UpsertStep,
    pub version: i64,
    pub outcome: Outcome<WriteRecordsResponse>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpsertReport {
    /// Record time shared by every step (milliseconds).
    pub time_ms: i64,
    pub steps: Vec<StepResult>,
}

impl UpsertReport {
    pub fn step(&self, step: UpsertStep) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.step == step)
    }
}

/// Runs the four upsert steps against one table.
pub struct UpsertWorkflow {
    ingestor: Ingestor,
    clock: Arc<dyn Clock>,
}

impl UpsertWorkflow {
    pub fn new(
        service: Arc<dyn WriteService>,
        clock: Arc<dyn Clock>,
        database_name: impl Into<String>,
        table_name: impl Into<String>,
    ) -> Self {
        Self {
            ingestor: Ingestor::new(service, database_name, table_name),
            clock,
        }
    }

    #[instrument(skip(self), fields(table = %self.ingestor.table_name()))]
    pub async fn run(&self) -> Result<UpsertReport> {
        let time_ms = self.clock.now_millis();
        let first_version = self.clock.now_millis();
        let mut steps = Vec::with_capacity(4);

        steps.push(
            self.step(UpsertStep::FirstWrite, time_ms, first_version, INITIAL_CPU, INITIAL_MEMORY)
                .await?,
        );
        steps.push(
            self.step(UpsertStep::IdempotentRetry, time_ms, first_version, INITIAL_CPU, INITIAL_MEMORY)
                .await?,
        );
        steps.push(
            self.step(UpsertStep::LowerVersion, time_ms, first_version - 1, UPDATED_CPU, UPDATED_MEMORY)
                .await?,
        );

        let higher_version = self.clock.now_millis().max(first_version + 1);
        steps.push(
            self.step(UpsertStep::HigherVersion, time_ms, higher_version, UPDATED_CPU, UPDATED_MEMORY)
                .await?,
        );

        Ok(UpsertReport { time_ms, steps })
    }

    async fn step(
        &self,
        step: UpsertStep,
        time_ms: i64,
        version: i64,
        cpu: &str,
        memory: &str,
    ) -> Result<StepResult> {
        let common = common_attributes(time_ms).with_version(version);
        let outcome = self
            .ingestor
            .write(measure_records(cpu, memory), Some(common))
            .await?;
        info!(step = ?step, version, outcome = outcome.kind(), "Upsert step finished");
        Ok(StepResult {
            step,
            version,
            outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::model::{Record, RecordIdentity};
    use crate::service::{CreateDatabaseRequest, CreateTableRequest, MemoryService};

    async fn service() -> Arc<MemoryService> {
        let service = Arc::new(MemoryService::default());
        service
            .create_database(CreateDatabaseRequest {
                database_name: "sample_db".into(),
                kms_key_id: None,
            })
            .await
            .unwrap();
        service
            .create_table(CreateTableRequest {
                database_name: "sample_db".into(),
                table_name: "sample_table".into(),
                retention_properties: None,
                schema: None,
            })
            .await
            .unwrap();
        service
    }

    fn cpu_identity(time_ms: i64) -> RecordIdentity {
        measure_records(INITIAL_CPU, INITIAL_MEMORY)[0]
            .merged_with(Some(&common_attributes(time_ms)))
            .resolve()
            .unwrap()
            .identity
    }

    #[tokio::test]
    async fn test_upsert_sequence() {
        let service = service().await;
        let clock = Arc::new(ManualClock::stepping(1_000, 1));
        let workflow = UpsertWorkflow::new(service.clone(), clock, "sample_db", "sample_table");

        let report = workflow.run().await.unwrap();
        assert_eq!(report.steps.len(), 4);

        let first = report.step(UpsertStep::FirstWrite).unwrap();
        assert!(first.outcome.is_done());
        assert!(report.step(UpsertStep::IdempotentRetry).unwrap().outcome.is_done());

        let lower = report.step(UpsertStep::LowerVersion).unwrap();
        assert_eq!(lower.version, first.version - 1);
        let rejected = lower.outcome.rejected();
        assert_eq!(rejected.len(), 2);
        assert!(rejected
            .iter()
            .all(|r| r.existing_version == Some(first.version)));

        let higher = report.step(UpsertStep::HigherVersion).unwrap();
        assert!(higher.version > first.version);
        assert!(higher.outcome.is_done());

        let stored = service
            .read_record("sample_db", "sample_table", &cpu_identity(report.time_ms))
            .unwrap();
        assert_eq!(stored.value.to_string(), UPDATED_CPU);
        assert_eq!(stored.version, higher.version);
    }

    #[tokio::test]
    async fn test_frozen_clock_still_bumps_version() {
        let service = service().await;
        let clock = Arc::new(ManualClock::new(5_000));
        let workflow = UpsertWorkflow::new(service, clock, "sample_db", "sample_table");

        let report = workflow.run().await.unwrap();
        let higher = report.step(UpsertStep::HigherVersion).unwrap();
        assert_eq!(higher.version, 5_001);
        assert!(higher.outcome.is_done());
    }

    #[tokio::test]
    async fn test_missing_table_is_reported_per_step() {
        let service = Arc::new(MemoryService::default());
        let clock = Arc::new(ManualClock::new(5_000));
        let workflow = UpsertWorkflow::new(service, clock, "missing_db", "missing_table");

        let report = workflow.run().await.unwrap();
        assert!(report
            .steps
            .iter()
            .all(|s| matches!(s.outcome, Outcome::NotFound(_))));
    }

    #[test]
    fn test_identity_ignores_version() {
        let a = Record::new()
            .with_measure_name("cpu_utilization")
            .with_measure_value("1")
            .merged_with(Some(&common_attributes(10).with_version(1)));
        let b = a.clone().with_version(2);
        assert_eq!(a.resolve().unwrap().identity, b.resolve().unwrap().identity);
    }
}
