//! Record construction and batched writes

use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::Outcome;
use crate::error::Result;
use crate::model::{
    Dimension, MeasureValue, MeasureValueType, Record, WriteRecordsRequest, WriteRecordsResponse,
    MAX_RECORDS_PER_WRITE,
};
use crate::service::WriteService;

pub const CPU_UTILIZATION: &str = "cpu_utilization";
pub const MEMORY_UTILIZATION: &str = "memory_utilization";
pub const CPU_MEMORY: &str = "cpu_memory";

/// Dimensions of the sample host.
pub fn host_dimensions() -> Vec<Dimension> {
    vec![
        Dimension::new("region", "us-east-1"),
        Dimension::new("az", "az1"),
        Dimension::new("hostname", "host1"),
    ]
}

/// CPU and memory records with every field inline.
pub fn inline_records(time_ms: i64, cpu: &str, memory: &str) -> Vec<Record> {
    [(CPU_UTILIZATION, cpu), (MEMORY_UTILIZATION, memory)]
        .into_iter()
        .map(|(name, value)| {
            Record::new()
                .with_dimensions(host_dimensions())
                .with_measure(name, value, MeasureValueType::Double)
                .with_time(time_ms)
        })
        .collect()
}

/// Dimensions, value type and time shared by [`measure_records`].
pub fn common_attributes(time_ms: i64) -> Record {
    Record::new()
        .with_dimensions(host_dimensions())
        .with_measure_value_type(MeasureValueType::Double)
        .with_time(time_ms)
}

/// CPU and memory records carrying only measure name and value.
pub fn measure_records(cpu: &str, memory: &str) -> Vec<Record> {
    vec![
        Record::new()
            .with_measure_name(CPU_UTILIZATION)
            .with_measure_value(cpu),
        Record::new()
            .with_measure_name(MEMORY_UTILIZATION)
            .with_measure_value(memory),
    ]
}

/// One `MULTI` record holding both utilizations.
pub fn multi_measure_record(time_ms: i64, cpu: &str, memory: &str) -> Record {
    Record::new()
        .with_dimensions(host_dimensions())
        .with_multi_measure(
            CPU_MEMORY,
            vec![
                MeasureValue::new(CPU_UTILIZATION, cpu, MeasureValueType::Double),
                MeasureValue::new(MEMORY_UTILIZATION, memory, MeasureValueType::Double),
            ],
        )
        .with_time(time_ms)
}

/// Writes records to one table.
#[derive(Clone)]
pub struct Ingestor {
    service: Arc<dyn WriteService>,
    database_name: String,
    table_name: String,
}

impl Ingestor {
    pub fn new(
        service: Arc<dyn WriteService>,
        database_name: impl Into<String>,
        table_name: impl Into<String>,
    ) -> Self {
        Self {
            service,
            database_name: database_name.into(),
            table_name: table_name.into(),
        }
    }

    pub fn database_name(&self) -> &str {
        &self.database_name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Sends `records` as a single write call.
    #[instrument(skip(self, records, common), fields(table = %self.table_name, records = records.len()))]
    pub async fn write(
        &self,
        records: Vec<Record>,
        common: Option<Record>,
    ) -> Result<Outcome<WriteRecordsResponse>> {
        let mut request = WriteRecordsRequest::new(&self.database_name, &self.table_name, records);
        if let Some(common) = common {
            request = request.with_common_attributes(common);
        }

        let outcome = Outcome::from_result(self.service.write_records(request).await)?;
        match &outcome {
            Outcome::Rejected(rejected) => warn!(rejected = rejected.len(), "Write partially rejected"),
            other => info!(outcome = other.kind(), "Write finished"),
        }
        Ok(outcome)
    }

    /// Splits `records` into write calls of at most
    /// [`MAX_RECORDS_PER_WRITE`] records. A rejected batch does not stop the
    /// following ones; rejection indices are positions in `records`.
    pub async fn write_batches(
        &self,
        records: Vec<Record>,
        common: Option<Record>,
    ) -> Result<Vec<Outcome<WriteRecordsResponse>>> {
        let mut outcomes = Vec::new();
        for (batch_index, batch) in records.chunks(MAX_RECORDS_PER_WRITE).enumerate() {
            let offset = batch_index * MAX_RECORDS_PER_WRITE;
            let outcome = match self.write(batch.to_vec(), common.clone()).await? {
                Outcome::Rejected(rejected) => Outcome::Rejected(
                    rejected
                        .into_iter()
                        .map(|mut r| {
                            r.record_index += offset;
                            r
                        })
                        .collect(),
                ),
                other => other,
            };
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// CPU 13.5 and memory 40 for the sample host, every field inline.
    pub async fn write_records(&self, time_ms: i64) -> Result<Outcome<WriteRecordsResponse>> {
        self.write(inline_records(time_ms, "13.5", "40"), None).await
    }

    /// Same records as [`Self::write_records`], with the shared fields
    /// hoisted into common attributes.
    pub async fn write_records_with_common_attributes(
        &self,
        time_ms: i64,
    ) -> Result<Outcome<WriteRecordsResponse>> {
        self.write(measure_records("13.5", "40"), Some(common_attributes(time_ms)))
            .await
    }

    pub async fn write_multi_measure_records(
        &self,
        time_ms: i64,
    ) -> Result<Outcome<WriteRecordsResponse>> {
        self.write(vec![multi_measure_record(time_ms, "13.5", "40")], None)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{CreateDatabaseRequest, CreateTableRequest, MemoryService};

    const T: i64 = 1_700_000_000_000;

    async fn setup() -> (Arc<MemoryService>, Ingestor) {
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
        let ingestor = Ingestor::new(service.clone(), "sample_db", "sample_table");
        (service, ingestor)
    }

    fn identity(record: &Record) -> crate::model::RecordIdentity {
        record.resolve().unwrap().identity
    }

    #[tokio::test]
    async fn test_common_attributes_match_inline() {
        let (service, ingestor) = setup().await;

        let inline = ingestor.write_records(T).await.unwrap();
        assert_eq!(inline.done().unwrap().records_ingested.total, 2);

        let hoisted = ingestor.write_records_with_common_attributes(T).await.unwrap();
        assert_eq!(hoisted.done().unwrap().records_ingested.total, 2);

        // Same identities and values, so the second write changed nothing.
        assert_eq!(service.record_count("sample_db", "sample_table"), Some(2));
        for record in inline_records(T, "13.5", "40") {
            let stored = service
                .read_record("sample_db", "sample_table", &identity(&record))
                .unwrap();
            assert_eq!(stored.version, 1);
        }
    }

    #[tokio::test]
    async fn test_invalid_value_does_not_block_batch() {
        let (service, ingestor) = setup().await;
        let mut records = measure_records("13.5", "40");
        records.insert(1, Record::new().with_measure_name("disk").with_measure_value("abc"));

        let outcome = ingestor.write(records, Some(common_attributes(T))).await.unwrap();
        let rejected = outcome.rejected();
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].record_index, 1);
        assert_eq!(rejected[0].existing_version, None);
        assert_eq!(service.record_count("sample_db", "sample_table"), Some(2));
    }

    #[tokio::test]
    async fn test_write_batches_offsets_rejections() {
        let (_service, ingestor) = setup().await;
        let mut records: Vec<Record> = (0..150)
            .map(|i| {
                Record::new()
                    .with_dimensions(host_dimensions())
                    .with_measure(CPU_UTILIZATION, "1.0", MeasureValueType::Double)
                    .with_time(T + i)
            })
            .collect();
        records[120] = records[120].clone().with_measure_value("not-a-number");

        let outcomes = ingestor.write_batches(records, None).await.unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].is_done());
        assert_eq!(outcomes[1].rejected()[0].record_index, 120);
    }

    #[tokio::test]
    async fn test_multi_measure_write() {
        let (service, ingestor) = setup().await;
        let outcome = ingestor.write_multi_measure_records(T).await.unwrap();
        assert!(outcome.is_done());

        let record = multi_measure_record(T, "13.5", "40");
        let stored = service
            .read_record("sample_db", "sample_table", &identity(&record))
            .unwrap();
        assert_eq!(stored.value.to_string(), "cpu_utilization=13.5, memory_utilization=40");
    }

    #[tokio::test]
    async fn test_missing_table_is_not_found() {
        let (service, _) = setup().await;
        let ingestor = Ingestor::new(service, "sample_db", "missing_table");
        assert!(matches!(
            ingestor.write_records(T).await.unwrap(),
            Outcome::NotFound(_)
        ));
    }
}
