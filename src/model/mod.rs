//! Data model
//!
//! ```text
//! Databases (name → Database, KMS key, ARN)
//!   └─→ Tables (name → Table, retention, optional composite partition key)
//!        └─→ Records (identity → latest value + version)
//! ```
//!
//! Records travel in write batches. Every record field is optional on the
//! wire; missing fields come from the batch's common attributes, and the
//! merged result is resolved into a [`ResolvedRecord`] before it is stored.

pub mod record;
pub mod resource;
pub mod write;

pub use record::{
    Dimension, MeasureValue, MeasureValueType, Record, RecordIdentity, ResolvedRecord,
    StoredValue, TimeUnit, DEFAULT_VERSION,
};
pub use resource::{
    validate_name, Database, PartitionKey, PartitionKeyEnforcement, PartitionKeyType,
    RetentionProperties, Schema, Table, TableStatus,
};
pub use write::{
    RecordsIngested, RejectedRecord, WriteRecordsRequest, WriteRecordsResponse,
    MAX_RECORDS_PER_WRITE,
};
