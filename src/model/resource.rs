//! Database and table resources.
//!
//! # Overview
//!
//! Databases are named containers identified by an ARN and encrypted with a
//! KMS-style key. Tables live inside a database, carry a retention policy and
//! may declare a composite partition key.
//!
//! # Examples
//!
//! ```rust
//! use tswrite::model::{PartitionKeyEnforcement, RetentionProperties, Schema};
//!
//! let retention = RetentionProperties::new(24, 7);
//! assert!(retention.validate().is_ok());
//!
//! let schema = Schema::dimension_key("hostId", PartitionKeyEnforcement::Required);
//! assert_eq!(schema.required_dimension(), Some("hostId"));
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Memory store retention bounds, in hours.
pub const MEMORY_RETENTION_HOURS: std::ops::RangeInclusive<u64> = 1..=8766;
/// Magnetic store retention bounds, in days.
pub const MAGNETIC_RETENTION_DAYS: std::ops::RangeInclusive<u64> = 1..=73000;

/// Database description as returned by create/describe/list/update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Database {
    pub database_name: String,

    /// ARN-like identifier, unique per region and account.
    pub arn: String,

    /// Key used to encrypt the database contents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kms_key_id: Option<String>,

    /// Number of tables currently in the database.
    #[serde(default)]
    pub table_count: u64,

    pub creation_time: DateTime<Utc>,
    pub last_updated_time: DateTime<Utc>,
}

/// Hot/cold retention policy of a table.
///
/// Stored and reported only; nothing is ever expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionProperties {
    pub memory_store_retention_period_in_hours: u64,
    pub magnetic_store_retention_period_in_days: u64,
}

impl RetentionProperties {
    pub fn new(memory_hours: u64, magnetic_days: u64) -> Self {
        Self {
            memory_store_retention_period_in_hours: memory_hours,
            magnetic_store_retention_period_in_days: magnetic_days,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !MEMORY_RETENTION_HOURS.contains(&self.memory_store_retention_period_in_hours) {
            return Err(Error::Validation(format!(
                "Memory store retention must be between {} and {} hours, got {}",
                MEMORY_RETENTION_HOURS.start(),
                MEMORY_RETENTION_HOURS.end(),
                self.memory_store_retention_period_in_hours
            )));
        }
        if !MAGNETIC_RETENTION_DAYS.contains(&self.magnetic_store_retention_period_in_days) {
            return Err(Error::Validation(format!(
                "Magnetic store retention must be between {} and {} days, got {}",
                MAGNETIC_RETENTION_DAYS.start(),
                MAGNETIC_RETENTION_DAYS.end(),
                self.magnetic_store_retention_period_in_days
            )));
        }
        Ok(())
    }
}

impl Default for RetentionProperties {
    fn default() -> Self {
        Self::new(6, 73000)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartitionKeyType {
    Dimension,
    Measure,
}

/// Whether records must carry the partition key dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartitionKeyEnforcement {
    Required,
    Optional,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionKey {
    #[serde(rename = "type")]
    pub key_type: PartitionKeyType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enforcement_in_record: Option<PartitionKeyEnforcement>,
}

/// Table schema; currently just the composite partition key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    #[serde(default)]
    pub composite_partition_key: Vec<PartitionKey>,
}

impl Schema {
    /// Schema partitioned on the dimension `name`.
    pub fn dimension_key(name: impl Into<String>, enforcement: PartitionKeyEnforcement) -> Self {
        Self {
            composite_partition_key: vec![PartitionKey {
                key_type: PartitionKeyType::Dimension,
                name: Some(name.into()),
                enforcement_in_record: Some(enforcement),
            }],
        }
    }

    /// Schema partitioned on the measure name.
    pub fn measure_key() -> Self {
        Self {
            composite_partition_key: vec![PartitionKey {
                key_type: PartitionKeyType::Measure,
                name: None,
                enforcement_in_record: None,
            }],
        }
    }

    /// Name of the dimension every record must carry, if any.
    pub fn required_dimension(&self) -> Option<&str> {
        self.composite_partition_key
            .iter()
            .filter(|pk| pk.key_type == PartitionKeyType::Dimension)
            .filter(|pk| pk.enforcement_in_record == Some(PartitionKeyEnforcement::Required))
            .find_map(|pk| pk.name.as_deref())
    }

    pub fn validate(&self) -> Result<()> {
        if self.composite_partition_key.len() > 1 {
            return Err(Error::Validation(
                "Only one partition key is supported per table".to_string(),
            ));
        }
        for pk in &self.composite_partition_key {
            match pk.key_type {
                PartitionKeyType::Dimension => match pk.name.as_deref() {
                    Some(name) if !name.is_empty() => {}
                    _ => {
                        return Err(Error::Validation(
                            "Dimension partition keys need a name".to_string(),
                        ))
                    }
                },
                PartitionKeyType::Measure => {
                    if pk.name.is_some() || pk.enforcement_in_record.is_some() {
                        return Err(Error::Validation(
                            "Measure partition keys take neither a name nor an enforcement level"
                                .to_string(),
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableStatus {
    Active,
}

/// Table description as returned by create/describe/list/update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub table_name: String,
    pub database_name: String,
    pub arn: String,
    pub table_status: TableStatus,
    pub retention_properties: RetentionProperties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
    pub creation_time: DateTime<Utc>,
    pub last_updated_time: DateTime<Utc>,
}

/// Validates a database or table name.
///
/// Names must follow these rules:
/// 1. Between 3 and 256 characters
/// 2. Contain only letters, digits, `_`, `.` and `-`
///
/// # Examples
///
/// ```rust
/// use tswrite::model::validate_name;
///
/// assert!(validate_name("database", "devops_multi_sample_application").is_ok());
/// assert!(validate_name("table", "host-metrics.v2").is_ok());
///
/// assert!(validate_name("database", "ab").is_err());
/// assert!(validate_name("table", "host metrics").is_err());
/// assert!(validate_name("table", "host/metrics").is_err());
/// ```
pub fn validate_name(kind: &str, name: &str) -> Result<()> {
    if name.len() < 3 {
        return Err(Error::Validation(format!(
            "{} name '{}' must be at least 3 characters long",
            kind, name
        )));
    }

    if name.len() > 256 {
        return Err(Error::Validation(format!(
            "{} name cannot be longer than 256 characters",
            kind
        )));
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(Error::Validation(format!(
            "{} name '{}' can only contain letters, numbers, '_', '.' and '-'",
            kind, name
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        // Valid names
        assert!(validate_name("database", "database").is_ok());
        assert!(validate_name("database", "my_database_123").is_ok());
        assert!(validate_name("table", "host_metrics_dim_pk").is_ok());
        assert!(validate_name("table", "v1.metrics-raw").is_ok());

        // Invalid names
        assert!(validate_name("database", "").is_err());
        assert!(validate_name("database", "db").is_err());
        assert!(validate_name("database", "my database").is_err());
        assert!(validate_name("database", "my/database").is_err());
        assert!(validate_name("database", &"a".repeat(257)).is_err());
    }

    #[test]
    fn test_retention_bounds() {
        assert!(RetentionProperties::new(24, 7).validate().is_ok());
        assert!(RetentionProperties::new(0, 7).validate().is_err());
        assert!(RetentionProperties::new(24, 0).validate().is_err());
        assert!(RetentionProperties::new(8767, 7).validate().is_err());
        assert!(RetentionProperties::default().validate().is_ok());
    }

    #[test]
    fn test_schema_required_dimension() {
        let optional = Schema::dimension_key("hostId", PartitionKeyEnforcement::Optional);
        assert_eq!(optional.required_dimension(), None);

        let required = Schema::dimension_key("hostId", PartitionKeyEnforcement::Required);
        assert_eq!(required.required_dimension(), Some("hostId"));

        assert_eq!(Schema::measure_key().required_dimension(), None);
    }

    #[test]
    fn test_schema_validation() {
        assert!(Schema::measure_key().validate().is_ok());
        assert!(Schema::dimension_key("hostId", PartitionKeyEnforcement::Optional)
            .validate()
            .is_ok());

        let unnamed = Schema {
            composite_partition_key: vec![PartitionKey {
                key_type: PartitionKeyType::Dimension,
                name: None,
                enforcement_in_record: None,
            }],
        };
        assert!(unnamed.validate().is_err());

        let mut two = Schema::measure_key();
        two.composite_partition_key
            .extend(Schema::measure_key().composite_partition_key);
        assert!(two.validate().is_err());
    }

    #[test]
    fn test_partition_key_wire_format() {
        let schema = Schema::dimension_key("hostId", PartitionKeyEnforcement::Required);
        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "compositePartitionKey": [
                    {"type": "DIMENSION", "name": "hostId", "enforcementInRecord": "REQUIRED"}
                ]
            })
        );
    }
}
