//! Measurement records, common-attributes merge and record identity

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Version assumed for records written without one.
pub const DEFAULT_VERSION: i64 = 1;

/// A named dimension of a record, e.g. `region=us-east-1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dimension {
    pub name: String,
    pub value: String,
}

impl Dimension {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Declared type of a measure value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MeasureValueType {
    Double,
    Bigint,
    Varchar,
    Boolean,
    Timestamp,
    Multi,
}

impl MeasureValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeasureValueType::Double => "DOUBLE",
            MeasureValueType::Bigint => "BIGINT",
            MeasureValueType::Varchar => "VARCHAR",
            MeasureValueType::Boolean => "BOOLEAN",
            MeasureValueType::Timestamp => "TIMESTAMP",
            MeasureValueType::Multi => "MULTI",
        }
    }

    /// Checks that `value` is a valid literal of this scalar type.
    pub fn check(&self, value: &str) -> Result<(), String> {
        let valid = match self {
            MeasureValueType::Double => value.parse::<f64>().map(f64::is_finite).unwrap_or(false),
            MeasureValueType::Bigint | MeasureValueType::Timestamp => value.parse::<i64>().is_ok(),
            MeasureValueType::Varchar => !value.is_empty(),
            MeasureValueType::Boolean => value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false"),
            MeasureValueType::Multi => {
                return Err("MULTI is not a scalar measure value type".to_string());
            }
        };

        if valid {
            Ok(())
        } else {
            Err(format!("Measure value '{}' is not a valid {}", value, self))
        }
    }
}

impl fmt::Display for MeasureValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit of a record's `time` field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeUnit {
    #[default]
    Milliseconds,
    Seconds,
    Microseconds,
    Nanoseconds,
}

impl TimeUnit {
    fn nanos_per_unit(&self) -> i64 {
        match self {
            TimeUnit::Seconds => 1_000_000_000,
            TimeUnit::Milliseconds => 1_000_000,
            TimeUnit::Microseconds => 1_000,
            TimeUnit::Nanoseconds => 1,
        }
    }

    /// Converts `time` in this unit to nanoseconds, `None` on overflow.
    pub fn to_nanos(&self, time: i64) -> Option<i64> {
        time.checked_mul(self.nanos_per_unit())
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TimeUnit::Milliseconds => "MILLISECONDS",
            TimeUnit::Seconds => "SECONDS",
            TimeUnit::Microseconds => "MICROSECONDS",
            TimeUnit::Nanoseconds => "NANOSECONDS",
        };
        f.write_str(s)
    }
}

/// One named sub-measure of a `MULTI` record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasureValue {
    pub name: String,
    pub value: String,
    #[serde(rename = "type")]
    pub value_type: MeasureValueType,
}

impl MeasureValue {
    pub fn new(name: impl Into<String>, value: impl Into<String>, value_type: MeasureValueType) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            value_type,
        }
    }
}

/// A measurement record as sent in a write batch.
///
/// Every field is optional: a record may leave out anything the batch's
/// common attributes supply. Build records with the `with_*` methods; each
/// returns a new value.
///
/// ```rust
/// use tswrite::model::{MeasureValueType, Record};
///
/// let record = Record::new()
///     .with_dimension("hostname", "host1")
///     .with_measure("cpu_utilization", "13.6", MeasureValueType::Double)
///     .with_time(1_700_000_000_000)
///     .with_version(1);
/// assert!(record.resolve().is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dimensions: Vec<Dimension>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measure_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measure_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measure_value_type: Option<MeasureValueType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub measure_values: Vec<MeasureValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_unit: Option<TimeUnit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dimensions(mut self, dimensions: Vec<Dimension>) -> Self {
        self.dimensions = dimensions;
        self
    }

    pub fn with_dimension(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.dimensions.push(Dimension::new(name, value));
        self
    }

    /// Sets name, value and type of a scalar measure.
    pub fn with_measure(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
        value_type: MeasureValueType,
    ) -> Self {
        self.measure_name = Some(name.into());
        self.measure_value = Some(value.into());
        self.measure_value_type = Some(value_type);
        self
    }

    pub fn with_measure_name(mut self, name: impl Into<String>) -> Self {
        self.measure_name = Some(name.into());
        self
    }

    pub fn with_measure_value(mut self, value: impl Into<String>) -> Self {
        self.measure_value = Some(value.into());
        self
    }

    pub fn with_measure_value_type(mut self, value_type: MeasureValueType) -> Self {
        self.measure_value_type = Some(value_type);
        self
    }

    /// Turns the record into a `MULTI` record carrying `values`.
    pub fn with_multi_measure(mut self, name: impl Into<String>, values: Vec<MeasureValue>) -> Self {
        self.measure_name = Some(name.into());
        self.measure_value = None;
        self.measure_value_type = Some(MeasureValueType::Multi);
        self.measure_values = values;
        self
    }

    pub fn with_time(mut self, time: i64) -> Self {
        self.time = Some(time.to_string());
        self
    }

    pub fn with_time_unit(mut self, unit: TimeUnit) -> Self {
        self.time_unit = Some(unit);
        self
    }

    pub fn with_version(mut self, version: i64) -> Self {
        self.version = Some(version);
        self
    }

    pub fn has_dimension(&self, name: &str) -> bool {
        self.dimensions.iter().any(|d| d.name == name)
    }

    /// Fills every field this record leaves out from `common`.
    ///
    /// Dimensions are concatenated, common ones first; a record dimension
    /// with the same name as a common one replaces it.
    pub fn merged_with(&self, common: Option<&Record>) -> Record {
        let Some(common) = common else {
            return self.clone();
        };

        let mut dimensions: Vec<Dimension> = common
            .dimensions
            .iter()
            .filter(|d| !self.has_dimension(&d.name))
            .cloned()
            .collect();
        dimensions.extend(self.dimensions.iter().cloned());

        let measure_values = if self.measure_values.is_empty() {
            common.measure_values.clone()
        } else {
            self.measure_values.clone()
        };

        Record {
            dimensions,
            measure_name: self.measure_name.clone().or_else(|| common.measure_name.clone()),
            measure_value: self.measure_value.clone().or_else(|| common.measure_value.clone()),
            measure_value_type: self.measure_value_type.or(common.measure_value_type),
            measure_values,
            time: self.time.clone().or_else(|| common.time.clone()),
            time_unit: self.time_unit.or(common.time_unit),
            version: self.version.or(common.version),
        }
    }

    /// Validates a fully merged record and computes its identity.
    ///
    /// The error is the human-readable rejection reason.
    pub fn resolve(&self) -> Result<ResolvedRecord, String> {
        let measure_name = match self.measure_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => return Err("Measure name is required".to_string()),
        };

        let mut seen = HashSet::new();
        for dim in &self.dimensions {
            if dim.name.is_empty() {
                return Err("Dimension name cannot be empty".to_string());
            }
            if dim.value.is_empty() {
                return Err(format!("Dimension '{}' has an empty value", dim.name));
            }
            if !seen.insert(dim.name.as_str()) {
                return Err(format!("Dimension '{}' appears more than once", dim.name));
            }
        }

        let raw_time = self.time.as_deref().ok_or("Time is required")?;
        let time: i64 = raw_time
            .parse()
            .map_err(|_| format!("Time '{}' is not an integer", raw_time))?;
        let unit = self.time_unit.unwrap_or_default();
        let time_nanos = unit
            .to_nanos(time)
            .ok_or_else(|| format!("Time {} {} is out of range", time, unit))?;

        let value_type = self
            .measure_value_type
            .ok_or("Measure value type is required")?;

        let value = match value_type {
            MeasureValueType::Multi => {
                if self.measure_value.is_some() {
                    return Err("MULTI records carry measure values, not a single measure value".to_string());
                }
                if self.measure_values.is_empty() {
                    return Err("MULTI records need at least one measure value".to_string());
                }
                let mut names = HashSet::new();
                for mv in &self.measure_values {
                    if !names.insert(mv.name.as_str()) {
                        return Err(format!("Measure value '{}' appears more than once", mv.name));
                    }
                    mv.value_type.check(&mv.value)?;
                }
                let mut values = self.measure_values.clone();
                values.sort_by(|a, b| a.name.cmp(&b.name));
                StoredValue::Multi(values)
            }
            scalar => {
                if !self.measure_values.is_empty() {
                    return Err(format!("{} records cannot carry multiple measure values", scalar));
                }
                let value = self.measure_value.as_deref().ok_or("Measure value is required")?;
                scalar.check(value)?;
                StoredValue::Single {
                    value_type: scalar,
                    value: value.to_string(),
                }
            }
        };

        let version = self.version.unwrap_or(DEFAULT_VERSION);
        if version <= 0 {
            return Err(format!("Version {} must be a positive integer", version));
        }

        let mut dimensions = self.dimensions.clone();
        dimensions.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(ResolvedRecord {
            identity: RecordIdentity {
                dimensions,
                measure_name: measure_name.to_string(),
                time_nanos,
            },
            value,
            version,
        })
    }
}

/// What makes two records "the same" for upsert: dimensions (order
/// insensitive), measure name and timestamp (unit insensitive).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordIdentity {
    pub dimensions: Vec<Dimension>,
    pub measure_name: String,
    pub time_nanos: i64,
}

/// Measure payload kept for an identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredValue {
    Single {
        value_type: MeasureValueType,
        value: String,
    },
    Multi(Vec<MeasureValue>),
}

impl fmt::Display for StoredValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoredValue::Single { value, .. } => f.write_str(value),
            StoredValue::Multi(values) => {
                for (i, mv) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}={}", mv.name, mv.value)?;
                }
                Ok(())
            }
        }
    }
}

/// A validated record ready to be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRecord {
    pub identity: RecordIdentity,
    pub value: StoredValue,
    pub version: i64,
}
