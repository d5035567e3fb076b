//! Console output of the samples

use std::fmt::Display;
use std::io::{self, Write};

use super::upsert::UpsertReport;
use super::Outcome;
use crate::error::Result;
use crate::model::{Database, PartitionKeyType, RejectedRecord, Table, WriteRecordsResponse};

/// One-line description of a successful result.
pub trait Summary {
    fn summary(&self) -> String;
}

impl Summary for () {
    fn summary(&self) -> String {
        "ok".to_string()
    }
}

impl Summary for Database {
    fn summary(&self) -> String {
        format!("Database [{}] has id [{}]", self.database_name, self.arn)
    }
}

impl Summary for Table {
    fn summary(&self) -> String {
        let retention = &self.retention_properties;
        let mut line = format!(
            "Table [{}] has id [{}], retention {}h memory / {}d magnetic",
            self.table_name,
            self.arn,
            retention.memory_store_retention_period_in_hours,
            retention.magnetic_store_retention_period_in_days
        );

        let keys = self
            .schema
            .iter()
            .flat_map(|s| s.composite_partition_key.iter());
        for key in keys {
            match (key.key_type, key.name.as_deref(), key.enforcement_in_record) {
                (PartitionKeyType::Dimension, Some(name), Some(enforcement)) => {
                    line.push_str(&format!(
                        ", partition key DIMENSION {} ({:?})",
                        name, enforcement
                    ));
                }
                (PartitionKeyType::Dimension, Some(name), None) => {
                    line.push_str(&format!(", partition key DIMENSION {}", name));
                }
                _ => line.push_str(", partition key MEASURE"),
            }
        }
        line
    }
}

impl Summary for WriteRecordsResponse {
    fn summary(&self) -> String {
        format!(
            "WriteRecords Status: [{}], {} record(s) ingested",
            self.status_code, self.records_ingested.total
        )
    }
}

impl Summary for Vec<Database> {
    fn summary(&self) -> String {
        let names: Vec<&str> = self.iter().map(|d| d.database_name.as_str()).collect();
        format!("{} database(s): {}", names.len(), names.join(", "))
    }
}

impl Summary for Vec<Table> {
    fn summary(&self) -> String {
        let names: Vec<&str> = self.iter().map(|t| t.table_name.as_str()).collect();
        format!("{} table(s): {}", names.len(), names.join(", "))
    }
}

/// Writes sample progress and outcomes as plain lines.
pub struct Printer<W: Write> {
    out: W,
}

impl Printer<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> Printer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn line(&mut self, text: impl Display) -> Result<()> {
        writeln!(self.out, "{}", text)?;
        Ok(())
    }

    pub fn outcome<T: Summary>(&mut self, action: &str, outcome: &Outcome<T>) -> Result<()> {
        match outcome {
            Outcome::Done(value) => self.line(format!("{}: {}", action, value.summary())),
            Outcome::AlreadyExists(message) => {
                self.line(format!("{}: {}. Skipping.", action, message))
            }
            Outcome::NotFound(message) | Outcome::Skipped(message) => {
                self.line(format!("{}: {}", action, message))
            }
            Outcome::Rejected(rejected) => {
                self.line(format!("{}: {} record(s) rejected", action, rejected.len()))?;
                self.rejected(rejected)
            }
        }
    }

    pub fn rejected(&mut self, rejected: &[RejectedRecord]) -> Result<()> {
        for record in rejected {
            self.line(format!("RecordIndex {} : {}", record.record_index, record.reason))?;
            if let Some(version) = record.existing_version {
                self.line(format!("Rejected record existing version: {}", version))?;
            }
        }
        Ok(())
    }

    pub fn upsert_report(&mut self, report: &UpsertReport) -> Result<()> {
        for step in &report.steps {
            self.outcome(
                &format!("{} (version {})", step.step, step.version),
                &step.outcome,
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RecordsIngested;

    fn render<T: Summary>(action: &str, outcome: &Outcome<T>) -> String {
        let mut printer = Printer::new(Vec::new());
        printer.outcome(action, outcome).unwrap();
        String::from_utf8(printer.into_inner()).unwrap()
    }

    #[test]
    fn test_rejected_lines() {
        let outcome: Outcome<WriteRecordsResponse> = Outcome::Rejected(vec![
            RejectedRecord::conflict(0, "lower version", 1000),
            RejectedRecord::new(1, "bad value"),
        ]);
        let text = render("Write records", &outcome);
        assert_eq!(
            text,
            "Write records: 2 record(s) rejected\n\
             RecordIndex 0 : lower version\n\
             Rejected record existing version: 1000\n\
             RecordIndex 1 : bad value\n"
        );
    }

    #[test]
    fn test_known_failures_are_friendly() {
        let exists: Outcome<()> = Outcome::AlreadyExists("Database x already exists".into());
        assert_eq!(
            render("Create database", &exists),
            "Create database: Database x already exists. Skipping.\n"
        );

        let missing: Outcome<()> = Outcome::NotFound("Database x does not exist".into());
        assert_eq!(
            render("Delete database", &missing),
            "Delete database: Database x does not exist\n"
        );
    }

    #[test]
    fn test_write_summary() {
        let outcome = Outcome::Done(WriteRecordsResponse {
            records_ingested: RecordsIngested { total: 2 },
            status_code: 200,
        });
        assert_eq!(
            render("Write records", &outcome),
            "Write records: WriteRecords Status: [200], 2 record(s) ingested\n"
        );
    }
}
