//! In-memory write service
//!
//! Emulates the managed time-series write service closely enough for the
//! samples: unique names, continuation-token pagination, common-attributes
//! merge, value validation, composite partition key enforcement and
//! version-based upsert. Only the latest value of each record identity is
//! kept; retention is recorded but never applied.
//!
//! The whole catalog sits behind one `RwLock`, so every call, including a
//! full write batch, is atomic with respect to other calls.

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as TOKEN, Engine};
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use tracing::{debug, info, instrument, warn};

use super::{
    CreateDatabaseRequest, CreateTableRequest, ListRequest, Page, UpdateDatabaseRequest,
    UpdateTableRequest, WriteService, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
use crate::error::{Error, Result};
use crate::model::{
    validate_name, Database, RecordIdentity, RecordsIngested, RejectedRecord, ResolvedRecord,
    StoredValue, Table, TableStatus, WriteRecordsRequest, WriteRecordsResponse,
    MAX_RECORDS_PER_WRITE,
};

/// Latest value and version kept for a record identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub value: StoredValue,
    pub version: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Applied {
    Inserted,
    Updated,
    Unchanged,
}

struct TableEntry {
    table: Table,
    records: HashMap<RecordIdentity, StoredRecord>,
}

impl TableEntry {
    /// Applies one record under upsert rules. On conflict returns the
    /// rejection reason and the stored version.
    fn upsert(&mut self, record: ResolvedRecord) -> std::result::Result<Applied, (String, i64)> {
        match self.records.entry(record.identity) {
            Entry::Vacant(slot) => {
                slot.insert(StoredRecord {
                    value: record.value,
                    version: record.version,
                });
                Ok(Applied::Inserted)
            }
            Entry::Occupied(mut slot) => {
                let existing = slot.get();
                if record.version > existing.version {
                    slot.insert(StoredRecord {
                        value: record.value,
                        version: record.version,
                    });
                    Ok(Applied::Updated)
                } else if record.version == existing.version && record.value == existing.value {
                    Ok(Applied::Unchanged)
                } else if record.version == existing.version {
                    Err((
                        format!(
                            "A record with the same dimensions, timestamp and measure name but a different measure value already exists with version {}",
                            existing.version
                        ),
                        existing.version,
                    ))
                } else {
                    Err((
                        format!(
                            "Record version {} is lower than the existing version {}. A higher version is required to update the measure value.",
                            record.version, existing.version
                        ),
                        existing.version,
                    ))
                }
            }
        }
    }
}

struct DatabaseEntry {
    database: Database,
    tables: BTreeMap<String, TableEntry>,
}

impl DatabaseEntry {
    fn describe(&self) -> Database {
        let mut database = self.database.clone();
        database.table_count = self.tables.len() as u64;
        database
    }
}

#[derive(Default)]
struct Catalog {
    databases: BTreeMap<String, DatabaseEntry>,
}

impl Catalog {
    fn database(&self, name: &str) -> Result<&DatabaseEntry> {
        self.databases
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("Database {} does not exist", name)))
    }

    fn database_mut(&mut self, name: &str) -> Result<&mut DatabaseEntry> {
        self.databases
            .get_mut(name)
            .ok_or_else(|| Error::NotFound(format!("Database {} does not exist", name)))
    }

    fn table(&self, database_name: &str, table_name: &str) -> Result<&TableEntry> {
        self.database(database_name)?
            .tables
            .get(table_name)
            .ok_or_else(|| table_not_found(database_name, table_name))
    }

    fn table_mut(&mut self, database_name: &str, table_name: &str) -> Result<&mut TableEntry> {
        self.database_mut(database_name)?
            .tables
            .get_mut(table_name)
            .ok_or_else(|| table_not_found(database_name, table_name))
    }
}

fn table_not_found(database_name: &str, table_name: &str) -> Error {
    Error::NotFound(format!(
        "Table {} does not exist in database {}",
        table_name, database_name
    ))
}

/// In-memory implementation of [`WriteService`].
pub struct MemoryService {
    region: String,
    account_id: String,
    catalog: RwLock<Catalog>,
}

impl std::fmt::Debug for MemoryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryService")
            .field("region", &self.region)
            .field("account_id", &self.account_id)
            .finish()
    }
}

impl Default for MemoryService {
    fn default() -> Self {
        Self::new("us-east-1", "000000000000")
    }
}

impl MemoryService {
    /// Creates an empty service; `region` and `account_id` only shape ARNs.
    pub fn new(region: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            account_id: account_id.into(),
            catalog: RwLock::new(Catalog::default()),
        }
    }

    fn database_arn(&self, database_name: &str) -> String {
        format!(
            "arn:tswrite:{}:{}:database/{}",
            self.region, self.account_id, database_name
        )
    }

    fn table_arn(&self, database_name: &str, table_name: &str) -> String {
        format!("{}/table/{}", self.database_arn(database_name), table_name)
    }

    fn default_kms_key(&self) -> String {
        format!(
            "arn:tswrite:kms:{}:{}:key/default",
            self.region, self.account_id
        )
    }

    /// Latest stored value for `identity`, if any.
    pub fn read_record(
        &self,
        database_name: &str,
        table_name: &str,
        identity: &RecordIdentity,
    ) -> Option<StoredRecord> {
        let catalog = self.catalog.read();
        catalog
            .databases
            .get(database_name)?
            .tables
            .get(table_name)?
            .records
            .get(identity)
            .cloned()
    }

    /// Number of distinct record identities in a table.
    pub fn record_count(&self, database_name: &str, table_name: &str) -> Option<usize> {
        let catalog = self.catalog.read();
        Some(
            catalog
                .databases
                .get(database_name)?
                .tables
                .get(table_name)?
                .records
                .len(),
        )
    }
}

fn encode_token(name: &str) -> String {
    TOKEN.encode(name.as_bytes())
}

fn decode_token(token: &str) -> Result<String> {
    TOKEN
        .decode(token)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or_else(|| Error::Validation(format!("Invalid next token '{}'", token)))
}

/// Cuts one page out of a name-ordered map.
fn paginate<V, T>(
    map: &BTreeMap<String, V>,
    request: &ListRequest,
    project: impl Fn(&V) -> T,
) -> Result<Page<T>> {
    let limit = match request.max_results {
        None => DEFAULT_PAGE_SIZE,
        Some(n) if (1..=MAX_PAGE_SIZE).contains(&n) => n,
        Some(n) => {
            return Err(Error::Validation(format!(
                "maxResults must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, n
            )))
        }
    };

    let start = match &request.next_token {
        None => Bound::Unbounded,
        Some(token) => Bound::Excluded(decode_token(token)?),
    };

    let mut range = map.range::<String, _>((start, Bound::Unbounded));
    let entries: Vec<(&String, &V)> = range.by_ref().take(limit).collect();
    let next_token = match (entries.last(), range.next()) {
        (Some((last, _)), Some(_)) => Some(encode_token(last)),
        _ => None,
    };

    Ok(Page {
        items: entries.into_iter().map(|(_, v)| project(v)).collect(),
        next_token,
    })
}

#[async_trait]
impl WriteService for MemoryService {
    #[instrument(skip(self, request), fields(database = %request.database_name))]
    async fn create_database(&self, request: CreateDatabaseRequest) -> Result<Database> {
        validate_name("Database", &request.database_name)?;

        let mut catalog = self.catalog.write();
        if catalog.databases.contains_key(&request.database_name) {
            warn!("Database already exists");
            return Err(Error::Conflict(format!(
                "Database {} already exists",
                request.database_name
            )));
        }

        let now = Utc::now();
        let database = Database {
            arn: self.database_arn(&request.database_name),
            kms_key_id: Some(request.kms_key_id.unwrap_or_else(|| self.default_kms_key())),
            database_name: request.database_name.clone(),
            table_count: 0,
            creation_time: now,
            last_updated_time: now,
        };
        catalog.databases.insert(
            request.database_name,
            DatabaseEntry {
                database: database.clone(),
                tables: BTreeMap::new(),
            },
        );

        info!(arn = %database.arn, "Database created");
        Ok(database)
    }

    #[instrument(skip(self))]
    async fn describe_database(&self, database_name: &str) -> Result<Database> {
        let catalog = self.catalog.read();
        Ok(catalog.database(database_name)?.describe())
    }

    #[instrument(skip(self))]
    async fn list_databases(&self, request: ListRequest) -> Result<Page<Database>> {
        let catalog = self.catalog.read();
        let page = paginate(&catalog.databases, &request, DatabaseEntry::describe)?;
        debug!(count = page.items.len(), more = page.next_token.is_some(), "Listed databases");
        Ok(page)
    }

    #[instrument(skip(self, request), fields(database = %request.database_name))]
    async fn update_database(&self, request: UpdateDatabaseRequest) -> Result<Database> {
        if request.kms_key_id.is_empty() {
            return Err(Error::Validation("KMS key id cannot be empty".to_string()));
        }

        let mut catalog = self.catalog.write();
        let entry = catalog.database_mut(&request.database_name)?;
        entry.database.kms_key_id = Some(request.kms_key_id);
        entry.database.last_updated_time = Utc::now();

        info!("Database updated");
        Ok(entry.describe())
    }

    #[instrument(skip(self))]
    async fn delete_database(&self, database_name: &str) -> Result<()> {
        let mut catalog = self.catalog.write();
        let entry = catalog.database(database_name)?;
        if !entry.tables.is_empty() {
            return Err(Error::Validation(format!(
                "Database {} still contains {} table(s); delete them first",
                database_name,
                entry.tables.len()
            )));
        }

        catalog.databases.remove(database_name);
        info!("Database deleted");
        Ok(())
    }

    #[instrument(skip(self, request), fields(database = %request.database_name, table = %request.table_name))]
    async fn create_table(&self, request: CreateTableRequest) -> Result<Table> {
        validate_name("Table", &request.table_name)?;
        let retention = request.retention_properties.unwrap_or_default();
        retention.validate()?;
        if let Some(schema) = &request.schema {
            schema.validate()?;
        }

        let arn = self.table_arn(&request.database_name, &request.table_name);
        let mut catalog = self.catalog.write();
        let entry = catalog.database_mut(&request.database_name)?;
        if entry.tables.contains_key(&request.table_name) {
            warn!("Table already exists");
            return Err(Error::Conflict(format!(
                "Table {} already exists in database {}",
                request.table_name, request.database_name
            )));
        }

        let now = Utc::now();
        let table = Table {
            table_name: request.table_name.clone(),
            database_name: request.database_name.clone(),
            arn,
            table_status: TableStatus::Active,
            retention_properties: retention,
            schema: request.schema,
            creation_time: now,
            last_updated_time: now,
        };
        entry.tables.insert(
            request.table_name,
            TableEntry {
                table: table.clone(),
                records: HashMap::new(),
            },
        );

        info!(arn = %table.arn, "Table created");
        Ok(table)
    }

    #[instrument(skip(self))]
    async fn describe_table(&self, database_name: &str, table_name: &str) -> Result<Table> {
        let catalog = self.catalog.read();
        Ok(catalog.table(database_name, table_name)?.table.clone())
    }

    #[instrument(skip(self))]
    async fn list_tables(&self, database_name: &str, request: ListRequest) -> Result<Page<Table>> {
        let catalog = self.catalog.read();
        let entry = catalog.database(database_name)?;
        paginate(&entry.tables, &request, |t| t.table.clone())
    }

    #[instrument(skip(self, request), fields(database = %request.database_name, table = %request.table_name))]
    async fn update_table(&self, request: UpdateTableRequest) -> Result<Table> {
        if request.retention_properties.is_none() && request.schema.is_none() {
            return Err(Error::Validation(
                "Update needs retention properties or a schema".to_string(),
            ));
        }
        if let Some(retention) = &request.retention_properties {
            retention.validate()?;
        }
        if let Some(schema) = &request.schema {
            schema.validate()?;
        }

        let mut catalog = self.catalog.write();
        let entry = catalog.table_mut(&request.database_name, &request.table_name)?;
        if let Some(retention) = request.retention_properties {
            entry.table.retention_properties = retention;
        }
        if let Some(schema) = request.schema {
            entry.table.schema = Some(schema);
        }
        entry.table.last_updated_time = Utc::now();

        info!("Table updated");
        Ok(entry.table.clone())
    }

    #[instrument(skip(self))]
    async fn delete_table(&self, database_name: &str, table_name: &str) -> Result<()> {
        let mut catalog = self.catalog.write();
        catalog.table(database_name, table_name)?;
        catalog.database_mut(database_name)?.tables.remove(table_name);
        info!("Table deleted");
        Ok(())
    }

    #[instrument(
        skip(self, request),
        fields(database = %request.database_name, table = %request.table_name, records = request.records.len())
    )]
    async fn write_records(&self, request: WriteRecordsRequest) -> Result<WriteRecordsResponse> {
        if request.records.is_empty() {
            return Err(Error::Validation(
                "A write must contain at least one record".to_string(),
            ));
        }
        if request.records.len() > MAX_RECORDS_PER_WRITE {
            return Err(Error::Validation(format!(
                "A write can contain at most {} records, got {}",
                MAX_RECORDS_PER_WRITE,
                request.records.len()
            )));
        }

        let mut catalog = self.catalog.write();
        let table = catalog.table_mut(&request.database_name, &request.table_name)?;
        let required_dimension = table
            .table
            .schema
            .as_ref()
            .and_then(|schema| schema.required_dimension())
            .map(str::to_owned);

        let mut rejected = Vec::new();
        let mut ingested = 0;

        for (index, record) in request.records.iter().enumerate() {
            let merged = record.merged_with(request.common_attributes.as_ref());

            if let Some(dimension) = &required_dimension {
                if !merged.has_dimension(dimension) {
                    rejected.push(RejectedRecord::new(
                        index,
                        format!(
                            "Record is missing the required partition key dimension '{}'",
                            dimension
                        ),
                    ));
                    continue;
                }
            }

            let resolved = match merged.resolve() {
                Ok(resolved) => resolved,
                Err(reason) => {
                    rejected.push(RejectedRecord::new(index, reason));
                    continue;
                }
            };

            let version = resolved.version;
            match table.upsert(resolved) {
                Ok(applied) => {
                    debug!(index, version, ?applied, "Record applied");
                    ingested += 1;
                }
                Err((reason, existing_version)) => {
                    rejected.push(RejectedRecord::conflict(index, reason, existing_version));
                }
            }
        }

        if rejected.is_empty() {
            info!(ingested, "Records written");
            Ok(WriteRecordsResponse {
                records_ingested: RecordsIngested { total: ingested },
                status_code: 200,
            })
        } else {
            warn!(ingested, rejected = rejected.len(), "Write partially rejected");
            Err(Error::RejectedRecords(rejected))
        }
    }
}
