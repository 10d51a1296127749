//! Local persistence for search results.
//!
//! # Overview
//!
//! - [`ResultStore`] - batch inserts and filtered reads over the `results`
//!   and `credentials` tables
//! - [`RecordQuery`] - read-side filter set
//! - [`StoredCredential`] - login/password pair derived from a record
//! - [`StoreError`] - operation error types
//!
//! Writes are idempotent: a record already present (by provider id) is
//! skipped, never updated.

mod credential;
mod error;
mod query;

pub use credential::{StoredCredential, extract_credentials};
pub use error::{StoreDbErrorKind, StoreError};
pub use query::{DEFAULT_QUERY_LIMIT, RecordQuery};

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::db::Database;
use crate::record::{Record, RecordField};

/// Rows written per transaction.
pub const BATCH_SIZE: usize = 100;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

const RESULT_COLUMNS: &str = "dehashed_id, email, ip_address, username, password, hashed_password, \
     hash_type, name, vin, license_plate, url, social, cryptocurrency_address, address, phone, \
     company, database_name";

/// Outcome of a batched write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistReport {
    /// Rows handed to the store.
    pub attempted: usize,
    /// Rows actually inserted; conflicts are not counted.
    pub inserted: u64,
    pub batches: usize,
    pub failed_batches: usize,
}

impl PersistReport {
    /// Rows skipped because they were already stored.
    #[must_use]
    pub fn skipped(&self) -> u64 {
        (self.attempted as u64).saturating_sub(self.inserted)
    }
}

/// SQLite-backed result store.
#[derive(Debug, Clone)]
pub struct ResultStore {
    db: Database,
}

impl ResultStore {
    /// Creates a store over an open database.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Inserts records in batches of [`BATCH_SIZE`], one transaction each.
    ///
    /// Existing ids are skipped. A failing batch is rolled back, logged and
    /// skipped; the remaining batches are still written.
    ///
    /// # Errors
    ///
    /// Returns the last batch error when any batch failed.
    #[instrument(skip(self, records), fields(count = records.len()))]
    pub async fn persist(&self, records: &[Record]) -> Result<PersistReport> {
        self.persist_batches(records).await
    }

    /// Inserts credentials with the same batching and conflict rules as
    /// [`ResultStore::persist`].
    ///
    /// # Errors
    ///
    /// Returns the last batch error when any batch failed.
    #[instrument(skip(self, credentials), fields(count = credentials.len()))]
    pub async fn persist_credentials(
        &self,
        credentials: &[StoredCredential],
    ) -> Result<PersistReport> {
        self.persist_batches(credentials).await
    }

    /// Runs [`ResultStore::persist_credentials`] on a background task.
    ///
    /// The handle must be awaited before the process exits.
    #[must_use]
    pub fn spawn_persist_credentials(
        &self,
        credentials: Vec<StoredCredential>,
    ) -> JoinHandle<Result<PersistReport>> {
        let store = self.clone();
        tokio::spawn(async move { store.persist_credentials(&credentials).await })
    }

    /// Reads stored records matching `query`, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on query failure or
    /// [`StoreError::Decode`] for malformed stored arrays.
    #[instrument(skip(self))]
    pub async fn query(&self, query: &RecordQuery) -> Result<Vec<Record>> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT {RESULT_COLUMNS} FROM results"));
        query.push_where(&mut builder);
        builder
            .push(" ORDER BY results.row_id LIMIT ")
            .push_bind(query.effective_limit());

        let rows = builder.build().fetch_all(self.db.pool()).await?;
        let records = rows.iter().map(record_from_row).collect::<Result<Vec<_>>>()?;
        debug!(rows = records.len(), "Stored records read");
        Ok(records)
    }

    /// Counts stored records matching `query`, ignoring its limit.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn count(&self, query: &RecordQuery) -> Result<i64> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM results");
        query.push_where(&mut builder);
        let count: i64 = builder.build().fetch_one(self.db.pool()).await?.try_get(0)?;
        Ok(count)
    }

    /// Reads every stored credential in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn list_credentials(&self) -> Result<Vec<StoredCredential>> {
        let rows = sqlx::query(
            "SELECT record_id, username, email, password FROM credentials ORDER BY id",
        )
        .fetch_all(self.db.pool())
        .await?;
        rows.iter().map(credential_from_row).collect()
    }

    /// Reads credentials whose source record matches `query`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn credentials_matching(&self, query: &RecordQuery) -> Result<Vec<StoredCredential>> {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT c.record_id, c.username, c.email, c.password FROM credentials AS c \
             WHERE c.record_id IN (SELECT results.dehashed_id FROM results",
        );
        query.push_where(&mut builder);
        builder
            .push(" ORDER BY results.row_id LIMIT ")
            .push_bind(query.effective_limit())
            .push(") ORDER BY c.id");

        let rows = builder.build().fetch_all(self.db.pool()).await?;
        rows.iter().map(credential_from_row).collect()
    }

    async fn persist_batches<T: BatchInsert>(&self, items: &[T]) -> Result<PersistReport> {
        let mut report = PersistReport {
            attempted: items.len(),
            ..PersistReport::default()
        };
        let mut last_error = None;

        for (index, batch) in items.chunks(BATCH_SIZE).enumerate() {
            report.batches += 1;
            match self.insert_batch(batch).await {
                Ok(inserted) => {
                    debug!(table = T::TABLE, batch = index, inserted, "Batch committed");
                    report.inserted += inserted;
                }
                Err(error) => {
                    warn!(
                        table = T::TABLE,
                        batch = index,
                        size = batch.len(),
                        error = %error,
                        "Batch failed; continuing with next batch"
                    );
                    report.failed_batches += 1;
                    last_error = Some(error);
                }
            }
        }

        info!(
            table = T::TABLE,
            attempted = report.attempted,
            inserted = report.inserted,
            failed_batches = report.failed_batches,
            "Persist finished"
        );

        match last_error {
            Some(error) => Err(error),
            None => Ok(report),
        }
    }

    async fn insert_batch<T: BatchInsert>(&self, batch: &[T]) -> Result<u64> {
        let mut tx = self.db.pool().begin().await?;
        let mut inserted = 0;
        for item in batch {
            inserted += item.insert(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(inserted)
    }
}

/// A row type that can be written inside a batch transaction.
#[async_trait]
trait BatchInsert: Sync {
    const TABLE: &'static str;

    /// Inserts one row, returning 0 when it already exists.
    async fn insert(&self, conn: &mut SqliteConnection) -> Result<u64>;
}

#[async_trait]
impl BatchInsert for Record {
    const TABLE: &'static str = "results";

    async fn insert(&self, conn: &mut SqliteConnection) -> Result<u64> {
        let mut query = sqlx::query(
            "INSERT INTO results (dehashed_id, email, ip_address, username, password, \
             hashed_password, hash_type, name, vin, license_plate, url, social, \
             cryptocurrency_address, address, phone, company, database_name) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(dehashed_id) DO NOTHING",
        )
        .bind(&self.id);
        for field in RecordField::ALL {
            query = if field.is_multi_valued() {
                query.bind(encode_list(field, self.values(field))?)
            } else {
                query.bind(self.values(field).first().copied().unwrap_or_default().to_string())
            };
        }
        Ok(query.execute(conn).await?.rows_affected())
    }
}

#[async_trait]
impl BatchInsert for StoredCredential {
    const TABLE: &'static str = "credentials";

    async fn insert(&self, conn: &mut SqliteConnection) -> Result<u64> {
        let result = sqlx::query(
            "INSERT INTO credentials (record_id, username, email, password) VALUES (?, ?, ?, ?) \
             ON CONFLICT(record_id, username, email, password) DO NOTHING",
        )
        .bind(&self.record_id)
        .bind(&self.username)
        .bind(&self.email)
        .bind(&self.password)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }
}

fn encode_list(field: RecordField, values: Vec<&str>) -> Result<String> {
    serde_json::to_string(&values).map_err(|error| StoreError::Encode {
        column: field.column(),
        message: error.to_string(),
    })
}

fn decode_list(row: &SqliteRow, field: RecordField) -> Result<Vec<String>> {
    let raw: String = row.try_get(field.column())?;
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&raw).map_err(|error| StoreError::Decode {
        column: field.column(),
        message: error.to_string(),
    })
}

fn record_from_row(row: &SqliteRow) -> Result<Record> {
    let mut record = Record::with_id(row.try_get::<String, _>("dehashed_id")?);
    record.email = decode_list(row, RecordField::Email)?;
    record.ip_address = decode_list(row, RecordField::IpAddress)?;
    record.username = decode_list(row, RecordField::Username)?;
    record.password = decode_list(row, RecordField::Password)?;
    record.hashed_password = decode_list(row, RecordField::HashedPassword)?;
    record.hash_type = row.try_get("hash_type")?;
    record.name = decode_list(row, RecordField::Name)?;
    record.vin = decode_list(row, RecordField::Vin)?;
    record.license_plate = decode_list(row, RecordField::LicensePlate)?;
    record.url = decode_list(row, RecordField::Url)?;
    record.social = decode_list(row, RecordField::Social)?;
    record.cryptocurrency_address = decode_list(row, RecordField::CryptocurrencyAddress)?;
    record.address = decode_list(row, RecordField::Address)?;
    record.phone = decode_list(row, RecordField::Phone)?;
    record.company = decode_list(row, RecordField::Company)?;
    record.database_name = row.try_get("database_name")?;
    Ok(record)
}

fn credential_from_row(row: &SqliteRow) -> Result<StoredCredential> {
    Ok(StoredCredential {
        record_id: row.try_get("record_id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        password: row.try_get("password")?,
    })
}
