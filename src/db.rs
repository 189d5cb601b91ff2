use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::config::RECLASSIFY_BELOW;

/// Storage format for transaction timestamps (sorts lexicographically)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ============================================================================
// TRANSACTION MODEL
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
    Transfer,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Income => "income",
            TransactionKind::Expense => "expense",
            TransactionKind::Transfer => "transfer",
        }
    }

    pub fn parse(value: &str) -> Option<TransactionKind> {
        match value.trim().to_lowercase().as_str() {
            "income" | "receita" => Some(TransactionKind::Income),
            "expense" | "despesa" => Some(TransactionKind::Expense),
            "transfer" | "transferencia" | "transferência" => Some(TransactionKind::Transfer),
            _ => None,
        }
    }
}

impl FromStr for TransactionKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match TransactionKind::parse(s) {
            Some(kind) => Ok(kind),
            None => bail!("Unknown transaction kind: {} (expected income, expense or transfer)", s),
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transaction as seen by the classifiers.
/// Core fields are written once by the importer; the three classification
/// fields are the only ones the classifiers ever update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    // ========================================================================
    // CORE FIELDS (immutable once stored)
    // ========================================================================
    pub id: String,
    pub company_id: i64,
    pub description: String,
    pub amount: Decimal,
    pub timestamp: NaiveDateTime,
    pub kind: TransactionKind,

    // ========================================================================
    // CLASSIFICATION FIELDS
    // ========================================================================
    #[serde(default)]
    pub category: Option<String>,

    #[serde(default)]
    pub ml_confidence: Option<f64>,

    #[serde(default)]
    pub is_personal: Option<bool>,
}

impl Transaction {
    /// New unclassified transaction with a fresh UUID
    pub fn new(
        company_id: i64,
        description: &str,
        amount: Decimal,
        timestamp: NaiveDateTime,
        kind: TransactionKind,
    ) -> Self {
        Transaction {
            id: uuid::Uuid::new_v4().to_string(),
            company_id,
            description: description.to_string(),
            amount,
            timestamp,
            kind,
            category: None,
            ml_confidence: None,
            is_personal: None,
        }
    }

    /// Compute idempotency hash for duplicate detection.
    /// Identity = id (UUID), deduplication = hash.
    pub fn compute_idempotency_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!(
            "{}|{}|{}|{}",
            self.company_id,
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.amount.normalize(),
            self.description
        ));
        format!("{:x}", hasher.finalize())
    }
}

/// Partial update of the classification fields; `None` leaves a column unchanged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldUpdate {
    pub transaction_id: String,
    pub category: Option<String>,
    pub ml_confidence: Option<f64>,
    pub is_personal: Option<bool>,
}

impl FieldUpdate {
    pub fn new(transaction_id: &str) -> Self {
        FieldUpdate {
            transaction_id: transaction_id.to_string(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.category.is_none() && self.ml_confidence.is_none() && self.is_personal.is_none()
    }
}

// ============================================================================
// STORE INTERFACE
// ============================================================================

/// What the classification core needs from persistence
pub trait TransactionStore {
    /// Up to `limit` transactions with no category or a category below the
    /// reclassification threshold
    fn fetch_transactions_needing_category(&self, company_id: i64, limit: usize) -> Result<Vec<Transaction>>;

    /// Up to `limit` transactions with no personal/business label
    fn fetch_transactions_needing_origin(&self, company_id: i64, limit: usize) -> Result<Vec<Transaction>>;

    /// Every transaction at or after `since`
    fn fetch_transactions_for_analysis(&self, company_id: i64, since: NaiveDateTime) -> Result<Vec<Transaction>>;

    /// Write the non-`None` fields of `update`. Unknown ids are an error.
    fn persist_transaction_fields(&self, update: &FieldUpdate) -> Result<()>;

    fn begin_batch(&self) -> Result<()> {
        Ok(())
    }

    fn commit_batch(&self) -> Result<()> {
        Ok(())
    }

    fn rollback_batch(&self) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// AUDIT EVENTS
// ============================================================================

/// Event for audit trail: every classification write is recorded
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS transactions (
            id TEXT PRIMARY KEY,
            idempotency_hash TEXT UNIQUE NOT NULL,
            company_id INTEGER NOT NULL,
            description TEXT NOT NULL,
            amount TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            kind TEXT NOT NULL,
            category TEXT,
            ml_confidence REAL,
            is_personal INTEGER,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transactions_company_time ON transactions(company_id, timestamp)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

/// Open (or create) a database file with the schema in place
pub fn open_database(path: &str) -> Result<Connection> {
    let conn = Connection::open(path).with_context(|| format!("Failed to open database: {}", path))?;
    setup_database(&conn).context("Failed to set up database schema")?;
    Ok(conn)
}

// ============================================================================
// INSERTS
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InsertSummary {
    pub inserted: usize,
    pub duplicates: usize,
}

/// Insert one transaction. Returns `false` when its idempotency hash already exists.
pub fn insert_transaction(conn: &Connection, tx: &Transaction) -> Result<bool> {
    let hash = tx.compute_idempotency_hash();

    let result = conn.execute(
        "INSERT INTO transactions (
            id, idempotency_hash, company_id, description, amount, timestamp, kind,
            category, ml_confidence, is_personal
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            tx.id,
            hash,
            tx.company_id,
            tx.description,
            tx.amount.to_string(),
            tx.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            tx.kind.as_str(),
            tx.category,
            tx.ml_confidence,
            tx.is_personal,
        ],
    );

    match result {
        Ok(_) => {
            let event = Event::new(
                "transaction_added",
                "transaction",
                &tx.id,
                serde_json::json!({
                    "company_id": tx.company_id,
                    "amount": tx.amount.to_string(),
                    "kind": tx.kind.as_str(),
                    "idempotency_hash": hash,
                }),
                "importer",
            );
            insert_event(conn, &event)?;
            Ok(true)
        }
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Ok(false)
        }
        Err(e) => Err(e).context("Failed to insert transaction"),
    }
}

pub fn insert_transactions(conn: &Connection, transactions: &[Transaction]) -> Result<InsertSummary> {
    let mut summary = InsertSummary::default();

    for tx in transactions {
        if insert_transaction(conn, tx)? {
            summary.inserted += 1;
        } else {
            summary.duplicates += 1;
        }
    }

    tracing::info!(
        inserted = summary.inserted,
        duplicates = summary.duplicates,
        "transactions stored"
    );

    Ok(summary)
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity, oldest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY id",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                    .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?
                    .with_timezone(&Utc),
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json)
                    .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?,
                actor: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

// ============================================================================
// QUERIES
// ============================================================================

const TRANSACTION_COLUMNS: &str =
    "id, company_id, description, amount, timestamp, kind, category, ml_confidence, is_personal";

fn row_to_transaction(row: &Row) -> rusqlite::Result<Transaction> {
    let amount_str: String = row.get(3)?;
    let timestamp_str: String = row.get(4)?;
    let kind_str: String = row.get(5)?;

    let amount = Decimal::from_str(&amount_str)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;
    let timestamp = NaiveDateTime::parse_from_str(&timestamp_str, TIMESTAMP_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;
    let kind = TransactionKind::parse(&kind_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            5,
            Type::Text,
            Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("invalid transaction kind: {kind_str}"),
            )),
        )
    })?;

    Ok(Transaction {
        id: row.get(0)?,
        company_id: row.get(1)?,
        description: row.get(2)?,
        amount,
        timestamp,
        kind,
        category: row.get(6)?,
        ml_confidence: row.get(7)?,
        is_personal: row.get(8)?,
    })
}

pub fn get_transaction(conn: &Connection, id: &str) -> Result<Option<Transaction>> {
    let sql = format!("SELECT {} FROM transactions WHERE id = ?1", TRANSACTION_COLUMNS);
    let tx = conn.query_row(&sql, [id], row_to_transaction).optional()?;
    Ok(tx)
}

pub fn verify_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?;

    Ok(count)
}

// ============================================================================
// SQLITE STORE
// ============================================================================

/// SQLite reads a negative LIMIT as "no limit"; saturate instead of wrapping
fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// [`TransactionStore`] over a borrowed SQLite connection
pub struct SqliteTransactionStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteTransactionStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        SqliteTransactionStore { conn }
    }

    pub fn connection(&self) -> &Connection {
        self.conn
    }

    fn write_fields(&self, update: &FieldUpdate) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE transactions
             SET category = COALESCE(?2, category),
                 ml_confidence = COALESCE(?3, ml_confidence),
                 is_personal = COALESCE(?4, is_personal),
                 updated_at = ?5
             WHERE id = ?1",
            params![
                update.transaction_id,
                update.category,
                update.ml_confidence,
                update.is_personal,
                Utc::now().to_rfc3339(),
            ],
        )?;

        if updated == 0 {
            bail!("Transaction not found: {}", update.transaction_id);
        }

        let event = Event::new(
            "transaction_classified",
            "transaction",
            &update.transaction_id,
            serde_json::to_value(update)?,
            "classifier",
        );
        insert_event(self.conn, &event)?;

        Ok(())
    }

    fn query(&self, filter: &str, params: impl rusqlite::Params) -> Result<Vec<Transaction>> {
        let sql = format!("SELECT {} FROM transactions WHERE {}", TRANSACTION_COLUMNS, filter);
        let mut stmt = self.conn.prepare(&sql)?;

        let transactions = stmt
            .query_map(params, row_to_transaction)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(transactions)
    }
}

impl<'a> TransactionStore for SqliteTransactionStore<'a> {
    fn fetch_transactions_needing_category(&self, company_id: i64, limit: usize) -> Result<Vec<Transaction>> {
        self.query(
            "company_id = ?1 AND (category IS NULL OR ml_confidence < ?2)
             ORDER BY timestamp, id LIMIT ?3",
            params![company_id, RECLASSIFY_BELOW, sql_limit(limit)],
        )
        .context("Failed to fetch transactions needing a category")
    }

    fn fetch_transactions_needing_origin(&self, company_id: i64, limit: usize) -> Result<Vec<Transaction>> {
        self.query(
            "company_id = ?1 AND is_personal IS NULL
             ORDER BY timestamp, id LIMIT ?2",
            params![company_id, sql_limit(limit)],
        )
        .context("Failed to fetch transactions needing an origin")
    }

    fn fetch_transactions_for_analysis(&self, company_id: i64, since: NaiveDateTime) -> Result<Vec<Transaction>> {
        self.query(
            "company_id = ?1 AND timestamp >= ?2 ORDER BY timestamp, id",
            params![company_id, since.format(TIMESTAMP_FORMAT).to_string()],
        )
        .context("Failed to fetch transactions for analysis")
    }

    /// Row update plus its audit event; both land or neither does
    fn persist_transaction_fields(&self, update: &FieldUpdate) -> Result<()> {
        self.conn.execute_batch("SAVEPOINT persist_fields")?;

        match self.write_fields(update) {
            Ok(()) => {
                self.conn.execute_batch("RELEASE persist_fields")?;
                tracing::debug!(id = %update.transaction_id, "classification persisted");
                Ok(())
            }
            Err(e) => {
                if let Err(undo) = self.conn.execute_batch("ROLLBACK TO persist_fields; RELEASE persist_fields") {
                    tracing::warn!(error = %undo, "failed to undo partial classification write");
                }
                Err(e)
            }
        }
    }

    fn begin_batch(&self) -> Result<()> {
        self.conn.execute_batch("BEGIN").context("Failed to begin batch")
    }

    fn commit_batch(&self) -> Result<()> {
        self.conn.execute_batch("COMMIT").context("Failed to commit batch")
    }

    fn rollback_batch(&self) -> Result<()> {
        self.conn.execute_batch("ROLLBACK").context("Failed to roll back batch")
    }
}
