// 🗄️ Record Source - SQLite tables for API calls and commerces
//
// Two tables, mirroring the source system:
//   apicall  (commerce_id, date_api_call, ask_status)
//   commerce (commerce_id, commerce_name, commerce_status, commerce_nit, commerce_email)
//
// Records are read as-is. Timestamps stay raw text here; the eligibility
// filter parses them so a bad value aborts the run.

use crate::error::{BillingError, Result};
use rusqlite::{params, Connection, ErrorCode};
use std::collections::HashSet;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Status literal that marks a successful call. Everything else is a failure.
pub const STATUS_SUCCESSFUL: &str = "Successful";

/// Status literal that marks a billable commerce.
pub const STATUS_ACTIVE: &str = "Active";

// ============================================================================
// RECORDS
// ============================================================================

/// One API call event attributed to a commerce
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRecord {
    #[serde(rename = "commerce_id")]
    pub commerce_id: String,

    /// Raw timestamp as stored (parsed by the eligibility filter)
    #[serde(rename = "date_api_call")]
    pub timestamp: String,

    #[serde(rename = "ask_status")]
    pub status: String,
}

impl CallRecord {
    pub fn new(commerce_id: &str, timestamp: &str, status: &str) -> Self {
        CallRecord {
            commerce_id: commerce_id.to_string(),
            timestamp: timestamp.to_string(),
            status: status.to_string(),
        }
    }

    /// Only the exact literal "Successful" counts; unknown statuses are failures
    pub fn is_successful(&self) -> bool {
        self.status == STATUS_SUCCESSFUL
    }
}

/// A partner company billed for API usage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommerceRecord {
    #[serde(rename = "commerce_id")]
    pub commerce_id: String,

    #[serde(rename = "commerce_name")]
    pub name: String,

    #[serde(rename = "commerce_status")]
    pub status: String,

    #[serde(rename = "commerce_nit", default)]
    pub tax_id: String,

    #[serde(rename = "commerce_email", default)]
    pub email: String,
}

impl CommerceRecord {
    pub fn new(commerce_id: &str, name: &str, status: &str, tax_id: &str, email: &str) -> Self {
        CommerceRecord {
            commerce_id: commerce_id.to_string(),
            name: name.to_string(),
            status: status.to_string(),
            tax_id: tax_id.to_string(),
            email: email.to_string(),
        }
    }

    /// Case-sensitive exact match on "Active"
    pub fn is_active(&self) -> bool {
        self.status == STATUS_ACTIVE
    }

    /// Name used to look up the contract (surrounding whitespace removed)
    pub fn contract_name(&self) -> &str {
        self.name.trim()
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS commerce (
            commerce_id TEXT PRIMARY KEY,
            commerce_name TEXT NOT NULL,
            commerce_status TEXT NOT NULL,
            commerce_nit TEXT,
            commerce_email TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS apicall (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            commerce_id TEXT,
            date_api_call TEXT,
            ask_status TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_apicall_commerce ON apicall(commerce_id)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// LOADERS
// ============================================================================

fn required_id(value: Option<String>, table: &str, row: usize) -> Result<String> {
    match value {
        Some(id) if !id.trim().is_empty() => Ok(id),
        _ => Err(BillingError::data(format!(
            "missing commerce_id in {} row {}",
            table, row
        ))),
    }
}

/// Load every API call row. A row without commerce_id aborts the load.
pub fn load_api_calls(conn: &Connection) -> Result<Vec<CallRecord>> {
    let mut stmt = conn.prepare(
        "SELECT commerce_id, date_api_call, ask_status
         FROM apicall
         ORDER BY rowid",
    )?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, Option<String>>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut calls = Vec::with_capacity(rows.len());
    for (index, (commerce_id, timestamp, status)) in rows.into_iter().enumerate() {
        let commerce_id = required_id(commerce_id, "apicall", index + 1)?;
        calls.push(CallRecord {
            commerce_id,
            // Empty timestamp is rejected later by the filter
            timestamp: timestamp.unwrap_or_default(),
            status: status.unwrap_or_default(),
        });
    }

    debug!(count = calls.len(), "loaded apicall rows");
    Ok(calls)
}

/// Load every commerce row. NULL tax id / email become empty strings.
pub fn load_commerces(conn: &Connection) -> Result<Vec<CommerceRecord>> {
    let mut stmt = conn.prepare(
        "SELECT commerce_id, commerce_name, commerce_status, commerce_nit, commerce_email
         FROM commerce
         ORDER BY commerce_id",
    )?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, Option<String>>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<String>>(4)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut commerces = Vec::with_capacity(rows.len());
    for (index, (commerce_id, name, status, tax_id, email)) in rows.into_iter().enumerate() {
        commerces.push(CommerceRecord {
            commerce_id: required_id(commerce_id, "commerce", index + 1)?,
            name: name.unwrap_or_default(),
            status: status.unwrap_or_default(),
            tax_id: tax_id.unwrap_or_default(),
            email: email.unwrap_or_default(),
        });
    }

    debug!(count = commerces.len(), "loaded commerce rows");
    Ok(commerces)
}

pub fn count_rows(conn: &Connection, table: &str) -> Result<i64> {
    let sql = match table {
        "apicall" => "SELECT COUNT(*) FROM apicall",
        "commerce" => "SELECT COUNT(*) FROM commerce",
        other => {
            return Err(BillingError::config(format!("unknown table: {}", other)));
        }
    };
    let count: i64 = conn.query_row(sql, [], |row| row.get(0))?;
    Ok(count)
}

// ============================================================================
// WRITERS (import + test fixtures)
// ============================================================================

/// Insert commerces in one transaction. An id that is already stored, or
/// repeated in `commerces`, is a data error and nothing is written.
pub fn insert_commerces(conn: &mut Connection, commerces: &[CommerceRecord]) -> Result<usize> {
    let tx = conn.transaction()?;
    let mut inserted = 0;

    {
        let mut stmt = tx.prepare(
            "INSERT INTO commerce
                (commerce_id, commerce_name, commerce_status, commerce_nit, commerce_email)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;

        for c in commerces {
            inserted += stmt
                .execute(params![c.commerce_id, c.name, c.status, c.tax_id, c.email])
                .map_err(|e| match e {
                    rusqlite::Error::SqliteFailure(ref f, _)
                        if f.code == ErrorCode::ConstraintViolation =>
                    {
                        BillingError::data(format!("duplicate commerce_id {}", c.commerce_id))
                    }
                    other => BillingError::Storage(other),
                })?;
        }
    }

    tx.commit()?;
    Ok(inserted)
}

pub fn insert_api_calls(conn: &mut Connection, calls: &[CallRecord]) -> Result<usize> {
    let tx = conn.transaction()?;
    let mut inserted = 0;

    {
        let mut stmt = tx.prepare(
            "INSERT INTO apicall (commerce_id, date_api_call, ask_status) VALUES (?1, ?2, ?3)",
        )?;

        for call in calls {
            inserted += stmt.execute(params![call.commerce_id, call.timestamp, call.status])?;
        }
    }

    tx.commit()?;
    Ok(inserted)
}

/// Read API calls from a CSV export with the apicall column names
pub fn load_calls_csv(path: &Path) -> Result<Vec<CallRecord>> {
    let mut rdr = csv::Reader::from_path(path)?;
    let mut calls = Vec::new();

    for result in rdr.deserialize() {
        let call: CallRecord = result?;
        if call.commerce_id.trim().is_empty() {
            return Err(BillingError::data(format!(
                "missing commerce_id in {} row {}",
                path.display(),
                calls.len() + 1
            )));
        }
        calls.push(call);
    }

    info!(count = calls.len(), path = %path.display(), "read api calls from CSV");
    Ok(calls)
}

/// Read commerces from a CSV export with the commerce column names
pub fn load_commerces_csv(path: &Path) -> Result<Vec<CommerceRecord>> {
    let mut rdr = csv::Reader::from_path(path)?;
    let mut commerces = Vec::new();
    let mut seen = HashSet::new();

    for result in rdr.deserialize() {
        let commerce: CommerceRecord = result?;
        if commerce.commerce_id.trim().is_empty() {
            return Err(BillingError::data(format!(
                "missing commerce_id in {} row {}",
                path.display(),
                commerces.len() + 1
            )));
        }
        if !seen.insert(commerce.commerce_id.clone()) {
            return Err(BillingError::data(format!(
                "duplicate commerce_id {} in {} row {}",
                commerce.commerce_id,
                path.display(),
                commerces.len() + 1
            )));
        }
        commerces.push(commerce);
    }

    info!(count = commerces.len(), path = %path.display(), "read commerces from CSV");
    Ok(commerces)
}
