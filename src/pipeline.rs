// 🔄 Billing Run - records → filter → aggregate → price → invoices
//
// Single pass, synchronous, fail fast. The record source is owned by the run
// and dropped when the run ends, on success or error.

use crate::aggregation::aggregate;
use crate::db::{self, CallRecord, CommerceRecord};
use crate::eligibility::{active_commerces, eligible_calls};
use crate::error::Result;
use crate::invoice::{assemble, InvoiceBatch};
use crate::period::BillingPeriod;
use crate::pricing::PricingEngine;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use tracing::{info, warn};

/// Where call events and commerces come from
pub trait RecordSource {
    fn load_calls(&self) -> Result<Vec<CallRecord>>;
    fn load_commerces(&self) -> Result<Vec<CommerceRecord>>;
}

/// SQLite-backed source holding its own connection
pub struct SqliteSource {
    conn: Connection,
}

impl SqliteSource {
    /// Open an existing database read-only
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(SqliteSource { conn })
    }

    pub fn from_connection(conn: Connection) -> Self {
        SqliteSource { conn }
    }
}

impl RecordSource for SqliteSource {
    fn load_calls(&self) -> Result<Vec<CallRecord>> {
        db::load_api_calls(&self.conn)
    }

    fn load_commerces(&self) -> Result<Vec<CommerceRecord>> {
        db::load_commerces(&self.conn)
    }
}

/// In-memory source, used by tests and by callers that already hold the rows
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    pub calls: Vec<CallRecord>,
    pub commerces: Vec<CommerceRecord>,
}

impl RecordSource for MemorySource {
    fn load_calls(&self) -> Result<Vec<CallRecord>> {
        Ok(self.calls.clone())
    }

    fn load_commerces(&self) -> Result<Vec<CommerceRecord>> {
        Ok(self.commerces.clone())
    }
}

pub struct BillingRun<'a> {
    engine: &'a PricingEngine,
    period: BillingPeriod,
}

impl<'a> BillingRun<'a> {
    pub fn new(engine: &'a PricingEngine, period: BillingPeriod) -> Self {
        BillingRun { engine, period }
    }

    pub fn period(&self) -> &BillingPeriod {
        &self.period
    }

    /// Run the whole pipeline. Takes the source by value so it is released
    /// as soon as the run returns.
    pub fn execute<S: RecordSource>(&self, source: S) -> Result<InvoiceBatch> {
        let calls = source.load_calls()?;
        let commerces = source.load_commerces()?;
        drop(source);

        info!(
            calls = calls.len(),
            commerces = commerces.len(),
            period = %self.period.label(),
            year = self.period.year,
            "loaded records"
        );

        let eligible = eligible_calls(calls, &self.period)?;
        let active = active_commerces(commerces)?;
        info!(
            eligible_calls = eligible.len(),
            active_commerces = active.len(),
            "applied eligibility filter"
        );

        let aggregated = aggregate(eligible, active)?;
        let batch = assemble(aggregated, self.engine, &self.period);

        for invoice in batch.unpriced() {
            warn!(
                commerce_id = %invoice.commerce_id,
                name = %invoice.name,
                "commerce has no contract; invoice is zero"
            );
        }

        let totals = batch.totals();
        info!(
            invoices = totals.invoices,
            unpriced = totals.unpriced,
            total = %totals.total.round_dp(2),
            digest = %batch.digest(),
            "billing run complete"
        );

        Ok(batch)
    }
}
