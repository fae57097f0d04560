// 📤 Report Export - billing summary as CSV or JSON
//
// The only place amounts are rounded (2 dp, banker's rounding).

use crate::invoice::{BillingResult, InvoiceBatch, INVOICE_COLUMNS};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Csv,
    Json,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Csv => "csv",
            ReportFormat::Json => "json",
        }
    }
}

pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp(2)
}

/// `billing_summary_7_8_2024-09-02.csv`
pub fn report_file_name(batch: &InvoiceBatch, date: NaiveDate, format: ReportFormat) -> String {
    format!(
        "billing_summary_{}_{}.{}",
        batch.period.key(),
        date.format("%Y-%m-%d"),
        format.extension()
    )
}

/// One exported row, fields in report order
#[derive(Debug, Serialize)]
struct ReportRow<'a> {
    period: &'a str,
    name: &'a str,
    tax_id: &'a str,
    pretax_amount: String,
    tax_amount: String,
    total_amount: String,
    successful_calls: u64,
    failed_calls: u64,
    email: &'a str,
}

impl<'a> From<&'a BillingResult> for ReportRow<'a> {
    fn from(inv: &'a BillingResult) -> Self {
        ReportRow {
            period: &inv.period_label,
            name: inv.name.trim(),
            tax_id: &inv.tax_id,
            pretax_amount: format!("{:.2}", round_money(inv.pretax_amount)),
            tax_amount: format!("{:.2}", round_money(inv.tax_amount)),
            total_amount: format!("{:.2}", round_money(inv.total_amount)),
            successful_calls: inv.successful_count,
            failed_calls: inv.failed_count,
            email: &inv.email,
        }
    }
}

pub fn write_csv<W: Write>(batch: &InvoiceBatch, writer: W) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
    wtr.write_record(INVOICE_COLUMNS)?;
    for invoice in &batch.invoices {
        wtr.serialize(ReportRow::from(invoice))?;
    }
    wtr.flush()?;
    Ok(())
}

/// JSON rows also carry the undiscounted commission and the discount
#[derive(Debug, Serialize)]
struct JsonInvoice<'a> {
    commerce_id: &'a str,
    #[serde(flatten)]
    row: ReportRow<'a>,
    commission_amount: String,
    discount_amount: String,
}

impl<'a> From<&'a BillingResult> for JsonInvoice<'a> {
    fn from(inv: &'a BillingResult) -> Self {
        JsonInvoice {
            commerce_id: &inv.commerce_id,
            row: ReportRow::from(inv),
            commission_amount: format!("{:.2}", round_money(inv.commission_amount)),
            discount_amount: format!("{:.2}", round_money(inv.discount_amount)),
        }
    }
}

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    period: &'a str,
    year: i32,
    months: &'a [u32],
    tax_rate: String,
    digest: String,
    invoices: Vec<JsonInvoice<'a>>,
    unpriced: Vec<&'a str>,
}

pub fn write_json<W: Write>(batch: &InvoiceBatch, writer: W) -> Result<()> {
    let report = JsonReport {
        period: &batch.period_label,
        year: batch.period.year,
        months: &batch.period.months,
        tax_rate: batch.tax_rate.normalize().to_string(),
        digest: batch.digest(),
        invoices: batch.invoices.iter().map(JsonInvoice::from).collect(),
        unpriced: batch.unpriced().map(|i| i.commerce_id.as_str()).collect(),
    };
    serde_json::to_writer_pretty(writer, &report).context("Failed to write JSON report")?;
    Ok(())
}

/// Write the report into `dir` (created if missing) and return its path
pub fn export_report(
    batch: &InvoiceBatch,
    dir: &Path,
    date: NaiveDate,
    format: ReportFormat,
) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {:?}", dir))?;

    let path = dir.join(report_file_name(batch, date, format));
    let file = fs::File::create(&path)
        .with_context(|| format!("Failed to create report file: {:?}", path))?;

    match format {
        ReportFormat::Csv => write_csv(batch, file)?,
        ReportFormat::Json => write_json(batch, file)?,
    }

    Ok(path)
}
