// 🧾 Invoice Assembler - one billing row per commerce
//
// Joins the call counts, the price breakdown and the commerce metadata.
// Amounts stay unrounded; export.rs rounds them for presentation.

use crate::aggregation::AggregatedCommerce;
use crate::period::BillingPeriod;
use crate::pricing::PricingEngine;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Column headers in export order
pub const INVOICE_COLUMNS: [&str; 9] = [
    "Period",
    "Name",
    "Tax ID",
    "Pretax Amount",
    "Tax Amount",
    "Total Amount",
    "Successful Calls",
    "Failed Calls",
    "Email",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingResult {
    pub commerce_id: String,
    pub name: String,
    pub tax_id: String,
    pub email: String,
    /// Replaces the last call date in the report, e.g. "July, August"
    pub period_label: String,

    /// Before discount and tax
    pub commission_amount: Decimal,
    pub discount_amount: Decimal,
    /// After discount, before tax
    pub pretax_amount: Decimal,
    /// Always total_amount - pretax_amount
    pub tax_amount: Decimal,
    pub total_amount: Decimal,

    pub successful_count: u64,
    pub failed_count: u64,
    pub last_call_timestamp: NaiveDateTime,

    /// Contract that priced this row; `None` means unpriced (unknown company)
    pub contract: Option<String>,
}

impl BillingResult {
    pub fn is_priced(&self) -> bool {
        self.contract.is_some()
    }

    /// Canonical line used for the batch digest (unrounded values)
    fn canonical_line(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}",
            self.commerce_id,
            self.name,
            self.tax_id,
            self.email,
            self.period_label,
            self.commission_amount.normalize(),
            self.pretax_amount.normalize(),
            self.tax_amount.normalize(),
            self.total_amount.normalize(),
            self.successful_count,
            self.failed_count,
            self.last_call_timestamp,
            self.contract.as_deref().unwrap_or("-"),
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchTotals {
    pub invoices: usize,
    pub unpriced: usize,
    pub pretax: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

/// All invoices of one billing run, in ascending commerce_id order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceBatch {
    pub period: BillingPeriod,
    pub period_label: String,
    pub tax_rate: Decimal,
    pub invoices: Vec<BillingResult>,
}

impl InvoiceBatch {
    pub fn len(&self) -> usize {
        self.invoices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invoices.is_empty()
    }

    pub fn unpriced(&self) -> impl Iterator<Item = &BillingResult> {
        self.invoices.iter().filter(|i| !i.is_priced())
    }

    pub fn totals(&self) -> BatchTotals {
        self.invoices.iter().fold(
            BatchTotals {
                invoices: self.invoices.len(),
                ..BatchTotals::default()
            },
            |mut acc, inv| {
                if !inv.is_priced() {
                    acc.unpriced += 1;
                }
                acc.pretax += inv.pretax_amount;
                acc.tax += inv.tax_amount;
                acc.total += inv.total_amount;
                acc
            },
        )
    }

    /// SHA-256 over the period, tax rate and every invoice line.
    /// Same input data and configuration → same digest.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!(
            "{}|{:?}|{}\n",
            self.period.year,
            self.period.months,
            self.tax_rate.normalize()
        ));
        for invoice in &self.invoices {
            hasher.update(invoice.canonical_line());
            hasher.update("\n");
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Price every aggregated commerce and build the batch
pub fn assemble(
    aggregated: Vec<AggregatedCommerce>,
    engine: &PricingEngine,
    period: &BillingPeriod,
) -> InvoiceBatch {
    let period_label = period.label();

    let invoices = aggregated
        .into_iter()
        .map(|entry| {
            let price = engine.evaluate(&entry.group);
            let pretax_amount = price.discounted_base;
            let total_amount = price.total;

            BillingResult {
                commerce_id: entry.group.commerce_id,
                name: entry.group.name,
                tax_id: entry.commerce.tax_id,
                email: entry.commerce.email,
                period_label: period_label.clone(),
                commission_amount: price.base,
                discount_amount: price.base - pretax_amount,
                pretax_amount,
                tax_amount: total_amount - pretax_amount,
                total_amount,
                successful_count: entry.group.successful_count,
                failed_count: entry.group.failed_count,
                last_call_timestamp: entry.last_call,
                contract: price.contract,
            }
        })
        .collect();

    InvoiceBatch {
        period: period.clone(),
        period_label,
        tax_rate: engine.tax_rate(),
        invoices,
    }
}
