// 🔍 Eligibility Filter - which calls and which commerces get billed
//
// Calls: timestamp inside the billing period (every timestamp is parsed, one
// bad value aborts the run). Commerces: status exactly "Active".
// A blank commerce_id on any record aborts the run, whatever the source.

use crate::db::{CallRecord, CommerceRecord};
use crate::error::{BillingError, Result};
use crate::period::BillingPeriod;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::debug;

/// Formats accepted besides RFC 3339
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

/// A call that passed the period filter, with its timestamp parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibleCall {
    pub commerce_id: String,
    pub timestamp: NaiveDateTime,
    pub successful: bool,
}

/// Parse a stored call timestamp (naive local time; offsets are dropped)
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Keep the calls that fall inside `period`.
///
/// Fails with `BillingError::Data` on the first timestamp that cannot be
/// parsed, even if that call would have been outside the period.
pub fn eligible_calls(calls: Vec<CallRecord>, period: &BillingPeriod) -> Result<Vec<EligibleCall>> {
    let total = calls.len();
    let mut eligible = Vec::new();

    for (index, call) in calls.into_iter().enumerate() {
        if call.commerce_id.trim().is_empty() {
            return Err(BillingError::data(format!(
                "missing commerce_id on call {} ({})",
                index + 1,
                call.timestamp
            )));
        }

        let timestamp = parse_timestamp(&call.timestamp).ok_or_else(|| {
            BillingError::data(format!(
                "unparseable timestamp '{}' for commerce {}",
                call.timestamp, call.commerce_id
            ))
        })?;

        if period.contains(&timestamp) {
            let successful = call.is_successful();
            eligible.push(EligibleCall {
                commerce_id: call.commerce_id,
                timestamp,
                successful,
            });
        }
    }

    debug!(total, eligible = eligible.len(), "filtered calls by period");
    Ok(eligible)
}

/// Keep the commerces whose status is exactly "Active".
///
/// Every record is checked for a commerce_id first, inactive ones included.
pub fn active_commerces(commerces: Vec<CommerceRecord>) -> Result<Vec<CommerceRecord>> {
    if let Some(blank) = commerces.iter().find(|c| c.commerce_id.trim().is_empty()) {
        return Err(BillingError::data(format!(
            "missing commerce_id for commerce '{}'",
            blank.name
        )));
    }

    let total = commerces.len();
    let active: Vec<CommerceRecord> = commerces.into_iter().filter(|c| c.is_active()).collect();
    debug!(total, active = active.len(), "filtered commerces by status");
    Ok(active)
}
