// 📅 Billing Period - which months of which year get billed
//
// A period is a target year plus a list of calendar months. When no months are
// given, the caller-supplied fallback pair is used instead.

use crate::error::{BillingError, Result};
use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// English name of a month (1-12)
pub fn month_name(month: u32) -> Option<&'static str> {
    if (1..=12).contains(&month) {
        Some(MONTH_NAMES[(month - 1) as usize])
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingPeriod {
    pub year: i32,
    /// Months in the order they were requested, without duplicates
    pub months: Vec<u32>,
}

impl BillingPeriod {
    /// Build a validated period. Empty `months` falls back to `fallback`.
    pub fn new(year: i32, months: &[u32], fallback: [u32; 2]) -> Result<Self> {
        validate_months(&fallback)?;

        let requested: &[u32] = if months.is_empty() { &fallback } else { months };
        validate_months(requested)?;

        let mut unique = Vec::with_capacity(requested.len());
        for &m in requested {
            if !unique.contains(&m) {
                unique.push(m);
            }
        }

        Ok(BillingPeriod {
            year,
            months: unique,
        })
    }

    pub fn contains(&self, timestamp: &NaiveDateTime) -> bool {
        timestamp.year() == self.year && self.months.contains(&timestamp.month())
    }

    /// Human label naming the analyzed months, e.g. "July, August"
    pub fn label(&self) -> String {
        self.months
            .iter()
            .filter_map(|&m| month_name(m))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Compact key for file names, e.g. "7_8"
    pub fn key(&self) -> String {
        self.months
            .iter()
            .map(|m| m.to_string())
            .collect::<Vec<_>>()
            .join("_")
    }
}

fn validate_months(months: &[u32]) -> Result<()> {
    if let Some(bad) = months.iter().find(|m| !(1..=12).contains(*m)) {
        return Err(BillingError::config(format!(
            "month {} is outside 1-12",
            bad
        )));
    }
    Ok(())
}

/// Parse a comma separated month list such as "7, 8"
pub fn parse_months(input: &str) -> Result<Vec<u32>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let mut months = Vec::new();
    for part in trimmed.split(',') {
        let month: u32 = part.trim().parse().map_err(|_| {
            BillingError::config(format!("invalid month value: '{}'", part.trim()))
        })?;
        months.push(month);
    }

    validate_months(&months)?;
    Ok(months)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_empty_months_use_fallback() {
        let period = BillingPeriod::new(2024, &[], [7, 8]).unwrap();
        assert_eq!(period.months, vec![7, 8]);
        assert_eq!(period.label(), "July, August");
    }

    #[test]
    fn test_requested_months_keep_order_and_drop_duplicates() {
        let period = BillingPeriod::new(2024, &[9, 1, 9], [7, 8]).unwrap();
        assert_eq!(period.months, vec![9, 1]);
        assert_eq!(period.label(), "September, January");
        assert_eq!(period.key(), "9_1");
    }

    #[test]
    fn test_out_of_range_month_rejected() {
        assert!(BillingPeriod::new(2024, &[0], [7, 8]).unwrap_err().is_config_error());
        assert!(BillingPeriod::new(2024, &[13], [7, 8]).unwrap_err().is_config_error());
        assert!(BillingPeriod::new(2024, &[], [7, 14]).unwrap_err().is_config_error());
    }

    #[test]
    fn test_contains_checks_year_and_month() {
        let period = BillingPeriod::new(2024, &[7], [7, 8]).unwrap();
        assert!(period.contains(&at(2024, 7, 1)));
        assert!(period.contains(&at(2024, 7, 31)));
        assert!(!period.contains(&at(2024, 8, 1)));
        assert!(!period.contains(&at(2023, 7, 15)));
    }

    #[test]
    fn test_parse_months() {
        assert_eq!(parse_months("7,8").unwrap(), vec![7, 8]);
        assert_eq!(parse_months(" 1 , 12 ").unwrap(), vec![1, 12]);
        assert!(parse_months("").unwrap().is_empty());
        assert!(parse_months("7,x").unwrap_err().is_config_error());
        assert!(parse_months("0").unwrap_err().is_config_error());
    }

    #[test]
    fn test_month_name_bounds() {
        assert_eq!(month_name(1), Some("January"));
        assert_eq!(month_name(12), Some("December"));
        assert_eq!(month_name(0), None);
    }
}
