// ⚙️ Configuration - where the data lives and how it is billed
//
// Defaults match the deployment: Datos/database.sqlite, year 2024,
// July + August when no months are requested, 19% tax.

use crate::contracts::ContractRegistry;
use crate::error::{BillingError, Result};
use crate::period::BillingPeriod;
use crate::pricing::PricingEngine;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingConfig {
    /// SQLite database with the apicall and commerce tables
    pub database_path: PathBuf,

    /// Year every billed call must fall in
    pub target_year: i32,

    /// Months billed when the caller gives none
    pub default_months: [u32; 2],

    /// Months requested for this run (empty = default_months)
    pub months: Vec<u32>,

    pub tax_rate: Decimal,

    /// Directory for exported reports
    pub output_dir: PathBuf,

    /// Optional JSON contract table; the built-in contracts are used otherwise
    pub contracts_path: Option<PathBuf>,
}

impl Default for BillingConfig {
    fn default() -> Self {
        BillingConfig {
            database_path: PathBuf::from("Datos/database.sqlite"),
            target_year: 2024,
            default_months: [7, 8],
            months: Vec::new(),
            tax_rate: dec!(0.19),
            output_dir: PathBuf::from("reportes"),
            contracts_path: None,
        }
    }
}

impl BillingConfig {
    /// Read a JSON config file; missing keys keep their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            BillingError::config(format!("failed to read config {:?}: {}", path.as_ref(), e))
        })?;
        let config: BillingConfig = serde_json::from_str(&content)
            .map_err(|e| BillingError::config(format!("failed to parse config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject bad months and tax rates before any record is read
    pub fn validate(&self) -> Result<()> {
        self.period()?;
        if self.tax_rate < Decimal::ZERO {
            return Err(BillingError::config(format!(
                "tax rate {} must not be negative",
                self.tax_rate
            )));
        }
        Ok(())
    }

    pub fn period(&self) -> Result<BillingPeriod> {
        BillingPeriod::new(self.target_year, &self.months, self.default_months)
    }

    pub fn contracts(&self) -> Result<ContractRegistry> {
        match &self.contracts_path {
            Some(path) => ContractRegistry::from_file(path),
            None => Ok(ContractRegistry::standard()),
        }
    }

    pub fn pricing_engine(&self) -> Result<PricingEngine> {
        PricingEngine::new(self.contracts()?, self.tax_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BillingConfig::default();
        assert_eq!(config.target_year, 2024);
        assert_eq!(config.tax_rate, dec!(0.19));

        let period = config.period().unwrap();
        assert_eq!(period.months, vec![7, 8]);
        assert_eq!(config.pricing_engine().unwrap().registry().len(), 5);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: BillingConfig =
            serde_json::from_str(r#"{ "months": [1, 2, 3], "tax_rate": "0.16" }"#).unwrap();
        config.validate().unwrap();

        assert_eq!(config.months, vec![1, 2, 3]);
        assert_eq!(config.tax_rate, dec!(0.16));
        assert_eq!(config.default_months, [7, 8]);
        assert_eq!(config.database_path, PathBuf::from("Datos/database.sqlite"));
    }

    #[test]
    fn test_shipped_config_file() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/billing.json");
        let mut config = BillingConfig::from_file(path).unwrap();
        assert_eq!(config, {
            let mut expected = BillingConfig::default();
            expected.contracts_path = Some(PathBuf::from("config/contracts.json"));
            expected
        });

        config.contracts_path = Some(
            Path::new(env!("CARGO_MANIFEST_DIR")).join("config/contracts.json"),
        );
        assert_eq!(config.pricing_engine().unwrap().registry().len(), 5);
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        let mut config = BillingConfig::default();
        config.months = vec![7, 13];
        assert!(config.validate().unwrap_err().is_config_error());

        let mut config = BillingConfig::default();
        config.tax_rate = dec!(-0.19);
        assert!(config.validate().unwrap_err().is_config_error());
    }

    #[test]
    fn test_override_checked_when_engine_is_built() {
        // command-line overrides skip validate(); building the run still rejects them
        let mut config = BillingConfig::default();
        config.tax_rate = dec!(-0.05);
        assert!(config.pricing_engine().err().unwrap().is_config_error());

        let mut config = BillingConfig::default();
        config.months = vec![0];
        assert!(config.period().unwrap_err().is_config_error());
    }

    #[test]
    fn test_missing_files_are_config_errors() {
        assert!(BillingConfig::from_file("/nonexistent/billing.json")
            .unwrap_err()
            .is_config_error());

        let mut config = BillingConfig::default();
        config.contracts_path = Some(PathBuf::from("/nonexistent/contracts.json"));
        assert!(config.contracts().unwrap_err().is_config_error());
    }
}
