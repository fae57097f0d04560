// 🏷️ Contract Rules - Rules as Data
// Company identity → pricing schema (flat, tiered, or discounted by failures)
//
// Contract names are matched exactly after trimming surrounding whitespace.

use crate::error::{BillingError, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

// ============================================================================
// RULE DEFINITION
// ============================================================================

/// One rate step of a tiered contract. `up_to` is inclusive; `None` is the top tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateTier {
    pub up_to: Option<u64>,
    pub rate: Decimal,
}

/// Discount applied when the failed-call count falls in `[min_failed, max_failed]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscountBand {
    pub min_failed: u64,
    #[serde(default)]
    pub max_failed: Option<u64>,
    /// Multiplier on the base amount, e.g. 0.95 for 5% off
    pub factor: Decimal,
}

impl DiscountBand {
    pub fn covers(&self, failed: u64) -> bool {
        failed >= self.min_failed && self.max_failed.map_or(true, |max| failed <= max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PricingRule {
    /// successful × rate
    Flat { rate: Decimal },

    /// successful × rate of the first tier whose bound covers `successful`
    Tiered { tiers: Vec<RateTier> },

    /// Base rule, then the factor of the first matching band on failed calls
    Discounted {
        base: Box<PricingRule>,
        bands: Vec<DiscountBand>,
    },
}

impl PricingRule {
    /// Amount before discount and tax
    pub fn base_amount(&self, successful: u64) -> Decimal {
        let calls = Decimal::from(successful);
        match self {
            PricingRule::Flat { rate } => calls * *rate,
            PricingRule::Tiered { tiers } => calls * tier_rate(tiers, successful),
            PricingRule::Discounted { base, .. } => base.base_amount(successful),
        }
    }

    /// Discount multiplier for the failed-call count (1 when none applies)
    pub fn discount_factor(&self, failed: u64) -> Decimal {
        match self {
            PricingRule::Discounted { bands, .. } => bands
                .iter()
                .find(|band| band.covers(failed))
                .map(|band| band.factor)
                .unwrap_or(Decimal::ONE),
            _ => Decimal::ONE,
        }
    }

    /// Short description for listings
    pub fn describe(&self) -> String {
        match self {
            PricingRule::Flat { rate } => format!("flat {}", rate),
            PricingRule::Tiered { tiers } => {
                let steps: Vec<String> = tiers
                    .iter()
                    .map(|t| match t.up_to {
                        Some(max) => format!("<={}: {}", max, t.rate),
                        None => format!("above: {}", t.rate),
                    })
                    .collect();
                format!("tiered [{}]", steps.join(", "))
            }
            PricingRule::Discounted { base, bands } => {
                let steps: Vec<String> = bands
                    .iter()
                    .map(|b| match b.max_failed {
                        Some(max) => format!("failed {}..={}: x{}", b.min_failed, max, b.factor),
                        None => format!("failed >={}: x{}", b.min_failed, b.factor),
                    })
                    .collect();
                format!("{}; discount [{}]", base.describe(), steps.join(", "))
            }
        }
    }

    fn validate(&self, name: &str) -> Result<()> {
        match self {
            PricingRule::Flat { rate } => validate_rate(name, *rate),
            PricingRule::Tiered { tiers } => {
                if tiers.is_empty() {
                    return Err(BillingError::config(format!("{}: tiered rule has no tiers", name)));
                }
                let mut previous: Option<u64> = None;
                for (i, tier) in tiers.iter().enumerate() {
                    validate_rate(name, tier.rate)?;
                    let last = i == tiers.len() - 1;
                    match (tier.up_to, last) {
                        (None, true) => {}
                        (None, false) => {
                            return Err(BillingError::config(format!(
                                "{}: only the last tier may be unbounded",
                                name
                            )));
                        }
                        (Some(_), true) => {
                            return Err(BillingError::config(format!(
                                "{}: last tier must be unbounded",
                                name
                            )));
                        }
                        (Some(bound), false) => {
                            if previous.map_or(false, |p| bound <= p) {
                                return Err(BillingError::config(format!(
                                    "{}: tier bounds must be strictly increasing",
                                    name
                                )));
                            }
                            previous = Some(bound);
                        }
                    }
                }
                Ok(())
            }
            PricingRule::Discounted { base, bands } => {
                if matches!(**base, PricingRule::Discounted { .. }) {
                    return Err(BillingError::config(format!(
                        "{}: discounts cannot be nested",
                        name
                    )));
                }
                base.validate(name)?;

                for band in bands {
                    if band.factor <= Decimal::ZERO || band.factor > Decimal::ONE {
                        return Err(BillingError::config(format!(
                            "{}: discount factor {} must be in (0, 1]",
                            name, band.factor
                        )));
                    }
                    if band.max_failed.map_or(false, |max| max < band.min_failed) {
                        return Err(BillingError::config(format!(
                            "{}: discount band {}..{:?} is empty",
                            name, band.min_failed, band.max_failed
                        )));
                    }
                }

                for (i, a) in bands.iter().enumerate() {
                    for b in bands.iter().skip(i + 1) {
                        let a_max = a.max_failed.unwrap_or(u64::MAX);
                        let b_max = b.max_failed.unwrap_or(u64::MAX);
                        if a.min_failed <= b_max && b.min_failed <= a_max {
                            return Err(BillingError::config(format!(
                                "{}: discount bands overlap",
                                name
                            )));
                        }
                    }
                }
                Ok(())
            }
        }
    }
}

fn tier_rate(tiers: &[RateTier], successful: u64) -> Decimal {
    tiers
        .iter()
        .find(|t| t.up_to.map_or(true, |max| successful <= max))
        .map(|t| t.rate)
        .unwrap_or(Decimal::ZERO)
}

fn validate_rate(name: &str, rate: Decimal) -> Result<()> {
    if rate <= Decimal::ZERO {
        return Err(BillingError::config(format!(
            "{}: rate {} must be positive",
            name, rate
        )));
    }
    Ok(())
}

// ============================================================================
// CONTRACT REGISTRY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub name: String,
    pub rule: PricingRule,
}

/// Exact contract name → pricing rule
#[derive(Debug, Clone, Default)]
pub struct ContractRegistry {
    contracts: BTreeMap<String, PricingRule>,
}

impl ContractRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        ContractRegistry {
            contracts: BTreeMap::new(),
        }
    }

    /// The five contracts currently in force
    pub fn standard() -> Self {
        let mut registry = ContractRegistry::new();

        registry.insert("Innovexa Solutions", PricingRule::Flat { rate: dec!(300) });

        registry.insert(
            "NexaTech Industries",
            PricingRule::Tiered {
                tiers: vec![
                    RateTier { up_to: Some(10_000), rate: dec!(250) },
                    RateTier { up_to: Some(20_000), rate: dec!(200) },
                    RateTier { up_to: None, rate: dec!(170) },
                ],
            },
        );

        registry.insert("QuantumLeap Inc", PricingRule::Flat { rate: dec!(600) });

        registry.insert(
            "Zenith Corp",
            PricingRule::Discounted {
                base: Box::new(PricingRule::Tiered {
                    tiers: vec![
                        RateTier { up_to: Some(22_000), rate: dec!(250) },
                        RateTier { up_to: None, rate: dec!(130) },
                    ],
                }),
                bands: vec![DiscountBand {
                    min_failed: 6_001,
                    max_failed: None,
                    factor: dec!(0.95),
                }],
            },
        );

        registry.insert(
            "FusionWave Enterprises",
            PricingRule::Discounted {
                base: Box::new(PricingRule::Flat { rate: dec!(300) }),
                bands: vec![
                    DiscountBand {
                        min_failed: 2_500,
                        max_failed: Some(4_500),
                        factor: dec!(0.95),
                    },
                    DiscountBand {
                        min_failed: 4_501,
                        max_failed: None,
                        factor: dec!(0.92),
                    },
                ],
            },
        );

        registry
    }

    /// Load contracts from a JSON file (array of `{ name, rule }`)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            BillingError::config(format!(
                "failed to read contracts file {:?}: {}",
                path.as_ref(),
                e
            ))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let contracts: Vec<Contract> = serde_json::from_str(json)
            .map_err(|e| BillingError::config(format!("failed to parse contracts JSON: {}", e)))?;
        Self::from_contracts(contracts)
    }

    /// Build a registry, validating every rule
    pub fn from_contracts(contracts: Vec<Contract>) -> Result<Self> {
        let mut registry = ContractRegistry::new();
        for contract in contracts {
            let name = contract.name.trim();
            if name.is_empty() {
                return Err(BillingError::config("contract with empty name"));
            }
            if registry.contracts.contains_key(name) {
                return Err(BillingError::config(format!("duplicate contract: {}", name)));
            }
            contract.rule.validate(name)?;
            registry.insert(name, contract.rule);
        }
        Ok(registry)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.contracts())?)
    }

    /// Add or replace a contract
    pub fn insert(&mut self, name: &str, rule: PricingRule) {
        self.contracts.insert(name.trim().to_string(), rule);
    }

    /// Find the rule for a company name (trimmed, otherwise exact)
    pub fn lookup(&self, name: &str) -> Option<&PricingRule> {
        self.contracts.get(name.trim())
    }

    pub fn contracts(&self) -> Vec<Contract> {
        self.contracts
            .iter()
            .map(|(name, rule)| Contract {
                name: name.clone(),
                rule: rule.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_registry_has_five_contracts() {
        let registry = ContractRegistry::standard();
        assert_eq!(registry.len(), 5);
        for name in [
            "Innovexa Solutions",
            "NexaTech Industries",
            "QuantumLeap Inc",
            "Zenith Corp",
            "FusionWave Enterprises",
        ] {
            assert!(registry.lookup(name).is_some(), "missing {}", name);
        }
    }

    #[test]
    fn test_lookup_trims_but_stays_case_sensitive() {
        let registry = ContractRegistry::standard();
        assert!(registry.lookup("  Zenith Corp  ").is_some());
        assert!(registry.lookup("zenith corp").is_none());
        assert!(registry.lookup("Zenith  Corp").is_none());
        assert!(registry.lookup("Acme Ltd").is_none());
    }

    #[test]
    fn test_tier_bounds_are_inclusive() {
        let registry = ContractRegistry::standard();
        let nexa = registry.lookup("NexaTech Industries").unwrap();

        assert_eq!(nexa.base_amount(10_000), dec!(2500000));
        assert_eq!(nexa.base_amount(10_001), dec!(2000200));
        assert_eq!(nexa.base_amount(20_000), dec!(4000000));
        assert_eq!(nexa.base_amount(20_001), dec!(3400170));
    }

    #[test]
    fn test_discount_bands_are_inclusive() {
        let registry = ContractRegistry::standard();
        let fusion = registry.lookup("FusionWave Enterprises").unwrap();

        assert_eq!(fusion.discount_factor(2_499), Decimal::ONE);
        assert_eq!(fusion.discount_factor(2_500), dec!(0.95));
        assert_eq!(fusion.discount_factor(4_500), dec!(0.95));
        assert_eq!(fusion.discount_factor(4_501), dec!(0.92));

        let zenith = registry.lookup("Zenith Corp").unwrap();
        assert_eq!(zenith.discount_factor(6_000), Decimal::ONE);
        assert_eq!(zenith.discount_factor(6_001), dec!(0.95));
    }

    #[test]
    fn test_flat_rule_has_no_discount() {
        let rule = PricingRule::Flat { rate: dec!(600) };
        assert_eq!(rule.discount_factor(1_000_000), Decimal::ONE);
        assert_eq!(rule.base_amount(3), dec!(1800));
    }

    #[test]
    fn test_json_roundtrip_of_standard_contracts() {
        let json = ContractRegistry::standard().to_json().unwrap();
        let loaded = ContractRegistry::from_json(&json).unwrap();
        assert_eq!(loaded.contracts(), ContractRegistry::standard().contracts());
    }

    #[test]
    fn test_shipped_contract_file_matches_standard() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/contracts.json");
        let loaded = ContractRegistry::from_file(path).unwrap();
        assert_eq!(loaded.contracts(), ContractRegistry::standard().contracts());
    }

    #[test]
    fn test_json_contract_shape() {
        let json = r#"[
            { "name": "Acme Ltd", "rule": { "kind": "flat", "rate": "12.5" } },
            { "name": "Globex", "rule": {
                "kind": "discounted",
                "base": { "kind": "tiered", "tiers": [
                    { "up_to": 100, "rate": "10" },
                    { "up_to": null, "rate": "8" }
                ]},
                "bands": [ { "min_failed": 50, "factor": "0.9" } ]
            }}
        ]"#;

        let registry = ContractRegistry::from_json(json).unwrap();
        assert_eq!(registry.lookup("Acme Ltd").unwrap().base_amount(2), dec!(25.0));

        let globex = registry.lookup("Globex").unwrap();
        assert_eq!(globex.base_amount(101), dec!(808));
        assert_eq!(globex.discount_factor(49), Decimal::ONE);
        assert_eq!(globex.discount_factor(50), dec!(0.9));
    }

    #[test]
    fn test_invalid_contracts_rejected() {
        let cases = [
            r#"[{ "name": " ", "rule": { "kind": "flat", "rate": "1" } }]"#,
            r#"[{ "name": "A", "rule": { "kind": "flat", "rate": "0" } }]"#,
            r#"[{ "name": "A", "rule": { "kind": "tiered", "tiers": [] } }]"#,
            r#"[{ "name": "A", "rule": { "kind": "tiered", "tiers": [
                { "up_to": 10, "rate": "2" } ] } }]"#,
            r#"[{ "name": "A", "rule": { "kind": "tiered", "tiers": [
                { "up_to": 10, "rate": "2" }, { "up_to": 10, "rate": "1" },
                { "up_to": null, "rate": "1" } ] } }]"#,
            r#"[{ "name": "A", "rule": { "kind": "discounted",
                "base": { "kind": "flat", "rate": "1" },
                "bands": [ { "min_failed": 1, "factor": "1.5" } ] } }]"#,
            r#"[{ "name": "A", "rule": { "kind": "discounted",
                "base": { "kind": "flat", "rate": "1" },
                "bands": [ { "min_failed": 1, "max_failed": 10, "factor": "0.9" },
                           { "min_failed": 10, "factor": "0.8" } ] } }]"#,
            r#"[{ "name": "A", "rule": { "kind": "flat", "rate": "1" } },
                { "name": "A ", "rule": { "kind": "flat", "rate": "2" } }]"#,
        ];

        for json in cases {
            let err = ContractRegistry::from_json(json).unwrap_err();
            assert!(err.is_config_error(), "expected config error for {}", json);
        }
    }

    #[test]
    fn test_describe() {
        let registry = ContractRegistry::standard();
        assert_eq!(registry.lookup("QuantumLeap Inc").unwrap().describe(), "flat 600");
        assert!(registry
            .lookup("Zenith Corp")
            .unwrap()
            .describe()
            .contains("failed >=6001: x0.95"));
    }
}
