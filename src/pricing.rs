// 💰 Pricing Engine - call counts → amounts
//
// One evaluation per group:
//   base            = contract rule on successful calls
//   discounted_base = base × discount factor (from failed calls)
//   total           = discounted_base × (1 + tax_rate)
//   tax             = total - discounted_base
//
// No rounding happens here. Unknown companies price to zero and are
// reported as unpriced (contract = None).

use crate::aggregation::CallCountGroup;
use crate::contracts::{ContractRegistry, PricingRule};
use crate::error::{BillingError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    /// Contract that priced the group; `None` when the name is unknown
    pub contract: Option<String>,
    /// Amount before discount and tax (the commission figure)
    pub base: Decimal,
    pub discount_factor: Decimal,
    /// Amount after discount, before tax
    pub discounted_base: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

impl PriceBreakdown {
    fn unpriced() -> Self {
        PriceBreakdown {
            contract: None,
            base: Decimal::ZERO,
            discount_factor: Decimal::ONE,
            discounted_base: Decimal::ZERO,
            tax: Decimal::ZERO,
            total: Decimal::ZERO,
        }
    }

    pub fn is_priced(&self) -> bool {
        self.contract.is_some()
    }

    pub fn discount(&self) -> Decimal {
        self.base - self.discounted_base
    }
}

pub struct PricingEngine {
    registry: ContractRegistry,
    tax_rate: Decimal,
}

impl PricingEngine {
    pub fn new(registry: ContractRegistry, tax_rate: Decimal) -> Result<Self> {
        if tax_rate < Decimal::ZERO {
            return Err(BillingError::config(format!(
                "tax rate {} must not be negative",
                tax_rate
            )));
        }
        Ok(PricingEngine { registry, tax_rate })
    }

    pub fn tax_rate(&self) -> Decimal {
        self.tax_rate
    }

    pub fn registry(&self) -> &ContractRegistry {
        &self.registry
    }

    pub fn rule_for(&self, name: &str) -> Option<&PricingRule> {
        self.registry.lookup(name)
    }

    /// Price one group: base, discount and tax in a single pass
    pub fn evaluate(&self, group: &CallCountGroup) -> PriceBreakdown {
        let Some(rule) = self.registry.lookup(&group.name) else {
            warn!(
                commerce_id = %group.commerce_id,
                name = %group.name,
                "no contract for commerce, billing zero"
            );
            return PriceBreakdown::unpriced();
        };

        let base = rule.base_amount(group.successful_count);
        let discount_factor = rule.discount_factor(group.failed_count);
        let discounted_base = base * discount_factor;
        let total = discounted_base * (Decimal::ONE + self.tax_rate);

        debug!(
            commerce_id = %group.commerce_id,
            successful = group.successful_count,
            failed = group.failed_count,
            %base,
            %discount_factor,
            %total,
            "priced commerce"
        );

        PriceBreakdown {
            contract: Some(group.name.trim().to_string()),
            base,
            discount_factor,
            discounted_base,
            tax: total - discounted_base,
            total,
        }
    }

    /// Single amount under the two billing flags:
    /// no flags → commission figure, both flags → final payable total.
    pub fn price(&self, group: &CallCountGroup, apply_discount: bool, apply_tax: bool) -> Decimal {
        let breakdown = self.evaluate(group);
        let amount = if apply_discount {
            breakdown.discounted_base
        } else {
            breakdown.base
        };

        if apply_tax {
            amount * (Decimal::ONE + self.tax_rate)
        } else {
            amount
        }
    }
}
