// 📊 Aggregator - eligible calls → per-commerce success/failure counts
//
// Inner join on commerce_id: calls for missing or inactive commerces are
// dropped, commerces without eligible calls produce no group (no activity,
// no bill). Groups come out in ascending commerce_id order.

use crate::db::CommerceRecord;
use crate::eligibility::EligibleCall;
use crate::error::{BillingError, Result};
use chrono::NaiveDateTime;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Call counts for one commerce over the billing period
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallCountGroup {
    pub commerce_id: String,
    pub name: String,
    pub successful_count: u64,
    pub failed_count: u64,
}

impl CallCountGroup {
    pub fn new(commerce_id: &str, name: &str, successful_count: u64, failed_count: u64) -> Self {
        CallCountGroup {
            commerce_id: commerce_id.to_string(),
            name: name.to_string(),
            successful_count,
            failed_count,
        }
    }

    pub fn total_calls(&self) -> u64 {
        self.successful_count + self.failed_count
    }
}

/// A group plus the data the invoice assembler needs from the join
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedCommerce {
    pub group: CallCountGroup,
    pub commerce: CommerceRecord,
    /// Most recent eligible call for this commerce
    pub last_call: NaiveDateTime,
}

/// Join eligible calls with active commerces and count per commerce.
///
/// Duplicate commerce_id values among `commerces` are rejected: joining
/// against them would count every call twice.
pub fn aggregate(
    calls: Vec<EligibleCall>,
    commerces: Vec<CommerceRecord>,
) -> Result<Vec<AggregatedCommerce>> {
    let mut by_id: HashMap<String, CommerceRecord> = HashMap::with_capacity(commerces.len());
    for commerce in commerces {
        if by_id.contains_key(&commerce.commerce_id) {
            return Err(BillingError::data(format!(
                "duplicate commerce_id {} in commerce table",
                commerce.commerce_id
            )));
        }
        by_id.insert(commerce.commerce_id.clone(), commerce);
    }

    let mut groups: BTreeMap<String, AggregatedCommerce> = BTreeMap::new();
    let mut unmatched = 0usize;

    for call in calls {
        let Some(commerce) = by_id.get(&call.commerce_id) else {
            unmatched += 1;
            continue;
        };

        let entry = groups
            .entry(call.commerce_id.clone())
            .or_insert_with(|| AggregatedCommerce {
                group: CallCountGroup::new(&commerce.commerce_id, &commerce.name, 0, 0),
                commerce: commerce.clone(),
                last_call: call.timestamp,
            });

        if call.successful {
            entry.group.successful_count += 1;
        } else {
            entry.group.failed_count += 1;
        }

        if call.timestamp > entry.last_call {
            entry.last_call = call.timestamp;
        }
    }

    debug!(
        groups = groups.len(),
        unmatched_calls = unmatched,
        "aggregated calls per commerce"
    );

    Ok(groups.into_values().collect())
}
