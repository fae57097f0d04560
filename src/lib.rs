// Billing Engine - Core Library
// Turns API call records into per-commerce invoices; shared by the CLI, the API server, and tests

pub mod error;
pub mod config;
pub mod db;
pub mod period;
pub mod eligibility;
pub mod aggregation;
pub mod contracts;      // Pricing rules as data
pub mod pricing;
pub mod invoice;
pub mod pipeline;
pub mod export;

// Re-export commonly used types
pub use error::{BillingError, Result};
pub use config::BillingConfig;
pub use db::{
    CallRecord, CommerceRecord,
    setup_database, load_api_calls, load_commerces,
    insert_api_calls, insert_commerces,
    load_calls_csv, load_commerces_csv, count_rows,
};
pub use period::{BillingPeriod, month_name, parse_months};
pub use eligibility::{EligibleCall, active_commerces, eligible_calls, parse_timestamp};
pub use aggregation::{AggregatedCommerce, CallCountGroup, aggregate};
pub use contracts::{Contract, ContractRegistry, DiscountBand, PricingRule, RateTier};
pub use pricing::{PriceBreakdown, PricingEngine};
pub use invoice::{BatchTotals, BillingResult, InvoiceBatch, INVOICE_COLUMNS, assemble};
pub use pipeline::{BillingRun, MemorySource, RecordSource, SqliteSource};
pub use export::{ReportFormat, export_report, report_file_name, round_money, write_csv, write_json};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
