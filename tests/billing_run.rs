// End-to-end billing over an in-memory SQLite record source

use billing_engine::{
    insert_api_calls, insert_commerces, setup_database, write_csv, BillingConfig, BillingPeriod,
    BillingRun, CallRecord, CommerceRecord, ContractRegistry, MemorySource, PricingEngine,
    SqliteSource,
};
use rusqlite::Connection;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn calls(id: &str, month: u32, successful: usize, failed: usize) -> Vec<CallRecord> {
    let mut out = Vec::with_capacity(successful + failed);
    for i in 0..successful {
        let ts = format!("2024-{:02}-{:02} {:02}:00:00", month, i % 28 + 1, i % 24);
        out.push(CallRecord::new(id, &ts, "Successful"));
    }
    for i in 0..failed {
        let status = if i % 2 == 0 { "Unsuccessful" } else { "Timeout" };
        let ts = format!("2024-{:02}-{:02}T08:15:00", month, i % 28 + 1);
        out.push(CallRecord::new(id, &ts, status));
    }
    out
}

fn fixture() -> MemorySource {
    let mut all = Vec::new();
    all.extend(calls("001", 7, 100, 10)); // Innovexa
    all.extend(calls("002", 7, 6000, 0)); // NexaTech, split over two months
    all.extend(calls("002", 8, 4001, 0));
    all.extend(calls("003", 8, 20, 3)); // QuantumLeap (inactive)
    all.extend(calls("004", 8, 1000, 6001)); // Zenith with discount
    all.extend(calls("005", 7, 200, 2500)); // FusionWave 5% band
    all.extend(calls("006", 7, 50, 0)); // no contract
    all.extend(calls("001", 9, 999, 999)); // outside period
    all.extend(calls("999", 7, 5, 5)); // unknown commerce id

    MemorySource {
        calls: all,
        commerces: vec![
            CommerceRecord::new("001", "Innovexa Solutions", "Active", "900100-1", "billing@innovexa.co"),
            CommerceRecord::new("002", " NexaTech Industries ", "Active", "900200-2", "ap@nexatech.co"),
            CommerceRecord::new("003", "QuantumLeap Inc", "Inactive", "900300-3", "fin@quantumleap.co"),
            CommerceRecord::new("004", "Zenith Corp", "Active", "900400-4", "pay@zenith.co"),
            CommerceRecord::new("005", "FusionWave Enterprises", "Active", "900500-5", "ar@fusionwave.co"),
            CommerceRecord::new("006", "Nova Labs", "Active", "900600-6", "hello@novalabs.co"),
        ],
    }
}

fn engine() -> PricingEngine {
    BillingConfig::default().pricing_engine().unwrap()
}

fn july_august() -> BillingPeriod {
    BillingConfig::default().period().unwrap()
}

#[test]
fn test_full_run_amounts() {
    let engine = engine();
    let batch = BillingRun::new(&engine, july_august()).execute(fixture()).unwrap();

    let ids: Vec<&str> = batch.invoices.iter().map(|i| i.commerce_id.as_str()).collect();
    assert_eq!(ids, vec!["001", "002", "004", "005", "006"]);

    let by_id = |id: &str| batch.invoices.iter().find(|i| i.commerce_id == id).unwrap();

    let innovexa = by_id("001");
    assert_eq!(innovexa.pretax_amount, dec!(30000));
    assert_eq!(innovexa.tax_amount, dec!(5700));
    assert_eq!(innovexa.total_amount, dec!(35700));

    // 10001 successful calls: second tier, 200 each
    let nexa = by_id("002");
    assert_eq!(nexa.successful_count, 10001);
    assert_eq!(nexa.pretax_amount, dec!(2000200));

    let zenith = by_id("004");
    assert_eq!(zenith.commission_amount, dec!(250000));
    assert_eq!(zenith.pretax_amount, dec!(237500));
    assert_eq!(zenith.total_amount, dec!(282625));

    let fusion = by_id("005");
    assert_eq!(fusion.pretax_amount, dec!(57000));

    let nova = by_id("006");
    assert!(!nova.is_priced());
    assert_eq!(nova.pretax_amount, Decimal::ZERO);
    assert_eq!(nova.total_amount, Decimal::ZERO);

    for inv in &batch.invoices {
        assert_eq!(inv.tax_amount, inv.total_amount - inv.pretax_amount);
        assert_eq!(inv.total_amount, inv.pretax_amount * dec!(1.19));
    }
}

#[test]
fn test_sqlite_source_matches_memory_source() {
    let source = fixture();
    let mut conn = Connection::open_in_memory().unwrap();
    setup_database(&conn).unwrap();
    insert_commerces(&mut conn, &source.commerces).unwrap();
    insert_api_calls(&mut conn, &source.calls).unwrap();

    let engine = engine();
    let run = BillingRun::new(&engine, july_august());
    let from_db = run.execute(SqliteSource::from_connection(conn)).unwrap();
    let from_memory = run.execute(source).unwrap();

    assert_eq!(from_db, from_memory);
    assert_eq!(from_db.digest(), from_memory.digest());
}

#[test]
fn test_two_runs_produce_identical_output() {
    let engine = engine();
    let run = BillingRun::new(&engine, july_august());

    let mut first = Vec::new();
    let mut second = Vec::new();
    write_csv(&run.execute(fixture()).unwrap(), &mut first).unwrap();
    write_csv(&run.execute(fixture()).unwrap(), &mut second).unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_single_month_period() {
    let engine = engine();
    let period = BillingPeriod::new(2024, &[8], [7, 8]).unwrap();
    let batch = BillingRun::new(&engine, period).execute(fixture()).unwrap();

    assert_eq!(batch.period_label, "August");
    let nexa = batch.invoices.iter().find(|i| i.commerce_id == "002").unwrap();
    assert_eq!(nexa.successful_count, 4001);
    assert_eq!(nexa.pretax_amount, dec!(1000250));
}

#[test]
fn test_other_tax_rate() {
    let engine = PricingEngine::new(ContractRegistry::standard(), dec!(0.16)).unwrap();
    let batch = BillingRun::new(&engine, july_august()).execute(fixture()).unwrap();
    let innovexa = &batch.invoices[0];
    assert_eq!(innovexa.total_amount, dec!(34800));
    assert_eq!(innovexa.tax_amount, dec!(4800));
}
