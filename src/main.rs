use anyhow::{Context, Result};
use billing_engine::{
    export_report, insert_api_calls, insert_commerces, load_calls_csv, load_commerces_csv,
    parse_months, round_money, setup_database, count_rows, BillingConfig, BillingRun,
    ReportFormat, SqliteSource,
};
use clap::{Parser, Subcommand, ValueEnum};
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "billing-engine", version, about = "Monthly API usage billing for partner commerces")]
struct Cli {
    /// JSON config file (missing keys use defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database with the apicall and commerce tables
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compute invoices for the selected months and export the summary
    Run {
        /// Comma separated months, e.g. "7,8" (default: configured fallback pair)
        #[arg(long)]
        months: Option<String>,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        tax_rate: Option<Decimal>,
        #[arg(long)]
        output_dir: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
        format: OutputFormat,
    },
    /// List the contract table
    Contracts {
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Create the apicall and commerce tables
    InitDb,
    /// Load apicall and commerce CSV exports into the database
    Import {
        #[arg(long)]
        calls: PathBuf,
        #[arg(long)]
        commerces: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Csv,
    Json,
}

impl From<OutputFormat> for ReportFormat {
    fn from(value: OutputFormat) -> Self {
        match value {
            OutputFormat::Csv => ReportFormat::Csv,
            OutputFormat::Json => ReportFormat::Json,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("billing_engine=info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => BillingConfig::from_file(path)?,
        None => BillingConfig::default(),
    };
    if let Some(db) = cli.db {
        config.database_path = db;
    }

    match cli.command {
        Commands::Run {
            months,
            year,
            tax_rate,
            output_dir,
            format,
        } => {
            if let Some(months) = months {
                config.months = parse_months(&months)?;
            }
            if let Some(year) = year {
                config.target_year = year;
            }
            if let Some(rate) = tax_rate {
                config.tax_rate = rate;
            }
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            run_billing(&config, format.into())
        }
        Commands::Contracts { json } => list_contracts(&config, json),
        Commands::InitDb => init_db(&config),
        Commands::Import { calls, commerces } => run_import(&config, &calls, &commerces),
    }
}

fn run_billing(config: &BillingConfig, format: ReportFormat) -> Result<()> {
    // Config errors surface before the database is touched
    let period = config.period()?;
    let engine = config.pricing_engine()?;

    let source = SqliteSource::open(&config.database_path)
        .with_context(|| format!("Failed to open database {:?}", config.database_path))?;

    let batch = BillingRun::new(&engine, period).execute(source)?;

    println!("\nBilling summary - {} {}", batch.period_label, batch.period.year);
    println!("{}", "━".repeat(96));
    println!(
        "{:<28} {:<14} {:>14} {:>12} {:>14} {:>6} {:>6}",
        "Name", "Tax ID", "Pretax", "Tax", "Total", "OK", "Fail"
    );
    for inv in &batch.invoices {
        let marker = if inv.is_priced() { "" } else { "  (no contract)" };
        println!(
            "{:<28} {:<14} {:>14.2} {:>12.2} {:>14.2} {:>6} {:>6}{}",
            inv.name.trim(),
            inv.tax_id,
            round_money(inv.pretax_amount),
            round_money(inv.tax_amount),
            round_money(inv.total_amount),
            inv.successful_count,
            inv.failed_count,
            marker
        );
    }
    let totals = batch.totals();
    println!("{}", "━".repeat(96));
    println!(
        "{:<43} {:>14.2} {:>12.2} {:>14.2}",
        format!("{} invoices ({} unpriced)", totals.invoices, totals.unpriced),
        round_money(totals.pretax),
        round_money(totals.tax),
        round_money(totals.total)
    );

    let today = chrono::Local::now().date_naive();
    let path = export_report(&batch, &config.output_dir, today, format)?;
    info!(path = %path.display(), "billing summary exported");
    println!("\n✓ Exported to {}", path.display());

    Ok(())
}

fn list_contracts(config: &BillingConfig, json: bool) -> Result<()> {
    let registry = config.contracts()?;

    if json {
        println!("{}", registry.to_json()?);
        return Ok(());
    }

    for contract in registry.contracts() {
        println!("{:<28} {}", contract.name, contract.rule.describe());
    }
    Ok(())
}

fn init_db(config: &BillingConfig) -> Result<()> {
    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {:?}", parent))?;
    }
    let conn = Connection::open(&config.database_path)?;
    setup_database(&conn)?;
    println!("✓ Database ready at {}", config.database_path.display());
    Ok(())
}

fn run_import(config: &BillingConfig, calls_csv: &Path, commerces_csv: &Path) -> Result<()> {
    let commerces = load_commerces_csv(commerces_csv)?;
    let calls = load_calls_csv(calls_csv)?;

    let mut conn = Connection::open(&config.database_path)
        .with_context(|| format!("Failed to open database {:?}", config.database_path))?;
    setup_database(&conn)?;

    let inserted_commerces = insert_commerces(&mut conn, &commerces)?;
    let inserted_calls = insert_api_calls(&mut conn, &calls)?;

    info!(
        commerces = inserted_commerces,
        calls = inserted_calls,
        "import complete"
    );
    println!(
        "✓ Imported {} commerces and {} calls ({} calls in database)",
        inserted_commerces,
        inserted_calls,
        count_rows(&conn, "apicall")?
    );
    Ok(())
}
