// Billing Engine - Web Server
// REST API with Axum: contract table and on-demand billing runs

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use billing_engine::{
    parse_months, round_money, BillingConfig, BillingError, BillingResult, BillingRun,
    InvoiceBatch, PricingEngine, SqliteSource,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Shared application state. No connection is shared: every run opens its own.
struct AppState {
    config: BillingConfig,
    engine: PricingEngine,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(status: StatusCode, message: String) -> Response {
        (
            status,
            Json(ApiResponse::<T> {
                success: false,
                data: None,
                error: Some(message),
            }),
        )
            .into_response()
    }
}

#[derive(Serialize)]
struct ContractResponse {
    name: String,
    description: String,
    rule: billing_engine::PricingRule,
}

/// Invoice row (amounts rounded for presentation)
#[derive(Serialize)]
struct InvoiceResponse {
    commerce_id: String,
    period: String,
    name: String,
    tax_id: String,
    pretax_amount: String,
    tax_amount: String,
    total_amount: String,
    successful_calls: u64,
    failed_calls: u64,
    email: String,
    priced: bool,
}

impl From<BillingResult> for InvoiceResponse {
    fn from(inv: BillingResult) -> Self {
        Self {
            priced: inv.is_priced(),
            commerce_id: inv.commerce_id,
            period: inv.period_label,
            name: inv.name.trim().to_string(),
            tax_id: inv.tax_id,
            pretax_amount: format!("{:.2}", round_money(inv.pretax_amount)),
            tax_amount: format!("{:.2}", round_money(inv.tax_amount)),
            total_amount: format!("{:.2}", round_money(inv.total_amount)),
            successful_calls: inv.successful_count,
            failed_calls: inv.failed_count,
            email: inv.email,
        }
    }
}

#[derive(Serialize)]
struct BatchResponse {
    period: String,
    year: i32,
    digest: String,
    total_amount: String,
    invoices: Vec<InvoiceResponse>,
}

impl From<InvoiceBatch> for BatchResponse {
    fn from(batch: InvoiceBatch) -> Self {
        let digest = batch.digest();
        let total = batch.totals().total;
        Self {
            period: batch.period_label,
            year: batch.period.year,
            digest,
            total_amount: format!("{:.2}", round_money(total)),
            invoices: batch.invoices.into_iter().map(InvoiceResponse::from).collect(),
        }
    }
}

#[derive(Deserialize)]
struct InvoiceQuery {
    /// Comma separated months, e.g. "7,8"
    months: Option<String>,
    year: Option<i32>,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/contracts - Contract table
async fn get_contracts(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let contracts: Vec<ContractResponse> = state
        .engine
        .registry()
        .contracts()
        .into_iter()
        .map(|c| ContractResponse {
            description: c.rule.describe(),
            name: c.name,
            rule: c.rule,
        })
        .collect();

    Json(ApiResponse::ok(contracts))
}

/// GET /api/invoices?months=7,8&year=2024 - Run billing for a period
async fn get_invoices(
    State(state): State<Arc<AppState>>,
    Query(query): Query<InvoiceQuery>,
) -> Response {
    let result = tokio::task::spawn_blocking(move || run_billing(&state, query)).await;

    match result {
        Ok(Ok(batch)) => (StatusCode::OK, Json(ApiResponse::ok(BatchResponse::from(batch)))).into_response(),
        Ok(Err(e)) if e.is_config_error() => {
            ApiResponse::<BatchResponse>::err(StatusCode::BAD_REQUEST, e.to_string())
        }
        Ok(Err(e)) => {
            error!(error = %e, "billing run failed");
            ApiResponse::<BatchResponse>::err(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        Err(e) => {
            error!(error = %e, "billing task panicked");
            ApiResponse::<BatchResponse>::err(
                StatusCode::INTERNAL_SERVER_ERROR,
                "billing task failed".to_string(),
            )
        }
    }
}

fn run_billing(state: &AppState, query: InvoiceQuery) -> Result<InvoiceBatch, BillingError> {
    let mut config = state.config.clone();
    if let Some(months) = query.months.as_deref() {
        config.months = parse_months(months)?;
    }
    if let Some(year) = query.year {
        config.target_year = year;
    }
    let period = config.period()?;

    let source = SqliteSource::open(&config.database_path)?;
    BillingRun::new(&state.engine, period).execute(source)
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("billing_engine=info,billing_server=info")),
        )
        .init();

    let config = match std::env::var("BILLING_CONFIG") {
        Ok(path) => BillingConfig::from_file(path)?,
        Err(_) => BillingConfig::default(),
    };

    if !config.database_path.exists() {
        anyhow::bail!(
            "Database not found at {:?} (run `billing-engine import` first)",
            config.database_path
        );
    }

    let engine = config.pricing_engine()?;
    info!(
        database = %config.database_path.display(),
        contracts = engine.registry().len(),
        "billing server starting"
    );

    let state = Arc::new(AppState { config, engine });

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/contracts", get(get_contracts))
        .route("/invoices", get(get_invoices))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive());

    let addr = std::env::var("BILLING_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "listening");

    axum::serve(listener, app).await?;
    Ok(())
}
