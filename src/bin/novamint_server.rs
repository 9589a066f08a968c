//! novamint-server: HTTP shell around the ledger service.
//!
//! POST /api/save-contract, POST /api/record-transaction, GET /api/get-transactions

use anyhow::Context;
use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use clap::Parser;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use novamint_core::{
    telemetry, Config, ContractRequest, LedgerService, ServiceError, TransactionRequest,
    ENGINE_VERSION,
};

#[derive(Parser)]
#[command(name = "novamint-server")]
#[command(about = "NovaMint backend HTTP server", version)]
struct Args {
    /// Path to a JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the data directory from the config
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Override the bind address, e.g. 127.0.0.1:5001
    #[arg(short, long)]
    bind: Option<std::net::SocketAddr>,
}

type AppState = Arc<LedgerService>;

fn error_response(e: ServiceError) -> Response {
    let status = if e.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    let message = match e {
        ServiceError::Validation(msg) => msg,
        other => other.to_string(),
    };
    (status, Json(json!({ "error": message }))).into_response()
}

/// Run a blocking service call off the async runtime, in a request span.
async fn run_blocking<T, F>(name: &'static str, f: F) -> Result<T, Response>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ServiceError> + Send + 'static,
{
    let span = info_span!("request", op = name, id = %Uuid::new_v4());
    let inner = span.clone();
    let joined = tokio::task::spawn_blocking(move || inner.in_scope(f))
        .instrument(span)
        .await;
    match joined {
        Ok(result) => result.map_err(error_response),
        Err(join_err) => {
            error!(op = name, error = %join_err, "service task failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "internal task failure" })),
            )
                .into_response())
        }
    }
}

async fn save_contract(
    State(service): State<AppState>,
    Json(request): Json<ContractRequest>,
) -> Response {
    match run_blocking("save-contract", move || service.save_contract(&request)).await {
        Ok(saved) => Json(json!({ "message": saved.message })).into_response(),
        Err(response) => response,
    }
}

async fn record_transaction(
    State(service): State<AppState>,
    Json(request): Json<TransactionRequest>,
) -> Response {
    match run_blocking("record-transaction", move || service.record_transaction(request)).await {
        Ok(saved) => Json(json!({ "message": saved.message })).into_response(),
        Err(response) => response,
    }
}

async fn get_transactions(State(service): State<AppState>) -> Response {
    match run_blocking("get-transactions", move || service.list_transactions()).await {
        Ok(entries) => Json(entries).into_response(),
        Err(response) => response,
    }
}

fn router(service: AppState) -> Router {
    Router::new()
        .route("/api/save-contract", post(save_contract))
        .route("/api/record-transaction", post(record_transaction))
        .route("/api/get-transactions", get(get_transactions))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(service)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing("info");
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    config.validate()?;

    let service = Arc::new(LedgerService::from_config(&config)?);
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("bind {}", config.bind_addr))?;

    info!(addr = %config.bind_addr, version = ENGINE_VERSION, "NovaMint backend listening");
    axum::serve(listener, router(service)).await?;
    Ok(())
}
