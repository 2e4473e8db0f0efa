mod browser;
mod cache;
mod config;
mod draft;
mod executor;
mod http;
mod jobs;
mod mapping;
mod metrics;
mod models;
mod photos;
mod pipeline;
mod pricing;
mod rates;
mod resolver;
mod retry;
mod security;
mod store;

use axum::{
    Json, Router,
    extract::{Extension, Path, State},
    http::{HeaderMap, StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use cache::ExpiringMap;
use clap::{Args, Parser, Subcommand};
use config::AppConfig;
use eyre::{WrapErr, eyre};
use jobs::JobQueue;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use models::{ApiError, Marketplace, RunRequest};
use pipeline::{Pipeline, PipelineError, PipelineErrorKind};
use rates::ExchangeRates;
use security::{AuthContext, AuthState, require_api_auth};
use serde::Serialize;
use serde_json::json;
use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};
use store::{AdvertisementStore, MemoryStore, SupabaseStore};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "hermes-publisher", version, about = "Publishes ready advertisements to Vinted and Grailed")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Publish one batch against the logged-in browser session.
    Run(RunArgs),
    /// Start the control API.
    Serve(ServeArgs),
}

#[derive(Debug, Args)]
struct SourceArgs {
    /// YAML settings file.
    #[arg(long, env = "PUBLISHER_CONFIG")]
    config: Option<PathBuf>,
    /// JSON advertisements to publish instead of the remote table.
    #[arg(long)]
    ads_file: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct RunArgs {
    #[arg(long, env = "PUBLISHER_MARKETPLACE", default_value = "vinted", value_parser = parse_marketplace)]
    marketplace: Marketplace,
    #[arg(long, env = "PUBLISHER_USER_ID")]
    user_id: Option<String>,
    #[command(flatten)]
    source: SourceArgs,
}

#[derive(Debug, Args)]
struct ServeArgs {
    #[arg(long, env = "PORT", default_value_t = 8000)]
    port: u16,
    #[command(flatten)]
    source: SourceArgs,
}

fn parse_marketplace(raw: &str) -> Result<Marketplace, String> {
    Marketplace::from_str(raw).ok_or_else(|| format!("unknown marketplace {raw:?}"))
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    match Cli::parse().command {
        Command::Run(args) => run_batch(args).await,
        Command::Serve(args) => serve(args).await,
    }
}

fn build_pipeline(source: &SourceArgs) -> eyre::Result<Pipeline> {
    let config = AppConfig::load(source.config.as_deref()).wrap_err("loading configuration")?;
    let store: Arc<dyn AdvertisementStore> = match &source.ads_file {
        Some(path) => Arc::new(MemoryStore::from_json_file(path)?),
        None => Arc::new(SupabaseStore::from_env().ok_or_else(|| {
            eyre!("SUPABASE_URL and SUPABASE_SERVICE_ROLE_KEY must be set, or pass --ads-file")
        })?),
    };
    let rates = ExchangeRates::new(&config.pricing, cache::client_from_env());
    Ok(Pipeline::new(config, store, rates))
}

async fn run_batch(args: RunArgs) -> eyre::Result<()> {
    let cancel = CancellationToken::new();
    let pipeline = build_pipeline(&args.source)?.with_cancel(cancel.clone());
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!(target = "hermes.pipeline", "interrupt received, stopping after current step");
            cancel.cancel();
        }
    });

    let request = RunRequest {
        marketplace: args.marketplace,
        user_id: args.user_id,
    };
    let summary = pipeline.run(request).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn serve(args: ServeArgs) -> eyre::Result<()> {
    let pipeline = build_pipeline(&args.source)?;
    let (queue, _worker) = JobQueue::spawn(pipeline);
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .wrap_err("installing prometheus recorder")?;
    let state = AppState {
        queue,
        idempotency: Arc::new(Mutex::new(ExpiringMap::new(idempotency_ttl()))),
        prometheus_handle,
        redis: cache::client_from_env(),
    };
    let app = router(state, AuthState::from_env());

    let addr: SocketAddr = ([0, 0, 0, 0], args.port).into();
    info!(target = "hermes.api", "listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

#[derive(Clone)]
struct AppState {
    queue: JobQueue,
    idempotency: Arc<Mutex<ExpiringMap<String, Uuid>>>,
    prometheus_handle: PrometheusHandle,
    redis: Option<redis::Client>,
}

fn router(state: AppState, auth_state: AuthState) -> Router {
    let cors = CorsLayer::new()
        .allow_headers(Any)
        .allow_methods(Any)
        .allow_origin(Any);

    let protected = Router::new()
        .route("/runs", post(enqueue_run))
        .route("/runs/{id}", get(get_run_status))
        .route_layer(middleware::from_fn_with_state(auth_state, require_api_auth));

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .merge(protected)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::extract::DefaultBodyLimit::max(body_limit_from_env()))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "hermes-publisher",
    }))
}

fn body_limit_from_env() -> usize {
    std::env::var("REQUEST_MAX_BYTES")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(64 * 1024)
}

async fn metrics_endpoint(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Ok(secret) = std::env::var("METRICS_KEY") {
        let presented = headers
            .get("X-Metrics-Key")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if presented != secret {
            return (StatusCode::UNAUTHORIZED, "unauthorized").into_response();
        }
    }
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.prometheus_handle.render(),
    )
        .into_response()
}

#[derive(Debug, Serialize)]
struct EnqueueResponse {
    job_id: String,
    /// True when an earlier request with the same `Idempotency-Key` already
    /// enqueued this run.
    replayed: bool,
}

/// Enqueue a batch run.
///
/// - Method: `POST`
/// - Path: `/runs`
/// - Auth: `Authorization: Bearer <key>` or `X-Hermes-Key: <key>`
/// - Body: `RunRequest`
/// - Response: `202` with the job id
async fn enqueue_run(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    headers: HeaderMap,
    Json(payload): Json<RunRequest>,
) -> Result<(StatusCode, Json<EnqueueResponse>), AppError> {
    crate::metrics::inc_requests("/runs");
    info!(
        target = "hermes.api",
        operator = %context.operator,
        api_key = %context.api_key_id,
        marketplace = %payload.marketplace,
        "run requested",
    );

    let id = Uuid::new_v4();
    if let Some(key) = headers
        .get("Idempotency-Key")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        && let Some(existing) = claim_idempotency_key(&state, &key, id).await
    {
        return Ok((
            StatusCode::ACCEPTED,
            Json(EnqueueResponse {
                job_id: existing,
                replayed: true,
            }),
        ));
    }

    state
        .queue
        .enqueue_run(id, payload, context)
        .await
        .map_err(|err| PipelineError::internal("enqueue", err.error))?;
    Ok((
        StatusCode::ACCEPTED,
        Json(EnqueueResponse {
            job_id: id.to_string(),
            replayed: false,
        }),
    ))
}

/// Returns the job id already bound to `key`, or binds `id` and returns None.
/// Redis is authoritative when reachable; otherwise the in-process map is.
async fn claim_idempotency_key(state: &AppState, key: &str, id: Uuid) -> Option<String> {
    if let Some(client) = &state.redis {
        let redis_key = format!("hermes:runs:idem:{key}");
        let ttl = idempotency_ttl().as_secs();
        match cache::redis_claim(client, &redis_key, &id.to_string(), ttl).await {
            Ok(existing) => return existing,
            Err(err) => {
                warn!(target = "hermes.api", error = %err, "idempotency_redis_unavailable");
            }
        }
    }
    let mut guard = state.idempotency.lock().await;
    if let Some(existing) = guard.get(&key.to_string()) {
        return Some(existing.to_string());
    }
    guard.insert(key.to_string(), id);
    None
}

fn idempotency_ttl() -> Duration {
    http::secs_from_env("IDEMPOTENCY_TTL_SECS", 3600)
}

async fn get_run_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<jobs::JobInfo>, AppError> {
    let Ok(uuid) = Uuid::parse_str(&id) else {
        return Err(PipelineError::invalid_input("runs", "invalid_job_id").into());
    };
    state
        .queue
        .get(uuid)
        .await
        .map(Json)
        .ok_or(AppError::NotFound("runs"))
}

#[derive(Debug)]
enum AppError {
    Pipeline(PipelineError),
    NotFound(&'static str),
}

impl From<PipelineError> for AppError {
    fn from(value: PipelineError) -> Self {
        Self::Pipeline(value)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Pipeline(err) => {
                let status = match err.kind() {
                    PipelineErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
                    PipelineErrorKind::Session => StatusCode::SERVICE_UNAVAILABLE,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                let payload = ApiError {
                    error: err.stage().to_string(),
                    detail: Some(err.detail().to_string()),
                };
                (status, Json(payload)).into_response()
            }
            AppError::NotFound(what) => {
                let payload = ApiError {
                    error: what.to_string(),
                    detail: Some("not_found".into()),
                };
                (StatusCode::NOT_FOUND, Json(payload)).into_response()
            }
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let _ = fmt().with_env_filter(filter).try_init();
}
