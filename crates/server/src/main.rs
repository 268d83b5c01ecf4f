//! Analysis HTTP endpoint.
//!
//! Exposes the rule-filtering + classification half of the pipeline so
//! clients can run it server-side:
//!
//!     POST /analyze  {"species": [...], "latitude": .., "longitude": ..}
//!       -> 200 + PatrimonialMap JSON
//!     GET  /health
//!
//! The reference table is parsed once at startup; a missing column is fatal
//! before the listener binds.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use clap::Parser;
use patriflora_classify::{classify, ClassifyError, InferenceClient, InferenceConfig};
use patriflora_geo::{AdminNames, AdminResolver, GeoApiConfig};
use patriflora_model::PatrimonialMap;
use patriflora_rules::{relevant_rules, RuleIndex};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "patriflora-server")]
#[command(about = "Patrimonial-status analysis endpoint")]
struct Cli {
    /// Listen address
    #[arg(long, default_value = "127.0.0.1:8787")]
    listen: String,

    /// Path to the regulatory reference table (semicolon-delimited)
    #[arg(long, default_value = "BDCstatut.csv")]
    rule_table: String,

    /// Geographic API base URL
    #[arg(long, default_value = "https://geo.api.gouv.fr")]
    geo_url: String,

    /// Inference API key (falls back to GEMINI_API_KEY)
    #[arg(long)]
    api_key: Option<String>,
}

struct AppInner {
    index: RuleIndex,
    names: AdminNames,
    resolver: AdminResolver,
    inference: InferenceClient,
}

#[derive(Clone)]
struct AppState(Arc<AppInner>);

#[derive(Debug, Deserialize)]
struct AnalyzeRequest {
    species: Vec<String>,
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    indexed_taxa: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("patriflora=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let raw_table = std::fs::read_to_string(&cli.rule_table)
        .with_context(|| format!("cannot read reference table {}", cli.rule_table))?;
    let index = RuleIndex::parse(&raw_table).context("reference table is malformed")?;
    tracing::info!(taxa = index.taxon_count(), "Reference table indexed");

    let names = AdminNames::new();
    for issue in names.validate() {
        tracing::warn!(issue = %issue, "Administrative name table collision");
    }

    let api_key = cli
        .api_key
        .or_else(|| std::env::var("GEMINI_API_KEY").ok())
        .context("no inference API key (use --api-key or GEMINI_API_KEY)")?;

    let state = AppState(Arc::new(AppInner {
        index,
        names,
        resolver: AdminResolver::new(GeoApiConfig {
            base_url: cli.geo_url,
            ..Default::default()
        }),
        inference: InferenceClient::new(InferenceConfig {
            api_key,
            ..Default::default()
        }),
    }));

    let app = Router::new()
        .route("/analyze", post(analyze))
        .route("/health", get(health))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&cli.listen)
        .await
        .with_context(|| format!("cannot bind {}", cli.listen))?;
    tracing::info!(listen = %cli.listen, "Analysis endpoint ready");
    axum::serve(listener, app).await?;

    Ok(())
}

/// POST /analyze
async fn analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<PatrimonialMap>, (StatusCode, Json<ErrorBody>)> {
    let AppInner {
        index,
        names,
        resolver,
        inference,
    } = &*state.0;

    let mut species = request.species;
    species.sort();
    species.dedup();

    let context = resolver
        .resolve(request.latitude, request.longitude)
        .await
        .map_err(|err| {
            tracing::error!(error = %err, "Administrative lookup failed");
            error_response(StatusCode::BAD_GATEWAY, err.to_string())
        })?;

    let relevant = relevant_rules(&species, index, &context, names);

    let statuses = classify(&species, &relevant, &context, inference)
        .await
        .map_err(|err| {
            tracing::error!(error = %err, "Classification failed");
            match err {
                // never echo malformed model output to the caller
                ClassifyError::InferenceFormat(_) | ClassifyError::EmptyResponse => error_response(
                    StatusCode::BAD_GATEWAY,
                    "analysis service returned a malformed reply".to_string(),
                ),
                other => error_response(StatusCode::BAD_GATEWAY, other.to_string()),
            }
        })?;

    Ok(Json(statuses))
}

/// GET /health
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        indexed_taxa: state.0.index.taxon_count(),
    })
}

fn error_response(status: StatusCode, message: String) -> (StatusCode, Json<ErrorBody>) {
    (status, Json(ErrorBody { error: message }))
}
