use axum::{
    Router,
    extract::{Json, Path, State, rejection::JsonRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::core::{
    Asset, ContributionLimits, GoalSolveConfig, GoalSolveResult, PortfolioSummary,
    ProjectionEngine, ProjectionError, RegionalConfig, RegionalRuleTable, ScenarioBundle,
    ScenarioMultipliers, SimulationSettings, WhatIfChanges, WhatIfComparison,
    solve_required_contribution,
};

/// Upper bound on trials a single request may ask for.
const MAX_REQUEST_ITERATIONS: u32 = 20_000;

#[derive(Clone)]
pub struct AppState {
    rules: Arc<RegionalRuleTable>,
}

impl AppState {
    pub fn new(rules: RegionalRuleTable) -> Self {
        Self {
            rules: Arc::new(rules),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EngineOptions {
    region: String,
    iterations: Option<u32>,
    seed: Option<u64>,
    start_year: Option<i32>,
    multipliers: Option<ScenarioMultipliers>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryPayload {
    region: String,
    #[serde(default)]
    assets: Vec<Asset>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectionPayload {
    #[serde(flatten)]
    options: EngineOptions,
    #[serde(default)]
    assets: Vec<Asset>,
    #[serde(default)]
    monthly_contribution: f64,
    years: u32,
    goal: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WhatIfPayload {
    #[serde(flatten)]
    options: EngineOptions,
    #[serde(default)]
    assets: Vec<Asset>,
    current_age: u32,
    #[serde(default)]
    changes: WhatIfChanges,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SolvePayload {
    #[serde(flatten)]
    options: EngineOptions,
    #[serde(default)]
    assets: Vec<Asset>,
    years: u32,
    goal: f64,
    #[serde(default)]
    solver: GoalSolveConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RegionResponse<'a> {
    config: &'a RegionalConfig,
    contribution_limits: ContributionLimits,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/regions/:code", get(region_handler))
        .route("/api/portfolio/summary", post(summary_handler))
        .route("/api/projections", post(projection_handler))
        .route("/api/what-if", post(what_if_handler))
        .route("/api/solve", post(solve_handler))
        .fallback(not_found_handler)
        .with_state(state)
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router(AppState::new(RegionalRuleTable::standard()));

    let listener = TcpListener::bind(addr).await?;
    info!("projection API listening on http://{addr}");

    axum::serve(listener, app).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn region_handler(State(state): State<AppState>, Path(code): Path<String>) -> Response {
    let result = state.rules.get_config(&code).and_then(|config| {
        let contribution_limits = state.rules.get_contribution_limits(&code)?;
        Ok(RegionResponse {
            config,
            contribution_limits,
        })
    });
    respond(result)
}

async fn summary_handler(
    State(state): State<AppState>,
    payload: Result<Json<SummaryPayload>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(payload)) => respond(summarize(&state.rules, payload)),
        Err(rejection) => rejected(rejection),
    }
}

async fn projection_handler(
    State(state): State<AppState>,
    payload: Result<Json<ProjectionPayload>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(payload)) => respond(project(&state.rules, payload)),
        Err(rejection) => rejected(rejection),
    }
}

async fn what_if_handler(
    State(state): State<AppState>,
    payload: Result<Json<WhatIfPayload>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(payload)) => respond(what_if(&state.rules, payload)),
        Err(rejection) => rejected(rejection),
    }
}

async fn solve_handler(
    State(state): State<AppState>,
    payload: Result<Json<SolvePayload>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(payload)) => respond(solve(&state.rules, payload)),
        Err(rejection) => rejected(rejection),
    }
}

fn build_engine(
    rules: &RegionalRuleTable,
    options: &EngineOptions,
) -> Result<ProjectionEngine, ProjectionError> {
    let mut settings = SimulationSettings::default();
    if let Some(iterations) = options.iterations {
        if iterations > MAX_REQUEST_ITERATIONS {
            return Err(ProjectionError::InvalidInput(format!(
                "iterations must be <= {MAX_REQUEST_ITERATIONS}"
            )));
        }
        settings.iterations = iterations;
    }
    if let Some(seed) = options.seed {
        settings.seed = seed;
    }

    let mut engine =
        ProjectionEngine::new(rules, &options.region)?.with_simulation_settings(settings);
    if let Some(year) = options.start_year {
        engine = engine.with_start_year(year);
    }
    if let Some(multipliers) = options.multipliers {
        engine = engine.with_multipliers(multipliers);
    }
    Ok(engine)
}

fn summarize(
    rules: &RegionalRuleTable,
    payload: SummaryPayload,
) -> Result<PortfolioSummary, ProjectionError> {
    let engine = ProjectionEngine::new(rules, &payload.region)?;
    engine.summarize(&payload.assets)
}

fn project(
    rules: &RegionalRuleTable,
    payload: ProjectionPayload,
) -> Result<ScenarioBundle, ProjectionError> {
    let engine = build_engine(rules, &payload.options)?;
    engine.project_scenarios(
        &payload.assets,
        payload.monthly_contribution,
        payload.years,
        payload.goal,
    )
}

fn what_if(
    rules: &RegionalRuleTable,
    payload: WhatIfPayload,
) -> Result<WhatIfComparison, ProjectionError> {
    let engine = build_engine(rules, &payload.options)?;
    engine.compare_what_if(&payload.assets, &payload.changes, payload.current_age)
}

fn solve(
    rules: &RegionalRuleTable,
    payload: SolvePayload,
) -> Result<GoalSolveResult, ProjectionError> {
    let engine = build_engine(rules, &payload.options)?;
    if payload.solver.iterations_per_step > MAX_REQUEST_ITERATIONS
        || payload.solver.final_iterations > MAX_REQUEST_ITERATIONS
    {
        return Err(ProjectionError::InvalidInput(format!(
            "solver iterations must be <= {MAX_REQUEST_ITERATIONS}"
        )));
    }
    solve_required_contribution(
        &engine,
        &payload.assets,
        payload.years,
        payload.goal,
        payload.solver,
    )
}

fn status_for(err: &ProjectionError) -> StatusCode {
    match err {
        ProjectionError::ConfigNotFound(_) => StatusCode::NOT_FOUND,
        ProjectionError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        ProjectionError::Cancelled { .. } => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn respond<T: Serialize>(result: Result<T, ProjectionError>) -> Response {
    match result {
        Ok(body) => json_response(StatusCode::OK, body),
        Err(err) => {
            warn!("request rejected: {err}");
            error_response(status_for(&err), &err.to_string())
        }
    }
}

fn rejected(rejection: JsonRejection) -> Response {
    warn!("malformed request body: {rejection}");
    error_response(StatusCode::BAD_REQUEST, &rejection.body_text())
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}
