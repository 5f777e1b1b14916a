// Munich Card Map - Web Server
// JSON API over the map session: venues, coverage, votes, reports

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use card_map::{
    AggregateStats, Category, Config, LoadError, LoadState, MapSession, ReportKind, StatusFilter,
    Venue, VoteError,
};

/// Shared application state. The session is the only writer of venue data;
/// the mutex is held for reads and applies, never across network calls.
#[derive(Clone)]
struct AppState {
    session: Arc<Mutex<MapSession>>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

fn failure(status: StatusCode, message: impl Into<String>) -> Response {
    let body = ApiResponse {
        success: false,
        data: (),
        error: Some(message.into()),
    };
    (status, Json(body)).into_response()
}

/// Venue as the map draws it
#[derive(Serialize)]
struct VenueResponse {
    id: String,
    name: Option<String>,
    lat: f64,
    lon: f64,
    category: Category,
    color: &'static str,
    text: &'static str,
    cash_votes: u32,
    card_votes: u32,
    giro_votes: u32,
}

impl From<&Venue> for VenueResponse {
    fn from(venue: &Venue) -> Self {
        let status = venue.status();
        Self {
            id: venue.id.clone(),
            name: venue.name.clone(),
            lat: venue.location.lat,
            lon: venue.location.lon,
            category: status.category,
            color: status.color,
            text: status.text,
            cash_votes: venue.tally.cash_votes,
            card_votes: venue.tally.card_votes,
            giro_votes: venue.tally.giro_votes,
        }
    }
}

#[derive(Deserialize)]
struct VenueQuery {
    filter: Option<String>,
}

#[derive(Deserialize)]
struct VoteBody {
    category: String,
}

#[derive(Deserialize)]
struct ReportBody {
    kind: String,
}

#[derive(Serialize)]
struct StateResponse {
    load: LoadState,
    retries: u32,
    stats: AggregateStats,
}

fn vote_error(err: VoteError) -> Response {
    let status = match &err {
        VoteError::UnknownVenue(_) => StatusCode::NOT_FOUND,
        VoteError::NotVotable(_) => StatusCode::BAD_REQUEST,
        VoteError::AlreadyVoted(_) | VoteError::AlreadyReported(_) => StatusCode::CONFLICT,
        VoteError::Store(_) => StatusCode::BAD_GATEWAY,
    };
    failure(status, err.to_string())
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/venues?filter=all|card|giro|cash
async fn get_venues(State(state): State<AppState>, Query(query): Query<VenueQuery>) -> Response {
    let filter: StatusFilter = match query.filter.as_deref().unwrap_or("all").parse() {
        Ok(filter) => filter,
        Err(e) => return failure(StatusCode::BAD_REQUEST, e),
    };

    let session = state.session.lock().await;
    let venues: Vec<VenueResponse> = session
        .venues(filter)
        .into_iter()
        .map(VenueResponse::from)
        .collect();

    (StatusCode::OK, Json(ApiResponse::ok(venues))).into_response()
}

/// GET /api/stats - Coverage
async fn get_stats(State(state): State<AppState>) -> Response {
    let session = state.session.lock().await;
    (StatusCode::OK, Json(ApiResponse::ok(session.stats()))).into_response()
}

/// GET /api/state - Load state and retry counter
async fn get_state(State(state): State<AppState>) -> Response {
    let session = state.session.lock().await;
    let response = StateResponse {
        load: session.load_state().clone(),
        retries: session.retry_state().retries(),
        stats: session.stats(),
    };
    (StatusCode::OK, Json(ApiResponse::ok(response))).into_response()
}

/// POST /api/reload - Manual retry after a failed load
async fn reload(State(state): State<AppState>) -> Response {
    match run_load(&state.session, true).await {
        Ok(stats) => (StatusCode::OK, Json(ApiResponse::ok(stats))).into_response(),
        Err(e) => failure(StatusCode::SERVICE_UNAVAILABLE, e.user_message()),
    }
}

/// POST /api/venues/:kind/:id/vote - body {"category": "card"}
async fn cast_vote(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
    Json(body): Json<VoteBody>,
) -> Response {
    let venue_id = format!("{}/{}", kind, id);
    let category: Category = match body.category.parse() {
        Ok(category) => category,
        Err(e) => return failure(StatusCode::BAD_REQUEST, e),
    };

    let pending = match state.session.lock().await.prepare_vote(&venue_id, category) {
        Ok(pending) => pending,
        Err(e) => {
            warn!(venue_id = %venue_id, "vote rejected: {}", e);
            return vote_error(e);
        }
    };

    // The store write runs unlocked; only the apply needs the session
    let record = match pending.persist().await {
        Ok(record) => record,
        Err(e) => return vote_error(e),
    };

    let mut session = state.session.lock().await;
    match session.apply_vote(record) {
        Ok(outcome) => (StatusCode::OK, Json(ApiResponse::ok(outcome))).into_response(),
        Err(e) => vote_error(e),
    }
}

/// POST /api/venues/:kind/:id/report - body {"kind": "closed"}
async fn file_report(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
    Json(body): Json<ReportBody>,
) -> Response {
    let venue_id = format!("{}/{}", kind, id);
    let report_kind: ReportKind = match body.kind.parse() {
        Ok(kind) => kind,
        Err(e) => return failure(StatusCode::BAD_REQUEST, e),
    };

    let pending = match state.session.lock().await.prepare_report(&venue_id, report_kind) {
        Ok(pending) => pending,
        Err(e) => return vote_error(e),
    };

    match pending.submit().await {
        Ok(report) => (StatusCode::CREATED, Json(ApiResponse::ok(report))).into_response(),
        Err(e) => vote_error(e),
    }
}

fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/venues", get(get_venues))
        .route("/stats", get(get_stats))
        .route("/state", get(get_state))
        .route("/reload", post(reload))
        .route("/venues/:kind/:id/vote", post(cast_vote))
        .route("/venues/:kind/:id/report", post(file_report))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Loading
// ============================================================================

/// Load with the session locked only to start and to apply; the network
/// phase runs unlocked so every handler keeps answering.
async fn run_load(session: &Mutex<MapSession>, manual: bool) -> Result<AggregateStats, LoadError> {
    let job = {
        let mut session = session.lock().await;
        if manual {
            session.begin_reload()
        } else {
            session.begin_load()
        }
    };

    let acquired = job.run().await;

    let mut session = session.lock().await;
    session.finish_load(acquired)
}

fn spawn_initial_load(session: Arc<Mutex<MapSession>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = run_load(&session, false).await {
            warn!("initial load failed, waiting for manual reload: {}", e);
        }
    })
}

// ============================================================================
// Main Server
// ============================================================================

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl+C, shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    println!("🌐 Munich Card Map - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = Config::load()?;
    let session = Arc::new(Mutex::new(config.session()?));

    // First load in the background; the API answers (with an empty map) meanwhile
    spawn_initial_load(session.clone());

    let app = router(AppState { session });

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    println!("\n🚀 Server running on http://localhost:{}", config.port);
    println!("   API: http://localhost:{}/api/venues", config.port);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    println!("Server shutting down...");
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
