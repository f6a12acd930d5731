use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, patch},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use tracing::info;

use crate::api::health::{HealthReport, HealthState};
use crate::api::latency::{LatencyReport, LatencyStats};
use crate::api::owner::Owner;
use crate::error::AppError;
use crate::repository::{BetQuery, BetRepository};
use crate::stats::{
    aggregate, available_periods, bet_profit, compute_stats, Aggregation, Granularity, Selection,
};
use crate::types::{BetFilters, BetStats, BetView, NewBet, StatusUpdate};

#[derive(Clone)]
pub struct ApiState {
    pub repo: Arc<dyn BetRepository>,
    pub health: Arc<HealthState>,
    pub latency: Arc<LatencyStats>,
}

impl ApiState {
    pub fn new(repo: Arc<dyn BetRepository>) -> Self {
        Self {
            repo,
            health: Arc::new(HealthState::new()),
            latency: Arc::new(LatencyStats::new()),
        }
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/bets", get(list_bets).post(create_bet))
        .route("/api/bets/stats", get(get_stats))
        .route("/api/bets/stats/previous", get(get_previous_stats))
        .route("/api/bets/months", get(get_months))
        .route("/api/bets/years", get(get_years))
        .route("/api/bets/:id", delete(delete_bet))
        .route("/api/bets/:id/status", patch(update_status))
        .route("/health", get(get_health))
        .route("/stats/latency", get(get_stats_latency))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

// ---------------------------------------------------------------------------
// Bet handlers
// ---------------------------------------------------------------------------

async fn list_bets(
    State(state): State<ApiState>,
    Owner(owner_id): Owner,
    Query(filters): Query<BetFilters>,
) -> Result<Json<Vec<BetView>>, AppError> {
    let query = BetQuery::from_filters(&filters)?;
    let bets = state.repo.list_bets(&owner_id, &query).await?;

    let views = bets
        .into_iter()
        .map(|bet| BetView {
            profit: bet_profit(&bet).ok(),
            bet,
        })
        .collect();
    Ok(Json(views))
}

async fn create_bet(
    State(state): State<ApiState>,
    Owner(owner_id): Owner,
    Json(body): Json<NewBet>,
) -> Result<Json<BetView>, AppError> {
    let bet = body.into_bet(&owner_id, Utc::now())?;
    let bet = state.repo.create_bet(bet).await?;
    state.health.inc_bets_created();
    info!(owner_id = %owner_id, bet_id = %bet.id, stake = %bet.stake, bet_type = %bet.bet_type, "Bet created");

    Ok(Json(BetView {
        profit: bet_profit(&bet).ok(),
        bet,
    }))
}

async fn update_status(
    State(state): State<ApiState>,
    Owner(owner_id): Owner,
    Path(bet_id): Path<String>,
    Json(body): Json<StatusUpdate>,
) -> Result<Json<BetView>, AppError> {
    let change = body.parse()?;
    let bet = state
        .repo
        .update_status(&bet_id, &owner_id, &change, Utc::now())
        .await?;
    info!(owner_id = %owner_id, bet_id = %bet.id, status = %bet.status, "Bet status updated");

    Ok(Json(BetView {
        profit: bet_profit(&bet).ok(),
        bet,
    }))
}

async fn delete_bet(
    State(state): State<ApiState>,
    Owner(owner_id): Owner,
    Path(bet_id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    state.repo.delete_bet(&bet_id, &owner_id).await?;
    info!(owner_id = %owner_id, bet_id = %bet_id, "Bet deleted");
    Ok(Json(MessageResponse {
        message: "Bet deleted successfully".to_string(),
    }))
}

// ---------------------------------------------------------------------------
// Stats handlers
// ---------------------------------------------------------------------------

/// Run one aggregation, recording its latency and skipped records.
fn timed(state: &ApiState, run: impl FnOnce() -> Result<Aggregation, AppError>) -> Result<BetStats, AppError> {
    let started = Instant::now();
    let aggregation = run()?;
    state.latency.record(started.elapsed());
    state.health.record_stats(aggregation.skipped.len());
    Ok(aggregation.stats)
}

// Both stats endpoints aggregate over a fresh, unfiltered snapshot of the owner's bets.

async fn get_stats(
    State(state): State<ApiState>,
    Owner(owner_id): Owner,
    Query(filters): Query<BetFilters>,
) -> Result<Json<BetStats>, AppError> {
    let bets = state.repo.list_bets(&owner_id, &BetQuery::default()).await?;
    let stats = timed(&state, || compute_stats(&owner_id, &bets, &filters, Utc::now()))?;
    Ok(Json(stats))
}

async fn get_previous_stats(
    State(state): State<ApiState>,
    Owner(owner_id): Owner,
    Query(filters): Query<BetFilters>,
) -> Result<Json<BetStats>, AppError> {
    let selection = Selection::previous(&filters, Utc::now())?;
    let bets = state.repo.list_bets(&owner_id, &BetQuery::default()).await?;
    let stats = timed(&state, || Ok(aggregate(&owner_id, &bets, &selection)))?;
    Ok(Json(stats))
}

async fn get_months(
    State(state): State<ApiState>,
    Owner(owner_id): Owner,
) -> Result<Json<Vec<String>>, AppError> {
    let bets = state.repo.list_bets(&owner_id, &BetQuery::default()).await?;
    Ok(Json(available_periods(&owner_id, &bets, Granularity::Month)))
}

async fn get_years(
    State(state): State<ApiState>,
    Owner(owner_id): Owner,
) -> Result<Json<Vec<String>>, AppError> {
    let bets = state.repo.list_bets(&owner_id, &BetQuery::default()).await?;
    Ok(Json(available_periods(&owner_id, &bets, Granularity::Year)))
}

// ---------------------------------------------------------------------------
// Service handlers
// ---------------------------------------------------------------------------

async fn get_health(State(state): State<ApiState>) -> Json<HealthReport> {
    Json(state.health.report(state.repo.backend()))
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<LatencyReport> {
    Json(state.latency.report())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
