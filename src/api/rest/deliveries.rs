use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::transitions::{required_identity, Page};
use crate::error::AppError;
use crate::models::delivery::{Delivery, NewDelivery};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/deliveries", post(submit_delivery))
        .route("/deliveries/in-progress", get(list_in_progress))
        .route("/deliveries/:id", get(get_delivery))
        .route("/deliveries/:id/cancel", post(cancel_delivery))
        .route("/deliveries/:id/accept", post(accept_delivery))
}

#[derive(Deserialize)]
pub struct CancelRequest {
    pub requester: Option<String>,
}

#[derive(Deserialize)]
pub struct AcceptRequest {
    pub handler: Option<String>,
}

async fn submit_delivery(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewDelivery>,
) -> Result<(StatusCode, Json<Delivery>), AppError> {
    let delivery = state.deliveries.submit(payload).await?;
    Ok((StatusCode::CREATED, Json(delivery)))
}

async fn cancel_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CancelRequest>,
) -> Result<Json<Delivery>, AppError> {
    let requester = required_identity(payload.requester.as_deref(), "requester")?;
    let delivery = state.deliveries.cancel(id, &requester).await?;
    Ok(Json(delivery))
}

/// Responds `true` for the caller that won the delivery and `false` for
/// everyone who raced and lost.
async fn accept_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AcceptRequest>,
) -> Result<Json<bool>, AppError> {
    let handler = required_identity(payload.handler.as_deref(), "handler")?;
    let outcome = state.deliveries.accept(id, &handler).await?;
    Ok(Json(outcome.won()))
}

async fn get_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Delivery>, AppError> {
    Ok(Json(state.deliveries.get(id).await?))
}

async fn list_in_progress(
    State(state): State<Arc<AppState>>,
    Query(page): Query<Page>,
) -> Result<Json<Vec<Delivery>>, AppError> {
    Ok(Json(state.deliveries.list_in_progress(page).await?))
}
