//! HTTP Controller (Driver Adapter)
//!
//! Axum-based JSON surface over the command service and order watcher. This
//! is the single funnel for dashboards, webhook bridges and operators; none
//! of them reach the broker client directly, and exits are only ever queued
//! toward the watcher.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};

use crate::application::ports::{BrokerPort, TraceSinkPort};
use crate::application::services::{
    CommandError, CommandService, ExitRequest, OrderWatcherService, SubmitOutcome,
};
use crate::domain::intent::{IntentError, OrderRepository};
use crate::domain::shared::{ClientId, CommandId, Symbol};

use super::request::{FlattenRequest, SubmitIntentRequest};
use super::response::{
    ErrorResponse, FlattenResponse, HealthResponse, OrderDetailResponse, OrderView,
    SubmitIntentResponse, TraceView,
};

/// Application state shared across handlers.
pub struct AppState<O, B, T>
where
    O: OrderRepository,
    B: BrokerPort,
    T: TraceSinkPort,
{
    /// Command gate for ENTRY/ADJUST intents.
    pub commands: Arc<CommandService<O, B, T>>,
    /// Watcher serving exit requests and record lookups.
    pub watcher: Arc<OrderWatcherService<O, B, T>>,
    /// Application version.
    pub version: String,
}

impl<O, B, T> Clone for AppState<O, B, T>
where
    O: OrderRepository,
    B: BrokerPort,
    T: TraceSinkPort,
{
    fn clone(&self) -> Self {
        Self {
            commands: Arc::clone(&self.commands),
            watcher: Arc::clone(&self.watcher),
            version: self.version.clone(),
        }
    }
}

/// Create the HTTP router with all endpoints.
pub fn create_router<O, B, T>(state: AppState<O, B, T>) -> Router
where
    O: OrderRepository + 'static,
    B: BrokerPort + 'static,
    T: TraceSinkPort + 'static,
{
    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/intents", post(submit_intent))
        .route("/api/v1/exits", post(request_exit))
        .route("/api/v1/orders/{command_id}", get(get_order))
        .with_state(state)
}

/// Health check endpoint.
async fn health_check<O, B, T>(State(state): State<AppState<O, B, T>>) -> impl IntoResponse
where
    O: OrderRepository,
    B: BrokerPort,
    T: TraceSinkPort,
{
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
    })
}

/// Submit an ENTRY or ADJUST intent.
async fn submit_intent<O, B, T>(
    State(state): State<AppState<O, B, T>>,
    Json(request): Json<SubmitIntentRequest>,
) -> Response
where
    O: OrderRepository,
    B: BrokerPort,
    T: TraceSinkPort,
{
    let intent = match request.into_intent() {
        Ok(intent) => intent,
        Err(error) => {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ErrorResponse {
                    error: error.to_string(),
                }),
            )
                .into_response();
        }
    };
    let command_id = intent.command_id().as_str().to_string();

    match state.commands.submit(intent).await {
        Ok(outcome) => {
            let body = match outcome {
                SubmitOutcome::Accepted(record) => SubmitIntentResponse {
                    command_id,
                    outcome: "ACCEPTED".to_string(),
                    order: Some(OrderView::from_record(&record)),
                    layer: None,
                    reason: None,
                    breaches: None,
                },
                SubmitOutcome::Duplicate { layer, reason } => SubmitIntentResponse {
                    command_id,
                    outcome: "DUPLICATE".to_string(),
                    order: None,
                    layer: Some(layer.to_string()),
                    reason: Some(reason),
                    breaches: None,
                },
                SubmitOutcome::RiskVetoed { breaches } => SubmitIntentResponse {
                    command_id,
                    outcome: "RISK_VETOED".to_string(),
                    order: None,
                    layer: None,
                    reason: None,
                    breaches: Some(breaches.iter().map(ToString::to_string).collect()),
                },
                SubmitOutcome::Failed(record) => SubmitIntentResponse {
                    command_id,
                    outcome: "FAILED".to_string(),
                    order: Some(OrderView::from_record(&record)),
                    layer: None,
                    reason: None,
                    breaches: None,
                },
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(error) => {
            let status = match &error {
                CommandError::ExitNotAccepted => StatusCode::UNPROCESSABLE_ENTITY,
                CommandError::Intent(IntentError::DuplicateCommandId { .. }) => {
                    StatusCode::CONFLICT
                }
                CommandError::Intent(_) | CommandError::Guard(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            };
            (
                status,
                Json(ErrorResponse {
                    error: error.to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// Queue a position flatten toward the watcher.
async fn request_exit<O, B, T>(
    State(state): State<AppState<O, B, T>>,
    Json(request): Json<FlattenRequest>,
) -> impl IntoResponse
where
    O: OrderRepository,
    B: BrokerPort,
    T: TraceSinkPort,
{
    state.watcher.request_exit(ExitRequest {
        client_id: ClientId::new(request.client_id),
        exchange: request.exchange,
        symbol: Symbol::new(request.symbol),
        product: request.product,
        reason: request.reason,
    });
    (StatusCode::ACCEPTED, Json(FlattenResponse { queued: true }))
}

/// Fetch one record and its audit trail.
async fn get_order<O, B, T>(
    State(state): State<AppState<O, B, T>>,
    Path(command_id): Path<String>,
) -> Response
where
    O: OrderRepository,
    B: BrokerPort,
    T: TraceSinkPort,
{
    let command_id = CommandId::new(command_id);
    match state.commands.lookup(&command_id).await {
        Ok(Some(record)) => {
            let trail = state.commands.trail(&command_id).await;
            (
                StatusCode::OK,
                Json(OrderDetailResponse {
                    order: OrderView::from_record(&record),
                    trail: trail.iter().map(TraceView::from_event).collect(),
                }),
            )
                .into_response()
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("no record for command {command_id}"),
            }),
        )
            .into_response(),
        Err(error) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: error.to_string(),
            }),
        )
            .into_response(),
    }
}
