//! WashPoint Booking Lifecycle Service
//!
//! Owns the booking state machine and the payment-status workflow: state
//! queries and transitions, the finish flow with its pay-now-or-collect-later
//! choice, the unpaid dashboard feed, and the transition audit log.

use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use washpoint_booking_lifecycle::service::{
    BookingLifecycleService, FinishOutcome, PaymentDecision,
};
use washpoint_models::{
    resolve_payment_status, Booking, BookingAction, ChainVerification, NewBooking,
    StateTransition,
};
use washpoint_store::{
    create_postgres_pool, migrations, MemoryRecordStore, PgRecordStore, RecordStore,
};
use washpoint_utils::{init_logging, AppConfig, ErrorResponse, StoreBackend, WashpointError};

#[tokio::main]
async fn main() -> Result<()> {
    let (config, config_error) = match AppConfig::load() {
        Ok(config) => (config, None),
        Err(error) => (AppConfig::default(), Some(error)),
    };
    init_logging(&config.logging)?;
    if let Some(error) = config_error {
        warn!(error = %error, "Failed to load configuration; using defaults");
    }
    info!("Starting WashPoint Booking Lifecycle Service");

    let store: Arc<dyn RecordStore> = match config.store.backend {
        StoreBackend::Postgres => {
            let pool = create_postgres_pool(&config.store).await?;
            migrations::run_migrations(&pool).await?;
            Arc::new(PgRecordStore::new(pool))
        }
        StoreBackend::Memory => {
            info!("Using in-memory record store");
            Arc::new(MemoryRecordStore::new())
        }
    };
    let service = BookingLifecycleService::new(store);

    let app = Router::new()
        .route("/health", get(health_check))
        // Booking management
        .route("/api/v1/bookings", post(create_booking))
        .route("/api/v1/bookings", get(list_bookings))
        .route("/api/v1/bookings/unpaid", get(list_unpaid))
        .route("/api/v1/bookings/:id", get(get_booking))
        // Lifecycle
        .route("/api/v1/bookings/:id/state", get(get_state))
        .route("/api/v1/bookings/:id/actions", get(get_actions))
        .route("/api/v1/bookings/:id/transition", post(transition))
        .route("/api/v1/bookings/:id/finish", post(finish))
        // Payment
        .route("/api/v1/bookings/:id/payments", post(record_payment))
        // History
        .route("/api/v1/bookings/:id/history", get(get_history))
        .route("/api/v1/bookings/:id/history/verify", get(verify_history))
        .layer(TraceLayer::new_for_http())
        .with_state(service);

    let host: IpAddr = config.server.host.parse()?;
    let addr = SocketAddr::new(host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Booking Lifecycle Service listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "booking-lifecycle",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn reject(error: WashpointError) -> ApiError {
    let status = StatusCode::from_u16(error.http_status_code())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(error.into()))
}

// ===== Booking Endpoints =====

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub id: i64,
    pub customer_id: String,
    pub vehicle_id: String,
    pub notes: Option<String>,
    pub total_price: f64,
    pub state: String,
    /// Resolved from the note annotations; unpaid jobs keep this badge in
    /// every summary view, finished or not.
    pub payment_status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Booking> for BookingResponse {
    fn from(booking: Booking) -> Self {
        let payment_status = resolve_payment_status(booking.notes.as_deref(), booking.state);
        Self {
            id: booking.id,
            customer_id: booking.customer_id.to_string(),
            vehicle_id: booking.vehicle_id.to_string(),
            notes: booking.notes,
            total_price: booking.total_price,
            state: booking.state.to_string(),
            payment_status: payment_status.to_string(),
            created_at: booking.created_at.to_rfc3339(),
            updated_at: booking.updated_at.to_rfc3339(),
        }
    }
}

async fn create_booking(
    State(service): State<BookingLifecycleService>,
    Json(request): Json<NewBooking>,
) -> Result<Json<BookingResponse>, ApiError> {
    let booking = service.create_booking(request).await.map_err(reject)?;
    Ok(Json(booking.into()))
}

async fn list_bookings(
    State(service): State<BookingLifecycleService>,
) -> Result<Json<Vec<BookingResponse>>, ApiError> {
    let bookings = service.list_bookings().await.map_err(reject)?;
    Ok(Json(bookings.into_iter().map(|b| b.into()).collect()))
}

async fn list_unpaid(
    State(service): State<BookingLifecycleService>,
) -> Result<Json<Vec<BookingResponse>>, ApiError> {
    let bookings = service.list_unpaid().await.map_err(reject)?;
    Ok(Json(bookings.into_iter().map(|b| b.into()).collect()))
}

async fn get_booking(
    State(service): State<BookingLifecycleService>,
    Path(id): Path<i64>,
) -> Result<Json<BookingResponse>, ApiError> {
    let booking = service
        .get_booking(id)
        .await
        .map_err(reject)?
        .ok_or_else(|| reject(WashpointError::not_found(format!("booking {id}"))))?;
    Ok(Json(booking.into()))
}

// ===== Lifecycle Endpoints =====

#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub booking_id: i64,
    pub state: String,
}

async fn get_state(
    State(service): State<BookingLifecycleService>,
    Path(id): Path<i64>,
) -> Json<StateResponse> {
    // Never fails: unresolvable states come back as draft
    let state = service.current_state(id).await;
    Json(StateResponse {
        booking_id: id,
        state: state.to_string(),
    })
}

#[derive(Debug, Serialize)]
pub struct ActionsResponse {
    pub booking_id: i64,
    pub state: String,
    pub actions: Vec<String>,
}

async fn get_actions(
    State(service): State<BookingLifecycleService>,
    Path(id): Path<i64>,
) -> Json<ActionsResponse> {
    let state = service.current_state(id).await;
    let actions = service
        .valid_actions(state)
        .iter()
        .map(|a| a.to_string())
        .collect();
    Json(ActionsResponse {
        booking_id: id,
        state: state.to_string(),
        actions,
    })
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub action: String,
}

#[derive(Debug, Serialize)]
pub struct TransitionResponse {
    pub success: bool,
    pub previous_state: String,
    pub new_state: String,
    pub booking: BookingResponse,
}

async fn transition(
    State(service): State<BookingLifecycleService>,
    Path(id): Path<i64>,
    Json(request): Json<TransitionRequest>,
) -> Result<Json<TransitionResponse>, ApiError> {
    let action = BookingAction::parse(&request.action).ok_or_else(|| {
        reject(WashpointError::validation(
            "action",
            format!("Unknown action '{}'", request.action),
        ))
    })?;

    let outcome = service.transition(id, action).await.map_err(reject)?;
    Ok(Json(TransitionResponse {
        success: true,
        previous_state: outcome.previous.to_string(),
        new_state: outcome.new_state.to_string(),
        booking: outcome.booking.into(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct FinishRequest {
    /// "pay_now" or "collect_later"; omitted to ask whether payment is due.
    pub decision: Option<String>,
    pub method: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum FinishResponse {
    Finished {
        success: bool,
        new_state: String,
        payment_status: String,
        booking: BookingResponse,
    },
    PaymentRequired {
        success: bool,
        payment_required: bool,
        choices: Vec<String>,
    },
}

fn parse_decision(request: FinishRequest) -> Result<Option<PaymentDecision>, ApiError> {
    match request.decision.as_deref() {
        None => Ok(None),
        Some("pay_now") => {
            let method = request.method.ok_or_else(|| {
                reject(WashpointError::validation(
                    "method",
                    "A payment method is required to pay now",
                ))
            })?;
            Ok(Some(PaymentDecision::PayNow { method }))
        }
        Some("collect_later") => Ok(Some(PaymentDecision::CollectLater)),
        Some(other) => Err(reject(WashpointError::validation(
            "decision",
            format!("Unknown decision '{other}'"),
        ))),
    }
}

async fn finish(
    State(service): State<BookingLifecycleService>,
    Path(id): Path<i64>,
    Json(request): Json<FinishRequest>,
) -> Result<Json<FinishResponse>, ApiError> {
    let decision = parse_decision(request)?;

    match service.finish(id, decision).await.map_err(reject)? {
        FinishOutcome::Finished {
            booking,
            new_state,
            payment_status,
        } => Ok(Json(FinishResponse::Finished {
            success: true,
            new_state: new_state.to_string(),
            payment_status: payment_status.to_string(),
            booking: booking.into(),
        })),
        FinishOutcome::PaymentRequired => Ok(Json(FinishResponse::PaymentRequired {
            success: false,
            payment_required: true,
            choices: vec!["pay_now".to_string(), "collect_later".to_string()],
        })),
    }
}

// ===== Payment Endpoints =====

#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub method: String,
}

async fn record_payment(
    State(service): State<BookingLifecycleService>,
    Path(id): Path<i64>,
    Json(request): Json<PaymentRequest>,
) -> Result<Json<BookingResponse>, ApiError> {
    let booking = service
        .record_payment(id, &request.method)
        .await
        .map_err(reject)?;
    Ok(Json(booking.into()))
}

// ===== History Endpoints =====

async fn get_history(
    State(service): State<BookingLifecycleService>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<StateTransition>>, ApiError> {
    let history = service.history(id).await.map_err(reject)?;
    Ok(Json(history))
}

async fn verify_history(
    State(service): State<BookingLifecycleService>,
    Path(id): Path<i64>,
) -> Result<Json<ChainVerification>, ApiError> {
    let verification = service.verify_history(id).await.map_err(reject)?;
    Ok(Json(verification))
}
