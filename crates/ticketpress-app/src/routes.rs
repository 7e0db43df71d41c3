// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HTTP API: the webhook endpoint plus the operator surface over orders, the
// print queue, printer settings and health.
//
// Handlers are thin.  Every decision lives in the reconciler, the scheduler
// or the store; this layer only parses requests and shapes JSON.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

use ticketpress_core::error::TicketpressError;
use ticketpress_core::types::{DocumentKind, JobId, JobStatus, Order, OrderId, PrintJob, Settings};
use ticketpress_ingest::PushOutcome;
use ticketpress_security::{SIGNATURE_HEADER, WebhookEntry};

use crate::error::ApiResult;
use crate::state::AppState;

const DEFAULT_JOB_LIMIT: u32 = 100;
const MAX_PAGE_SIZE: u32 = 100;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/webhooks/woocommerce", post(woocommerce_webhook))
        .route("/api/webhooks/log", get(webhook_log))
        .route("/api/print-jobs", get(list_print_jobs))
        .route("/api/print-jobs/{id}", axum::routing::delete(delete_print_job))
        .route("/api/print-jobs/{id}/retry", post(retry_print_job))
        .route("/api/orders", get(list_orders))
        .route("/api/orders/{id}", get(get_order))
        .route("/api/orders/{id}/reprint", post(reprint_order))
        .route("/api/settings", get(get_settings).put(put_settings))
        .route("/api/settings/test-print", post(test_print))
        .route("/api/settings/test-connection", get(printer_health))
        .route("/api/health", get(health))
        .route("/api/health/printer", get(printer_health))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Webhooks
// ---------------------------------------------------------------------------

/// Always 200: the body says whether the delivery was used.
async fn woocommerce_webhook(
    State(st): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<PushOutcome> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    Json(st.reconciler.handle_push(&body, signature))
}

#[derive(Debug, Deserialize)]
struct LimitQuery {
    limit: Option<u32>,
}

async fn webhook_log(
    State(st): State<AppState>,
    Query(q): Query<LimitQuery>,
) -> ApiResult<Json<Vec<WebhookEntry>>> {
    let limit = q.limit.unwrap_or(50).clamp(1, 500);
    Ok(Json(st.webhook_log.recent(limit)?))
}

// ---------------------------------------------------------------------------
// Print jobs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct JobsQuery {
    status: Option<String>,
    limit: Option<u32>,
}

async fn list_print_jobs(
    State(st): State<AppState>,
    Query(q): Query<JobsQuery>,
) -> ApiResult<Json<Value>> {
    let status = match q.status.as_deref().filter(|s| !s.is_empty()) {
        Some(s) => Some(s.parse::<JobStatus>()?),
        None => None,
    };
    let limit = q.limit.unwrap_or(DEFAULT_JOB_LIMIT).clamp(1, 500);

    let jobs = st.scheduler.list_jobs(status, limit)?;
    let queue_status = st.scheduler.status()?;
    Ok(Json(json!({ "jobs": jobs, "queueStatus": queue_status })))
}

async fn retry_print_job(
    State(st): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let job = st.scheduler.retry(&id.parse::<JobId>()?)?;
    Ok(Json(json!({ "success": true, "job": job })))
}

async fn delete_print_job(
    State(st): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    st.scheduler.remove(&id.parse::<JobId>()?)?;
    Ok(Json(json!({ "success": true })))
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// An order together with its print jobs.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderView {
    #[serde(flatten)]
    order: Order,
    print_jobs: Vec<PrintJob>,
}

fn order_view(st: &AppState, order: Order) -> ApiResult<OrderView> {
    let print_jobs = st.store().jobs_for_order(&order.id)?;
    Ok(OrderView { order, print_jobs })
}

#[derive(Debug, Deserialize)]
struct OrdersQuery {
    page: Option<u32>,
    limit: Option<u32>,
    search: Option<String>,
}

async fn list_orders(
    State(st): State<AppState>,
    Query(q): Query<OrdersQuery>,
) -> ApiResult<Json<Value>> {
    let page = q.page.unwrap_or(1).max(1);
    let limit = q.limit.unwrap_or(20).clamp(1, MAX_PAGE_SIZE);
    let offset = (page - 1).saturating_mul(limit);

    let (orders, total) = st.store().list_orders(q.search.as_deref(), limit, offset)?;
    let orders = orders
        .into_iter()
        .map(|order| order_view(&st, order))
        .collect::<ApiResult<Vec<_>>>()?;

    Ok(Json(json!({
        "orders": orders,
        "pagination": {
            "page": page,
            "limit": limit,
            "total": total,
            "totalPages": total.div_ceil(u64::from(limit)),
        }
    })))
}

async fn get_order(
    State(st): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<OrderView>> {
    let id = id.parse::<OrderId>()?;
    let order = st
        .store()
        .get_order(&id)?
        .ok_or_else(|| TicketpressError::order_not_found(id))?;
    Ok(Json(order_view(&st, order)?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReprintRequest {
    job_type: Option<String>,
}

/// `receipt` (the default), `kitchen`, or `both`.
fn reprint_kinds(job_type: Option<&str>) -> Result<Vec<DocumentKind>, TicketpressError> {
    match job_type {
        None | Some("") => Ok(vec![DocumentKind::Receipt]),
        Some("both") => Ok(DocumentKind::ALL.to_vec()),
        Some(kind) => Ok(vec![kind.parse()?]),
    }
}

async fn reprint_order(
    State(st): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let request: ReprintRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ReprintRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| TicketpressError::Validation(format!("reprint request: {e}")))?
    };
    let kinds = reprint_kinds(request.job_type.as_deref())?;

    let jobs = st.scheduler.reprint(&id.parse::<OrderId>()?, &kinds)?;
    Ok(Json(json!({ "success": true, "jobs": jobs })))
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

async fn get_settings(State(st): State<AppState>) -> ApiResult<Json<Settings>> {
    Ok(Json(st.store().load_settings()?))
}

fn validate_settings(settings: &Settings) -> Result<(), TicketpressError> {
    if settings.printer_ip.trim().is_empty() {
        return Err(TicketpressError::Validation("printer address is required".into()));
    }
    if settings.printer_port == 0 {
        return Err(TicketpressError::Validation("printer port must be non-zero".into()));
    }
    for (name, width) in [
        ("receipt", settings.receipt_width),
        ("kitchen", settings.kitchen_width),
    ] {
        if !(16..=80).contains(&width) {
            return Err(TicketpressError::Validation(format!(
                "{name} width {width} is outside 16..=80"
            )));
        }
    }
    Ok(())
}

async fn put_settings(
    State(st): State<AppState>,
    Json(settings): Json<Settings>,
) -> ApiResult<Json<Settings>> {
    validate_settings(&settings)?;
    st.store().save_settings(&settings)?;
    Ok(Json(settings))
}

async fn test_print(State(st): State<AppState>) -> ApiResult<Json<Value>> {
    st.scheduler.print_test_page().await?;
    info!("test page printed");
    Ok(Json(json!({ "success": true })))
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

async fn printer_health(State(st): State<AppState>) -> ApiResult<Json<Value>> {
    let connected = st.scheduler.probe_printer().await?;
    Ok(Json(json!({ "connected": connected })))
}

/// 200 while the store answers; the printer is reported but does not make
/// the service unhealthy.
async fn health(State(st): State<AppState>) -> impl IntoResponse {
    let database = match st.store().order_count() {
        Ok(_) => true,
        Err(e) => {
            warn!(error = %e, "health check: database unavailable");
            false
        }
    };
    let printer = st.scheduler.probe_printer().await.unwrap_or(false);

    let (status, label) = if database {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };
    (
        status,
        Json(json!({
            "status": label,
            "checks": { "database": database, "printer": printer },
        })),
    )
}
