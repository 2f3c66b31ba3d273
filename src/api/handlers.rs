use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::models::*;
use crate::{
    distribution::DistributionSplitter,
    error::AppResult,
    ledger::{models::Payout, store::LedgerStore},
    payout::{PayoutBatcher, PayoutRunSummary, SettlementService},
    reconciliation::ReconciliationHandler,
};

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<dyn LedgerStore>,
    pub splitter: Arc<DistributionSplitter>,
    pub batcher: Arc<PayoutBatcher>,
    pub settlement: Arc<SettlementService>,
    pub reconciliation: Arc<ReconciliationHandler>,
}

/// GET /health
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Payment success events trigger the split. A failed split surfaces to
/// the caller so the capture side can alert; everything else acks.
/// POST /api/v1/webhook/payment
pub async fn payment_webhook(
    State(state): State<AppState>,
    Json(event): Json<PaymentEvent>,
) -> AppResult<Json<DistributionResponse>> {
    if event.status != "succeeded" {
        info!(
            "Ignoring payment event for tip {} with status {}",
            event.tip_id, event.status
        );
        return Ok(Json(DistributionResponse {
            outcome: "ignored",
            recipients: None,
        }));
    }

    let outcome = state.splitter.distribute(event.tip_id).await?;
    Ok(Json(outcome.into()))
}

/// Asynchronous processor truth: failed or reversed transfers unwind their
/// payout. Unrecognized event kinds are acked and ignored.
/// POST /api/v1/webhook/transfer
pub async fn transfer_webhook(
    State(state): State<AppState>,
    Json(event): Json<TransferEvent>,
) -> AppResult<Json<WebhookAck>> {
    let transfer_id = &event.data.object.id;
    if transfer_id.is_empty() {
        return Err(crate::error::AppError::BadRequest(
            "transfer id missing in event".to_string(),
        ));
    }

    let handled = match event.kind.as_str() {
        "transfer.failed" => {
            state.reconciliation.on_transfer_failed(transfer_id).await?;
            true
        }
        "transfer.reversed" => {
            state
                .reconciliation
                .on_transfer_reversed(transfer_id)
                .await?;
            true
        }
        _ => {
            info!("Ignoring processor event {} ({})", event.id, event.kind);
            false
        }
    };

    Ok(Json(WebhookAck {
        status: "received".to_string(),
        handled,
    }))
}

/// POST /api/v1/admin/payouts/run
pub async fn run_payouts(State(state): State<AppState>) -> Json<PayoutRunSummary> {
    info!("Operator-triggered payout run");
    Json(state.batcher.process_payouts().await)
}

/// POST /api/v1/admin/payouts/:payout_id/retry
pub async fn retry_payout(
    State(state): State<AppState>,
    Path(payout_id): Path<Uuid>,
) -> AppResult<Json<Payout>> {
    let payout = state.settlement.retry(payout_id).await?;
    Ok(Json(payout))
}

/// GET /api/v1/admin/payouts
pub async fn list_payouts(
    State(state): State<AppState>,
    Query(query): Query<PayoutListQuery>,
) -> AppResult<Json<Vec<Payout>>> {
    let per_page = query.per_page.unwrap_or(50).min(200) as i64;
    let page = query.page.unwrap_or(1).max(1) as i64;
    let offset = (page - 1) * per_page;

    let payouts = state
        .ledger
        .list_payouts(query.status, per_page, offset)
        .await?;
    Ok(Json(payouts))
}
