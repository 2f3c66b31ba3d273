use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppResult;
use crate::ledger::models::PayoutStatus;
use crate::ledger::store::LedgerStore;

/// What a processor callback did to local state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconciliationOutcome {
    /// The payout was unwound: shares unlinked, status set to failed
    Unwound(Uuid),
    /// The payout had already been failed and unlinked
    AlreadyReconciled,
    /// No payout carries this transfer id; the event is stale or unrelated
    Unknown,
}

/// Applies late-arriving processor truth to payouts that already settled
/// locally. A transfer the processor reports failed or reversed unwinds its
/// payout with the same rollback shape the settlement failure path uses, so
/// the shares return to the unpaid pool.
pub struct ReconciliationHandler {
    ledger: Arc<dyn LedgerStore>,
}

impl ReconciliationHandler {
    pub fn new(ledger: Arc<dyn LedgerStore>) -> Self {
        Self { ledger }
    }

    pub async fn on_transfer_failed(
        &self,
        transfer_id: &str,
    ) -> AppResult<ReconciliationOutcome> {
        self.unwind(transfer_id, "transfer failed via webhook").await
    }

    pub async fn on_transfer_reversed(
        &self,
        transfer_id: &str,
    ) -> AppResult<ReconciliationOutcome> {
        self.unwind(transfer_id, "transfer reversed via webhook").await
    }

    async fn unwind(&self, transfer_id: &str, reason: &str) -> AppResult<ReconciliationOutcome> {
        let Some(payout) = self.ledger.payout_by_transfer_id(transfer_id).await? else {
            info!(
                "Ignoring processor event for unrecognized transfer {}",
                transfer_id
            );
            return Ok(ReconciliationOutcome::Unknown);
        };

        // Duplicate deliveries land here after the first unwind
        if !payout.status.can_transition(PayoutStatus::Failed) {
            return Ok(ReconciliationOutcome::AlreadyReconciled);
        }

        self.ledger.release_payout(payout.id, reason).await?;
        warn!(
            "Payout {} unwound after processor callback: {}",
            payout.id, reason
        );

        Ok(ReconciliationOutcome::Unwound(payout.id))
    }
}
