use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult, PayoutError};
use crate::ledger::models::{Payout, PayoutStatus};
use crate::ledger::store::LedgerStore;
use crate::notify::{NotificationKind, NotificationSink};
use crate::processor::{TransferGateway, TransferRequest};
use chrono::Utc;

/// Settles one staff member's accumulated unpaid shares: claim the shares
/// durably, then move the money, then record the result.
///
/// The claim transaction commits before the transfer call goes out. If the
/// transfer fails, the claim is rolled back in one transaction so every
/// share is rediscoverable by the next batch run. Shares are never left
/// pointing at a dead payout.
pub struct SettlementService {
    ledger: Arc<dyn LedgerStore>,
    gateway: Arc<dyn TransferGateway>,
    notifier: Arc<dyn NotificationSink>,
    min_payout_amount: i64,
}

impl SettlementService {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        gateway: Arc<dyn TransferGateway>,
        notifier: Arc<dyn NotificationSink>,
        min_payout_amount: i64,
    ) -> Self {
        Self {
            ledger,
            gateway,
            notifier,
            min_payout_amount,
        }
    }

    /// Returns `Ok(None)` when there is nothing (or not enough) unpaid for
    /// the member. Throws `NotOnboarded` before touching any shares.
    pub async fn settle(&self, staff_member_id: Uuid) -> AppResult<Option<Payout>> {
        let staff = self
            .ledger
            .staff_member(staff_member_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("staff member {}", staff_member_id)))?;

        let Some(destination) = staff.transfer_destination().map(str::to_owned) else {
            return Err(PayoutError::NotOnboarded(staff.id).into());
        };

        let Some(mut payout) = self
            .ledger
            .claim_unpaid(staff.id, self.min_payout_amount)
            .await?
        else {
            return Ok(None);
        };

        let request = TransferRequest {
            amount: payout.amount,
            currency: payout.currency.clone(),
            destination,
            payout_id: payout.id,
            staff_member_id: staff.id,
        };

        match self.gateway.create_transfer(&request).await {
            Ok(receipt) => {
                self.ledger
                    .complete_payout(payout.id, &receipt.transfer_id)
                    .await?;
                info!(
                    "Payout {} completed: {} {} via transfer {}",
                    payout.id, payout.amount, payout.currency, receipt.transfer_id
                );

                payout.status = PayoutStatus::Completed;
                payout.stripe_transfer_id = Some(receipt.transfer_id);
                payout.processed_at = Some(Utc::now());
                self.notify_completed(&payout).await;
                Ok(Some(payout))
            }
            Err(err) => {
                let reason = err.to_string();
                error!("Transfer for payout {} failed: {}", payout.id, reason);

                // Restore discoverability before surfacing the failure
                self.ledger.release_payout(payout.id, &reason).await?;
                payout.status = PayoutStatus::Failed;
                payout.failure_reason = Some(reason.clone());
                self.notify_failed(&payout, &reason).await;

                Err(PayoutError::TransferFailed {
                    payout_id: payout.id,
                    reason,
                }
                .into())
            }
        }
    }

    /// Re-attempt a failed payout in place. The shares linked by the
    /// original attempt stay linked either way: this payout remains the
    /// claim of record until it completes or is reconciled away.
    pub async fn retry(&self, payout_id: Uuid) -> AppResult<Payout> {
        let mut payout = self
            .ledger
            .payout(payout_id)
            .await?
            .ok_or(PayoutError::NotFound(payout_id))?;

        payout.ensure_retryable()?;

        let staff = self
            .ledger
            .staff_member(payout.staff_member_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("staff member {}", payout.staff_member_id))
            })?;

        let Some(destination) = staff.transfer_destination().map(str::to_owned) else {
            return Err(PayoutError::NotOnboarded(staff.id).into());
        };

        self.ledger.mark_payout_processing(payout.id).await?;

        let request = TransferRequest {
            amount: payout.amount,
            currency: payout.currency.clone(),
            destination,
            payout_id: payout.id,
            staff_member_id: staff.id,
        };

        match self.gateway.create_transfer(&request).await {
            Ok(receipt) => {
                self.ledger
                    .complete_payout(payout.id, &receipt.transfer_id)
                    .await?;
                info!(
                    "Payout {} completed on retry via transfer {}",
                    payout.id, receipt.transfer_id
                );

                payout.status = PayoutStatus::Completed;
                payout.stripe_transfer_id = Some(receipt.transfer_id);
                payout.failure_reason = None;
                payout.processed_at = Some(Utc::now());
                self.notify_completed(&payout).await;
                Ok(payout)
            }
            Err(err) => {
                let reason = err.to_string();
                error!("Retry of payout {} failed: {}", payout.id, reason);

                self.ledger.fail_payout(payout.id, &reason).await?;
                payout.status = PayoutStatus::Failed;
                payout.failure_reason = Some(reason.clone());
                self.notify_failed(&payout, &reason).await;

                Err(PayoutError::TransferFailed {
                    payout_id: payout.id,
                    reason,
                }
                .into())
            }
        }
    }

    async fn notify_completed(&self, payout: &Payout) {
        let body = format!(
            "Your tip payout of {} is on the way to your bank account",
            display_amount(payout.amount, &payout.currency)
        );
        let metadata = serde_json::json!({
            "payout_id": payout.id,
            "amount": payout.amount,
            "currency": payout.currency,
        });

        if let Err(err) = self
            .notifier
            .notify(
                payout.staff_member_id,
                NotificationKind::PayoutCompleted,
                "Tip payout sent",
                &body,
                metadata,
            )
            .await
        {
            warn!(
                "Could not queue payout_completed notification for payout {}: {}",
                payout.id, err
            );
        }
    }

    async fn notify_failed(&self, payout: &Payout, reason: &str) {
        let body = format!(
            "Your tip payout of {} could not be delivered",
            display_amount(payout.amount, &payout.currency)
        );
        let metadata = serde_json::json!({
            "payout_id": payout.id,
            "amount": payout.amount,
            "currency": payout.currency,
            "reason": reason,
        });

        if let Err(err) = self
            .notifier
            .notify(
                payout.staff_member_id,
                NotificationKind::PayoutFailed,
                "Tip payout failed",
                &body,
                metadata,
            )
            .await
        {
            warn!(
                "Could not queue payout_failed notification for payout {}: {}",
                payout.id, err
            );
        }
    }
}

fn display_amount(amount: i64, currency: &str) -> String {
    format!("{}.{:02} {}", amount / 100, amount % 100, currency.to_uppercase())
}
