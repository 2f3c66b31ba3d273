use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use super::settlement::SettlementService;
use crate::ledger::store::LedgerStore;

/// Counters for one batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PayoutRunSummary {
    pub processed: u32,
    pub failed: u32,
    pub skipped: u32,
}

/// Scans unpaid shares grouped per staff member and settles every balance
/// that reached the payout floor. Runs from the scheduler and from the
/// operator surface; both paths share this code.
pub struct PayoutBatcher {
    ledger: Arc<dyn LedgerStore>,
    settlement: Arc<SettlementService>,
    min_payout_amount: i64,
}

impl PayoutBatcher {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        settlement: Arc<SettlementService>,
        min_payout_amount: i64,
    ) -> Self {
        Self {
            ledger,
            settlement,
            min_payout_amount,
        }
    }

    /// Never fails: per-member errors are logged and counted, and a balance
    /// below the floor simply rolls forward to the next run.
    pub async fn process_payouts(&self) -> PayoutRunSummary {
        let mut summary = PayoutRunSummary::default();

        let balances = match self.ledger.unpaid_balances().await {
            Ok(balances) => balances,
            Err(err) => {
                error!("Payout run could not read unpaid balances: {}", err);
                return summary;
            }
        };

        info!(
            "Payout run started: {} staff members with unpaid shares",
            balances.len()
        );

        for balance in balances {
            if balance.total < self.min_payout_amount {
                summary.skipped += 1;
                continue;
            }

            match self.settlement.settle(balance.staff_member_id).await {
                Ok(Some(payout)) => {
                    info!(
                        "Settled {} {} for staff member {} (payout {})",
                        payout.amount, payout.currency, balance.staff_member_id, payout.id
                    );
                    summary.processed += 1;
                }
                // A concurrent run claimed the balance first, or it shrank
                // below the floor between the scan and the claim.
                Ok(None) => summary.skipped += 1,
                Err(err) => {
                    error!(
                        "Payout for staff member {} failed: {}",
                        balance.staff_member_id, err
                    );
                    summary.failed += 1;
                }
            }
        }

        info!(
            "Payout run finished: {} processed, {} failed, {} skipped",
            summary.processed, summary.failed, summary.skipped
        );
        summary
    }
}
