use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::ledger::models::{NewDistribution, StaffMember, TipStatus};
use crate::ledger::store::LedgerStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnattributedReason {
    /// No room assignment covers the tip's room within the stay window
    NoAssignedStaff,
    /// The hotel pools tips but no active staff has opted in
    EmptyPool,
}

/// What a distribution request did. The unattributed cases leave the tip's
/// funds unassigned on purpose; they are surfaced (and logged) rather than
/// raised as errors so the payment-success path is never poisoned by a
/// staffing gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributionOutcome {
    Split {
        recipients: usize,
        per_person: i64,
        remainder: i64,
    },
    AlreadyDistributed,
    Unattributed(UnattributedReason),
    TipNotFound,
    TipNotSettled,
}

impl DistributionOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            DistributionOutcome::Split { .. } => "split",
            DistributionOutcome::AlreadyDistributed => "already_distributed",
            DistributionOutcome::Unattributed(_) => "unattributed",
            DistributionOutcome::TipNotFound => "tip_not_found",
            DistributionOutcome::TipNotSettled => "tip_not_settled",
        }
    }
}

/// Splits a succeeded tip's net amount into per-staff shares under the
/// hotel's pooling policy and persists them as one atomic batch.
pub struct DistributionSplitter {
    ledger: Arc<dyn LedgerStore>,
}

impl DistributionSplitter {
    pub fn new(ledger: Arc<dyn LedgerStore>) -> Self {
        Self { ledger }
    }

    pub async fn distribute(&self, tip_id: Uuid) -> AppResult<DistributionOutcome> {
        let Some(tip) = self.ledger.tip(tip_id).await? else {
            info!("Ignoring distribution request for unknown tip {}", tip_id);
            return Ok(DistributionOutcome::TipNotFound);
        };

        if tip.status != TipStatus::Succeeded {
            return Ok(DistributionOutcome::TipNotSettled);
        }

        // Safe against webhook redelivery: shares are created exactly once.
        if self.ledger.has_distributions(tip.id).await? {
            return Ok(DistributionOutcome::AlreadyDistributed);
        }

        let assigned = self
            .ledger
            .assigned_staff(tip.hotel_id, tip.room_id, tip.check_in_date, tip.check_out_date)
            .await?;

        if assigned.is_empty() {
            warn!(
                "Tip {} has no staff assigned to room {} during the stay; funds left unattributed",
                tip.id, tip.room_id
            );
            return Ok(DistributionOutcome::Unattributed(
                UnattributedReason::NoAssignedStaff,
            ));
        }

        let hotel = self
            .ledger
            .hotel(tip.hotel_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("hotel {}", tip.hotel_id)))?;

        // Pooling replaces the assigned set with every opted-in active
        // member; the assignment check above only gates whether the tip is
        // attributable at all.
        let recipients = if hotel.pooling_enabled {
            let pool = self.ledger.pool_staff(tip.hotel_id).await?;
            if pool.is_empty() {
                warn!(
                    "Hotel {} pools tips but has no opted-in active staff; tip {} left unattributed",
                    tip.hotel_id, tip.id
                );
                return Ok(DistributionOutcome::Unattributed(
                    UnattributedReason::EmptyPool,
                ));
            }
            pool
        } else {
            assigned
        };

        let recipient_ids = stable_recipient_ids(&recipients);
        let shares = split_amount(tip.net_amount, recipient_ids.len());

        let rows: Vec<NewDistribution> = recipient_ids
            .iter()
            .zip(shares.iter())
            .map(|(&staff_member_id, &amount)| NewDistribution {
                tip_id: tip.id,
                staff_member_id,
                amount,
            })
            .collect();

        self.ledger.insert_distributions(&rows).await?;

        let per_person = tip.net_amount / recipient_ids.len() as i64;
        let remainder = tip.net_amount - per_person * recipient_ids.len() as i64;
        info!(
            "Tip {} split into {} shares of {} {} (remainder {})",
            tip.id,
            recipient_ids.len(),
            per_person,
            tip.currency,
            remainder
        );

        Ok(DistributionOutcome::Split {
            recipients: recipient_ids.len(),
            per_person,
            remainder,
        })
    }
}

/// De-duplicate and order recipients so the remainder share lands
/// deterministically on the same member across runs.
fn stable_recipient_ids(staff: &[StaffMember]) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = staff.iter().map(|s| s.id).collect();
    ids.sort();
    ids.dedup();
    ids
}

/// Integer split of `net_amount` across `recipients` shares. The first share
/// absorbs the division remainder, so the shares always reconstruct
/// `net_amount` exactly.
fn split_amount(net_amount: i64, recipients: usize) -> Vec<i64> {
    let n = recipients as i64;
    let per_person = net_amount / n;
    let remainder = net_amount - per_person * n;

    let mut shares = vec![per_person; recipients];
    shares[0] += remainder;
    shares
}
