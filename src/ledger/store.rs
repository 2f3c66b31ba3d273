use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use super::models::{
    Hotel, NewDistribution, Payout, PayoutStatus, StaffMember, Tip, UnpaidBalance,
};
use crate::error::AppResult;

/// Persistence port for the distribution and settlement engine.
///
/// Every multi-row mutation here is atomic: a batch insert commits fully or
/// not at all, and `claim_unpaid`/`release_payout` move the payout row and
/// its linked shares in a single transaction. `claim_unpaid` additionally
/// serializes concurrent callers on the same staff member (row locks in the
/// Postgres implementation), which is what makes overlapping batch runs
/// safe.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    // ---- tips & distribution ----

    async fn tip(&self, tip_id: Uuid) -> AppResult<Option<Tip>>;

    async fn has_distributions(&self, tip_id: Uuid) -> AppResult<bool>;

    async fn hotel(&self, hotel_id: Uuid) -> AppResult<Option<Hotel>>;

    /// Staff with a room assignment covering the room within the stay window,
    /// de-duplicated, in stable id order.
    async fn assigned_staff(
        &self,
        hotel_id: Uuid,
        room_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AppResult<Vec<StaffMember>>;

    /// Active pool participants at the hotel, in stable id order.
    async fn pool_staff(&self, hotel_id: Uuid) -> AppResult<Vec<StaffMember>>;

    /// Insert one share per recipient, all-or-nothing.
    async fn insert_distributions(&self, rows: &[NewDistribution]) -> AppResult<()>;

    // ---- payouts ----

    async fn staff_member(&self, id: Uuid) -> AppResult<Option<StaffMember>>;

    /// Unpaid totals of succeeded tips, grouped per staff member.
    async fn unpaid_balances(&self) -> AppResult<Vec<UnpaidBalance>>;

    /// The claim step: re-read the member's unpaid shares under lock, and if
    /// their sum reaches `min_amount`, create a `processing` payout and link
    /// the shares to it, all in one transaction. Returns `None` when there is
    /// nothing (or not enough) to pay out.
    async fn claim_unpaid(
        &self,
        staff_member_id: Uuid,
        min_amount: i64,
    ) -> AppResult<Option<Payout>>;

    async fn payout(&self, payout_id: Uuid) -> AppResult<Option<Payout>>;

    async fn payout_by_transfer_id(&self, transfer_id: &str) -> AppResult<Option<Payout>>;

    /// Mark a `processing` payout completed with its transfer id.
    async fn complete_payout(&self, payout_id: Uuid, transfer_id: &str) -> AppResult<()>;

    /// Roll a payout back: unlink every share pointing at it and mark it
    /// failed with `reason`, atomically. A payout that is already failed is
    /// left untouched (idempotent).
    async fn release_payout(&self, payout_id: Uuid, reason: &str) -> AppResult<()>;

    /// Reset a `failed` payout to `processing` for a retry, clearing the
    /// stored failure reason. Linked shares are left in place.
    async fn mark_payout_processing(&self, payout_id: Uuid) -> AppResult<()>;

    /// Mark a `processing` payout failed without unlinking its shares
    /// (retry failure path).
    async fn fail_payout(&self, payout_id: Uuid, reason: &str) -> AppResult<()>;

    /// Release claims whose transfer call never happened: payouts stuck
    /// `processing` with no transfer id for longer than `older_than_minutes`
    /// are failed and their shares unlinked. Returns how many were released.
    async fn release_stale_claims(&self, older_than_minutes: i64) -> AppResult<u64>;

    async fn list_payouts(
        &self,
        status: Option<PayoutStatus>,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Payout>>;
}
