// In-memory stand-ins for the persistence and external ports, used by the
// unit tests. A single mutex over the ledger data gives the claim step the
// same serialization the Postgres repository gets from row locks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{AppError, AppResult, PayoutError};
use crate::ledger::models::*;
use crate::ledger::store::LedgerStore;
use crate::notify::{NotificationKind, NotificationSink};
use crate::processor::{TransferGateway, TransferReceipt, TransferRequest};

struct Assignment {
    staff_member_id: Uuid,
    room_id: Uuid,
    work_date: NaiveDate,
}

#[derive(Default)]
struct LedgerData {
    hotels: HashMap<Uuid, Hotel>,
    staff: HashMap<Uuid, StaffMember>,
    assignments: Vec<Assignment>,
    tips: HashMap<Uuid, Tip>,
    distributions: HashMap<Uuid, TipDistribution>,
    payouts: HashMap<Uuid, Payout>,
}

pub struct InMemoryLedger {
    data: Mutex<LedgerData>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(LedgerData::default()),
        }
    }

    pub async fn add_hotel(&self, pooling_enabled: bool) -> Uuid {
        let id = Uuid::new_v4();
        self.data.lock().await.hotels.insert(
            id,
            Hotel {
                id,
                name: "Test Hotel".to_string(),
                currency: "usd".to_string(),
                pooling_enabled,
                created_at: Utc::now(),
            },
        );
        id
    }

    pub async fn add_staff(
        &self,
        hotel_id: Uuid,
        is_active: bool,
        pool_opt_in: bool,
        onboarded: bool,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.data.lock().await.staff.insert(
            id,
            StaffMember {
                id,
                hotel_id,
                display_name: format!("staff-{}", id.simple()),
                is_active,
                pool_opt_in,
                stripe_account_id: onboarded.then(|| format!("acct_{}", id.simple())),
                stripe_onboarded: onboarded,
                created_at: Utc::now(),
            },
        );
        id
    }

    pub async fn add_assignment(&self, staff_member_id: Uuid, room_id: Uuid, work_date: NaiveDate) {
        self.data.lock().await.assignments.push(Assignment {
            staff_member_id,
            room_id,
            work_date,
        });
    }

    pub async fn add_succeeded_tip(
        &self,
        hotel_id: Uuid,
        room_id: Uuid,
        net_amount: i64,
        check_in_date: NaiveDate,
        check_out_date: NaiveDate,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.data.lock().await.tips.insert(
            id,
            Tip {
                id,
                hotel_id,
                room_id,
                status: TipStatus::Succeeded,
                total_amount: net_amount + 100,
                platform_fee: 100,
                net_amount,
                currency: "usd".to_string(),
                check_in_date,
                check_out_date,
                paid_at: Some(Utc::now()),
                created_at: Utc::now(),
            },
        );
        id
    }

    /// A succeeded tip with a single unpaid share for `staff_member_id`.
    pub async fn add_unpaid_share(
        &self,
        hotel_id: Uuid,
        staff_member_id: Uuid,
        amount: i64,
    ) -> Uuid {
        let today = Utc::now().date_naive();
        let tip_id = self
            .add_succeeded_tip(hotel_id, Uuid::new_v4(), amount, today, today)
            .await;

        let id = Uuid::new_v4();
        self.data.lock().await.distributions.insert(
            id,
            TipDistribution {
                id,
                tip_id,
                staff_member_id,
                amount,
                payout_id: None,
                created_at: Utc::now(),
            },
        );
        id
    }

    pub async fn insert_payout(
        &self,
        staff_member_id: Uuid,
        amount: i64,
        status: PayoutStatus,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.data.lock().await.payouts.insert(
            id,
            Payout {
                id,
                staff_member_id,
                amount,
                currency: "usd".to_string(),
                status,
                stripe_transfer_id: None,
                failure_reason: None,
                processed_at: None,
                created_at: Utc::now(),
            },
        );
        id
    }

    pub async fn backdate_payout(&self, payout_id: Uuid, minutes: i64) {
        let mut data = self.data.lock().await;
        let payout = data.payouts.get_mut(&payout_id).expect("payout exists");
        payout.created_at -= Duration::minutes(minutes);
    }

    pub async fn distributions_for_tip(&self, tip_id: Uuid) -> Vec<TipDistribution> {
        self.data
            .lock()
            .await
            .distributions
            .values()
            .filter(|d| d.tip_id == tip_id)
            .cloned()
            .collect()
    }

    pub async fn unpaid_for_staff(&self, staff_member_id: Uuid) -> Vec<TipDistribution> {
        self.data
            .lock()
            .await
            .distributions
            .values()
            .filter(|d| d.staff_member_id == staff_member_id && d.payout_id.is_none())
            .cloned()
            .collect()
    }

    pub async fn linked_to_payout(&self, payout_id: Uuid) -> Vec<TipDistribution> {
        self.data
            .lock()
            .await
            .distributions
            .values()
            .filter(|d| d.payout_id == Some(payout_id))
            .cloned()
            .collect()
    }

    pub async fn payout_row(&self, payout_id: Uuid) -> Payout {
        self.data
            .lock()
            .await
            .payouts
            .get(&payout_id)
            .cloned()
            .expect("payout exists")
    }

    pub async fn all_payouts(&self) -> Vec<Payout> {
        let mut payouts: Vec<Payout> = self.data.lock().await.payouts.values().cloned().collect();
        payouts.sort_by_key(|p| p.created_at);
        payouts
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn tip(&self, tip_id: Uuid) -> AppResult<Option<Tip>> {
        Ok(self.data.lock().await.tips.get(&tip_id).cloned())
    }

    async fn has_distributions(&self, tip_id: Uuid) -> AppResult<bool> {
        Ok(self
            .data
            .lock()
            .await
            .distributions
            .values()
            .any(|d| d.tip_id == tip_id))
    }

    async fn hotel(&self, hotel_id: Uuid) -> AppResult<Option<Hotel>> {
        Ok(self.data.lock().await.hotels.get(&hotel_id).cloned())
    }

    async fn assigned_staff(
        &self,
        hotel_id: Uuid,
        room_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AppResult<Vec<StaffMember>> {
        let data = self.data.lock().await;
        let mut ids: Vec<Uuid> = data
            .assignments
            .iter()
            .filter(|a| a.room_id == room_id && a.work_date >= from && a.work_date <= to)
            .map(|a| a.staff_member_id)
            .collect();
        ids.sort();
        ids.dedup();

        Ok(ids
            .into_iter()
            .filter_map(|id| data.staff.get(&id))
            .filter(|s| s.hotel_id == hotel_id)
            .cloned()
            .collect())
    }

    async fn pool_staff(&self, hotel_id: Uuid) -> AppResult<Vec<StaffMember>> {
        let data = self.data.lock().await;
        let mut staff: Vec<StaffMember> = data
            .staff
            .values()
            .filter(|s| s.hotel_id == hotel_id && s.is_active && s.pool_opt_in)
            .cloned()
            .collect();
        staff.sort_by_key(|s| s.id);
        Ok(staff)
    }

    async fn insert_distributions(&self, rows: &[NewDistribution]) -> AppResult<()> {
        let mut data = self.data.lock().await;
        for row in rows {
            let id = Uuid::new_v4();
            data.distributions.insert(
                id,
                TipDistribution {
                    id,
                    tip_id: row.tip_id,
                    staff_member_id: row.staff_member_id,
                    amount: row.amount,
                    payout_id: None,
                    created_at: Utc::now(),
                },
            );
        }
        Ok(())
    }

    async fn staff_member(&self, id: Uuid) -> AppResult<Option<StaffMember>> {
        Ok(self.data.lock().await.staff.get(&id).cloned())
    }

    async fn unpaid_balances(&self) -> AppResult<Vec<UnpaidBalance>> {
        let data = self.data.lock().await;
        let mut totals: HashMap<Uuid, i64> = HashMap::new();
        for d in data.distributions.values() {
            let succeeded = data
                .tips
                .get(&d.tip_id)
                .map(|t| t.status == TipStatus::Succeeded)
                .unwrap_or(false);
            if d.payout_id.is_none() && succeeded {
                *totals.entry(d.staff_member_id).or_insert(0) += d.amount;
            }
        }

        let mut balances: Vec<UnpaidBalance> = totals
            .into_iter()
            .map(|(staff_member_id, total)| UnpaidBalance {
                staff_member_id,
                total,
            })
            .collect();
        balances.sort_by_key(|b| b.staff_member_id);
        Ok(balances)
    }

    async fn claim_unpaid(
        &self,
        staff_member_id: Uuid,
        min_amount: i64,
    ) -> AppResult<Option<Payout>> {
        let mut data = self.data.lock().await;

        let mut shares: Vec<(Uuid, i64, Uuid)> = data
            .distributions
            .values()
            .filter(|d| {
                d.staff_member_id == staff_member_id
                    && d.payout_id.is_none()
                    && data
                        .tips
                        .get(&d.tip_id)
                        .map(|t| t.status == TipStatus::Succeeded)
                        .unwrap_or(false)
            })
            .map(|d| (d.id, d.amount, d.tip_id))
            .collect();
        shares.sort_by_key(|(id, _, _)| *id);

        let total: i64 = shares.iter().map(|(_, amount, _)| amount).sum();
        if shares.is_empty() || total < min_amount {
            return Ok(None);
        }

        let currency = data
            .tips
            .get(&shares[0].2)
            .map(|t| t.currency.clone())
            .unwrap_or_else(|| "usd".to_string());

        let payout = Payout {
            id: Uuid::new_v4(),
            staff_member_id,
            amount: total,
            currency,
            status: PayoutStatus::Processing,
            stripe_transfer_id: None,
            failure_reason: None,
            processed_at: None,
            created_at: Utc::now(),
        };

        for (id, _, _) in &shares {
            data.distributions.get_mut(id).expect("share exists").payout_id = Some(payout.id);
        }
        data.payouts.insert(payout.id, payout.clone());

        Ok(Some(payout))
    }

    async fn payout(&self, payout_id: Uuid) -> AppResult<Option<Payout>> {
        Ok(self.data.lock().await.payouts.get(&payout_id).cloned())
    }

    async fn payout_by_transfer_id(&self, transfer_id: &str) -> AppResult<Option<Payout>> {
        Ok(self
            .data
            .lock()
            .await
            .payouts
            .values()
            .find(|p| p.stripe_transfer_id.as_deref() == Some(transfer_id))
            .cloned())
    }

    async fn complete_payout(&self, payout_id: Uuid, transfer_id: &str) -> AppResult<()> {
        let mut data = self.data.lock().await;
        let payout = data
            .payouts
            .get_mut(&payout_id)
            .ok_or(PayoutError::NotFound(payout_id))?;

        if payout.status != PayoutStatus::Processing {
            return Err(PayoutError::InvalidState {
                payout_id,
                current: payout.status.as_str().to_string(),
                expected: PayoutStatus::Processing.as_str().to_string(),
            }
            .into());
        }

        payout.status = PayoutStatus::Completed;
        payout.stripe_transfer_id = Some(transfer_id.to_string());
        payout.processed_at = Some(Utc::now());
        Ok(())
    }

    async fn release_payout(&self, payout_id: Uuid, reason: &str) -> AppResult<()> {
        let mut data = self.data.lock().await;
        let Some(payout) = data.payouts.get_mut(&payout_id) else {
            return Ok(());
        };
        if payout.status == PayoutStatus::Failed {
            return Ok(());
        }

        payout.status = PayoutStatus::Failed;
        payout.failure_reason = Some(reason.to_string());

        for d in data.distributions.values_mut() {
            if d.payout_id == Some(payout_id) {
                d.payout_id = None;
            }
        }
        Ok(())
    }

    async fn mark_payout_processing(&self, payout_id: Uuid) -> AppResult<()> {
        let mut data = self.data.lock().await;
        let payout = data
            .payouts
            .get_mut(&payout_id)
            .ok_or(PayoutError::NotFound(payout_id))?;

        if payout.status != PayoutStatus::Failed {
            return Err(PayoutError::InvalidState {
                payout_id,
                current: payout.status.as_str().to_string(),
                expected: PayoutStatus::Failed.as_str().to_string(),
            }
            .into());
        }

        payout.status = PayoutStatus::Processing;
        payout.failure_reason = None;
        Ok(())
    }

    async fn fail_payout(&self, payout_id: Uuid, reason: &str) -> AppResult<()> {
        let mut data = self.data.lock().await;
        let payout = data
            .payouts
            .get_mut(&payout_id)
            .ok_or(PayoutError::NotFound(payout_id))?;

        if payout.status != PayoutStatus::Processing {
            return Err(PayoutError::InvalidState {
                payout_id,
                current: payout.status.as_str().to_string(),
                expected: PayoutStatus::Processing.as_str().to_string(),
            }
            .into());
        }

        payout.status = PayoutStatus::Failed;
        payout.failure_reason = Some(reason.to_string());
        Ok(())
    }

    async fn release_stale_claims(&self, older_than_minutes: i64) -> AppResult<u64> {
        let cutoff = Utc::now() - Duration::minutes(older_than_minutes);
        let mut data = self.data.lock().await;

        let stale: Vec<Uuid> = data
            .payouts
            .values()
            .filter(|p| {
                p.status == PayoutStatus::Processing
                    && p.stripe_transfer_id.is_none()
                    && p.created_at < cutoff
            })
            .map(|p| p.id)
            .collect();

        for id in &stale {
            let payout = data.payouts.get_mut(id).expect("payout exists");
            payout.status = PayoutStatus::Failed;
            payout.failure_reason = Some("settlement interrupted before transfer".to_string());
        }
        for d in data.distributions.values_mut() {
            if let Some(payout_id) = d.payout_id {
                if stale.contains(&payout_id) {
                    d.payout_id = None;
                }
            }
        }

        Ok(stale.len() as u64)
    }

    async fn list_payouts(
        &self,
        status: Option<PayoutStatus>,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Payout>> {
        let data = self.data.lock().await;
        let mut payouts: Vec<Payout> = data
            .payouts
            .values()
            .filter(|p| status.map(|s| p.status == s).unwrap_or(true))
            .cloned()
            .collect();
        payouts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(payouts
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }
}

/// Transfer gateway that records calls and can be switched into a failure
/// mode mid-test.
pub struct StubGateway {
    failure: Mutex<Option<String>>,
    pub calls: Mutex<Vec<TransferRequest>>,
    seq: AtomicU64,
}

impl StubGateway {
    pub fn new() -> Self {
        Self {
            failure: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            seq: AtomicU64::new(0),
        }
    }

    pub async fn fail_with(&self, reason: &str) {
        *self.failure.lock().await = Some(reason.to_string());
    }

    pub async fn succeed(&self) {
        *self.failure.lock().await = None;
    }
}

#[async_trait]
impl TransferGateway for StubGateway {
    async fn create_transfer(&self, request: &TransferRequest) -> AppResult<TransferReceipt> {
        self.calls.lock().await.push(request.clone());

        if let Some(reason) = self.failure.lock().await.clone() {
            return Err(AppError::ExternalService(reason));
        }

        let n = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(TransferReceipt {
            transfer_id: format!("tr_test_{:04}", n),
        })
    }
}

/// Notification sink that records what was queued; can fail exactly once to
/// prove best-effort semantics.
pub struct RecordingSink {
    pub events: Mutex<Vec<(Uuid, NotificationKind, String)>>,
    fail_once: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail_once: AtomicBool::new(false),
        }
    }

    pub async fn fail_next(&self) {
        self.fail_once.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        title: &str,
        _body: &str,
        _metadata: serde_json::Value,
    ) -> AppResult<()> {
        if self.fail_once.swap(false, Ordering::SeqCst) {
            return Err(AppError::Internal("notification sink unavailable".to_string()));
        }
        self.events.lock().await.push((user_id, kind, title.to_string()));
        Ok(())
    }
}
