use chrono::NaiveDate;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use super::models::*;
use super::store::LedgerStore;
use crate::error::{AppResult, PayoutError};
use async_trait::async_trait;

/// Postgres-backed ledger - THE source of truth for tips, shares and payouts
pub struct LedgerRepository {
    pub pool: PgPool,
}

impl LedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerStore for LedgerRepository {
    async fn tip(&self, tip_id: Uuid) -> AppResult<Option<Tip>> {
        let tip = sqlx::query_as::<_, Tip>(
            r#"
            SELECT id, hotel_id, room_id, status, total_amount, platform_fee,
                   net_amount, currency, check_in_date, check_out_date, paid_at, created_at
            FROM tips
            WHERE id = $1
            "#,
        )
        .bind(tip_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(tip)
    }

    async fn has_distributions(&self, tip_id: Uuid) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM tip_distributions WHERE tip_id = $1)",
        )
        .bind(tip_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn hotel(&self, hotel_id: Uuid) -> AppResult<Option<Hotel>> {
        let hotel = sqlx::query_as::<_, Hotel>(
            r#"
            SELECT id, name, currency, pooling_enabled, created_at
            FROM hotels
            WHERE id = $1
            "#,
        )
        .bind(hotel_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(hotel)
    }

    async fn assigned_staff(
        &self,
        hotel_id: Uuid,
        room_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AppResult<Vec<StaffMember>> {
        let staff = sqlx::query_as::<_, StaffMember>(
            r#"
            SELECT DISTINCT s.id, s.hotel_id, s.display_name, s.is_active, s.pool_opt_in,
                   s.stripe_account_id, s.stripe_onboarded, s.created_at
            FROM staff_members s
            JOIN room_assignments ra ON ra.staff_member_id = s.id
            WHERE s.hotel_id = $1
              AND ra.room_id = $2
              AND ra.work_date BETWEEN $3 AND $4
            ORDER BY s.id
            "#,
        )
        .bind(hotel_id)
        .bind(room_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(staff)
    }

    async fn pool_staff(&self, hotel_id: Uuid) -> AppResult<Vec<StaffMember>> {
        let staff = sqlx::query_as::<_, StaffMember>(
            r#"
            SELECT id, hotel_id, display_name, is_active, pool_opt_in,
                   stripe_account_id, stripe_onboarded, created_at
            FROM staff_members
            WHERE hotel_id = $1 AND is_active = TRUE AND pool_opt_in = TRUE
            ORDER BY id
            "#,
        )
        .bind(hotel_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(staff)
    }

    async fn insert_distributions(&self, rows: &[NewDistribution]) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO tip_distributions (tip_id, staff_member_id, amount)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(row.tip_id)
            .bind(row.staff_member_id)
            .bind(row.amount)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn staff_member(&self, id: Uuid) -> AppResult<Option<StaffMember>> {
        let staff = sqlx::query_as::<_, StaffMember>(
            r#"
            SELECT id, hotel_id, display_name, is_active, pool_opt_in,
                   stripe_account_id, stripe_onboarded, created_at
            FROM staff_members
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(staff)
    }

    async fn unpaid_balances(&self) -> AppResult<Vec<UnpaidBalance>> {
        let balances = sqlx::query_as::<_, UnpaidBalance>(
            r#"
            SELECT d.staff_member_id, COALESCE(SUM(d.amount), 0)::BIGINT AS total
            FROM tip_distributions d
            JOIN tips t ON t.id = d.tip_id
            WHERE d.payout_id IS NULL AND t.status = 'succeeded'
            GROUP BY d.staff_member_id
            ORDER BY d.staff_member_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(balances)
    }

    async fn claim_unpaid(
        &self,
        staff_member_id: Uuid,
        min_amount: i64,
    ) -> AppResult<Option<Payout>> {
        let mut tx = self.pool.begin().await?;

        // Row locks serialize concurrent claims for the same member: the
        // loser of the race re-reads after commit and sees nothing unpaid.
        let shares = sqlx::query_as::<_, (Uuid, i64, String)>(
            r#"
            SELECT d.id, d.amount, t.currency
            FROM tip_distributions d
            JOIN tips t ON t.id = d.tip_id
            WHERE d.staff_member_id = $1
              AND d.payout_id IS NULL
              AND t.status = 'succeeded'
            ORDER BY d.created_at, d.id
            FOR UPDATE OF d
            "#,
        )
        .bind(staff_member_id)
        .fetch_all(&mut *tx)
        .await?;

        let total: i64 = shares.iter().map(|(_, amount, _)| amount).sum();
        if shares.is_empty() || total < min_amount {
            tx.rollback().await?;
            return Ok(None);
        }

        let currency = shares[0].2.clone();
        let payout = sqlx::query_as::<_, Payout>(
            r#"
            INSERT INTO payouts (staff_member_id, amount, currency, status)
            VALUES ($1, $2, $3, 'processing')
            RETURNING id, staff_member_id, amount, currency, status,
                      stripe_transfer_id, failure_reason, processed_at, created_at
            "#,
        )
        .bind(staff_member_id)
        .bind(total)
        .bind(&currency)
        .fetch_one(&mut *tx)
        .await?;

        let share_ids: Vec<Uuid> = shares.iter().map(|(id, _, _)| *id).collect();
        sqlx::query("UPDATE tip_distributions SET payout_id = $1 WHERE id = ANY($2)")
            .bind(payout.id)
            .bind(&share_ids)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            "Claimed {} unpaid shares ({} {}) for staff member {} as payout {}",
            share_ids.len(),
            total,
            currency,
            staff_member_id,
            payout.id
        );

        Ok(Some(payout))
    }

    async fn payout(&self, payout_id: Uuid) -> AppResult<Option<Payout>> {
        let payout = sqlx::query_as::<_, Payout>(
            r#"
            SELECT id, staff_member_id, amount, currency, status,
                   stripe_transfer_id, failure_reason, processed_at, created_at
            FROM payouts
            WHERE id = $1
            "#,
        )
        .bind(payout_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(payout)
    }

    async fn payout_by_transfer_id(&self, transfer_id: &str) -> AppResult<Option<Payout>> {
        let payout = sqlx::query_as::<_, Payout>(
            r#"
            SELECT id, staff_member_id, amount, currency, status,
                   stripe_transfer_id, failure_reason, processed_at, created_at
            FROM payouts
            WHERE stripe_transfer_id = $1
            "#,
        )
        .bind(transfer_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(payout)
    }

    async fn complete_payout(&self, payout_id: Uuid, transfer_id: &str) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE payouts
            SET status = 'completed', stripe_transfer_id = $2, processed_at = NOW()
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(payout_id)
        .bind(transfer_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PayoutError::InvalidState {
                payout_id,
                current: "unknown".to_string(),
                expected: PayoutStatus::Processing.as_str().to_string(),
            }
            .into());
        }

        Ok(())
    }

    async fn release_payout(&self, payout_id: Uuid, reason: &str) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let marked = sqlx::query(
            r#"
            UPDATE payouts
            SET status = 'failed', failure_reason = $2
            WHERE id = $1 AND status <> 'failed'
            "#,
        )
        .bind(payout_id)
        .bind(reason)
        .execute(&mut *tx)
        .await?;

        // Already failed means already unlinked; nothing to redo.
        if marked.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(());
        }

        sqlx::query("UPDATE tip_distributions SET payout_id = NULL WHERE payout_id = $1")
            .bind(payout_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn mark_payout_processing(&self, payout_id: Uuid) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE payouts
            SET status = 'processing', failure_reason = NULL
            WHERE id = $1 AND status = 'failed'
            "#,
        )
        .bind(payout_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PayoutError::InvalidState {
                payout_id,
                current: "unknown".to_string(),
                expected: PayoutStatus::Failed.as_str().to_string(),
            }
            .into());
        }

        Ok(())
    }

    async fn fail_payout(&self, payout_id: Uuid, reason: &str) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE payouts
            SET status = 'failed', failure_reason = $2
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(payout_id)
        .bind(reason)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PayoutError::InvalidState {
                payout_id,
                current: "unknown".to_string(),
                expected: PayoutStatus::Processing.as_str().to_string(),
            }
            .into());
        }

        Ok(())
    }

    async fn release_stale_claims(&self, older_than_minutes: i64) -> AppResult<u64> {
        let mut tx = self.pool.begin().await?;

        let stale = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM payouts
            WHERE status = 'processing'
              AND stripe_transfer_id IS NULL
              AND created_at < NOW() - make_interval(mins => $1)
            FOR UPDATE
            "#,
        )
        .bind(older_than_minutes as i32)
        .fetch_all(&mut *tx)
        .await?;

        if stale.is_empty() {
            tx.rollback().await?;
            return Ok(0);
        }

        sqlx::query("UPDATE tip_distributions SET payout_id = NULL WHERE payout_id = ANY($1)")
            .bind(&stale)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            UPDATE payouts
            SET status = 'failed', failure_reason = 'settlement interrupted before transfer'
            WHERE id = ANY($1)
            "#,
        )
        .bind(&stale)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(stale.len() as u64)
    }

    async fn list_payouts(
        &self,
        status: Option<PayoutStatus>,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Payout>> {
        let payouts = if let Some(status) = status {
            sqlx::query_as::<_, Payout>(
                r#"
                SELECT id, staff_member_id, amount, currency, status,
                       stripe_transfer_id, failure_reason, processed_at, created_at
                FROM payouts
                WHERE status = $1
                ORDER BY created_at DESC
                LIMIT $2 OFFSET $3
                "#,
            )
            .bind(status)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query_as::<_, Payout>(
                r#"
                SELECT id, staff_member_id, amount, currency, status,
                       stripe_transfer_id, failure_reason, processed_at, created_at
                FROM payouts
                ORDER BY created_at DESC
                LIMIT $1 OFFSET $2
                "#,
            )
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?
        };

        Ok(payouts)
    }
}
