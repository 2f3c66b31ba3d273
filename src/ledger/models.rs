use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, Type};
use uuid::Uuid;

use crate::error::{AppResult, PayoutError};

/// Tip lifecycle. `Refunded` is terminal and never distributed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "tip_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TipStatus {
    Pending,
    Processing,
    Succeeded,
    Failed,
    Refunded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "payout_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PayoutStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl PayoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutStatus::Pending => "pending",
            PayoutStatus::Processing => "processing",
            PayoutStatus::Completed => "completed",
            PayoutStatus::Failed => "failed",
        }
    }

    /// Valid transitions:
    /// - Pending → Processing
    /// - Processing → Completed, Failed
    /// - Completed → Failed (asynchronous reconciliation only)
    /// - Failed → Processing (retry)
    pub fn can_transition(self, to: PayoutStatus) -> bool {
        matches!(
            (self, to),
            (PayoutStatus::Pending, PayoutStatus::Processing)
                | (PayoutStatus::Processing, PayoutStatus::Completed)
                | (PayoutStatus::Processing, PayoutStatus::Failed)
                | (PayoutStatus::Completed, PayoutStatus::Failed)
                | (PayoutStatus::Failed, PayoutStatus::Processing)
        )
    }
}

/// One guest payment event. Immutable once terminal, except for the
/// distribution side effect recorded in `tip_distributions`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tip {
    pub id: Uuid,
    pub hotel_id: Uuid,
    pub room_id: Uuid,
    pub status: TipStatus,
    /// Minor currency units, as are all amounts below
    pub total_amount: i64,
    pub platform_fee: i64,
    pub net_amount: i64,
    pub currency: String,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// One staff member's share of one tip's net amount.
///
/// `payout_id` is null while the share is unpaid, and may only point at a
/// payout that is not failed. Rollback paths reset it to null so the share
/// is rediscovered by the next batch run.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TipDistribution {
    pub id: Uuid,
    pub tip_id: Uuid,
    pub staff_member_id: Uuid,
    pub amount: i64,
    pub payout_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// A new share to persist; ids and timestamps are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewDistribution {
    pub tip_id: Uuid,
    pub staff_member_id: Uuid,
    pub amount: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StaffMember {
    pub id: Uuid,
    pub hotel_id: Uuid,
    pub display_name: String,
    pub is_active: bool,
    pub pool_opt_in: bool,
    pub stripe_account_id: Option<String>,
    pub stripe_onboarded: bool,
    pub created_at: DateTime<Utc>,
}

impl StaffMember {
    /// A member can receive transfers once onboarding set a destination.
    pub fn transfer_destination(&self) -> Option<&str> {
        if self.stripe_onboarded {
            self.stripe_account_id.as_deref()
        } else {
            None
        }
    }
}

/// One outbound transfer attempt. A failed payout is retried in place
/// rather than replaced.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payout {
    pub id: Uuid,
    pub staff_member_id: Uuid,
    pub amount: i64,
    pub currency: String,
    pub status: PayoutStatus,
    pub stripe_transfer_id: Option<String>,
    pub failure_reason: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Payout {
    pub fn ensure_retryable(&self) -> AppResult<()> {
        if self.status != PayoutStatus::Failed {
            return Err(PayoutError::InvalidState {
                payout_id: self.id,
                current: self.status.as_str().to_string(),
                expected: PayoutStatus::Failed.as_str().to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Hotel {
    pub id: Uuid,
    pub name: String,
    pub currency: String,
    pub pooling_enabled: bool,
    pub created_at: DateTime<Utc>,
}

/// One staff member's unpaid total, as grouped by the batcher scan.
#[derive(Debug, Clone, FromRow)]
pub struct UnpaidBalance {
    pub staff_member_id: Uuid,
    pub total: i64,
}
