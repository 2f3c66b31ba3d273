use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppResult;

pub mod stripe;

pub use stripe::StripeTransferClient;

/// One outbound transfer to a staff member's connected account.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    /// Minor currency units
    pub amount: i64,
    pub currency: String,
    pub destination: String,
    pub payout_id: Uuid,
    pub staff_member_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct TransferReceipt {
    pub transfer_id: String,
}

/// Payment processor port. `create_transfer` may fail synchronously; the
/// processor additionally reports `transfer.failed` / `transfer.reversed`
/// events later through the webhook surface.
#[async_trait]
pub trait TransferGateway: Send + Sync {
    async fn create_transfer(&self, request: &TransferRequest) -> AppResult<TransferReceipt>;
}
