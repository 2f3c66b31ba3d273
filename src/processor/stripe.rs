use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use super::{TransferGateway, TransferReceipt, TransferRequest};
use crate::error::{AppError, AppResult};

/// Stripe Connect transfer client
pub struct StripeTransferClient {
    secret_key: String,
    api_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct StripeTransfer {
    id: String,
}

impl StripeTransferClient {
    pub fn new(secret_key: String, api_url: String) -> Self {
        Self {
            secret_key,
            api_url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl TransferGateway for StripeTransferClient {
    /// POST /v1/transfers against the Stripe API
    async fn create_transfer(&self, request: &TransferRequest) -> AppResult<TransferReceipt> {
        let params = [
            ("amount", request.amount.to_string()),
            ("currency", request.currency.clone()),
            ("destination", request.destination.clone()),
            ("metadata[payout_id]", request.payout_id.to_string()),
            (
                "metadata[staff_member_id]",
                request.staff_member_id.to_string(),
            ),
        ];

        let response = self
            .client
            .post(format!("{}/v1/transfers", self.api_url))
            .header("Authorization", format!("Bearer {}", self.secret_key))
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalService(format!(
                "Stripe transfer rejected: {}",
                error_text
            )));
        }

        let transfer: StripeTransfer = response.json().await?;
        info!("Transfer created via Stripe: {}", transfer.id);
        Ok(TransferReceipt {
            transfer_id: transfer.id,
        })
    }
}
