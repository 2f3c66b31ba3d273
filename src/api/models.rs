use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::distribution::DistributionOutcome;
use crate::ledger::models::PayoutStatus;

/// Payment-capture collaborator event announcing a tip's final status.
#[derive(Debug, Deserialize)]
pub struct PaymentEvent {
    pub tip_id: Uuid,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct DistributionResponse {
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipients: Option<usize>,
}

impl From<DistributionOutcome> for DistributionResponse {
    fn from(outcome: DistributionOutcome) -> Self {
        let recipients = match outcome {
            DistributionOutcome::Split { recipients, .. } => Some(recipients),
            _ => None,
        };
        Self {
            outcome: outcome.label(),
            recipients,
        }
    }
}

/// Processor event envelope for transfer callbacks.
#[derive(Debug, Deserialize)]
pub struct TransferEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: TransferEventData,
}

#[derive(Debug, Deserialize)]
pub struct TransferEventData {
    pub object: TransferObject,
}

#[derive(Debug, Deserialize)]
pub struct TransferObject {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub status: String,
    pub handled: bool,
}

#[derive(Debug, Deserialize)]
pub struct PayoutListQuery {
    pub status: Option<PayoutStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}
