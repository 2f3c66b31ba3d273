pub mod batcher;
pub mod scheduler;
pub mod settlement;

pub use batcher::{PayoutBatcher, PayoutRunSummary};
pub use settlement::SettlementService;
