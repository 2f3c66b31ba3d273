pub mod splitter;

pub use splitter::{DistributionOutcome, DistributionSplitter, UnattributedReason};
