/// Transfer pipeline for building, proving and submitting transactions
pub mod builder;
/// Fee estimation on top of the planner
pub mod fees;
/// Greedy multi-part transaction planner
pub mod planner;

pub use builder::{JobPollConfig, TransferError, TransferPipeline};
pub use fees::{FeeEstimate, estimate_fee, max_available_transfer};
pub use planner::{TxPart, plan_parts};
