//! Client engine for a shielded pool: commitment log reconciliation, account
//! state and history, and multi-part transfer planning and submission.
//!
//! The engine talks to a relayer over HTTP, feeds fetched log entries through
//! an injected crypto capability and folds the results into a [`account::PoolContext`].
//! Transfers are planned against the reconciled state and submitted back
//! through the relayer.

pub mod account;
pub mod crypto;
pub mod relayer;
pub mod transfer;
pub mod utils;

pub use account::{
	AccountKey, AccountState, Note, PoolAddress, PoolContext, PoolParams, SyncConfig,
	SyncCoordinator,
};
pub use crypto::{MockPoolCrypto, PoolCrypto};
pub use relayer::{RelayerApi, RelayerClient};
pub use transfer::{TransferError, TransferPipeline};
