pub mod history;
pub mod state;
pub mod sync;
pub mod types;

pub use history::{HistoryLedger, HistoryRecord};
pub use state::AccountState;
pub use sync::{OPTIMISTIC_INDEX_OFFSET, SyncConfig, SyncCoordinator};
pub use types::*;

use rand::Rng;
use std::sync::{Arc, Mutex};

/// Fresh random account key, hex-encoded.
pub fn generate_random_key() -> String {
	let mut key = [0u8; 32];
	rand::rng().fill(&mut key);
	hex::encode(key)
}

/// Everything one client owns for one shielded pool asset: parameters, the
/// account key, the confirmed state and the transaction history. Shared
/// between the sync coordinator (the only mutator) and readers.
pub struct PoolContext {
	pub params: PoolParams,
	pub key: AccountKey,
	pub state: Mutex<AccountState>,
	pub history: Mutex<HistoryLedger>,
}

impl PoolContext {
	pub fn new(params: PoolParams, key: AccountKey) -> Arc<Self> {
		Arc::new(Self {
			params,
			key,
			state: Mutex::new(AccountState::default()),
			history: Mutex::new(HistoryLedger::new()),
		})
	}

	/// Confirmed balance as of the last completed sync.
	pub fn confirmed_balance(&self) -> u128 {
		self.state.lock().unwrap().balance
	}

	/// Confirmed balance adjusted by pending history records.
	pub fn optimistic_balance(&self) -> u128 {
		let confirmed = self.confirmed_balance();
		self.history.lock().unwrap().optimistic_balance(confirmed)
	}
}
