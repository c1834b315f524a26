use crate::crypto::CryptoError;
use crate::relayer::RelayerError;

use serde::{Deserialize, Serialize};

/// A spendable note owned by the account, pinned to its commitment log index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
	pub index: u64,
	pub value: u128,
}

/// Direction/kind of a history record as seen by the account owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordKind {
	Deposit,
	Withdrawal,
	TransferIn,
	TransferOut,
}

impl RecordKind {
	/// Whether records of this kind add value to the account.
	pub fn is_incoming(&self) -> bool {
		matches!(self, RecordKind::Deposit | RecordKind::TransferIn)
	}
}

/// Protocol parameters of the shielded pool this client talks to.
#[derive(Debug, Clone)]
pub struct PoolParams {
	/// Output slots per transaction; the log index stride is this plus one
	/// (one slot for the updated account).
	pub outputs_per_tx: u64,
	/// Maximum spendable inputs per elementary transaction. The spender's
	/// account occupies one of these slots.
	pub max_spend_inputs: usize,
	/// Protocol floor for a single transferable amount.
	pub min_tx_amount: u128,
	/// Per-transaction amount cap enforced before planning.
	pub max_tx_amount: u128,
	/// Fee the relayer charges per elementary transaction.
	pub relayer_fee: u128,
	/// Decimal places of the pool's denominated token unit.
	pub token_decimals: u32,
}

impl PoolParams {
	/// Log index distance between consecutive entries.
	pub fn index_stride(&self) -> u64 {
		self.outputs_per_tx + 1
	}
}

impl Default for PoolParams {
	fn default() -> Self {
		Self {
			outputs_per_tx: 127,
			max_spend_inputs: 8,
			min_tx_amount: 50,
			max_tx_amount: u128::MAX,
			relayer_fee: 100,
			token_decimals: 9,
		}
	}
}

/// Secret spending key of one pool account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountKey(pub [u8; 32]);

impl AccountKey {
	/// Parse a key from a 64-character hex string.
	pub fn from_hex(s: &str) -> Option<Self> {
		let bytes = hex::decode(s).ok()?;
		let bytes: [u8; 32] = bytes.try_into().ok()?;
		Some(Self(bytes))
	}

	pub fn as_bytes(&self) -> &[u8; 32] {
		&self.0
	}
}

/// Public receiving address of a pool account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolAddress(pub [u8; 4]);

/// Error types for the reconciliation cycle.
///
/// `Clone` so that the outcome of one in-flight cycle can be handed to every
/// caller awaiting the same single-flight future; lower-level causes are
/// captured as strings at this boundary.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SyncError {
	#[error("Relayer request failed: {0}")]
	Network(String),

	#[error("Malformed log entry at index {index}: {reason}")]
	Entry { index: u64, reason: String },

	#[error("Memo decryption failed: {0}")]
	Decrypt(String),

	#[error("State invariant violated: {0}")]
	Internal(String),
}

impl From<RelayerError> for SyncError {
	fn from(err: RelayerError) -> Self {
		SyncError::Network(err.to_string())
	}
}

impl From<CryptoError> for SyncError {
	fn from(err: CryptoError) -> Self {
		SyncError::Decrypt(err.to_string())
	}
}
