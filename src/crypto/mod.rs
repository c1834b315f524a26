//!
//! Injected cryptographic capability for the shielded pool.
//!
//! The reconciliation engine never performs cryptography itself; it consumes a
//! narrow capability that can open memos addressed to an account key, seal
//! outgoing memos, and produce/check zero-knowledge proofs. Implementations
//! are interchangeable, so the engine runs identically against real proving
//! infrastructure and against the deterministic double in [`mock`].

pub mod mock;

pub use mock::MockPoolCrypto;

use crate::account::{AccountKey, Note, PoolAddress, RecordKind};
use crate::relayer::TxKind;

use async_trait::async_trait;

/// One log entry handed to the capability for decryption.
#[derive(Debug, Clone)]
pub struct IndexedTx {
    pub index: u64,
    pub memo: Vec<u8>,
    pub commitment: [u8; 32],
}

/// A memo successfully opened with the owner's key.
///
/// The transaction hash is not part of this type: the capability only sees
/// cryptographic material, and the coordinator joins the hash back in from the
/// classified entry at the same index.
#[derive(Debug, Clone)]
pub struct DecryptedMemo {
    pub index: u64,
    pub kind: RecordKind,
    pub amount: u128,
    pub fee: u128,
    /// Set when the owner's account itself participates in the transaction
    /// (any self-originated spend or deposit, as opposed to a received note).
    pub account_present: bool,
}

/// State delta derived from mined memos, applied to the account store.
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    /// Lowest log index still unused after this delta.
    pub next_index: u64,
    /// Replacement confirmed balance, when the owner's account was updated.
    pub new_balance: Option<u128>,
    /// Notes newly addressed to the owner.
    pub added_notes: Vec<Note>,
    /// Indexes of owner notes consumed by confirmed spends.
    pub spent_note_indexes: Vec<u64>,
}

/// Result of one decryption call: the memos that belong to the owner plus the
/// accumulated state delta.
#[derive(Debug, Clone, Default)]
pub struct DecryptedBatch {
    pub memos: Vec<DecryptedMemo>,
    pub update: StateUpdate,
}

/// Plaintext description of an outgoing transaction, sealed into memo bytes
/// by the capability before submission.
#[derive(Debug, Clone)]
pub struct OutgoingTx {
    pub kind: TxKind,
    pub to: Option<PoolAddress>,
    pub amount: u128,
    pub fee: u128,
    /// Owner balance after this transaction is applied.
    pub new_balance: u128,
    /// Owner note indexes consumed by this transaction.
    pub spent_notes: Vec<u64>,
}

/// Serialized public inputs of one elementary transaction proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofInputs(pub Vec<u8>);

/// Serialized secret witness of one elementary transaction proof.
#[derive(Debug, Clone)]
pub struct SecretInputs(pub Vec<u8>);

/// Opaque verifying key for transaction proofs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyingKey(pub Vec<u8>);

/// Opaque transaction proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proof(pub Vec<u8>);

/// Error types for capability operations
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("Memo encode/decode error: {0}")]
    Decode(String),

    #[error("Proving error: {0}")]
    Prove(String),

    #[error("Verification error: {0}")]
    Verify(String),
}

/// Cryptographic capability consumed by the reconciliation engine.
///
/// `decrypt` and `encrypt` are inverses over the owner's memos; `prove` and
/// `verify` cover the proof lifecycle of outgoing transactions. All methods
/// are async so remote proving services can implement this directly.
#[async_trait]
pub trait PoolCrypto: Send + Sync {
    /// Open every memo in `txs` addressed to `key`, returning the owned memos
    /// and the state delta they imply.
    async fn decrypt(
        &self,
        key: &AccountKey,
        txs: &[IndexedTx],
    ) -> Result<DecryptedBatch, CryptoError>;

    /// Seal an outgoing transaction into opaque memo bytes.
    async fn encrypt(&self, key: &AccountKey, tx: &OutgoingTx) -> Result<Vec<u8>, CryptoError>;

    /// Produce a proof for one elementary transaction.
    async fn prove(
        &self,
        public: &ProofInputs,
        secret: &SecretInputs,
    ) -> Result<Proof, CryptoError>;

    /// Check a proof against its public inputs.
    async fn verify(
        &self,
        vk: &VerifyingKey,
        public: &ProofInputs,
        proof: &Proof,
    ) -> Result<bool, CryptoError>;
}
