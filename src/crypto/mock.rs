//! Deterministic capability double.
//!
//! Implements [`PoolCrypto`] without any real cryptography: memos are
//! bincode-encoded plaintext structs tagged with a short owner tag derived
//! from the account key, and proofs are byte strings bound to their public
//! inputs. This is what the engine's tests and the demo binary run against;
//! a production deployment substitutes the real proving stack behind the same
//! trait.

use super::{
    CryptoError, DecryptedBatch, DecryptedMemo, IndexedTx, OutgoingTx, PoolCrypto, Proof,
    ProofInputs, SecretInputs, VerifyingKey,
};
use crate::account::{AccountKey, Note, PoolAddress, PoolParams, RecordKind};
use crate::relayer::TxKind;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const PROOF_PREFIX: &[u8] = b"mock-proof:";
const MOCK_VK: &[u8] = b"mock-vk";

/// Plaintext memo layout used by the double.
///
/// A transfer memo carries both sides: the sender's updated account (matched
/// via `account_tag`) and the receiver's output note (matched via `note_tag`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoPlain {
    pub tx_kind: TxKind,
    pub account_tag: Option<[u8; 4]>,
    pub note_tag: Option<[u8; 4]>,
    pub amount: u128,
    pub fee: u128,
    pub new_balance: u128,
    pub note_value: u128,
    pub spent_notes: Vec<u64>,
}

/// Deterministic [`PoolCrypto`] implementation.
#[derive(Debug, Clone)]
pub struct MockPoolCrypto {
    stride: u64,
}

impl MockPoolCrypto {
    pub fn new(params: &PoolParams) -> Self {
        Self {
            stride: params.index_stride(),
        }
    }

    /// Receiving address for a key under the double's tag scheme.
    pub fn address_of(key: &AccountKey) -> PoolAddress {
        PoolAddress(Self::tag(key))
    }

    /// The verifying key all proofs from this double check against.
    pub fn verifying_key() -> VerifyingKey {
        VerifyingKey(MOCK_VK.to_vec())
    }

    fn tag(key: &AccountKey) -> [u8; 4] {
        let bytes = key.as_bytes();
        [bytes[0], bytes[1], bytes[2], bytes[3]]
    }

    /// Build a raw log entry in the layout the classifier consumes: mined
    /// flag, tx hash hex, commitment hex, memo hex. Fixture helper for tests
    /// and local relayer stubs.
    pub fn encode_entry(
        mined: bool,
        tx_hash: &[u8; 32],
        commitment: &[u8; 32],
        memo: &[u8],
    ) -> String {
        format!(
            "{}{}{}{}",
            if mined { '1' } else { '0' },
            hex::encode(tx_hash),
            hex::encode(commitment),
            hex::encode(memo),
        )
    }
}

#[async_trait]
impl PoolCrypto for MockPoolCrypto {
    async fn decrypt(
        &self,
        key: &AccountKey,
        txs: &[IndexedTx],
    ) -> Result<DecryptedBatch, CryptoError> {
        let tag = Self::tag(key);
        let mut batch = DecryptedBatch::default();

        for tx in txs {
            // Memos not addressed to this key are indistinguishable from
            // garbage, so undecodable payloads are skipped, not errors.
            let Ok(plain) = bincode::deserialize::<MemoPlain>(&tx.memo) else {
                continue;
            };

            if plain.account_tag == Some(tag) {
                let kind = match plain.tx_kind {
                    TxKind::Deposit => RecordKind::Deposit,
                    TxKind::Transfer => RecordKind::TransferOut,
                    TxKind::Withdraw => RecordKind::Withdrawal,
                };
                batch.memos.push(DecryptedMemo {
                    index: tx.index,
                    kind,
                    amount: plain.amount,
                    fee: plain.fee,
                    account_present: true,
                });
                batch.update.new_balance = Some(plain.new_balance);
                batch
                    .update
                    .spent_note_indexes
                    .extend(plain.spent_notes.iter().copied());
                // Self-transfer: the output note is ours as well.
                if plain.note_tag == Some(tag) {
                    batch.update.added_notes.push(Note {
                        index: tx.index + 1,
                        value: plain.note_value,
                    });
                }
                batch.update.next_index = batch.update.next_index.max(tx.index + self.stride);
            } else if plain.note_tag == Some(tag) {
                batch.memos.push(DecryptedMemo {
                    index: tx.index,
                    kind: RecordKind::TransferIn,
                    amount: plain.note_value,
                    fee: 0,
                    account_present: false,
                });
                batch.update.added_notes.push(Note {
                    index: tx.index + 1,
                    value: plain.note_value,
                });
                batch.update.next_index = batch.update.next_index.max(tx.index + self.stride);
            }
        }

        Ok(batch)
    }

    async fn encrypt(&self, key: &AccountKey, tx: &OutgoingTx) -> Result<Vec<u8>, CryptoError> {
        let plain = MemoPlain {
            tx_kind: tx.kind,
            account_tag: Some(Self::tag(key)),
            note_tag: tx.to.map(|addr| addr.0),
            amount: tx.amount,
            fee: tx.fee,
            new_balance: tx.new_balance,
            note_value: tx.amount,
            spent_notes: tx.spent_notes.clone(),
        };
        bincode::serialize(&plain).map_err(|e| CryptoError::Decode(e.to_string()))
    }

    async fn prove(
        &self,
        public: &ProofInputs,
        _secret: &SecretInputs,
    ) -> Result<Proof, CryptoError> {
        // The double binds proofs to their public inputs only.
        let mut bytes = PROOF_PREFIX.to_vec();
        bytes.extend_from_slice(&public.0);
        Ok(Proof(bytes))
    }

    async fn verify(
        &self,
        vk: &VerifyingKey,
        public: &ProofInputs,
        proof: &Proof,
    ) -> Result<bool, CryptoError> {
        if vk.0 != MOCK_VK {
            return Ok(false);
        }
        let Some(body) = proof.0.strip_prefix(PROOF_PREFIX) else {
            return Ok(false);
        };
        Ok(body == public.0)
    }
}
