//! Shielded transfer pipeline
//!
//! This module builds, proves and submits elementary transactions planned by
//! the part planner. A locally produced proof that fails verification aborts
//! the whole attempt before anything reaches the relayer.

use crate::account::{Note, PoolAddress, PoolContext, SyncError};
use crate::crypto::{CryptoError, OutgoingTx, PoolCrypto, ProofInputs, SecretInputs, VerifyingKey};
use crate::relayer::{JobState, RelayerApi, RelayerError, TxKind, TxToSend};
use crate::transfer::fees::max_available_transfer;
use crate::transfer::planner::{TxPart, plan_parts};

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransferError {
	#[error("Amount {amount} is below the protocol minimum {min}")]
	AmountBelowFloor { amount: u128, min: u128 },

	#[error("Amount {amount} exceeds the protocol limit {limit}")]
	AmountExceedsLimit { amount: u128, limit: u128 },

	#[error("Insufficient funds: requested {requested}, available {available}")]
	InsufficientFunds { requested: u128, available: u128 },

	#[error("Locally produced proof failed verification, submission aborted")]
	ProofRejected,

	#[error("Relayer job {id} failed: {reason}")]
	JobFailed { id: String, reason: String },

	#[error("Job id {0} is unknown to the relayer")]
	JobNotFound(String),

	#[error("Relayer error: {0}")]
	Relayer(#[from] RelayerError),

	#[error("Crypto error: {0}")]
	Crypto(#[from] CryptoError),

	#[error("Input encoding error: {0}")]
	Encode(#[from] bincode::Error),

	#[error("Sync error: {0}")]
	Sync(#[from] SyncError),
}

/// How submission jobs are polled after a send.
#[derive(Debug, Clone)]
pub struct JobPollConfig {
	pub interval: Duration,
	pub max_attempts: u32,
}

impl Default for JobPollConfig {
	fn default() -> Self {
		Self {
			interval: Duration::from_secs(2),
			max_attempts: 30,
		}
	}
}

/// Public statement each part's proof commits to.
#[derive(Serialize)]
struct PartStatement<'a> {
	root: &'a str,
	amount: u128,
	fee: u128,
	spent_notes: &'a [u64],
}

/// Builds, proves, verifies and submits planned transactions.
pub struct TransferPipeline<R, C> {
	relayer: Arc<R>,
	crypto: Arc<C>,
	context: Arc<PoolContext>,
	verifying_key: VerifyingKey,
	poll: JobPollConfig,
}

impl<R, C> TransferPipeline<R, C>
where
	R: RelayerApi,
	C: PoolCrypto,
{
	pub fn new(
		relayer: Arc<R>,
		crypto: Arc<C>,
		context: Arc<PoolContext>,
		verifying_key: VerifyingKey,
	) -> Self {
		Self {
			relayer,
			crypto,
			context,
			verifying_key,
			poll: JobPollConfig::default(),
		}
	}

	pub fn with_poll_config(mut self, poll: JobPollConfig) -> Self {
		self.poll = poll;
		self
	}

	/// Transfer `amount` to another pool address.
	///
	/// Plans the amount against the state snapshot of the last completed
	/// sync, proves every part, submits them as one relayer job and waits for
	/// the job to complete. Returns the mined transaction hashes.
	pub async fn transfer(
		&self,
		to: PoolAddress,
		amount: u128,
	) -> Result<Vec<String>, TransferError> {
		self.spend(TxKind::Transfer, Some(to), amount).await
	}

	/// Withdraw `amount` out of the pool back to the owner.
	pub async fn withdraw(&self, amount: u128) -> Result<Vec<String>, TransferError> {
		self.spend(TxKind::Withdraw, None, amount).await
	}

	/// Deposit `amount` into the pool. The caller supplies the signature
	/// authorizing the token movement; the relayer fee is taken out of the
	/// deposited amount.
	pub async fn deposit(
		&self,
		amount: u128,
		deposit_signature: String,
	) -> Result<Vec<String>, TransferError> {
		self.validate_amount(amount)?;
		let fee = self.context.params.relayer_fee;
		let balance = self.context.confirmed_balance();

		log::info!("Depositing {} (fee {})", amount, fee);

		let tx = OutgoingTx {
			kind: TxKind::Deposit,
			to: None,
			amount,
			fee,
			new_balance: balance.saturating_add(amount).saturating_sub(fee),
			spent_notes: vec![],
		};
		let root = self.relayer.info().await?.root;
		let mut sends = vec![self.seal(&tx, &root).await?];
		sends[0].deposit_signature = Some(deposit_signature);

		self.submit(sends).await
	}

	async fn spend(
		&self,
		kind: TxKind,
		to: Option<PoolAddress>,
		amount: u128,
	) -> Result<Vec<String>, TransferError> {
		self.validate_amount(amount)?;
		let params = &self.context.params;
		let fee = params.relayer_fee;
		let (notes, balance) = self.context.state.lock().unwrap().snapshot();

		let parts = plan_parts(amount, fee, &notes, balance, params);
		if parts.is_empty() {
			return Err(TransferError::InsufficientFunds {
				requested: amount,
				available: max_available_transfer(&notes, balance, params),
			});
		}
		log::info!(
			"Planned {:?} of {} as {} part(s), fee {} each",
			kind,
			amount,
			parts.len(),
			fee
		);

		let root = self.relayer.info().await?.root;
		let sends = self
			.build_parts(kind, to, &parts, &notes, balance, &root)
			.await?;

		self.submit(sends).await
	}

	/// Replay the planner's pool accounting over the note chunks, sealing and
	/// proving one transaction per part.
	async fn build_parts(
		&self,
		kind: TxKind,
		to: Option<PoolAddress>,
		parts: &[TxPart],
		notes: &[Note],
		balance: u128,
		root: &str,
	) -> Result<Vec<TxToSend>, TransferError> {
		let params = &self.context.params;
		let fee = params.relayer_fee;
		let single_from_balance =
			parts.len() == 1 && balance >= parts[0].amount.saturating_add(fee);
		let notes_per_part = params.max_spend_inputs.saturating_sub(1).max(1);

		let mut sends = Vec::with_capacity(parts.len());
		let mut carry = balance;
		let mut chunks = notes.chunks(notes_per_part);

		for (position, part) in parts.iter().enumerate() {
			let chunk: &[Note] = if single_from_balance {
				&[]
			} else {
				chunks.next().unwrap_or(&[])
			};
			let chunk_value = chunk
				.iter()
				.fold(0u128, |acc, note| acc.saturating_add(note.value));
			let pool = carry.saturating_add(chunk_value);
			let new_balance = pool - part.amount - part.fee;

			let tx = OutgoingTx {
				kind,
				to,
				amount: part.amount,
				fee: part.fee,
				new_balance,
				spent_notes: chunk.iter().map(|note| note.index).collect(),
			};
			log::debug!(
				"Part {}: amount {}, fee {}, {} note(s), account leftover {}",
				position,
				part.amount,
				part.fee,
				chunk.len(),
				new_balance
			);
			sends.push(self.seal(&tx, root).await?);
			carry = new_balance;
		}

		Ok(sends)
	}

	/// Encrypt, prove and locally verify one outgoing transaction.
	async fn seal(&self, tx: &OutgoingTx, root: &str) -> Result<TxToSend, TransferError> {
		let memo = self.crypto.encrypt(&self.context.key, tx).await?;

		let statement = PartStatement {
			root,
			amount: tx.amount,
			fee: tx.fee,
			spent_notes: &tx.spent_notes,
		};
		let public = ProofInputs(bincode::serialize(&statement)?);
		let secret = SecretInputs(bincode::serialize(self.context.key.as_bytes())?);

		let proof = self.crypto.prove(&public, &secret).await?;
		if !self.crypto.verify(&self.verifying_key, &public, &proof).await? {
			log::error!("Proof failed local verification, aborting submission");
			return Err(TransferError::ProofRejected);
		}

		Ok(TxToSend {
			tx_kind: tx.kind,
			memo: hex::encode(&memo),
			proof: hex::encode(&proof.0),
			deposit_signature: None,
		})
	}

	async fn submit(&self, sends: Vec<TxToSend>) -> Result<Vec<String>, TransferError> {
		let job_id = self.relayer.send_transactions(&sends).await?;
		log::info!("Submitted {} part(s) as job {}", sends.len(), job_id);
		self.wait_for_job(&job_id).await
	}

	async fn wait_for_job(&self, job_id: &str) -> Result<Vec<String>, TransferError> {
		for attempt in 1..=self.poll.max_attempts {
			let Some(status) = self.relayer.job(job_id).await? else {
				return Err(TransferError::JobNotFound(job_id.to_string()));
			};

			match status.state {
				JobState::Completed => {
					log::info!("Job {} completed: {:?}", job_id, status.tx_hashes);
					return Ok(status.tx_hashes);
				}
				JobState::Failed => {
					return Err(TransferError::JobFailed {
						id: job_id.to_string(),
						reason: status
							.failed_reason
							.unwrap_or_else(|| "no reason given".to_string()),
					});
				}
				JobState::Pending => {
					log::debug!(
						"Job {} still pending (attempt {}/{})",
						job_id,
						attempt,
						self.poll.max_attempts
					);
					if attempt < self.poll.max_attempts {
						tokio::time::sleep(self.poll.interval).await;
					}
				}
			}
		}

		Err(TransferError::JobFailed {
			id: job_id.to_string(),
			reason: format!("still pending after {} poll(s)", self.poll.max_attempts),
		})
	}

	fn validate_amount(&self, amount: u128) -> Result<(), TransferError> {
		let params = &self.context.params;
		if amount < params.min_tx_amount {
			return Err(TransferError::AmountBelowFloor {
				amount,
				min: params.min_tx_amount,
			});
		}
		if amount > params.max_tx_amount {
			return Err(TransferError::AmountExceedsLimit {
				amount,
				limit: params.max_tx_amount,
			});
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::account::{AccountKey, AccountState, PoolParams};
	use crate::crypto::{DecryptedBatch, IndexedTx, MockPoolCrypto, Proof};
	use crate::relayer::{JobStatus, RelayerInfo};

	use async_trait::async_trait;
	use std::collections::VecDeque;
	use std::sync::Mutex;

	struct SubmissionStub {
		sent: Mutex<Vec<Vec<TxToSend>>>,
		job_states: Mutex<VecDeque<Option<JobStatus>>>,
	}

	impl SubmissionStub {
		fn new(job_states: Vec<Option<JobStatus>>) -> Self {
			Self {
				sent: Mutex::new(Vec::new()),
				job_states: Mutex::new(job_states.into()),
			}
		}

		fn sent_parts(&self) -> Vec<TxToSend> {
			self.sent.lock().unwrap().concat()
		}

		fn completed(hashes: &[&str]) -> Option<JobStatus> {
			Some(JobStatus {
				state: JobState::Completed,
				tx_hashes: hashes.iter().map(|h| h.to_string()).collect(),
				failed_reason: None,
			})
		}
	}

	#[async_trait]
	impl RelayerApi for SubmissionStub {
		async fn fetch_transactions(
			&self,
			_offset: u64,
			_limit: u64,
		) -> Result<Vec<String>, RelayerError> {
			Ok(vec![])
		}

		async fn info(&self) -> Result<RelayerInfo, RelayerError> {
			Ok(RelayerInfo {
				root: "0xr00t".into(),
				delta_index: None,
			})
		}

		async fn send_transactions(&self, txs: &[TxToSend]) -> Result<String, RelayerError> {
			self.sent.lock().unwrap().push(txs.to_vec());
			Ok("job-7".into())
		}

		async fn job(&self, _id: &str) -> Result<Option<JobStatus>, RelayerError> {
			let mut states = self.job_states.lock().unwrap();
			match states.len() {
				0 => Ok(None),
				1 => Ok(states.front().cloned().flatten()),
				_ => Ok(states.pop_front().flatten()),
			}
		}
	}

	/// Capability whose proofs never verify.
	struct RejectingCrypto(MockPoolCrypto);

	#[async_trait]
	impl PoolCrypto for RejectingCrypto {
		async fn decrypt(
			&self,
			key: &AccountKey,
			txs: &[IndexedTx],
		) -> Result<DecryptedBatch, CryptoError> {
			self.0.decrypt(key, txs).await
		}

		async fn encrypt(&self, key: &AccountKey, tx: &OutgoingTx) -> Result<Vec<u8>, CryptoError> {
			self.0.encrypt(key, tx).await
		}

		async fn prove(
			&self,
			public: &ProofInputs,
			secret: &SecretInputs,
		) -> Result<Proof, CryptoError> {
			self.0.prove(public, secret).await
		}

		async fn verify(
			&self,
			_vk: &VerifyingKey,
			_public: &ProofInputs,
			_proof: &Proof,
		) -> Result<bool, CryptoError> {
			Ok(false)
		}
	}

	fn params() -> PoolParams {
		PoolParams {
			max_spend_inputs: 3,
			min_tx_amount: 50,
			relayer_fee: 10,
			..PoolParams::default()
		}
	}

	fn context_with(notes: &[(u64, u128)], balance: u128) -> Arc<PoolContext> {
		let context = PoolContext::new(params(), AccountKey([0x21; 32]));
		{
			let mut state = context.state.lock().unwrap();
			*state = AccountState {
				next_tree_index: notes.iter().map(|(i, _)| i + 1).max().unwrap_or(0),
				usable_notes: notes
					.iter()
					.map(|&(index, value)| Note { index, value })
					.collect(),
				balance,
			};
		}
		context
	}

	fn pipeline(
		relayer: Arc<SubmissionStub>,
		context: Arc<PoolContext>,
	) -> TransferPipeline<SubmissionStub, MockPoolCrypto> {
		TransferPipeline::new(
			relayer,
			Arc::new(MockPoolCrypto::new(&params())),
			context,
			MockPoolCrypto::verifying_key(),
		)
		.with_poll_config(JobPollConfig {
			interval: Duration::from_millis(1),
			max_attempts: 5,
		})
	}

	#[tokio::test]
	async fn multi_part_transfer_submits_every_part_in_one_job() {
		let relayer = Arc::new(SubmissionStub::new(vec![SubmissionStub::completed(&[
			"0xa", "0xb",
		])]));
		let context = context_with(
			&[(128, 100), (256, 100), (384, 100), (512, 100), (640, 100)],
			0,
		);
		let pipeline = pipeline(relayer.clone(), context);

		let hashes = pipeline
			.transfer(PoolAddress([1, 2, 3, 4]), 250)
			.await
			.unwrap();

		assert_eq!(hashes, vec!["0xa".to_string(), "0xb".to_string()]);
		let sent = relayer.sent_parts();
		assert_eq!(sent.len(), 2);
		assert_eq!(relayer.sent.lock().unwrap().len(), 1);
		for part in &sent {
			assert_eq!(part.tx_kind, TxKind::Transfer);
			assert!(part.deposit_signature.is_none());
			assert!(hex::decode(&part.memo).is_ok());
			assert!(hex::decode(&part.proof).is_ok());
		}
	}

	#[tokio::test]
	async fn rejected_proof_aborts_before_any_send() {
		let relayer = Arc::new(SubmissionStub::new(vec![SubmissionStub::completed(&[])]));
		let context = context_with(&[(128, 100), (256, 100)], 0);
		let pipeline = TransferPipeline::new(
			relayer.clone(),
			Arc::new(RejectingCrypto(MockPoolCrypto::new(&params()))),
			context,
			MockPoolCrypto::verifying_key(),
		);

		let err = pipeline
			.transfer(PoolAddress([1, 2, 3, 4]), 120)
			.await
			.unwrap_err();

		assert!(matches!(err, TransferError::ProofRejected));
		assert!(relayer.sent.lock().unwrap().is_empty());
	}

	#[tokio::test]
	async fn amounts_outside_protocol_bounds_are_rejected() {
		let relayer = Arc::new(SubmissionStub::new(vec![]));
		let context = context_with(&[], 10_000);
		let pipeline = pipeline(relayer, context);

		let low = pipeline.withdraw(10).await.unwrap_err();
		assert!(matches!(
			low,
			TransferError::AmountBelowFloor { amount: 10, min: 50 }
		));

		let context = {
			let mut p = params();
			p.max_tx_amount = 1_000;
			let context = PoolContext::new(p, AccountKey([0x21; 32]));
			context.state.lock().unwrap().balance = 10_000;
			context
		};
		let relayer = Arc::new(SubmissionStub::new(vec![]));
		let pipeline = TransferPipeline::new(
			relayer,
			Arc::new(MockPoolCrypto::new(&params())),
			context,
			MockPoolCrypto::verifying_key(),
		);
		let high = pipeline.withdraw(5_000).await.unwrap_err();
		assert!(matches!(
			high,
			TransferError::AmountExceedsLimit {
				amount: 5_000,
				limit: 1_000
			}
		));
	}

	#[tokio::test]
	async fn infeasible_plan_is_a_typed_insufficient_funds() {
		let relayer = Arc::new(SubmissionStub::new(vec![]));
		let context = context_with(&[(128, 60)], 0);
		let pipeline = pipeline(relayer.clone(), context);

		let err = pipeline
			.transfer(PoolAddress([1, 2, 3, 4]), 5_000)
			.await
			.unwrap_err();

		match err {
			TransferError::InsufficientFunds {
				requested,
				available,
			} => {
				assert_eq!(requested, 5_000);
				assert_eq!(available, 50);
			}
			other => panic!("expected InsufficientFunds, got {other:?}"),
		}
		assert!(relayer.sent.lock().unwrap().is_empty());
	}

	#[tokio::test]
	async fn job_failure_reason_and_unknown_job_are_surfaced() {
		let failed = Some(JobStatus {
			state: JobState::Failed,
			tx_hashes: vec![],
			failed_reason: Some("double spend".into()),
		});
		let relayer = Arc::new(SubmissionStub::new(vec![failed]));
		let context = context_with(&[], 10_000);
		let pipeline = pipeline(relayer, context);

		let err = pipeline.withdraw(500).await.unwrap_err();
		match err {
			TransferError::JobFailed { id, reason } => {
				assert_eq!(id, "job-7");
				assert_eq!(reason, "double spend");
			}
			other => panic!("expected JobFailed, got {other:?}"),
		}

		let relayer = Arc::new(SubmissionStub::new(vec![None]));
		let context = context_with(&[], 10_000);
		let pipeline = self::pipeline(relayer, context);
		let err = pipeline.withdraw(500).await.unwrap_err();
		assert!(matches!(err, TransferError::JobNotFound(id) if id == "job-7"));
	}

	#[tokio::test]
	async fn pending_job_completes_after_polling() {
		let pending = Some(JobStatus {
			state: JobState::Pending,
			tx_hashes: vec![],
			failed_reason: None,
		});
		let relayer = Arc::new(SubmissionStub::new(vec![
			pending.clone(),
			pending,
			SubmissionStub::completed(&["0xdone"]),
		]));
		let context = context_with(&[], 10_000);
		let pipeline = pipeline(relayer, context);

		let hashes = pipeline.withdraw(500).await.unwrap();
		assert_eq!(hashes, vec!["0xdone".to_string()]);
	}

	#[tokio::test]
	async fn deposit_is_single_part_and_carries_signature() {
		let relayer = Arc::new(SubmissionStub::new(vec![SubmissionStub::completed(&[
			"0xdep",
		])]));
		let context = context_with(&[], 0);
		let pipeline = pipeline(relayer.clone(), context);

		let hashes = pipeline.deposit(1_000, "0xsig".into()).await.unwrap();

		assert_eq!(hashes, vec!["0xdep".to_string()]);
		let sent = relayer.sent_parts();
		assert_eq!(sent.len(), 1);
		assert_eq!(sent[0].tx_kind, TxKind::Deposit);
		assert_eq!(sent[0].deposit_signature.as_deref(), Some("0xsig"));
	}
}
