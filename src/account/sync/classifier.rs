//! Splits raw commitment log entries into mined and pending transactions.

use crate::account::types::{PoolParams, SyncError};
use crate::crypto::IndexedTx;

use std::collections::HashMap;

const MINED_FLAG: u8 = b'1';
const PENDING_FLAG: u8 = b'0';
const HASH_END: usize = 1 + 64;
const COMMITMENT_END: usize = HASH_END + 64;

/// One fetched batch split by confirmation status, keyed back to the log.
#[derive(Debug, Default)]
pub struct ClassifiedBatch {
	pub mined: Vec<IndexedTx>,
	pub pending: Vec<IndexedTx>,
	/// Transaction hash per log index, for joining onto decrypted memos.
	pub tx_hashes: HashMap<u64, String>,
}

impl ClassifiedBatch {
	pub fn is_empty(&self) -> bool {
		self.mined.is_empty() && self.pending.is_empty()
	}

	pub fn max_mined_index(&self) -> Option<u64> {
		self.mined.iter().map(|tx| tx.index).max()
	}

	pub fn max_pending_index(&self) -> Option<u64> {
		self.pending.iter().map(|tx| tx.index).max()
	}
}

/// Parse the entries of one batch fetched at `batch_offset`.
///
/// The i-th entry of a batch sits at log index `batch_offset + i * stride`,
/// where the stride reserves one leaf per output plus one for the
/// transaction itself. Returns an error naming the offending index if an
/// entry is shorter than its fixed-width header or not valid hex.
pub fn classify_batch(
	batch_offset: u64,
	entries: &[String],
	params: &PoolParams,
) -> Result<ClassifiedBatch, SyncError> {
	let stride = params.index_stride();
	let mut batch = ClassifiedBatch::default();

	for (position, entry) in entries.iter().enumerate() {
		let index = batch_offset + position as u64 * stride;
		let tx = parse_entry(index, entry)?;
		batch.tx_hashes.insert(index, tx.hash.clone());
		if tx.mined {
			batch.mined.push(tx.inner);
		} else {
			batch.pending.push(tx.inner);
		}
	}

	Ok(batch)
}

struct ParsedEntry {
	mined: bool,
	hash: String,
	inner: IndexedTx,
}

fn parse_entry(index: u64, entry: &str) -> Result<ParsedEntry, SyncError> {
	let raw = entry.as_bytes();
	if raw.len() < COMMITMENT_END {
		return Err(SyncError::Entry {
			index,
			reason: format!("Entry too short: {} bytes", raw.len()),
		});
	}

	let mined = match raw[0] {
		MINED_FLAG => true,
		PENDING_FLAG => false,
		other => {
			return Err(SyncError::Entry {
				index,
				reason: format!("Unknown mined flag {:?}", other as char),
			});
		}
	};

	let hash_bytes = hex::decode(&raw[1..HASH_END]).map_err(|e| SyncError::Entry {
		index,
		reason: format!("Bad transaction hash: {e}"),
	})?;
	let commitment_bytes =
		hex::decode(&raw[HASH_END..COMMITMENT_END]).map_err(|e| SyncError::Entry {
			index,
			reason: format!("Bad commitment: {e}"),
		})?;
	let memo = hex::decode(&raw[COMMITMENT_END..]).map_err(|e| SyncError::Entry {
		index,
		reason: format!("Bad memo payload: {e}"),
	})?;

	let mut commitment = [0u8; 32];
	commitment.copy_from_slice(&commitment_bytes);

	Ok(ParsedEntry {
		mined,
		hash: format!("0x{}", hex::encode(&hash_bytes)),
		inner: IndexedTx {
			index,
			memo,
			commitment,
		},
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	fn entry(mined: bool, seed: u8, memo: &[u8]) -> String {
		let flag = if mined { '1' } else { '0' };
		let hash = [seed; 32];
		let commitment = [seed.wrapping_add(1); 32];
		format!(
			"{flag}{}{}{}",
			hex::encode(hash),
			hex::encode(commitment),
			hex::encode(memo)
		)
	}

	#[test]
	fn entries_land_at_stride_spaced_indexes() {
		let params = PoolParams::default();
		let entries = vec![
			entry(true, 0xaa, b"first"),
			entry(true, 0xbb, b"second"),
			entry(false, 0xcc, b"third"),
		];

		let batch = classify_batch(256, &entries, &params).unwrap();
		let stride = params.index_stride();

		assert_eq!(
			batch.mined.iter().map(|tx| tx.index).collect::<Vec<_>>(),
			vec![256, 256 + stride]
		);
		assert_eq!(batch.pending[0].index, 256 + 2 * stride);
		assert_eq!(batch.max_mined_index(), Some(256 + stride));
		assert_eq!(batch.max_pending_index(), Some(256 + 2 * stride));
	}

	#[test]
	fn hash_is_joined_per_index() {
		let params = PoolParams::default();
		let entries = vec![entry(true, 0x11, b"memo")];

		let batch = classify_batch(0, &entries, &params).unwrap();

		assert_eq!(
			batch.tx_hashes.get(&0).map(String::as_str),
			Some(format!("0x{}", hex::encode([0x11u8; 32])).as_str())
		);
	}

	#[test]
	fn commitment_and_memo_are_decoded() {
		let params = PoolParams::default();
		let entries = vec![entry(false, 0x42, b"payload")];

		let batch = classify_batch(0, &entries, &params).unwrap();

		assert_eq!(batch.pending[0].commitment, [0x43; 32]);
		assert_eq!(batch.pending[0].memo, b"payload");
	}

	#[test]
	fn empty_memo_is_allowed() {
		let params = PoolParams::default();
		let entries = vec![entry(true, 0x01, b"")];

		let batch = classify_batch(0, &entries, &params).unwrap();

		assert!(batch.mined[0].memo.is_empty());
	}

	#[test]
	fn malformed_entries_name_their_index() {
		let params = PoolParams::default();
		let stride = params.index_stride();

		let short = classify_batch(0, &[String::from("1abc")], &params).unwrap_err();
		assert!(matches!(short, SyncError::Entry { index: 0, .. }));

		let bad_flag = classify_batch(0, &[entry(true, 0, b"x").replacen('1', "7", 1)], &params)
			.unwrap_err();
		assert!(matches!(bad_flag, SyncError::Entry { index: 0, .. }));

		let mut entries = vec![entry(true, 0, b"ok")];
		entries.push(format!("1{}", "z".repeat(128)));
		let bad_hex = classify_batch(512, &entries, &params).unwrap_err();
		assert!(matches!(bad_hex, SyncError::Entry { index, .. } if index == 512 + stride));
	}
}
