//! Index-keyed history of deposits, transfers and withdrawals.

use crate::account::RecordKind;

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};

/// One observed transaction from the owner's perspective.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRecord {
	pub kind: RecordKind,
	pub amount: u128,
	pub fee: u128,
	pub pending: bool,
	pub tx_hash: String,
	pub index: u64,
	/// First time this transaction was observed; confirmation keeps it.
	pub timestamp: DateTime<Utc>,
}

/// Ledger of history records keyed by commitment log index.
#[derive(Debug, Clone, Default)]
pub struct HistoryLedger {
	records: BTreeMap<u64, HistoryRecord>,
}

impl HistoryLedger {
	pub fn new() -> Self {
		Self::default()
	}

	/// Insert a record at its log index.
	///
	/// A confirmed record supersedes a pending one at the same index (keeping
	/// the original observation timestamp); a pending record never replaces a
	/// confirmed one. Re-appending a pending record refreshes its data.
	pub fn append(&mut self, mut record: HistoryRecord) {
		match self.records.get(&record.index) {
			Some(existing) if !existing.pending => {}
			Some(existing) => {
				record.timestamp = existing.timestamp;
				self.records.insert(record.index, record);
			}
			None => {
				self.records.insert(record.index, record);
			}
		}
	}

	/// Flip the record at `index` to confirmed in place.
	pub fn mark_confirmed(&mut self, index: u64) -> bool {
		match self.records.get_mut(&index) {
			Some(record) => {
				record.pending = false;
				true
			}
			None => false,
		}
	}

	/// Drop pending records superseded by confirmation (index at or below the
	/// mined frontier) and pending records that went stale (not reaffirmed by
	/// the cycle and beyond the pending frontier it observed).
	pub fn trim_stale(
		&mut self,
		max_mined_index: Option<u64>,
		max_pending_index: Option<u64>,
		reaffirmed: &HashSet<u64>,
	) {
		self.records.retain(|&index, record| {
			if !record.pending {
				return true;
			}
			if max_mined_index.is_some_and(|mined| index <= mined) {
				return false;
			}
			let beyond_pending = max_pending_index.is_none_or(|pending| index > pending);
			!(beyond_pending && !reaffirmed.contains(&index))
		});
	}

	/// Confirmed balance adjusted by pending traffic: incoming pending amounts
	/// are added, outgoing pending amounts and their fees subtracted.
	pub fn optimistic_balance(&self, confirmed_balance: u128) -> u128 {
		self.records
			.values()
			.filter(|record| record.pending)
			.fold(confirmed_balance, |acc, record| {
				if record.kind.is_incoming() {
					acc.saturating_add(record.amount)
				} else {
					acc.saturating_sub(record.amount.saturating_add(record.fee))
				}
			})
	}

	pub fn records(&self) -> impl Iterator<Item = &HistoryRecord> {
		self.records.values()
	}

	pub fn len(&self) -> usize {
		self.records.len()
	}

	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}
}
