//! Local account state derived from the confirmed commitment log.

use crate::account::Note;
use crate::crypto::StateUpdate;

/// Confirmed view of one pool account.
///
/// Mutated only by applying deltas derived from mined memos; the sync
/// coordinator is the sole writer. `usable_notes` is kept in ascending index
/// order, which is the canonical spend order the planner relies on.
#[derive(Debug, Clone, Default)]
pub struct AccountState {
	/// Next unused log index; the cursor the next sync cycle resumes from.
	pub next_tree_index: u64,
	pub usable_notes: Vec<Note>,
	pub balance: u128,
}

impl AccountState {
	pub fn new() -> Self {
		Self::default()
	}

	/// Apply a mined-memo state delta.
	pub fn apply(&mut self, update: StateUpdate) {
		self.next_tree_index = self.next_tree_index.max(update.next_index);

		if let Some(balance) = update.new_balance {
			self.balance = balance;
		}

		if !update.spent_note_indexes.is_empty() {
			self.usable_notes
				.retain(|note| !update.spent_note_indexes.contains(&note.index));
		}

		for note in update.added_notes {
			if !self.usable_notes.iter().any(|n| n.index == note.index) {
				self.usable_notes.push(note);
			}
		}
		self.usable_notes.sort_by_key(|note| note.index);
	}

	/// Move the cursor forward past entries the cycle has fully consumed.
	/// Never moves backwards.
	pub fn advance_to(&mut self, index: u64) {
		self.next_tree_index = self.next_tree_index.max(index);
	}

	/// Sum of all spendable note values.
	pub fn total_note_value(&self) -> u128 {
		self.usable_notes
			.iter()
			.fold(0u128, |acc, note| acc.saturating_add(note.value))
	}

	/// Copy of the planner inputs as of the last completed sync.
	pub fn snapshot(&self) -> (Vec<Note>, u128) {
		(self.usable_notes.clone(), self.balance)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn note(index: u64, value: u128) -> Note {
		Note { index, value }
	}

	#[test]
	fn apply_inserts_notes_in_canonical_order() {
		let mut state = AccountState::new();
		state.apply(StateUpdate {
			next_index: 384,
			new_balance: Some(100),
			added_notes: vec![note(257, 30), note(129, 20)],
			spent_note_indexes: vec![],
		});

		assert_eq!(state.balance, 100);
		assert_eq!(state.usable_notes, vec![note(129, 20), note(257, 30)]);
		assert_eq!(state.next_tree_index, 384);
	}

	#[test]
	fn apply_removes_spent_and_dedupes_added() {
		let mut state = AccountState::new();
		state.usable_notes = vec![note(1, 10), note(5, 50)];

		state.apply(StateUpdate {
			next_index: 0,
			new_balance: None,
			added_notes: vec![note(5, 50), note(9, 90)],
			spent_note_indexes: vec![1],
		});

		assert_eq!(state.usable_notes, vec![note(5, 50), note(9, 90)]);
	}

	#[test]
	fn cursor_never_decreases() {
		let mut state = AccountState::new();
		state.advance_to(512);
		state.apply(StateUpdate {
			next_index: 256,
			new_balance: None,
			added_notes: vec![],
			spent_note_indexes: vec![],
		});
		state.advance_to(128);

		assert_eq!(state.next_tree_index, 512);
	}

	#[test]
	fn note_total_saturates_instead_of_overflowing() {
		let mut state = AccountState::new();
		state.usable_notes = vec![note(1, u128::MAX), note(2, 5)];
		assert_eq!(state.total_note_value(), u128::MAX);
	}
}
