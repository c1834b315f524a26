//! Greedy multi-part transaction planner.
//!
//! Decomposes a requested amount into an ordered sequence of elementary
//! transactions, each bounded by the pool's input limit. Planning is
//! all-or-nothing: an empty plan means the request cannot be serviced.

use crate::account::{Note, PoolParams};

use tracing::debug;

/// One elementary transaction as laid out by the planner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxPart {
    /// Value this part delivers toward the requested total.
    pub amount: u128,
    /// Relayer fee charged for this part alone.
    pub fee: u128,
    /// Account-side funds available to this part: the confirmed balance for
    /// the first part, the previous part's leftover afterwards.
    pub account_limit: u128,
}

/// Plan an ordered list of parts covering `target`.
///
/// The account counts as one input of every transaction, so each part spends
/// at most `max_spend_inputs - 1` notes in their stored order. A running pool
/// starts at the account balance; each part's leftover carries forward as the
/// next part's account contribution. The final part is clamped to the exact
/// remaining amount. Returns an empty list when the funds cannot cover
/// `target` plus the per-part fees, never a partial plan.
pub fn plan_parts(
    target: u128,
    fee_per_tx: u128,
    notes: &[Note],
    balance: u128,
    params: &PoolParams,
) -> Vec<TxPart> {
    if balance >= target.saturating_add(fee_per_tx) {
        return vec![TxPart {
            amount: target,
            fee: fee_per_tx,
            account_limit: balance,
        }];
    }

    let notes_per_part = params.max_spend_inputs.saturating_sub(1);
    if notes_per_part == 0 {
        return Vec::new();
    }

    let mut parts = Vec::new();
    let mut remaining = target;
    let mut carry = balance;

    for chunk in notes.chunks(notes_per_part) {
        if remaining == 0 {
            break;
        }

        let chunk_value = chunk
            .iter()
            .fold(0u128, |acc, note| acc.saturating_add(note.value));
        let pool = carry.saturating_add(chunk_value);

        if pool < fee_per_tx || pool < params.min_tx_amount {
            debug!(
                "Pool {} cannot fund a part (fee {}, floor {})",
                pool, fee_per_tx, params.min_tx_amount
            );
            return Vec::new();
        }

        let spendable = pool - fee_per_tx;
        let amount = spendable.min(remaining);
        parts.push(TxPart {
            amount,
            fee: fee_per_tx,
            account_limit: carry,
        });
        remaining -= amount;
        carry = pool - amount - fee_per_tx;
    }

    if remaining > 0 {
        debug!("Notes exhausted with {} still unserved", remaining);
        return Vec::new();
    }

    parts
}
