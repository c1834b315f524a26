//! Fee estimation on top of the planner.

use crate::account::{Note, PoolParams};
use crate::relayer::TxKind;
use crate::transfer::builder::TransferError;
use crate::transfer::planner::plan_parts;

/// Total relaying cost of a prospective transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeEstimate {
    /// Fee summed across every part.
    pub total: u128,
    /// Fee charged per part.
    pub per_part: u128,
    /// Number of elementary transactions the amount decomposes into.
    pub parts: usize,
}

/// Estimate the total fee for moving `amount` out of the account.
///
/// Transfer and withdrawal amounts are run through the planner against the
/// supplied note/balance snapshot; deposits are always a single part.
///
/// # Errors
///
/// `TransferError::InsufficientFunds` when the planner cannot cover the
/// amount plus its fees.
pub fn estimate_fee(
    kind: TxKind,
    amount: u128,
    notes: &[Note],
    balance: u128,
    params: &PoolParams,
) -> Result<FeeEstimate, TransferError> {
    let per_part = params.relayer_fee;

    let parts = match kind {
        TxKind::Deposit => 1,
        TxKind::Transfer | TxKind::Withdraw => {
            let plan = plan_parts(amount, per_part, notes, balance, params);
            if plan.is_empty() {
                return Err(TransferError::InsufficientFunds {
                    requested: amount,
                    available: max_available_transfer(notes, balance, params),
                });
            }
            plan.len()
        }
    };

    Ok(FeeEstimate {
        total: per_part.saturating_mul(parts as u128),
        per_part,
        parts,
    })
}

/// Upper bound on the amount a transfer can deliver from the given snapshot:
/// everything the account holds, minus the fee of each part the note count
/// implies. Part count here is an estimate, not a plan.
pub fn max_available_transfer(notes: &[Note], balance: u128, params: &PoolParams) -> u128 {
    if params.max_spend_inputs == 0 {
        return 0;
    }
    let max_inputs = params.max_spend_inputs as u64;
    let surplus_notes = (notes.len() as u64).saturating_sub(max_inputs);
    let estimated_parts = 1 + surplus_notes.div_ceil(max_inputs);

    let note_total = notes
        .iter()
        .fold(0u128, |acc, note| acc.saturating_add(note.value));
    let fees = params.relayer_fee.saturating_mul(estimated_parts as u128);

    balance.saturating_add(note_total).saturating_sub(fees)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notes(values: &[u128]) -> Vec<Note> {
        values
            .iter()
            .enumerate()
            .map(|(i, &value)| Note {
                index: (i as u64 + 1) * 128,
                value,
            })
            .collect()
    }

    fn params(max_spend_inputs: usize, relayer_fee: u128) -> PoolParams {
        PoolParams {
            max_spend_inputs,
            relayer_fee,
            min_tx_amount: 1,
            ..PoolParams::default()
        }
    }

    #[test]
    fn transfer_fee_scales_with_part_count() {
        let estimate = estimate_fee(
            TxKind::Transfer,
            250,
            &notes(&[100, 100, 100, 100, 100]),
            0,
            &params(3, 10),
        )
        .unwrap();

        assert_eq!(estimate.parts, 2);
        assert_eq!(estimate.per_part, 10);
        assert_eq!(estimate.total, 20);
    }

    #[test]
    fn deposit_fee_is_single_part() {
        let estimate = estimate_fee(TxKind::Deposit, 1_000_000, &[], 0, &params(3, 7)).unwrap();
        assert_eq!(estimate.total, 7);
        assert_eq!(estimate.parts, 1);
    }

    #[test]
    fn infeasible_amount_surfaces_typed_error() {
        let err = estimate_fee(TxKind::Withdraw, 10_000, &notes(&[100]), 0, &params(3, 10))
            .unwrap_err();

        match err {
            TransferError::InsufficientFunds {
                requested,
                available,
            } => {
                assert_eq!(requested, 10_000);
                assert_eq!(available, 90);
            }
            other => panic!("expected InsufficientFunds, got {other:?}"),
        }
    }

    #[test]
    fn max_available_covers_single_and_multi_part_shapes() {
        // Within one part: everything minus one fee.
        assert_eq!(
            max_available_transfer(&notes(&[100, 100]), 50, &params(3, 10)),
            240
        );
        // Seven notes over a three-input limit: 1 + ceil(4 / 3) = 3 parts.
        assert_eq!(
            max_available_transfer(&notes(&[100; 7]), 0, &params(3, 10)),
            700 - 30
        );
        // Fees can swallow the whole balance.
        assert_eq!(max_available_transfer(&notes(&[5]), 0, &params(3, 10)), 0);
    }
}
