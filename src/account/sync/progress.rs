//! Per-cycle bookkeeping for the reconciliation loop.

/// Outcome of decrypting and classifying one fetched batch.
#[derive(Debug, Default, Clone)]
pub struct BatchOutcome {
    pub entries: usize,
    pub mined: usize,
    pub pending: usize,
    pub max_mined_index: Option<u64>,
    pub max_pending_index: Option<u64>,
}

/// Aggregate counters for one reconciliation cycle.
#[derive(Debug, Default, Clone)]
pub struct CycleStats {
    pub batches: usize,
    pub entries: usize,
    pub mined: usize,
    pub pending: usize,
    pub notes_added: usize,
    pub notes_spent: usize,
    pub max_mined_index: Option<u64>,
    pub max_pending_index: Option<u64>,
}

impl CycleStats {
    pub fn absorb(&mut self, outcome: &BatchOutcome) {
        self.batches += 1;
        self.entries += outcome.entries;
        self.mined += outcome.mined;
        self.pending += outcome.pending;
        self.max_mined_index = self.max_mined_index.max(outcome.max_mined_index);
        self.max_pending_index = self.max_pending_index.max(outcome.max_pending_index);
    }

    pub fn summary(&self) -> String {
        format!(
            "{} batches, {} entries ({} mined / {} pending), {} notes added, {} spent",
            self.batches, self.entries, self.mined, self.pending, self.notes_added, self.notes_spent
        )
    }
}
