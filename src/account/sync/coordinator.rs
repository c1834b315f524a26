//! Reconciliation cycle driver.
//!
//! This module defines the `SyncCoordinator`, which merges the remote
//! commitment log into the local account state and history. It is responsible
//! for:
//! - Deciding whether a cycle is needed at all (cursor vs. the relayer's
//!   confirmed frontier)
//! - Fetching disjoint index-space batches concurrently and classifying them
//! - Feeding mined and pending entries to the decryption capability
//! - Applying state deltas and history records serially, in batch order
//! - Enforcing single-flight execution so concurrent callers share one
//!   cycle's outcome
//!
//! State mutation only ever happens here; everything else reads.

use crate::account::sync::classifier::{ClassifiedBatch, classify_batch};
use crate::account::sync::progress::{BatchOutcome, CycleStats};
use crate::account::{HistoryRecord, PoolContext, SyncError};
use crate::crypto::{DecryptedBatch, DecryptedMemo, PoolCrypto};
use crate::relayer::RelayerApi;

use chrono::Utc;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Offset added to the relayer's latest confirmed index when deciding whether
/// anything new exists for us. The relayer does not expose a true pending-log
/// frontier, so the cycle compares `deltaIndex + 1` against the local cursor
/// and errs toward fetching once more rather than stalling.
//
// TODO: drop this once the relayer info endpoint reports a pending head index.
pub const OPTIMISTIC_INDEX_OFFSET: u64 = 1;

/// Tuning knobs for one reconciliation cycle.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Entries requested per batch fetch.
    pub batch_size: u64,
    /// Batches fetched and decrypted in parallel.
    pub fetch_concurrency: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            fetch_concurrency: 4,
        }
    }
}

type SharedCycle = Shared<BoxFuture<'static, Result<bool, SyncError>>>;

/// Drives reconciliation cycles against one account.
///
/// Concurrent `update_state` callers share a single in-flight cycle: the
/// first caller starts it, later callers await the same future, and the slot
/// is cleared when the cycle finishes either way.
pub struct SyncCoordinator<R, C> {
    relayer: Arc<R>,
    crypto: Arc<C>,
    context: Arc<PoolContext>,
    config: SyncConfig,
    in_flight: Arc<Mutex<Option<SharedCycle>>>,
}

impl<R, C> SyncCoordinator<R, C>
where
    R: RelayerApi + Send + Sync + 'static,
    C: PoolCrypto + 'static,
{
    pub fn new(relayer: Arc<R>, crypto: Arc<C>, context: Arc<PoolContext>) -> Self {
        Self::with_config(relayer, crypto, context, SyncConfig::default())
    }

    pub fn with_config(
        relayer: Arc<R>,
        crypto: Arc<C>,
        context: Arc<PoolContext>,
        config: SyncConfig,
    ) -> Self {
        Self {
            relayer,
            crypto,
            context,
            config,
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    /// Run one reconciliation cycle, or join the one already running.
    ///
    /// Returns `true` when the account is ready to transact: the local state
    /// covers the relayer's confirmed frontier and no pending entry spends
    /// from this account. Returns `false` when a self-originated transaction
    /// is still unconfirmed.
    ///
    /// # Errors
    ///
    /// Network-kind errors on transport failure, entry-kind errors on
    /// malformed log data. Batches applied before a failing batch stay
    /// applied; the next call starts a fresh cycle from the advanced cursor.
    pub async fn update_state(&self) -> Result<bool, SyncError> {
        let cycle = {
            let mut in_flight = self.in_flight.lock().unwrap();
            match in_flight.as_ref() {
                Some(cycle) => {
                    debug!("Joining in-flight reconciliation cycle");
                    cycle.clone()
                }
                None => {
                    let cycle = Self::run_cycle(
                        self.relayer.clone(),
                        self.crypto.clone(),
                        self.context.clone(),
                        self.config.clone(),
                        self.in_flight.clone(),
                    )
                    .boxed()
                    .shared();
                    *in_flight = Some(cycle.clone());
                    cycle
                }
            }
        };
        cycle.await
    }

    /// Poll `update_state` until it reports ready, up to `max_attempts`
    /// with `interval` between attempts. Returns `Ok(false)` on exhaustion
    /// instead of erroring; transport failures still propagate.
    pub async fn wait_ready(
        &self,
        interval: Duration,
        max_attempts: u32,
    ) -> Result<bool, SyncError> {
        for attempt in 1..=max_attempts {
            if self.update_state().await? {
                return Ok(true);
            }
            debug!(
                "Account not ready to transact (attempt {}/{})",
                attempt, max_attempts
            );
            if attempt < max_attempts {
                tokio::time::sleep(interval).await;
            }
        }
        Ok(false)
    }

    /// Wraps `reconcile` so the single-flight slot is cleared on every exit
    /// path before the shared future resolves.
    async fn run_cycle(
        relayer: Arc<R>,
        crypto: Arc<C>,
        context: Arc<PoolContext>,
        config: SyncConfig,
        in_flight: Arc<Mutex<Option<SharedCycle>>>,
    ) -> Result<bool, SyncError> {
        let outcome = Self::reconcile(relayer, crypto, context, config).await;
        in_flight.lock().unwrap().take();
        if let Err(e) = &outcome {
            warn!("Reconciliation cycle failed: {}", e);
        }
        outcome
    }

    async fn reconcile(
        relayer: Arc<R>,
        crypto: Arc<C>,
        context: Arc<PoolContext>,
        config: SyncConfig,
    ) -> Result<bool, SyncError> {
        let stride = context.params.index_stride();
        let start_index = context.state.lock().unwrap().next_tree_index;

        let relayer_info = relayer.info().await?;
        let Some(delta_index) = relayer_info.delta_index else {
            debug!("Commitment log has no confirmed entries, nothing to reconcile");
            return Ok(true);
        };

        let optimistic_index = delta_index + OPTIMISTIC_INDEX_OFFSET;
        if optimistic_index <= start_index {
            debug!(
                "Cursor {} already covers the confirmed frontier {}",
                start_index, delta_index
            );
            return Ok(true);
        }

        let remaining_entries = (delta_index - start_index) / stride + 1;
        let batch_count = remaining_entries.div_ceil(config.batch_size);
        let batch_span = config.batch_size * stride;

        info!(
            "Reconciling entries from index {} to {} ({} entries in {} batches)",
            start_index, delta_index, remaining_entries, batch_count
        );

        // Batches are disjoint in index space, so fetching and decrypting
        // run concurrently; `buffered` yields them back in start-index order
        // and the loop below applies them serially.
        let mut batches = stream::iter((0..batch_count).map(|k| {
            let relayer = relayer.clone();
            let crypto = crypto.clone();
            let params = context.params.clone();
            let key = context.key;
            let offset = start_index + k * batch_span;
            let limit = config.batch_size;
            async move {
                debug!("Fetching batch at offset {} (limit {})", offset, limit);
                let entries = relayer.fetch_transactions(offset, limit).await?;
                let classified = classify_batch(offset, &entries, &params)?;
                let mined = crypto.decrypt(&key, &classified.mined).await?;
                let pending = crypto.decrypt(&key, &classified.pending).await?;
                Ok::<(ClassifiedBatch, DecryptedBatch, DecryptedBatch), SyncError>((
                    classified, mined, pending,
                ))
            }
        }))
        .buffered(config.fetch_concurrency);

        let mut stats = CycleStats::default();
        let mut ready = true;
        let mut reaffirmed: HashSet<u64> = HashSet::new();

        while let Some(batch) = batches.next().await {
            let (classified, mined, pending) = batch?;
            let outcome = BatchOutcome {
                entries: classified.mined.len() + classified.pending.len(),
                mined: classified.mined.len(),
                pending: classified.pending.len(),
                max_mined_index: classified.max_mined_index(),
                max_pending_index: classified.max_pending_index(),
            };

            let DecryptedBatch {
                memos: mined_memos,
                update,
            } = mined;
            stats.notes_added += update.added_notes.len();
            stats.notes_spent += update.spent_note_indexes.len();

            {
                let mut state = context.state.lock().unwrap();
                state.apply(update);
                if let Some(max_mined) = outcome.max_mined_index {
                    state.advance_to(max_mined + stride);
                }
            }

            {
                let mut history = context.history.lock().unwrap();
                for memo in &mined_memos {
                    history.append(Self::record_from(memo, &classified, false));
                }
                for memo in &pending.memos {
                    if memo.account_present {
                        debug!("Own transaction at index {} is still pending", memo.index);
                        ready = false;
                    }
                    reaffirmed.insert(memo.index);
                    history.append(Self::record_from(memo, &classified, true));
                }
            }

            stats.absorb(&outcome);
        }

        context.history.lock().unwrap().trim_stale(
            stats.max_mined_index,
            stats.max_pending_index,
            &reaffirmed,
        );

        info!("Reconciliation cycle complete: {}", stats.summary());
        Ok(ready)
    }

    fn record_from(memo: &DecryptedMemo, batch: &ClassifiedBatch, pending: bool) -> HistoryRecord {
        HistoryRecord {
            kind: memo.kind,
            amount: memo.amount,
            fee: memo.fee,
            pending,
            tx_hash: batch
                .tx_hashes
                .get(&memo.index)
                .cloned()
                .unwrap_or_default(),
            index: memo.index,
            timestamp: Utc::now(),
        }
    }
}
