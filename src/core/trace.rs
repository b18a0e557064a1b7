use tracing::info;

use crate::config::HeuristicConfig;
use crate::core::{TimeWindow, TraceContext, TraceOutcome, Transaction, heuristics};
use crate::ledger::{LedgerError, LedgerSource};
use crate::tags::{MIXER_CATEGORY, TagRegistry};

/// Drives the depth-first expansion over the remote ledger.
///
/// Each trace invocation owns a fresh [`TraceContext`]; a fatal ledger error
/// aborts the whole trace with no partial outcome.
pub struct Tracer<'a, L: LedgerSource> {
    ledger: &'a L,
    registry: &'a TagRegistry,
    heuristics: &'a HeuristicConfig,
}

/// One account mid-expansion: its depth and the transactions not yet walked.
struct Frame {
    account: String,
    depth: u32,
    batch: std::vec::IntoIter<Transaction>,
}

impl<'a, L: LedgerSource> Tracer<'a, L> {
    pub fn new(ledger: &'a L, registry: &'a TagRegistry, heuristics: &'a HeuristicConfig) -> Self {
        Self {
            ledger,
            registry,
            heuristics,
        }
    }

    /// Trace outgoing flows from a root account.
    pub async fn trace_account(
        &self,
        account: &str,
        window: TimeWindow,
        max_depth: u32,
    ) -> Result<TraceOutcome, LedgerError> {
        let mut ctx = TraceContext::new();
        ctx.node_levels.insert(account.to_string(), 0);
        let transactions = self
            .expand(account.to_string(), window, 0, max_depth, &mut ctx)
            .await?;
        Ok(TraceOutcome::from_context(transactions, ctx))
    }

    /// Trace forward from a single seed transaction.
    ///
    /// The seed is always part of the result, even when its timestamp falls
    /// outside the window. Expansion continues from its destination at
    /// depth 1, with the seed's source already marked visited.
    pub async fn trace_transaction(
        &self,
        tx_id: &str,
        window: TimeWindow,
        max_depth: u32,
    ) -> Result<TraceOutcome, LedgerError> {
        let seed = self.ledger.fetch_transaction(tx_id).await?;
        let mut ctx = TraceContext::new();
        let mut transactions = vec![seed.clone()];
        if let Some(destination) = seed.destination.clone() {
            ctx.node_levels.insert(seed.source.clone(), 0);
            ctx.node_levels.insert(destination.clone(), 1);
            ctx.visited.insert(seed.source.clone());
            let traced = self.expand(destination, window, 1, max_depth, &mut ctx).await?;
            transactions.extend(traced);
        }
        Ok(TraceOutcome::from_context(transactions, ctx))
    }

    /// Depth-first expansion over an explicit frame stack.
    ///
    /// Equivalent to recursing into each unvisited destination as it is
    /// discovered: the forwarded transaction is recorded, then the
    /// destination's own frame is walked to exhaustion before the parent
    /// frame resumes.
    async fn expand(
        &self,
        root: String,
        window: TimeWindow,
        start_depth: u32,
        max_depth: u32,
        ctx: &mut TraceContext,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let mut collected = Vec::new();
        let mut stack = Vec::new();
        if let Some(frame) = self.enter(root, window, start_depth, max_depth, ctx).await? {
            stack.push(frame);
        }

        'walk: while let Some(mut frame) = stack.pop() {
            while let Some(txn) = frame.batch.next() {
                let (destination, amount) = match (txn.destination.clone(), txn.amount) {
                    (Some(destination), Some(amount)) => (destination, amount),
                    _ => continue,
                };
                self.flag_destination(&frame.account, &destination, amount, ctx);
                if ctx.visited.contains(&destination) {
                    continue;
                }
                // First assignment wins; a later sighting on another path
                // never reassigns the level.
                ctx.node_levels
                    .entry(destination.clone())
                    .or_insert(frame.depth + 1);
                let depth = frame.depth;
                collected.push(txn);
                if let Some(child) = self
                    .enter(destination, window, depth + 1, max_depth, ctx)
                    .await?
                {
                    stack.push(frame);
                    stack.push(child);
                    continue 'walk;
                }
            }
        }
        Ok(collected)
    }

    /// Fetch and prepare one account for expansion. Returns `None` past the
    /// depth bound or for an account already walked.
    async fn enter(
        &self,
        account: String,
        window: TimeWindow,
        depth: u32,
        max_depth: u32,
        ctx: &mut TraceContext,
    ) -> Result<Option<Frame>, LedgerError> {
        if depth > max_depth || ctx.visited.contains(&account) {
            return Ok(None);
        }
        info!("Tracing account {account} at depth {depth}");
        ctx.visited.insert(account.clone());
        let batch = self.fetch_window(&account, window, depth, max_depth).await?;
        heuristics::detect(&batch, &account, self.heuristics, ctx);
        Ok(Some(Frame {
            account,
            depth,
            batch: batch.into_iter(),
        }))
    }

    /// Fetch an account's history, keeping transactions inside the window.
    async fn fetch_window(
        &self,
        account: &str,
        window: TimeWindow,
        depth: u32,
        max_depth: u32,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let mut kept = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = self
                .ledger
                .fetch_transactions(account, cursor.as_deref())
                .await?;
            kept.extend(
                page.transactions
                    .into_iter()
                    .filter(|txn| window.contains(txn.timestamp)),
            );
            // TODO: pagination stops once the walk is at the depth bound;
            // decide whether deep accounts should still page fully.
            match page.next_cursor {
                Some(next) if depth < max_depth => cursor = Some(next),
                _ => break,
            }
        }
        Ok(kept)
    }

    /// Tag, exchange, and mixer checks for one forwarded transfer.
    fn flag_destination(
        &self,
        account: &str,
        destination: &str,
        amount: u64,
        ctx: &mut TraceContext,
    ) {
        if let Some(tag) = self.registry.tag(destination) {
            let msg = format!(
                "TAG ALERT: transfer to tagged {} ({destination}) from {account} - notes: {}",
                tag.label, tag.notes
            );
            info!("{msg}");
            ctx.alerts.push(msg);
            // Analyst tags win over heuristic suspicion.
            if tag.category != MIXER_CATEGORY && ctx.suspected_mixers.remove(destination) {
                ctx.alerts.push(format!(
                    "TAG OVERRIDE: {destination} tagged as {}, dropping mixer suspicion",
                    tag.label
                ));
            }
        }
        if let Some(exchange) = self.registry.exchange(destination) {
            let msg = format!(
                "ALERT: transfer of {amount} drops to known exchange {exchange} ({destination}) from {account}"
            );
            info!("{msg}");
            ctx.alerts.push(msg);
        }
        if ctx.suspected_mixers.contains(destination) {
            let msg = format!("ALERT: transfer to suspected mixer {destination} from {account}");
            info!("{msg}");
            ctx.alerts.push(msg);
        }
    }
}
