use std::collections::HashSet;

use tracing::{info, warn};

use crate::config::HeuristicConfig;
use crate::core::{TraceContext, Transaction};

/// Evaluate one account's fetched batch.
///
/// The mixer count measures transactions in the batch whose destination is
/// the account itself, exactly as given — no attempt to reconstruct the
/// account's true incoming volume.
pub fn detect(
    transactions: &[Transaction],
    account: &str,
    config: &HeuristicConfig,
    ctx: &mut TraceContext,
) {
    let incoming = transactions
        .iter()
        .filter(|txn| txn.destination.as_deref() == Some(account))
        .count();
    if incoming > config.mixer_incoming_threshold {
        ctx.suspected_mixers.insert(account.to_string());
        let msg = format!(
            "HEURISTIC ALERT: account {account} suspected as mixer (high incoming transfers: {incoming})"
        );
        warn!("{msg}");
        ctx.alerts.push(msg);
    }

    let destinations: HashSet<&str> = transactions
        .iter()
        .filter_map(|txn| txn.destination.as_deref())
        .collect();
    if destinations.len() > config.fanout_note_threshold {
        // Diagnostic note only, never an alert.
        info!(
            "Cluster note: account {account} connects to {} destinations",
            destinations.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn self_transfer(account: &str) -> Transaction {
        Transaction {
            source: account.to_string(),
            destination: Some(account.to_string()),
            amount: Some(1_000_000),
            timestamp: Utc.with_ymd_and_hms(2023, 7, 15, 12, 0, 0).unwrap(),
        }
    }

    fn transfer_to(destination: &str) -> Transaction {
        Transaction {
            source: "rSource".to_string(),
            destination: Some(destination.to_string()),
            amount: Some(1_000_000),
            timestamp: Utc.with_ymd_and_hms(2023, 7, 15, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn eleven_incoming_triggers_exactly_one_mixer_alert() {
        let batch: Vec<_> = (0..11).map(|_| self_transfer("rHub")).collect();
        let mut ctx = TraceContext::new();
        detect(&batch, "rHub", &HeuristicConfig::default(), &mut ctx);
        assert_eq!(ctx.alerts.len(), 1);
        assert!(ctx.alerts[0].contains("suspected as mixer"));
        assert!(ctx.alerts[0].contains("11"));
        assert!(ctx.suspected_mixers.contains("rHub"));
    }

    #[test]
    fn ten_incoming_triggers_nothing() {
        let batch: Vec<_> = (0..10).map(|_| self_transfer("rHub")).collect();
        let mut ctx = TraceContext::new();
        detect(&batch, "rHub", &HeuristicConfig::default(), &mut ctx);
        assert!(ctx.alerts.is_empty());
        assert!(ctx.suspected_mixers.is_empty());
    }

    #[test]
    fn empty_batch_triggers_nothing() {
        let mut ctx = TraceContext::new();
        detect(&[], "rHub", &HeuristicConfig::default(), &mut ctx);
        assert!(ctx.alerts.is_empty());
        assert!(ctx.suspected_mixers.is_empty());
    }

    #[test]
    fn transfers_to_other_accounts_do_not_count() {
        let batch: Vec<_> = (0..20).map(|i| transfer_to(&format!("rOther{i}"))).collect();
        let mut ctx = TraceContext::new();
        detect(&batch, "rHub", &HeuristicConfig::default(), &mut ctx);
        assert!(ctx.suspected_mixers.is_empty());
    }

    #[test]
    fn fanout_note_is_not_an_alert() {
        // Six distinct destinations crosses the fan-out threshold, which
        // only logs a diagnostic.
        let batch: Vec<_> = (0..6).map(|i| transfer_to(&format!("rDest{i}"))).collect();
        let mut ctx = TraceContext::new();
        detect(&batch, "rHub", &HeuristicConfig::default(), &mut ctx);
        assert!(ctx.alerts.is_empty());
    }

    #[test]
    fn transactions_without_destination_are_ignored() {
        let mut batch: Vec<_> = (0..12).map(|_| self_transfer("rHub")).collect();
        for txn in batch.iter_mut().take(2) {
            txn.destination = None;
        }
        let mut ctx = TraceContext::new();
        detect(&batch, "rHub", &HeuristicConfig::default(), &mut ctx);
        // 10 remaining self-transfers: at the threshold, not above it.
        assert!(ctx.alerts.is_empty());
    }

    #[test]
    fn custom_threshold_is_honored() {
        let config = HeuristicConfig {
            mixer_incoming_threshold: 2,
            fanout_note_threshold: 5,
        };
        let batch: Vec<_> = (0..3).map(|_| self_transfer("rHub")).collect();
        let mut ctx = TraceContext::new();
        detect(&batch, "rHub", &config, &mut ctx);
        assert_eq!(ctx.alerts.len(), 1);
        assert!(ctx.suspected_mixers.contains("rHub"));
    }
}
