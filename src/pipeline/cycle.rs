// src/pipeline/cycle.rs

//! Watch cycle orchestration.
//!
//! One cycle runs fetch → sweep → diff → notify to completion before the
//! next is scheduled, so the snapshot and ledger are only ever touched by
//! one cycle at a time. The loop sleeps a fixed interval plus small random
//! jitter between cycles to avoid hammering the shared source in lockstep
//! with other watchers.

use std::time::Duration;

use chrono::Utc;
use rand::Rng;

use crate::error::Result;
use crate::models::{Config, InterestFilter};
use crate::pipeline::compose::MessageComposer;
use crate::pipeline::diff::SnapshotDiffer;
use crate::pipeline::ledger::NotificationLedger;
use crate::services::{ListingSource, Notifier};
use crate::storage::StockMirror;

/// Summary of one completed cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Listings that became available this cycle
    pub added: usize,
    /// Listings that became unavailable this cycle
    pub removed: usize,
    /// Ledger entries evicted by the retention sweep
    pub evicted: usize,
    /// Whether an alert message was sent
    pub alert_sent: bool,
    /// Message edits attempted for unavailability updates
    pub edits: usize,
    /// Edits that failed (logged and skipped)
    pub edit_failures: usize,
}

/// The watcher: owns all mutable core state and the collaborator adapters.
///
/// Created once at process start and driven by a single task; dropped at
/// process exit. State never survives a restart, so the first cycle after
/// startup is always a silent baseline.
pub struct Watcher {
    source: Box<dyn ListingSource>,
    notifier: Box<dyn Notifier>,
    differ: SnapshotDiffer,
    ledger: NotificationLedger,
    composer: MessageComposer,
    filter: InterestFilter,
    mirror: Option<StockMirror>,
    poll_interval: Duration,
    jitter: Duration,
}

impl Watcher {
    /// Assemble a watcher from configuration and adapters.
    pub fn new(config: &Config, source: Box<dyn ListingSource>, notifier: Box<dyn Notifier>) -> Self {
        Self {
            source,
            notifier,
            differ: SnapshotDiffer::new(),
            ledger: NotificationLedger::new(chrono::Duration::hours(
                config.watch.retention_hours as i64,
            )),
            composer: MessageComposer::new(&config.source.url, config.telegram.use_direct_link),
            filter: config.filter.interest_filter(),
            mirror: config.watch.mirror_path.as_ref().map(StockMirror::new),
            poll_interval: Duration::from_secs(config.watch.poll_interval_secs),
            jitter: Duration::from_secs(config.watch.jitter_secs),
        }
    }

    /// Run one full fetch → diff → notify cycle.
    ///
    /// A fetch failure aborts before any state mutation. A send failure
    /// aborts after the snapshot was replaced but before a ledger record
    /// exists, so the next cycle will not re-announce the same items.
    /// Edit failures are logged per key and never abort the cycle.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let listings = self.source.fetch_listings().await?;
        log::debug!("Fetched {} raw listings", listings.len());

        let mut report = CycleReport {
            evicted: self.ledger.sweep_expired(Utc::now()),
            ..CycleReport::default()
        };
        if report.evicted > 0 {
            log::info!("Evicted {} expired ledger entries", report.evicted);
        }

        let delta = self.differ.diff(&listings, &self.filter);
        report.added = delta.added.len();
        report.removed = delta.removed.len();

        if delta.has_changes() {
            log::info!(
                "Diff: {} now available, {} now unavailable",
                report.added,
                report.removed
            );
        } else {
            log::debug!("No stock changes");
        }

        if !delta.added.is_empty() {
            let text = self.composer.compose_alert(&delta.added);
            let handle = self.notifier.send(&text).await?;
            self.ledger.record_sent(&delta.added, handle, Utc::now());
            report.alert_sent = true;
            log::info!("Alert sent for {} listings", report.added);
        }

        for (key, listing) in &delta.removed {
            let Some(view) = self.ledger.mark_unavailable(key, listing) else {
                log::debug!("Unavailable listing was never announced, dropping: {key}");
                continue;
            };

            report.edits += 1;
            let text = self.composer.compose_update(&view);
            if let Err(e) = self.notifier.edit(&view.handle, &text).await {
                report.edit_failures += 1;
                log::warn!("Failed to edit message {} for {key}: {e}", view.handle.message_id);
            } else {
                log::info!("Edited message {} for {key}", view.handle.message_id);
            }
        }

        if let Some(mirror) = &self.mirror {
            if let Err(e) = mirror.write(self.differ.available()).await {
                log::warn!("Failed to write stock mirror: {e}");
            }
        }

        Ok(report)
    }

    /// Poll until interrupted.
    ///
    /// Cycle errors are reported to the operator channel and never stop the
    /// loop. Ctrl-C stops between cycles; an in-flight cycle always finishes
    /// first, so the ledger never references a message that was never sent.
    pub async fn run(&mut self) -> Result<()> {
        let banner = self.startup_banner();
        if let Err(e) = self.notifier.notify_operator(&banner).await {
            log::warn!("Failed to send startup banner: {e}");
        }

        loop {
            log::info!("Checking stock...");
            match self.run_cycle().await {
                Ok(report) => log::debug!("Cycle done: {report:?}"),
                Err(e) => {
                    log::error!("Cycle failed: {e}");
                    if let Err(notify_err) = self
                        .notifier
                        .notify_operator(&format!("❌ Cycle failed!\n{e}"))
                        .await
                    {
                        log::warn!("Failed to notify operator: {notify_err}");
                    }
                }
            }

            let delay = self.poll_interval + self.next_jitter();
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = tokio::signal::ctrl_c() => {
                    log::info!("Interrupted, stopping watcher");
                    return Ok(());
                }
            }
        }
    }

    fn next_jitter(&self) -> Duration {
        if self.jitter.is_zero() {
            return Duration::ZERO;
        }
        let max_millis = self.jitter.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_millis))
    }

    fn startup_banner(&self) -> String {
        let models = match &self.filter {
            InterestFilter::All => " All".to_string(),
            InterestFilter::Prefixes(prefixes) => {
                format!("\n{}", prefixes.join("\n"))
            }
        };
        format!("Watcher started! ⚡ Looking for models:{models}")
    }
}
