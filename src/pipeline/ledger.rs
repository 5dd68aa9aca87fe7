// src/pipeline/ledger.rs

//! Notification lifecycle ledger.
//!
//! Maps each announced listing key to the outbound message that announced
//! it, so a later "now unavailable" transition can edit the earlier message
//! instead of sending a new one. Entries live for a fixed retention window
//! (default 24 hours) from creation; mutation never extends it, which keeps
//! long-flapping listings from producing unbounded edit chains.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};

use crate::models::{Listing, ListingKey};
use crate::services::MessageHandle;

/// Ledger record for one sent alert message.
///
/// Several listing keys announced in the same cycle share one entry, since
/// they were batched into one message.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    /// Handle of the sent message
    pub handle: MessageHandle,
    /// Keys still advertised as available in the message
    pub available: BTreeMap<ListingKey, Listing>,
    /// Keys since marked unavailable in the message
    pub unavailable: BTreeMap<ListingKey, Listing>,
    /// When the message was sent; the TTL is measured from here
    pub created_at: DateTime<Utc>,
}

/// Snapshot of a ledger entry's render state, cloned out so the caller can
/// recompose and edit the message without holding a borrow on the ledger.
#[derive(Debug, Clone)]
pub struct EntryView {
    pub handle: MessageHandle,
    pub available: BTreeMap<ListingKey, Listing>,
    pub unavailable: BTreeMap<ListingKey, Listing>,
}

/// Tracks sent alert messages and their remaining lifetime.
#[derive(Debug)]
pub struct NotificationLedger {
    /// Listing key -> message id of the alert that announced it
    key_to_message: HashMap<ListingKey, i64>,
    /// Message id -> shared entry
    entries: HashMap<i64, LedgerEntry>,
    /// Hard TTL measured from entry creation
    retention: Duration,
}

impl NotificationLedger {
    /// Create an empty ledger with the given retention window.
    pub fn new(retention: Duration) -> Self {
        Self {
            key_to_message: HashMap::new(),
            entries: HashMap::new(),
            retention,
        }
    }

    /// Number of live entries (messages, not keys).
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Number of listing keys currently tracked.
    pub fn tracked_key_count(&self) -> usize {
        self.key_to_message.len()
    }

    /// Whether a listing key is currently tracked by a live entry.
    pub fn is_tracked(&self, key: &ListingKey) -> bool {
        self.key_to_message.contains_key(key)
    }

    /// Register a successfully sent alert covering `added`.
    ///
    /// All keys share one entry for the one batched message. Call this only
    /// after the send succeeded: a failed send leaves no ledger record, and
    /// the already-advanced snapshot makes the next cycle skip those items
    /// (accepted at-most-once notification tradeoff).
    pub fn record_sent(
        &mut self,
        added: &BTreeMap<ListingKey, Listing>,
        handle: MessageHandle,
        now: DateTime<Utc>,
    ) {
        if added.is_empty() {
            return;
        }

        for key in added.keys() {
            self.key_to_message.insert(key.clone(), handle.message_id);
        }
        self.entries.insert(
            handle.message_id,
            LedgerEntry {
                handle,
                available: added.clone(),
                unavailable: BTreeMap::new(),
                created_at: now,
            },
        );
    }

    /// Mark an announced listing as unavailable.
    ///
    /// Moves the key from the entry's available set to its unavailable set
    /// and returns a view for recomposition and edit. Returns `None` when
    /// the key was never announced or its entry already expired; that
    /// unavailability is silently dropped.
    pub fn mark_unavailable(&mut self, key: &ListingKey, listing: &Listing) -> Option<EntryView> {
        let message_id = *self.key_to_message.get(key)?;
        let entry = self.entries.get_mut(&message_id)?;

        entry.available.remove(key);
        entry.unavailable.insert(key.clone(), listing.clone());

        Some(EntryView {
            handle: entry.handle.clone(),
            available: entry.available.clone(),
            unavailable: entry.unavailable.clone(),
        })
    }

    /// Evict entries older than the retention window, and every key mapping
    /// that points at them. Returns the number of entries evicted.
    ///
    /// Explicit timestamp comparison instead of deferred timer callbacks:
    /// the caller drives the clock, which keeps eviction serialized with
    /// cycle execution and lets tests fast-forward logical time. Running
    /// once per cycle bounds the eviction delay by the poll interval.
    pub fn sweep_expired(&mut self, now: DateTime<Utc>) -> usize {
        let expired: Vec<i64> = self
            .entries
            .iter()
            .filter(|(_, entry)| now - entry.created_at >= self.retention)
            .map(|(id, _)| *id)
            .collect();

        if expired.is_empty() {
            return 0;
        }

        self.key_to_message
            .retain(|_, message_id| !expired.contains(message_id));
        for id in &expired {
            self.entries.remove(id);
        }
        expired.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Price;

    fn listing(sku: &str, available: bool) -> Listing {
        Listing {
            sku: sku.to_string(),
            description: format!("{sku} board"),
            vendor: "pimoroni.com".to_string(),
            price: Price::from_display("50.00 EUR"),
            link: format!("https://pimoroni.com/{sku}"),
            vendor_id: None,
            last_stock: "2026-08-20".to_string(),
            available,
        }
    }

    fn added_map(listings: &[Listing]) -> BTreeMap<ListingKey, Listing> {
        listings.iter().map(|l| (l.key(), l.clone())).collect()
    }

    fn handle(message_id: i64) -> MessageHandle {
        MessageHandle {
            message_id,
            chat_id: "-100123".to_string(),
        }
    }

    fn ledger_24h() -> NotificationLedger {
        NotificationLedger::new(Duration::hours(24))
    }

    #[test]
    fn test_record_sent_shares_one_entry() {
        let mut ledger = ledger_24h();
        let a = listing("RPI4", true);
        let b = listing("RPI5", true);
        let now = Utc::now();

        ledger.record_sent(&added_map(&[a.clone(), b.clone()]), handle(7), now);

        assert_eq!(ledger.entry_count(), 1);
        assert_eq!(ledger.tracked_key_count(), 2);
        assert!(ledger.is_tracked(&a.key()));
        assert!(ledger.is_tracked(&b.key()));
    }

    #[test]
    fn test_record_sent_empty_is_noop() {
        let mut ledger = ledger_24h();
        ledger.record_sent(&BTreeMap::new(), handle(7), Utc::now());
        assert_eq!(ledger.entry_count(), 0);
    }

    #[test]
    fn test_mark_unavailable_moves_key() {
        let mut ledger = ledger_24h();
        let a = listing("RPI4", true);
        let b = listing("RPI5", true);
        ledger.record_sent(&added_map(&[a.clone(), b.clone()]), handle(7), Utc::now());

        let gone = listing("RPI4", false);
        let view = ledger.mark_unavailable(&a.key(), &gone).unwrap();

        assert_eq!(view.handle.message_id, 7);
        assert!(!view.available.contains_key(&a.key()));
        assert!(view.available.contains_key(&b.key()));
        assert!(view.unavailable.contains_key(&a.key()));
    }

    #[test]
    fn test_mark_unavailable_unknown_key_is_dropped() {
        let mut ledger = ledger_24h();
        let unknown = listing("RPI400", false);
        assert!(ledger.mark_unavailable(&unknown.key(), &unknown).is_none());
    }

    #[test]
    fn test_sweep_keeps_young_entries() {
        let mut ledger = ledger_24h();
        let a = listing("RPI4", true);
        let created = Utc::now();
        ledger.record_sent(&added_map(&[a.clone()]), handle(1), created);

        let evicted = ledger.sweep_expired(created + Duration::hours(23));
        assert_eq!(evicted, 0);
        assert!(ledger.is_tracked(&a.key()));
    }

    #[test]
    fn test_sweep_evicts_at_retention() {
        let mut ledger = ledger_24h();
        let a = listing("RPI4", true);
        let created = Utc::now();
        ledger.record_sent(&added_map(&[a.clone()]), handle(1), created);

        let evicted = ledger.sweep_expired(created + Duration::hours(24));
        assert_eq!(evicted, 1);
        assert_eq!(ledger.entry_count(), 0);
        assert!(!ledger.is_tracked(&a.key()));
    }

    #[test]
    fn test_mutation_does_not_extend_ttl() {
        let mut ledger = ledger_24h();
        let a = listing("RPI4", true);
        let created = Utc::now();
        ledger.record_sent(&added_map(&[a.clone()]), handle(1), created);

        // Mutate just before expiry; the hard TTL still applies.
        let gone = listing("RPI4", false);
        ledger.mark_unavailable(&a.key(), &gone).unwrap();

        let evicted = ledger.sweep_expired(created + Duration::hours(24));
        assert_eq!(evicted, 1);
        assert!(!ledger.is_tracked(&a.key()));
    }

    #[test]
    fn test_sweep_only_evicts_expired_entries() {
        let mut ledger = ledger_24h();
        let a = listing("RPI4", true);
        let b = listing("RPI5", true);
        let t0 = Utc::now();
        ledger.record_sent(&added_map(&[a.clone()]), handle(1), t0);
        ledger.record_sent(&added_map(&[b.clone()]), handle(2), t0 + Duration::hours(12));

        let evicted = ledger.sweep_expired(t0 + Duration::hours(25));
        assert_eq!(evicted, 1);
        assert!(!ledger.is_tracked(&a.key()));
        assert!(ledger.is_tracked(&b.key()));
    }

    #[test]
    fn test_mark_unavailable_after_eviction_is_dropped() {
        let mut ledger = ledger_24h();
        let a = listing("RPI4", true);
        let created = Utc::now();
        ledger.record_sent(&added_map(&[a.clone()]), handle(1), created);
        ledger.sweep_expired(created + Duration::hours(25));

        let gone = listing("RPI4", false);
        assert!(ledger.mark_unavailable(&a.key(), &gone).is_none());
    }
}
