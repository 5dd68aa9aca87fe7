// src/pipeline/diff.rs

//! Availability diff engine.
//!
//! Compares each freshly fetched snapshot against the last known one to
//! identify listings that became available or unavailable, for notification
//! dispatch.

use std::collections::BTreeMap;

use crate::models::{InterestFilter, Listing, ListingKey};

/// Per-cycle diff output: listings that just became available or
/// unavailable, keyed by listing identity.
#[derive(Debug, Clone, Default)]
pub struct Delta {
    /// Available now, absent from the previous snapshot
    pub added: BTreeMap<ListingKey, Listing>,
    /// Present in the previous snapshot, no longer available
    pub removed: BTreeMap<ListingKey, Listing>,
}

impl Delta {
    /// Check if there are any changes.
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }

    /// Get the total number of changes.
    pub fn change_count(&self) -> usize {
        self.added.len() + self.removed.len()
    }
}

/// Stateful differ owning the availability snapshot.
///
/// The snapshot holds only listings currently marked available, exactly as
/// of the last completed cycle, and is fully replaced each cycle. The first
/// cycle seeds the snapshot and reports no changes, so a restart never spams
/// alerts for items that were already in stock.
#[derive(Debug)]
pub struct SnapshotDiffer {
    snapshot: BTreeMap<ListingKey, Listing>,
    first_cycle: bool,
}

// Hand-written so first_cycle starts true; a derive would default it to
// false and announce the entire first fetch.
impl Default for SnapshotDiffer {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotDiffer {
    /// Create a differ with an empty snapshot.
    pub fn new() -> Self {
        Self {
            snapshot: BTreeMap::new(),
            first_cycle: true,
        }
    }

    /// The currently available listings as of the last completed cycle.
    pub fn available(&self) -> &BTreeMap<ListingKey, Listing> {
        &self.snapshot
    }

    /// Diff the fetched listings against the stored snapshot and replace it.
    ///
    /// A listing that disappears from the source entirely is treated the
    /// same as one flipped to unavailable: both end up in `removed`. The
    /// removed value is the fresh row when the source still lists it as
    /// unavailable, otherwise the last stored one. A price change while
    /// available shows up as added (new key) plus removed (old key), since
    /// a new price is a new offer.
    pub fn diff(&mut self, raw_listings: &[Listing], filter: &InterestFilter) -> Delta {
        let watched: Vec<&Listing> = raw_listings
            .iter()
            .filter(|l| filter.matches(&l.sku))
            .collect();

        let current: BTreeMap<ListingKey, Listing> = watched
            .iter()
            .filter(|l| l.available)
            .map(|l| (l.key(), (*l).clone()))
            .collect();

        if self.first_cycle {
            self.snapshot = current;
            self.first_cycle = false;
            return Delta::default();
        }

        // Every watched row by key, available or not, for removed lookups.
        let fetched: BTreeMap<ListingKey, &Listing> =
            watched.iter().map(|l| (l.key(), *l)).collect();

        let added: BTreeMap<ListingKey, Listing> = current
            .iter()
            .filter(|(key, _)| !self.snapshot.contains_key(*key))
            .map(|(key, listing)| (key.clone(), listing.clone()))
            .collect();

        let removed: BTreeMap<ListingKey, Listing> = self
            .snapshot
            .iter()
            .filter(|(key, _)| !current.contains_key(*key))
            .map(|(key, old)| {
                let listing = fetched.get(key).map_or_else(|| old.clone(), |l| (*l).clone());
                (key.clone(), listing)
            })
            .collect();

        self.snapshot = current;

        Delta { added, removed }
    }
}
