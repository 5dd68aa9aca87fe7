// src/pipeline/mod.rs

//! The availability pipeline: diff, ledger, composition, and the cycle
//! that drives them.

pub mod compose;
pub mod cycle;
pub mod diff;
pub mod ledger;

pub use compose::MessageComposer;
pub use cycle::{CycleReport, Watcher};
pub use diff::{Delta, SnapshotDiffer};
pub use ledger::{EntryView, LedgerEntry, NotificationLedger};
