// src/storage/mod.rs

//! Optional persistence for peripheral consumers.
//!
//! The core keeps all state in memory; this module only mirrors the current
//! available set to disk for other processes to read.

pub mod mirror;

pub use mirror::{MirrorData, StockMirror};
