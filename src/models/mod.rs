// src/models/mod.rs

//! Domain models for the stock watcher.

mod config;
mod listing;

// Re-export all public types
pub use config::{Config, FilterConfig, InterestFilter, SourceConfig, TelegramConfig, WatchConfig};
pub use listing::{Listing, ListingKey, Price};
