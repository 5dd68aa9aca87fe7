// src/services/mod.rs

//! External collaborators: the listing source and the notification channel.

pub mod source;
pub mod telegram;

pub use source::{HtmlTableSource, ListingSource};
pub use telegram::{MessageHandle, Notifier, TelegramNotifier};
