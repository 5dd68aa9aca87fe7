// src/storage/mirror.rs

//! File mirror of the current available set.
//!
//! Optional, peripheral convenience for cross-process sharing: after each
//! cycle the currently available listings are written as pretty JSON. The
//! core never reads this file back; a write failure is logged and skipped.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::error::Result;
use crate::models::{Listing, ListingKey};

/// On-disk document written by the mirror.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorData {
    /// ISO 8601 timestamp of the write
    pub updated_at: DateTime<Utc>,
    /// Number of available listings
    pub count: usize,
    /// Available listings keyed by listing identity
    pub listings: BTreeMap<ListingKey, Listing>,
}

/// Writes the available set to a JSON file after each cycle.
#[derive(Debug, Clone)]
pub struct StockMirror {
    path: PathBuf,
}

impl StockMirror {
    /// Create a mirror writing to the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the available set atomically (write to temp, then rename).
    pub async fn write(&self, available: &BTreeMap<ListingKey, Listing>) -> Result<()> {
        let data = MirrorData {
            updated_at: Utc::now(),
            count: available.len(),
            listings: available.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&data)?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = self.path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
