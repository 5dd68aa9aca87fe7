//! Listing data structures.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Price of a listing: parsed amount plus the raw display string.
///
/// The display string is what the source shows (e.g. "50.00 EUR") and is
/// part of the listing identity; the parsed amount is informational only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    /// Numeric amount, 0.0 if the display string could not be parsed
    pub amount: f64,

    /// Currency code, empty if unknown
    pub currency: String,

    /// Raw price text as shown by the source
    pub display: String,
}

impl Price {
    /// Parse a price from its display string (e.g. "50.00 EUR").
    ///
    /// Never fails: unparseable input yields amount 0.0 and empty currency,
    /// keeping the display string intact.
    pub fn from_display(display: impl Into<String>) -> Self {
        let display = display.into();
        let mut parts = display.split_whitespace();
        let amount = parts
            .next()
            .and_then(|s| s.replace(',', ".").parse::<f64>().ok())
            .unwrap_or(0.0);
        let currency = parts.next().unwrap_or("").to_string();
        Self {
            amount,
            currency,
            display,
        }
    }
}

/// One vendor's offer of one product at one price point, as of one fetch.
///
/// Listings are immutable snapshots: a new fetch produces entirely new
/// values and never mutates old ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    /// Product SKU
    pub sku: String,

    /// Human-readable product description
    pub description: String,

    /// Vendor display name
    pub vendor: String,

    /// Offer price
    pub price: Price,

    /// Direct product URL at the vendor
    pub link: String,

    /// Vendor id from the source page's vendor-filter directory, used to
    /// build pre-filtered source links; `None` when the vendor has no
    /// filter anchor
    #[serde(default)]
    pub vendor_id: Option<String>,

    /// Last-stock timestamp text from the source (sort key, not parsed)
    pub last_stock: String,

    /// Whether the listing is currently in stock
    pub available: bool,
}

impl Listing {
    /// Derive the stable identity key for this listing.
    ///
    /// Two listings with the same (sku, vendor, price display) are the same
    /// tracked item across cycles, even if `link`, `vendor_id`, or
    /// `last_stock` differ.
    /// A price change deliberately creates a new identity: it is effectively
    /// a different offer.
    pub fn key(&self) -> ListingKey {
        ListingKey(format!(
            "{}|{}|{}",
            self.sku, self.vendor, self.price.display
        ))
    }
}

/// Stable identity of a tracked listing, derived from its immutable
/// attributes. See [`Listing::key`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ListingKey(String);

impl ListingKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ListingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
