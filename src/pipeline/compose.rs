// src/pipeline/compose.rs

//! Message composition.
//!
//! Pure rendering of deltas and ledger views into Markdown message text.
//! Text is always recomputed from the current sets rather than patched, so
//! the rendered string can never drift from the tracked state.

use std::collections::BTreeMap;

use crate::models::{Listing, ListingKey};
use crate::pipeline::ledger::EntryView;

const HEADER: &str = "🛍️ Stock changes!";
const IN_STOCK_HEADER: &str = "New stock available! 🔥🔥";
const OUT_OF_STOCK_HEADER: &str = "Now out of stock! 😔";

/// Stateless renderer for alert messages.
#[derive(Debug, Clone)]
pub struct MessageComposer {
    source_url: String,
    use_direct_link: bool,
}

impl MessageComposer {
    /// Create a composer.
    ///
    /// `source_url` is the listing page used for footer links and, unless
    /// `use_direct_link` is set, for per-item links too.
    pub fn new(source_url: impl Into<String>, use_direct_link: bool) -> Self {
        Self {
            source_url: source_url.into(),
            use_direct_link,
        }
    }

    /// Render the alert for a batch of newly available listings.
    pub fn compose_alert(&self, added: &BTreeMap<ListingKey, Listing>) -> String {
        self.compose(added, &BTreeMap::new())
    }

    /// Re-render an already sent alert from its ledger view.
    pub fn compose_update(&self, view: &EntryView) -> String {
        self.compose(&view.available, &view.unavailable)
    }

    fn compose(
        &self,
        available: &BTreeMap<ListingKey, Listing>,
        unavailable: &BTreeMap<ListingKey, Listing>,
    ) -> String {
        let mut message = HEADER.to_string();

        if !available.is_empty() {
            message.push_str(&format!("\n\n{IN_STOCK_HEADER}\n"));
            message.push_str(
                &available
                    .values()
                    .map(|l| format!("✅ {}", self.listing_line(l)))
                    .collect::<Vec<_>>()
                    .join("\n"),
            );
        }

        if !unavailable.is_empty() {
            message.push_str(&format!("\n\n{OUT_OF_STOCK_HEADER}\n"));
            message.push_str(
                &unavailable
                    .values()
                    .map(|l| format!("❌ {}", self.listing_line(l)))
                    .collect::<Vec<_>>()
                    .join("\n"),
            );
        }

        message.push_str(&format!(
            "\n\nStock data from [{}]({})",
            self.source_host(),
            with_tracking(&self.source_url, None)
        ));
        message
    }

    /// One Markdown line for a listing: `[description | vendor | price](link)`.
    fn listing_line(&self, listing: &Listing) -> String {
        format!(
            "[{} | {} | {}]({})",
            listing.description,
            listing.vendor,
            listing.price.display,
            self.listing_link(listing)
        )
    }

    /// The link target for one listing.
    ///
    /// Direct links go straight to the vendor's product page. Indirect links
    /// point at the source page, pre-filtered to the vendor when its filter
    /// id is known.
    fn listing_link(&self, listing: &Listing) -> String {
        if self.use_direct_link && !listing.link.is_empty() {
            return with_tracking(&listing.link, None);
        }
        with_tracking(&self.source_url, listing.vendor_id.as_deref())
    }

    fn source_host(&self) -> String {
        url::Url::parse(&self.source_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| self.source_url.clone())
    }
}

/// Append the optional vendor filter and the tracking parameters to a link,
/// tolerating unparseable input. The vendor pair comes first so the filter
/// reads as part of the target, not the tracking tail.
fn with_tracking(link: &str, vendor_id: Option<&str>) -> String {
    match url::Url::parse(link) {
        Ok(mut url) => {
            {
                let mut pairs = url.query_pairs_mut();
                if let Some(id) = vendor_id {
                    pairs.append_pair("vendor", id);
                }
                pairs
                    .append_pair("utm_source", "telegram")
                    .append_pair("utm_medium", "stock_alert");
            }
            url.to_string()
        }
        Err(_) => link.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Price;
    use crate::services::MessageHandle;

    fn listing(sku: &str, vendor: &str) -> Listing {
        Listing {
            sku: sku.to_string(),
            description: format!("{sku} - 4GB RAM"),
            vendor: vendor.to_string(),
            price: Price::from_display("61.39 EUR"),
            link: format!("https://{vendor}/products/{sku}"),
            vendor_id: None,
            last_stock: "2026-08-20".to_string(),
            available: true,
        }
    }

    fn as_map(listings: &[Listing]) -> BTreeMap<ListingKey, Listing> {
        listings.iter().map(|l| (l.key(), l.clone())).collect()
    }

    fn composer() -> MessageComposer {
        MessageComposer::new("https://rpilocator.com/", false)
    }

    #[test]
    fn test_alert_lists_added_items() {
        let added = as_map(&[listing("RPI4", "pimoroni.com")]);
        let text = composer().compose_alert(&added);

        assert!(text.starts_with(HEADER));
        assert!(text.contains(IN_STOCK_HEADER));
        assert!(text.contains("✅ [RPI4 - 4GB RAM | pimoroni.com | 61.39 EUR]"));
        assert!(!text.contains(OUT_OF_STOCK_HEADER));
        assert!(text.contains("utm_source=telegram"));
    }

    #[test]
    fn test_alert_is_deterministic() {
        let added = as_map(&[listing("RPI5", "b.com"), listing("RPI4", "a.com")]);
        let first = composer().compose_alert(&added);
        let second = composer().compose_alert(&added);
        assert_eq!(first, second);

        // BTreeMap iteration puts RPI4 before RPI5
        let pos4 = first.find("RPI4").unwrap();
        let pos5 = first.find("RPI5").unwrap();
        assert!(pos4 < pos5);
    }

    #[test]
    fn test_update_renders_both_sections() {
        let still_up = listing("RPI5", "thepihut.com");
        let gone = listing("RPI4", "pimoroni.com");
        let view = EntryView {
            handle: MessageHandle {
                message_id: 1,
                chat_id: "c".to_string(),
            },
            available: as_map(std::slice::from_ref(&still_up)),
            unavailable: as_map(std::slice::from_ref(&gone)),
        };

        let text = composer().compose_update(&view);
        assert!(text.contains(IN_STOCK_HEADER));
        assert!(text.contains(OUT_OF_STOCK_HEADER));
        assert!(text.contains("✅ [RPI5"));
        assert!(text.contains("❌ [RPI4"));
    }

    #[test]
    fn test_direct_link_uses_vendor_url() {
        let composer = MessageComposer::new("https://rpilocator.com/", true);
        let added = as_map(&[listing("RPI4", "pimoroni.com")]);
        let text = composer.compose_alert(&added);
        assert!(text.contains("https://pimoroni.com/products/RPI4?utm_source=telegram"));
    }

    #[test]
    fn test_indirect_link_points_at_source() {
        let added = as_map(&[listing("RPI4", "pimoroni.com")]);
        let text = composer().compose_alert(&added);
        assert!(!text.contains("pimoroni.com/products"));
        assert!(text.contains("https://rpilocator.com/?utm_source=telegram"));
    }

    #[test]
    fn test_indirect_link_carries_vendor_filter() {
        let mut item = listing("RPI4", "pimoroni.com");
        item.vendor_id = Some("pimoroni".to_string());
        let text = composer().compose_alert(&as_map(&[item]));
        // Vendor filter precedes the tracking parameters
        assert!(text.contains("https://rpilocator.com/?vendor=pimoroni&utm_source=telegram"));
    }

    #[test]
    fn test_direct_link_ignores_vendor_filter() {
        let composer = MessageComposer::new("https://rpilocator.com/", true);
        let mut item = listing("RPI4", "pimoroni.com");
        item.vendor_id = Some("pimoroni".to_string());
        let text = composer.compose_alert(&as_map(&[item]));
        assert!(!text.contains("vendor=pimoroni"));
        assert!(text.contains("https://pimoroni.com/products/RPI4?utm_source=telegram"));
    }

    #[test]
    fn test_footer_has_no_vendor_filter() {
        let mut item = listing("RPI4", "pimoroni.com");
        item.vendor_id = Some("pimoroni".to_string());
        let text = composer().compose_alert(&as_map(&[item]));
        assert!(text.contains("Stock data from [rpilocator.com](https://rpilocator.com/?utm_source=telegram"));
    }

    #[test]
    fn test_missing_fields_render_empty() {
        let mut bare = listing("RPI4", "pimoroni.com");
        bare.description = String::new();
        bare.link = String::new();
        let composer = MessageComposer::new("https://rpilocator.com/", true);
        let text = composer.compose_alert(&as_map(&[bare]));
        // Empty direct link falls back to the source page
        assert!(text.contains("[ | pimoroni.com | 61.39 EUR](https://rpilocator.com/"));
    }

    #[test]
    fn test_footer_always_present() {
        let text = composer().compose_alert(&BTreeMap::new());
        assert!(text.contains("Stock data from [rpilocator.com]"));
    }
}
