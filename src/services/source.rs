// src/services/source.rs

//! Stock listing source.
//!
//! Fetches the remote stock page and parses its listing table into
//! [`Listing`] rows. A fetch or parse failure aborts the whole cycle so a
//! partial result can never corrupt the availability snapshot.

use std::collections::HashMap;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{Listing, Price};

/// Provider of raw listing rows for one fetch cycle.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Fetch the current listings from the remote source.
    async fn fetch_listings(&self) -> Result<Vec<Listing>>;
}

/// rpilocator-style HTML table source.
///
/// Expected column order per row: SKU, description, link, _, vendor,
/// available ("Yes"/"No"), last stock, price.
pub struct HtmlTableSource {
    client: reqwest::Client,
    url: String,
}

impl HtmlTableSource {
    /// Create a source reading from the given listing page.
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    /// Parse the listing table out of a fetched page.
    pub fn parse_listings(&self, html: &str) -> Result<Vec<Listing>> {
        let document = Html::parse_document(html);
        let row_sel = parse_selector("table tr")?;
        let cell_sel = parse_selector("th, td")?;
        let link_sel = parse_selector("a")?;
        let td_sel = parse_selector("td")?;
        let vendor_sel = parse_selector("a[data-vendor]")?;

        let vendor_ids = Self::parse_vendor_ids(&document, &vendor_sel);
        let base_url = url::Url::parse(&self.url)?;
        let mut listings = Vec::new();

        for row in document.select(&row_sel) {
            // Header rows have no <td> cells
            if row.select(&td_sel).next().is_none() {
                continue;
            }
            if let Some(listing) =
                Self::parse_row(&row, &cell_sel, &link_sel, &base_url, &vendor_ids)
            {
                listings.push(listing);
            }
        }

        Ok(listings)
    }

    /// Parse the page's vendor-filter directory: anchor text maps to the
    /// `data-vendor` id used in the source's `?vendor=` query filter.
    ///
    /// Anchor labels lead with a country code ("UK pimoroni.com"); the table
    /// shows the name first ("pimoroni.com UK"), so the leading token is
    /// moved to the end before the lookup key is stored. The "All"
    /// pseudo-vendor is skipped.
    fn parse_vendor_ids(document: &Html, vendor_sel: &Selector) -> HashMap<String, String> {
        document
            .select(vendor_sel)
            .filter_map(|anchor| {
                let id = anchor.value().attr("data-vendor")?;
                let label = anchor.text().collect::<String>();
                let name = normalize_vendor_label(&label);
                if name.is_empty() || name == "All" {
                    return None;
                }
                Some((name, id.to_string()))
            })
            .collect()
    }

    fn parse_row(
        row: &ElementRef<'_>,
        cell_sel: &Selector,
        link_sel: &Selector,
        base_url: &url::Url,
        vendor_ids: &HashMap<String, String>,
    ) -> Option<Listing> {
        let cells: Vec<ElementRef<'_>> = row.select(cell_sel).collect();
        if cells.len() < 8 {
            return None;
        }

        let text = |i: usize| -> String {
            cells[i].text().collect::<String>().trim().to_string()
        };

        let sku = text(0);
        if sku.is_empty() {
            return None;
        }

        let raw_link = cells[2]
            .select(link_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
            .unwrap_or("");
        let link = match base_url.join(raw_link) {
            Ok(resolved) if !raw_link.is_empty() => resolved.to_string(),
            _ => String::new(),
        };

        let vendor = text(4);
        let vendor_id = vendor_ids.get(&vendor).cloned();

        Some(Listing {
            sku,
            description: text(1),
            vendor,
            available: text(5).eq_ignore_ascii_case("yes"),
            last_stock: text(6),
            price: Price::from_display(text(7)),
            link,
            vendor_id,
        })
    }
}

/// Turn "UK pimoroni.com" into "pimoroni.com UK"; single-token labels pass
/// through unchanged.
fn normalize_vendor_label(label: &str) -> String {
    let mut tokens = label.split_whitespace();
    let Some(country) = tokens.next() else {
        return String::new();
    };
    let name = tokens.collect::<Vec<_>>().join(" ");
    if name.is_empty() {
        country.to_string()
    } else {
        format!("{name} {country}")
    }
}

#[async_trait]
impl ListingSource for HtmlTableSource {
    async fn fetch_listings(&self) -> Result<Vec<Listing>> {
        let html = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AppError::fetch(&self.url, e))?
            .text()
            .await
            .map_err(|e| AppError::fetch(&self.url, e))?;

        self.parse_listings(&html)
    }
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}
