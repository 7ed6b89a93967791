//! Notice list resolution.
//!
//! The listing endpoint has served three shapes over time:
//!
//! - a JSON array of notice summaries,
//! - a nested HTML table with one anchor per column,
//! - an HTML page where the only usable signal is the detail-page links.
//!
//! Whatever the shape, identifiers come out normalised (`/` → `_`) because
//! the detail URL template expects that form. A failed listing fetch is
//! fatal: without identifiers there is nothing to do.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::config::{ListingFormat, Settings};
use crate::error::TfrError;
use crate::fetch::{HttpClient, fetch_bytes, parse_url};
use crate::record::{ListedNotice, NoticeId, NoticeMetadata};

/// Keys that have carried the notice identifier in the JSON listing.
const JSON_ID_KEYS: [&str; 2] = ["notam_id", "notamNumber"];

static DETAIL_HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"detail_([^/?#]+?)\.html").expect("detail link pattern is valid")
});

/// Where the notice rows sit inside the HTML table listing.
///
/// The boundary rows are fixed by the page layout, not computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableLayout {
    /// Index among tables nested inside another table.
    pub table_index: usize,
    pub header_rows: usize,
    pub footer_rows: usize,
}

impl Default for TableLayout {
    fn default() -> Self {
        Self {
            table_index: 2,
            header_rows: 7,
            footer_rows: 4,
        }
    }
}

/// Fetches and parses the listing. Any failure here aborts the run.
#[tracing::instrument(
    skip(client, settings),
    fields(url = %settings.list_url, format = ?settings.listing_format)
)]
pub async fn resolve_notices<C: HttpClient + ?Sized>(
    client: &C,
    settings: &Settings,
) -> Result<Vec<ListedNotice>, TfrError> {
    let url = parse_url(&settings.list_url)?;
    let fetched = fetch_bytes(client, &url, settings.retry).await.map_err(|e| {
        error!(error = %e, "Listing fetch failed");
        TfrError::Http(e)
    })?;

    if !fetched.is_success() {
        error!(status = fetched.status.as_u16(), "Listing endpoint returned an error status");
        return Err(TfrError::ListingStatus {
            url: settings.list_url.clone(),
            status: fetched.status.as_u16(),
        });
    }

    let notices = parse_listing(settings.listing_format, &fetched.text())?;
    info!(count = notices.len(), "Listing resolved");
    Ok(notices)
}

pub fn parse_listing(format: ListingFormat, body: &str) -> Result<Vec<ListedNotice>, TfrError> {
    match format {
        ListingFormat::Json => parse_json_listing(body),
        ListingFormat::HtmlTable => parse_html_table(body, &TableLayout::default()),
        ListingFormat::DetailLinks => parse_detail_links(body),
    }
}

/// Parses the JSON listing: an array of objects, one per notice.
pub fn parse_json_listing(body: &str) -> Result<Vec<ListedNotice>, TfrError> {
    let json: Value = serde_json::from_str(body)?;
    let items = json
        .as_array()
        .ok_or_else(|| TfrError::ListingParse("expected a JSON array of notices".into()))?;

    let notices = items
        .iter()
        .filter_map(|item| {
            let Some(id) = JSON_ID_KEYS
                .iter()
                .find_map(|key| string_field(item, key))
                .and_then(|raw| NoticeId::parse(&raw))
            else {
                debug!(?item, "Listing entry without identifier");
                return None;
            };

            Some(ListedNotice {
                id,
                metadata: NoticeMetadata {
                    facility: string_field(item, "facility"),
                    state: string_field(item, "state"),
                    notice_type: string_field(item, "type"),
                    description: string_field(item, "description"),
                },
            })
        })
        .collect();

    Ok(notices)
}

/// Parses the nested-table listing. Each data row holds anchors for
/// (date, notam, facility, state, type, description).
pub fn parse_html_table(html: &str, layout: &TableLayout) -> Result<Vec<ListedNotice>, TfrError> {
    let document = Html::parse_document(html);
    let nested_table = selector("table table")?;
    let row_sel = selector("tr")?;
    let anchor_sel = selector("a")?;

    let table = document
        .select(&nested_table)
        .nth(layout.table_index)
        .ok_or_else(|| {
            TfrError::ListingParse(format!(
                "listing page has no nested table at index {}",
                layout.table_index
            ))
        })?;

    let rows: Vec<ElementRef> = table.select(&row_sel).collect();
    let end = rows.len().saturating_sub(layout.footer_rows);
    let body = rows.get(layout.header_rows..end).unwrap_or(&[]);

    let mut notices = Vec::new();
    for row in body {
        let cells: Vec<String> = row.select(&anchor_sel).map(element_text).collect();
        if cells.len() < 2 {
            continue;
        }
        let Some(id) = NoticeId::parse(&cells[1]) else {
            warn!(row = ?cells, "Listing row with empty identifier");
            continue;
        };
        let cell = |i: usize| cells.get(i).filter(|s| !s.is_empty()).cloned();

        notices.push(ListedNotice {
            id,
            metadata: NoticeMetadata {
                facility: cell(2),
                state: cell(3),
                notice_type: cell(4),
                description: cell(5),
            },
        });
    }

    Ok(notices)
}

/// Harvests identifiers from `save_pages/detail_<id>.html` links, first
/// appearance wins.
pub fn parse_detail_links(html: &str) -> Result<Vec<ListedNotice>, TfrError> {
    let document = Html::parse_document(html);
    let link_sel = selector(r#"a[href*="save_pages/detail"]"#)?;

    let mut seen = HashSet::new();
    let mut notices = Vec::new();
    for href in document.select(&link_sel).filter_map(|a| a.value().attr("href")) {
        let Some(id) = DETAIL_HREF
            .captures(href)
            .and_then(|caps| caps.get(1))
            .and_then(|m| NoticeId::parse(m.as_str()))
        else {
            debug!(href, "Detail link without recognisable identifier");
            continue;
        };
        if seen.insert(id.clone()) {
            notices.push(ListedNotice::bare(id));
        }
    }

    Ok(notices)
}

fn selector(css: &str) -> Result<Selector, TfrError> {
    Selector::parse(css)
        .map_err(|e| TfrError::ListingParse(format!("invalid CSS selector '{css}': {e}")))
}

fn element_text(el: ElementRef) -> String {
    el.text().collect::<String>().trim().to_owned()
}

fn string_field(item: &Value, key: &str) -> Option<String> {
    item.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}
