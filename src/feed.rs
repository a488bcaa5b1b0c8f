//! Paginated pull of location records from an external feed.
//!
//! A page looks like
//! `{"results": [record...], "deleted": [id...], "next_cursor": "..."|null}`.
//! Records are normalized into [`Location`]s on the way in; anything that
//! fails to parse is logged and skipped so one bad record never sinks a poll.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::Value;

use crate::models::RawLocationRecord;
use crate::store::FeedEvent;

// ---

/// One decoded feed page.
#[derive(Debug, Default)]
pub struct FeedPage {
    pub events: Vec<FeedEvent>,
    pub next_cursor: Option<String>,
    /// Records that could not be decoded.
    pub skipped: usize,
}

/// Decode a single page body. Upserts come before deletions.
pub fn parse_page(page: &Value, now: DateTime<Utc>) -> FeedPage {
    // ---
    let mut parsed = FeedPage::default();

    match page.get("results").and_then(|r| r.as_array()) {
        Some(records) => {
            for (i, item) in records.iter().enumerate() {
                let decoded = serde_json::from_value::<RawLocationRecord>(item.clone())
                    .map_err(|e| e.to_string())
                    .and_then(|raw| raw.to_location(now).map_err(|e| e.to_string()));
                match decoded {
                    Ok(location) => parsed.events.push(FeedEvent::Upsert(location)),
                    Err(e) => {
                        parsed.skipped += 1;
                        tracing::debug!(
                            "Failed to parse feed item {}: {} - Raw item: {}",
                            i,
                            e,
                            item
                        );
                    }
                }
            }
        }
        None => tracing::debug!("Feed page missing 'results' field or not an array"),
    }

    if let Some(deleted) = page.get("deleted").and_then(|d| d.as_array()) {
        parsed.events.extend(
            deleted
                .iter()
                .filter_map(|id| id.as_str())
                .map(|id| FeedEvent::Delete(id.to_string())),
        );
    }

    parsed.next_cursor = page
        .get("next_cursor")
        .and_then(|c| c.as_str())
        .filter(|c| !c.is_empty())
        .map(String::from);

    parsed
}

/// Follow `next_cursor` until exhausted or `max_pages` pages were read.
///
/// Any transport or decoding failure of a whole page aborts the poll; the
/// caller keeps serving its last good snapshot.
pub async fn fetch_feed(
    client: &Client,
    base_url: &str,
    max_pages: u32,
) -> Result<Vec<FeedEvent>> {
    // ---
    let mut events = Vec::new();
    let mut cursor: Option<String> = None;
    let mut page_count = 0;

    loop {
        if page_count >= max_pages {
            tracing::debug!(
                "Hit page limit of {}, stopping pagination. Collected {} events so far.",
                max_pages,
                events.len()
            );
            break;
        }
        page_count += 1;

        let mut request = client.get(base_url);
        if let Some(ref cursor) = cursor {
            request = request.query(&[("cursor", cursor)]);
        }

        tracing::debug!("Fetching feed page {} from: {}", page_count, base_url);

        let body: Value = request
            .send()
            .await?
            .error_for_status()
            .map_err(|e| anyhow!("Feed request failed on page {}: {}", page_count, e))?
            .json()
            .await?;

        let page = parse_page(&body, Utc::now());
        tracing::debug!(
            "Feed page {}: {} events, {} skipped, next_cursor {:?}",
            page_count,
            page.events.len(),
            page.skipped,
            page.next_cursor
        );

        events.extend(page.events);
        cursor = page.next_cursor;

        if cursor.is_none() {
            break;
        }
    }

    tracing::info!(
        "Finished fetching {} feed events from {} pages",
        events.len(),
        page_count
    );
    Ok(events)
}
