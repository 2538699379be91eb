use crate::types::{Item, Result, SiftError};
use chrono::Utc;
use feed_rs::parser;
use tracing::debug;
use uuid::Uuid;

/// Cheap sniff for syndication markup before handing the body to the real
/// parser; bodies that fail this check become a typed `BadContent` failure
/// for their endpoint instead of a transport error.
pub fn looks_like_feed(content: &str) -> bool {
    let trimmed = content.trim_start();
    if !trimmed.starts_with('<') {
        return false;
    }
    let lowered = trimmed.to_lowercase();
    lowered.contains("<rss")
        || lowered.contains("<feed")
        || lowered.contains("<channel")
        || lowered.contains("<rdf")
}

/// Parse a raw feed document into items attributed to `source_id`.
pub fn parse_document(content: &str, source_id: i64) -> Result<Vec<Item>> {
    let feed = parser::parse(content.as_bytes())
        .map_err(|e| SiftError::Parse(format!("failed to parse feed: {}", e)))?;

    let items: Vec<Item> = feed
        .entries
        .into_iter()
        .map(|entry| entry_to_item(entry, source_id))
        .collect();

    debug!("parsed {} entries for source {}", items.len(), source_id);
    Ok(items)
}

fn entry_to_item(entry: feed_rs::model::Entry, source_id: i64) -> Item {
    // An entry without a link gets a generated identity. Re-fetching such an
    // entry yields a fresh identity, so it shows up as a near-duplicate item;
    // the merge layer does not compensate for this.
    let id = entry
        .links
        .first()
        .map(|link| link.href.clone())
        .filter(|href| !href.is_empty())
        .unwrap_or_else(|| format!("urn:uuid:{}", Uuid::new_v4()));

    let title = entry
        .title
        .map(|t| t.content)
        .unwrap_or_else(|| "Untitled".to_string());

    let description = entry
        .summary
        .map(|s| s.content)
        .or_else(|| entry.content.and_then(|c| c.body))
        .map(|html| strip_html(&html))
        .filter(|text| !text.is_empty());

    let published_at = entry
        .published
        .or(entry.updated)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    Item {
        id,
        source_id,
        title,
        description,
        published_at,
        read: false,
        saved: false,
        saved_from_view: None,
    }
}

/// Remove HTML tags from entry text and collapse whitespace.
pub fn strip_html(html: &str) -> String {
    html.chars()
        .fold((String::new(), false), |(mut text, in_tag), c| match c {
            '<' => (text, true),
            '>' => (text, false),
            _ if !in_tag => {
                text.push(c);
                (text, in_tag)
            }
            _ => (text, in_tag),
        })
        .0
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
