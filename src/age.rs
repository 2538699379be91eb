use crate::types::Item;
use chrono::{DateTime, Duration, Utc};

/// Drop items older than `threshold_minutes` at `now`. A `None` or
/// non-positive threshold keeps everything. Age is measured at evaluation
/// time, not fetch time, so repeated calls over the same items can thin the
/// result as the clock advances.
pub fn filter_by_age(
    items: Vec<Item>,
    threshold_minutes: Option<i64>,
    now: DateTime<Utc>,
) -> Vec<Item> {
    let minutes = match threshold_minutes {
        Some(m) if m > 0 => m,
        _ => return items,
    };
    let cutoff = now - Duration::minutes(minutes);
    items
        .into_iter()
        .filter(|item| item.published_at >= cutoff)
        .collect()
}
