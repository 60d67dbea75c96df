//! Merge organic items with sponsored candidates into one page.
//!
//! A promotion for an event already on the page overlays that item in
//! place. The remaining promotions become synthetic items spaced through
//! the organic sequence; they are the only items not in ranked order.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::metrics::feed::FEED_PROMOTIONS_TOTAL;
use crate::models::{FeedItem, FeedItemType, FeedMetrics, PromotionCandidate, PromotionMeta};

pub const MIN_INTERVAL: usize = 3;
pub const PROMOTED_EVENT_TITLE: &str = "Promoted Event";

/// Organic items between two inserted promotions.
pub fn interleave_interval(organic_count: usize, unmatched_count: usize) -> usize {
    let stride = (organic_count as f64 / (unmatched_count + 1) as f64).round() as usize;
    stride.max(MIN_INTERVAL)
}

/// Build a synthetic event item from a promotion with no organic match.
pub fn to_promotion_feed_item(
    candidate: &PromotionCandidate,
    placement: &str,
    now: DateTime<Utc>,
) -> FeedItem {
    let event = &candidate.event;
    let title = event
        .title
        .clone()
        .or_else(|| candidate.headline.clone())
        .unwrap_or_else(|| PROMOTED_EVENT_TITLE.to_string());

    FeedItem {
        item_type: FeedItemType::Event,
        sort_ts: event.starts_at.unwrap_or(now),
        item_id: candidate.event_id,
        event_id: candidate.event_id,
        event_title: title,
        event_description: event.description.clone(),
        event_starts_at: event.starts_at,
        event_cover_image: event.cover_image.clone(),
        organizer_name: event.organizer_name.clone(),
        organizer_id: event.organizer_id,
        owner_context_type: event.owner_context_type.clone(),
        location: event.location.clone(),
        author_id: None,
        author_name: None,
        media_urls: None,
        content: None,
        metrics: FeedMetrics::default(),
        promotion: Some(PromotionMeta::from_candidate(candidate, placement)),
        is_promoted: true,
    }
}

pub fn merge_feed(
    organic: Vec<FeedItem>,
    promotions: Vec<PromotionCandidate>,
    placement: &str,
    now: DateTime<Utc>,
) -> Vec<FeedItem> {
    let mut items = organic;

    let mut by_event: HashMap<Uuid, usize> = HashMap::new();
    for (idx, item) in items.iter().enumerate() {
        if item.item_type == FeedItemType::Event {
            by_event.entry(item.event_id).or_insert(idx);
        }
    }

    let mut placed: HashSet<Uuid> = HashSet::new();
    let mut unmatched: Vec<FeedItem> = Vec::new();

    for candidate in &promotions {
        if !placed.insert(candidate.event_id) {
            FEED_PROMOTIONS_TOTAL.with_label_values(&["discarded"]).inc();
            continue;
        }

        match by_event.get(&candidate.event_id) {
            Some(&idx) => {
                let item = &mut items[idx];
                item.promotion = Some(PromotionMeta::from_candidate(candidate, placement));
                item.is_promoted = true;
                FEED_PROMOTIONS_TOTAL.with_label_values(&["overlay"]).inc();
            }
            None => {
                unmatched.push(to_promotion_feed_item(candidate, placement, now));
                FEED_PROMOTIONS_TOTAL.with_label_values(&["inserted"]).inc();
            }
        }
    }

    if unmatched.is_empty() {
        return items;
    }

    let interval = interleave_interval(items.len(), unmatched.len());
    let mut merged = Vec::with_capacity(items.len() + unmatched.len());
    let mut pending = unmatched.into_iter();

    for (idx, item) in items.into_iter().enumerate() {
        merged.push(item);
        if (idx + 1) % interval == 0 {
            if let Some(promoted) = pending.next() {
                merged.push(promoted);
            }
        }
    }
    merged.extend(pending);

    merged
}
