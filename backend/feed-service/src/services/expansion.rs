//! Row expansion: turns ranked rows into display-ready feed items.
//!
//! Each concern is one batched lookup keyed by id. Lookup maps live only for
//! the request that built them.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::db::entity_repo::{EventRecord, PostRecord, ProfileRecord};
use crate::error::Result;
use crate::metrics::feed::FEED_ROWS_DROPPED_TOTAL;
use crate::models::{FeedItem, FeedItemType, FeedMetrics, FeedRow};

pub const ORGANIZATION_CONTEXT: &str = "organization";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn events_by_ids(&self, ids: Vec<Uuid>) -> Result<Vec<EventRecord>>;

    async fn posts_by_ids(&self, ids: Vec<Uuid>) -> Result<Vec<PostRecord>>;

    async fn profiles_by_ids(&self, ids: Vec<Uuid>) -> Result<Vec<ProfileRecord>>;

    async fn liked_post_ids(&self, viewer: Uuid, post_ids: Vec<Uuid>) -> Result<Vec<Uuid>>;
}

pub struct FeedExpander {
    store: Arc<dyn EntityStore>,
}

fn distinct<I: IntoIterator<Item = Uuid>>(ids: I) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

/// Organizer display fields: the organization for organization-owned
/// events, the creator profile otherwise.
pub fn resolve_organizer(event: &EventRecord) -> (Option<String>, Option<Uuid>) {
    if event.owner_context_type.as_deref() == Some(ORGANIZATION_CONTEXT) {
        (event.organization_name.clone(), event.organization_id)
    } else {
        (event.creator_name.clone(), event.creator_id)
    }
}

fn event_item(row: &FeedRow, event: &EventRecord) -> FeedItem {
    let (organizer_name, organizer_id) = resolve_organizer(event);

    FeedItem {
        item_type: row.item_type,
        sort_ts: row.sort_ts,
        item_id: row.item_id,
        event_id: event.id,
        event_title: event.title.clone(),
        event_description: event.description.clone(),
        event_starts_at: event.start_at,
        event_cover_image: event.cover_image_url.clone(),
        organizer_name,
        organizer_id,
        owner_context_type: event.owner_context_type.clone(),
        location: event.location.clone(),
        author_id: None,
        author_name: None,
        media_urls: None,
        content: None,
        metrics: FeedMetrics::default(),
        promotion: None,
        is_promoted: false,
    }
}

impl FeedExpander {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// Expand rows in order. Rows whose event (or post) does not resolve are
    /// dropped; a failed lookup resolves nothing. Never fails.
    pub async fn expand(&self, rows: &[FeedRow], viewer: Option<Uuid>) -> Vec<FeedItem> {
        if rows.is_empty() {
            return Vec::new();
        }

        let event_ids = distinct(rows.iter().map(|r| r.event_id));
        let post_ids = distinct(
            rows.iter()
                .filter(|r| r.item_type == FeedItemType::Post)
                .map(|r| r.item_id),
        );

        let events_fut = self.store.events_by_ids(event_ids);
        let posts_fut = async {
            if post_ids.is_empty() {
                Ok(Vec::new())
            } else {
                self.store.posts_by_ids(post_ids.clone()).await
            }
        };
        let likes_fut = self.viewer_likes(viewer, &post_ids);

        let (events, posts, liked) = tokio::join!(events_fut, posts_fut, likes_fut);

        let events: HashMap<Uuid, EventRecord> = match events {
            Ok(events) => events.into_iter().map(|e| (e.id, e)).collect(),
            Err(e) => {
                warn!("event lookup failed, dropping {} rows: {}", rows.len(), e);
                HashMap::new()
            }
        };
        let posts: HashMap<Uuid, PostRecord> = match posts {
            Ok(posts) => posts.into_iter().map(|p| (p.id, p)).collect(),
            Err(e) => {
                warn!("post lookup failed, dropping post rows: {}", e);
                HashMap::new()
            }
        };
        let authors = self
            .author_names(distinct(posts.values().map(|p| p.author_id)))
            .await;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(event) = events.get(&row.event_id) else {
                debug!("dropping {} {}: event {} missing", row.item_type, row.item_id, row.event_id);
                FEED_ROWS_DROPPED_TOTAL
                    .with_label_values(&["missing_event"])
                    .inc();
                continue;
            };

            let mut item = event_item(row, event);

            if row.item_type == FeedItemType::Post {
                let post = match posts.get(&row.item_id) {
                    Some(post) if post.event_id == event.id => post,
                    _ => {
                        debug!("dropping post {}: not found under event {}", row.item_id, event.id);
                        FEED_ROWS_DROPPED_TOTAL
                            .with_label_values(&["missing_post"])
                            .inc();
                        continue;
                    }
                };

                item.author_id = Some(post.author_id);
                item.author_name = authors.get(&post.author_id).cloned();
                item.media_urls = Some(post.media_urls.clone().unwrap_or_default());
                item.content = Some(post.content.clone().unwrap_or_default());
                item.metrics = FeedMetrics {
                    likes: post.like_count,
                    comments: post.comment_count,
                    viewer_has_liked: liked.contains(&post.id),
                };
            }

            items.push(item);
        }

        items
    }

    async fn viewer_likes(&self, viewer: Option<Uuid>, post_ids: &[Uuid]) -> HashSet<Uuid> {
        let Some(viewer) = viewer else {
            return HashSet::new();
        };
        if post_ids.is_empty() {
            return HashSet::new();
        }

        match self.store.liked_post_ids(viewer, post_ids.to_vec()).await {
            Ok(ids) => ids.into_iter().collect(),
            Err(e) => {
                warn!("like lookup failed for viewer {} (continuing unliked): {}", viewer, e);
                HashSet::new()
            }
        }
    }

    async fn author_names(&self, author_ids: Vec<Uuid>) -> HashMap<Uuid, String> {
        if author_ids.is_empty() {
            return HashMap::new();
        }

        match self.store.profiles_by_ids(author_ids).await {
            Ok(profiles) => profiles
                .into_iter()
                .filter_map(|p| p.display_name.map(|name| (p.id, name)))
                .collect(),
            Err(e) => {
                warn!("author lookup failed (continuing without names): {}", e);
                HashMap::new()
            }
        }
    }
}
