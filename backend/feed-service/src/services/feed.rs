use chrono::Utc;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::Result;
use crate::metrics::feed::{FEED_REQUEST_DURATION_SECONDS, FEED_REQUEST_TOTAL};
use crate::models::{FeedCursor, FeedItem};

use super::expansion::FeedExpander;
use super::interleave::merge_feed;
use super::promotions::PromotionSelector;
use super::ranked_source::{FallbackRankedSource, RankingSource};

/// Normalized feed request.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedRequest {
    pub limit: usize,
    pub viewer: Option<Uuid>,
    pub cursor: Option<FeedCursor>,
}

/// One assembled page.
#[derive(Debug, Clone)]
pub struct FeedPage {
    pub items: Vec<FeedItem>,
    pub next_cursor: Option<FeedCursor>,
    pub source: RankingSource,
}

/// The feed-assembly pipeline: resolve rows, then expand them while
/// sponsored candidates are selected, then merge.
pub struct FeedService {
    ranked: FallbackRankedSource,
    expander: FeedExpander,
    promotions: PromotionSelector,
}

impl FeedService {
    pub fn new(
        ranked: FallbackRankedSource,
        expander: FeedExpander,
        promotions: PromotionSelector,
    ) -> Self {
        Self {
            ranked,
            expander,
            promotions,
        }
    }

    pub async fn get_feed(&self, request: &FeedRequest) -> Result<FeedPage> {
        let start = Instant::now();
        let viewer = request.viewer;

        debug!(
            viewer = ?viewer,
            limit = request.limit,
            has_cursor = request.cursor.is_some(),
            "assembling feed page"
        );

        let resolved = self
            .ranked
            .resolve(viewer, request.limit, request.cursor.clone())
            .await?;

        let (organic, promotions) = tokio::join!(
            self.expander.expand(&resolved.rows, viewer),
            self.promotions.select(request.limit, viewer),
        );
        let organic_count = organic.len();
        let promotion_count = promotions.len();

        let items = merge_feed(organic, promotions, self.promotions.placement(), Utc::now());

        let source = resolved.source.as_str();
        FEED_REQUEST_TOTAL.with_label_values(&[source]).inc();
        FEED_REQUEST_DURATION_SECONDS
            .with_label_values(&[source])
            .observe(start.elapsed().as_secs_f64());

        info!(
            source,
            rows = resolved.rows.len(),
            organic = organic_count,
            promotions = promotion_count,
            items = items.len(),
            has_more = resolved.next_cursor.is_some(),
            "feed page assembled"
        );

        Ok(FeedPage {
            items,
            next_cursor: resolved.next_cursor,
            source: resolved.source,
        })
    }
}
