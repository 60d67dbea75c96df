//! Organic row sources and the ranked-then-recency resolver.
//!
//! `PrimaryRanker` wraps the opaque personalized ranking function.
//! `RecencyFallback` serves recent public events when ranking errors,
//! returns nothing, or is switched off. `FallbackRankedSource` composes the
//! two and turns a `limit + 1` fetch into a page plus next cursor.
//!
//! Ranking contract: `rank(viewer, n, cursor)` returns at most `n` rows in
//! the source's own order. When the cursor carries an id, the first row
//! returned is the row with that item id (the one held back from the
//! previous page) and the rest follow it in order.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::feed_repo;
use crate::error::{AppError, Result};
use crate::middleware::circuit_breaker::CircuitBreaker;
use crate::models::{FeedCursor, FeedItemType, FeedRow};

/// Score assigned to every recency fallback row.
pub const FALLBACK_SCORE: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankingSource {
    Ranked,
    Fallback,
}

impl RankingSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RankingSource::Ranked => "ranked",
            RankingSource::Fallback => "fallback",
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RankedSource: Send + Sync {
    async fn rank(
        &self,
        viewer: Option<Uuid>,
        limit: usize,
        cursor: Option<FeedCursor>,
    ) -> Result<Vec<FeedRow>>;

    fn source(&self) -> RankingSource;
}

pub struct PrimaryRanker {
    pool: PgPool,
}

impl PrimaryRanker {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RankedSource for PrimaryRanker {
    async fn rank(
        &self,
        viewer: Option<Uuid>,
        limit: usize,
        cursor: Option<FeedCursor>,
    ) -> Result<Vec<FeedRow>> {
        let cursor_id = cursor.as_ref().and_then(|c| c.id.as_deref());
        let records =
            feed_repo::fetch_ranked_rows(&self.pool, viewer, limit as i64, cursor_id).await?;

        let rows = records
            .into_iter()
            .filter_map(|record| match record.item_type.parse::<FeedItemType>() {
                Ok(item_type) => Some(FeedRow {
                    item_type,
                    item_id: record.item_id,
                    event_id: record.event_id,
                    score: record.score.unwrap_or_default(),
                    sort_ts: record.sort_ts,
                }),
                Err(e) => {
                    warn!("skipping ranked row {}: {}", record.item_id, e);
                    None
                }
            })
            .collect();

        Ok(rows)
    }

    fn source(&self) -> RankingSource {
        RankingSource::Ranked
    }
}

pub struct RecencyFallback {
    pool: PgPool,
    window: Duration,
}

impl RecencyFallback {
    pub fn new(pool: PgPool, window_days: i64) -> Self {
        Self {
            pool,
            window: Duration::days(window_days),
        }
    }
}

/// Map a public event onto a synthetic feed row.
pub fn recency_row(event_id: Uuid, start_at: DateTime<Utc>) -> FeedRow {
    FeedRow {
        item_type: FeedItemType::Event,
        item_id: event_id,
        event_id,
        score: FALLBACK_SCORE,
        sort_ts: start_at,
    }
}

#[async_trait]
impl RankedSource for RecencyFallback {
    async fn rank(
        &self,
        _viewer: Option<Uuid>,
        limit: usize,
        cursor: Option<FeedCursor>,
    ) -> Result<Vec<FeedRow>> {
        let since = Utc::now() - self.window;
        let before_ts = cursor.as_ref().and_then(|c| c.ts);
        let before_id = cursor.as_ref().and_then(FeedCursor::id_uuid);

        let events = feed_repo::fetch_recent_public_events(
            &self.pool,
            since,
            before_ts,
            before_id,
            limit as i64,
        )
        .await?;

        Ok(events
            .into_iter()
            .map(|e| recency_row(e.id, e.start_at))
            .collect())
    }

    fn source(&self) -> RankingSource {
        RankingSource::Fallback
    }
}

/// Rows for one page plus where the next page resumes.
#[derive(Debug, Clone)]
pub struct ResolvedPage {
    pub rows: Vec<FeedRow>,
    pub next_cursor: Option<FeedCursor>,
    pub source: RankingSource,
}

/// Split a `limit + 1` fetch into the page and the next cursor.
///
/// The extra row is held back and becomes the cursor; the next page starts
/// with it.
pub fn paginate(mut rows: Vec<FeedRow>, limit: usize) -> (Vec<FeedRow>, Option<FeedCursor>) {
    if rows.len() <= limit {
        return (rows, None);
    }

    rows.truncate(limit + 1);
    let next = rows.pop().map(|row| FeedCursor::resume_at(&row));
    (rows, next)
}

pub struct FallbackRankedSource {
    primary: Option<Arc<dyn RankedSource>>,
    fallback: Arc<dyn RankedSource>,
    breaker: CircuitBreaker,
}

impl FallbackRankedSource {
    pub fn new(
        primary: Option<Arc<dyn RankedSource>>,
        fallback: Arc<dyn RankedSource>,
        breaker: CircuitBreaker,
    ) -> Self {
        Self {
            primary,
            fallback,
            breaker,
        }
    }

    pub async fn resolve(
        &self,
        viewer: Option<Uuid>,
        limit: usize,
        cursor: Option<FeedCursor>,
    ) -> Result<ResolvedPage> {
        let fetch = limit + 1;

        if let Some(primary) = &self.primary {
            if self.breaker.allow().await {
                match primary.rank(viewer, fetch, cursor.clone()).await {
                    Ok(rows) if !rows.is_empty() => {
                        self.breaker.record_success().await;
                        let (rows, next_cursor) = paginate(rows, limit);
                        return Ok(ResolvedPage {
                            rows,
                            next_cursor,
                            source: primary.source(),
                        });
                    }
                    Ok(_) => {
                        self.breaker.record_success().await;
                        info!("ranking source returned no rows, serving recency fallback");
                    }
                    Err(e) => {
                        self.breaker.record_failure().await;
                        warn!("ranking source failed, serving recency fallback: {}", e);
                    }
                }
            } else {
                debug!("ranking breaker open, serving recency fallback");
            }
        }

        let rows = self
            .fallback
            .rank(viewer, fetch, cursor)
            .await
            .map_err(|e| AppError::RankingUnavailable(e.to_string()))?;
        let (rows, next_cursor) = paginate(rows, limit);

        Ok(ResolvedPage {
            rows,
            next_cursor,
            source: self.fallback.source(),
        })
    }
}
