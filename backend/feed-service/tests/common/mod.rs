//! In-memory stand-ins for the Postgres-backed stores.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use event_feed_service::config::CircuitBreakerSettings;
use event_feed_service::db::entity_repo::{EventRecord, PostRecord, ProfileRecord};
use event_feed_service::db::promotion_repo::ImpressionRecord;
use event_feed_service::error::{AppError, Result};
use event_feed_service::middleware::CircuitBreaker;
use event_feed_service::models::{
    FeedCursor, FeedItemType, FeedRow, FrequencyCapPeriod, PromotedEvent, PromotionCandidate,
    RateModel,
};
use event_feed_service::services::{
    CreativeSource, EntityStore, FallbackRankedSource, FeedExpander, FeedService,
    ImpressionStore, PromotionSelector, RankedSource, RankingSource,
};

pub const PLACEMENT: &str = "feed";

pub fn id(n: u128) -> Uuid {
    Uuid::from_u128(n)
}

/// Whole-second timestamps, newest first as `n` grows smaller.
pub fn ts(minutes_ago: i64) -> DateTime<Utc> {
    let base = Utc
        .with_ymd_and_hms(2026, 6, 1, 12, 0, 0)
        .single()
        .expect("valid base timestamp");
    base - Duration::minutes(minutes_ago)
}

pub fn event_row(n: u128) -> FeedRow {
    FeedRow {
        item_type: FeedItemType::Event,
        item_id: id(n),
        event_id: id(n),
        score: 1.0 / n as f64,
        sort_ts: ts(n as i64),
    }
}

pub fn post_row(post: u128, event: u128, minutes_ago: i64) -> FeedRow {
    FeedRow {
        item_type: FeedItemType::Post,
        item_id: id(post),
        event_id: id(event),
        score: 0.5,
        sort_ts: ts(minutes_ago),
    }
}

pub fn event_record(n: u128) -> EventRecord {
    EventRecord {
        id: id(n),
        title: format!("Event {}", n),
        description: Some("Live music on the pier".to_string()),
        start_at: Some(ts(-(n as i64) * 60)),
        cover_image_url: None,
        location: Some("Harbor Stage".to_string()),
        owner_context_type: None,
        organization_id: None,
        organization_name: None,
        creator_id: Some(id(90_000 + n)),
        creator_name: Some(format!("Host {}", n)),
    }
}

pub fn post_record(post: u128, event: u128, author: u128) -> PostRecord {
    PostRecord {
        id: id(post),
        event_id: id(event),
        author_id: id(author),
        content: Some("See you there".to_string()),
        media_urls: None,
        like_count: 4,
        comment_count: 1,
    }
}

pub fn candidate(campaign: u128, event: u128) -> PromotionCandidate {
    PromotionCandidate {
        campaign_id: id(campaign),
        creative_id: Some(id(campaign + 1)),
        event_id: id(event),
        priority: Some(1),
        frequency_cap_per_user: None,
        frequency_cap_period: FrequencyCapPeriod::None,
        rate_model: RateModel::Cpm,
        remaining_credits: Some(1_000),
        daily_remaining_credits: None,
        headline: Some(format!("Sponsored {}", event)),
        cta_label: Some("Get tickets".to_string()),
        cta_url: None,
        targeting: None,
        event: PromotedEvent {
            title: Some(format!("Promoted {}", event)),
            ..PromotedEvent::default()
        },
    }
}

/// Rows kept in feed order with inclusive keyset resume on `(sort_ts, item_id)`.
pub struct InMemoryRanker {
    rows: Vec<FeedRow>,
    source: RankingSource,
    failing: bool,
    calls: AtomicUsize,
}

impl InMemoryRanker {
    pub fn new(mut rows: Vec<FeedRow>, source: RankingSource) -> Self {
        rows.sort_by(|a, b| (b.sort_ts, b.item_id).cmp(&(a.sort_ts, a.item_id)));
        Self {
            rows,
            source,
            failing: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(source: RankingSource) -> Self {
        Self {
            failing: true,
            ..Self::new(Vec::new(), source)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RankedSource for InMemoryRanker {
    async fn rank(
        &self,
        _viewer: Option<Uuid>,
        limit: usize,
        cursor: Option<FeedCursor>,
    ) -> Result<Vec<FeedRow>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(AppError::Database("ranking function unavailable".into()));
        }

        let resume = cursor.as_ref().and_then(|c| c.ts.map(|ts| (ts, c.id_uuid())));
        Ok(self
            .rows
            .iter()
            .filter(|row| match resume {
                Some((ts, Some(id))) => (row.sort_ts, row.item_id) <= (ts, id),
                Some((ts, None)) => row.sort_ts < ts,
                None => true,
            })
            .take(limit)
            .cloned()
            .collect())
    }

    fn source(&self) -> RankingSource {
        self.source
    }
}

/// Lets a test keep a handle on a ranker after it is moved into the service.
pub struct SharedRanker(pub Arc<InMemoryRanker>);

#[async_trait]
impl RankedSource for SharedRanker {
    async fn rank(
        &self,
        viewer: Option<Uuid>,
        limit: usize,
        cursor: Option<FeedCursor>,
    ) -> Result<Vec<FeedRow>> {
        self.0.rank(viewer, limit, cursor).await
    }

    fn source(&self) -> RankingSource {
        self.0.source()
    }
}

#[derive(Default)]
pub struct InMemoryEntityStore {
    pub events: HashMap<Uuid, EventRecord>,
    pub posts: HashMap<Uuid, PostRecord>,
    pub profiles: HashMap<Uuid, ProfileRecord>,
    pub likes: HashSet<(Uuid, Uuid)>,
    pub events_offline: bool,
}

impl InMemoryEntityStore {
    pub fn with_events(ns: impl IntoIterator<Item = u128>) -> Self {
        let mut store = Self::default();
        for n in ns {
            store.add_event(event_record(n));
        }
        store
    }

    pub fn add_event(&mut self, event: EventRecord) {
        self.events.insert(event.id, event);
    }

    pub fn add_post(&mut self, post: PostRecord) {
        self.posts.insert(post.id, post);
    }

    pub fn add_profile(&mut self, user: Uuid, name: &str) {
        self.profiles.insert(
            user,
            ProfileRecord {
                id: user,
                display_name: Some(name.to_string()),
            },
        );
    }

    pub fn like(&mut self, viewer: Uuid, post: Uuid) {
        self.likes.insert((viewer, post));
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn events_by_ids(&self, ids: Vec<Uuid>) -> Result<Vec<EventRecord>> {
        if self.events_offline {
            return Err(AppError::Database("events table unavailable".into()));
        }
        Ok(ids.iter().filter_map(|i| self.events.get(i).cloned()).collect())
    }

    async fn posts_by_ids(&self, ids: Vec<Uuid>) -> Result<Vec<PostRecord>> {
        Ok(ids.iter().filter_map(|i| self.posts.get(i).cloned()).collect())
    }

    async fn profiles_by_ids(&self, ids: Vec<Uuid>) -> Result<Vec<ProfileRecord>> {
        Ok(ids.iter().filter_map(|i| self.profiles.get(i).cloned()).collect())
    }

    async fn liked_post_ids(&self, viewer: Uuid, post_ids: Vec<Uuid>) -> Result<Vec<Uuid>> {
        Ok(post_ids
            .into_iter()
            .filter(|p| self.likes.contains(&(viewer, *p)))
            .collect())
    }
}

/// Serves a fixed creative list, truncated to the requested budget.
#[derive(Default)]
pub struct StaticCreatives {
    pub candidates: Vec<PromotionCandidate>,
    pub failing: bool,
}

#[async_trait]
impl CreativeSource for StaticCreatives {
    async fn eligible_creatives(
        &self,
        _placement: String,
        limit: usize,
        _viewer: Option<Uuid>,
    ) -> Result<Vec<PromotionCandidate>> {
        if self.failing {
            return Err(AppError::Database("get_eligible_creatives missing".into()));
        }
        Ok(self.candidates.iter().take(limit).cloned().collect())
    }
}

#[derive(Default)]
pub struct InMemoryImpressions {
    pub records: Mutex<Vec<ImpressionRecord>>,
}

impl InMemoryImpressions {
    pub fn record(&self, campaign: Uuid, viewer: Uuid, at: DateTime<Utc>) {
        if let Ok(mut records) = self.records.lock() {
            records.push(ImpressionRecord {
                campaign_id: campaign,
                user_id: viewer,
                placement: PLACEMENT.to_string(),
                created_at: at,
            });
        }
    }
}

#[async_trait]
impl ImpressionStore for InMemoryImpressions {
    async fn impressions_since(
        &self,
        viewer: Uuid,
        campaign_ids: Vec<Uuid>,
        placement: String,
        since: DateTime<Utc>,
    ) -> Result<Vec<ImpressionRecord>> {
        let records = self
            .records
            .lock()
            .map_err(|e| AppError::Database(format!("impression log poisoned: {}", e)))?;
        Ok(records
            .iter()
            .filter(|r| {
                r.user_id == viewer
                    && r.placement == placement
                    && r.created_at >= since
                    && campaign_ids.contains(&r.campaign_id)
            })
            .cloned()
            .collect())
    }
}

pub fn breaker() -> CircuitBreaker {
    CircuitBreaker::new(CircuitBreakerSettings::default())
}

pub struct ServiceParts {
    pub primary: Option<Arc<dyn RankedSource>>,
    pub fallback: Arc<dyn RankedSource>,
    pub entities: InMemoryEntityStore,
    pub creatives: StaticCreatives,
    pub impressions: Arc<InMemoryImpressions>,
}

impl ServiceParts {
    pub fn new(primary: Option<Arc<dyn RankedSource>>, fallback: Arc<dyn RankedSource>) -> Self {
        Self {
            primary,
            fallback,
            entities: InMemoryEntityStore::default(),
            creatives: StaticCreatives::default(),
            impressions: Arc::new(InMemoryImpressions::default()),
        }
    }

    pub fn build(self) -> FeedService {
        let impressions: Arc<dyn ImpressionStore> = self.impressions;
        FeedService::new(
            FallbackRankedSource::new(self.primary, self.fallback, breaker()),
            FeedExpander::new(Arc::new(self.entities)),
            PromotionSelector::new(Arc::new(self.creatives), impressions, PLACEMENT),
        )
    }
}
