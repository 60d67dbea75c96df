//! Sponsored candidate selection with per-viewer frequency capping.
//!
//! Sponsored content is best-effort: any failure here yields an empty
//! selection for the page.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::db::promotion_repo::ImpressionRecord;
use crate::error::Result;
use crate::metrics::feed::FEED_PROMOTIONS_TOTAL;
use crate::models::PromotionCandidate;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CreativeSource: Send + Sync {
    async fn eligible_creatives(
        &self,
        placement: String,
        limit: usize,
        viewer: Option<Uuid>,
    ) -> Result<Vec<PromotionCandidate>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImpressionStore: Send + Sync {
    async fn impressions_since(
        &self,
        viewer: Uuid,
        campaign_ids: Vec<Uuid>,
        placement: String,
        since: DateTime<Utc>,
    ) -> Result<Vec<ImpressionRecord>>;
}

/// How many creatives to request for a page of `limit` organic items.
pub fn promotion_budget(limit: usize) -> usize {
    (limit / 2).max(1)
}

/// Drop candidates whose campaign already reached its cap inside the
/// candidate's own window ending at `now`. Uncapped candidates pass.
pub fn apply_frequency_caps(
    candidates: Vec<PromotionCandidate>,
    impressions: &[ImpressionRecord],
    now: DateTime<Utc>,
) -> Vec<PromotionCandidate> {
    let mut by_campaign: HashMap<Uuid, Vec<DateTime<Utc>>> = HashMap::new();
    for impression in impressions {
        by_campaign
            .entry(impression.campaign_id)
            .or_default()
            .push(impression.created_at);
    }

    candidates
        .into_iter()
        .filter(|candidate| {
            let Some((cap, window)) = candidate.frequency_cap() else {
                return true;
            };
            let since = now - window;
            let seen = by_campaign
                .get(&candidate.campaign_id)
                .map(|times| times.iter().filter(|t| **t >= since && **t <= now).count())
                .unwrap_or(0) as i64;

            if seen >= cap {
                debug!(
                    campaign_id = %candidate.campaign_id,
                    seen, cap, "campaign frequency-capped for viewer"
                );
                FEED_PROMOTIONS_TOTAL.with_label_values(&["capped"]).inc();
                false
            } else {
                true
            }
        })
        .collect()
}

pub struct PromotionSelector {
    creatives: Arc<dyn CreativeSource>,
    impressions: Arc<dyn ImpressionStore>,
    placement: String,
}

impl PromotionSelector {
    pub fn new(
        creatives: Arc<dyn CreativeSource>,
        impressions: Arc<dyn ImpressionStore>,
        placement: impl Into<String>,
    ) -> Self {
        Self {
            creatives,
            impressions,
            placement: placement.into(),
        }
    }

    pub fn placement(&self) -> &str {
        &self.placement
    }

    /// Eligible, uncapped candidates for this viewer. Never fails.
    pub async fn select(&self, limit: usize, viewer: Option<Uuid>) -> Vec<PromotionCandidate> {
        match self.try_select(limit, viewer, Utc::now()).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("promotion selection failed (serving organic only): {}", e);
                FEED_PROMOTIONS_TOTAL.with_label_values(&["unavailable"]).inc();
                Vec::new()
            }
        }
    }

    async fn try_select(
        &self,
        limit: usize,
        viewer: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<Vec<PromotionCandidate>> {
        let candidates = self
            .creatives
            .eligible_creatives(self.placement.clone(), promotion_budget(limit), viewer)
            .await?;

        let Some(viewer) = viewer else {
            return Ok(candidates);
        };

        let capped: Vec<&PromotionCandidate> = candidates
            .iter()
            .filter(|c| c.frequency_cap().is_some())
            .collect();
        let Some(lookback) = capped.iter().filter_map(|c| c.frequency_cap()).map(|(_, w)| w).max()
        else {
            return Ok(candidates);
        };

        let mut seen = HashSet::new();
        let campaign_ids: Vec<Uuid> = capped
            .iter()
            .map(|c| c.campaign_id)
            .filter(|id| seen.insert(*id))
            .collect();

        let impressions = self
            .impressions
            .impressions_since(viewer, campaign_ids, self.placement.clone(), now - lookback)
            .await?;

        Ok(apply_frequency_caps(candidates, &impressions, now))
    }
}
