use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result as AppResult;
use crate::models::{FrequencyCapPeriod, PromotedEvent, PromotionCandidate, RateModel};
use crate::services::promotions::{CreativeSource, ImpressionStore};

/// Row shape returned by `get_eligible_creatives`. Budget, targeting and
/// flight-window filtering already happened inside the function.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CreativeRecord {
    pub campaign_id: Uuid,
    pub creative_id: Option<Uuid>,
    pub event_id: Uuid,
    pub priority: Option<i32>,
    pub frequency_cap_per_user: Option<i32>,
    pub frequency_cap_period: Option<String>,
    pub rate_model: Option<String>,
    pub remaining_credits: Option<i64>,
    pub daily_remaining_credits: Option<i64>,
    pub headline: Option<String>,
    pub cta_label: Option<String>,
    pub cta_url: Option<String>,
    pub targeting: Option<serde_json::Value>,
    pub event_title: Option<String>,
    pub event_description: Option<String>,
    pub event_start_at: Option<DateTime<Utc>>,
    pub event_cover_image_url: Option<String>,
    pub event_location: Option<String>,
    pub organizer_name: Option<String>,
    pub organizer_id: Option<Uuid>,
    pub owner_context_type: Option<String>,
}

impl From<CreativeRecord> for PromotionCandidate {
    fn from(record: CreativeRecord) -> Self {
        PromotionCandidate {
            campaign_id: record.campaign_id,
            creative_id: record.creative_id,
            event_id: record.event_id,
            priority: record.priority,
            frequency_cap_per_user: record.frequency_cap_per_user,
            frequency_cap_period: FrequencyCapPeriod::from(
                record.frequency_cap_period.as_deref(),
            ),
            rate_model: record
                .rate_model
                .as_deref()
                .map(RateModel::from)
                .unwrap_or(RateModel::Cpm),
            remaining_credits: record.remaining_credits,
            daily_remaining_credits: record.daily_remaining_credits,
            headline: record.headline,
            cta_label: record.cta_label,
            cta_url: record.cta_url,
            targeting: record.targeting,
            event: PromotedEvent {
                title: record.event_title,
                description: record.event_description,
                starts_at: record.event_start_at,
                cover_image: record.event_cover_image_url,
                location: record.event_location,
                organizer_name: record.organizer_name,
                organizer_id: record.organizer_id,
                owner_context_type: record.owner_context_type,
            },
        }
    }
}

/// A prior exposure of a campaign to a viewer. Written elsewhere; read here
/// only to enforce frequency caps.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ImpressionRecord {
    pub campaign_id: Uuid,
    pub user_id: Uuid,
    pub placement: String,
    pub created_at: DateTime<Utc>,
}

pub async fn fetch_eligible_creatives(
    pool: &PgPool,
    placement: &str,
    limit: i64,
    viewer_id: Option<Uuid>,
) -> Result<Vec<CreativeRecord>, sqlx::Error> {
    sqlx::query_as::<_, CreativeRecord>(
        r#"
        SELECT campaign_id, creative_id, event_id, priority,
               frequency_cap_per_user, frequency_cap_period, rate_model,
               remaining_credits, daily_remaining_credits,
               headline, cta_label, cta_url, targeting,
               event_title, event_description, event_start_at, event_cover_image_url,
               event_location, organizer_name, organizer_id, owner_context_type
        FROM get_eligible_creatives($1, $2, $3)
        "#,
    )
    .bind(placement)
    .bind(limit)
    .bind(viewer_id)
    .fetch_all(pool)
    .await
}

pub async fn fetch_impressions_since(
    pool: &PgPool,
    user_id: Uuid,
    campaign_ids: &[Uuid],
    placement: &str,
    since: DateTime<Utc>,
) -> Result<Vec<ImpressionRecord>, sqlx::Error> {
    sqlx::query_as::<_, ImpressionRecord>(
        r#"
        SELECT campaign_id, user_id, placement, created_at
        FROM ad_impressions
        WHERE user_id = $1
          AND campaign_id = ANY($2)
          AND placement = $3
          AND created_at >= $4
        "#,
    )
    .bind(user_id)
    .bind(campaign_ids)
    .bind(placement)
    .bind(since)
    .fetch_all(pool)
    .await
}

pub struct PgCreativeSource {
    pool: PgPool,
}

impl PgCreativeSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CreativeSource for PgCreativeSource {
    async fn eligible_creatives(
        &self,
        placement: String,
        limit: usize,
        viewer: Option<Uuid>,
    ) -> AppResult<Vec<PromotionCandidate>> {
        let records =
            fetch_eligible_creatives(&self.pool, &placement, limit as i64, viewer).await?;
        Ok(records.into_iter().map(PromotionCandidate::from).collect())
    }
}

pub struct PgImpressionStore {
    pool: PgPool,
}

impl PgImpressionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ImpressionStore for PgImpressionStore {
    async fn impressions_since(
        &self,
        viewer: Uuid,
        campaign_ids: Vec<Uuid>,
        placement: String,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<ImpressionRecord>> {
        Ok(fetch_impressions_since(&self.pool, viewer, &campaign_ids, &placement, since).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creative_record_maps_unknown_values_to_defaults() {
        let record = CreativeRecord {
            campaign_id: Uuid::new_v4(),
            creative_id: None,
            event_id: Uuid::new_v4(),
            priority: Some(5),
            frequency_cap_per_user: Some(3),
            frequency_cap_period: Some("month".to_string()),
            rate_model: None,
            remaining_credits: Some(100),
            daily_remaining_credits: None,
            headline: Some("Don't miss it".to_string()),
            cta_label: None,
            cta_url: None,
            targeting: None,
            event_title: Some("Night Market".to_string()),
            event_description: None,
            event_start_at: None,
            event_cover_image_url: None,
            event_location: None,
            organizer_name: None,
            organizer_id: None,
            owner_context_type: None,
        };

        let candidate = PromotionCandidate::from(record);
        assert_eq!(candidate.frequency_cap_period, FrequencyCapPeriod::None);
        assert_eq!(candidate.rate_model, RateModel::Cpm);
        assert!(candidate.frequency_cap().is_none());
        assert_eq!(candidate.event.title.as_deref(), Some("Night Market"));
    }
}
