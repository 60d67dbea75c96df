use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Kind of organic entity a feed row points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedItemType {
    Event,
    Post,
}

impl FeedItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedItemType::Event => "event",
            FeedItemType::Post => "post",
        }
    }
}

impl FromStr for FeedItemType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "event" => Ok(FeedItemType::Event),
            "post" => Ok(FeedItemType::Post),
            other => Err(format!("unknown feed item type: {}", other)),
        }
    }
}

impl fmt::Display for FeedItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row produced by a ranked source before expansion.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedRow {
    pub item_type: FeedItemType,
    pub item_id: Uuid,
    pub event_id: Uuid,
    pub score: f64,
    pub sort_ts: DateTime<Utc>,
}

/// Where the next page resumes. Every field is optional; a cursor with no
/// fields set is never constructed (see `FeedCursor::from_parts`).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeedCursor {
    pub ts: Option<DateTime<Utc>>,
    pub id: Option<String>,
    pub score: Option<f64>,
}

impl FeedCursor {
    pub fn from_parts(
        ts: Option<DateTime<Utc>>,
        id: Option<String>,
        score: Option<f64>,
    ) -> Option<Self> {
        if ts.is_none() && id.is_none() && score.is_none() {
            None
        } else {
            Some(Self { ts, id, score })
        }
    }

    /// Cursor that resumes the feed at `row`.
    pub fn resume_at(row: &FeedRow) -> Self {
        Self {
            ts: Some(row.sort_ts),
            id: Some(row.item_id.to_string()),
            score: Some(row.score),
        }
    }

    /// The cursor id as a UUID, when it is one.
    pub fn id_uuid(&self) -> Option<Uuid> {
        self.id.as_deref().and_then(|id| Uuid::parse_str(id).ok())
    }
}

/// Wire shape of the cursor returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextCursor {
    pub cursor_ts: Option<DateTime<Utc>>,
    pub cursor_id: Option<String>,
    pub cursor_score: Option<f64>,
}

impl From<FeedCursor> for NextCursor {
    fn from(cursor: FeedCursor) -> Self {
        Self {
            cursor_ts: cursor.ts,
            cursor_id: cursor.id,
            cursor_score: cursor.score,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedMetrics {
    pub likes: i64,
    pub comments: i64,
    pub viewer_has_liked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrequencyCapPeriod {
    Day,
    Week,
    None,
}

impl FrequencyCapPeriod {
    /// Rolling window the cap applies to, if any.
    pub fn window(&self) -> Option<chrono::Duration> {
        match self {
            FrequencyCapPeriod::Day => Some(chrono::Duration::days(1)),
            FrequencyCapPeriod::Week => Some(chrono::Duration::days(7)),
            FrequencyCapPeriod::None => None,
        }
    }
}

impl From<Option<&str>> for FrequencyCapPeriod {
    fn from(value: Option<&str>) -> Self {
        match value {
            Some("day") => FrequencyCapPeriod::Day,
            Some("week") => FrequencyCapPeriod::Week,
            _ => FrequencyCapPeriod::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateModel {
    Cpm,
    Cpc,
}

impl From<&str> for RateModel {
    fn from(value: &str) -> Self {
        if value.eq_ignore_ascii_case("cpc") {
            RateModel::Cpc
        } else {
            RateModel::Cpm
        }
    }
}

/// Display fields of the event a promotion points at, as returned by the
/// eligible-creatives source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotedEvent {
    pub title: Option<String>,
    pub description: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub cover_image: Option<String>,
    pub location: Option<String>,
    pub organizer_name: Option<String>,
    pub organizer_id: Option<Uuid>,
    pub owner_context_type: Option<String>,
}

/// A sponsored creative eligible for this placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionCandidate {
    pub campaign_id: Uuid,
    pub creative_id: Option<Uuid>,
    pub event_id: Uuid,
    pub priority: Option<i32>,
    pub frequency_cap_per_user: Option<i32>,
    pub frequency_cap_period: FrequencyCapPeriod,
    pub rate_model: RateModel,
    pub remaining_credits: Option<i64>,
    pub daily_remaining_credits: Option<i64>,
    pub headline: Option<String>,
    pub cta_label: Option<String>,
    pub cta_url: Option<String>,
    pub targeting: Option<serde_json::Value>,
    pub event: PromotedEvent,
}

impl PromotionCandidate {
    /// Cap and window when this candidate is subject to frequency capping.
    pub fn frequency_cap(&self) -> Option<(i64, chrono::Duration)> {
        let cap = self.frequency_cap_per_user?;
        let window = self.frequency_cap_period.window()?;
        Some((i64::from(cap), window))
    }
}

/// Promotion metadata attached to promoted feed items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionMeta {
    pub campaign_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creative_id: Option<Uuid>,
    pub placement: String,
    pub rate_model: RateModel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cta_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cta_url: Option<String>,
}

impl PromotionMeta {
    pub fn from_candidate(candidate: &PromotionCandidate, placement: &str) -> Self {
        Self {
            campaign_id: candidate.campaign_id,
            creative_id: candidate.creative_id,
            placement: placement.to_string(),
            rate_model: candidate.rate_model,
            headline: candidate.headline.clone(),
            cta_label: candidate.cta_label.clone(),
            cta_url: candidate.cta_url.clone(),
        }
    }
}

/// Expanded feed item returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    pub item_type: FeedItemType,
    pub sort_ts: DateTime<Utc>,
    pub item_id: Uuid,
    pub event_id: Uuid,
    pub event_title: String,
    pub event_description: Option<String>,
    pub event_starts_at: Option<DateTime<Utc>>,
    pub event_cover_image: Option<String>,
    pub organizer_name: Option<String>,
    pub organizer_id: Option<Uuid>,
    pub owner_context_type: Option<String>,
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_urls: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub metrics: FeedMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promotion: Option<PromotionMeta>,
    pub is_promoted: bool,
}

/// Feed response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedResponse {
    pub items: Vec<FeedItem>,
    pub next_cursor: Option<NextCursor>,
}
