use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// Row shape returned by the `get_personalized_feed` ranking function.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RankedRowRecord {
    pub item_type: String,
    pub item_id: Uuid,
    pub event_id: Uuid,
    pub score: Option<f64>,
    pub sort_ts: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RecentEventRecord {
    pub id: Uuid,
    pub start_at: DateTime<Utc>,
}

/// Call the ranking function. `cursor_id` is the item id the page resumes at.
pub async fn fetch_ranked_rows(
    pool: &PgPool,
    viewer_id: Option<Uuid>,
    limit: i64,
    cursor_id: Option<&str>,
) -> Result<Vec<RankedRowRecord>, sqlx::Error> {
    sqlx::query_as::<_, RankedRowRecord>(
        r#"
        SELECT item_type, item_id, event_id, score, sort_ts
        FROM get_personalized_feed($1, $2, $3)
        "#,
    )
    .bind(viewer_id)
    .bind(limit)
    .bind(cursor_id)
    .fetch_all(pool)
    .await
}

/// Public events starting at or after `since`, newest first.
///
/// With `before_ts` and `before_id` the page resumes at that keyset
/// (inclusive); with only `before_ts` it starts strictly before it.
pub async fn fetch_recent_public_events(
    pool: &PgPool,
    since: DateTime<Utc>,
    before_ts: Option<DateTime<Utc>>,
    before_id: Option<Uuid>,
    limit: i64,
) -> Result<Vec<RecentEventRecord>, sqlx::Error> {
    sqlx::query_as::<_, RecentEventRecord>(
        r#"
        SELECT id, start_at
        FROM events
        WHERE visibility = 'public'
          AND start_at >= $1
          AND (
                $2::timestamptz IS NULL
                OR ($3::uuid IS NULL AND start_at < $2)
                OR ($3::uuid IS NOT NULL AND (start_at, id) <= ($2, $3))
              )
        ORDER BY start_at DESC, id DESC
        LIMIT $4
        "#,
    )
    .bind(since)
    .bind(before_ts)
    .bind(before_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}
