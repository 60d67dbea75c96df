use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result as AppResult;
use crate::services::expansion::EntityStore;

/// Event core fields joined with the creator profile and owning organization.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventRecord {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub start_at: Option<DateTime<Utc>>,
    pub cover_image_url: Option<String>,
    pub location: Option<String>,
    pub owner_context_type: Option<String>,
    pub organization_id: Option<Uuid>,
    pub organization_name: Option<String>,
    pub creator_id: Option<Uuid>,
    pub creator_name: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PostRecord {
    pub id: Uuid,
    pub event_id: Uuid,
    pub author_id: Uuid,
    pub content: Option<String>,
    pub media_urls: Option<Vec<String>>,
    pub like_count: i64,
    pub comment_count: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProfileRecord {
    pub id: Uuid,
    pub display_name: Option<String>,
}

pub async fn find_events_by_ids(
    pool: &PgPool,
    event_ids: &[Uuid],
) -> Result<Vec<EventRecord>, sqlx::Error> {
    sqlx::query_as::<_, EventRecord>(
        r#"
        SELECT e.id,
               COALESCE(e.title, '') AS title,
               e.description,
               e.start_at,
               e.cover_image_url,
               e.location,
               e.owner_context_type,
               o.id AS organization_id,
               o.name AS organization_name,
               p.id AS creator_id,
               p.display_name AS creator_name
        FROM events e
        LEFT JOIN profiles p ON p.id = e.created_by
        LEFT JOIN organizations o
               ON e.owner_context_type = 'organization' AND o.id = e.owner_context_id
        WHERE e.id = ANY($1)
        "#,
    )
    .bind(event_ids)
    .fetch_all(pool)
    .await
}

pub async fn find_posts_by_ids(
    pool: &PgPool,
    post_ids: &[Uuid],
) -> Result<Vec<PostRecord>, sqlx::Error> {
    sqlx::query_as::<_, PostRecord>(
        r#"
        SELECT id, event_id, author_id, content, media_urls,
               COALESCE(like_count, 0)::bigint AS like_count,
               COALESCE(comment_count, 0)::bigint AS comment_count
        FROM event_posts
        WHERE id = ANY($1) AND deleted_at IS NULL
        "#,
    )
    .bind(post_ids)
    .fetch_all(pool)
    .await
}

pub async fn find_profiles_by_ids(
    pool: &PgPool,
    user_ids: &[Uuid],
) -> Result<Vec<ProfileRecord>, sqlx::Error> {
    sqlx::query_as::<_, ProfileRecord>(
        r#"
        SELECT id, display_name
        FROM profiles
        WHERE id = ANY($1)
        "#,
    )
    .bind(user_ids)
    .fetch_all(pool)
    .await
}

pub async fn find_liked_post_ids(
    pool: &PgPool,
    user_id: Uuid,
    post_ids: &[Uuid],
) -> Result<Vec<Uuid>, sqlx::Error> {
    sqlx::query_scalar::<_, Uuid>(
        r#"
        SELECT post_id
        FROM post_reactions
        WHERE user_id = $1 AND post_id = ANY($2) AND kind = 'like'
        "#,
    )
    .bind(user_id)
    .bind(post_ids)
    .fetch_all(pool)
    .await
}

/// Postgres-backed entity lookups for feed expansion.
pub struct PgEntityStore {
    pool: PgPool,
}

impl PgEntityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntityStore for PgEntityStore {
    async fn events_by_ids(&self, ids: Vec<Uuid>) -> AppResult<Vec<EventRecord>> {
        Ok(find_events_by_ids(&self.pool, &ids).await?)
    }

    async fn posts_by_ids(&self, ids: Vec<Uuid>) -> AppResult<Vec<PostRecord>> {
        Ok(find_posts_by_ids(&self.pool, &ids).await?)
    }

    async fn profiles_by_ids(&self, ids: Vec<Uuid>) -> AppResult<Vec<ProfileRecord>> {
        Ok(find_profiles_by_ids(&self.pool, &ids).await?)
    }

    async fn liked_post_ids(&self, viewer: Uuid, post_ids: Vec<Uuid>) -> AppResult<Vec<Uuid>> {
        Ok(find_liked_post_ids(&self.pool, viewer, &post_ids).await?)
    }
}
