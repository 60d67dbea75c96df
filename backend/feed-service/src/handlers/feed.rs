use actix_web::http::header;
use actix_web::{web, HttpMessage, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use crate::error::Result;
use crate::middleware::ViewerId;
use crate::models::{FeedCursor, FeedResponse, NextCursor};
use crate::services::{FeedRequest, FeedService};

pub const DEFAULT_LIMIT: usize = 30;
pub const MAX_LIMIT: usize = 60;

pub struct FeedHandlerState {
    pub feed: Arc<FeedService>,
    pub cache_max_age_secs: u64,
}

fn parse_limit(value: Option<&Value>) -> usize {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match parsed {
        Some(n) if n.is_finite() => (n.trunc() as i64).clamp(1, MAX_LIMIT as i64) as usize,
        _ => DEFAULT_LIMIT,
    }
}

fn parse_ts(value: Option<&Value>) -> Option<DateTime<Utc>> {
    let raw = value?.as_str()?.trim();
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

fn parse_id(value: Option<&Value>) -> Option<String> {
    let raw = value?.as_str()?.trim();
    (!raw.is_empty()).then(|| raw.to_string())
}

fn parse_score(value: Option<&Value>) -> Option<f64> {
    let score = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    score.is_finite().then_some(score)
}

fn parse_cursor(input: &Value) -> Option<FeedCursor> {
    let nested = input.get("cursor").filter(|c| c.is_object()).and_then(|c| {
        FeedCursor::from_parts(
            parse_ts(c.get("ts")),
            parse_id(c.get("id")),
            parse_score(c.get("score")),
        )
    });

    nested.or_else(|| {
        FeedCursor::from_parts(
            parse_ts(input.get("cursorTs")),
            parse_id(input.get("cursorId")),
            parse_score(input.get("cursorScore")),
        )
    })
}

/// Normalize either request shape into a `FeedRequest`. Never fails:
/// anything malformed falls back to the first page at the default limit.
pub fn normalize_request(input: &Value) -> FeedRequest {
    FeedRequest {
        limit: parse_limit(input.get("limit")),
        viewer: input
            .get("user_id")
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s.trim()).ok()),
        cursor: parse_cursor(input),
    }
}

fn query_to_value(params: HashMap<String, String>) -> Value {
    Value::Object(
        params
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect::<Map<String, Value>>(),
    )
}

fn parse_body(body: &[u8]) -> Result<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }
    Ok(serde_json::from_slice(body)?)
}

async fn serve_feed(
    http_req: &HttpRequest,
    state: &FeedHandlerState,
    input: &Value,
) -> Result<HttpResponse> {
    let mut request = normalize_request(input);
    let authenticated = http_req.extensions().get::<ViewerId>().map(|v| v.0);
    request.viewer = request.viewer.or(authenticated);

    let page = state.feed.get_feed(&request).await.map_err(|e| {
        error!("feed request failed: {}", e);
        e
    })?;

    Ok(HttpResponse::Ok()
        .insert_header((
            header::CACHE_CONTROL,
            format!("private, max-age={}", state.cache_max_age_secs),
        ))
        .json(FeedResponse {
            items: page.items,
            next_cursor: page.next_cursor.map(NextCursor::from),
        }))
}

/// `GET /api/v1/feed?limit=&user_id=&cursorTs=&cursorId=&cursorScore=`
pub async fn get_feed(
    http_req: HttpRequest,
    state: web::Data<FeedHandlerState>,
) -> Result<HttpResponse> {
    let params = web::Query::<HashMap<String, String>>::from_query(http_req.query_string())
        .map(web::Query::into_inner)
        .unwrap_or_default();

    serve_feed(&http_req, &state, &query_to_value(params)).await
}

/// `POST /api/v1/feed` with a JSON body; an empty body is the first page.
pub async fn post_feed(
    http_req: HttpRequest,
    body: web::Bytes,
    state: web::Data<FeedHandlerState>,
) -> Result<HttpResponse> {
    let input = parse_body(&body)?;
    serve_feed(&http_req, &state, &input).await
}
