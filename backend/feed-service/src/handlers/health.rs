use actix_web::{web, HttpResponse};
use serde::Serialize;
use sqlx::PgPool;
use std::time::Instant;

pub struct HealthState {
    db_pool: PgPool,
}

#[derive(Serialize)]
#[serde(rename_all = "lowercase")]
enum ComponentStatus {
    Healthy,
    Unhealthy,
}

#[derive(Serialize)]
struct ReadinessResponse {
    ready: bool,
    postgres: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    latency_ms: u64,
}

impl HealthState {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    async fn check_postgres(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.db_pool)
            .await
            .map(|_| ())
    }
}

/// Liveness: the process is up and serving.
pub async fn liveness() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "service": "event-feed-service",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Readiness: the store behind every feed request answers.
pub async fn readiness(state: web::Data<HealthState>) -> HttpResponse {
    let start = Instant::now();
    let result = state.check_postgres().await;
    let latency_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(()) => HttpResponse::Ok().json(ReadinessResponse {
            ready: true,
            postgres: ComponentStatus::Healthy,
            message: None,
            latency_ms,
        }),
        Err(e) => {
            tracing::warn!("readiness check failed: {}", e);
            HttpResponse::ServiceUnavailable().json(ReadinessResponse {
                ready: false,
                postgres: ComponentStatus::Unhealthy,
                message: Some(format!("PostgreSQL connection failed: {}", e)),
                latency_ms,
            })
        }
    }
}
