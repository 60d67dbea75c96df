use actix_web::{web, App, HttpServer};
use std::io;
use std::sync::Arc;
use tracing::info;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use event_feed_service::config::Config;
use event_feed_service::db::entity_repo::PgEntityStore;
use event_feed_service::db::promotion_repo::{PgCreativeSource, PgImpressionStore};
use event_feed_service::db::create_pool;
use event_feed_service::handlers::{
    feed_routes, liveness, readiness, FeedHandlerState, HealthState,
};
use event_feed_service::metrics::serve_metrics;
use event_feed_service::middleware::{CircuitBreaker, OptionalAuth};
use event_feed_service::services::{
    FallbackRankedSource, FeedExpander, FeedService, PrimaryRanker, PromotionSelector,
    RankedSource, RecencyFallback,
};

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = terminate.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!("SIGTERM handler unavailable, waiting on Ctrl+C: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info,sqlx=warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_thread_ids(true)
                .with_line_number(true)
                .with_file(true)
                .with_target(true),
        )
        .init();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("Configuration loading failed: {:#}", e);
            eprintln!("ERROR: Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!("Starting event-feed-service v{}", env!("CARGO_PKG_VERSION"));
    info!("Environment: {}", config.app.env);

    let db_pool = match create_pool(&config.database).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Database pool creation failed: {:#}", e);
            eprintln!("ERROR: Failed to create database pool: {}", e);
            std::process::exit(1);
        }
    };

    let primary: Option<Arc<dyn RankedSource>> = if config.feed.ranking_enabled {
        Some(Arc::new(PrimaryRanker::new(db_pool.clone())))
    } else {
        info!("Ranking disabled by configuration, serving recency feed only");
        None
    };
    let fallback: Arc<dyn RankedSource> = Arc::new(RecencyFallback::new(
        db_pool.clone(),
        config.feed.fallback_window_days,
    ));
    let ranked = FallbackRankedSource::new(
        primary,
        fallback,
        CircuitBreaker::new(config.circuit_breaker.clone()),
    );

    let expander = FeedExpander::new(Arc::new(PgEntityStore::new(db_pool.clone())));
    let promotions = PromotionSelector::new(
        Arc::new(PgCreativeSource::new(db_pool.clone())),
        Arc::new(PgImpressionStore::new(db_pool.clone())),
        config.feed.placement.clone(),
    );

    let feed_state = web::Data::new(FeedHandlerState {
        feed: Arc::new(FeedService::new(ranked, expander, promotions)),
        cache_max_age_secs: config.feed.cache_max_age_secs,
    });
    let health_state = web::Data::new(HealthState::new(db_pool.clone()));

    if config.auth.jwt_secret.is_none() {
        tracing::warn!("JWT_SECRET not set, all feed requests are served anonymously");
    }
    let auth = OptionalAuth::new(config.auth.jwt_secret.as_deref());

    let bind_addr = format!("{}:{}", config.app.host, config.app.port);
    info!("HTTP server listening on {}", bind_addr);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(feed_state.clone())
            .app_data(health_state.clone())
            .wrap(auth.clone())
            .wrap(TracingLogger::default())
            .route("/health", web::get().to(liveness))
            .route("/health/ready", web::get().to(readiness))
            .route("/metrics", web::get().to(serve_metrics))
            .configure(feed_routes)
    })
    .bind(&bind_addr)?
    .run();

    let server_handle = server.handle();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    tokio::select! {
        result = server => result?,
        _ = &mut shutdown => {
            info!("Shutdown signal received");
            server_handle.stop(true).await;
        }
    }

    db_pool.close().await;
    info!("event-feed-service stopped");
    Ok(())
}
