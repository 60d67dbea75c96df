pub mod feed;
pub mod health;

pub use feed::{get_feed, normalize_request, post_feed, FeedHandlerState};
pub use health::{liveness, readiness, HealthState};

use actix_web::web;

/// Register `GET` and `POST /api/v1/feed`.
pub fn feed_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/v1/feed")
            .route(web::get().to(feed::get_feed))
            .route(web::post().to(feed::post_feed)),
    );
}
