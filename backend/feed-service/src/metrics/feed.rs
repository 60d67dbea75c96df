use lazy_static::lazy_static;
use prometheus::{register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec};

lazy_static! {
    /// Feed pages served, by the organic source that produced them (ranked, fallback).
    pub static ref FEED_REQUEST_TOTAL: IntCounterVec = register_int_counter_vec!(
        "feed_request_total",
        "Total feed pages served segmented by organic source",
        &["source"]
    )
    .expect("failed to register feed_request_total");

    /// End-to-end pipeline duration by organic source.
    pub static ref FEED_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "feed_request_duration_seconds",
        "Feed pipeline duration segmented by organic source",
        &["source"]
    )
    .expect("failed to register feed_request_duration_seconds");

    /// Ranked rows dropped during expansion (missing_event, missing_post).
    pub static ref FEED_ROWS_DROPPED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "feed_rows_dropped_total",
        "Feed rows dropped because their entity no longer resolves",
        &["reason"]
    )
    .expect("failed to register feed_rows_dropped_total");

    /// Promotion outcomes (overlay, inserted, capped, discarded, unavailable).
    pub static ref FEED_PROMOTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "feed_promotions_total",
        "Sponsored candidates segmented by outcome",
        &["outcome"]
    )
    .expect("failed to register feed_promotions_total");
}
