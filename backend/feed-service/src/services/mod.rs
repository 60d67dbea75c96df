pub mod expansion;
pub mod feed;
pub mod interleave;
pub mod promotions;
pub mod ranked_source;

pub use expansion::{EntityStore, FeedExpander};
pub use feed::{FeedPage, FeedRequest, FeedService};
pub use interleave::{merge_feed, to_promotion_feed_item};
pub use promotions::{CreativeSource, ImpressionStore, PromotionSelector};
pub use ranked_source::{
    FallbackRankedSource, PrimaryRanker, RankedSource, RankingSource, RecencyFallback,
    ResolvedPage,
};
