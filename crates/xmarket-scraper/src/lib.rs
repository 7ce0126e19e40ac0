pub mod client;
pub mod error;
pub mod group;
pub mod normalize;
pub mod orchestrator;
pub mod throttle;
pub mod title;
pub mod types;

pub use client::{MarketClient, MarketClientConfig};
pub use error::{RunError, ScraperError};
pub use group::{group_listings, summarize, GroupSummary};
pub use normalize::{normalize_item, normalize_page};
pub use orchestrator::{
    Orchestrator, OrchestratorConfig, SearchEndpoint, DEADLINE_SKIPPED,
};
pub use throttle::RequestThrottle;
pub use title::{TitleNormalizer, CAPACITY_TOKEN, SCREEN_SIZE_TOKEN};
pub use types::{RawItem, SearchPage};
