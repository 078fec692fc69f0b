pub mod features;
pub mod fetcher;
pub mod pipeline;
pub mod playlist;
pub mod providers;
pub mod recommendations;

pub use fetcher::TrackFeatureFetcher;
pub use pipeline::Catalog;
pub use playlist::{PlaylistBuilder, PlaylistHandle};
pub use recommendations::{Ranking, Recommendation, Recommender, PAGE_SIZE};
