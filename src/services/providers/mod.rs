/// Music data and playlist collaborators
///
/// The pipeline only ever talks to these traits. The Spotify Web API client is the
/// production implementation; tests substitute mocks.
use crate::{
    error::AppResult,
    models::{
        ArtistId, ArtistMetadata, AudioFeatures, PlaylistId, PlaylistSummary, TimeRange,
        TopTrack, TrackId, TrackMetadata, UserId,
    },
};

pub mod spotify;

pub use spotify::SpotifyClient;

/// Source of raw track and artist attributes
///
/// Implementations are bound to one authenticated session, so "the user" in
/// `top_tracks` is whoever the session belongs to.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait DataSource: Send + Sync {
    /// The session user's most played tracks in the given window, most played first
    async fn top_tracks(&self, window: TimeRange, limit: u32) -> AppResult<Vec<TopTrack>>;

    async fn audio_features(&self, track_id: &TrackId) -> AppResult<AudioFeatures>;

    /// Popularity, name and primary artist of a track
    async fn track_metadata(&self, track_id: &TrackId) -> AppResult<TrackMetadata>;

    /// Popularity and genre tags of an artist
    async fn artist_metadata(&self, artist_id: &ArtistId) -> AppResult<ArtistMetadata>;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}

/// Destination for generated playlists
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait PlaylistSink: Send + Sync {
    /// Creates an empty playlist and returns its ID
    async fn create_playlist(
        &self,
        owner: &UserId,
        name: &str,
        description: &str,
    ) -> AppResult<PlaylistId>;

    async fn list_playlists(&self, owner: &UserId) -> AppResult<Vec<PlaylistSummary>>;

    /// Appends tracks in order. Callers keep `track_ids` within the sink's batch limit.
    async fn add_items(&self, playlist_id: &PlaylistId, track_ids: &[TrackId]) -> AppResult<()>;
}
