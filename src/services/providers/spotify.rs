/// Spotify Web API provider
///
/// Implements both collaborator traits against the Web API with one session's
/// bearer token. A client is built per session and never shared across users.
///
/// Endpoints:
/// 1. Identity: /me
/// 2. Data source: /me/top/tracks, /audio-features/{id}, /tracks/{id}, /artists/{id}
/// 3. Sink: /users/{owner}/playlists, /playlists/{id}/tracks
use crate::{
    error::{AppError, AppResult},
    models::{
        spotify::{
            AddItemsBody, CreatePlaylistBody, SpotifyArtist, SpotifyPage, SpotifyPlaylist,
            SpotifyTrack, SpotifyUser,
        },
        ArtistId, ArtistMetadata, AudioFeatures, PlaylistId, PlaylistSummary, TimeRange,
        TopTrack, TrackId, TrackMetadata, UserId,
    },
    services::providers::{DataSource, PlaylistSink},
};
use reqwest::{Client as HttpClient, RequestBuilder, Response};
use serde::de::DeserializeOwned;

#[derive(Clone)]
pub struct SpotifyClient {
    http_client: HttpClient,
    api_url: String,
    access_token: String,
}

impl SpotifyClient {
    pub fn new(http_client: HttpClient, api_url: String, access_token: String) -> Self {
        Self {
            http_client,
            api_url: api_url.trim_end_matches('/').to_string(),
            access_token,
        }
    }

    /// Resolves the user the access token belongs to
    pub async fn current_user(&self) -> AppResult<UserId> {
        let user: SpotifyUser = self.get_json("/me", &[]).await?;
        Ok(user.id)
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.bearer_auth(&self.access_token)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> AppResult<T> {
        let url = format!("{}{}", self.api_url, path);

        let response = self
            .request(self.http_client.get(&url))
            .query(query)
            .send()
            .await?;

        let response = Self::check_status(response, path).await?;

        let response_text = response.text().await?;
        tracing::debug!(path = %path, response = %response_text, "Raw Spotify API response");

        serde_json::from_str(&response_text).map_err(|e| {
            tracing::error!(
                error = %e,
                path = %path,
                "Failed to deserialize Spotify response"
            );
            AppError::ExternalApi(format!("Failed to parse Spotify response: {}", e))
        })
    }

    async fn check_status(response: Response, path: &str) -> AppResult<Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AppError::Unauthorized(format!(
                "Spotify rejected the access token: {}",
                body
            )));
        }

        Err(AppError::ExternalApi(format!(
            "Spotify API returned status {} for {}: {}",
            status, path, body
        )))
    }
}

#[async_trait::async_trait]
impl DataSource for SpotifyClient {
    async fn top_tracks(&self, window: TimeRange, limit: u32) -> AppResult<Vec<TopTrack>> {
        let page: SpotifyPage<SpotifyTrack> = self
            .get_json(
                "/me/top/tracks",
                &[
                    ("time_range", window.as_str().to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;

        let tracks = page.into_top_tracks();

        tracing::info!(
            window = window.as_str(),
            results = tracks.len(),
            provider = "spotify",
            "Top tracks fetched"
        );

        Ok(tracks)
    }

    async fn audio_features(&self, track_id: &TrackId) -> AppResult<AudioFeatures> {
        self.get_json(&format!("/audio-features/{}", track_id), &[])
            .await
    }

    async fn track_metadata(&self, track_id: &TrackId) -> AppResult<TrackMetadata> {
        let track: SpotifyTrack = self.get_json(&format!("/tracks/{}", track_id), &[]).await?;

        let artist = track.primary_artist().cloned().ok_or_else(|| {
            AppError::ExternalApi(format!("Track {} has no credited artist", track_id))
        })?;

        Ok(TrackMetadata {
            popularity: track.popularity,
            name: track.name,
            artist_id: artist.id,
            artist_name: artist.name,
        })
    }

    async fn artist_metadata(&self, artist_id: &ArtistId) -> AppResult<ArtistMetadata> {
        let artist: SpotifyArtist = self
            .get_json(&format!("/artists/{}", artist_id), &[])
            .await?;
        Ok(artist.into())
    }

    fn name(&self) -> &'static str {
        "spotify"
    }
}

#[async_trait::async_trait]
impl PlaylistSink for SpotifyClient {
    async fn create_playlist(
        &self,
        owner: &UserId,
        name: &str,
        description: &str,
    ) -> AppResult<PlaylistId> {
        let path = format!("/users/{}/playlists", owner);
        let url = format!("{}{}", self.api_url, path);

        let response = self
            .request(self.http_client.post(&url))
            .json(&CreatePlaylistBody {
                name,
                description,
                public: true,
            })
            .send()
            .await?;

        let response = Self::check_status(response, &path).await?;
        let playlist: SpotifyPlaylist = response.json().await?;

        tracing::info!(
            playlist_id = %playlist.id,
            owner = %owner,
            provider = "spotify",
            "Playlist created"
        );

        Ok(playlist.id)
    }

    async fn list_playlists(&self, owner: &UserId) -> AppResult<Vec<PlaylistSummary>> {
        let page: SpotifyPage<SpotifyPlaylist> = self
            .get_json(&format!("/users/{}/playlists", owner), &[])
            .await?;
        Ok(page.items.into_iter().map(PlaylistSummary::from).collect())
    }

    async fn add_items(&self, playlist_id: &PlaylistId, track_ids: &[TrackId]) -> AppResult<()> {
        let path = format!("/playlists/{}/tracks", playlist_id);
        let url = format!("{}{}", self.api_url, path);

        let response = self
            .request(self.http_client.post(&url))
            .json(&AddItemsBody::from_track_ids(track_ids))
            .send()
            .await?;

        Self::check_status(response, &path).await?;

        tracing::debug!(
            playlist_id = %playlist_id,
            count = track_ids.len(),
            "Tracks added to playlist"
        );

        Ok(())
    }
}
