// ============================================================================
// Spotify Web API Types
// ============================================================================

use serde::{Deserialize, Serialize};

use super::{ArtistId, ArtistMetadata, PlaylistId, PlaylistSummary, TopTrack, TrackId, UserId};

/// GET /me
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyUser {
    pub id: UserId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyArtistRef {
    pub id: ArtistId,
    pub name: String,
}

/// Track object from GET /tracks/{id} and the items of GET /me/top/tracks
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyTrack {
    pub id: TrackId,
    pub name: String,
    #[serde(default)]
    pub popularity: i64,
    #[serde(default)]
    pub artists: Vec<SpotifyArtistRef>,
}

impl SpotifyTrack {
    /// Only the first credited artist is used
    pub fn primary_artist(&self) -> Option<&SpotifyArtistRef> {
        self.artists.first()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyPage<T> {
    pub items: Vec<T>,
}

impl SpotifyPage<SpotifyTrack> {
    /// Top-tracks entries; tracks without an artist are skipped
    pub fn into_top_tracks(self) -> Vec<TopTrack> {
        self.items
            .into_iter()
            .filter_map(|track| {
                let artist = track.primary_artist()?.clone();
                Some(TopTrack {
                    track_id: track.id,
                    artist_id: artist.id,
                    artist_name: artist.name,
                })
            })
            .collect()
    }
}

/// GET /artists/{id}
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyArtist {
    #[serde(default)]
    pub popularity: i64,
    #[serde(default)]
    pub genres: Vec<String>,
}

impl From<SpotifyArtist> for ArtistMetadata {
    fn from(artist: SpotifyArtist) -> Self {
        Self {
            popularity: artist.popularity,
            genres: artist.genres,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyPlaylist {
    pub id: PlaylistId,
    #[serde(default)]
    pub name: String,
}

impl From<SpotifyPlaylist> for PlaylistSummary {
    fn from(playlist: SpotifyPlaylist) -> Self {
        Self {
            id: playlist.id,
            name: playlist.name,
        }
    }
}

/// POST /users/{user_id}/playlists body
#[derive(Debug, Clone, Serialize)]
pub struct CreatePlaylistBody<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub public: bool,
}

/// POST /playlists/{id}/tracks body
#[derive(Debug, Clone, Serialize)]
pub struct AddItemsBody {
    pub uris: Vec<String>,
}

impl AddItemsBody {
    pub fn from_track_ids(track_ids: &[TrackId]) -> Self {
        Self {
            uris: track_ids
                .iter()
                .map(|id| format!("spotify:track:{}", id))
                .collect(),
        }
    }
}
