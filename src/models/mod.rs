use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

pub mod spotify;

/// Sentinel genre tag for tracks whose artist has no genre data
pub const UNKNOWN_GENRE: &str = "unknown";

/// Numeric audio descriptors, in the order they appear in every feature table
pub const DESCRIPTOR_COLUMNS: [&str; 11] = [
    "danceability",
    "energy",
    "key",
    "loudness",
    "mode",
    "speechiness",
    "acousticness",
    "instrumentalness",
    "liveness",
    "valence",
    "tempo",
];

/// Artist and track popularity, scaled together but apart from the descriptors
pub const POPULARITY_COLUMNS: [&str; 2] = ["artist_pop", "track_pop"];

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Spotify track ID (e.g., "4uLU6hMCjMI75M1A2tKUQC")
    TrackId
);
string_id!(ArtistId);
string_id!(UserId);
string_id!(PlaylistId);

/// Listening window for a user's top tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeRange {
    ShortTerm,
    MediumTerm,
    LongTerm,
}

impl TimeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::ShortTerm => "short_term",
            TimeRange::MediumTerm => "medium_term",
            TimeRange::LongTerm => "long_term",
        }
    }
}

impl FromStr for TimeRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "short_term" => Ok(TimeRange::ShortTerm),
            "medium_term" => Ok(TimeRange::MediumTerm),
            "long_term" => Ok(TimeRange::LongTerm),
            other => Err(format!("unknown time range '{}'", other)),
        }
    }
}

/// One entry of a user's top-tracks listing
#[derive(Debug, Clone, PartialEq)]
pub struct TopTrack {
    pub track_id: TrackId,
    pub artist_id: ArtistId,
    pub artist_name: String,
}

/// Audio descriptor set for one track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioFeatures {
    pub danceability: f64,
    pub energy: f64,
    pub key: f64,
    pub loudness: f64,
    pub mode: f64,
    pub speechiness: f64,
    pub acousticness: f64,
    pub instrumentalness: f64,
    pub liveness: f64,
    pub valence: f64,
    pub tempo: f64,
}

/// Track-level metadata from the data source
#[derive(Debug, Clone, PartialEq)]
pub struct TrackMetadata {
    pub popularity: i64,
    pub name: String,
    pub artist_id: ArtistId,
    pub artist_name: String,
}

/// Artist-level metadata from the data source
#[derive(Debug, Clone, PartialEq)]
pub struct ArtistMetadata {
    pub popularity: i64,
    pub genres: Vec<String>,
}

/// A playlist owned by the user, as listed by the sink
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaylistSummary {
    pub id: PlaylistId,
    pub name: String,
}

/// One row of a raw table, as fetched or as stored in the raw CSV files.
///
/// Extra columns in a CSV file (uri, duration_ms, ...) are ignored on load.
/// Older exports name the artist column `artist_uri`, and some carry only
/// `artist_name`; the artist id is then empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTrack {
    pub id: TrackId,
    #[serde(alias = "artist_uri", default)]
    pub artist_id: ArtistId,
    #[serde(default)]
    pub artist_name: String,
    #[serde(default)]
    pub track_name: String,
    pub danceability: f64,
    pub energy: f64,
    pub key: f64,
    pub loudness: f64,
    pub mode: f64,
    pub speechiness: f64,
    pub acousticness: f64,
    pub instrumentalness: f64,
    pub liveness: f64,
    pub valence: f64,
    pub tempo: f64,
    /// Space-joined genre tags; spaces inside a tag are underscores
    pub genres: String,
    pub artist_pop: i64,
    pub track_pop: i64,
}

impl RawTrack {
    /// Assembles a raw row from the per-track responses of the data source
    pub fn from_parts(
        id: TrackId,
        artist_name: String,
        features: AudioFeatures,
        track: TrackMetadata,
        artist: ArtistMetadata,
    ) -> Self {
        Self {
            id,
            artist_id: track.artist_id,
            artist_name,
            track_name: track.name,
            danceability: features.danceability,
            energy: features.energy,
            key: features.key,
            loudness: features.loudness,
            mode: features.mode,
            speechiness: features.speechiness,
            acousticness: features.acousticness,
            instrumentalness: features.instrumentalness,
            liveness: features.liveness,
            valence: features.valence,
            tempo: features.tempo,
            genres: join_genre_tags(&artist.genres),
            artist_pop: artist.popularity,
            track_pop: track.popularity,
        }
    }

    /// Identifies the artist for deduplication: the id, or the name when the
    /// source carried no id
    pub fn artist_key(&self) -> &str {
        if self.artist_id.as_str().is_empty() {
            &self.artist_name
        } else {
            self.artist_id.as_str()
        }
    }

    /// Descriptor values in `DESCRIPTOR_COLUMNS` order
    pub fn descriptors(&self) -> [f64; 11] {
        [
            self.danceability,
            self.energy,
            self.key,
            self.loudness,
            self.mode,
            self.speechiness,
            self.acousticness,
            self.instrumentalness,
            self.liveness,
            self.valence,
            self.tempo,
        ]
    }
}

/// Flattens artist genres into one whitespace-separated string.
///
/// "indie rock" becomes "indie_rock" so the tag survives whitespace splitting.
pub fn join_genre_tags(genres: &[String]) -> String {
    let tags: Vec<String> = genres
        .iter()
        .map(|g| g.split_whitespace().collect::<Vec<_>>().join("_"))
        .filter(|g| !g.is_empty())
        .collect();

    if tags.is_empty() {
        UNKNOWN_GENRE.to_string()
    } else {
        tags.join(" ")
    }
}
