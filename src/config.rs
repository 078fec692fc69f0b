use serde::Deserialize;

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Spotify Web API base URL
    #[serde(default = "default_spotify_api_url")]
    pub spotify_api_url: String,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Raw catalog table (CSV)
    #[serde(default = "default_catalog_path")]
    pub catalog_path: String,

    /// Deduplicated, feature-selected catalog table written after selection
    #[serde(default = "default_intermediate_path")]
    pub intermediate_path: String,

    /// Load the catalog from the intermediate file when it exists
    #[serde(default)]
    pub reuse_intermediate: bool,

    /// Directory fetched user tables are exported to (one CSV per user); empty disables
    #[serde(default = "default_user_raw_dir")]
    pub user_raw_dir: String,

    /// Maximum number of tracks fetched concurrently
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,

    /// Per-request timeout against the data source, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Listening window for the user's top tracks (short_term, medium_term, long_term)
    #[serde(default = "default_top_tracks_window")]
    pub top_tracks_window: String,

    #[serde(default = "default_top_tracks_limit")]
    pub top_tracks_limit: u32,

    #[serde(default = "default_playlist_name")]
    pub playlist_name: String,

    #[serde(default = "default_playlist_description")]
    pub playlist_description: String,

    /// Maximum number of tracks the sink accepts per add call
    #[serde(default = "default_playlist_batch_limit")]
    pub playlist_batch_limit: usize,

    /// Seconds a stored recommendation run stays readable
    #[serde(default = "default_run_ttl_secs")]
    pub run_ttl_secs: u64,
}

fn default_spotify_api_url() -> String {
    "https://api.spotify.com/v1".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_catalog_path() -> String {
    "data/raw_allsongs_data.csv".to_string()
}

fn default_intermediate_path() -> String {
    "data/intermediate/song_df.csv".to_string()
}

fn default_user_raw_dir() -> String {
    "data/users".to_string()
}

fn default_fetch_concurrency() -> usize {
    8
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_top_tracks_window() -> String {
    "short_term".to_string()
}

fn default_top_tracks_limit() -> u32 {
    35
}

fn default_playlist_name() -> String {
    "TuneBuild Recommended Playlist".to_string()
}

fn default_playlist_description() -> String {
    "A TuneBuild playlist.".to_string()
}

fn default_playlist_batch_limit() -> usize {
    100
}

fn default_run_ttl_secs() -> u64 {
    3600
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            spotify_api_url: default_spotify_api_url(),
            host: default_host(),
            port: default_port(),
            catalog_path: default_catalog_path(),
            intermediate_path: default_intermediate_path(),
            reuse_intermediate: false,
            user_raw_dir: default_user_raw_dir(),
            fetch_concurrency: default_fetch_concurrency(),
            request_timeout_secs: default_request_timeout_secs(),
            top_tracks_window: default_top_tracks_window(),
            top_tracks_limit: default_top_tracks_limit(),
            playlist_name: default_playlist_name(),
            playlist_description: default_playlist_description(),
            playlist_batch_limit: default_playlist_batch_limit(),
            run_ttl_secs: default_run_ttl_secs(),
        }
    }
}
