use std::{path::Path, sync::Arc, time::Duration};

use crate::{
    config::Config,
    error::{AppError, AppResult},
    models::{TimeRange, TrackId, UserId},
    services::{
        features::{self, FeatureEngineer, FeatureTable, RawTable, SelectedTable},
        fetcher::TrackFeatureFetcher,
        playlist::{PlaylistBuilder, PlaylistHandle},
        providers::{DataSource, PlaylistSink},
        recommendations::{Ranking, Recommender},
    },
};

/// The catalog side of a recommendation run, built once and shared read-only
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    pub selected: SelectedTable,
    pub features: FeatureTable,
}

impl Catalog {
    /// Runs the catalog through every stage, exporting the selected table to
    /// `intermediate_path` on the way
    pub fn build<P: AsRef<Path>>(raw_path: P, intermediate_path: P) -> AppResult<Self> {
        let engineer = FeatureEngineer::load_csv(raw_path)?
            .drop_duplicate_songs()
            .make_genre_list()
            .select_features();

        engineer.export_songs(intermediate_path)?;
        Self::from_selected_stage(engineer)
    }

    /// Builds from an in-memory raw table without touching the filesystem
    pub fn from_raw(table: RawTable) -> AppResult<Self> {
        let engineer = FeatureEngineer::load(table, "catalog")
            .drop_duplicate_songs()
            .make_genre_list()
            .select_features();
        Self::from_selected_stage(engineer)
    }

    /// Rebuilds from a previously exported intermediate file
    pub fn from_intermediate<P: AsRef<Path>>(intermediate_path: P) -> AppResult<Self> {
        let path = intermediate_path.as_ref();
        let selected = SelectedTable::read_csv(path)?;
        Self::from_selected_stage(FeatureEngineer::from_selected(
            selected,
            path.display().to_string(),
        ))
    }

    /// Loads the catalog as configured: the intermediate file when reuse is
    /// enabled and the file exists, otherwise the raw catalog
    pub fn load(config: &Config) -> AppResult<Self> {
        if config.reuse_intermediate && Path::new(&config.intermediate_path).exists() {
            tracing::info!(path = %config.intermediate_path, "Reusing intermediate catalog table");
            return Self::from_intermediate(&config.intermediate_path);
        }
        Self::build(&config.catalog_path, &config.intermediate_path)
    }

    fn from_selected_stage(engineer: FeatureEngineer<features::Selected>) -> AppResult<Self> {
        let selected = engineer.selected().clone();
        let features = engineer.vectorize_genres().normalize().finalize()?;
        Ok(Self { selected, features })
    }
}

/// Per-run knobs taken from configuration
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub window: TimeRange,
    pub limit: u32,
    pub concurrency: usize,
    pub request_timeout: Duration,
    /// Directory the fetched user table is exported to, one file per user
    pub export_dir: Option<String>,
}

impl RunSettings {
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let window = config
            .top_tracks_window
            .parse::<TimeRange>()
            .map_err(AppError::InvalidInput)?;

        Ok(Self {
            window,
            limit: config.top_tracks_limit,
            concurrency: config.fetch_concurrency,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            export_dir: Some(config.user_raw_dir.clone()).filter(|d| !d.is_empty()),
        })
    }
}

/// Ranks the catalog against a user's feature table
pub fn rank(catalog: &Catalog, user_features: &FeatureTable) -> AppResult<Ranking> {
    let recommender = Recommender::new()
        .load_catalog(catalog.selected.clone())
        .build_profile(&catalog.features, user_features)?;
    Ok(recommender.score())
}

/// Fetches the user's top tracks, engineers their features and ranks the catalog
pub async fn recommend_for_user(
    source: Arc<dyn DataSource>,
    user_id: &UserId,
    catalog: &Catalog,
    settings: &RunSettings,
) -> AppResult<Ranking> {
    let fetcher = TrackFeatureFetcher::new(source, settings.concurrency, settings.request_timeout);
    let raw = fetcher
        .fetch_top_tracks(settings.window, settings.limit)
        .await?;

    if raw.is_empty() {
        return Err(AppError::NotFound(format!(
            "no listening history for user {}",
            user_id
        )));
    }

    if let Some(dir) = &settings.export_dir {
        let path = Path::new(dir).join(format!("{}.csv", user_id));
        raw.write_csv(&path)?;
        tracing::debug!(path = %path.display(), "Exported raw user table");
    }

    let user_features = features::engineer(raw, "user")?;
    let ranking = rank(catalog, &user_features)?;

    tracing::info!(
        user_id = %user_id,
        candidates = ranking.len(),
        "Recommendations ranked"
    );

    Ok(ranking)
}

/// Creates a playlist and fills it with `track_ids`, in order
pub async fn publish_playlist(
    sink: Arc<dyn PlaylistSink>,
    owner: UserId,
    name: &str,
    description: &str,
    track_ids: &[TrackId],
    batch_limit: usize,
) -> AppResult<(PlaylistHandle, usize)> {
    let builder = PlaylistBuilder::new(sink, owner, batch_limit);
    let handle = builder.create(name, description).await?;
    let added = builder.add(&handle, track_ids).await?;
    Ok((handle, added))
}
