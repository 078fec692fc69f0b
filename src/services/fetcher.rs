use std::{future::Future, sync::Arc, time::Duration};

use tokio::{sync::Semaphore, time::timeout};

use crate::{
    error::{AppError, AppResult},
    models::{RawTrack, TimeRange, TrackId},
    services::{features::RawTable, providers::DataSource},
};

/// Builds raw tables by fetching per-track attributes from a data source.
///
/// One task per track, at most `concurrency` in flight. A track whose fetch fails
/// or times out is dropped from the table and logged; the batch only fails when
/// no track could be fetched at all.
#[derive(Clone)]
pub struct TrackFeatureFetcher {
    source: Arc<dyn DataSource>,
    concurrency: usize,
    request_timeout: Duration,
}

impl TrackFeatureFetcher {
    pub fn new(source: Arc<dyn DataSource>, concurrency: usize, request_timeout: Duration) -> Self {
        Self {
            source,
            concurrency: concurrency.max(1),
            request_timeout,
        }
    }

    /// Fetches attributes for the given tracks; rows keep input order
    pub async fn fetch(&self, track_ids: &[TrackId]) -> AppResult<RawTable> {
        let requests = track_ids.iter().map(|id| (id.clone(), None)).collect();
        self.fetch_batch(requests).await
    }

    /// Fetches the session user's top tracks and their attributes
    pub async fn fetch_top_tracks(&self, window: TimeRange, limit: u32) -> AppResult<RawTable> {
        let top_tracks = self.source.top_tracks(window, limit).await?;

        let requests = top_tracks
            .into_iter()
            .map(|t| (t.track_id, Some(t.artist_name)))
            .collect();

        self.fetch_batch(requests).await
    }

    async fn fetch_batch(&self, requests: Vec<(TrackId, Option<String>)>) -> AppResult<RawTable> {
        tracing::info!(
            track_count = requests.len(),
            provider = self.source.name(),
            "Fetching track features"
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = Vec::with_capacity(requests.len());

        for (track_id, artist_name) in requests {
            let source = self.source.clone();
            let semaphore = semaphore.clone();
            let request_timeout = self.request_timeout;
            let task_id = track_id.clone();

            let task = tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| AppError::Internal(e.to_string()))?;
                extract_track_features(source.as_ref(), &task_id, artist_name, request_timeout)
                    .await
            });
            tasks.push((track_id, task));
        }

        let mut rows = Vec::new();
        let mut failed = 0usize;

        // Awaiting in spawn order keeps the table in input order
        for (track_id, task) in tasks {
            match task.await {
                Ok(Ok(row)) => rows.push(row),
                Ok(Err(e)) => {
                    tracing::warn!(track_id = %track_id, error = %e, "Dropping track: feature fetch failed");
                    failed += 1;
                }
                Err(e) => {
                    tracing::error!(track_id = %track_id, error = %e, "Task join error");
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            tracing::warn!(
                success_count = rows.len(),
                error_count = failed,
                "Partial track feature fetch failure"
            );
        }

        if rows.is_empty() && failed > 0 {
            return Err(AppError::ExternalApi(
                "Failed to fetch features for any track".to_string(),
            ));
        }

        tracing::info!(fetched = rows.len(), "Track features fetched");

        Ok(RawTable::new(rows))
    }
}

async fn with_timeout<T>(
    limit: Duration,
    what: &str,
    future: impl Future<Output = AppResult<T>>,
) -> AppResult<T> {
    timeout(limit, future)
        .await
        .map_err(|_| AppError::ExternalApi(format!("{} timed out after {:?}", what, limit)))?
}

/// Fetches everything one raw row needs. Descriptors and track metadata are
/// requested together; the artist lookup depends on the track's artist.
async fn extract_track_features(
    source: &dyn DataSource,
    track_id: &TrackId,
    artist_name: Option<String>,
    request_timeout: Duration,
) -> AppResult<RawTrack> {
    let (features, track) = tokio::try_join!(
        with_timeout(
            request_timeout,
            "audio features",
            source.audio_features(track_id)
        ),
        with_timeout(
            request_timeout,
            "track metadata",
            source.track_metadata(track_id)
        ),
    )?;

    let artist = with_timeout(
        request_timeout,
        "artist metadata",
        source.artist_metadata(&track.artist_id),
    )
    .await?;

    let artist_name = artist_name.unwrap_or_else(|| track.artist_name.clone());

    Ok(RawTrack::from_parts(
        track_id.clone(),
        artist_name,
        features,
        track,
        artist,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArtistId, ArtistMetadata, AudioFeatures, TopTrack, TrackMetadata};
    use crate::services::providers::MockDataSource;

    fn features(tempo: f64) -> AudioFeatures {
        AudioFeatures {
            danceability: 0.5,
            energy: 0.5,
            key: 1.0,
            loudness: -5.0,
            mode: 1.0,
            speechiness: 0.05,
            acousticness: 0.1,
            instrumentalness: 0.0,
            liveness: 0.1,
            valence: 0.5,
            tempo,
        }
    }

    fn mock_source(failing: &'static [&'static str]) -> MockDataSource {
        let mut source = MockDataSource::new();
        source.expect_name().return_const("mock");
        source.expect_audio_features().returning(move |id| {
            if failing.contains(&id.as_str()) {
                Err(AppError::ExternalApi("429 Too Many Requests".to_string()))
            } else {
                Ok(features(100.0))
            }
        });
        source.expect_track_metadata().returning(|id| {
            Ok(TrackMetadata {
                popularity: 40,
                name: format!("Song {}", id),
                artist_id: ArtistId::from(format!("artist-{}", id).as_str()),
                artist_name: format!("Artist {}", id),
            })
        });
        source.expect_artist_metadata().returning(|artist_id| {
            let genres = if artist_id.as_str() == "artist-t2" {
                vec![]
            } else {
                vec!["indie rock".to_string(), "shoegaze".to_string()]
            };
            Ok(ArtistMetadata {
                popularity: 60,
                genres,
            })
        });
        source
    }

    fn fetcher(source: MockDataSource) -> TrackFeatureFetcher {
        TrackFeatureFetcher::new(Arc::new(source), 2, Duration::from_secs(5))
    }

    fn ids(raw: &[&str]) -> Vec<TrackId> {
        raw.iter().map(|s| TrackId::from(*s)).collect()
    }

    #[tokio::test]
    async fn test_fetch_preserves_input_order() {
        let fetcher = fetcher(mock_source(&[]));
        let table = fetcher.fetch(&ids(&["t3", "t1", "t2", "t4"])).await.unwrap();

        let fetched: Vec<&str> = table.rows().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(fetched, vec!["t3", "t1", "t2", "t4"]);
    }

    #[tokio::test]
    async fn test_fetch_flattens_genres() {
        let fetcher = fetcher(mock_source(&[]));
        let table = fetcher.fetch(&ids(&["t1", "t2"])).await.unwrap();

        assert_eq!(table.rows()[0].genres, "indie_rock shoegaze");
        assert_eq!(table.rows()[1].genres, "unknown");
        assert_eq!(table.rows()[0].artist_id, ArtistId::from("artist-t1"));
        assert_eq!(table.rows()[0].artist_pop, 60);
        assert_eq!(table.rows()[0].track_pop, 40);
    }

    #[tokio::test]
    async fn test_failed_track_is_dropped() {
        let fetcher = fetcher(mock_source(&["t2"]));
        let table = fetcher.fetch(&ids(&["t1", "t2", "t3"])).await.unwrap();

        let fetched: Vec<&str> = table.rows().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(fetched, vec!["t1", "t3"]);
    }

    #[tokio::test]
    async fn test_all_failed_is_error() {
        let fetcher = fetcher(mock_source(&["t1", "t2"]));
        let result = fetcher.fetch(&ids(&["t1", "t2"])).await;
        assert!(matches!(result, Err(AppError::ExternalApi(_))));
    }

    #[tokio::test]
    async fn test_empty_input_is_empty_table() {
        let fetcher = fetcher(mock_source(&[]));
        let table = fetcher.fetch(&[]).await.unwrap();
        assert!(table.rows().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_top_tracks_keeps_listing_artist_name() {
        let mut source = mock_source(&[]);
        source.expect_top_tracks().returning(|_, limit| {
            assert_eq!(limit, 35);
            Ok(vec![TopTrack {
                track_id: TrackId::from("t1"),
                artist_id: ArtistId::from("artist-t1"),
                artist_name: "Listed Name".to_string(),
            }])
        });

        let fetcher = fetcher(source);
        let table = fetcher
            .fetch_top_tracks(TimeRange::ShortTerm, 35)
            .await
            .unwrap();

        assert_eq!(table.rows().len(), 1);
        assert_eq!(table.rows()[0].artist_name, "Listed Name");
    }
}
