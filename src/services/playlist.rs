use std::sync::Arc;

use serde::Serialize;

use crate::{
    error::{AppError, AppResult},
    models::{PlaylistId, TrackId, UserId},
    services::providers::PlaylistSink,
};

/// A playlist created by this builder
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaylistHandle {
    pub id: PlaylistId,
    pub name: String,
}

/// Materializes ranked tracks as a playlist on the owner's account
pub struct PlaylistBuilder {
    sink: Arc<dyn PlaylistSink>,
    owner: UserId,
    batch_limit: usize,
}

impl PlaylistBuilder {
    pub fn new(sink: Arc<dyn PlaylistSink>, owner: UserId, batch_limit: usize) -> Self {
        Self {
            sink,
            owner,
            batch_limit: batch_limit.max(1),
        }
    }

    /// Creates an empty playlist. The handle carries the ID returned by the
    /// create call itself.
    pub async fn create(&self, name: &str, description: &str) -> AppResult<PlaylistHandle> {
        match self.sink.list_playlists(&self.owner).await {
            Ok(existing) if existing.iter().any(|p| p.name == name) => {
                tracing::warn!(
                    owner = %self.owner,
                    name = %name,
                    "A playlist with this name already exists; creating a new one"
                );
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(error = %e, "Could not list existing playlists");
            }
        }

        let id = self
            .sink
            .create_playlist(&self.owner, name, description)
            .await
            .map_err(|e| AppError::Sink {
                playlist_id: None,
                added: 0,
                message: e.to_string(),
            })?;

        Ok(PlaylistHandle {
            id,
            name: name.to_string(),
        })
    }

    /// Appends tracks in order, in batches no larger than the sink's limit.
    ///
    /// Returns the number of tracks added.
    pub async fn add(&self, handle: &PlaylistHandle, track_ids: &[TrackId]) -> AppResult<usize> {
        let mut added = 0;

        for chunk in track_ids.chunks(self.batch_limit) {
            self.sink
                .add_items(&handle.id, chunk)
                .await
                .map_err(|e| {
                    tracing::error!(
                        playlist_id = %handle.id,
                        added,
                        error = %e,
                        "Adding tracks failed part-way"
                    );
                    AppError::Sink {
                        playlist_id: Some(handle.id.to_string()),
                        added,
                        message: e.to_string(),
                    }
                })?;
            added += chunk.len();
        }

        tracing::info!(playlist_id = %handle.id, added, "Playlist populated");

        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PlaylistSummary;
    use crate::services::providers::MockPlaylistSink;
    use mockall::{predicate::eq, Sequence};

    fn track_ids(n: usize) -> Vec<TrackId> {
        (0..n).map(|i| TrackId::from(format!("t{}", i))).collect()
    }

    fn builder(sink: MockPlaylistSink) -> PlaylistBuilder {
        PlaylistBuilder::new(Arc::new(sink), UserId::from("daniel"), 100)
    }

    #[tokio::test]
    async fn test_create_uses_returned_id_not_listing() {
        let mut sink = MockPlaylistSink::new();
        // an unrelated playlist is listed first; it must not be picked
        sink.expect_list_playlists().returning(|_| {
            Ok(vec![PlaylistSummary {
                id: PlaylistId::from("old"),
                name: "Road Trip".to_string(),
            }])
        });
        sink.expect_create_playlist()
            .withf(|owner, name, description| {
                owner.as_str() == "daniel" && name == "Mix" && description == "desc"
            })
            .times(1)
            .returning(|_, _, _| Ok(PlaylistId::from("fresh")));

        let handle = builder(sink).create("Mix", "desc").await.unwrap();
        assert_eq!(handle.id, PlaylistId::from("fresh"));
        assert_eq!(handle.name, "Mix");
    }

    #[tokio::test]
    async fn test_create_with_same_name_still_creates() {
        let mut sink = MockPlaylistSink::new();
        sink.expect_list_playlists().returning(|_| {
            Ok(vec![PlaylistSummary {
                id: PlaylistId::from("old"),
                name: "Mix".to_string(),
            }])
        });
        sink.expect_create_playlist()
            .times(1)
            .returning(|_, _, _| Ok(PlaylistId::from("fresh")));

        let handle = builder(sink).create("Mix", "desc").await.unwrap();
        assert_eq!(handle.id, PlaylistId::from("fresh"));
    }

    #[tokio::test]
    async fn test_create_failure_is_sink_error() {
        let mut sink = MockPlaylistSink::new();
        sink.expect_list_playlists()
            .returning(|_| Err(AppError::ExternalApi("503".to_string())));
        sink.expect_create_playlist()
            .returning(|_, _, _| Err(AppError::ExternalApi("403 Forbidden".to_string())));

        let result = builder(sink).create("Mix", "desc").await;
        assert!(matches!(
            result,
            Err(AppError::Sink {
                playlist_id: None,
                added: 0,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_add_chunks_to_batch_limit_in_order() {
        let ids = track_ids(250);
        let mut sink = MockPlaylistSink::new();
        let mut seq = Sequence::new();

        for (start, len) in [(0usize, 100usize), (100, 100), (200, 50)] {
            let expected: Vec<TrackId> = ids[start..start + len].to_vec();
            sink.expect_add_items()
                .with(eq(PlaylistId::from("pl")), eq(expected))
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_, _| Ok(()));
        }

        let handle = PlaylistHandle {
            id: PlaylistId::from("pl"),
            name: "Mix".to_string(),
        };
        let added = builder(sink).add(&handle, &ids).await.unwrap();
        assert_eq!(added, 250);
    }

    #[tokio::test]
    async fn test_add_empty_makes_no_calls() {
        let mut sink = MockPlaylistSink::new();
        sink.expect_add_items().times(0);

        let handle = PlaylistHandle {
            id: PlaylistId::from("pl"),
            name: "Mix".to_string(),
        };
        let added = builder(sink).add(&handle, &[]).await.unwrap();
        assert_eq!(added, 0);
    }

    #[tokio::test]
    async fn test_partial_add_reports_playlist_and_progress() {
        let mut sink = MockPlaylistSink::new();
        let mut calls = 0;
        sink.expect_add_items().returning(move |_, _| {
            calls += 1;
            if calls == 1 {
                Ok(())
            } else {
                Err(AppError::ExternalApi("500".to_string()))
            }
        });

        let handle = PlaylistHandle {
            id: PlaylistId::from("pl"),
            name: "Mix".to_string(),
        };
        let result = builder(sink).add(&handle, &track_ids(150)).await;

        match result {
            Err(AppError::Sink {
                playlist_id, added, ..
            }) => {
                assert_eq!(playlist_id.as_deref(), Some("pl"));
                assert_eq!(added, 100);
            }
            other => panic!("expected sink error, got {:?}", other),
        }
    }
}
