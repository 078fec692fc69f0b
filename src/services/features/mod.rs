//! Feature engineering: raw track table → final numeric feature table.
//!
//! `FeatureEngineer` is a typed state machine; each stage consumes the
//! engineer and returns it in the next state, so the stages can only run in
//! order:
//!
//! load → drop_duplicate_songs → make_genre_list → select_features →
//! vectorize_genres → normalize → finalize
//!
//! Every fit (TF-IDF vocabulary, min/max) uses only the table being processed.

use std::{collections::HashSet, path::Path};

use crate::{
    error::AppResult,
    models::{RawTrack, UNKNOWN_GENRE},
};

pub mod scaling;
pub mod table;
pub mod tfidf;

pub use table::{FeatureRow, FeatureTable, RawTable, SelectedTable, SelectedTrack, GENRE_PREFIX};
pub use tfidf::TfidfVectorizer;

use scaling::min_max_scale;

/// Raw rows as loaded
pub struct Loaded {
    rows: Vec<RawTrack>,
}

/// At most one row per (artist, track) pair
pub struct Deduplicated {
    rows: Vec<RawTrack>,
}

/// Genre strings split into tag lists
pub struct GenreListed {
    rows: Vec<(RawTrack, Vec<String>)>,
}

/// Projected onto the feature contract
pub struct Selected {
    table: SelectedTable,
}

/// Genre vector columns computed beside the selected table
pub struct Vectorized {
    table: SelectedTable,
    genre_columns: Vec<String>,
    genre_rows: Vec<Vec<f64>>,
}

/// Popularity and descriptor blocks scaled to [0, 1]
pub struct Normalized {
    table: SelectedTable,
    genre_columns: Vec<String>,
    genre_rows: Vec<Vec<f64>>,
}

pub struct FeatureEngineer<S> {
    source_name: String,
    state: S,
}

impl FeatureEngineer<Loaded> {
    /// Starts from an in-memory raw table
    pub fn load(table: RawTable, source_name: impl Into<String>) -> Self {
        let source_name = source_name.into();
        tracing::debug!(source = %source_name, rows = table.len(), "Raw table loaded");
        Self {
            source_name,
            state: Loaded {
                rows: table.into_rows(),
            },
        }
    }

    /// Starts from a raw CSV file; fails on a missing column
    pub fn load_csv<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path = path.as_ref();
        let table = RawTable::read_csv(path)?;
        Ok(Self::load(table, path.display().to_string()))
    }

    /// Collapses rows sharing artist and track ID, keeping the first.
    /// Rows without an artist id are keyed on the artist name instead.
    pub fn drop_duplicate_songs(self) -> FeatureEngineer<Deduplicated> {
        let before = self.state.rows.len();
        let mut seen = HashSet::with_capacity(before);

        let rows: Vec<RawTrack> = self
            .state
            .rows
            .into_iter()
            .filter(|row| seen.insert((row.artist_key().to_string(), row.id.clone())))
            .collect();

        if rows.len() < before {
            tracing::debug!(
                source = %self.source_name,
                dropped = before - rows.len(),
                "Dropped duplicate songs"
            );
        }

        FeatureEngineer {
            source_name: self.source_name,
            state: Deduplicated { rows },
        }
    }
}

impl FeatureEngineer<Deduplicated> {
    pub fn make_genre_list(self) -> FeatureEngineer<GenreListed> {
        let rows = self
            .state
            .rows
            .into_iter()
            .map(|row| {
                let genres = table::split_genres(&row.genres);
                (row, genres)
            })
            .collect();

        FeatureEngineer {
            source_name: self.source_name,
            state: GenreListed { rows },
        }
    }
}

impl FeatureEngineer<GenreListed> {
    /// Projects every row onto identifier, descriptors, genre tags and popularity
    pub fn select_features(self) -> FeatureEngineer<Selected> {
        let rows = self
            .state
            .rows
            .into_iter()
            .map(|(row, genres)| SelectedTrack {
                descriptors: row.descriptors(),
                id: row.id,
                genres,
                artist_pop: row.artist_pop as f64,
                track_pop: row.track_pop as f64,
            })
            .collect();

        FeatureEngineer {
            source_name: self.source_name,
            state: Selected {
                table: SelectedTable::new(rows),
            },
        }
    }
}

impl FeatureEngineer<Selected> {
    /// Resumes from a previously exported intermediate table
    pub fn from_selected(table: SelectedTable, source_name: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            state: Selected { table },
        }
    }

    /// Writes the selected table to the intermediate file
    pub fn export_songs<P: AsRef<Path>>(&self, path: P) -> AppResult<()> {
        let path = path.as_ref();
        self.state.table.write_csv(path)?;
        tracing::info!(
            path = %path.display(),
            rows = self.state.table.len(),
            "Exported selected songs"
        );
        Ok(())
    }

    pub fn selected(&self) -> &SelectedTable {
        &self.state.table
    }

    /// Fits TF-IDF over this table's genre strings; the sentinel column is dropped
    pub fn vectorize_genres(self) -> FeatureEngineer<Vectorized> {
        let documents: Vec<String> = self
            .state
            .table
            .rows()
            .iter()
            .map(|row| row.genres.join(" "))
            .collect();

        let (vectorizer, mut genre_rows) = TfidfVectorizer::fit_transform(&documents);

        let mut genre_columns: Vec<String> = vectorizer
            .feature_names()
            .iter()
            .map(|term| format!("{}{}", GENRE_PREFIX, term))
            .collect();

        if let Some(unknown) = vectorizer
            .feature_names()
            .iter()
            .position(|term| term == UNKNOWN_GENRE)
        {
            genre_columns.remove(unknown);
            for row in genre_rows.iter_mut() {
                row.remove(unknown);
            }
        }

        tracing::debug!(
            source = %self.source_name,
            vocabulary = genre_columns.len(),
            "Genres vectorized"
        );

        FeatureEngineer {
            source_name: self.source_name,
            state: Vectorized {
                table: self.state.table,
                genre_columns,
                genre_rows,
            },
        }
    }
}

impl FeatureEngineer<Vectorized> {
    /// Min-max scales the popularity pair and the descriptor block, column by column
    pub fn normalize(self) -> FeatureEngineer<Normalized> {
        let Vectorized {
            mut table,
            genre_columns,
            genre_rows,
        } = self.state;

        let rows = table.rows_mut();

        let mut artist_pop: Vec<f64> = rows.iter().map(|r| r.artist_pop).collect();
        let mut track_pop: Vec<f64> = rows.iter().map(|r| r.track_pop).collect();
        min_max_scale(&mut artist_pop);
        min_max_scale(&mut track_pop);
        for ((row, a), t) in rows.iter_mut().zip(artist_pop).zip(track_pop) {
            row.artist_pop = a;
            row.track_pop = t;
        }

        for col in 0..11 {
            let mut column: Vec<f64> = rows.iter().map(|r| r.descriptors[col]).collect();
            min_max_scale(&mut column);
            for (row, value) in rows.iter_mut().zip(column) {
                row.descriptors[col] = value;
            }
        }

        FeatureEngineer {
            source_name: self.source_name,
            state: Normalized {
                table,
                genre_columns,
                genre_rows,
            },
        }
    }
}

impl FeatureEngineer<Normalized> {
    /// Concatenates the normalized table with its genre vector columns
    pub fn finalize(self) -> AppResult<FeatureTable> {
        let Normalized {
            table,
            genre_columns,
            genre_rows,
        } = self.state;

        let mut columns = FeatureTable::base_columns();
        columns.extend(genre_columns);

        let rows = table
            .rows()
            .iter()
            .zip(genre_rows)
            .map(|(track, genre_values)| {
                let mut values = Vec::with_capacity(columns.len());
                values.extend_from_slice(&track.descriptors);
                values.push(track.artist_pop);
                values.push(track.track_pop);
                values.extend(genre_values);
                FeatureRow {
                    id: track.id.clone(),
                    genres: track.genres.clone(),
                    values,
                }
            })
            .collect();

        let features = FeatureTable::new(columns, rows)?;

        tracing::info!(
            source = %self.source_name,
            rows = features.len(),
            columns = features.columns().len(),
            "Feature table built"
        );

        Ok(features)
    }
}

/// Runs every stage over a raw table
pub fn engineer(table: RawTable, source_name: &str) -> AppResult<FeatureTable> {
    FeatureEngineer::load(table, source_name)
        .drop_duplicate_songs()
        .make_genre_list()
        .select_features()
        .vectorize_genres()
        .normalize()
        .finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArtistId, TrackId, DESCRIPTOR_COLUMNS};

    fn raw(id: &str, artist: &str, tempo: f64, genres: &str) -> RawTrack {
        RawTrack {
            id: TrackId::from(id),
            artist_id: ArtistId::from(artist),
            artist_name: format!("{} name", artist),
            track_name: format!("{} title", id),
            danceability: 0.5,
            energy: 0.8,
            key: 5.0,
            loudness: -6.0,
            mode: 1.0,
            speechiness: 0.05,
            acousticness: 0.1,
            instrumentalness: 0.0,
            liveness: 0.2,
            valence: 0.4,
            tempo,
            genres: genres.to_string(),
            artist_pop: 50,
            track_pop: 60,
        }
    }

    fn selected_ids(engineer: &FeatureEngineer<Selected>) -> Vec<String> {
        engineer
            .selected()
            .rows()
            .iter()
            .map(|r| r.id.to_string())
            .collect()
    }

    #[test]
    fn test_drop_duplicates_keeps_first_occurrence() {
        let table = RawTable::new(vec![
            raw("t1", "a1", 100.0, "pop"),
            raw("t2", "a1", 110.0, "pop"),
            raw("t1", "a1", 999.0, "rock"),
            raw("t1", "a2", 120.0, "jazz"),
        ]);

        let engineer = FeatureEngineer::load(table, "test")
            .drop_duplicate_songs()
            .make_genre_list()
            .select_features();

        assert_eq!(selected_ids(&engineer), vec!["t1", "t2", "t1"]);
        let first = &engineer.selected().rows()[0];
        assert_eq!(first.descriptors[10], 100.0);
        assert_eq!(first.genres, vec!["pop".to_string()]);
    }

    #[test]
    fn test_dedup_key_does_not_merge_concatenation_collisions() {
        let table = RawTable::new(vec![raw("c", "ab", 100.0, "pop"), raw("bc", "a", 110.0, "pop")]);

        let engineer = FeatureEngineer::load(table, "test")
            .drop_duplicate_songs()
            .make_genre_list()
            .select_features();

        assert_eq!(selected_ids(&engineer), vec!["c", "bc"]);
    }

    #[test]
    fn test_dedup_falls_back_to_artist_name_without_artist_id() {
        let mut first = raw("t1", "", 100.0, "pop");
        first.artist_name = "Same Artist".to_string();
        let mut repeat = raw("t1", "", 999.0, "rock");
        repeat.artist_name = "Same Artist".to_string();
        let mut other = raw("t1", "", 120.0, "jazz");
        other.artist_name = "Other Artist".to_string();

        let engineer = FeatureEngineer::load(RawTable::new(vec![first, repeat, other]), "test")
            .drop_duplicate_songs()
            .make_genre_list()
            .select_features();

        assert_eq!(selected_ids(&engineer), vec!["t1", "t1"]);
        assert_eq!(engineer.selected().rows()[0].descriptors[10], 100.0);
        assert_eq!(engineer.selected().rows()[1].descriptors[10], 120.0);
    }

    #[test]
    fn test_select_features_projects_contract() {
        let table = RawTable::new(vec![raw("t1", "a1", 100.0, "indie_rock dream_pop")]);
        let engineer = FeatureEngineer::load(table, "test")
            .drop_duplicate_songs()
            .make_genre_list()
            .select_features();

        let row = &engineer.selected().rows()[0];
        assert_eq!(
            row.descriptors,
            [0.5, 0.8, 5.0, -6.0, 1.0, 0.05, 0.1, 0.0, 0.2, 0.4, 100.0]
        );
        assert_eq!(row.genres, vec!["indie_rock", "dream_pop"]);
        assert_eq!(row.artist_pop, 50.0);
        assert_eq!(row.track_pop, 60.0);
    }

    #[test]
    fn test_unknown_genre_column_is_dropped() {
        let table = RawTable::new(vec![
            raw("t1", "a1", 100.0, "unknown"),
            raw("t2", "a2", 120.0, "pop rock"),
        ]);

        let features = engineer(table, "test").unwrap();

        assert!(features.column_index("genre|unknown").is_none());
        let terms: Vec<&str> = features.genre_terms().collect();
        assert_eq!(terms, vec!["pop", "rock"]);
        // the unknown-only track has no genre signal left
        assert_eq!(features.value(0, "genre|pop"), Some(0.0));
        assert_eq!(features.value(0, "genre|rock"), Some(0.0));
    }

    #[test]
    fn test_normalization_bounds() {
        let mut rows = vec![
            raw("t1", "a1", 80.0, "pop"),
            raw("t2", "a2", 120.0, "pop"),
            raw("t3", "a3", 160.0, "rock"),
        ];
        rows[0].artist_pop = 10;
        rows[1].artist_pop = 90;
        rows[2].artist_pop = 50;

        let features = engineer(RawTable::new(rows), "test").unwrap();

        assert_eq!(features.value(0, "tempo"), Some(0.0));
        assert_eq!(features.value(1, "tempo"), Some(0.5));
        assert_eq!(features.value(2, "tempo"), Some(1.0));
        assert_eq!(features.value(0, "artist_pop"), Some(0.0));
        assert_eq!(features.value(1, "artist_pop"), Some(1.0));
        assert_eq!(features.value(2, "artist_pop"), Some(0.5));

        for row in features.rows() {
            for value in &row.values {
                assert!((0.0..=1.0).contains(value));
            }
        }
    }

    #[test]
    fn test_constant_columns_map_to_zero() {
        let table = RawTable::new(vec![
            raw("t1", "a1", 100.0, "pop"),
            raw("t2", "a2", 100.0, "rock"),
        ]);

        let features = engineer(table, "test").unwrap();

        for name in DESCRIPTOR_COLUMNS {
            assert_eq!(features.value(0, name), Some(0.0));
            assert_eq!(features.value(1, name), Some(0.0));
        }
        assert_eq!(features.value(0, "track_pop"), Some(0.0));
    }

    #[test]
    fn test_single_row_table() {
        let table = RawTable::new(vec![raw("t1", "a1", 100.0, "pop")]);
        let features = engineer(table, "test").unwrap();

        assert_eq!(features.len(), 1);
        assert_eq!(features.value(0, "tempo"), Some(0.0));
        assert_eq!(features.value(0, "genre|pop"), Some(1.0));
    }

    #[test]
    fn test_final_manifest_order() {
        let table = RawTable::new(vec![
            raw("t1", "a1", 100.0, "rock"),
            raw("t2", "a2", 110.0, "jazz"),
        ]);
        let features = engineer(table, "test").unwrap();

        let mut expected = FeatureTable::base_columns();
        expected.push("genre|jazz".to_string());
        expected.push("genre|rock".to_string());
        assert_eq!(features.columns(), expected.as_slice());
        assert_eq!(features.rows()[0].genres, vec!["rock".to_string()]);
    }

    #[test]
    fn test_resume_from_intermediate_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("intermediate/song_df.csv");

        let table = RawTable::new(vec![
            raw("t1", "a1", 100.0, "rock"),
            raw("t2", "a2", 140.0, "pop"),
        ]);
        let engineer = FeatureEngineer::load(table, "test")
            .drop_duplicate_songs()
            .make_genre_list()
            .select_features();
        engineer.export_songs(&path).unwrap();
        let direct = engineer.vectorize_genres().normalize().finalize().unwrap();

        let reloaded = SelectedTable::read_csv(&path).unwrap();
        let resumed = FeatureEngineer::from_selected(reloaded, "intermediate")
            .vectorize_genres()
            .normalize()
            .finalize()
            .unwrap();

        assert_eq!(resumed, direct);
    }
}
