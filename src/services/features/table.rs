use std::{collections::HashMap, fs, path::Path};

use csv::StringRecord;
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, AppResult},
    models::{RawTrack, TrackId, DESCRIPTOR_COLUMNS, POPULARITY_COLUMNS},
};

/// Columns a raw CSV file must carry
pub const RAW_COLUMNS: [&str; 15] = [
    "id",
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
    "genres",
    "artist_pop",
    "track_pop",
];

/// Columns of the intermediate (feature-selected) CSV file
pub const SELECTED_COLUMNS: [&str; 15] = [
    "id",
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
    "genres",
    "artist_pop",
    "track_pop",
];

/// A raw CSV file must carry at least one of these to identify the artist
pub const ARTIST_KEY_COLUMNS: [&str; 3] = ["artist_id", "artist_uri", "artist_name"];

/// Prefix of every genre vector column
pub const GENRE_PREFIX: &str = "genre|";

/// Fails with the first required column missing from a CSV header
fn check_headers(headers: &StringRecord, required: &[&str], source_name: &str) -> AppResult<()> {
    for column in required {
        if !headers.iter().any(|h| h == *column) {
            return Err(AppError::SchemaMismatch {
                column: column.to_string(),
                source_name: source_name.to_string(),
            });
        }
    }
    Ok(())
}

/// Fails unless the header carries at least one of `alternatives`
fn check_any_header(
    headers: &StringRecord,
    alternatives: &[&str],
    source_name: &str,
) -> AppResult<()> {
    match alternatives.first() {
        Some(first) if !headers.iter().any(|h| alternatives.contains(&h)) => {
            Err(AppError::SchemaMismatch {
                column: first.to_string(),
                source_name: source_name.to_string(),
            })
        }
        _ => Ok(()),
    }
}

fn create_parent_dir(path: &Path) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn read_records<T, P>(path: P, required: &[&str], any_of: &[&str]) -> AppResult<Vec<T>>
where
    T: for<'de> Deserialize<'de>,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let source_name = path.display().to_string();

    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    check_headers(&headers, required, &source_name)?;
    check_any_header(&headers, any_of, &source_name)?;

    let records = reader
        .deserialize::<T>()
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(path = %source_name, rows = records.len(), "Loaded table");

    Ok(records)
}

fn write_records<T, P>(path: P, records: impl Iterator<Item = T>) -> AppResult<()>
where
    T: Serialize,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    create_parent_dir(path)?;

    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Raw per-track table as produced by the fetcher or stored on disk
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    rows: Vec<RawTrack>,
}

impl RawTable {
    pub fn new(rows: Vec<RawTrack>) -> Self {
        Self { rows }
    }

    /// Loads a raw CSV file, checking the column manifest before any row is parsed
    pub fn read_csv<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        Ok(Self::new(read_records(path, &RAW_COLUMNS, &ARTIST_KEY_COLUMNS)?))
    }

    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> AppResult<()> {
        write_records(path, self.rows.iter())
    }

    pub fn rows(&self) -> &[RawTrack] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<RawTrack> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A track after feature selection: identifier, descriptors, genre tags and popularity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectedTrack {
    pub id: TrackId,
    pub genres: Vec<String>,
    /// Values in `DESCRIPTOR_COLUMNS` order
    pub descriptors: [f64; 11],
    pub artist_pop: f64,
    pub track_pop: f64,
}

/// Flat CSV form of `SelectedTrack`; genre tags are space-joined
#[derive(Debug, Serialize, Deserialize)]
struct SelectedRecord {
    id: TrackId,
    danceability: f64,
    energy: f64,
    key: f64,
    loudness: f64,
    mode: f64,
    speechiness: f64,
    acousticness: f64,
    instrumentalness: f64,
    liveness: f64,
    valence: f64,
    tempo: f64,
    genres: String,
    artist_pop: f64,
    track_pop: f64,
}

impl From<&SelectedTrack> for SelectedRecord {
    fn from(track: &SelectedTrack) -> Self {
        let [danceability, energy, key, loudness, mode, speechiness, acousticness, instrumentalness, liveness, valence, tempo] =
            track.descriptors;
        Self {
            id: track.id.clone(),
            danceability,
            energy,
            key,
            loudness,
            mode,
            speechiness,
            acousticness,
            instrumentalness,
            liveness,
            valence,
            tempo,
            genres: track.genres.join(" "),
            artist_pop: track.artist_pop,
            track_pop: track.track_pop,
        }
    }
}

impl From<SelectedRecord> for SelectedTrack {
    fn from(record: SelectedRecord) -> Self {
        Self {
            id: record.id,
            genres: split_genres(&record.genres),
            descriptors: [
                record.danceability,
                record.energy,
                record.key,
                record.loudness,
                record.mode,
                record.speechiness,
                record.acousticness,
                record.instrumentalness,
                record.liveness,
                record.valence,
                record.tempo,
            ],
            artist_pop: record.artist_pop,
            track_pop: record.track_pop,
        }
    }
}

/// Splits a genre string into its tags
pub fn split_genres(genres: &str) -> Vec<String> {
    genres.split_whitespace().map(str::to_string).collect()
}

/// Deduplicated, feature-selected table; persisted as the intermediate file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectedTable {
    rows: Vec<SelectedTrack>,
}

impl SelectedTable {
    pub fn new(rows: Vec<SelectedTrack>) -> Self {
        Self { rows }
    }

    pub fn read_csv<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let records: Vec<SelectedRecord> = read_records(path, &SELECTED_COLUMNS, &[])?;
        Ok(Self::new(records.into_iter().map(SelectedTrack::from).collect()))
    }

    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> AppResult<()> {
        write_records(path, self.rows.iter().map(SelectedRecord::from))
    }

    pub fn rows(&self) -> &[SelectedTrack] {
        &self.rows
    }

    pub(crate) fn rows_mut(&mut self) -> &mut [SelectedTrack] {
        &mut self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One row of a final feature table
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub id: TrackId,
    pub genres: Vec<String>,
    /// Numeric values, one per manifest column
    pub values: Vec<f64>,
}

/// Final numeric feature table with an explicit named-column manifest.
///
/// The manifest lists every numeric column (descriptors, popularity pair, then
/// `genre|<term>` columns). Identifier and genre tags live beside it and never
/// take part in vector arithmetic.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    columns: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<FeatureRow>,
}

impl FeatureTable {
    pub fn new(columns: Vec<String>, rows: Vec<FeatureRow>) -> AppResult<Self> {
        let mut index = HashMap::with_capacity(columns.len());
        for (i, column) in columns.iter().enumerate() {
            if index.insert(column.clone(), i).is_some() {
                return Err(AppError::InvalidInput(format!(
                    "duplicate feature column '{}'",
                    column
                )));
            }
        }

        if let Some(row) = rows.iter().find(|r| r.values.len() != columns.len()) {
            return Err(AppError::InvalidInput(format!(
                "feature row {} has {} values for {} columns",
                row.id,
                row.values.len(),
                columns.len()
            )));
        }

        Ok(Self {
            columns,
            index,
            rows,
        })
    }

    /// The numeric columns every feature table carries ahead of its genre columns
    pub fn base_columns() -> Vec<String> {
        DESCRIPTOR_COLUMNS
            .iter()
            .chain(POPULARITY_COLUMNS.iter())
            .map(|c| c.to_string())
            .collect()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Vocabulary terms of this table's genre vector columns
    pub fn genre_terms(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter_map(|c| c.strip_prefix(GENRE_PREFIX))
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn ids(&self) -> impl Iterator<Item = &TrackId> {
        self.rows.iter().map(|r| &r.id)
    }

    /// Value of `column` in row `row`, if both exist
    pub fn value(&self, row: usize, column: &str) -> Option<f64> {
        let col = self.column_index(column)?;
        self.rows.get(row).map(|r| r.values[col])
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
