use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::{
    error::{AppError, AppResult},
    models::TrackId,
    services::features::{FeatureTable, SelectedTable, SelectedTrack},
};

/// Recommendations per page
pub const PAGE_SIZE: usize = 20;

/// Aggregate of the user's listening history in the catalog's feature space
#[derive(Debug, Clone, PartialEq)]
pub struct TasteVector {
    columns: Vec<String>,
    values: Vec<f64>,
}

impl TasteVector {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, column: &str) -> Option<f64> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| self.values[i])
    }
}

/// A catalog track eligible for recommendation
#[derive(Debug, Clone)]
struct Candidate {
    track: SelectedTrack,
    values: Vec<f64>,
}

/// One scored recommendation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    #[serde(flatten)]
    pub track: SelectedTrack,
    pub score: f64,
}

/// Candidates sorted by descending score; ties keep catalog order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Ranking {
    recommendations: Vec<Recommendation>,
}

impl Ranking {
    /// Page `n` (0-based) of `PAGE_SIZE` recommendations; empty past the end
    pub fn page(&self, n: usize) -> &[Recommendation] {
        let start = n.saturating_mul(PAGE_SIZE).min(self.recommendations.len());
        let end = start.saturating_add(PAGE_SIZE).min(self.recommendations.len());
        &self.recommendations[start..end]
    }

    pub fn page_count(&self) -> usize {
        self.recommendations.len().div_ceil(PAGE_SIZE)
    }

    pub fn len(&self) -> usize {
        self.recommendations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recommendations.is_empty()
    }

    pub fn recommendations(&self) -> &[Recommendation] {
        &self.recommendations
    }
}

/// Cosine similarity; 0 when either vector has no magnitude
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    // NaN or infinite inputs score like a degenerate vector
    let similarity = dot / (norm_a * norm_b);
    if similarity.is_finite() {
        similarity
    } else {
        0.0
    }
}

/// Re-indexes every row of `table` into `space` by column name.
/// Columns of `space` the table lacks read 0; columns outside `space` are dropped.
fn align(table: &FeatureTable, space: &[String]) -> Vec<Vec<f64>> {
    let mapping: Vec<Option<usize>> = space.iter().map(|c| table.column_index(c)).collect();

    table
        .rows()
        .iter()
        .map(|row| {
            mapping
                .iter()
                .map(|i| i.map(|i| row.values[i]).unwrap_or(0.0))
                .collect()
        })
        .collect()
}

/// Non-genre columns must exist in both tables; only vocabularies may differ
fn check_base_columns(table: &FeatureTable, source_name: &str) -> AppResult<()> {
    for column in FeatureTable::base_columns() {
        if table.column_index(&column).is_none() {
            return Err(AppError::SchemaMismatch {
                column,
                source_name: source_name.to_string(),
            });
        }
    }
    Ok(())
}

/// No catalog yet
pub struct Empty;

pub struct CatalogLoaded {
    catalog: SelectedTable,
}

pub struct Profiled {
    taste: TasteVector,
    candidates: Vec<Candidate>,
}

/// Content-based recommender.
///
/// Typed state machine: `load_catalog` → `build_profile` → `score`/`page`.
pub struct Recommender<S> {
    state: S,
}

impl Default for Recommender<Empty> {
    fn default() -> Self {
        Self::new()
    }
}

impl Recommender<Empty> {
    pub fn new() -> Self {
        Self { state: Empty }
    }

    /// Loads the feature-selected catalog whose rows the recommendations describe
    pub fn load_catalog(self, catalog: SelectedTable) -> Recommender<CatalogLoaded> {
        Recommender {
            state: CatalogLoaded { catalog },
        }
    }
}

impl Recommender<CatalogLoaded> {
    /// Builds the taste vector and candidate pool.
    ///
    /// Both tables are aligned onto the catalog's column manifest first. The taste
    /// vector sums the catalog rows of the user's tracks; a user track missing from
    /// the catalog contributes its own aligned row. Every other catalog row is a
    /// candidate.
    pub fn build_profile(
        self,
        catalog_features: &FeatureTable,
        user_features: &FeatureTable,
    ) -> AppResult<Recommender<Profiled>> {
        check_base_columns(catalog_features, "catalog features")?;
        check_base_columns(user_features, "user features")?;

        let space: Vec<String> = catalog_features.columns().to_vec();

        let shared_terms = user_features
            .genre_terms()
            .filter(|term| {
                catalog_features
                    .column_index(&format!("genre|{}", term))
                    .is_some()
            })
            .count();
        tracing::debug!(
            catalog_terms = catalog_features.genre_terms().count(),
            user_terms = user_features.genre_terms().count(),
            shared_terms,
            "Aligning genre vocabularies"
        );

        let catalog_rows = align(catalog_features, &space);
        let user_rows = align(user_features, &space);

        let user_ids: HashSet<&TrackId> = user_features.ids().collect();
        let catalog_ids: HashSet<&TrackId> = catalog_features.ids().collect();

        let metadata: HashMap<&TrackId, &SelectedTrack> = {
            let mut map = HashMap::new();
            for track in self.state.catalog.rows() {
                map.entry(&track.id).or_insert(track);
            }
            map
        };

        let mut taste = vec![0.0; space.len()];
        let mut candidates = Vec::new();

        for (row, values) in catalog_features.rows().iter().zip(catalog_rows) {
            if user_ids.contains(&row.id) {
                for (sum, v) in taste.iter_mut().zip(&values) {
                    *sum += v;
                }
                continue;
            }

            let track = metadata.get(&row.id).ok_or_else(|| {
                AppError::InvalidInput(format!(
                    "track {} is in the catalog features but not in the loaded catalog",
                    row.id
                ))
            })?;

            candidates.push(Candidate {
                track: (*track).clone(),
                values,
            });
        }

        let mut outside_catalog = 0usize;
        for (row, values) in user_features.rows().iter().zip(user_rows) {
            if catalog_ids.contains(&row.id) {
                continue;
            }
            outside_catalog += 1;
            for (sum, v) in taste.iter_mut().zip(&values) {
                *sum += v;
            }
        }

        tracing::info!(
            user_tracks = user_features.len(),
            outside_catalog,
            candidates = candidates.len(),
            dimensions = space.len(),
            "Taste profile built"
        );

        Ok(Recommender {
            state: Profiled {
                taste: TasteVector {
                    columns: space,
                    values: taste,
                },
                candidates,
            },
        })
    }
}

impl Recommender<Profiled> {
    pub fn taste(&self) -> &TasteVector {
        &self.state.taste
    }

    pub fn candidate_count(&self) -> usize {
        self.state.candidates.len()
    }

    /// Scores every candidate against the taste vector and ranks them
    pub fn score(&self) -> Ranking {
        let taste = self.state.taste.values();

        let mut recommendations: Vec<Recommendation> = self
            .state
            .candidates
            .iter()
            .map(|c| Recommendation {
                track: c.track.clone(),
                score: cosine_similarity(&c.values, taste),
            })
            .collect();

        // stable: equal scores keep catalog order
        recommendations.sort_by(|a, b| b.score.total_cmp(&a.score));

        Ranking { recommendations }
    }

    /// Page `n` of the ranking
    pub fn page(&self, n: usize) -> Vec<Recommendation> {
        self.score().page(n).to_vec()
    }
}
