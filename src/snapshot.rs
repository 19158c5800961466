//! Immutable corpus snapshots and the store that publishes them.
//!
//! A [`CorpusSnapshot`] bundles the reference corpus with the archetype model
//! fit on it and the normalized reference matrix. Snapshots are never mutated;
//! a rebuild produces a new one which [`CorpusStore::publish`] swaps in whole.

use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::info;

use crate::archetype::ArchetypeModel;
use crate::config::ClusterConfig;
use crate::errors::{Result, StyleEngineError};
use crate::reference_corpus::{ReferenceCorpus, ReferencePlayer};
use crate::style_vector::{StyleVector, FEATURE_COUNT};

/// Reference corpus plus everything derived from it at build time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusSnapshot {
    corpus: ReferenceCorpus,
    model: ArchetypeModel,
    /// Normalized reference vectors, row `i` belongs to `player_ids[i]`
    points: Array2<f64>,
    player_ids: Vec<String>,
    cluster: ClusterConfig,
    built_at: DateTime<Utc>,
}

impl CorpusSnapshot {
    /// Fit archetypes on `corpus` and freeze the result.
    pub fn build(corpus: ReferenceCorpus, cluster: &ClusterConfig) -> Result<Self> {
        let vectors = corpus.style_vectors();
        let model = ArchetypeModel::fit(&vectors, cluster)?;
        let points = model.normalizer().transform_all(&vectors)?;
        let player_ids: Vec<String> = corpus.ids().map(str::to_string).collect();
        let corpus = corpus.with_archetypes(model.labels());

        info!(
            "Corpus snapshot built: {} players, {} archetypes",
            player_ids.len(),
            model.archetype_count()
        );

        Ok(Self {
            corpus,
            model,
            points,
            player_ids,
            cluster: cluster.clone(),
            built_at: Utc::now(),
        })
    }

    pub fn corpus(&self) -> &ReferenceCorpus {
        &self.corpus
    }

    pub fn model(&self) -> &ArchetypeModel {
        &self.model
    }

    pub fn points(&self) -> &Array2<f64> {
        &self.points
    }

    pub fn player_ids(&self) -> &[String] {
        &self.player_ids
    }

    pub fn cluster_config(&self) -> &ClusterConfig {
        &self.cluster
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn player_count(&self) -> usize {
        self.player_ids.len()
    }

    pub fn player(&self, row: usize) -> Option<&ReferencePlayer> {
        self.player_ids.get(row).and_then(|id| self.corpus.get(id))
    }

    pub fn point(&self, row: usize) -> ArrayView1<f64> {
        self.points.row(row)
    }

    /// Archetype label of reference row `row`
    pub fn label(&self, row: usize) -> usize {
        self.model.labels()[row]
    }

    /// Place a query vector with the corpus normalization.
    pub fn normalize(&self, vector: &StyleVector) -> Result<Array1<f64>> {
        self.model.normalizer().transform(vector)
    }

    /// Internal agreement between the corpus, ids, matrix and labels.
    fn check_consistency(&self) -> Result<()> {
        let normalizer = self.model.normalizer();
        for width in [
            self.points.ncols(),
            self.model.centroids().ncols(),
            normalizer.center().len(),
            normalizer.scale().len(),
        ] {
            if width != FEATURE_COUNT {
                return Err(StyleEngineError::Consistency {
                    expected: FEATURE_COUNT,
                    found: width,
                });
            }
        }
        let rows = self.player_ids.len();
        for (part, found) in [
            ("normalized rows", self.points.nrows()),
            ("corpus players", self.corpus.len()),
            ("archetype labels", self.model.labels().len()),
        ] {
            if found != rows {
                return Err(crate::config_error!(
                    "snapshot has {} player ids but {} {}",
                    rows,
                    found,
                    part
                ));
            }
        }
        let archetypes = self.model.archetype_count();
        if let Some(&label) = self.model.labels().iter().find(|&&l| l >= archetypes) {
            return Err(crate::config_error!(
                "snapshot label {} is out of range for {} archetypes",
                label,
                archetypes
            ));
        }
        for player in self.corpus.players() {
            player.style.check_dimensions()?;
        }
        Ok(())
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let snapshot: CorpusSnapshot = serde_json::from_reader(reader)?;
        snapshot.check_consistency()?;
        Ok(snapshot)
    }

    pub fn save_binary<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(writer, self)?;
        Ok(())
    }

    pub fn load_binary<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let snapshot: CorpusSnapshot = bincode::deserialize_from(reader)?;
        snapshot.check_consistency()?;
        Ok(snapshot)
    }

    /// Save as JSON when the extension is `.json`, binary otherwise.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if is_json(path.as_ref()) {
            self.save_json(path)
        } else {
            self.save_binary(path)
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        if is_json(path.as_ref()) {
            Self::load_json(path)
        } else {
            Self::load_binary(path)
        }
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Lifecycle state of a [`CorpusStore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    Unbuilt,
    Ready,
}

/// Holder of the currently served snapshot.
///
/// Readers clone the `Arc` and keep using it even if a rebuild publishes a
/// replacement in the meantime.
#[derive(Debug, Default)]
pub struct CorpusStore {
    current: RwLock<Option<Arc<CorpusSnapshot>>>,
}

impl CorpusStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: CorpusSnapshot) -> Self {
        Self {
            current: RwLock::new(Some(Arc::new(snapshot))),
        }
    }

    pub fn state(&self) -> StoreState {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        if guard.is_some() {
            StoreState::Ready
        } else {
            StoreState::Unbuilt
        }
    }

    /// Snapshot to serve queries from, or `NotInitialized` before the first publish.
    pub fn current(&self) -> Result<Arc<CorpusSnapshot>> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        guard.clone().ok_or(StyleEngineError::NotInitialized)
    }

    /// Replace the served snapshot, returning the previous one.
    pub fn publish(&self, snapshot: CorpusSnapshot) -> Option<Arc<CorpusSnapshot>> {
        let snapshot = Arc::new(snapshot);
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        info!("Publishing corpus snapshot with {} players", snapshot.player_count());
        guard.replace(snapshot)
    }
}
