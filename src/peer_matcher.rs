use ndarray::ArrayView1;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

use crate::config::SearchStrategy;
use crate::config_error;
use crate::errors::{Result, StyleEngineError};
use crate::snapshot::CorpusSnapshot;
use crate::style_vector::StyleVector;
use crate::utils::VectorOps;

/// Corpus size above which the exhaustive scan runs in parallel
const PARALLEL_SCAN_THRESHOLD: usize = 2048;

/// A reference player and its distance to the query (smaller is closer)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Peer {
    pub player_id: String,
    pub distance: f64,
    #[serde(skip)]
    pub archetype: Option<usize>,
}

/// Nearest-neighbour search over one corpus snapshot
pub struct PeerMatcher<'a> {
    snapshot: &'a CorpusSnapshot,
}

impl<'a> PeerMatcher<'a> {
    pub fn new(snapshot: &'a CorpusSnapshot) -> Self {
        Self { snapshot }
    }

    /// The `k` reference players closest to `query`, nearest first.
    ///
    /// `k` larger than the corpus returns the whole corpus.
    pub fn find_peers(
        &self,
        query: &StyleVector,
        k: usize,
        strategy: SearchStrategy,
    ) -> Result<Vec<Peer>> {
        let point = self.snapshot.normalize(query)?;
        self.find_peers_normalized(point.view(), k, strategy)
    }

    /// Same as [`find_peers`](Self::find_peers) for an already-normalized query.
    pub fn find_peers_normalized(
        &self,
        point: ArrayView1<f64>,
        k: usize,
        strategy: SearchStrategy,
    ) -> Result<Vec<Peer>> {
        if k == 0 {
            return Err(config_error!("number of peers must be at least 1"));
        }
        if point.len() != self.snapshot.points().ncols() {
            return Err(StyleEngineError::Consistency {
                expected: self.snapshot.points().ncols(),
                found: point.len(),
            });
        }

        let k = k.min(self.snapshot.player_count());
        let mut scored = match strategy {
            SearchStrategy::Exhaustive => self.scan_all(point),
            SearchStrategy::Archetype { probes } => {
                let candidates = self.archetype_candidates(point, probes);
                if candidates.len() < k {
                    debug!(
                        "Archetype probe found {} candidates for k={}, scanning full corpus",
                        candidates.len(),
                        k
                    );
                    self.scan_all(point)
                } else {
                    self.scan_rows(point, &candidates)
                }
            }
        };

        scored.sort_by(|a, b| self.rank(a, b));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(row, distance)| Peer {
                player_id: self.snapshot.player_ids()[row].clone(),
                distance,
                archetype: Some(self.snapshot.label(row)),
            })
            .collect())
    }

    fn rank(&self, a: &(usize, f64), b: &(usize, f64)) -> Ordering {
        let ids = self.snapshot.player_ids();
        a.1.total_cmp(&b.1).then_with(|| ids[a.0].cmp(&ids[b.0]))
    }

    fn scan_all(&self, point: ArrayView1<f64>) -> Vec<(usize, f64)> {
        let rows = self.snapshot.player_count();
        if rows >= PARALLEL_SCAN_THRESHOLD {
            (0..rows)
                .into_par_iter()
                .map(|row| (row, self.distance_to(point, row)))
                .collect()
        } else {
            (0..rows).map(|row| (row, self.distance_to(point, row))).collect()
        }
    }

    fn scan_rows(&self, point: ArrayView1<f64>, rows: &[usize]) -> Vec<(usize, f64)> {
        rows.iter()
            .map(|&row| (row, self.distance_to(point, row)))
            .collect()
    }

    /// Rows belonging to the `probes` archetypes nearest to `point`.
    fn archetype_candidates(&self, point: ArrayView1<f64>, probes: usize) -> Vec<usize> {
        let model = self.snapshot.model();
        let nearest = model.nearest_archetypes(point, probes.max(1));
        model
            .labels()
            .iter()
            .enumerate()
            .filter(|(_, label)| nearest.contains(label))
            .map(|(row, _)| row)
            .collect()
    }

    fn distance_to(&self, point: ArrayView1<f64>, row: usize) -> f64 {
        VectorOps::euclidean_distance(point, self.snapshot.point(row))
    }
}
