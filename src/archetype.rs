//! Style archetypes.
//!
//! Reference vectors are standardized per feature and partitioned with Lloyd's
//! k-means. Initial centroids come from a seeded generator and every tie is
//! broken towards the lower centroid index, so a fit is fully reproducible.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ClusterConfig;
use crate::config_error;
use crate::errors::Result;
use crate::style_vector::{StyleFeature, StyleVector, FEATURE_COUNT};
use crate::utils::VectorOps;

/// Per-feature center/scale fit on the reference corpus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Normalizer {
    center: Vec<f64>,
    scale: Vec<f64>,
}

impl Normalizer {
    /// Fit on present values only. A feature with no value anywhere in the
    /// reference set cannot be centered and is rejected.
    pub fn fit(vectors: &[&StyleVector]) -> Result<Self> {
        let mut center = Vec::with_capacity(FEATURE_COUNT);
        let mut scale = Vec::with_capacity(FEATURE_COUNT);

        for feature in StyleFeature::ALL {
            let present: Vec<f64> = vectors.iter().filter_map(|v| v.get(feature)).collect();
            if present.is_empty() {
                return Err(config_error!(
                    "feature '{}' has no values in the reference corpus",
                    feature.name()
                ));
            }

            let n = present.len() as f64;
            let mean = present.iter().sum::<f64>() / n;
            let variance = present.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
            let std = variance.sqrt();

            center.push(mean);
            scale.push(if std < f64::EPSILON { 1.0 } else { std });
        }

        Ok(Self { center, scale })
    }

    pub fn center(&self) -> &[f64] {
        &self.center
    }

    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    /// Place a vector in normalized space. Absent features sit at the center.
    pub fn transform(&self, vector: &StyleVector) -> Result<Array1<f64>> {
        vector.check_dimensions()?;
        Ok(vector
            .values()
            .iter()
            .zip(self.center.iter().zip(self.scale.iter()))
            .map(|(value, (center, scale))| match value {
                Some(x) => (x - center) / scale,
                None => 0.0,
            })
            .collect())
    }

    /// Normalize many vectors into one row per vector.
    pub fn transform_all(&self, vectors: &[&StyleVector]) -> Result<Array2<f64>> {
        let mut matrix = Array2::<f64>::zeros((vectors.len(), FEATURE_COUNT));
        for (mut row, vector) in matrix.axis_iter_mut(Axis(0)).zip(vectors.iter()) {
            row.assign(&self.transform(vector)?);
        }
        Ok(matrix)
    }
}

/// Size and centroid of one archetype, for reporting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchetypeSummary {
    pub index: usize,
    pub size: usize,
    pub centroid: Vec<f64>,
}

/// Fitted normalization plus archetype centroids
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchetypeModel {
    normalizer: Normalizer,
    centroids: Array2<f64>,
    labels: Vec<usize>,
    iterations: usize,
    converged: bool,
}

impl ArchetypeModel {
    /// Fit on the reference vectors in the given order; `labels()[i]` is the
    /// archetype of `vectors[i]`.
    pub fn fit(vectors: &[&StyleVector], config: &ClusterConfig) -> Result<Self> {
        if config.k_arch == 0 {
            return Err(config_error!("k_arch must be at least 1"));
        }
        if vectors.len() < config.k_arch {
            return Err(config_error!(
                "reference corpus has {} players but k_arch is {}",
                vectors.len(),
                config.k_arch
            ));
        }

        let normalizer = Normalizer::fit(vectors)?;
        let points = normalizer.transform_all(vectors)?;
        let (centroids, labels, iterations, converged) = lloyd(&points, config);

        info!(
            "Fitted {} archetypes over {} players in {} iterations (converged: {})",
            config.k_arch,
            vectors.len(),
            iterations,
            converged
        );

        Ok(Self {
            normalizer,
            centroids,
            labels,
            iterations,
            converged,
        })
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn centroids(&self) -> &Array2<f64> {
        &self.centroids
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    pub fn archetype_count(&self) -> usize {
        self.centroids.nrows()
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn converged(&self) -> bool {
        self.converged
    }

    /// Archetype of an already-normalized point.
    pub fn assign(&self, point: ArrayView1<f64>) -> usize {
        VectorOps::nearest_row(point, self.centroids.view())
    }

    /// Archetype of a raw style vector, using the corpus normalization.
    pub fn classify(&self, vector: &StyleVector) -> Result<usize> {
        let point = self.normalizer.transform(vector)?;
        Ok(self.assign(point.view()))
    }

    /// The `n` archetypes closest to a normalized point, nearest first.
    pub fn nearest_archetypes(&self, point: ArrayView1<f64>, n: usize) -> Vec<usize> {
        let mut ranked: Vec<(f64, usize)> = self
            .centroids
            .axis_iter(Axis(0))
            .enumerate()
            .map(|(index, centroid)| (VectorOps::squared_distance(point, centroid), index))
            .collect();
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        ranked.into_iter().take(n).map(|(_, index)| index).collect()
    }

    pub fn summaries(&self) -> Vec<ArchetypeSummary> {
        let mut sizes = vec![0; self.archetype_count()];
        for &label in &self.labels {
            sizes[label] += 1;
        }
        self.centroids
            .axis_iter(Axis(0))
            .enumerate()
            .map(|(index, centroid)| ArchetypeSummary {
                index,
                size: sizes[index],
                centroid: centroid.to_vec(),
            })
            .collect()
    }
}

fn assign_all(points: &Array2<f64>, centroids: &Array2<f64>) -> Vec<usize> {
    points
        .axis_iter(Axis(0))
        .map(|point| VectorOps::nearest_row(point, centroids.view()))
        .collect()
}

/// Lloyd iterations until assignments stop changing or the cap is reached.
fn lloyd(points: &Array2<f64>, config: &ClusterConfig) -> (Array2<f64>, Vec<usize>, usize, bool) {
    let k = config.k_arch;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let initial = rand::seq::index::sample(&mut rng, points.nrows(), k);

    let mut centroids = Array2::<f64>::zeros((k, points.ncols()));
    for (slot, row) in initial.iter().enumerate() {
        centroids.row_mut(slot).assign(&points.row(row));
    }

    let mut labels = assign_all(points, &centroids);
    let mut iterations = 0;
    let mut converged = false;

    while iterations < config.max_iterations {
        iterations += 1;

        let mut members: Vec<Vec<usize>> = vec![Vec::new(); k];
        for (row, &label) in labels.iter().enumerate() {
            members[label].push(row);
        }
        for (index, rows) in members.iter().enumerate() {
            // an empty archetype keeps its previous centroid
            if let Some(centroid) = VectorOps::compute_centroid(points.view(), rows) {
                centroids.row_mut(index).assign(&centroid);
            }
        }

        let next = assign_all(points, &centroids);
        if next == labels {
            converged = true;
            break;
        }
        debug!(
            "k-means iteration {}: {} reassignments",
            iterations,
            next.iter().zip(&labels).filter(|(a, b)| a != b).count()
        );
        labels = next;
    }

    (centroids, labels, iterations, converged)
}
