//! K-Means partitioning of standardized RFM features and cluster-count selection

use linfa::prelude::*;
use linfa_clustering::KMeans;
use linfa_nn::distance::L2Dist;
use std::ops::RangeInclusive;

use ndarray::{Array1, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{SegmentationError, SegmentationResult};
use crate::scaler::{FeatureMatrix, StandardScaler};

/// Smallest population for which a cluster count can be chosen
pub const MIN_CLUSTER_POPULATION: usize = 3;
/// Default lower bound of the cluster-count search
pub const DEFAULT_MIN_CLUSTERS: usize = 2;
/// Default upper bound of the cluster-count search
pub const DEFAULT_MAX_CLUSTERS: usize = 10;

/// K-Means hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionParams {
    pub seed: u64,
    /// Random initializations per fit; the lowest-inertia run is kept
    pub n_runs: usize,
    pub max_iters: u64,
    pub tolerance: f64,
}

impl Default for PartitionParams {
    fn default() -> Self {
        Self {
            seed: 42,
            n_runs: 10,
            max_iters: 300,
            tolerance: 1e-4,
        }
    }
}

/// Result of a single K-Means fit
#[derive(Debug, Clone)]
pub struct Partition {
    pub n_clusters: usize,
    /// Cluster assignment per customer
    pub labels: Array1<usize>,
    /// Centroids in standardized space, `(k, 3)`
    pub centroids: Array2<f64>,
    /// Within-cluster sum of squares
    pub inertia: f64,
}

impl Partition {
    /// Number of clusters with at least one member
    pub fn occupied_clusters(&self) -> usize {
        let mut seen = vec![false; self.n_clusters];
        for &label in self.labels.iter() {
            if let Some(slot) = seen.get_mut(label) {
                *slot = true;
            }
        }
        seen.into_iter().filter(|&s| s).count()
    }
}

/// Fit K-Means with `k` clusters
///
/// # Arguments
/// * `features` - Standardized feature matrix
/// * `k` - Number of clusters (at least 1, at most the number of rows)
/// * `params` - Seed, number of initializations and convergence settings
///
/// # Returns
/// * The best of `params.n_runs` seeded initializations
pub fn fit_partition(
    features: &Array2<f64>,
    k: usize,
    params: &PartitionParams,
) -> SegmentationResult<Partition> {
    if k == 0 || k > features.nrows() {
        return Err(SegmentationError::Configuration(format!(
            "cannot form {} clusters from {} customers",
            k,
            features.nrows()
        )));
    }

    let dataset = DatasetBase::from(features.clone());
    let rng = StdRng::seed_from_u64(params.seed);

    let model: KMeans<f64, L2Dist> = KMeans::params_with(k, rng, L2Dist)
        .n_runs(params.n_runs)
        .max_n_iterations(params.max_iters)
        .tolerance(params.tolerance)
        .fit(&dataset)
        .map_err(|e| SegmentationError::Clustering(e.to_string()))?;

    let labels = model.predict(features);
    let centroids = model.centroids().clone();
    let inertia = compute_inertia(features, &labels, &centroids);

    Ok(Partition {
        n_clusters: k,
        labels,
        centroids,
        inertia,
    })
}

/// Requested range of candidate cluster counts. An open upper bound is
/// filled in per population by [`ClusterRange::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterRange {
    pub min: usize,
    pub max: Option<usize>,
}

impl ClusterRange {
    pub fn new(min: usize, max: usize) -> Self {
        Self {
            min,
            max: Some(max),
        }
    }

    /// `min` and up, to the default cap
    pub fn at_least(min: usize) -> Self {
        Self { min, max: None }
    }

    /// A single fixed cluster count
    pub fn exactly(k: usize) -> Self {
        Self::new(k, k)
    }

    /// Resolve the inclusive search range for a population. An open upper bound
    /// is `min(10, population - 1)`; an explicit one must already fit the
    /// population.
    pub fn resolve(
        requested: Option<ClusterRange>,
        population: usize,
    ) -> SegmentationResult<RangeInclusive<usize>> {
        let range = requested.unwrap_or(Self::at_least(DEFAULT_MIN_CLUSTERS));
        if range.min < DEFAULT_MIN_CLUSTERS {
            return Err(SegmentationError::Configuration(format!(
                "minimum cluster count must be at least {}, got {}",
                DEFAULT_MIN_CLUSTERS, range.min
            )));
        }

        let max = match range.max {
            Some(max) if max >= population => {
                return Err(SegmentationError::Configuration(format!(
                    "maximum cluster count {} must be below the population size {}",
                    max, population
                )));
            }
            Some(max) => max,
            None => DEFAULT_MAX_CLUSTERS.min(population.saturating_sub(1)),
        };
        if max < range.min {
            return Err(SegmentationError::Configuration(format!(
                "maximum cluster count {} is below minimum {} for {} customers",
                max, range.min, population
            )));
        }
        Ok(range.min..=max)
    }
}

/// Quality of one candidate cluster count
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub k: usize,
    pub silhouette: f64,
    pub inertia: f64,
}

/// Outcome of the cluster-count search
#[derive(Debug, Clone)]
pub struct ClusterSelection {
    pub partition: Partition,
    pub silhouette: f64,
    /// Every candidate that produced a valid score, in search order
    pub candidates: Vec<CandidateScore>,
}

/// Pick the cluster count with the highest silhouette score.
///
/// Every `k` in the range is fitted once. Ties keep the smaller `k`. Candidates
/// whose fit leaves any of the `k` clusters empty are skipped, so every recorded
/// candidate has exactly `k` occupied clusters.
pub fn select_cluster_count(
    features: &Array2<f64>,
    requested: Option<ClusterRange>,
    params: &PartitionParams,
) -> SegmentationResult<ClusterSelection> {
    let population = features.nrows();
    if population < MIN_CLUSTER_POPULATION {
        return Err(SegmentationError::InsufficientData {
            stage: "cluster selection",
            required: MIN_CLUSTER_POPULATION,
            actual: population,
        });
    }
    let range = ClusterRange::resolve(requested, population)?;

    let mut best: Option<(f64, Partition)> = None;
    let mut candidates = Vec::with_capacity(range.clone().count());

    for k in range.clone() {
        let partition = fit_partition(features, k, params)?;
        let occupied = partition.occupied_clusters();
        if occupied < k {
            warn!(k, occupied, "fit left empty clusters, skipping");
            continue;
        }
        let Some(score) = silhouette_score(features, &partition.labels) else {
            warn!(k, "fit produced fewer than two clusters, skipping");
            continue;
        };
        debug!(k, silhouette = score, inertia = partition.inertia, "evaluated cluster count");

        candidates.push(CandidateScore {
            k,
            silhouette: score,
            inertia: partition.inertia,
        });
        if best.as_ref().map_or(true, |(best_score, _)| score > *best_score) {
            best = Some((score, partition));
        }
    }

    let (silhouette, partition) = best.ok_or_else(|| {
        SegmentationError::Clustering(format!(
            "no cluster count in {}..={} separated the customers",
            range.start(),
            range.end()
        ))
    })?;

    info!(
        k = partition.n_clusters,
        silhouette,
        candidates = candidates.len(),
        "selected cluster count"
    );
    Ok(ClusterSelection {
        partition,
        silhouette,
        candidates,
    })
}

/// Fitted clustering of a customer population
#[derive(Debug, Clone)]
pub struct ClusterModel {
    pub n_clusters: usize,
    /// Cluster assignment per customer
    pub labels: Array1<usize>,
    /// Cluster centroids in normalized space
    pub centroids: Array2<f64>,
    /// Within-cluster sum of squares (inertia)
    pub inertia: f64,
    pub silhouette: f64,
    pub candidates: Vec<CandidateScore>,
    /// Seed the final partition was initialized from
    pub seed: u64,
    /// Scaler fitted on the same population, used for prediction
    pub scaler: StandardScaler,
}

impl ClusterModel {
    /// Select `k`, fit the final partition and keep the scaler for prediction
    pub fn fit(
        matrix: FeatureMatrix,
        requested: Option<ClusterRange>,
        params: &PartitionParams,
    ) -> SegmentationResult<Self> {
        let selection = select_cluster_count(&matrix.features, requested, params)?;
        let partition = selection.partition;

        Ok(Self {
            n_clusters: partition.n_clusters,
            labels: partition.labels,
            centroids: partition.centroids,
            inertia: partition.inertia,
            silhouette: selection.silhouette,
            candidates: selection.candidates,
            seed: params.seed,
            scaler: matrix.scaler,
        })
    }

    /// Predict the cluster of raw `[recency, frequency, monetary]` values
    pub fn predict(&self, rfm: &[f64; 3]) -> SegmentationResult<usize> {
        let scaled = self.scaler.transform_row(rfm)?;
        Ok(self.nearest_centroid(&scaled.view()))
    }

    /// Index of the centroid closest to a standardized point
    pub fn nearest_centroid(&self, point: &ArrayView1<f64>) -> usize {
        let mut min_distance = f64::INFINITY;
        let mut closest_cluster = 0;

        for (cluster_idx, centroid) in self.centroids.outer_iter().enumerate() {
            let distance = euclidean_distance(point, &centroid);
            if distance < min_distance {
                min_distance = distance;
                closest_cluster = cluster_idx;
            }
        }

        closest_cluster
    }

    /// Get cluster sizes
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.n_clusters];
        for &label in self.labels.iter() {
            if label < self.n_clusters {
                sizes[label] += 1;
            }
        }
        sizes
    }

    /// Centroids mapped back to raw recency / frequency / monetary units
    pub fn raw_centroids(&self) -> Array2<f64> {
        self.scaler.inverse_transform(&self.centroids)
    }
}

/// Mean silhouette coefficient over all points.
///
/// For each point, `a` is the mean distance to the rest of its cluster and `b`
/// the smallest mean distance to another cluster; its coefficient is
/// `(b - a) / max(a, b)`, and 0 for members of singleton clusters. Returns `None`
/// unless there are between 2 and `n - 1` non-empty clusters.
pub fn silhouette_score(features: &Array2<f64>, labels: &Array1<usize>) -> Option<f64> {
    let n_samples = features.nrows();
    let n_labels = labels.iter().copied().max()? + 1;

    let mut sizes = vec![0usize; n_labels];
    for &label in labels.iter() {
        sizes[label] += 1;
    }
    let non_empty = sizes.iter().filter(|&&s| s > 0).count();
    if non_empty < 2 || non_empty >= n_samples {
        return None;
    }

    let mut silhouette_sum = 0.0;
    let mut distance_sums = vec![0.0; n_labels];

    for i in 0..n_samples {
        let own = labels[i];
        if sizes[own] <= 1 {
            continue;
        }

        distance_sums.iter_mut().for_each(|d| *d = 0.0);
        let point = features.row(i);
        for j in 0..n_samples {
            if i != j {
                distance_sums[labels[j]] += euclidean_distance(&point, &features.row(j));
            }
        }

        let a_i = distance_sums[own] / (sizes[own] - 1) as f64;
        let b_i = (0..n_labels)
            .filter(|&c| c != own && sizes[c] > 0)
            .map(|c| distance_sums[c] / sizes[c] as f64)
            .fold(f64::INFINITY, f64::min);

        let denominator = a_i.max(b_i);
        if denominator > 0.0 {
            silhouette_sum += (b_i - a_i) / denominator;
        }
    }

    Some(silhouette_sum / n_samples as f64)
}

/// Compute within-cluster sum of squares (inertia)
fn compute_inertia(features: &Array2<f64>, labels: &Array1<usize>, centroids: &Array2<f64>) -> f64 {
    let mut inertia = 0.0;

    for (i, &cluster) in labels.iter().enumerate() {
        if cluster < centroids.nrows() {
            let distance = euclidean_distance(&features.row(i), &centroids.row(cluster));
            inertia += distance * distance;
        }
    }

    inertia
}

/// Calculate Euclidean distance between two points
fn euclidean_distance(point1: &ArrayView1<f64>, point2: &ArrayView1<f64>) -> f64 {
    point1
        .iter()
        .zip(point2.iter())
        .map(|(a, b)| (a - b).powi(2))
        .sum::<f64>()
        .sqrt()
}
