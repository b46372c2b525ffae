//! Run configuration loaded from TOML, with CLI overrides applied on top

use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clean::CleaningConfig;
use crate::error::{SegmentationError, SegmentationResult};
use crate::model::{ClusterRange, PartitionParams, DEFAULT_MIN_CLUSTERS};

/// Settings for one segmentation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Reference date for recency; defaults to the latest transaction
    pub analysis_date: Option<NaiveDate>,
    /// Fixed number of clusters, skipping the search
    pub clusters: Option<usize>,
    /// Lower bound of the cluster-count search
    pub min_clusters: Option<usize>,
    /// Upper bound of the cluster-count search
    pub max_clusters: Option<usize>,
    pub seed: u64,
    pub n_runs: usize,
    pub max_iters: u64,
    pub tolerance: f64,
    pub cleaning: CleaningConfig,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        let params = PartitionParams::default();
        Self {
            analysis_date: None,
            clusters: None,
            min_clusters: None,
            max_clusters: None,
            seed: params.seed,
            n_runs: params.n_runs,
            max_iters: params.max_iters,
            tolerance: params.tolerance,
            cleaning: CleaningConfig::default(),
        }
    }
}

impl SegmentationConfig {
    /// Load config from a TOML file. Missing keys take their defaults.
    pub fn load(path: &Path) -> crate::Result<Self> {
        debug!(path = %path.display(), "loading config");
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config: {}", path.display()))?;
        Ok(config)
    }

    pub fn partition_params(&self) -> PartitionParams {
        PartitionParams {
            seed: self.seed,
            n_runs: self.n_runs,
            max_iters: self.max_iters,
            tolerance: self.tolerance,
        }
    }

    /// Explicit cluster-count range, if any was configured. A fixed cluster count
    /// wins over search bounds. A missing minimum defaults to 2; a missing maximum
    /// stays open and is capped by the population when the range is resolved.
    pub fn cluster_range(&self) -> Option<ClusterRange> {
        if let Some(k) = self.clusters {
            return Some(ClusterRange::exactly(k));
        }
        match (self.min_clusters, self.max_clusters) {
            (None, None) => None,
            (min, max) => Some(ClusterRange {
                min: min.unwrap_or(DEFAULT_MIN_CLUSTERS),
                max,
            }),
        }
    }

    /// Reject settings that cannot produce a run. Range bounds that depend on
    /// the population size are checked later, during cluster selection.
    pub fn validate(&self) -> SegmentationResult<()> {
        if self.n_runs == 0 {
            return Err(SegmentationError::Configuration(
                "n_runs must be at least 1".into(),
            ));
        }
        if self.max_iters == 0 {
            return Err(SegmentationError::Configuration(
                "max_iters must be at least 1".into(),
            ));
        }
        if !(self.tolerance > 0.0) {
            return Err(SegmentationError::Configuration(format!(
                "tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        if let Some(range) = self.cluster_range() {
            if range.min < DEFAULT_MIN_CLUSTERS || range.max.is_some_and(|max| max < range.min) {
                return Err(SegmentationError::Configuration(format!(
                    "invalid cluster range {:?}",
                    range
                )));
            }
        }
        if !(self.cleaning.outlier_iqr_factor >= 0.0) {
            return Err(SegmentationError::Configuration(format!(
                "outlier_iqr_factor must be non-negative, got {}",
                self.cleaning.outlier_iqr_factor
            )));
        }
        Ok(())
    }
}
