//! Command-line interface definitions and argument parsing

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Parser;

use crate::config::SegmentationConfig;

/// Customer segmentation from transaction history using RFM scoring and K-Means
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the transaction CSV (customer_id, transaction_date, transaction_amount)
    #[arg(short, long, required_unless_present = "sample", conflicts_with = "sample")]
    pub input: Option<PathBuf>,

    /// Generate demo transactions instead of reading a file
    #[arg(long)]
    pub sample: bool,

    /// Directory for CSV/JSON exports and charts
    #[arg(short, long, default_value = "output")]
    pub output_dir: PathBuf,

    /// TOML config file; flags given here take precedence over it
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Reference date for recency (YYYY-MM-DD); defaults to the latest transaction
    #[arg(long)]
    pub analysis_date: Option<NaiveDate>,

    /// Fixed number of clusters, skipping the silhouette search
    #[arg(short = 'k', long)]
    pub clusters: Option<usize>,

    /// Lower bound of the cluster-count search
    #[arg(long)]
    pub min_clusters: Option<usize>,

    /// Upper bound of the cluster-count search
    #[arg(long)]
    pub max_clusters: Option<usize>,

    /// Seed for K-Means initialization and sample data
    #[arg(long)]
    pub seed: Option<u64>,

    /// Skip SVG chart generation
    #[arg(long)]
    pub no_charts: bool,

    /// Skip cleaning; rows with missing fields are still rejected
    #[arg(long)]
    pub no_clean: bool,

    /// Prediction mode: provide R,F,M values as comma-separated string
    /// Example: --predict "30,10,500.0" for Recency=30, Frequency=10, Monetary=500.0
    #[arg(short, long)]
    pub predict: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Parse RFM values from the predict string
    /// Expected format: "recency,frequency,monetary"
    pub fn parse_rfm_values(&self) -> crate::Result<Option<[f64; 3]>> {
        let Some(ref predict_str) = self.predict else {
            return Ok(None);
        };
        let parts: Vec<&str> = predict_str.split(',').collect();
        if parts.len() != 3 {
            anyhow::bail!("Predict values must be in format 'recency,frequency,monetary'");
        }

        let mut values = [0.0f64; 3];
        for ((value, part), name) in values
            .iter_mut()
            .zip(&parts)
            .zip(["recency", "frequency", "monetary"])
        {
            *value = part
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid {} value: {}", name, part))?;
            if !value.is_finite() || *value < 0.0 {
                anyhow::bail!("{} must be a non-negative number, got {}", name, part);
            }
        }
        Ok(Some(values))
    }

    /// Load the config file, if any, and apply flag overrides on top
    pub fn resolve_config(&self) -> crate::Result<SegmentationConfig> {
        let mut config = match &self.config {
            Some(path) => SegmentationConfig::load(path)?,
            None => SegmentationConfig::default(),
        };
        self.apply_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(&self, config: &mut SegmentationConfig) {
        if self.analysis_date.is_some() {
            config.analysis_date = self.analysis_date;
        }
        if self.clusters.is_some() {
            config.clusters = self.clusters;
        }
        if self.min_clusters.is_some() {
            config.min_clusters = self.min_clusters;
        }
        if self.max_clusters.is_some() {
            config.max_clusters = self.max_clusters;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
    }
}
