//! rfm-segment: customer segmentation from transaction history
//!
//! Every customer gets Recency, Frequency and Monetary metrics, quintile scores
//! and a rule-based segment label. The same metrics are standardized and
//! partitioned with K-Means, the cluster count chosen by silhouette score.

pub mod clean;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod export;
pub mod model;
pub mod pipeline;
pub mod recommend;
pub mod rfm;
pub mod scaler;
pub mod scoring;
pub mod segment;
pub mod summary;
pub mod viz;

// Re-export public items for easier access
pub use clean::{
    assess_quality, clean_transactions, preprocess, validate_processed, CleaningConfig,
    CleaningReport, DataQualityReport, PreprocessingReport, ValidationResult,
};
pub use cli::Args;
pub use config::SegmentationConfig;
pub use data::{
    generate_sample_transactions, into_transactions, load_transactions, RawTransaction,
    Transaction,
};
pub use error::{SegmentationError, SegmentationResult};
pub use export::{export_report, write_preprocessing_report};
pub use model::{select_cluster_count, silhouette_score, ClusterModel, ClusterRange, PartitionParams};
pub use pipeline::{run_pipeline, SegmentationReport};
pub use recommend::{recommendation_for, recommendations_for, Recommendation};
pub use rfm::{compute_metrics, CustomerMetrics};
pub use scaler::{FeatureMatrix, StandardScaler};
pub use scoring::{score_customers, RfmScores, ScoredCustomer};
pub use segment::{classify, segment_customers, Segment, SegmentedCustomer};
pub use summary::{summarize_clusters, summarize_segments, ClusterSummary, SegmentSummary};

/// Common result type used throughout the application
pub type Result<T> = anyhow::Result<T>;
