//! End-to-end segmentation run: metrics, scores, segments, clusters, summaries

use chrono::{NaiveDate, NaiveDateTime};
use ndarray::Array1;
use tracing::info;

use crate::config::SegmentationConfig;
use crate::data::Transaction;
use crate::error::{SegmentationError, SegmentationResult};
use crate::model::ClusterModel;
use crate::rfm::compute_metrics;
use crate::scaler::FeatureMatrix;
use crate::scoring::score_customers;
use crate::segment::{segment_customers, SegmentedCustomer};
use crate::summary::{summarize_clusters, summarize_segments, ClusterSummary, SegmentSummary};

/// Everything a run produces
#[derive(Debug, Clone)]
pub struct SegmentationReport {
    /// Reference instant recency was measured from
    pub analysis_date: NaiveDateTime,
    pub customers: Vec<SegmentedCustomer>,
    pub segments: Vec<SegmentSummary>,
    pub clusters: Vec<ClusterSummary>,
    pub model: ClusterModel,
}

/// Run every stage on a cleaned transaction set. Any failing stage aborts the run.
pub fn run_pipeline(
    transactions: &[Transaction],
    config: &SegmentationConfig,
) -> SegmentationResult<SegmentationReport> {
    config.validate()?;

    let analysis_date = resolve_analysis_date(transactions, config.analysis_date)?;
    let metrics = compute_metrics(transactions, Some(analysis_date))?;
    let matrix = FeatureMatrix::from_metrics(&metrics)?;

    let customers = segment_customers(score_customers(metrics)?);
    let model = ClusterModel::fit(matrix, config.cluster_range(), &config.partition_params())?;
    let customers = assign_clusters(customers, &model.labels)?;

    let segments = summarize_segments(&customers);
    let clusters = summarize_clusters(&customers);

    info!(
        customers = customers.len(),
        segments = segments.len(),
        clusters = model.n_clusters,
        silhouette = model.silhouette,
        "segmentation complete"
    );
    Ok(SegmentationReport {
        analysis_date,
        customers,
        segments,
        clusters,
        model,
    })
}

/// A configured analysis date covers that whole day; otherwise the latest
/// transaction is the reference point.
fn resolve_analysis_date(
    transactions: &[Transaction],
    configured: Option<NaiveDate>,
) -> SegmentationResult<NaiveDateTime> {
    match configured {
        Some(date) => date.and_hms_opt(23, 59, 59).ok_or_else(|| {
            SegmentationError::Configuration(format!("invalid analysis date {date}"))
        }),
        None => transactions
            .iter()
            .map(|t| t.timestamp)
            .max()
            .ok_or_else(|| SegmentationError::InvalidInput("transaction set is empty".into())),
    }
}

/// Attach cluster ids, one label per customer in the same order
pub fn assign_clusters(
    mut customers: Vec<SegmentedCustomer>,
    labels: &Array1<usize>,
) -> SegmentationResult<Vec<SegmentedCustomer>> {
    if customers.len() != labels.len() {
        return Err(SegmentationError::InvalidInput(format!(
            "{} cluster labels for {} customers",
            labels.len(),
            customers.len()
        )));
    }
    for (customer, &label) in customers.iter_mut().zip(labels.iter()) {
        customer.cluster_id = Some(label);
    }
    Ok(customers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::generate_sample_transactions;

    fn transactions() -> Vec<Transaction> {
        let base = NaiveDate::from_ymd_opt(2024, 6, 30)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        // (customer, days before base, amount)
        let rows: [(&str, i64, f64); 16] = [
            ("c1", 0, 250.0),
            ("c1", 3, 300.0),
            ("c1", 9, 280.0),
            ("c2", 1, 40.0),
            ("c3", 60, 500.0),
            ("c3", 75, 450.0),
            ("c4", 120, 15.0),
            ("c5", 150, 20.0),
            ("c5", 155, 22.0),
            ("c6", 5, 35.0),
            ("c6", 7, 30.0),
            ("c7", 200, 1200.0),
            ("c8", 30, 60.0),
            ("c8", 31, 65.0),
            ("c8", 32, 70.0),
            ("c9", 90, 10.0),
        ];
        rows.iter()
            .map(|&(id, days, amount)| {
                Transaction::new(id, base - chrono::Duration::days(days), amount)
            })
            .collect()
    }

    #[test]
    fn test_run_pipeline() {
        let report = run_pipeline(&transactions(), &SegmentationConfig::default()).unwrap();

        assert_eq!(report.customers.len(), 9);
        assert!(report.customers.iter().all(|c| c.cluster_id.is_some()));
        assert!(report.model.n_clusters >= 2 && report.model.n_clusters <= 8);
        assert_eq!(report.clusters.len(), report.model.cluster_sizes().iter().filter(|&&s| s > 0).count());

        let total: usize = report.segments.iter().map(|s| s.customers).sum();
        assert_eq!(total, 9);
        let pct: f64 = report.segments.iter().map(|s| s.percentage).sum();
        assert!((pct - 100.0).abs() < 1e-9);

        let c1 = &report.customers[0];
        assert_eq!(c1.metrics.customer_id, "c1");
        assert_eq!(c1.metrics.recency, 0);
        assert_eq!(c1.metrics.frequency, 3);
    }

    #[test]
    fn test_run_pipeline_is_deterministic() {
        let config = SegmentationConfig::default();
        let a = run_pipeline(&transactions(), &config).unwrap();
        let b = run_pipeline(&transactions(), &config).unwrap();
        assert_eq!(a.customers, b.customers);
        assert_eq!(a.model.n_clusters, b.model.n_clusters);
    }

    #[test]
    fn test_configured_analysis_date_covers_whole_day() {
        let config = SegmentationConfig {
            analysis_date: NaiveDate::from_ymd_opt(2024, 7, 10),
            ..Default::default()
        };
        let report = run_pipeline(&transactions(), &config).unwrap();
        assert_eq!(report.customers[0].metrics.recency, 10);
    }

    #[test]
    fn test_fixed_cluster_count() {
        let config = SegmentationConfig {
            clusters: Some(3),
            ..Default::default()
        };
        let report = run_pipeline(&transactions(), &config).unwrap();
        assert_eq!(report.model.n_clusters, 3);
        assert_eq!(report.model.candidates.len(), 1);
    }

    #[test]
    fn test_too_few_customers_fails_whole_run() {
        let few: Vec<Transaction> = transactions()
            .into_iter()
            .filter(|t| ["c1", "c2", "c3", "c4"].contains(&t.customer_id.as_str()))
            .collect();
        let err = run_pipeline(&few, &SegmentationConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            SegmentationError::InsufficientData { required: 5, actual: 4, .. }
        ));
    }

    #[test]
    fn test_minimum_only_range_fits_small_population() {
        let eight: Vec<Transaction> = transactions()
            .into_iter()
            .filter(|t| t.customer_id != "c9")
            .collect();
        let config = SegmentationConfig {
            min_clusters: Some(3),
            ..Default::default()
        };
        let report = run_pipeline(&eight, &config).unwrap();
        assert_eq!(report.customers.len(), 8);
        assert!((3..=7).contains(&report.model.n_clusters));
    }

    #[test]
    fn test_range_beyond_population_is_configuration_error() {
        let config = SegmentationConfig {
            max_clusters: Some(9),
            ..Default::default()
        };
        let err = run_pipeline(&transactions(), &config).unwrap_err();
        assert!(matches!(err, SegmentationError::Configuration(_)));
    }

    #[test]
    fn test_sample_data_pipeline() {
        let transactions = generate_sample_transactions(42).unwrap();
        let config = SegmentationConfig {
            max_clusters: Some(4),
            n_runs: 3,
            ..Default::default()
        };
        let report = run_pipeline(&transactions, &config).unwrap();

        assert!(report.customers.len() > 900);
        for c in &report.customers {
            assert!(c.metrics.frequency >= 1);
            assert!(c.metrics.monetary > 0.0);
            assert!((1.0..=5.0).contains(&c.rfm_score));
        }
        assert!(report.model.silhouette > -1.0 && report.model.silhouette <= 1.0);
    }

    #[test]
    fn test_assign_clusters_length_mismatch() {
        let err = assign_clusters(Vec::new(), &Array1::from(vec![0, 1])).unwrap_err();
        assert!(matches!(err, SegmentationError::InvalidInput(_)));
    }
}
