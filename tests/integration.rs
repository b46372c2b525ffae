//! Integration tests for rfm-segment

use std::collections::HashMap;
use std::io::Write;

use chrono::{NaiveDate, NaiveDateTime};
use rfm_segment::{
    clean_transactions, export_report, generate_sample_transactions, load_transactions,
    preprocess, recommendations_for, run_pipeline, write_preprocessing_report, CleaningConfig,
    Segment, SegmentationConfig, SegmentationError, Transaction,
};
use tempfile::{tempdir, NamedTempFile};

fn ts(year: i32, month: u32, day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

/// Create a test CSV file with ten customers and a few dirty rows
fn create_test_csv() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "customer_id,transaction_date,transaction_amount,channel").unwrap();

    // Frequent, recent, high value
    writeln!(file, "C001,2024-12-28,310.50,web").unwrap();
    writeln!(file, "C001,2024-12-10,280.00,web").unwrap();
    writeln!(file, "C001,2024-11-22,450.25,store").unwrap();
    writeln!(file, "C001,2024-11-01,390.00,web").unwrap();
    // Recent single purchase
    writeln!(file, "C002,2024-12-30,45.00,web").unwrap();
    // Lapsed big spender
    writeln!(file, "C003,2024-02-11,1200.00,store").unwrap();
    writeln!(file, "C003,2024-01-05,980.00,store").unwrap();
    // Old, small
    writeln!(file, "C004,2023-09-14 10:30:00,12.99,web").unwrap();
    writeln!(file, "C005,2024-06-01,75.00,web").unwrap();
    writeln!(file, "C005,2024-07-15,60.00,web").unwrap();
    writeln!(file, "C005,2024-08-20,82.40,store").unwrap();
    writeln!(file, "C006,2024-10-03,150.00,web").unwrap();
    writeln!(file, "C006,2024-12-01,175.00,web").unwrap();
    writeln!(file, "C007,2024-03-30T08:15:00,22.50,store").unwrap();
    writeln!(file, "C008,2024-12-15,95.00,web").unwrap();
    writeln!(file, "C008,2024-12-20,105.00,web").unwrap();
    writeln!(file, "C009,2023-12-24,18.00,store").unwrap();
    writeln!(file, "C010,2024-09-09,240.00,web").unwrap();

    // Dirty rows: duplicate, missing id, bad amount, refund, future date
    writeln!(file, "C002,2024-12-30,45.00,web").unwrap();
    writeln!(file, ",2024-05-05,10.00,web").unwrap();
    writeln!(file, "C010,2024-09-10,n/a,web").unwrap();
    writeln!(file, "C006,2024-10-04,-150.00,web").unwrap();
    writeln!(file, "C007,2030-01-01,99.00,web").unwrap();

    file.flush().unwrap();
    file
}

fn sample_config() -> SegmentationConfig {
    SegmentationConfig {
        max_clusters: Some(5),
        n_runs: 3,
        ..Default::default()
    }
}

#[test]
fn test_end_to_end_pipeline() {
    let test_file = create_test_csv();

    let raw = load_transactions(test_file.path()).unwrap();
    assert_eq!(raw.len(), 23);

    let (transactions, cleaning) =
        clean_transactions(&raw, ts(2025, 1, 1), &CleaningConfig::default()).unwrap();
    assert_eq!(cleaning.missing_fields, 2);
    assert_eq!(cleaning.duplicates, 1);
    assert_eq!(cleaning.future_dated, 1);
    assert_eq!(cleaning.negative_amounts, 1);
    assert_eq!(transactions.len(), 18);

    let config = SegmentationConfig {
        analysis_date: NaiveDate::from_ymd_opt(2024, 12, 31),
        ..Default::default()
    };
    let report = run_pipeline(&transactions, &config).unwrap();

    assert_eq!(report.customers.len(), 10);
    let c001 = &report.customers[0];
    assert_eq!(c001.metrics.customer_id, "C001");
    assert_eq!(c001.metrics.recency, 3);
    assert_eq!(c001.metrics.frequency, 4);
    assert!((c001.metrics.monetary - 1430.75).abs() < 1e-9);
    assert_eq!(c001.scores.f, 5);

    let output = tempdir().unwrap();
    let recommendations = recommendations_for(&report.segments);
    let written = export_report(&report, &recommendations, output.path()).unwrap();
    assert_eq!(written.len(), 4);
    for path in &written {
        assert!(path.exists(), "{} missing", path.display());
    }

    let customers_csv =
        std::fs::read_to_string(output.path().join("customer_rfm_analysis.csv")).unwrap();
    assert_eq!(customers_csv.lines().count(), 11);
    let segments_csv =
        std::fs::read_to_string(output.path().join("rfm_segment_summary.csv")).unwrap();
    assert_eq!(segments_csv.lines().count(), report.segments.len() + 1);
}

#[test]
fn test_preprocessing_report_for_dirty_csv() {
    let test_file = create_test_csv();
    let raw = load_transactions(test_file.path()).unwrap();

    let (transactions, report) =
        preprocess(&raw, ts(2025, 1, 1), &CleaningConfig::default()).unwrap();
    assert_eq!(transactions.len(), 18);

    let missing: Vec<usize> = report
        .quality
        .missing_values
        .iter()
        .map(|m| m.missing_count)
        .collect();
    assert_eq!(missing, vec![1, 0, 1]);
    assert_eq!(report.quality.duplicate_records, 1);
    assert!(report.quality.amount_outliers.is_some());
    assert_eq!(report.cleaning.future_dated, 1);
    assert!(report.validation.validation_passed);

    let output = tempdir().unwrap();
    let path = write_preprocessing_report(&report, output.path()).unwrap();
    let text = std::fs::read_to_string(path).unwrap();
    assert!(text.contains("Total Records: 23"));
}

#[test]
fn test_missing_column_is_rejected() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "customer_id,transaction_date").unwrap();
    writeln!(file, "C001,2024-01-01").unwrap();
    file.flush().unwrap();

    let err = load_transactions(file.path()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SegmentationError>(),
        Some(SegmentationError::InvalidInput(_))
    ));
}

#[test]
fn test_customer_properties_on_sample_data() {
    let transactions = generate_sample_transactions(42).unwrap();
    let report = run_pipeline(&transactions, &sample_config()).unwrap();

    for c in &report.customers {
        assert!(c.metrics.frequency >= 1);
        assert!(c.metrics.monetary > 0.0);
        for score in [c.scores.r, c.scores.f, c.scores.m] {
            assert!((1..=5).contains(&score));
        }
        assert!((1.0..=5.0).contains(&c.rfm_score));
        assert!(c.cluster_id.is_some_and(|id| id < report.model.n_clusters));
        assert_ne!(c.segment, Segment::CannotLoseThem);
    }

    let percentage: f64 = report.segments.iter().map(|s| s.percentage).sum();
    assert!((percentage - 100.0).abs() < 1e-6);
    let cluster_percentage: f64 = report.clusters.iter().map(|s| s.percentage).sum();
    assert!((cluster_percentage - 100.0).abs() < 1e-6);

    let customers: usize = report.segments.iter().map(|s| s.customers).sum();
    assert_eq!(customers, report.customers.len());
}

#[test]
fn test_clustering_is_deterministic_for_a_seed() {
    let transactions = generate_sample_transactions(7).unwrap();
    let config = SegmentationConfig {
        clusters: Some(4),
        n_runs: 3,
        ..Default::default()
    };

    let first = run_pipeline(&transactions, &config).unwrap();
    let second = run_pipeline(&transactions, &config).unwrap();

    // Identical up to a relabelling of cluster ids
    let mut mapping: HashMap<usize, usize> = HashMap::new();
    for (a, b) in first.customers.iter().zip(&second.customers) {
        let (a, b) = (a.cluster_id.unwrap(), b.cluster_id.unwrap());
        assert_eq!(*mapping.entry(a).or_insert(b), b);
    }
    let segments_a: Vec<Segment> = first.customers.iter().map(|c| c.segment).collect();
    let segments_b: Vec<Segment> = second.customers.iter().map(|c| c.segment).collect();
    assert_eq!(segments_a, segments_b);
}

#[test]
fn test_predict_matches_fitted_labels() {
    let test_file = create_test_csv();
    let raw = load_transactions(test_file.path()).unwrap();
    let (transactions, _) =
        clean_transactions(&raw, ts(2025, 1, 1), &CleaningConfig::default()).unwrap();
    let report = run_pipeline(&transactions, &SegmentationConfig::default()).unwrap();

    for c in &report.customers {
        let predicted = report.model.predict(&c.metrics.as_features()).unwrap();
        assert_eq!(Some(predicted), c.cluster_id);
    }
}

#[test]
fn test_four_customers_is_insufficient() {
    let transactions: Vec<Transaction> = ["a", "b", "c", "d"]
        .iter()
        .enumerate()
        .map(|(i, id)| Transaction::new(*id, ts(2024, 1, i as u32 + 1), 10.0 * (i + 1) as f64))
        .collect();

    let err = run_pipeline(&transactions, &SegmentationConfig::default()).unwrap_err();
    assert!(matches!(
        err,
        SegmentationError::InsufficientData {
            required: 5,
            actual: 4,
            ..
        }
    ));
}

#[test]
fn test_invalid_cluster_range_is_configuration_error() {
    let transactions = generate_sample_transactions(1).unwrap();
    let config = SegmentationConfig {
        min_clusters: Some(6),
        max_clusters: Some(3),
        ..Default::default()
    };
    let err = run_pipeline(&transactions, &config).unwrap_err();
    assert!(matches!(err, SegmentationError::Configuration(_)));
}
