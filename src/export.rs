//! CSV and JSON exports of a segmentation report

use std::fmt::Write as _;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::Context;
use polars::prelude::*;
use tracing::info;

use crate::clean::PreprocessingReport;
use crate::pipeline::SegmentationReport;
use crate::recommend::Recommendation;
use crate::segment::SegmentedCustomer;
use crate::summary::{ClusterSummary, SegmentSummary};

pub const CUSTOMERS_FILE: &str = "customer_rfm_analysis.csv";
pub const SEGMENT_SUMMARY_FILE: &str = "rfm_segment_summary.csv";
pub const CLUSTER_SUMMARY_FILE: &str = "cluster_segment_summary.csv";
pub const RECOMMENDATIONS_FILE: &str = "recommendations.json";
pub const PREPROCESSING_REPORT_FILE: &str = "preprocessing_report.txt";

/// Per-customer metrics, scores, segment and cluster
pub fn customers_frame(customers: &[SegmentedCustomer]) -> PolarsResult<DataFrame> {
    df!(
        "customer_id" => customers.iter().map(|c| c.metrics.customer_id.as_str()).collect::<Vec<_>>(),
        "recency" => customers.iter().map(|c| c.metrics.recency).collect::<Vec<_>>(),
        "frequency" => customers.iter().map(|c| c.metrics.frequency).collect::<Vec<_>>(),
        "monetary" => customers.iter().map(|c| c.metrics.monetary).collect::<Vec<_>>(),
        "r_score" => customers.iter().map(|c| u32::from(c.scores.r)).collect::<Vec<_>>(),
        "f_score" => customers.iter().map(|c| u32::from(c.scores.f)).collect::<Vec<_>>(),
        "m_score" => customers.iter().map(|c| u32::from(c.scores.m)).collect::<Vec<_>>(),
        "rfm_score" => customers.iter().map(|c| c.rfm_score).collect::<Vec<_>>(),
        "segment" => customers.iter().map(|c| c.segment.label()).collect::<Vec<_>>(),
        "cluster" => customers.iter().map(|c| c.cluster_id.map(|id| id as u32)).collect::<Vec<_>>()
    )
}

pub fn segment_summary_frame(rows: &[SegmentSummary]) -> PolarsResult<DataFrame> {
    df!(
        "segment" => rows.iter().map(|r| r.segment.label()).collect::<Vec<_>>(),
        "customers" => rows.iter().map(|r| r.customers as u64).collect::<Vec<_>>(),
        "percentage" => rows.iter().map(|r| r.percentage).collect::<Vec<_>>(),
        "mean_recency" => rows.iter().map(|r| r.mean_recency).collect::<Vec<_>>(),
        "mean_frequency" => rows.iter().map(|r| r.mean_frequency).collect::<Vec<_>>(),
        "mean_monetary" => rows.iter().map(|r| r.mean_monetary).collect::<Vec<_>>(),
        "total_monetary" => rows.iter().map(|r| r.total_monetary).collect::<Vec<_>>(),
        "mean_rfm_score" => rows.iter().map(|r| r.mean_rfm_score).collect::<Vec<_>>()
    )
}

pub fn cluster_summary_frame(rows: &[ClusterSummary]) -> PolarsResult<DataFrame> {
    df!(
        "cluster" => rows.iter().map(|r| r.cluster_id as u32).collect::<Vec<_>>(),
        "customers" => rows.iter().map(|r| r.customers as u64).collect::<Vec<_>>(),
        "percentage" => rows.iter().map(|r| r.percentage).collect::<Vec<_>>(),
        "mean_recency" => rows.iter().map(|r| r.mean_recency).collect::<Vec<_>>(),
        "mean_frequency" => rows.iter().map(|r| r.mean_frequency).collect::<Vec<_>>(),
        "mean_monetary" => rows.iter().map(|r| r.mean_monetary).collect::<Vec<_>>(),
        "total_monetary" => rows.iter().map(|r| r.total_monetary).collect::<Vec<_>>(),
        "min_recency" => rows.iter().map(|r| r.min_recency).collect::<Vec<_>>(),
        "max_recency" => rows.iter().map(|r| r.max_recency).collect::<Vec<_>>(),
        "min_frequency" => rows.iter().map(|r| r.min_frequency).collect::<Vec<_>>(),
        "max_frequency" => rows.iter().map(|r| r.max_frequency).collect::<Vec<_>>(),
        "min_monetary" => rows.iter().map(|r| r.min_monetary).collect::<Vec<_>>(),
        "max_monetary" => rows.iter().map(|r| r.max_monetary).collect::<Vec<_>>()
    )
}

/// Write a frame as CSV with a header row
pub fn write_csv(df: &mut DataFrame, path: &Path) -> crate::Result<()> {
    let mut file = File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(df)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

pub fn write_recommendations(recommendations: &[Recommendation], path: &Path) -> crate::Result<()> {
    let json = serde_json::to_string_pretty(recommendations)?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// Plain-text account of data quality, cleaning and validation
pub fn format_preprocessing_report(report: &PreprocessingReport) -> Result<String, std::fmt::Error> {
    let rule = "=".repeat(60);
    let mut out = String::new();
    writeln!(out, "{rule}")?;
    writeln!(out, "CUSTOMER DATA PREPROCESSING REPORT")?;
    writeln!(out, "{rule}")?;
    writeln!(out, "Generated: {}", report.generated_at.format("%Y-%m-%d %H:%M:%S"))?;
    writeln!(out, "{rule}\n")?;

    let quality = &report.quality;
    writeln!(out, "DATA OVERVIEW\n{}", "-".repeat(20))?;
    writeln!(out, "Total Records: {}\n", quality.total_records)?;

    writeln!(out, "MISSING VALUES ANALYSIS\n{}", "-".repeat(25))?;
    for missing in &quality.missing_values {
        writeln!(
            out,
            "{}: {} ({:.2}%)",
            missing.column, missing.missing_count, missing.missing_percentage
        )?;
    }

    writeln!(out, "\nDUPLICATE RECORDS\n{}", "-".repeat(17))?;
    writeln!(
        out,
        "Duplicate Records: {} ({:.2}%)",
        quality.duplicate_records, quality.duplicate_percentage
    )?;

    writeln!(out, "\nOUTLIER ANALYSIS\n{}", "-".repeat(16))?;
    match &quality.amount_outliers {
        Some(o) => writeln!(
            out,
            "{}: {} outliers ({:.2}%), bounds [{:.2}, {:.2}]",
            o.column, o.outlier_count, o.outlier_percentage, o.lower_bound, o.upper_bound
        )?,
        None => writeln!(out, "No amounts to analyse")?,
    }

    let cleaning = &report.cleaning;
    writeln!(out, "\nCLEANING STEPS\n{}", "-".repeat(14))?;
    writeln!(out, "Missing fields removed: {}", cleaning.missing_fields)?;
    writeln!(out, "Duplicates removed: {}", cleaning.duplicates)?;
    writeln!(out, "Future-dated removed: {}", cleaning.future_dated)?;
    writeln!(out, "Very old dates kept: {}", cleaning.very_old_dates)?;
    writeln!(out, "Negative amounts removed: {}", cleaning.negative_amounts)?;
    writeln!(out, "Zero amounts removed: {}", cleaning.zero_amounts)?;
    writeln!(out, "Outliers capped: {}", cleaning.outliers_capped)?;
    writeln!(out, "Rows kept: {} of {}", cleaning.output_rows, cleaning.input_rows)?;

    let v = &report.validation;
    writeln!(out, "\nVALIDATION\n{}", "-".repeat(10))?;
    writeln!(out, "Records: {}", v.total_records)?;
    writeln!(out, "Critical fields complete: {}", v.critical_fields_complete)?;
    writeln!(out, "Date ranges valid: {}", v.date_ranges_valid)?;
    writeln!(out, "Monetary values valid: {}", v.monetary_values_valid)?;
    writeln!(out, "Validation passed: {}", v.validation_passed)?;
    Ok(out)
}

/// Write the preprocessing report into `output_dir`
pub fn write_preprocessing_report(
    report: &PreprocessingReport,
    output_dir: &Path,
) -> crate::Result<PathBuf> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;
    let path = output_dir.join(PREPROCESSING_REPORT_FILE);
    fs::write(&path, format_preprocessing_report(report)?)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), "wrote preprocessing report");
    Ok(path)
}

/// Write all report files into `output_dir`, creating it if needed. Returns the
/// paths written.
pub fn export_report(
    report: &SegmentationReport,
    recommendations: &[Recommendation],
    output_dir: &Path,
) -> crate::Result<Vec<PathBuf>> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;

    let customers = output_dir.join(CUSTOMERS_FILE);
    write_csv(&mut customers_frame(&report.customers)?, &customers)?;

    let segments = output_dir.join(SEGMENT_SUMMARY_FILE);
    write_csv(&mut segment_summary_frame(&report.segments)?, &segments)?;

    let clusters = output_dir.join(CLUSTER_SUMMARY_FILE);
    write_csv(&mut cluster_summary_frame(&report.clusters)?, &clusters)?;

    let recs = output_dir.join(RECOMMENDATIONS_FILE);
    write_recommendations(recommendations, &recs)?;

    info!(dir = %output_dir.display(), "exported report files");
    Ok(vec![customers, segments, clusters, recs])
}
