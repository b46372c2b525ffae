//! Cleaning of raw transaction rows before RFM computation

use std::collections::HashSet;

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::data::{RawTransaction, Transaction, AMOUNT_COLUMN, CUSTOMER_COLUMN, DATE_COLUMN};
use crate::error::{SegmentationError, SegmentationResult};

/// Cleaning options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    /// Cap amounts outside `[Q1 - f*IQR, Q3 + f*IQR]`
    pub cap_outliers: bool,
    /// The IQR multiplier `f`
    pub outlier_iqr_factor: f64,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            cap_outliers: true,
            outlier_iqr_factor: 3.0,
        }
    }
}

/// IQR multiplier used when reporting (not capping) amount outliers
pub const QUALITY_IQR_FACTOR: f64 = 1.5;
/// Transactions older than this many days before "now" are flagged
pub const OLD_DATE_DAYS: i64 = 3650;

/// Missing cells in one required column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingValues {
    pub column: String,
    pub missing_count: usize,
    pub missing_percentage: f64,
}

/// Amounts outside the `1.5 * IQR` fence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierStats {
    pub column: String,
    pub outlier_count: usize,
    pub outlier_percentage: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

/// Quality of the rows as loaded, before any cleaning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQualityReport {
    pub total_records: usize,
    pub missing_values: Vec<MissingValues>,
    pub duplicate_records: usize,
    pub duplicate_percentage: f64,
    /// `None` when no row has an amount
    pub amount_outliers: Option<OutlierStats>,
}

/// Checks on the cleaned rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub total_records: usize,
    /// Blank customer ids and non-finite amounts
    pub missing_values: usize,
    pub duplicate_records: usize,
    pub critical_fields_complete: bool,
    pub date_ranges_valid: bool,
    pub monetary_values_valid: bool,
    pub validation_passed: bool,
}

/// Everything the preprocessing stage found and did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingReport {
    pub generated_at: NaiveDateTime,
    pub quality: DataQualityReport,
    pub cleaning: CleaningReport,
    pub validation: ValidationResult,
}

fn share(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

/// Assess raw rows: missing cells per column, exact duplicates and amount outliers
pub fn assess_quality(raw: &[RawTransaction]) -> DataQualityReport {
    let total = raw.len();
    let missing = |column: &str, count: usize| MissingValues {
        column: column.to_string(),
        missing_count: count,
        missing_percentage: share(count, total),
    };
    let missing_values = vec![
        missing(CUSTOMER_COLUMN, raw.iter().filter(|r| r.customer_id.is_none()).count()),
        missing(DATE_COLUMN, raw.iter().filter(|r| r.timestamp.is_none()).count()),
        missing(AMOUNT_COLUMN, raw.iter().filter(|r| r.amount.is_none()).count()),
    ];

    let mut seen = HashSet::with_capacity(total);
    let duplicate_records = raw
        .iter()
        .filter(|r| !seen.insert((r.customer_id.clone(), r.timestamp, r.amount.map(f64::to_bits))))
        .count();

    let mut amounts: Vec<f64> = raw.iter().filter_map(|r| r.amount).collect();
    amounts.sort_by(f64::total_cmp);
    let amount_outliers = iqr_fence(&amounts, QUALITY_IQR_FACTOR).map(|(lower, upper)| {
        let count = amounts.iter().filter(|&&a| a < lower || a > upper).count();
        OutlierStats {
            column: AMOUNT_COLUMN.to_string(),
            outlier_count: count,
            outlier_percentage: share(count, total),
            lower_bound: lower,
            upper_bound: upper,
        }
    });

    let report = DataQualityReport {
        total_records: total,
        missing_values,
        duplicate_records,
        duplicate_percentage: share(duplicate_records, total),
        amount_outliers,
    };
    info!(
        records = report.total_records,
        duplicates = report.duplicate_records,
        outliers = report.amount_outliers.as_ref().map_or(0, |o| o.outlier_count),
        "assessed data quality"
    );
    report
}

/// Check cleaned rows for blank critical fields, future dates and negative amounts
pub fn validate_processed(rows: &[Transaction], now: NaiveDateTime) -> ValidationResult {
    let missing_values = rows
        .iter()
        .filter(|t| t.customer_id.trim().is_empty() || !t.amount.is_finite())
        .count();
    let mut seen = HashSet::with_capacity(rows.len());
    let duplicate_records = rows
        .iter()
        .filter(|t| !seen.insert((t.customer_id.as_str(), t.timestamp, t.amount.to_bits())))
        .count();

    let critical_fields_complete = missing_values == 0;
    let date_ranges_valid = rows.iter().all(|t| t.timestamp <= now);
    let monetary_values_valid = rows.iter().all(|t| t.amount >= 0.0);
    let validation_passed = critical_fields_complete && date_ranges_valid && monetary_values_valid;

    if validation_passed {
        info!(records = rows.len(), "data validation passed");
    } else {
        warn!(
            critical_fields_complete,
            date_ranges_valid, monetary_values_valid, "data validation found issues"
        );
    }
    ValidationResult {
        total_records: rows.len(),
        missing_values,
        duplicate_records,
        critical_fields_complete,
        date_ranges_valid,
        monetary_values_valid,
        validation_passed,
    }
}

/// Assess, clean and validate in one pass
pub fn preprocess(
    raw: &[RawTransaction],
    now: NaiveDateTime,
    config: &CleaningConfig,
) -> SegmentationResult<(Vec<Transaction>, PreprocessingReport)> {
    let quality = assess_quality(raw);
    let (rows, cleaning) = clean_transactions(raw, now, config)?;
    let validation = validate_processed(&rows, now);
    Ok((
        rows,
        PreprocessingReport {
            generated_at: now,
            quality,
            cleaning,
            validation,
        },
    ))
}

/// Row counts affected by each cleaning step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleaningReport {
    pub input_rows: usize,
    pub missing_fields: usize,
    pub duplicates: usize,
    pub future_dated: usize,
    /// Rows older than [`OLD_DATE_DAYS`]; reported, not removed
    pub very_old_dates: usize,
    pub negative_amounts: usize,
    pub zero_amounts: usize,
    pub outliers_capped: usize,
    pub output_rows: usize,
}

/// Drop incomplete, duplicate, future-dated and non-positive rows, then cap
/// extreme amounts.
///
/// # Arguments
/// * `raw` - Rows as loaded from the source
/// * `now` - Transactions after this instant are dropped
/// * `config` - Outlier handling options
pub fn clean_transactions(
    raw: &[RawTransaction],
    now: NaiveDateTime,
    config: &CleaningConfig,
) -> SegmentationResult<(Vec<Transaction>, CleaningReport)> {
    let mut report = CleaningReport {
        input_rows: raw.len(),
        ..Default::default()
    };

    let mut rows: Vec<Transaction> = raw.iter().filter_map(RawTransaction::complete).collect();
    report.missing_fields = raw.len() - rows.len();
    if report.missing_fields > 0 {
        info!(removed = report.missing_fields, "dropped rows with missing required fields");
    }

    let mut seen = HashSet::with_capacity(rows.len());
    rows.retain(|t| seen.insert((t.customer_id.clone(), t.timestamp, t.amount.to_bits())));
    report.duplicates = report.input_rows - report.missing_fields - rows.len();
    if report.duplicates > 0 {
        info!(removed = report.duplicates, "dropped duplicate transactions");
    }

    report.future_dated = drain_count(&mut rows, |t| t.timestamp > now);
    if report.future_dated > 0 {
        warn!(removed = report.future_dated, %now, "dropped future-dated transactions");
    }

    let cutoff = now - Duration::days(OLD_DATE_DAYS);
    report.very_old_dates = rows.iter().filter(|t| t.timestamp < cutoff).count();
    if report.very_old_dates > 0 {
        warn!(count = report.very_old_dates, %cutoff, "found very old transaction dates");
    }

    report.negative_amounts = drain_count(&mut rows, |t| t.amount < 0.0);
    if report.negative_amounts > 0 {
        warn!(removed = report.negative_amounts, "dropped negative amounts");
    }
    report.zero_amounts = drain_count(&mut rows, |t| t.amount == 0.0);
    if report.zero_amounts > 0 {
        warn!(removed = report.zero_amounts, "dropped zero amounts");
    }

    if config.cap_outliers {
        report.outliers_capped = cap_outliers(&mut rows, config.outlier_iqr_factor);
        if report.outliers_capped > 0 {
            info!(capped = report.outliers_capped, "capped outlier amounts");
        }
    }

    report.output_rows = rows.len();
    if rows.is_empty() {
        return Err(SegmentationError::InvalidInput(
            "no valid transactions left after cleaning".into(),
        ));
    }

    info!(
        input = report.input_rows,
        output = report.output_rows,
        "cleaned transactions"
    );
    Ok((rows, report))
}

fn drain_count(rows: &mut Vec<Transaction>, reject: impl Fn(&Transaction) -> bool) -> usize {
    let before = rows.len();
    rows.retain(|t| !reject(t));
    before - rows.len()
}

/// Clamp amounts into the IQR fence; returns how many were changed
fn cap_outliers(rows: &mut [Transaction], factor: f64) -> usize {
    let mut amounts: Vec<f64> = rows.iter().map(|t| t.amount).collect();
    amounts.sort_by(f64::total_cmp);
    let Some((lower, upper)) = iqr_fence(&amounts, factor) else {
        return 0;
    };

    let mut capped = 0;
    for t in rows.iter_mut() {
        let clamped = t.amount.clamp(lower, upper);
        if clamped != t.amount {
            t.amount = clamped;
            capped += 1;
        }
    }
    capped
}

/// `[Q1 - f*IQR, Q3 + f*IQR]` over sorted data
fn iqr_fence(sorted: &[f64], factor: f64) -> Option<(f64, f64)> {
    let q1 = quantile(sorted, 0.25)?;
    let q3 = quantile(sorted, 0.75)?;
    let iqr = q3 - q1;
    let (lower, upper) = (q1 - factor * iqr, q3 + factor * iqr);
    (lower <= upper).then_some((lower, upper))
}

/// Quantile of sorted data with linear interpolation between closest ranks
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}
