//! Transaction records, CSV loading using Polars, and demo data generation

use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, LogNormal};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{SegmentationError, SegmentationResult};

/// Column holding the customer identifier
pub const CUSTOMER_COLUMN: &str = "customer_id";
/// Column holding the transaction timestamp
pub const DATE_COLUMN: &str = "transaction_date";
/// Column holding the transaction amount
pub const AMOUNT_COLUMN: &str = "transaction_amount";

/// A single cleaned purchase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub customer_id: String,
    pub timestamp: NaiveDateTime,
    pub amount: f64,
}

impl Transaction {
    pub fn new(customer_id: impl Into<String>, timestamp: NaiveDateTime, amount: f64) -> Self {
        Self {
            customer_id: customer_id.into(),
            timestamp,
            amount,
        }
    }
}

/// A transaction row as read from the source, before cleaning.
/// Nulls and unparseable cells are kept as `None`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawTransaction {
    pub customer_id: Option<String>,
    pub timestamp: Option<NaiveDateTime>,
    pub amount: Option<f64>,
}

impl RawTransaction {
    /// Convert into a [`Transaction`] if all required fields are present
    pub fn complete(&self) -> Option<Transaction> {
        match (&self.customer_id, self.timestamp, self.amount) {
            (Some(id), Some(ts), Some(amount)) => Some(Transaction::new(id.clone(), ts, amount)),
            _ => None,
        }
    }
}

impl From<Transaction> for RawTransaction {
    fn from(tx: Transaction) -> Self {
        Self {
            customer_id: Some(tx.customer_id),
            timestamp: Some(tx.timestamp),
            amount: Some(tx.amount),
        }
    }
}

/// Convert raw rows without cleaning. Any row missing a required field fails the
/// whole conversion.
pub fn into_transactions(raw: &[RawTransaction]) -> SegmentationResult<Vec<Transaction>> {
    raw.iter()
        .enumerate()
        .map(|(row, r)| {
            r.complete().ok_or_else(|| {
                SegmentationError::InvalidInput(format!(
                    "row {} is missing a required field ({}, {}, {})",
                    row + 1,
                    CUSTOMER_COLUMN,
                    DATE_COLUMN,
                    AMOUNT_COLUMN
                ))
            })
        })
        .collect()
}

/// Parse a timestamp cell. Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS`,
/// `YYYY-MM-DDTHH:MM:SS`, `YYYY-MM-DD HH:MM` and plain `YYYY-MM-DD`.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn parse_amount(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Load raw transaction rows from a CSV file
///
/// # Arguments
/// * `file_path` - Path to a CSV file with `customer_id`, `transaction_date` and
///   `transaction_amount` columns (other columns are ignored)
///
/// # Returns
/// * One `RawTransaction` per CSV row, in file order
pub fn load_transactions(file_path: &Path) -> crate::Result<Vec<RawTransaction>> {
    // Every column is read as a string; parsing is done per cell so that a bad
    // value becomes `None` instead of failing the whole file.
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(file_path.to_path_buf()))?
        .finish()
        .with_context(|| format!("failed to read transactions from {}", file_path.display()))?;

    debug!(rows = df.height(), columns = df.width(), "read transaction csv");

    let ids = string_column(&df, CUSTOMER_COLUMN)?;
    let dates = string_column(&df, DATE_COLUMN)?;
    let amounts = string_column(&df, AMOUNT_COLUMN)?;

    let rows: Vec<RawTransaction> = ids
        .into_iter()
        .zip(dates)
        .zip(amounts)
        .map(|((id, date), amount)| RawTransaction {
            customer_id: id.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string),
            timestamp: date.and_then(parse_timestamp),
            amount: amount.and_then(parse_amount),
        })
        .collect();

    info!(rows = rows.len(), path = %file_path.display(), "loaded transactions");
    Ok(rows)
}

fn string_column<'a>(df: &'a DataFrame, name: &str) -> crate::Result<&'a StringChunked> {
    let column = df.column(name).map_err(|_| {
        SegmentationError::InvalidInput(format!("missing required column `{name}`"))
    })?;
    Ok(column.str()?)
}

/// Number of distinct customer ids in generated demo data
pub const SAMPLE_CUSTOMERS: u32 = 1000;
/// Number of generated demo transactions
pub const SAMPLE_TRANSACTIONS: usize = 5000;

/// Generate demo transactions: ids drawn uniformly from 1..=1000, dates evenly
/// spaced from 2022-01-01 to 2024-12-31 and log-normal amounts rounded to cents.
pub fn generate_sample_transactions(seed: u64) -> crate::Result<Vec<Transaction>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let amounts = LogNormal::<f64>::new(4.0, 1.0)?;

    let start = NaiveDate::from_ymd_opt(2022, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .context("invalid sample start date")?;
    let end = NaiveDate::from_ymd_opt(2024, 12, 31)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .context("invalid sample end date")?;
    let span = (end - start).num_seconds();
    let steps = (SAMPLE_TRANSACTIONS - 1) as i64;

    let transactions = (0..SAMPLE_TRANSACTIONS)
        .map(|i| {
            let customer = rng.gen_range(1..=SAMPLE_CUSTOMERS);
            let offset = span * i as i64 / steps;
            let amount = amounts.sample(&mut rng);
            Transaction::new(
                customer.to_string(),
                start + Duration::seconds(offset),
                (amount * 100.0).round() / 100.0,
            )
        })
        .collect();

    Ok(transactions)
}
