//! Per-customer Recency / Frequency / Monetary metrics

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::data::Transaction;
use crate::error::{SegmentationError, SegmentationResult};

/// Raw RFM values for one customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerMetrics {
    pub customer_id: String,
    /// Whole days between the analysis date and the latest purchase
    pub recency: u32,
    /// Number of transactions
    pub frequency: u32,
    /// Sum of transaction amounts, rounded to cents
    pub monetary: f64,
}

impl CustomerMetrics {
    /// Metrics as a `[recency, frequency, monetary]` feature row
    pub fn as_features(&self) -> [f64; 3] {
        [self.recency as f64, self.frequency as f64, self.monetary]
    }
}

struct Accumulator {
    last_purchase: NaiveDateTime,
    count: u32,
    total: f64,
}

/// Compute RFM metrics from transaction data
///
/// # Arguments
/// * `transactions` - Cleaned transactions
/// * `analysis_date` - Reference "now" for recency (default: latest timestamp in the data)
///
/// # Returns
/// * One `CustomerMetrics` per distinct customer id, ordered by customer id
pub fn compute_metrics(
    transactions: &[Transaction],
    analysis_date: Option<NaiveDateTime>,
) -> SegmentationResult<Vec<CustomerMetrics>> {
    let latest = transactions
        .iter()
        .map(|t| t.timestamp)
        .max()
        .ok_or_else(|| SegmentationError::InvalidInput("transaction set is empty".into()))?;
    let analysis_date = analysis_date.unwrap_or(latest);

    let mut groups: BTreeMap<&str, Accumulator> = BTreeMap::new();
    for tx in transactions {
        validate(tx, analysis_date)?;

        let acc = groups.entry(tx.customer_id.as_str()).or_insert(Accumulator {
            last_purchase: tx.timestamp,
            count: 0,
            total: 0.0,
        });
        acc.last_purchase = acc.last_purchase.max(tx.timestamp);
        acc.count += 1;
        acc.total += tx.amount;
    }

    let metrics = groups
        .into_iter()
        .map(|(customer_id, acc)| {
            let days = (analysis_date - acc.last_purchase).num_days();
            let recency = u32::try_from(days).map_err(|_| {
                SegmentationError::InvalidInput(format!(
                    "recency of {days} days for customer `{customer_id}` is out of range"
                ))
            })?;
            Ok(CustomerMetrics {
                customer_id: customer_id.to_string(),
                recency,
                frequency: acc.count,
                monetary: round_to_cents(acc.total),
            })
        })
        .collect::<SegmentationResult<Vec<_>>>()?;

    info!(
        transactions = transactions.len(),
        customers = metrics.len(),
        %analysis_date,
        "computed RFM metrics"
    );
    Ok(metrics)
}

/// Sums are kept to the cent so that float noise cannot reorder monetary ranks
fn round_to_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

fn validate(tx: &Transaction, analysis_date: NaiveDateTime) -> SegmentationResult<()> {
    if tx.customer_id.trim().is_empty() {
        return Err(SegmentationError::InvalidInput(
            "transaction with empty customer id".into(),
        ));
    }
    if !tx.amount.is_finite() || tx.amount <= 0.0 {
        return Err(SegmentationError::InvalidInput(format!(
            "customer `{}` has non-positive or non-numeric amount {}",
            tx.customer_id, tx.amount
        )));
    }
    if tx.timestamp > analysis_date {
        return Err(SegmentationError::InvalidInput(format!(
            "customer `{}` has a transaction at {} after the analysis date {}",
            tx.customer_id, tx.timestamp, analysis_date
        )));
    }
    Ok(())
}
