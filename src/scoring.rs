//! Ordinal 1-5 RFM scores relative to the current population

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SegmentationError, SegmentationResult};
use crate::rfm::CustomerMetrics;

/// Number of score bins; scores run from 1 to `SCORE_BINS`
pub const SCORE_BINS: usize = 5;

/// Ordinal scores, each in `1..=5`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RfmScores {
    pub r: u8,
    pub f: u8,
    pub m: u8,
}

impl RfmScores {
    pub fn new(r: u8, f: u8, m: u8) -> Self {
        Self { r, f, m }
    }

    /// Arithmetic mean of the three scores, in `[1, 5]`
    pub fn rfm_score(&self) -> f64 {
        (self.r as f64 + self.f as f64 + self.m as f64) / 3.0
    }
}

/// Customer metrics with their scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCustomer {
    pub metrics: CustomerMetrics,
    pub scores: RfmScores,
    pub rfm_score: f64,
}

/// Score every customer against the whole population.
///
/// Recency uses five equal-width bins over `[min, max]` with the most recent bin
/// scoring 5. Frequency and monetary are first ranked (ties keep input order) and
/// the ranks are split into five equal-width bins, which gives equal-population
/// bins over the customers regardless of skew.
pub fn score_customers(metrics: Vec<CustomerMetrics>) -> SegmentationResult<Vec<ScoredCustomer>> {
    if metrics.len() < SCORE_BINS {
        return Err(SegmentationError::InsufficientData {
            stage: "score binning",
            required: SCORE_BINS,
            actual: metrics.len(),
        });
    }

    let recency: Vec<f64> = metrics.iter().map(|m| m.recency as f64).collect();
    let frequency: Vec<f64> = metrics.iter().map(|m| m.frequency as f64).collect();
    let monetary: Vec<f64> = metrics.iter().map(|m| m.monetary).collect();

    let r_bins = equal_width_bins(&recency, SCORE_BINS);
    let f_bins = equal_width_bins(&first_ranks(&frequency), SCORE_BINS);
    let m_bins = equal_width_bins(&first_ranks(&monetary), SCORE_BINS);

    let scored: Vec<ScoredCustomer> = metrics
        .into_iter()
        .enumerate()
        .map(|(i, metrics)| {
            let scores = RfmScores {
                r: (SCORE_BINS - r_bins[i]) as u8,
                f: (f_bins[i] + 1) as u8,
                m: (m_bins[i] + 1) as u8,
            };
            ScoredCustomer {
                metrics,
                scores,
                rfm_score: scores.rfm_score(),
            }
        })
        .collect();

    debug!(customers = scored.len(), "assigned RFM scores");
    Ok(scored)
}

/// Bin index (0-based) of each value in `bins` equal-width, right-closed bins
/// spanning `[min, max]`. The lowest bin also includes `min`. A constant column
/// falls entirely into the middle bin.
pub fn equal_width_bins(values: &[f64], bins: usize) -> Vec<usize> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    if max <= min {
        return vec![bins / 2; values.len()];
    }

    let step = (max - min) / bins as f64;
    let inner_edges: Vec<f64> = (1..bins).map(|i| min + step * i as f64).collect();

    values
        .iter()
        .map(|&v| inner_edges.iter().take_while(|&&edge| v > edge).count())
        .collect()
}

/// 1-based ranks, ties broken by position so every rank is unique
pub fn first_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    // stable sort keeps equal values in input order
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    for (rank, idx) in order.into_iter().enumerate() {
        ranks[idx] = (rank + 1) as f64;
    }
    ranks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(rows: &[(u32, u32, f64)]) -> Vec<CustomerMetrics> {
        rows.iter()
            .enumerate()
            .map(|(i, &(recency, frequency, monetary))| CustomerMetrics {
                customer_id: format!("C{i:03}"),
                recency,
                frequency,
                monetary,
            })
            .collect()
    }

    #[test]
    fn test_equal_width_bins_right_closed() {
        let values = [0.0, 20.0, 21.0, 50.0, 99.0, 100.0];
        // edges 0, 20, 40, 60, 80, 100
        assert_eq!(equal_width_bins(&values, 5), vec![0, 0, 1, 2, 4, 4]);
    }

    #[test]
    fn test_constant_column_lands_in_middle_bin() {
        assert_eq!(equal_width_bins(&[7.0; 4], 5), vec![2; 4]);
    }

    #[test]
    fn test_first_ranks_break_ties_by_order() {
        assert_eq!(
            first_ranks(&[3.0, 1.0, 3.0, 2.0, 1.0]),
            vec![4.0, 1.0, 5.0, 3.0, 2.0]
        );
    }

    #[test]
    fn test_monetary_outlier_does_not_distort_bins() {
        let rows = metrics(&[
            (1, 1, 10.0),
            (2, 1, 20.0),
            (3, 1, 30.0),
            (4, 1, 40.0),
            (5, 1, 50.0),
            (6, 1, 1000.0),
        ]);
        let scored = score_customers(rows).unwrap();
        let m: Vec<u8> = scored.iter().map(|c| c.scores.m).collect();
        assert_eq!(m, vec![1, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_recency_is_inverted() {
        let rows = metrics(&[
            (0, 1, 1.0),
            (25, 2, 2.0),
            (50, 3, 3.0),
            (75, 4, 4.0),
            (100, 5, 5.0),
        ]);
        let scored = score_customers(rows).unwrap();
        let r: Vec<u8> = scored.iter().map(|c| c.scores.r).collect();
        assert_eq!(r, vec![5, 4, 3, 2, 1]);
        let f: Vec<u8> = scored.iter().map(|c| c.scores.f).collect();
        assert_eq!(f, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_scores_stay_in_range() {
        let rows = metrics(&[
            (3, 7, 12.5),
            (3, 7, 12.5),
            (90, 1, 5.0),
            (14, 2, 300.0),
            (0, 20, 999.0),
            (45, 3, 41.0),
            (45, 3, 41.0),
            (200, 1, 1.0),
        ]);
        let scored = score_customers(rows).unwrap();
        for c in &scored {
            for s in [c.scores.r, c.scores.f, c.scores.m] {
                assert!((1..=5).contains(&s));
            }
            assert!((1.0..=5.0).contains(&c.rfm_score));
        }
    }

    #[test]
    fn test_four_customers_is_insufficient() {
        let rows = metrics(&[(1, 1, 1.0), (2, 2, 2.0), (3, 3, 3.0), (4, 4, 4.0)]);
        let err = score_customers(rows).unwrap_err();
        assert_eq!(
            err,
            SegmentationError::InsufficientData {
                stage: "score binning",
                required: 5,
                actual: 4
            }
        );
    }
}
