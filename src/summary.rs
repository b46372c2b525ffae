//! Per-segment and per-cluster aggregates

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::segment::{Segment, SegmentedCustomer};

/// Aggregate view of one rule-based segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentSummary {
    pub segment: Segment,
    pub customers: usize,
    /// Share of the whole population, 0-100
    pub percentage: f64,
    pub mean_recency: f64,
    pub mean_frequency: f64,
    pub mean_monetary: f64,
    pub total_monetary: f64,
    pub mean_rfm_score: f64,
}

/// Aggregate view of one K-Means cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub cluster_id: usize,
    pub customers: usize,
    /// Share of the whole population, 0-100
    pub percentage: f64,
    pub mean_recency: f64,
    pub mean_frequency: f64,
    pub mean_monetary: f64,
    pub total_monetary: f64,
    pub min_recency: u32,
    pub max_recency: u32,
    pub min_frequency: u32,
    pub max_frequency: u32,
    pub min_monetary: f64,
    pub max_monetary: f64,
}

#[derive(Default)]
struct Group {
    count: usize,
    recency: f64,
    frequency: f64,
    monetary: f64,
    rfm_score: f64,
    min_recency: u32,
    max_recency: u32,
    min_frequency: u32,
    max_frequency: u32,
    min_monetary: f64,
    max_monetary: f64,
}

impl Group {
    fn add(&mut self, c: &SegmentedCustomer) {
        let m = &c.metrics;
        if self.count == 0 {
            self.min_recency = m.recency;
            self.max_recency = m.recency;
            self.min_frequency = m.frequency;
            self.max_frequency = m.frequency;
            self.min_monetary = m.monetary;
            self.max_monetary = m.monetary;
        }
        self.count += 1;
        self.recency += m.recency as f64;
        self.frequency += m.frequency as f64;
        self.monetary += m.monetary;
        self.rfm_score += c.rfm_score;
        self.min_recency = self.min_recency.min(m.recency);
        self.max_recency = self.max_recency.max(m.recency);
        self.min_frequency = self.min_frequency.min(m.frequency);
        self.max_frequency = self.max_frequency.max(m.frequency);
        self.min_monetary = self.min_monetary.min(m.monetary);
        self.max_monetary = self.max_monetary.max(m.monetary);
    }

    fn mean(&self, total: f64) -> f64 {
        total / self.count as f64
    }
}

fn group_by<K: Ord>(
    customers: &[SegmentedCustomer],
    key: impl Fn(&SegmentedCustomer) -> Option<K>,
) -> BTreeMap<K, Group> {
    let mut groups: BTreeMap<K, Group> = BTreeMap::new();
    for c in customers {
        if let Some(k) = key(c) {
            groups.entry(k).or_default().add(c);
        }
    }
    groups
}

fn percentage(count: usize, population: usize) -> f64 {
    count as f64 / population as f64 * 100.0
}

/// Summarize rule-based segments, highest total monetary value first
pub fn summarize_segments(customers: &[SegmentedCustomer]) -> Vec<SegmentSummary> {
    let population = customers.len();
    let mut rows: Vec<SegmentSummary> = group_by(customers, |c| Some(c.segment))
        .into_iter()
        .map(|(segment, g)| SegmentSummary {
            segment,
            customers: g.count,
            percentage: percentage(g.count, population),
            mean_recency: g.mean(g.recency),
            mean_frequency: g.mean(g.frequency),
            mean_monetary: g.mean(g.monetary),
            total_monetary: g.monetary,
            mean_rfm_score: g.mean(g.rfm_score),
        })
        .collect();

    rows.sort_by(|a, b| b.total_monetary.total_cmp(&a.total_monetary));
    rows
}

/// Summarize clusters, highest total monetary value first. Customers without a
/// cluster id are left out of the rows but still count toward the population.
pub fn summarize_clusters(customers: &[SegmentedCustomer]) -> Vec<ClusterSummary> {
    let population = customers.len();
    let mut rows: Vec<ClusterSummary> = group_by(customers, |c| c.cluster_id)
        .into_iter()
        .map(|(cluster_id, g)| ClusterSummary {
            cluster_id,
            customers: g.count,
            percentage: percentage(g.count, population),
            mean_recency: g.mean(g.recency),
            mean_frequency: g.mean(g.frequency),
            mean_monetary: g.mean(g.monetary),
            total_monetary: g.monetary,
            min_recency: g.min_recency,
            max_recency: g.max_recency,
            min_frequency: g.min_frequency,
            max_frequency: g.max_frequency,
            min_monetary: g.min_monetary,
            max_monetary: g.max_monetary,
        })
        .collect();

    rows.sort_by(|a, b| b.total_monetary.total_cmp(&a.total_monetary));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rfm::CustomerMetrics;
    use crate::scoring::RfmScores;

    fn customer(
        id: &str,
        (recency, frequency, monetary): (u32, u32, f64),
        segment: Segment,
        cluster_id: Option<usize>,
    ) -> SegmentedCustomer {
        let scores = RfmScores::new(3, 3, 3);
        SegmentedCustomer {
            metrics: CustomerMetrics {
                customer_id: id.to_string(),
                recency,
                frequency,
                monetary,
            },
            scores,
            rfm_score: scores.rfm_score(),
            segment,
            cluster_id,
        }
    }

    fn population() -> Vec<SegmentedCustomer> {
        vec![
            customer("a", (1, 10, 900.0), Segment::Champions, Some(0)),
            customer("b", (3, 8, 700.0), Segment::Champions, Some(0)),
            customer("c", (200, 1, 20.0), Segment::Lost, Some(1)),
            customer("d", (150, 2, 40.0), Segment::Hibernating, Some(1)),
            customer("e", (180, 1, 15.0), Segment::Lost, Some(1)),
            customer("f", (20, 3, 300.0), Segment::Promising, Some(2)),
        ]
    }

    #[test]
    fn test_segment_summary() {
        let rows = summarize_segments(&population());

        let order: Vec<Segment> = rows.iter().map(|r| r.segment).collect();
        assert_eq!(
            order,
            vec![Segment::Champions, Segment::Promising, Segment::Hibernating, Segment::Lost]
        );

        let champions = &rows[0];
        assert_eq!(champions.customers, 2);
        assert!((champions.mean_recency - 2.0).abs() < 1e-9);
        assert!((champions.mean_frequency - 9.0).abs() < 1e-9);
        assert!((champions.total_monetary - 1600.0).abs() < 1e-9);
        assert!((champions.mean_monetary - 800.0).abs() < 1e-9);
        assert!((champions.mean_rfm_score - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_percentages_sum_to_hundred() {
        let total: f64 = summarize_segments(&population())
            .iter()
            .map(|r| r.percentage)
            .sum();
        assert!((total - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_cluster_summary() {
        let rows = summarize_clusters(&population());

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].cluster_id, 0);
        let lapsed = rows.iter().find(|r| r.cluster_id == 1).unwrap();
        assert_eq!(lapsed.customers, 3);
        assert_eq!((lapsed.min_recency, lapsed.max_recency), (150, 200));
        assert_eq!((lapsed.min_frequency, lapsed.max_frequency), (1, 2));
        assert!((lapsed.min_monetary - 15.0).abs() < 1e-9);
        assert!((lapsed.max_monetary - 40.0).abs() < 1e-9);
        assert!((lapsed.percentage - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_unclustered_customers_are_skipped() {
        let mut customers = population();
        customers.iter_mut().for_each(|c| c.cluster_id = None);
        assert!(summarize_clusters(&customers).is_empty());
        assert_eq!(summarize_segments(&customers).len(), 4);
    }

    #[test]
    fn test_input_is_not_mutated() {
        let customers = population();
        let before = customers.clone();
        let _ = summarize_segments(&customers);
        let _ = summarize_clusters(&customers);
        assert_eq!(customers, before);
    }
}
