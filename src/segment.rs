//! Rule-based segment labels over RFM scores

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::rfm::CustomerMetrics;
use crate::scoring::{RfmScores, ScoredCustomer};

/// The fixed set of customer segment labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Segment {
    #[serde(rename = "Champions")]
    Champions,
    #[serde(rename = "Loyal Customers")]
    LoyalCustomers,
    #[serde(rename = "Potential Loyalists")]
    PotentialLoyalists,
    #[serde(rename = "New Customers")]
    NewCustomers,
    #[serde(rename = "Promising")]
    Promising,
    #[serde(rename = "Need Attention")]
    NeedAttention,
    #[serde(rename = "About to Sleep")]
    AboutToSleep,
    #[serde(rename = "At Risk")]
    AtRisk,
    #[serde(rename = "Cannot Lose Them")]
    CannotLoseThem,
    #[serde(rename = "Hibernating")]
    Hibernating,
    #[serde(rename = "Lost")]
    Lost,
}

impl Segment {
    pub const ALL: [Segment; 11] = [
        Segment::Champions,
        Segment::LoyalCustomers,
        Segment::PotentialLoyalists,
        Segment::NewCustomers,
        Segment::Promising,
        Segment::NeedAttention,
        Segment::AboutToSleep,
        Segment::AtRisk,
        Segment::CannotLoseThem,
        Segment::Hibernating,
        Segment::Lost,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Segment::Champions => "Champions",
            Segment::LoyalCustomers => "Loyal Customers",
            Segment::PotentialLoyalists => "Potential Loyalists",
            Segment::NewCustomers => "New Customers",
            Segment::Promising => "Promising",
            Segment::NeedAttention => "Need Attention",
            Segment::AboutToSleep => "About to Sleep",
            Segment::AtRisk => "At Risk",
            Segment::CannotLoseThem => "Cannot Lose Them",
            Segment::Hibernating => "Hibernating",
            Segment::Lost => "Lost",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One entry of the decision list
pub struct Rule {
    pub segment: Segment,
    pub matches: fn(&RfmScores) -> bool,
}

/// Decision list evaluated top to bottom, first match wins. Rules overlap, so the
/// order is part of the behavior. `CannotLoseThem` is shadowed by `AtRisk` and
/// never matches.
pub const RULES: [Rule; 10] = [
    Rule {
        segment: Segment::Champions,
        matches: |s| s.r >= 4 && s.f >= 4 && s.m >= 4,
    },
    Rule {
        segment: Segment::LoyalCustomers,
        matches: |s| s.f >= 4 && s.m >= 4,
    },
    Rule {
        segment: Segment::PotentialLoyalists,
        matches: |s| s.r >= 4 && s.f >= 3,
    },
    Rule {
        segment: Segment::NewCustomers,
        matches: |s| s.r >= 4 && s.f <= 2,
    },
    Rule {
        segment: Segment::Promising,
        matches: |s| s.r >= 3 && s.f >= 2 && s.m >= 2,
    },
    Rule {
        segment: Segment::NeedAttention,
        matches: |s| s.r >= 3 && s.f >= 3,
    },
    Rule {
        segment: Segment::AboutToSleep,
        matches: |s| s.r == 2 && s.f >= 2 && s.m >= 2,
    },
    Rule {
        segment: Segment::AtRisk,
        matches: |s| s.m >= 4 && s.r <= 2,
    },
    Rule {
        segment: Segment::CannotLoseThem,
        matches: |s| s.m >= 4 && s.r == 1,
    },
    Rule {
        segment: Segment::Hibernating,
        matches: |s| s.r <= 2 && s.f >= 2,
    },
];

/// Segment assigned when no rule matches
pub const FALLBACK: Segment = Segment::Lost;

/// Label a single score triple
pub fn classify(scores: &RfmScores) -> Segment {
    RULES
        .iter()
        .find(|rule| (rule.matches)(scores))
        .map_or(FALLBACK, |rule| rule.segment)
}

/// A scored customer with its segment and, once partitioning has run, its cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentedCustomer {
    pub metrics: CustomerMetrics,
    pub scores: RfmScores,
    pub rfm_score: f64,
    pub segment: Segment,
    pub cluster_id: Option<usize>,
}

/// Attach a segment label to every scored customer
pub fn segment_customers(scored: Vec<ScoredCustomer>) -> Vec<SegmentedCustomer> {
    let segmented: Vec<SegmentedCustomer> = scored
        .into_iter()
        .map(|c| SegmentedCustomer {
            segment: classify(&c.scores),
            metrics: c.metrics,
            scores: c.scores,
            rfm_score: c.rfm_score,
            cluster_id: None,
        })
        .collect();

    debug!(customers = segmented.len(), "classified customers into segments");
    segmented
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn all_triples() -> impl Iterator<Item = RfmScores> {
        (1..=5u8).flat_map(|r| {
            (1..=5u8).flat_map(move |f| (1..=5u8).map(move |m| RfmScores::new(r, f, m)))
        })
    }

    #[test]
    fn test_champions() {
        assert_eq!(classify(&RfmScores::new(5, 5, 5)), Segment::Champions);
        assert_eq!(classify(&RfmScores::new(4, 4, 4)), Segment::Champions);
    }

    #[test]
    fn test_rule_priority() {
        assert_eq!(classify(&RfmScores::new(1, 5, 5)), Segment::LoyalCustomers);
        assert_eq!(classify(&RfmScores::new(5, 3, 1)), Segment::PotentialLoyalists);
        assert_eq!(classify(&RfmScores::new(4, 1, 5)), Segment::NewCustomers);
        assert_eq!(classify(&RfmScores::new(3, 2, 2)), Segment::Promising);
        assert_eq!(classify(&RfmScores::new(3, 3, 1)), Segment::NeedAttention);
        assert_eq!(classify(&RfmScores::new(2, 2, 2)), Segment::AboutToSleep);
        assert_eq!(classify(&RfmScores::new(2, 1, 4)), Segment::AtRisk);
        assert_eq!(classify(&RfmScores::new(1, 3, 1)), Segment::Hibernating);
        assert_eq!(classify(&RfmScores::new(3, 1, 1)), Segment::Lost);
        assert_eq!(classify(&RfmScores::new(1, 1, 1)), Segment::Lost);
    }

    #[test]
    fn test_high_monetary_lapsed_customer_is_at_risk() {
        // the At Risk rule precedes Cannot Lose Them and covers r == 1
        assert_eq!(classify(&RfmScores::new(1, 1, 5)), Segment::AtRisk);
    }

    #[test]
    fn test_cannot_lose_them_is_unreachable() {
        assert!(all_triples().all(|s| classify(&s) != Segment::CannotLoseThem));
    }

    #[test]
    fn test_classifier_is_total_and_deterministic() {
        let labels: HashSet<Segment> = all_triples().map(|s| classify(&s)).collect();
        for s in all_triples() {
            assert_eq!(classify(&s), classify(&s));
        }
        // every label except the shadowed one is produced somewhere
        assert_eq!(labels.len(), Segment::ALL.len() - 1);
    }

    #[test]
    fn test_labels_serialize_as_display_names() {
        for segment in Segment::ALL {
            let json = serde_json::to_string(&segment).unwrap();
            assert_eq!(json, format!("\"{}\"", segment.label()));
        }
    }
}
