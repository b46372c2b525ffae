//! Marketing playbook per segment

use serde::Serialize;

use crate::segment::Segment;
use crate::summary::SegmentSummary;

/// Suggested treatment for a segment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub segment: Segment,
    pub description: &'static str,
    pub strategy: &'static str,
    pub actions: &'static [&'static str],
}

type Playbook = (&'static str, &'static str, &'static [&'static str]);

pub fn recommendation_for(segment: Segment) -> Recommendation {
    let (description, strategy, actions): Playbook = match segment {
        Segment::Champions => (
            "Best customers with high RFM scores",
            "VIP treatment, exclusive offers, loyalty rewards",
            &[
                "Premium customer service",
                "Early access to new products",
                "Personalized offers",
                "Loyalty program benefits",
            ],
        ),
        Segment::LoyalCustomers => (
            "High frequency and monetary value customers",
            "Upsell premium products, cross-sell, loyalty program",
            &[
                "Product recommendations",
                "Cross-selling campaigns",
                "Loyalty point bonuses",
                "Premium upgrades",
            ],
        ),
        Segment::PotentialLoyalists => (
            "Recent customers with good frequency",
            "Membership offers, engagement campaigns",
            &[
                "Engagement sequences",
                "Product education",
                "Membership invitations",
                "Social proof",
            ],
        ),
        Segment::NewCustomers => (
            "Recent but low frequency customers",
            "Onboarding sequence, welcome offers",
            &[
                "Welcome series",
                "Onboarding tutorials",
                "First purchase incentives",
                "Product discovery",
            ],
        ),
        Segment::Promising => (
            "Fairly recent customers with moderate spend",
            "Build the habit with targeted follow-ups",
            &[
                "Follow-up offers on viewed categories",
                "Free shipping thresholds",
                "Review requests",
                "Bundle suggestions",
            ],
        ),
        Segment::NeedAttention => (
            "Regular buyers whose spend is below their frequency",
            "Raise basket value before engagement drops",
            &[
                "Limited-time upgrades",
                "Recommendations based on past purchases",
                "Reactivation reminders",
                "Satisfaction check-ins",
            ],
        ),
        Segment::AboutToSleep => (
            "Previously engaged customers going quiet",
            "Reconnect with relevant offers before they lapse",
            &[
                "Popular product highlights",
                "Time-limited discounts",
                "Personalized reminders",
                "Preference surveys",
            ],
        ),
        Segment::AtRisk => (
            "High value but declining engagement",
            "Win-back campaigns, special offers",
            &[
                "Reactivation campaigns",
                "Exclusive discounts",
                "Personal outreach",
                "Feedback surveys",
            ],
        ),
        Segment::CannotLoseThem => (
            "Highest value customers at risk of churning",
            "Immediate intervention, premium support",
            &[
                "Personal account manager",
                "Exclusive previews",
                "Special retention offers",
                "Direct communication",
            ],
        ),
        Segment::Hibernating => (
            "Previously active, now dormant",
            "Win-back series, incentive offers",
            &[
                "Re-engagement campaigns",
                "Comeback offers",
                "Product updates",
                "Limited-time promotions",
            ],
        ),
        Segment::Lost => (
            "Lowest RFM scores, likely churned",
            "Basic promotional offers, surveys",
            &[
                "Exit surveys",
                "Basic promotional emails",
                "Win-back attempts",
                "Competitive analysis",
            ],
        ),
    };

    Recommendation {
        segment,
        description,
        strategy,
        actions,
    }
}

/// Recommendations for the segments present in a summary, in summary order
pub fn recommendations_for(summaries: &[SegmentSummary]) -> Vec<Recommendation> {
    summaries
        .iter()
        .map(|s| recommendation_for(s.segment))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_segment_has_a_recommendation() {
        for segment in Segment::ALL {
            let rec = recommendation_for(segment);
            assert_eq!(rec.segment, segment);
            assert!(!rec.description.is_empty());
            assert!(!rec.strategy.is_empty());
            assert!(!rec.actions.is_empty());
        }
    }

    #[test]
    fn test_recommendations_follow_summary_order() {
        let summary = |segment| SegmentSummary {
            segment,
            customers: 1,
            percentage: 50.0,
            mean_recency: 0.0,
            mean_frequency: 1.0,
            mean_monetary: 1.0,
            total_monetary: 1.0,
            mean_rfm_score: 3.0,
        };
        let recs = recommendations_for(&[summary(Segment::Lost), summary(Segment::Champions)]);
        let order: Vec<Segment> = recs.iter().map(|r| r.segment).collect();
        assert_eq!(order, vec![Segment::Lost, Segment::Champions]);
    }

    #[test]
    fn test_serializes_to_json() {
        let json = serde_json::to_value(recommendation_for(Segment::AtRisk)).unwrap();
        assert_eq!(json["segment"], "At Risk");
        assert_eq!(json["actions"].as_array().unwrap().len(), 4);
    }
}
