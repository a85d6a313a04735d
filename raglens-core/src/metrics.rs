//! Metric value types and the fixed-precision arithmetic shared by scorers
//! and the aggregator.

use serde::{Deserialize, Serialize};

/// Number of decimal digits every reported score is rounded to.
pub const SCORE_PRECISION: i32 = 3;

/// Names of the four core quality metrics, in report order.
pub const CORE_METRICS: [&str; 4] = [
    "faithfulness",
    "answer_relevancy",
    "context_precision",
    "context_recall",
];

/// Round to [`SCORE_PRECISION`] digits using round-half-to-even.
///
/// The tie check runs on the scaled value, so a literal such as `0.0055`
/// rounds up to `0.006` even though its binary form sits just below the tie.
pub fn round_score(value: f64) -> f64 {
    let scale = 10f64.powi(SCORE_PRECISION);
    (value * scale).round_ties_even() / scale
}

/// Arithmetic mean, or `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// The four per-record quality scores, each in `[0.0, 1.0]` and rounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSet {
    pub faithfulness: f64,
    pub answer_relevancy: f64,
    pub context_precision: f64,
    pub context_recall: f64,
}

impl MetricSet {
    /// Build a metric set, clamping each raw value into `[0, 1]` and rounding.
    pub fn new(
        faithfulness: f64,
        answer_relevancy: f64,
        context_precision: f64,
        context_recall: f64,
    ) -> Self {
        let clean = |v: f64| round_score(v.clamp(0.0, 1.0));
        Self {
            faithfulness: clean(faithfulness),
            answer_relevancy: clean(answer_relevancy),
            context_precision: clean(context_precision),
            context_recall: clean(context_recall),
        }
    }

    pub fn values(&self) -> [f64; 4] {
        [
            self.faithfulness,
            self.answer_relevancy,
            self.context_precision,
            self.context_recall,
        ]
    }

    /// Overwrite a metric by its report name. Returns `false` for unknown names.
    pub fn set(&mut self, name: &str, value: f64) -> bool {
        let slot = match name {
            "faithfulness" => &mut self.faithfulness,
            "answer_relevancy" => &mut self.answer_relevancy,
            "context_precision" => &mut self.context_precision,
            "context_recall" => &mut self.context_recall,
            _ => return false,
        };
        *slot = round_score(value);
        true
    }

    /// Mean of the four scores, rounded.
    pub fn overall_score(&self) -> f64 {
        round_score(self.values().iter().sum::<f64>() / 4.0)
    }
}

/// A metric set with its overall score, as reported for the whole run or a
/// single role group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    #[serde(flatten)]
    pub metrics: MetricSet,
    pub overall_score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_score_half_to_even() {
        assert_eq!(round_score(0.3333333), 0.333);
        assert_eq!(round_score(0.6666666), 0.667);
        assert_eq!(round_score(0.0), 0.0);
        assert_eq!(round_score(1.0), 1.0);
        // exact ties go to the even neighbour
        assert_eq!(round_score(0.0625), 0.062);
        assert_eq!(round_score(0.1875), 0.188);
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[0.5]), Some(0.5));
        assert_eq!(mean(&[0.0, 1.0, 0.5]), Some(0.5));
    }

    #[test]
    fn test_metric_set_clamps_and_rounds() {
        let m = MetricSet::new(1.4, -0.2, 0.12345, 0.5);
        assert_eq!(m.faithfulness, 1.0);
        assert_eq!(m.answer_relevancy, 0.0);
        assert_eq!(m.context_precision, 0.123);
        assert_eq!(m.context_recall, 0.5);
    }

    #[test]
    fn test_overall_score_is_rounded_mean() {
        let m = MetricSet::new(0.5, 0.333, 0.1, 0.1);
        assert_eq!(m.overall_score(), 0.258);
        assert_eq!(MetricSet::default().overall_score(), 0.0);
    }

    #[test]
    fn test_round_score_ties_on_scaled_value() {
        assert_eq!(round_score(0.0055), 0.006);
        assert_eq!(round_score(0.0045), 0.004);
        assert_eq!(round_score(2.6745), 2.674);
    }

    #[test]
    fn test_set_by_name() {
        let mut m = MetricSet::default();
        assert!(m.set("context_recall", 0.87654));
        assert_eq!(m.context_recall, 0.877);
        assert!(!m.set("answer_correctness", 0.9));
        assert_eq!(m, MetricSet::new(0.0, 0.0, 0.0, 0.877));
    }

    #[test]
    fn test_summary_serializes_flat() {
        let summary = MetricSummary {
            metrics: MetricSet::new(0.5, 0.5, 0.5, 0.5),
            overall_score: 0.5,
        };
        let json = serde_json::to_value(summary).unwrap();
        assert_eq!(json["faithfulness"], 0.5);
        assert_eq!(json["overall_score"], 0.5);
        assert!(json.get("metrics").is_none());
    }
}
