//! Classification results produced by the inference source

use crate::label::Label;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One (label, confidence) pair for a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Raw label as reported by the model metadata
    pub label: String,
    /// Probability between 0.0 and 1.0
    pub confidence: f32,
}

impl Classification {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }

    /// Canonical form of this result's label
    pub fn normalized_label(&self) -> Label {
        Label::normalize(&self.label)
    }
}

fn by_confidence_desc(a: &Classification, b: &Classification) -> Ordering {
    match (a.confidence.is_finite(), b.confidence.is_finite()) {
        (true, true) => b
            .confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal),
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => Ordering::Equal,
    }
}

/// Sort results by descending confidence. Stable, so ties keep model order.
/// Non-finite confidences sink to the end.
pub fn rank_classifications(results: &mut [Classification]) {
    results.sort_by(by_confidence_desc);
}

/// Highest-confidence result, if any.
pub fn top_classification(results: &[Classification]) -> Option<&Classification> {
    results
        .iter()
        .reduce(|best, next| {
            if by_confidence_desc(next, best) == Ordering::Less {
                next
            } else {
                best
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_descending() {
        let mut results = vec![
            Classification::new("left", 0.1),
            Classification::new("forward", 0.7),
            Classification::new("stop", 0.2),
        ];
        rank_classifications(&mut results);
        let labels: Vec<&str> = results.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["forward", "stop", "left"]);
    }

    #[test]
    fn test_rank_nan_sinks() {
        let mut results = vec![
            Classification::new("broken", f32::NAN),
            Classification::new("stop", 0.2),
        ];
        rank_classifications(&mut results);
        assert_eq!(results[0].label, "stop");
    }

    #[test]
    fn test_top_matches_rank() {
        let results = vec![
            Classification::new("left", 0.3),
            Classification::new("right", 0.6),
            Classification::new("back", 0.1),
        ];
        assert_eq!(top_classification(&results).map(|c| c.label.as_str()), Some("right"));
    }

    #[test]
    fn test_top_ties_keep_first() {
        let results = vec![
            Classification::new("left", 0.5),
            Classification::new("right", 0.5),
        ];
        assert_eq!(top_classification(&results).map(|c| c.label.as_str()), Some("left"));
    }

    #[test]
    fn test_top_empty() {
        assert!(top_classification(&[]).is_none());
    }

    #[test]
    fn test_normalized_label() {
        let c = Classification::new(" forward ", 0.9);
        assert_eq!(c.normalized_label().as_str(), "FORWARD");
    }
}
