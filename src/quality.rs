use crate::config::QualityWeights;
use crate::constants::UNKNOWN_TEXT;
use crate::types::CleanedActivity;
use serde::{Deserialize, Serialize};

/// Field tracked by the completeness score
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum QualityField {
    Price,
    Rating,
    ReviewCount,
    Description,
    Duration,
}

/// Types of quality issues that can be detected
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum QualityIssueType {
    /// Field absent or "Unknown"
    MissingData,
    /// Text present but no usable value could be parsed from it
    Unparseable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityIssue {
    pub field: QualityField,
    pub issue_type: QualityIssueType,
    pub description: String,
}

/// Completeness assessment for one cleaned activity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityAssessment {
    /// 0 to 100
    pub score: u8,
    pub issues: Vec<QualityIssue>,
}

/// Trait for implementing completeness scoring
pub trait QualityScorer {
    fn assess(&self, activity: &CleanedActivity) -> QualityAssessment;
}

/// Awards each tracked field its configured weight when it holds a valid value.
///
/// Weights are validated to be non-zero and sum to 100, so the score is monotonic
/// in the set of populated fields and only reaches 100 with every field present.
#[derive(Debug, Clone, Default)]
pub struct WeightedQualityScorer {
    weights: QualityWeights,
}

impl WeightedQualityScorer {
    pub fn new(weights: QualityWeights) -> Self {
        Self { weights }
    }

    fn check(
        issues: &mut Vec<QualityIssue>,
        field: QualityField,
        present: bool,
        text: &str,
    ) -> bool {
        if !present {
            let unknown = text.trim().is_empty() || text == UNKNOWN_TEXT;
            issues.push(QualityIssue {
                field,
                issue_type: if unknown {
                    QualityIssueType::MissingData
                } else {
                    QualityIssueType::Unparseable
                },
                description: if unknown {
                    format!("{field:?} is missing")
                } else {
                    format!("{field:?} text '{text}' has no usable value")
                },
            });
        }
        present
    }
}

impl QualityScorer for WeightedQualityScorer {
    fn assess(&self, activity: &CleanedActivity) -> QualityAssessment {
        let mut issues = Vec::new();
        let w = &self.weights;
        let description = activity.description.as_deref().unwrap_or("");

        let checks = [
            (
                QualityField::Price,
                activity.price_numeric.is_some(),
                activity.price_text.as_str(),
                w.price,
            ),
            (
                QualityField::Rating,
                activity.rating_numeric.is_some(),
                activity.rating_text.as_str(),
                w.rating,
            ),
            (
                QualityField::ReviewCount,
                activity.review_count_numeric.is_some(),
                activity.review_count_text.as_str(),
                w.reviews,
            ),
            (
                QualityField::Description,
                !description.trim().is_empty(),
                description,
                w.description,
            ),
            (
                QualityField::Duration,
                activity.duration_hours.is_some(),
                activity.duration_text.as_str(),
                w.duration,
            ),
        ];

        let score: u32 = checks
            .iter()
            .filter(|(field, present, text, _)| Self::check(&mut issues, *field, *present, text))
            .map(|(_, _, _, weight)| u32::from(*weight))
            .sum();

        QualityAssessment {
            score: score.min(100) as u8,
            issues,
        }
    }
}
