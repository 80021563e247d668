use crate::config::{DimensionThresholds, DimensionWeights, QualityLevelThresholds};
use crate::core::{Score0To1, Score0To100};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityDimension {
    Completeness,
    Accuracy,
    Consistency,
    Timeliness,
    Validity,
}

impl QualityDimension {
    pub const ALL: [QualityDimension; 5] = [
        QualityDimension::Completeness,
        QualityDimension::Accuracy,
        QualityDimension::Consistency,
        QualityDimension::Timeliness,
        QualityDimension::Validity,
    ];
}

impl std::fmt::Display for QualityDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Completeness => "completeness",
            Self::Accuracy => "accuracy",
            Self::Consistency => "consistency",
            Self::Timeliness => "timeliness",
            Self::Validity => "validity",
        };
        f.write_str(s)
    }
}

/// Per-dimension scores, each on a 0-1 scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionScores {
    pub completeness: Score0To1,
    pub accuracy: Score0To1,
    pub consistency: Score0To1,
    pub timeliness: Score0To1,
    pub validity: Score0To1,
}

impl DimensionScores {
    pub fn get(&self, dimension: QualityDimension) -> Score0To1 {
        match dimension {
            QualityDimension::Completeness => self.completeness,
            QualityDimension::Accuracy => self.accuracy,
            QualityDimension::Consistency => self.consistency,
            QualityDimension::Timeliness => self.timeliness,
            QualityDimension::Validity => self.validity,
        }
    }

    /// Weighted sum of the dimensions, scaled to 0-100
    pub fn weighted_overall(&self, weights: &DimensionWeights) -> Score0To100 {
        let sum = self.completeness.value() * weights.completeness
            + self.accuracy.value() * weights.accuracy
            + self.consistency.value() * weights.consistency
            + self.timeliness.value() * weights.timeliness
            + self.validity.value() * weights.validity;
        Score0To100::new(sum * 100.0)
    }

    /// Dimensions falling short of their threshold
    pub fn failing(&self, thresholds: &DimensionThresholds) -> Vec<QualityDimension> {
        QualityDimension::ALL
            .into_iter()
            .filter(|d| self.get(*d).value() < threshold_for(thresholds, *d))
            .collect()
    }
}

pub fn threshold_for(thresholds: &DimensionThresholds, dimension: QualityDimension) -> f64 {
    match dimension {
        QualityDimension::Completeness => thresholds.completeness,
        QualityDimension::Accuracy => thresholds.accuracy,
        QualityDimension::Consistency => thresholds.consistency,
        QualityDimension::Timeliness => thresholds.timeliness,
        QualityDimension::Validity => thresholds.validity,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QualityLevel {
    Unacceptable, // < 60
    Poor,         // 60-70
    Acceptable,   // 70-80
    Good,         // 80-90
    Excellent,    // >= 90
}

impl QualityLevel {
    pub fn from_score(score: f64, levels: &QualityLevelThresholds) -> Self {
        if score >= levels.excellent {
            Self::Excellent
        } else if score >= levels.good {
            Self::Good
        } else if score >= levels.acceptable {
            Self::Acceptable
        } else if score >= levels.poor {
            Self::Poor
        } else {
            Self::Unacceptable
        }
    }
}

impl std::fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IssueSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityIssue {
    pub dimension: QualityDimension,
    pub severity: IssueSeverity,
    pub message: String,
}

impl QualityIssue {
    pub fn new(
        dimension: QualityDimension,
        severity: IssueSeverity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            dimension,
            severity,
            message: message.into(),
        }
    }
}

/// Quality assessment of one provider bundle.
///
/// Recomputed on every scoring run and replaced wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub entity_id: Option<String>,
    pub provider: Option<String>,
    pub dimension_scores: DimensionScores,
    pub overall_score: Score0To100,
    pub level: QualityLevel,
    /// True when every dimension meets its configured threshold
    pub is_valid: bool,
    pub issues: Vec<QualityIssue>,
    pub recommendations: Vec<String>,
    pub assessed_at: DateTime<Utc>,
}

impl QualityReport {
    pub fn issues_for(&self, dimension: QualityDimension) -> impl Iterator<Item = &QualityIssue> {
        self.issues.iter().filter(move |i| i.dimension == dimension)
    }
}
