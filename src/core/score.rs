use super::score_types::Score0To100;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One of the three ESG pillars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pillar {
    Environmental,
    Social,
    Governance,
}

impl Pillar {
    pub const ALL: [Pillar; 3] = [Pillar::Environmental, Pillar::Social, Pillar::Governance];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Environmental => "environmental",
            Self::Social => "social",
            Self::Governance => "governance",
        }
    }

    /// Observation name used when a pillar score is written as a metric
    pub fn score_metric_name(self) -> &'static str {
        match self {
            Self::Environmental => "environmental_score",
            Self::Social => "social_score",
            Self::Governance => "governance_score",
        }
    }
}

impl std::fmt::Display for Pillar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Pillar {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "environmental" | "e" => Ok(Self::Environmental),
            "social" | "s" => Ok(Self::Social),
            "governance" | "g" => Ok(Self::Governance),
            other => Err(format!("unknown pillar '{}'", other)),
        }
    }
}

/// Which path produced a pillar score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelUsed {
    /// Trained regression model
    Trained,
    /// Weighted average of available normalized features
    WeightedAverage,
    /// No features available, neutral default with zero confidence
    Default,
    /// Pre-computed upstream scores on the entity
    Legacy,
    /// Model failed and no legacy scores existed
    NeutralFallback,
    /// Aggregated from child entities
    Aggregated,
    /// Imputed from sector peers
    PeerEstimate,
}

impl std::fmt::Display for ModelUsed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Trained => "Trained",
            Self::WeightedAverage => "WeightedAverage",
            Self::Default => "Default",
            Self::Legacy => "Legacy",
            Self::NeutralFallback => "NeutralFallback",
            Self::Aggregated => "Aggregated",
            Self::PeerEstimate => "PeerEstimate",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PillarScore {
    pub score: Score0To100,
    pub confidence: Score0To100,
    pub model_used: ModelUsed,
}

impl PillarScore {
    pub fn new(score: f64, confidence: f64, model_used: ModelUsed) -> Self {
        Self {
            score: Score0To100::new(score),
            confidence: Score0To100::new(confidence),
            model_used,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompositeScore {
    pub score: Score0To100,
    pub confidence: Score0To100,
    /// `[low, high]`, always containing `score`
    pub confidence_interval: [f64; 2],
}

/// Least-squares trend per pillar, in score points per period.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Momentum {
    pub environmental: f64,
    pub social: f64,
    pub governance: f64,
    pub overall: f64,
}

/// Output of one scoring run for one entity.
///
/// Never mutated in place; a newer result supersedes the stored one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub entity_id: String,
    pub environmental: PillarScore,
    pub social: PillarScore,
    pub governance: PillarScore,
    pub composite: CompositeScore,
    #[serde(default)]
    pub momentum: Momentum,
    pub timestamp: DateTime<Utc>,
}

impl ScoreResult {
    pub fn pillar(&self, pillar: Pillar) -> &PillarScore {
        match pillar {
            Pillar::Environmental => &self.environmental,
            Pillar::Social => &self.social,
            Pillar::Governance => &self.governance,
        }
    }

    pub fn pillars(&self) -> [(Pillar, &PillarScore); 3] {
        [
            (Pillar::Environmental, &self.environmental),
            (Pillar::Social, &self.social),
            (Pillar::Governance, &self.governance),
        ]
    }
}

/// Scores already computed upstream (legacy pipelines, provider feeds).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LegacyEsgScores {
    #[serde(default)]
    pub environmental: Option<f64>,
    #[serde(default)]
    pub social: Option<f64>,
    #[serde(default)]
    pub governance: Option<f64>,
    #[serde(default)]
    pub combined: Option<f64>,
}

impl LegacyEsgScores {
    pub fn pillar(&self, pillar: Pillar) -> Option<f64> {
        let value = match pillar {
            Pillar::Environmental => self.environmental,
            Pillar::Social => self.social,
            Pillar::Governance => self.governance,
        };
        value.filter(|v| v.is_finite())
    }
}
