use serde::{Deserialize, Serialize};

/// How a raw feature value maps onto the 0-100 scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Normalization {
    /// Already a 0-100 percentage where higher is better
    Percentage,
    /// 0-100 percentage where lower is better
    InvertedPercentage,
    /// Unbounded quantity where lower is better, scaled against an assumed maximum
    InvertedScale { max: f64 },
    /// Unbounded quantity where higher is better, scaled against an assumed maximum
    Scale { max: f64 },
    /// 0-1 fraction where higher is better
    Ratio,
}

impl Normalization {
    /// Map a raw value into `[0, 100]`
    pub fn apply(self, raw: f64) -> f64 {
        let normalized = match self {
            Self::Percentage => raw,
            Self::InvertedPercentage => 100.0 - raw,
            Self::InvertedScale { max } if max > 0.0 => (1.0 - raw / max) * 100.0,
            Self::Scale { max } if max > 0.0 => raw / max * 100.0,
            Self::InvertedScale { .. } | Self::Scale { .. } => 0.0,
            Self::Ratio => raw * 100.0,
        };
        if normalized.is_finite() {
            normalized.clamp(0.0, 100.0)
        } else {
            0.0
        }
    }
}

/// A named model input with its importance weight
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureSpec {
    pub name: &'static str,
    pub weight: f64,
    pub normalization: Normalization,
}

impl FeatureSpec {
    pub const fn new(name: &'static str, weight: f64, normalization: Normalization) -> Self {
        Self {
            name,
            weight,
            normalization,
        }
    }

    pub fn normalize(&self, raw: f64) -> f64 {
        self.normalization.apply(raw)
    }
}

pub const ENVIRONMENTAL_FEATURES: &[FeatureSpec] = &[
    FeatureSpec::new(
        "carbon_intensity",
        0.25,
        Normalization::InvertedScale { max: 500.0 },
    ),
    FeatureSpec::new("energy_efficiency", 0.20, Normalization::Percentage),
    FeatureSpec::new(
        "water_usage",
        0.15,
        Normalization::InvertedScale { max: 1000.0 },
    ),
    FeatureSpec::new("waste_management", 0.15, Normalization::Percentage),
    FeatureSpec::new("renewable_energy_pct", 0.15, Normalization::Percentage),
    FeatureSpec::new(
        "biodiversity_impact",
        0.10,
        Normalization::InvertedPercentage,
    ),
];

pub const SOCIAL_FEATURES: &[FeatureSpec] = &[
    FeatureSpec::new("employee_satisfaction", 0.20, Normalization::Percentage),
    FeatureSpec::new("diversity_ratio", 0.20, Normalization::Ratio),
    FeatureSpec::new(
        "safety_incidents",
        0.20,
        Normalization::InvertedScale { max: 10.0 },
    ),
    FeatureSpec::new(
        "community_investment",
        0.15,
        Normalization::Scale { max: 5.0 },
    ),
    FeatureSpec::new("labor_practices", 0.15, Normalization::Percentage),
    FeatureSpec::new("human_rights", 0.10, Normalization::Percentage),
];

pub const GOVERNANCE_FEATURES: &[FeatureSpec] = &[
    FeatureSpec::new("board_independence", 0.25, Normalization::Percentage),
    FeatureSpec::new("audit_quality", 0.20, Normalization::Percentage),
    FeatureSpec::new("transparency", 0.20, Normalization::Percentage),
    FeatureSpec::new(
        "executive_pay_ratio",
        0.15,
        Normalization::InvertedScale { max: 500.0 },
    ),
    FeatureSpec::new("shareholder_rights", 0.10, Normalization::Percentage),
    FeatureSpec::new("ethics_compliance", 0.10, Normalization::Percentage),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_weights_sum_to_one() {
        for specs in [ENVIRONMENTAL_FEATURES, SOCIAL_FEATURES, GOVERNANCE_FEATURES] {
            let total: f64 = specs.iter().map(|s| s.weight).sum();
            assert!((total - 1.0).abs() < 1e-9, "weights sum to {}", total);
        }
    }

    #[test]
    fn test_carbon_intensity_is_inverted() {
        let carbon = ENVIRONMENTAL_FEATURES[0];
        assert_eq!(carbon.normalize(0.0), 100.0);
        assert!((carbon.normalize(50.0) - 90.0).abs() < 1e-9);
        assert_eq!(carbon.normalize(500.0), 0.0);
        assert_eq!(carbon.normalize(2_000.0), 0.0);
    }

    #[test]
    fn test_outputs_are_clamped() {
        assert_eq!(Normalization::Percentage.apply(140.0), 100.0);
        assert_eq!(Normalization::Percentage.apply(-3.0), 0.0);
        assert!((Normalization::Ratio.apply(0.42) - 42.0).abs() < 1e-9);
        assert_eq!(Normalization::Scale { max: 5.0 }.apply(2.5), 50.0);
        assert_eq!(Normalization::InvertedPercentage.apply(30.0), 70.0);
        assert_eq!(Normalization::Scale { max: 0.0 }.apply(2.5), 0.0);
        assert_eq!(Normalization::Percentage.apply(f64::NAN), 0.0);
    }
}
