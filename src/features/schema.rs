//! Typed, explicitly optional feature schema.
//!
//! Raw feature maps arrive as JSON objects `{name: number | null}`. They are
//! validated once here: known names land in the per-pillar structs, unknown
//! numeric names are kept in `extras`, `null` and absent keys both mean
//! "unavailable", and anything that is not a number is rejected.

use crate::core::{LegacyEsgScores, Pillar};
use crate::errors::Error;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnvironmentalFeatures {
    pub carbon_intensity: Option<f64>,
    pub energy_efficiency: Option<f64>,
    pub water_usage: Option<f64>,
    pub waste_management: Option<f64>,
    pub renewable_energy_pct: Option<f64>,
    pub biodiversity_impact: Option<f64>,
}

impl EnvironmentalFeatures {
    pub const FIELDS: &'static [&'static str] = &[
        "carbon_intensity",
        "energy_efficiency",
        "water_usage",
        "waste_management",
        "renewable_energy_pct",
        "biodiversity_impact",
    ];

    pub fn get(&self, name: &str) -> Option<f64> {
        match name {
            "carbon_intensity" => self.carbon_intensity,
            "energy_efficiency" => self.energy_efficiency,
            "water_usage" => self.water_usage,
            "waste_management" => self.waste_management,
            "renewable_energy_pct" => self.renewable_energy_pct,
            "biodiversity_impact" => self.biodiversity_impact,
            _ => None,
        }
    }

    fn slot(&mut self, name: &str) -> Option<&mut Option<f64>> {
        match name {
            "carbon_intensity" => Some(&mut self.carbon_intensity),
            "energy_efficiency" => Some(&mut self.energy_efficiency),
            "water_usage" => Some(&mut self.water_usage),
            "waste_management" => Some(&mut self.waste_management),
            "renewable_energy_pct" => Some(&mut self.renewable_energy_pct),
            "biodiversity_impact" => Some(&mut self.biodiversity_impact),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SocialFeatures {
    pub employee_satisfaction: Option<f64>,
    pub diversity_ratio: Option<f64>,
    pub safety_incidents: Option<f64>,
    pub community_investment: Option<f64>,
    pub labor_practices: Option<f64>,
    pub human_rights: Option<f64>,
}

impl SocialFeatures {
    pub const FIELDS: &'static [&'static str] = &[
        "employee_satisfaction",
        "diversity_ratio",
        "safety_incidents",
        "community_investment",
        "labor_practices",
        "human_rights",
    ];

    pub fn get(&self, name: &str) -> Option<f64> {
        match name {
            "employee_satisfaction" => self.employee_satisfaction,
            "diversity_ratio" => self.diversity_ratio,
            "safety_incidents" => self.safety_incidents,
            "community_investment" => self.community_investment,
            "labor_practices" => self.labor_practices,
            "human_rights" => self.human_rights,
            _ => None,
        }
    }

    fn slot(&mut self, name: &str) -> Option<&mut Option<f64>> {
        match name {
            "employee_satisfaction" => Some(&mut self.employee_satisfaction),
            "diversity_ratio" => Some(&mut self.diversity_ratio),
            "safety_incidents" => Some(&mut self.safety_incidents),
            "community_investment" => Some(&mut self.community_investment),
            "labor_practices" => Some(&mut self.labor_practices),
            "human_rights" => Some(&mut self.human_rights),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GovernanceFeatures {
    pub board_independence: Option<f64>,
    pub audit_quality: Option<f64>,
    pub transparency: Option<f64>,
    pub executive_pay_ratio: Option<f64>,
    pub shareholder_rights: Option<f64>,
    pub ethics_compliance: Option<f64>,
}

impl GovernanceFeatures {
    pub const FIELDS: &'static [&'static str] = &[
        "board_independence",
        "audit_quality",
        "transparency",
        "executive_pay_ratio",
        "shareholder_rights",
        "ethics_compliance",
    ];

    pub fn get(&self, name: &str) -> Option<f64> {
        match name {
            "board_independence" => self.board_independence,
            "audit_quality" => self.audit_quality,
            "transparency" => self.transparency,
            "executive_pay_ratio" => self.executive_pay_ratio,
            "shareholder_rights" => self.shareholder_rights,
            "ethics_compliance" => self.ethics_compliance,
            _ => None,
        }
    }

    fn slot(&mut self, name: &str) -> Option<&mut Option<f64>> {
        match name {
            "board_independence" => Some(&mut self.board_independence),
            "audit_quality" => Some(&mut self.audit_quality),
            "transparency" => Some(&mut self.transparency),
            "executive_pay_ratio" => Some(&mut self.executive_pay_ratio),
            "shareholder_rights" => Some(&mut self.shareholder_rights),
            "ethics_compliance" => Some(&mut self.ethics_compliance),
            _ => None,
        }
    }
}

/// Validated feature map for one entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeatureMap {
    #[serde(flatten)]
    pub environmental: EnvironmentalFeatures,
    #[serde(flatten)]
    pub social: SocialFeatures,
    #[serde(flatten)]
    pub governance: GovernanceFeatures,
    /// Numeric values with no pillar slot (additive impact metrics etc.)
    #[serde(flatten)]
    pub extras: BTreeMap<String, f64>,
    /// Pre-computed upstream scores
    #[serde(skip_serializing_if = "Option::is_none")]
    pub esg_scores: Option<LegacyEsgScores>,
}

/// Key holding pre-computed upstream scores in a raw feature map
pub const LEGACY_SCORES_KEY: &str = "esg_scores";

impl FeatureMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a feature by name, returning `None` when unavailable
    pub fn get(&self, name: &str) -> Option<f64> {
        self.environmental
            .get(name)
            .or_else(|| self.social.get(name))
            .or_else(|| self.governance.get(name))
            .or_else(|| self.extras.get(name).copied())
    }

    /// Store a feature value. Non-finite values are treated as unavailable.
    pub fn set(&mut self, name: &str, value: f64) {
        let value = Some(value).filter(|v| v.is_finite());
        if let Some(slot) = self.slot(name) {
            *slot = value;
            return;
        }
        match value {
            Some(v) => {
                self.extras.insert(name.to_string(), v);
            }
            None => {
                self.extras.remove(name);
            }
        }
    }

    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.set(name, value);
        self
    }

    fn slot(&mut self, name: &str) -> Option<&mut Option<f64>> {
        if let Some(slot) = self.environmental.slot(name) {
            return Some(slot);
        }
        if let Some(slot) = self.social.slot(name) {
            return Some(slot);
        }
        self.governance.slot(name)
    }

    /// Names of the typed features belonging to a pillar
    pub fn pillar_fields(pillar: Pillar) -> &'static [&'static str] {
        match pillar {
            Pillar::Environmental => EnvironmentalFeatures::FIELDS,
            Pillar::Social => SocialFeatures::FIELDS,
            Pillar::Governance => GovernanceFeatures::FIELDS,
        }
    }

    /// Count of available typed features for a pillar
    pub fn available_count(&self, pillar: Pillar) -> usize {
        Self::pillar_fields(pillar)
            .iter()
            .filter(|name| self.get(name).is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        Pillar::ALL.iter().all(|p| self.available_count(*p) == 0) && self.extras.is_empty()
    }

    /// Parse and validate a raw JSON feature map
    pub fn from_json(value: &Value) -> Result<Self, Error> {
        let object = value
            .as_object()
            .ok_or_else(|| Error::InvalidInput("feature map must be a JSON object".into()))?;

        let mut map = FeatureMap::new();
        for (name, raw) in object {
            match raw {
                Value::Null => {}
                Value::Number(n) => {
                    let v = n.as_f64().ok_or_else(|| {
                        Error::InvalidInput(format!("feature '{}' is not representable", name))
                    })?;
                    map.set(name, v);
                }
                Value::Object(_) if name == LEGACY_SCORES_KEY => {
                    let legacy: LegacyEsgScores = serde_json::from_value(raw.clone())
                        .map_err(|e| Error::InvalidInput(format!("{}: {}", LEGACY_SCORES_KEY, e)))?;
                    map.esg_scores = Some(legacy);
                }
                other => {
                    return Err(Error::InvalidInput(format!(
                        "feature '{}' must be a number or null, got {}",
                        name,
                        json_type_name(other)
                    )));
                }
            }
        }
        Ok(map)
    }
}

impl<'de> Deserialize<'de> for FeatureMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        FeatureMap::from_json(&value).map_err(serde::de::Error::custom)
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
