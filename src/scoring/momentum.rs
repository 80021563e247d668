use crate::core::{Momentum, Pillar, ScoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Pillar scores observed at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScorePoint {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub environmental: Option<f64>,
    #[serde(default)]
    pub social: Option<f64>,
    #[serde(default)]
    pub governance: Option<f64>,
}

impl ScorePoint {
    pub fn get(&self, pillar: Pillar) -> Option<f64> {
        let value = match pillar {
            Pillar::Environmental => self.environmental,
            Pillar::Social => self.social,
            Pillar::Governance => self.governance,
        };
        value.filter(|v| v.is_finite())
    }
}

impl From<&ScoreResult> for ScorePoint {
    fn from(result: &ScoreResult) -> Self {
        Self {
            timestamp: result.timestamp,
            environmental: Some(result.environmental.score.value()),
            social: Some(result.social.score.value()),
            governance: Some(result.governance.score.value()),
        }
    }
}

/// Time series of pillar scores for one entity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoreHistory {
    points: Vec<ScorePoint>,
}

impl ScoreHistory {
    pub fn new(points: Vec<ScorePoint>) -> Self {
        Self { points }
    }

    pub fn from_results(results: &[ScoreResult]) -> Self {
        Self::new(results.iter().map(ScorePoint::from).collect())
    }

    pub fn push(&mut self, point: ScorePoint) {
        self.points.push(point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// One value per distinct timestamp, oldest first. A later entry for the
    /// same timestamp replaces an earlier one.
    pub fn series(&self, pillar: Pillar) -> Vec<f64> {
        let mut by_time: BTreeMap<DateTime<Utc>, f64> = BTreeMap::new();
        for point in &self.points {
            if let Some(v) = point.get(pillar) {
                by_time.insert(point.timestamp, v);
            }
        }
        by_time.into_values().collect()
    }
}

/// Least-squares slope of `values` against their period index
pub fn slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let first = values[0];
    if values.iter().all(|v| (v - first).abs() < f64::EPSILON) {
        return 0.0;
    }

    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = values.iter().sum::<f64>() / n as f64;
    let (num, den) = values
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(num, den), (i, y)| {
            let dx = i as f64 - x_mean;
            (num + dx * (y - y_mean), den + dx * dx)
        });
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

/// Trend of the trailing `window` periods; zero below `min_points`
pub fn pillar_momentum(values: &[f64], window: usize, min_points: usize) -> f64 {
    if values.len() < min_points {
        return 0.0;
    }
    let start = values.len().saturating_sub(window);
    slope(&values[start..])
}

pub fn momentum(history: &ScoreHistory, window: usize, min_points: usize) -> Momentum {
    let environmental =
        pillar_momentum(&history.series(Pillar::Environmental), window, min_points);
    let social = pillar_momentum(&history.series(Pillar::Social), window, min_points);
    let governance = pillar_momentum(&history.series(Pillar::Governance), window, min_points);
    Momentum {
        environmental,
        social,
        governance,
        overall: (environmental + social + governance) / 3.0,
    }
}
