use super::artifact::ModelArtifact;
use super::normalization::{
    FeatureSpec, ENVIRONMENTAL_FEATURES, GOVERNANCE_FEATURES, SOCIAL_FEATURES,
};
use super::regression::RidgeRegression;
use super::strategy::{run_chain, weighted_average, Prediction, Strategy, StrategyOutcome};
use crate::config::ScoringConfig;
use crate::core::{ModelUsed, Pillar};
use crate::errors::{Error, Result};
use crate::features::FeatureMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outcome of fitting a component model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingResult {
    pub success: bool,
    /// R² on the training rows
    pub training_score: f64,
    pub feature_importance: BTreeMap<String, f64>,
    pub samples_used: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TrainingResult {
    fn failed(reason: String, samples_used: usize) -> Self {
        Self {
            success: false,
            training_score: 0.0,
            feature_importance: BTreeMap::new(),
            samples_used,
            error: Some(reason),
        }
    }
}

/// Shared state of a pillar model: settings, importance and the fitted regression
#[derive(Debug, Clone)]
pub struct ModelState {
    settings: ScoringConfig,
    regression: Option<RidgeRegression>,
    feature_importance: BTreeMap<String, f64>,
}

impl ModelState {
    fn new(specs: &[FeatureSpec], settings: ScoringConfig) -> Self {
        Self {
            settings,
            regression: None,
            feature_importance: default_importance(specs),
        }
    }
}

fn default_importance(specs: &[FeatureSpec]) -> BTreeMap<String, f64> {
    specs
        .iter()
        .map(|s| (s.name.to_string(), s.weight))
        .collect()
}

/// Capability set shared by the Environmental, Social and Governance models.
///
/// Implementors supply their pillar, feature set and state; training,
/// prediction and artifact handling are common.
pub trait ComponentModel: Send + Sync {
    fn pillar(&self) -> Pillar;

    fn feature_specs(&self) -> &'static [FeatureSpec];

    fn state(&self) -> &ModelState;

    fn state_mut(&mut self) -> &mut ModelState;

    fn is_trained(&self) -> bool {
        self.state().regression.is_some()
    }

    fn feature_importance(&self) -> &BTreeMap<String, f64> {
        &self.state().feature_importance
    }

    /// Fit the regression on historical feature maps.
    ///
    /// `target_column` names the numeric field of each row holding the
    /// pillar score to learn. Rows without a target are skipped. A failed
    /// fit leaves the previous state untouched.
    fn train(&mut self, dataset: &[FeatureMap], target_column: &str) -> TrainingResult {
        let specs = self.feature_specs();
        let (rows, targets): (Vec<Vec<Option<f64>>>, Vec<f64>) = dataset
            .iter()
            .filter_map(|map| {
                let target = map.get(target_column)?;
                let row = specs
                    .iter()
                    .map(|s| map.get(s.name).map(|raw| s.normalize(raw)))
                    .collect();
                Some((row, target))
            })
            .unzip();
        let samples = rows.len();

        let lambda = self.state().settings.ridge_lambda;
        match RidgeRegression::fit(&rows, &targets, lambda) {
            Ok(regression) => {
                let importance: BTreeMap<String, f64> = specs
                    .iter()
                    .zip(&regression.importance)
                    .map(|(s, w)| (s.name.to_string(), *w))
                    .collect();
                let training_score = regression.r_squared;

                let state = self.state_mut();
                state.feature_importance = importance.clone();
                state.regression = Some(regression);

                tracing::info!(
                    pillar = %self.pillar(),
                    samples,
                    r_squared = training_score,
                    "Trained component model"
                );
                TrainingResult {
                    success: true,
                    training_score,
                    feature_importance: importance,
                    samples_used: samples,
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!(pillar = %self.pillar(), "Training failed: {}", e);
                TrainingResult::failed(e.to_string(), samples)
            }
        }
    }

    /// Score a feature map through the strategy chain
    fn predict(&self, features: &FeatureMap) -> Result<Prediction> {
        let specs = self.feature_specs();
        let settings = &self.state().settings;

        let mut chain = Vec::with_capacity(3);
        if let Some(regression) = &self.state().regression {
            chain.push(Strategy::Trained {
                regression,
                min_features: settings.min_trained_features,
            });
        }
        chain.push(Strategy::WeightedAverage);
        chain.push(Strategy::NeutralDefault {
            score: settings.neutral_score,
        });

        let mut prediction = run_chain(&chain, specs, features).ok_or_else(|| {
            Error::Model(format!("no {} scoring strategy produced a result", self.pillar()))
        })?;

        if prediction.model_used == ModelUsed::Trained {
            if let StrategyOutcome::Scored { score, .. } = weighted_average(specs, features) {
                let gap = (prediction.score - score).abs();
                if gap > settings.cross_check_tolerance {
                    tracing::warn!(
                        pillar = %self.pillar(),
                        trained = prediction.score,
                        weighted_average = score,
                        "Trained prediction diverges from weighted average by {:.1}",
                        gap
                    );
                }
                prediction.cross_check = Some(score);
            }
        }

        Ok(prediction)
    }

    fn artifact(&self) -> Result<ModelArtifact> {
        let state = self.state();
        match &state.regression {
            Some(regression) => ModelArtifact::trained(
                self.pillar(),
                state.feature_importance.clone(),
                regression,
            ),
            None => Ok(ModelArtifact::untrained(
                self.pillar(),
                state.feature_importance.clone(),
            )),
        }
    }

    /// Restore from an artifact. Returns false and stays in fallback mode if
    /// the artifact is for another pillar, untrained or undecodable.
    fn load_artifact(&mut self, artifact: &ModelArtifact) -> bool {
        let pillar = self.pillar();
        if artifact.pillar != pillar {
            tracing::warn!(
                "Ignoring {} artifact offered to the {} model",
                artifact.pillar,
                pillar
            );
            return false;
        }
        if !artifact.is_trained {
            return false;
        }

        let width = self.feature_specs().len();
        match artifact.regression() {
            Ok(regression) if regression.width() == width => {
                let state = self.state_mut();
                state.regression = Some(regression);
                state.feature_importance = artifact.feature_importance.clone();
                true
            }
            Ok(regression) => {
                tracing::warn!(
                    "{} artifact has {} coefficients, expected {}; using fallback scoring",
                    pillar,
                    regression.width(),
                    width
                );
                false
            }
            Err(e) => {
                tracing::warn!("{}; using fallback scoring", e);
                false
            }
        }
    }
}

macro_rules! pillar_model {
    ($(#[$meta:meta])* $name:ident, $pillar:expr, $specs:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name {
            state: ModelState,
        }

        impl $name {
            pub fn new(settings: ScoringConfig) -> Self {
                Self {
                    state: ModelState::new($specs, settings),
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new(ScoringConfig::default())
            }
        }

        impl ComponentModel for $name {
            fn pillar(&self) -> Pillar {
                $pillar
            }

            fn feature_specs(&self) -> &'static [FeatureSpec] {
                $specs
            }

            fn state(&self) -> &ModelState {
                &self.state
            }

            fn state_mut(&mut self) -> &mut ModelState {
                &mut self.state
            }
        }
    };
}

pillar_model!(
    /// Carbon, energy, water, waste, renewables and biodiversity
    EnvironmentalModel,
    Pillar::Environmental,
    ENVIRONMENTAL_FEATURES
);
pillar_model!(
    /// Workforce, diversity, safety, community and rights
    SocialModel,
    Pillar::Social,
    SOCIAL_FEATURES
);
pillar_model!(
    /// Board, audit, transparency, pay and shareholder rights
    GovernanceModel,
    Pillar::Governance,
    GOVERNANCE_FEATURES
);
