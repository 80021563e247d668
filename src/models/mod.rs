//! Pillar scoring models and the machinery behind them

pub mod artifact;
pub mod component;
pub mod normalization;
pub mod regression;
pub mod registry;
pub mod strategy;

pub use artifact::ModelArtifact;
pub use component::{
    ComponentModel, EnvironmentalModel, GovernanceModel, ModelState, SocialModel, TrainingResult,
};
pub use normalization::{
    FeatureSpec, Normalization, ENVIRONMENTAL_FEATURES, GOVERNANCE_FEATURES, SOCIAL_FEATURES,
};
pub use regression::RidgeRegression;
pub use registry::ModelRegistry;
pub use strategy::{Prediction, Strategy, StrategyOutcome};
