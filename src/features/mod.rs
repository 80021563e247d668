pub mod extractor;
pub mod schema;

pub use extractor::FeatureExtractor;
pub use schema::{
    EnvironmentalFeatures, FeatureMap, GovernanceFeatures, SocialFeatures, LEGACY_SCORES_KEY,
};
