//! Type-safe score scales.
//!
//! Pillar scores, composite scores and confidences all live on a 0-100
//! scale. Quality dimensions and reliability live on a 0-1 scale. Encoding
//! the scale in the type keeps the two from being mixed up and makes the
//! range invariant hold by construction.
//!
//! # Examples
//!
//! ```rust
//! use esgmap::core::score_types::{Score0To100, Score0To1};
//!
//! let score = Score0To100::new(85.0);
//! assert_eq!(score.value(), 85.0);
//!
//! // Out-of-bounds values are clamped
//! assert_eq!(Score0To100::new(150.0).value(), 100.0);
//! assert_eq!(Score0To1::new(-0.2).value(), 0.0);
//! ```

use serde::{Deserialize, Serialize};

/// Score on 0-100 scale.
///
/// Values are clamped to [0.0, 100.0]. NaN becomes 0.0.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Score0To100(f64);

impl Score0To100 {
    pub const ZERO: Score0To100 = Score0To100(0.0);
    pub const MAX: Score0To100 = Score0To100(100.0);

    /// Create a new score, clamping to [0.0, 100.0].
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Self(0.0);
        }
        Self(value.clamp(0.0, 100.0))
    }

    /// Get the raw score value.
    pub fn value(self) -> f64 {
        self.0
    }

    /// Normalize to 0-1 scale by dividing by 100.
    pub fn normalize(self) -> Score0To1 {
        Score0To1(self.0 / 100.0)
    }
}

impl From<f64> for Score0To100 {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl From<Score0To100> for f64 {
    fn from(score: Score0To100) -> Self {
        score.0
    }
}

impl std::fmt::Display for Score0To100 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.1}", self.0)
    }
}

/// Score on 0-1 scale.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Score0To1(f64);

impl Score0To1 {
    pub const ONE: Score0To1 = Score0To1(1.0);

    /// Create a new score, clamping to [0.0, 1.0].
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Self(0.0);
        }
        Self(value.clamp(0.0, 1.0))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Subtract a penalty, saturating at zero.
    pub fn penalize(self, amount: f64) -> Self {
        Self::new(self.0 - amount)
    }

    /// Convert to 0-100 scale by multiplying by 100.
    pub fn denormalize(self) -> Score0To100 {
        Score0To100::new(self.0 * 100.0)
    }
}

impl From<f64> for Score0To1 {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl From<Score0To1> for f64 {
    fn from(score: Score0To1) -> Self {
        score.0
    }
}
