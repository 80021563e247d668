use crate::core::{CompositeScore, PillarScore, Score0To100};

/// Mean of `values` weighted by `weights`, or the plain mean when every
/// weight is zero. `None` for empty input.
pub fn confidence_weighted_mean(values: &[(f64, f64)]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let total_weight: f64 = values.iter().map(|(_, w)| w.max(0.0)).sum();
    if total_weight > 0.0 {
        Some(values.iter().map(|(v, w)| v * w.max(0.0)).sum::<f64>() / total_weight)
    } else {
        Some(values.iter().map(|(v, _)| v).sum::<f64>() / values.len() as f64)
    }
}

/// Symmetric interval around `score` shrinking linearly with confidence
pub fn confidence_interval(score: f64, confidence: f64, max_margin: f64) -> [f64; 2] {
    let margin = (100.0 - confidence.clamp(0.0, 100.0)) / 100.0 * max_margin;
    [
        (score - margin).clamp(0.0, 100.0),
        (score + margin).clamp(0.0, 100.0),
    ]
}

/// Composite of the three pillar scores.
///
/// Score is the confidence-weighted mean of the pillars; confidence is the
/// plain mean of pillar confidences.
pub fn composite(pillars: &[PillarScore], max_margin: f64) -> CompositeScore {
    let weighted: Vec<(f64, f64)> = pillars
        .iter()
        .map(|p| (p.score.value(), p.confidence.value()))
        .collect();
    let score = confidence_weighted_mean(&weighted).unwrap_or(0.0);
    let confidence = if pillars.is_empty() {
        0.0
    } else {
        pillars.iter().map(|p| p.confidence.value()).sum::<f64>() / pillars.len() as f64
    };
    composite_from(score, confidence, max_margin)
}

/// Build a composite from an already aggregated score and confidence
pub fn composite_from(score: f64, confidence: f64, max_margin: f64) -> CompositeScore {
    let score = Score0To100::new(score);
    let confidence = Score0To100::new(confidence);
    CompositeScore {
        score,
        confidence,
        confidence_interval: confidence_interval(score.value(), confidence.value(), max_margin),
    }
}
