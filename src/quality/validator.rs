//! Five-dimension quality scoring of provider bundles.
//!
//! A provider bundle is the raw document a data provider delivers for one
//! entity, e.g.
//!
//! ```json
//! {
//!   "entity_id": "company-42",
//!   "provider": "alpha",
//!   "timestamp": "2026-09-30T00:00:00Z",
//!   "confidence": 85,
//!   "esg_scores": {"environmental": 71, "social": 64, "governance": 80, "combined": 72}
//! }
//! ```
//!
//! Each dimension starts at 1.0 and loses points per problem found. The
//! overall score is the weighted sum of the dimensions on a 0-100 scale.

use super::report::{
    threshold_for, DimensionScores, IssueSeverity, QualityDimension, QualityIssue, QualityLevel,
    QualityReport,
};
use crate::config::QualityConfig;
use crate::core::Score0To1;
use crate::features::schema::json_type_name;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

/// Top-level fields every bundle must carry
pub const REQUIRED_FIELDS: &[&str] = &["entity_id", "provider", "timestamp", "esg_scores"];

/// Fields expected inside `esg_scores`
pub const SUB_SCORE_FIELDS: &[&str] = &["environmental", "social", "governance", "combined"];

const SCORES_KEY: &str = "esg_scores";

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.:\-]{0,127}$").expect("identifier pattern is valid")
});

const OUT_OF_RANGE_PENALTY: f64 = 0.1;
const COMBINED_MISMATCH_PENALTY: f64 = 0.15;
const LOW_CONFIDENCE_PENALTY: f64 = 0.1;

const MISSING_PROVIDER_PENALTY: f64 = 0.2;
const MALFORMED_TIMESTAMP_PENALTY: f64 = 0.2;
const SCORES_NOT_OBJECT_PENALTY: f64 = 0.3;
const SUB_SCORE_TYPE_PENALTY: f64 = 0.1;
const METRICS_NOT_ARRAY_PENALTY: f64 = 0.2;
const MALFORMED_LAST_UPDATED_PENALTY: f64 = 0.1;

const MISSING_REQUIRED_PENALTY: f64 = 0.1;
const MALFORMED_ID_PENALTY: f64 = 0.2;
const ERROR_MARKER_PENALTY: f64 = 0.5;
const MOCK_PENALTY: f64 = 0.3;

/// Accumulates one dimension's score and the issues behind its penalties
struct DimensionCheck {
    dimension: QualityDimension,
    score: Score0To1,
    issues: Vec<QualityIssue>,
}

impl DimensionCheck {
    fn new(dimension: QualityDimension) -> Self {
        Self {
            dimension,
            score: Score0To1::ONE,
            issues: Vec::new(),
        }
    }

    fn penalize(&mut self, amount: f64, severity: IssueSeverity, message: impl Into<String>) {
        self.score = self.score.penalize(amount);
        self.issues
            .push(QualityIssue::new(self.dimension, severity, message));
    }
}

#[derive(Debug, Clone, Default)]
pub struct DataQualityValidator {
    config: QualityConfig,
}

impl DataQualityValidator {
    pub fn new(config: QualityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    /// Validate a bundle against the current time
    pub fn validate(&self, bundle: &Value) -> QualityReport {
        self.validate_at(bundle, Utc::now())
    }

    /// Validate a bundle as of `now`
    pub fn validate_at(&self, bundle: &Value, now: DateTime<Utc>) -> QualityReport {
        let empty = Map::new();
        let doc = bundle.as_object().unwrap_or(&empty);

        let checks = [
            self.check_completeness(doc),
            self.check_accuracy(doc),
            self.check_consistency(doc, bundle.is_object()),
            self.check_timeliness(doc, now),
            self.check_validity(doc),
        ];

        let dimension_scores = DimensionScores {
            completeness: checks[0].score,
            accuracy: checks[1].score,
            consistency: checks[2].score,
            timeliness: checks[3].score,
            validity: checks[4].score,
        };

        let overall_score = dimension_scores.weighted_overall(&self.config.weights);
        let level = QualityLevel::from_score(overall_score.value(), &self.config.levels);
        let failing = dimension_scores.failing(&self.config.thresholds);
        let recommendations = failing
            .iter()
            .map(|d| self.recommendation(*d, dimension_scores.get(*d)))
            .collect();

        let report = QualityReport {
            entity_id: non_empty_str(doc.get("entity_id")).map(str::to_string),
            provider: non_empty_str(doc.get("provider")).map(str::to_string),
            dimension_scores,
            overall_score,
            level,
            is_valid: failing.is_empty(),
            issues: checks.into_iter().flat_map(|c| c.issues).collect(),
            recommendations,
            assessed_at: now,
        };

        if !report.is_valid {
            tracing::debug!(
                entity = report.entity_id.as_deref().unwrap_or("<unknown>"),
                overall = report.overall_score.value(),
                "Quality below threshold on {} dimension(s)",
                failing.len()
            );
        }

        report
    }

    /// Fraction of required and expected sub-score fields that are non-null
    fn check_completeness(&self, doc: &Map<String, Value>) -> DimensionCheck {
        let mut check = DimensionCheck::new(QualityDimension::Completeness);
        let scores = doc.get(SCORES_KEY).and_then(Value::as_object);
        let total = REQUIRED_FIELDS.len() + SUB_SCORE_FIELDS.len();

        let mut missing: Vec<String> = REQUIRED_FIELDS
            .iter()
            .filter(|f| is_null_or_absent(doc.get(**f)))
            .map(|f| f.to_string())
            .collect();
        missing.extend(
            SUB_SCORE_FIELDS
                .iter()
                .filter(|f| is_null_or_absent(scores.and_then(|s| s.get(**f))))
                .map(|f| format!("{}.{}", SCORES_KEY, f)),
        );

        let present = total - missing.len();
        check.score = Score0To1::new(present as f64 / total as f64);
        if !missing.is_empty() {
            let severity = if missing.len() * 2 >= total {
                IssueSeverity::High
            } else {
                IssueSeverity::Medium
            };
            check.issues.push(QualityIssue::new(
                QualityDimension::Completeness,
                severity,
                format!("Missing fields: {}", missing.join(", ")),
            ));
        }
        check
    }

    fn check_accuracy(&self, doc: &Map<String, Value>) -> DimensionCheck {
        let mut check = DimensionCheck::new(QualityDimension::Accuracy);
        let scores = doc.get(SCORES_KEY).and_then(Value::as_object);

        let value_of = |field: &str| scores.and_then(|s| s.get(field)).and_then(Value::as_f64);

        for field in SUB_SCORE_FIELDS {
            if let Some(v) = value_of(field) {
                if !(0.0..=100.0).contains(&v) {
                    check.penalize(
                        OUT_OF_RANGE_PENALTY,
                        IssueSeverity::High,
                        format!("{} score {} is outside [0, 100]", field, v),
                    );
                }
            }
        }

        if let (Some(e), Some(s), Some(g), Some(combined)) = (
            value_of("environmental"),
            value_of("social"),
            value_of("governance"),
            value_of("combined"),
        ) {
            let mean = (e + s + g) / 3.0;
            if (combined - mean).abs() > self.config.combined_tolerance {
                check.penalize(
                    COMBINED_MISMATCH_PENALTY,
                    IssueSeverity::Medium,
                    format!(
                        "combined score {:.1} deviates from pillar mean {:.1} by more than {}",
                        combined, mean, self.config.combined_tolerance
                    ),
                );
            }
        }

        let confidence = doc
            .get("confidence")
            .and_then(Value::as_f64)
            .or_else(|| scores.and_then(|s| s.get("confidence")).and_then(Value::as_f64));
        if let Some(c) = confidence {
            if c < self.config.min_provider_confidence {
                check.penalize(
                    LOW_CONFIDENCE_PENALTY,
                    IssueSeverity::Low,
                    format!(
                        "provider confidence {} is below {}",
                        c, self.config.min_provider_confidence
                    ),
                );
            }
        }

        check
    }

    fn check_consistency(&self, doc: &Map<String, Value>, is_object: bool) -> DimensionCheck {
        let mut check = DimensionCheck::new(QualityDimension::Consistency);

        if !is_object {
            check.penalize(1.0, IssueSeverity::Critical, "bundle is not a JSON object");
            return check;
        }

        if non_empty_str(doc.get("provider")).is_none() {
            check.penalize(
                MISSING_PROVIDER_PENALTY,
                IssueSeverity::Medium,
                "missing provider tag",
            );
        }

        if let Some(ts) = doc.get("timestamp").filter(|v| !v.is_null()) {
            if parse_timestamp(ts).is_none() {
                check.penalize(
                    MALFORMED_TIMESTAMP_PENALTY,
                    IssueSeverity::Medium,
                    format!("malformed timestamp {}", ts),
                );
            }
        }

        match doc.get(SCORES_KEY) {
            Some(Value::Object(scores)) => {
                for field in SUB_SCORE_FIELDS {
                    if let Some(v) = scores.get(*field) {
                        if !v.is_null() && !v.is_number() {
                            check.penalize(
                                SUB_SCORE_TYPE_PENALTY,
                                IssueSeverity::Medium,
                                format!(
                                    "{}.{} should be a number, got {}",
                                    SCORES_KEY,
                                    field,
                                    json_type_name(v)
                                ),
                            );
                        }
                    }
                }
            }
            Some(Value::Null) | None => {}
            Some(other) => check.penalize(
                SCORES_NOT_OBJECT_PENALTY,
                IssueSeverity::High,
                format!("{} should be an object, got {}", SCORES_KEY, json_type_name(other)),
            ),
        }

        if let Some(metrics) = doc.get("metrics").filter(|v| !v.is_null()) {
            if !metrics.is_array() {
                check.penalize(
                    METRICS_NOT_ARRAY_PENALTY,
                    IssueSeverity::Medium,
                    format!("metrics should be an array, got {}", json_type_name(metrics)),
                );
            }
        }

        if let Some(updated) = last_updated(doc) {
            if parse_timestamp(updated).is_none() {
                check.penalize(
                    MALFORMED_LAST_UPDATED_PENALTY,
                    IssueSeverity::Low,
                    format!("malformed last_updated {}", updated),
                );
            }
        }

        check
    }

    fn check_timeliness(&self, doc: &Map<String, Value>, now: DateTime<Utc>) -> DimensionCheck {
        let mut check = DimensionCheck::new(QualityDimension::Timeliness);

        match doc.get("timestamp").and_then(parse_timestamp) {
            Some(ts) => {
                let penalty = self.age_penalty(ts, now);
                if penalty > 0.0 {
                    check.penalize(
                        penalty,
                        age_severity(penalty, self.config.max_timeliness_penalty),
                        format!(
                            "observation is {} days old (freshness window {} days)",
                            (now - ts).num_days(),
                            self.config.freshness_days
                        ),
                    );
                }
            }
            None => check.penalize(
                self.config.max_timeliness_penalty,
                IssueSeverity::Medium,
                "observation age unknown",
            ),
        }

        if let Some(updated) = last_updated(doc).and_then(parse_timestamp) {
            let penalty = self.age_penalty(updated, now);
            if penalty > 0.0 {
                check.penalize(
                    penalty,
                    age_severity(penalty, self.config.max_timeliness_penalty),
                    format!("last_updated is {} days old", (now - updated).num_days()),
                );
            }
        }

        check
    }

    /// Linear penalty past the freshness window, capped per check
    fn age_penalty(&self, ts: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        let age_days = (now - ts).num_seconds() as f64 / 86_400.0;
        let overdue = age_days - self.config.freshness_days as f64;
        if overdue <= 0.0 {
            return 0.0;
        }
        (overdue / self.config.decay_days as f64 * self.config.max_timeliness_penalty)
            .min(self.config.max_timeliness_penalty)
    }

    fn check_validity(&self, doc: &Map<String, Value>) -> DimensionCheck {
        let mut check = DimensionCheck::new(QualityDimension::Validity);

        for field in REQUIRED_FIELDS {
            if is_null_or_absent(doc.get(*field)) {
                check.penalize(
                    MISSING_REQUIRED_PENALTY,
                    IssueSeverity::Medium,
                    format!("required field {} is missing", field),
                );
            }
        }

        if let Some(id) = doc.get("entity_id").filter(|v| !v.is_null()) {
            let valid = id.as_str().is_some_and(|s| IDENTIFIER.is_match(s));
            if !valid {
                check.penalize(
                    MALFORMED_ID_PENALTY,
                    IssueSeverity::High,
                    format!("malformed entity identifier {}", id),
                );
            }
        }

        if has_error_marker(doc) {
            check.penalize(
                ERROR_MARKER_PENALTY,
                IssueSeverity::Critical,
                "bundle carries an explicit error marker",
            );
        }

        if doc.get("is_mock").and_then(Value::as_bool).unwrap_or(false) {
            check.penalize(MOCK_PENALTY, IssueSeverity::High, "bundle is flagged as mock data");
        }

        check
    }

    fn recommendation(&self, dimension: QualityDimension, score: Score0To1) -> String {
        let threshold = threshold_for(&self.config.thresholds, dimension);
        let action = match dimension {
            QualityDimension::Completeness => {
                "Request the missing fields from the provider or add a second source"
            }
            QualityDimension::Accuracy => {
                "Cross-check out-of-range or inconsistent scores with another provider"
            }
            QualityDimension::Consistency => {
                "Fix provider tagging, timestamp format and nested field types at ingestion"
            }
            QualityDimension::Timeliness => "Refresh the data; it is past the freshness window",
            QualityDimension::Validity => {
                "Exclude mock or errored bundles and correct malformed identifiers"
            }
        };
        format!(
            "{} ({} {:.2} < {:.2})",
            action,
            dimension,
            score.value(),
            threshold
        )
    }
}

fn is_null_or_absent(value: Option<&Value>) -> bool {
    value.map_or(true, Value::is_null)
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn last_updated(doc: &Map<String, Value>) -> Option<&Value> {
    doc.get("last_updated")
        .or_else(|| {
            doc.get(SCORES_KEY)
                .and_then(Value::as_object)
                .and_then(|s| s.get("last_updated"))
        })
        .filter(|v| !v.is_null())
}

fn has_error_marker(doc: &Map<String, Value>) -> bool {
    match doc.get("error") {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

fn age_severity(penalty: f64, cap: f64) -> IssueSeverity {
    if penalty >= cap {
        IssueSeverity::High
    } else if penalty >= cap / 2.0 {
        IssueSeverity::Medium
    } else {
        IssueSeverity::Low
    }
}

/// Parse RFC 3339, `YYYY-MM-DDTHH:MM:SS`, `YYYY-MM-DD` or epoch seconds
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
                return Some(Utc.from_utc_datetime(&naive));
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| Utc.from_utc_datetime(&naive))
        }
        Value::Number(n) => n.as_i64().and_then(|secs| DateTime::from_timestamp(secs, 0)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap()
    }

    fn clean_bundle() -> Value {
        json!({
            "entity_id": "company-42",
            "provider": "alpha",
            "timestamp": "2026-09-15T00:00:00Z",
            "confidence": 88,
            "esg_scores": {"environmental": 70, "social": 60, "governance": 80, "combined": 70}
        })
    }

    #[test]
    fn test_clean_bundle_is_excellent_and_valid() {
        let report = DataQualityValidator::default().validate_at(&clean_bundle(), now());
        assert!((report.overall_score.value() - 100.0).abs() < 1e-9);
        assert_eq!(report.level, QualityLevel::Excellent);
        assert!(report.is_valid);
        assert!(report.issues.is_empty());
        assert!(report.recommendations.is_empty());
        assert_eq!(report.entity_id.as_deref(), Some("company-42"));
    }

    #[test]
    fn test_completeness_counts_sub_scores() {
        let mut bundle = clean_bundle();
        bundle["esg_scores"]["social"] = Value::Null;
        bundle["esg_scores"]
            .as_object_mut()
            .unwrap()
            .remove("combined");

        let report = DataQualityValidator::default().validate_at(&bundle, now());
        assert!((report.dimension_scores.completeness.value() - 6.0 / 8.0).abs() < 1e-12);
        assert!(!report.is_valid);
    }

    #[test]
    fn test_accuracy_penalties_accumulate() {
        let bundle = json!({
            "entity_id": "company-42",
            "provider": "alpha",
            "timestamp": "2026-09-15",
            "confidence": 55,
            "esg_scores": {"environmental": 120, "social": 60, "governance": 80, "combined": 70}
        });
        let report = DataQualityValidator::default().validate_at(&bundle, now());
        // out of range (0.1), combined vs mean 86.7 (0.15), low confidence (0.1)
        assert!((report.dimension_scores.accuracy.value() - 0.65).abs() < 1e-9);
        assert_eq!(report.issues_for(QualityDimension::Accuracy).count(), 3);
    }

    #[test]
    fn test_combined_within_tolerance_not_penalized() {
        let mut bundle = clean_bundle();
        bundle["esg_scores"]["combined"] = json!(74.9);
        let report = DataQualityValidator::default().validate_at(&bundle, now());
        assert_eq!(report.dimension_scores.accuracy.value(), 1.0);
    }

    #[test]
    fn test_consistency_detects_structural_problems() {
        let bundle = json!({
            "entity_id": "company-42",
            "timestamp": "last tuesday",
            "esg_scores": [70, 60, 80],
            "metrics": {"carbon": 1}
        });
        let report = DataQualityValidator::default().validate_at(&bundle, now());
        // provider 0.2 + timestamp 0.2 + esg_scores 0.3 + metrics 0.2
        assert!((report.dimension_scores.consistency.value() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_timeliness_linear_decay_and_cap() {
        let validator = DataQualityValidator::default();

        // 90 + 73 days old: 73/365 * 0.5 = 0.1
        let mut bundle = clean_bundle();
        bundle["timestamp"] = json!("2026-04-21T00:00:00Z");
        let report = validator.validate_at(&bundle, now());
        assert!((report.dimension_scores.timeliness.value() - 0.9).abs() < 1e-9);

        // Years old: capped at 0.5
        bundle["timestamp"] = json!("2019-01-01T00:00:00Z");
        let report = validator.validate_at(&bundle, now());
        assert!((report.dimension_scores.timeliness.value() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_last_updated_is_independent_check() {
        let mut bundle = clean_bundle();
        bundle["timestamp"] = json!("2019-01-01T00:00:00Z");
        bundle["last_updated"] = json!("2019-01-01T00:00:00Z");
        let report = DataQualityValidator::default().validate_at(&bundle, now());
        assert_eq!(report.dimension_scores.timeliness.value(), 0.0);
    }

    #[test]
    fn test_validity_flags_mock_and_errors() {
        let mut bundle = clean_bundle();
        bundle["is_mock"] = json!(true);
        bundle["error"] = json!("upstream timeout");
        bundle["entity_id"] = json!("bad id with spaces");
        let report = DataQualityValidator::default().validate_at(&bundle, now());
        // 1.0 - 0.3 - 0.5 - 0.2
        assert!(report.dimension_scores.validity.value().abs() < 1e-9);
        assert!(!report.is_valid);
        assert!(report
            .recommendations
            .iter()
            .any(|r| r.contains("validity")));
    }

    #[test]
    fn test_non_object_bundle() {
        let report = DataQualityValidator::default().validate_at(&json!([1, 2, 3]), now());
        assert_eq!(report.dimension_scores.completeness.value(), 0.0);
        assert_eq!(report.dimension_scores.consistency.value(), 0.0);
        assert_eq!(report.level, QualityLevel::Unacceptable);
    }

    #[test]
    fn test_overall_is_weighted_sum() {
        let mut bundle = clean_bundle();
        bundle["provider"] = Value::Null;
        bundle["timestamp"] = json!("2025-01-01");
        let report = DataQualityValidator::default().validate_at(&bundle, now());
        let d = report.dimension_scores;
        let expected = (d.completeness.value() * 0.25
            + d.accuracy.value() * 0.30
            + d.consistency.value() * 0.20
            + d.timeliness.value() * 0.15
            + d.validity.value() * 0.10)
            * 100.0;
        assert!((report.overall_score.value() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp(&json!("2026-01-02T03:04:05Z")).is_some());
        assert!(parse_timestamp(&json!("2026-01-02T03:04:05")).is_some());
        assert!(parse_timestamp(&json!("2026-01-02")).is_some());
        assert!(parse_timestamp(&json!(1_767_225_600)).is_some());
        assert!(parse_timestamp(&json!("02/01/2026")).is_none());
        assert!(parse_timestamp(&json!(true)).is_none());
    }
}
