//! Ridge-regularized least squares over normalized pillar features.
//!
//! Columns are centered before solving the normal equations
//! `(XᵀX + λI)β = Xᵀy`, so the intercept is never penalized. Missing
//! values are imputed with the column median observed during training.

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};

const PIVOT_EPSILON: f64 = 1e-12;
/// Imputed value for a column that was never observed
const UNOBSERVED_COLUMN_VALUE: f64 = 50.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RidgeRegression {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
    /// Per-column imputation values
    pub medians: Vec<f64>,
    /// Coefficient of determination on the training rows
    pub r_squared: f64,
    /// `|β × σ|` per column, normalized to sum to 1
    pub importance: Vec<f64>,
}

impl RidgeRegression {
    /// Fit on rows of optional normalized feature values.
    ///
    /// Requires more rows than columns and every row to have the same width.
    pub fn fit(rows: &[Vec<Option<f64>>], targets: &[f64], lambda: f64) -> Result<Self> {
        let width = rows.first().map_or(0, Vec::len);
        if width == 0 {
            return Err(Error::Model("no feature columns to fit".to_string()));
        }
        if rows.len() != targets.len() {
            return Err(Error::Model(format!(
                "{} rows but {} targets",
                rows.len(),
                targets.len()
            )));
        }
        if rows.len() <= width {
            return Err(Error::Model(format!(
                "need more than {} rows to fit {} features, got {}",
                width,
                width,
                rows.len()
            )));
        }
        if rows.iter().any(|r| r.len() != width) {
            return Err(Error::Model("ragged feature rows".to_string()));
        }

        let medians: Vec<f64> = (0..width)
            .map(|j| median(rows.iter().filter_map(|r| r[j]).filter(|v| v.is_finite())))
            .collect();
        let x: Vec<Vec<f64>> = rows.iter().map(|r| impute(r, &medians)).collect();

        let n = x.len() as f64;
        let x_means: Vec<f64> = (0..width)
            .map(|j| x.iter().map(|r| r[j]).sum::<f64>() / n)
            .collect();
        let y_mean = targets.iter().sum::<f64>() / n;

        // Normal equations on centered data
        let mut gram = vec![vec![0.0; width]; width];
        let mut moment = vec![0.0; width];
        for (row, &y) in x.iter().zip(targets) {
            let yc = y - y_mean;
            for i in 0..width {
                let xi = row[i] - x_means[i];
                moment[i] += xi * yc;
                for j in 0..width {
                    gram[i][j] += xi * (row[j] - x_means[j]);
                }
            }
        }
        for (i, row) in gram.iter_mut().enumerate() {
            row[i] += lambda;
        }

        let coefficients = solve(gram, moment)?;
        let intercept = y_mean
            - coefficients
                .iter()
                .zip(&x_means)
                .map(|(b, m)| b * m)
                .sum::<f64>();

        let mut model = Self {
            intercept,
            coefficients,
            medians,
            r_squared: 0.0,
            importance: Vec::new(),
        };

        let predictions: Vec<f64> = x.iter().map(|r| model.raw_predict(r)).collect();
        model.r_squared = r_squared(&predictions, targets, y_mean);
        model.importance = importance(&model.coefficients, &x, &x_means);
        Ok(model)
    }

    /// Predict a score for one row, clamped to `[0, 100]`
    pub fn predict(&self, row: &[Option<f64>]) -> f64 {
        let value = self.raw_predict(&impute(row, &self.medians));
        if value.is_finite() {
            value.clamp(0.0, 100.0)
        } else {
            0.0
        }
    }

    pub fn width(&self) -> usize {
        self.coefficients.len()
    }

    fn raw_predict(&self, row: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(row)
                .map(|(b, x)| b * x)
                .sum::<f64>()
    }
}

fn impute(row: &[Option<f64>], medians: &[f64]) -> Vec<f64> {
    medians
        .iter()
        .enumerate()
        .map(|(j, m)| {
            row.get(j)
                .copied()
                .flatten()
                .filter(|v| v.is_finite())
                .unwrap_or(*m)
        })
        .collect()
}

fn median(values: impl Iterator<Item = f64>) -> f64 {
    let mut sorted: Vec<f64> = values.collect();
    if sorted.is_empty() {
        return UNOBSERVED_COLUMN_VALUE;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Gaussian elimination with partial pivoting
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);
        if a[pivot_row][col].abs() < PIVOT_EPSILON {
            return Err(Error::Model(
                "singular design matrix; increase ridge_lambda or add training rows".to_string(),
            ));
        }
        a.swap(col, pivot_row);
        b.swap(col, pivot_row);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Ok(x)
}

fn r_squared(predictions: &[f64], targets: &[f64], y_mean: f64) -> f64 {
    let ss_tot: f64 = targets.iter().map(|y| (y - y_mean).powi(2)).sum();
    let ss_res: f64 = predictions
        .iter()
        .zip(targets)
        .map(|(p, y)| (y - p).powi(2))
        .sum();
    if ss_tot <= f64::EPSILON {
        return if ss_res <= f64::EPSILON { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

fn importance(coefficients: &[f64], x: &[Vec<f64>], means: &[f64]) -> Vec<f64> {
    let n = x.len() as f64;
    let raw: Vec<f64> = coefficients
        .iter()
        .enumerate()
        .map(|(j, b)| {
            let variance = x.iter().map(|r| (r[j] - means[j]).powi(2)).sum::<f64>() / n;
            (b * variance.sqrt()).abs()
        })
        .collect();
    let total: f64 = raw.iter().sum();
    if total <= f64::EPSILON {
        return vec![1.0 / raw.len() as f64; raw.len()];
    }
    raw.into_iter().map(|v| v / total).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_rows() -> (Vec<Vec<Option<f64>>>, Vec<f64>) {
        // y = 10 + 0.5 a + 0.3 b
        let points = [
            (10.0, 20.0),
            (20.0, 10.0),
            (30.0, 50.0),
            (40.0, 30.0),
            (50.0, 70.0),
            (60.0, 40.0),
            (70.0, 90.0),
            (80.0, 60.0),
        ];
        let rows = points.iter().map(|(a, b)| vec![Some(*a), Some(*b)]).collect();
        let targets = points.iter().map(|(a, b)| 10.0 + 0.5 * a + 0.3 * b).collect();
        (rows, targets)
    }

    #[test]
    fn test_recovers_linear_relationship() {
        let (rows, targets) = linear_rows();
        let model = RidgeRegression::fit(&rows, &targets, 0.0).unwrap();
        assert!((model.coefficients[0] - 0.5).abs() < 1e-6);
        assert!((model.coefficients[1] - 0.3).abs() < 1e-6);
        assert!((model.intercept - 10.0).abs() < 1e-6);
        assert!((model.r_squared - 1.0).abs() < 1e-9);
        assert!((model.importance.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_values_use_training_median() {
        let (mut rows, targets) = linear_rows();
        rows[0][1] = None;
        let model = RidgeRegression::fit(&rows, &targets, 1e-3).unwrap();
        // Median of the seven observed b values
        assert_eq!(model.medians[1], 50.0);

        let full = model.predict(&[Some(40.0), Some(50.0)]);
        let imputed = model.predict(&[Some(40.0), None]);
        assert!((full - imputed).abs() < 1e-9);
    }

    #[test]
    fn test_too_few_rows_is_error() {
        let rows = vec![vec![Some(1.0), Some(2.0)], vec![Some(3.0), Some(4.0)]];
        assert!(RidgeRegression::fit(&rows, &[1.0, 2.0], 0.0).is_err());
    }

    #[test]
    fn test_constant_column_needs_ridge() {
        let rows: Vec<Vec<Option<f64>>> =
            (0..5).map(|i| vec![Some(i as f64 * 10.0), Some(7.0)]).collect();
        let targets: Vec<f64> = (0..5).map(|i| i as f64 * 5.0).collect();

        assert!(RidgeRegression::fit(&rows, &targets, 0.0).is_err());
        let model = RidgeRegression::fit(&rows, &targets, 1e-3).unwrap();
        assert!(model.coefficients[1].abs() < 1e-9);
    }

    #[test]
    fn test_predictions_are_clamped() {
        let (rows, targets) = linear_rows();
        let model = RidgeRegression::fit(&rows, &targets, 0.0).unwrap();
        assert_eq!(model.predict(&[Some(1_000.0), Some(1_000.0)]), 100.0);
    }
}
