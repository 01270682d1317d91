//! Batch-local standard scaling (zero mean, unit variance per column).
//!
//! Zero-variance policy: a column whose values are all equal has std 0; it is
//! centered but not divided, so every value in that column becomes exactly 0.0.
//! Population standard deviation (divide by n) is used.

use crate::features::{FeatureVector, FEATURE_DIM};

pub type NormalizedVector = [f64; FEATURE_DIM];

/// Column statistics fitted on one batch. Never persisted across runs.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    pub mean: [f64; FEATURE_DIM],
    pub std: [f64; FEATURE_DIM],
}

impl StandardScaler {
    pub fn fit(rows: &[FeatureVector]) -> Self {
        let mut mean = [0.0; FEATURE_DIM];
        let mut std = [0.0; FEATURE_DIM];
        if rows.is_empty() {
            return Self { mean, std };
        }
        let n = rows.len() as f64;

        for r in rows {
            for (m, v) in mean.iter_mut().zip(r.as_array()) {
                *m += v;
            }
        }
        for m in mean.iter_mut() {
            *m /= n;
        }

        for r in rows {
            for (j, v) in r.as_array().into_iter().enumerate() {
                std[j] += (v - mean[j]).powi(2);
            }
        }
        for s in std.iter_mut() {
            *s = (*s / n).sqrt();
        }

        Self { mean, std }
    }

    pub fn transform(&self, rows: &[FeatureVector]) -> Vec<NormalizedVector> {
        rows.iter()
            .map(|r| {
                let mut out = r.as_array();
                for (j, v) in out.iter_mut().enumerate() {
                    let centered = *v - self.mean[j];
                    *v = if self.std[j] > f64::EPSILON {
                        centered / self.std[j]
                    } else {
                        0.0
                    };
                }
                out
            })
            .collect()
    }
}

/// Fit on `rows` and transform them in one go.
pub fn fit_transform(rows: &[FeatureVector]) -> Vec<NormalizedVector> {
    StandardScaler::fit(rows).transform(rows)
}
