//! # Cluster Assigner
//! k-means over the normalized batch, fitted with `linfa-clustering`.
//! Seeding is k-means++ from a seeded RNG; `restarts` independent runs are
//! made and the one with the lowest inertia is kept.
//!
//! Labels only mean something inside one run. A batch smaller than `k` is
//! rejected with [`ClusterError::TooFewSamples`]; `k` is never reduced.

use linfa::prelude::*;
use linfa_clustering::{KMeans as LinfaKMeans, KMeansInit};
use ndarray::{Array1, Array2};
use rand_xoshiro::rand_core::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;
use std::collections::HashSet;

pub const DEFAULT_CLUSTER_COUNT: usize = 5;
pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_RESTARTS: usize = 10;
pub const DEFAULT_MAX_ITERATIONS: usize = 300;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClusterError {
    #[error("cannot cluster an empty batch")]
    EmptyBatch,
    #[error("cluster count must be at least 1")]
    InvalidClusterCount,
    #[error("batch has {samples} messages, fewer than the {clusters} requested clusters")]
    TooFewSamples { samples: usize, clusters: usize },
    #[error("k-means fit failed: {0}")]
    Fit(String),
}

#[derive(Debug, Clone, Copy)]
pub struct KMeans {
    pub k: usize,
    pub seed: u64,
    pub restarts: usize,
    pub max_iterations: usize,
}

impl Default for KMeans {
    fn default() -> Self {
        Self {
            k: DEFAULT_CLUSTER_COUNT,
            seed: DEFAULT_SEED,
            restarts: DEFAULT_RESTARTS,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

/// Best partition found across all restarts.
#[derive(Debug, Clone, PartialEq)]
pub struct Clustering<const D: usize> {
    /// One label in `[0, k)` per input point, same order as the input.
    pub labels: Vec<usize>,
    pub centroids: Vec<[f64; D]>,
    pub inertia: f64,
}

impl KMeans {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_restarts(mut self, restarts: usize) -> Self {
        self.restarts = restarts;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn fit<const D: usize>(&self, points: &[[f64; D]]) -> Result<Clustering<D>, ClusterError> {
        if self.k == 0 {
            return Err(ClusterError::InvalidClusterCount);
        }
        if points.is_empty() {
            return Err(ClusterError::EmptyBatch);
        }
        if points.len() < self.k {
            return Err(ClusterError::TooFewSamples {
                samples: points.len(),
                clusters: self.k,
            });
        }

        let n = points.len();
        let data = Array2::from_shape_fn((n, D), |(i, j)| points[i][j]);
        let dataset = DatasetBase::new(data.clone(), Array1::<usize>::zeros(n));

        // k-means++ needs at least k distinct rows to draw from.
        let init = if distinct_rows(points) >= self.k {
            KMeansInit::KMeansPlusPlus
        } else {
            KMeansInit::Random
        };

        let rng = Xoshiro256Plus::seed_from_u64(self.seed);
        let model = LinfaKMeans::params_with_rng(self.k, rng)
            .init_method(init)
            .n_runs(self.restarts.max(1))
            .max_n_iterations(self.max_iterations.max(1) as u64)
            .fit(&dataset)
            .map_err(|e| ClusterError::Fit(e.to_string()))?;

        let mut assignments = Array1::<usize>::zeros(n);
        model.predict_inplace(&data, &mut assignments);

        let centroids = model
            .centroids()
            .rows()
            .into_iter()
            .map(|row| {
                let mut c = [0.0f64; D];
                for (dst, src) in c.iter_mut().zip(row.iter()) {
                    *dst = *src;
                }
                c
            })
            .collect();

        Ok(Clustering {
            labels: assignments.to_vec(),
            centroids,
            inertia: model.inertia(),
        })
    }
}

fn distinct_rows<const D: usize>(points: &[[f64; D]]) -> usize {
    points
        .iter()
        .map(|p| p.map(f64::to_bits))
        .collect::<HashSet<[u64; D]>>()
        .len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn three_blobs() -> Vec<[f64; 2]> {
        let mut pts = Vec::new();
        for (cx, cy) in [(0.0, 0.0), (10.0, 10.0), (-10.0, 10.0)] {
            for i in 0..6 {
                let o = i as f64 * 0.1;
                pts.push([cx + o, cy - o]);
            }
        }
        pts
    }

    /// True when `a` and `b` differ only by a relabeling.
    fn same_up_to_permutation(a: &[usize], b: &[usize]) -> bool {
        let mut fwd = HashMap::new();
        let mut back = HashMap::new();
        a.len() == b.len()
            && a.iter().zip(b).all(|(x, y)| {
                *fwd.entry(*x).or_insert(*y) == *y && *back.entry(*y).or_insert(*x) == *x
            })
    }

    #[test]
    fn separates_well_separated_groups() {
        let pts = three_blobs();
        let out = KMeans::new(3).fit(&pts).unwrap();
        assert_eq!(out.labels.len(), pts.len());
        assert_eq!(out.centroids.len(), 3);
        for group in out.labels.chunks(6) {
            assert!(group.iter().all(|l| *l == group[0]));
        }
        let mut distinct = out.labels.clone();
        distinct.sort();
        distinct.dedup();
        assert_eq!(distinct, vec![0, 1, 2]);
    }

    #[test]
    fn same_seed_is_reproducible() {
        let pts = three_blobs();
        let a = KMeans::new(3).with_seed(7).fit(&pts).unwrap();
        let b = KMeans::new(3).with_seed(7).fit(&pts).unwrap();
        assert_eq!(a.labels, b.labels);

        let c = KMeans::new(3).with_seed(1234).fit(&pts).unwrap();
        assert!(same_up_to_permutation(&a.labels, &c.labels));
    }

    #[test]
    fn more_clusters_than_points_is_rejected() {
        let pts = vec![[0.0, 0.0], [1.0, 1.0]];
        let err = KMeans::new(5).fit(&pts).unwrap_err();
        assert_eq!(
            err,
            ClusterError::TooFewSamples {
                samples: 2,
                clusters: 5
            }
        );
        assert_eq!(
            KMeans::new(0).fit(&pts).unwrap_err(),
            ClusterError::InvalidClusterCount
        );
        let empty: Vec<[f64; 2]> = Vec::new();
        assert_eq!(KMeans::new(1).fit(&empty).unwrap_err(), ClusterError::EmptyBatch);
    }

    #[test]
    fn k_equal_to_n_gives_every_point_its_own_cluster() {
        let pts = vec![[0.0], [5.0], [9.0]];
        let out = KMeans::new(3).fit(&pts).unwrap();
        let mut labels = out.labels.clone();
        labels.sort();
        assert_eq!(labels, vec![0, 1, 2]);
        assert!(out.inertia.abs() < 1e-9);
    }

    #[test]
    fn identical_points_still_label_every_row() {
        let pts = vec![[1.0, 1.0]; 8];
        let out = KMeans::new(3).fit(&pts).unwrap();
        assert_eq!(out.labels.len(), 8);
        assert!(out.labels.iter().all(|l| *l < 3));
        assert!(out.inertia.abs() < 1e-9);
    }

    #[test]
    fn fewer_distinct_rows_than_k_keeps_labels_in_range() {
        // two distinct vectors, five clusters
        let pts: Vec<[f64; 3]> = (0..10)
            .map(|i| if i % 2 == 0 { [0.0, 0.0, 0.0] } else { [1.0, 2.0, 3.0] })
            .collect();
        let out = KMeans::new(5).fit(&pts).unwrap();
        assert_eq!(out.labels.len(), 10);
        assert!(out.labels.iter().all(|l| *l < 5));
        assert_eq!(out.centroids.len(), 5);
        // rows with equal vectors always share a label
        assert!(out.labels.iter().step_by(2).all(|l| *l == out.labels[0]));
        assert!(out.labels.iter().skip(1).step_by(2).all(|l| *l == out.labels[1]));
    }

    #[test]
    fn single_iteration_cap_still_labels_every_row() {
        let pts = three_blobs();
        let out = KMeans::new(3)
            .with_max_iterations(1)
            .with_restarts(1)
            .fit(&pts)
            .unwrap();
        assert_eq!(out.labels.len(), pts.len());
        assert!(out.labels.iter().all(|l| *l < 3));
    }

    #[test]
    fn distinct_rows_counts_exact_duplicates_once() {
        assert_eq!(distinct_rows(&[[1.0, 2.0], [1.0, 2.0], [2.0, 1.0]]), 2);
    }
}
