//! Unsupervised partitioning of the encoded catalog.
//!
//! The algorithm sits behind [`Clusterer`] so the cluster-count selection and
//! recommendation logic never depend on a particular optimizer.

pub mod elbow;
pub mod kmeans;

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::encoding::{FeatureMatrix, Vocabulary};
use crate::errors::DomainError;

pub use elbow::{locate_elbow, select_k, ClusterCountSelector, ElbowPoint, KSelection, DEFAULT_MAX_K};
pub use kmeans::{KMeansClusterer, KMeansParams};

pub const DEFAULT_SEED: u64 = 29;

/// A fitted partition of the feature matrix.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClusterModel {
    pub k: usize,
    /// One cluster id in `0..k` per matrix row.
    pub assignments: Vec<usize>,
    pub centroids: Vec<Vec<f64>>,
    /// Sum of squared distances from every row to its assigned centroid.
    pub inertia: f64,
    pub iterations: usize,
}

impl ClusterModel {
    pub fn cluster_of(&self, row: usize) -> Option<usize> {
        self.assignments.get(row).copied()
    }

    /// Row indices belonging to `cluster`, ascending.
    pub fn members(&self, cluster: usize) -> Vec<usize> {
        self.assignments
            .iter()
            .enumerate()
            .filter_map(|(row, assigned)| (*assigned == cluster).then_some(row))
            .collect()
    }

    /// Members per cluster id. Assignments outside `0..k` are not counted;
    /// [`ClusterModel::validate`] rejects them.
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.k];
        for assigned in &self.assignments {
            if let Some(size) = sizes.get_mut(*assigned) {
                *size += 1;
            }
        }
        sizes
    }

    /// Checks the model against the matrix it claims to describe: one
    /// assignment per row and every id inside `0..k`.
    pub fn validate(&self, n_rows: usize) -> Result<(), DomainError> {
        if self.assignments.len() != n_rows {
            return Err(DomainError::InvalidArgument(format!(
                "cluster model covers {} rows but the catalog has {n_rows}",
                self.assignments.len()
            )));
        }
        if let Some((row, assigned)) = self.assignments.iter().enumerate().find(|(_, assigned)| **assigned >= self.k) {
            return Err(DomainError::InvalidArgument(format!(
                "row {row} is assigned to cluster {assigned}, outside 0..{}",
                self.k
            )));
        }
        Ok(())
    }

    /// Partition as a set of member lists, ordered by smallest member. Two models
    /// describe the same partition when these are equal, whatever their ids.
    pub fn partition(&self) -> Vec<Vec<usize>> {
        let mut groups: Vec<Vec<usize>> =
            (0..self.k).map(|cluster| self.members(cluster)).filter(|members| !members.is_empty()).collect();
        groups.sort();
        groups
    }

    /// Vocabulary tokens with the highest centroid weight for `cluster`.
    pub fn top_tokens<'a>(&self, cluster: usize, vocabulary: &'a Vocabulary, limit: usize) -> Vec<(&'a str, f64)> {
        let Some(centroid) = self.centroids.get(cluster) else {
            return Vec::new();
        };
        let mut weighted: Vec<(&str, f64)> = vocabulary
            .tokens()
            .iter()
            .zip(centroid.iter())
            .filter(|(_, weight)| **weight > 0.0)
            .map(|(token, weight)| (token.as_str(), *weight))
            .collect();
        weighted.sort_by(|left, right| right.1.total_cmp(&left.1).then_with(|| left.0.cmp(right.0)));
        weighted.truncate(limit);
        weighted
    }
}

/// Wall-clock limit shared by every fit of one phase.
#[derive(Clone, Copy, Debug)]
pub struct Deadline {
    at: Instant,
    budget: Duration,
    phase: &'static str,
}

impl Deadline {
    /// Starts counting now. Returns `None` when the budget is too large to
    /// represent as an instant, which is the same as no limit.
    pub fn after(budget: Duration, phase: &'static str) -> Option<Self> {
        Instant::now().checked_add(budget).map(|at| Self { at, budget, phase })
    }

    pub fn check(&self) -> Result<(), DomainError> {
        if Instant::now() >= self.at {
            return Err(DomainError::BudgetExhausted {
                phase: self.phase,
                budget_ms: u64::try_from(self.budget.as_millis()).unwrap_or(u64::MAX),
            });
        }
        Ok(())
    }
}

pub trait Clusterer: Send + Sync {
    fn fit(&self, matrix: &FeatureMatrix, k: usize, seed: u64) -> Result<ClusterModel, DomainError>;

    /// Fits under `deadline`. Implementations that cannot stop mid-fit still
    /// report a fit finishing past the deadline as exhausted.
    fn fit_until(
        &self,
        matrix: &FeatureMatrix,
        k: usize,
        seed: u64,
        deadline: &Deadline,
    ) -> Result<ClusterModel, DomainError> {
        deadline.check()?;
        let model = self.fit(matrix, k, seed)?;
        deadline.check()?;
        Ok(model)
    }
}

/// Fits the default k-means configuration.
pub fn cluster(matrix: &FeatureMatrix, k: usize, seed: u64) -> Result<ClusterModel, DomainError> {
    KMeansClusterer::default().fit(matrix, k, seed)
}

pub(crate) fn validate_cluster_count(matrix: &FeatureMatrix, k: usize) -> Result<(), DomainError> {
    if matrix.is_empty() {
        return Err(DomainError::InvalidArgument("cannot cluster an empty catalog".to_owned()));
    }
    if k == 0 {
        return Err(DomainError::InvalidArgument("cluster count k must be a positive integer".to_owned()));
    }
    if k > matrix.n_rows() {
        return Err(DomainError::InvalidArgument(format!(
            "cluster count k={k} exceeds the catalog size of {}",
            matrix.n_rows()
        )));
    }
    Ok(())
}
