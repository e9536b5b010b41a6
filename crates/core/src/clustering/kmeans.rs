//! Lloyd's k-means with random initialization and seeded restarts.
//!
//! Each restart samples `k` distinct rows as initial centroids from a single
//! ChaCha8 stream seeded once per fit, so a fixed seed, parameter set and
//! matrix always reproduce the same model.

use std::time::{Duration, Instant};

use rand::seq::index;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use super::{validate_cluster_count, ClusterModel, Clusterer, Deadline};
use crate::encoding::FeatureMatrix;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KMeansParams {
    /// Independent random initializations; the lowest-inertia run wins.
    pub n_init: usize,
    pub max_iter: usize,
    /// Relative tolerance, scaled by the mean per-feature variance of the data.
    pub tolerance: f64,
    /// Wall-clock budget for one fit across all restarts.
    pub time_budget: Option<Duration>,
}

impl Default for KMeansParams {
    fn default() -> Self {
        Self { n_init: 10, max_iter: 100, tolerance: 1e-4, time_budget: None }
    }
}

impl KMeansParams {
    /// Settings used while scanning candidate cluster counts.
    pub fn for_elbow() -> Self {
        Self { max_iter: 300, ..Self::default() }
    }
}

#[derive(Clone, Debug, Default)]
pub struct KMeansClusterer {
    params: KMeansParams,
}

impl KMeansClusterer {
    pub fn new(params: KMeansParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &KMeansParams {
        &self.params
    }

    fn own_deadline(&self) -> Option<Deadline> {
        self.params.time_budget.and_then(|budget| Deadline::after(budget, "clustering"))
    }

    fn run_lloyd(
        &self,
        points: &[Vec<f64>],
        mut centroids: Vec<Vec<f64>>,
        tolerance: f64,
        deadlines: &[Deadline],
    ) -> Result<ClusterModel, DomainError> {
        let k = centroids.len();
        let mut labels: Option<Vec<usize>> = None;
        let mut iterations = 0;

        for iteration in 1..=self.params.max_iter.max(1) {
            check_all(deadlines)?;
            iterations = iteration;

            let (next_labels, _) = assign(points, &centroids);
            if labels.as_ref() == Some(&next_labels) {
                break;
            }

            let updated = update_centroids(points, &next_labels, &centroids);
            let shift: f64 = centroids.iter().zip(&updated).map(|(old, new)| squared_distance(old, new)).sum();
            centroids = updated;
            labels = Some(next_labels);

            if shift <= tolerance {
                break;
            }
        }

        // Final pass so labels always agree with the returned centroids.
        let (assignments, inertia) = assign(points, &centroids);
        Ok(ClusterModel { k, assignments, centroids, inertia, iterations })
    }

    fn fit_within(
        &self,
        matrix: &FeatureMatrix,
        k: usize,
        seed: u64,
        outer: Option<&Deadline>,
    ) -> Result<ClusterModel, DomainError> {
        validate_cluster_count(matrix, k)?;

        let started = Instant::now();
        let deadlines: Vec<Deadline> = self.own_deadline().into_iter().chain(outer.copied()).collect();
        let points: Vec<Vec<f64>> = matrix.rows().map(|row| row.iter().map(|value| f64::from(*value)).collect()).collect();
        let tolerance = scaled_tolerance(&points, self.params.tolerance);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut best: Option<ClusterModel> = None;

        for restart in 0..self.params.n_init.max(1) {
            check_all(&deadlines)?;
            let initial: Vec<Vec<f64>> =
                index::sample(&mut rng, points.len(), k).into_iter().map(|row| points[row].clone()).collect();
            let candidate = self.run_lloyd(&points, initial, tolerance, &deadlines)?;
            debug!(
                event_name = "clustering.kmeans.restart_completed",
                k,
                restart,
                inertia = candidate.inertia,
                iterations = candidate.iterations,
                "k-means restart completed"
            );

            if best.as_ref().map_or(true, |current| candidate.inertia < current.inertia) {
                best = Some(candidate);
            }
        }

        let model = best.ok_or_else(|| DomainError::InvalidArgument("k-means ran no restarts".to_owned()))?;
        debug!(
            event_name = "clustering.kmeans.fit_completed",
            k,
            seed,
            inertia = model.inertia,
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "k-means fit completed"
        );
        Ok(model)
    }
}

impl Clusterer for KMeansClusterer {
    fn fit(&self, matrix: &FeatureMatrix, k: usize, seed: u64) -> Result<ClusterModel, DomainError> {
        self.fit_within(matrix, k, seed, None)
    }

    /// Checks `deadline` before every restart and every Lloyd iteration, next
    /// to the clusterer's own budget.
    fn fit_until(
        &self,
        matrix: &FeatureMatrix,
        k: usize,
        seed: u64,
        deadline: &Deadline,
    ) -> Result<ClusterModel, DomainError> {
        self.fit_within(matrix, k, seed, Some(deadline))
    }
}

fn check_all(deadlines: &[Deadline]) -> Result<(), DomainError> {
    deadlines.iter().try_for_each(Deadline::check)
}

fn squared_distance(left: &[f64], right: &[f64]) -> f64 {
    left.iter().zip(right).map(|(a, b)| (a - b) * (a - b)).sum()
}

/// Nearest centroid per point (ties go to the lower id) and the resulting inertia.
fn assign(points: &[Vec<f64>], centroids: &[Vec<f64>]) -> (Vec<usize>, f64) {
    let mut inertia = 0.0;
    let labels = points
        .iter()
        .map(|point| {
            let (label, distance) = nearest(point, centroids);
            inertia += distance;
            label
        })
        .collect();
    (labels, inertia)
}

fn nearest(point: &[f64], centroids: &[Vec<f64>]) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (index, centroid) in centroids.iter().enumerate() {
        let distance = squared_distance(point, centroid);
        if distance < best.1 {
            best = (index, distance);
        }
    }
    best
}

/// Member means per cluster. An empty cluster is moved onto the point lying
/// farthest from its current centroid; if every point sits on its centroid the
/// empty cluster keeps its previous position.
fn update_centroids(points: &[Vec<f64>], labels: &[usize], previous: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let k = previous.len();
    let dim = previous.first().map_or(0, Vec::len);
    let mut sums = vec![vec![0.0; dim]; k];
    let mut counts = vec![0usize; k];

    for (point, label) in points.iter().zip(labels) {
        counts[*label] += 1;
        for (sum, value) in sums[*label].iter_mut().zip(point) {
            *sum += value;
        }
    }

    let mut taken = vec![false; points.len()];
    let mut farthest: Vec<(usize, f64)> = points
        .iter()
        .zip(labels)
        .enumerate()
        .map(|(index, (point, label))| (index, squared_distance(point, &previous[*label])))
        .collect();
    farthest.sort_by(|left, right| right.1.total_cmp(&left.1).then(left.0.cmp(&right.0)));

    sums.into_iter()
        .zip(counts)
        .enumerate()
        .map(|(cluster, (sum, count))| {
            if count > 0 {
                return sum.into_iter().map(|value| value / count as f64).collect();
            }
            match farthest.iter().find(|(index, distance)| *distance > 0.0 && !taken[*index]) {
                Some((index, _)) => {
                    taken[*index] = true;
                    points[*index].clone()
                }
                None => previous[cluster].clone(),
            }
        })
        .collect()
}

fn scaled_tolerance(points: &[Vec<f64>], tolerance: f64) -> f64 {
    let n = points.len();
    let dim = points.first().map_or(0, Vec::len);
    if n == 0 || dim == 0 {
        return 0.0;
    }

    let mut mean_variance = 0.0;
    for column in 0..dim {
        let mean = points.iter().map(|point| point[column]).sum::<f64>() / n as f64;
        let variance = points.iter().map(|point| (point[column] - mean).powi(2)).sum::<f64>() / n as f64;
        mean_variance += variance;
    }
    tolerance * mean_variance / dim as f64
}
