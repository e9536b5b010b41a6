//! Cluster count selection with the elbow method.
//!
//! Every candidate k in `1..=max_k` is fitted independently (in parallel) and
//! the resulting `(k, inertia)` curve is handed to [`locate_elbow`], which runs
//! Kneedle for a convex decreasing curve and keeps the first knee it meets.

use std::time::{Duration, Instant};

use kneed::knee_locator::{InterpMethod, KneeLocator, KneeLocatorParams, ValidCurve, ValidDirection};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::kmeans::{KMeansClusterer, KMeansParams};
use super::{Clusterer, Deadline};
use crate::encoding::FeatureMatrix;
use crate::errors::DomainError;

pub const DEFAULT_MAX_K: usize = 10;

/// Kneedle sensitivity `S`.
const KNEE_SENSITIVITY: f64 = 1.0;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ElbowPoint {
    pub k: usize,
    pub inertia: f64,
}

/// Outcome of a cluster count search. `elbow` is `None` when the curve shows
/// no detectable bend; the caller must then choose k explicitly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KSelection {
    pub curve: Vec<ElbowPoint>,
    pub elbow: Option<usize>,
}

impl KSelection {
    pub fn inertia_at(&self, k: usize) -> Option<f64> {
        self.curve.iter().find(|point| point.k == k).map(|point| point.inertia)
    }
}

/// Pure elbow detection over a `(k, inertia)` curve ordered by k. Curves with
/// fewer than three points or no inertia spread never have an elbow.
pub fn locate_elbow(curve: &[ElbowPoint]) -> Option<usize> {
    if curve.len() < 3 {
        return None;
    }
    let y_min = curve.iter().map(|point| point.inertia).fold(f64::INFINITY, f64::min);
    let y_max = curve.iter().map(|point| point.inertia).fold(f64::NEG_INFINITY, f64::max);
    let y_span = y_max - y_min;
    if !y_span.is_finite() || y_span <= f64::EPSILON {
        return None;
    }

    let x: Vec<f64> = curve.iter().map(|point| point.k as f64).collect();
    let y: Vec<f64> = curve.iter().map(|point| point.inertia).collect();
    let params = KneeLocatorParams::new(ValidCurve::Convex, ValidDirection::Decreasing, InterpMethod::Interp1d);
    let knee = KneeLocator::new(x, y, KNEE_SENSITIVITY, params).ok()?.knee?;

    curve.iter().map(|point| point.k).find(|k| (*k as f64 - knee).abs() < 0.5)
}

pub struct ClusterCountSelector<C = KMeansClusterer> {
    clusterer: C,
    max_k: usize,
    seed: u64,
    time_budget: Option<Duration>,
}

impl Default for ClusterCountSelector<KMeansClusterer> {
    fn default() -> Self {
        Self::new(KMeansClusterer::new(KMeansParams::for_elbow()), DEFAULT_MAX_K, super::DEFAULT_SEED)
    }
}

impl<C: Clusterer> ClusterCountSelector<C> {
    pub fn new(clusterer: C, max_k: usize, seed: u64) -> Self {
        Self { clusterer, max_k, seed, time_budget: None }
    }

    #[must_use]
    pub fn with_time_budget(mut self, budget: Option<Duration>) -> Self {
        self.time_budget = budget;
        self
    }

    pub fn select(&self, matrix: &FeatureMatrix) -> Result<KSelection, DomainError> {
        if self.max_k == 0 {
            return Err(DomainError::InvalidArgument("max_k must be a positive integer".to_owned()));
        }
        if matrix.is_empty() {
            return Err(DomainError::InvalidArgument("cannot select k for an empty catalog".to_owned()));
        }

        let started = Instant::now();
        let deadline = self.time_budget.and_then(|budget| Deadline::after(budget, "elbow search"));
        let upper = self.max_k.min(matrix.n_rows());
        let curve = (1..=upper)
            .into_par_iter()
            .map(|k| {
                let model = match &deadline {
                    Some(deadline) => self.clusterer.fit_until(matrix, k, self.seed, deadline)?,
                    None => self.clusterer.fit(matrix, k, self.seed)?,
                };
                Ok(ElbowPoint { k, inertia: model.inertia })
            })
            .collect::<Result<Vec<_>, DomainError>>()?;

        let elbow = locate_elbow(&curve);
        match elbow {
            Some(k) => info!(
                event_name = "clustering.elbow.selected",
                k,
                candidates = curve.len(),
                elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                "elbow located on the inertia curve"
            ),
            None => warn!(
                event_name = "clustering.elbow.not_found",
                candidates = curve.len(),
                "no elbow detected on the inertia curve"
            ),
        }

        Ok(KSelection { curve, elbow })
    }
}

/// Runs the default elbow search; `Ok(None)` means no elbow was detected.
pub fn select_k(matrix: &FeatureMatrix, max_k: usize, seed: u64) -> Result<Option<usize>, DomainError> {
    let selector = ClusterCountSelector::new(KMeansClusterer::new(KMeansParams::for_elbow()), max_k, seed);
    Ok(selector.select(matrix)?.elbow)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{locate_elbow, select_k, ClusterCountSelector, ElbowPoint};
    use crate::clustering::{ClusterModel, Clusterer, KMeansClusterer, KMeansParams};
    use crate::encoding::FeatureMatrix;
    use crate::errors::DomainError;

    fn curve(values: &[f64]) -> Vec<ElbowPoint> {
        values.iter().enumerate().map(|(index, inertia)| ElbowPoint { k: index + 1, inertia: *inertia }).collect()
    }

    #[test]
    fn finds_the_sharp_bend() {
        assert_eq!(locate_elbow(&curve(&[100.0, 40.0, 15.0, 12.0, 10.0, 9.0, 8.0, 7.5])), Some(3));
        assert_eq!(locate_elbow(&curve(&[50.0, 10.0, 8.0, 7.0, 6.0])), Some(2));
    }

    #[test]
    fn straight_or_flat_curves_have_no_elbow() {
        assert_eq!(locate_elbow(&curve(&[10.0, 8.0, 6.0, 4.0, 2.0])), None);
        assert_eq!(locate_elbow(&curve(&[5.0, 5.0, 5.0, 5.0])), None);
        assert_eq!(locate_elbow(&curve(&[10.0, 1.0])), None);
        assert_eq!(locate_elbow(&[]), None);
    }

    #[test]
    fn first_knee_wins_on_a_curve_with_two_drops() {
        let inertia = [100.0, 68.9, 62.8, 56.7, 50.6, 14.4, 13.3, 12.2, 6.1, 0.0];
        assert_eq!(locate_elbow(&curve(&inertia)), Some(2));
    }

    fn three_groups() -> FeatureMatrix {
        let mut rows = Vec::new();
        for group in 0..3 {
            for variant in 0..4 {
                let mut row = vec![0u8; 9];
                row[group * 3] = 1;
                row[group * 3 + 1] = 1;
                row[group * 3 + 2] = u8::from(variant % 2 == 0);
                rows.push(row);
            }
        }
        FeatureMatrix::from_rows(9, rows).expect("valid matrix")
    }

    #[test]
    fn selects_three_for_three_separated_groups() {
        let selection = ClusterCountSelector::default().select(&three_groups()).expect("search succeeds");

        assert_eq!(selection.curve.len(), 10);
        assert_eq!(selection.curve.iter().map(|point| point.k).collect::<Vec<_>>(), (1..=10).collect::<Vec<_>>());
        assert_eq!(selection.elbow, Some(3));
        assert_eq!(select_k(&three_groups(), 10, 29), Ok(Some(3)));
    }

    #[test]
    fn candidate_range_is_capped_by_catalog_size() {
        let matrix = FeatureMatrix::from_rows(1, vec![vec![0], vec![1]]).expect("valid matrix");
        let selection = ClusterCountSelector::default().select(&matrix).expect("search succeeds");

        assert_eq!(selection.curve.len(), 2);
        assert_eq!(selection.elbow, None);
    }

    #[test]
    fn rejects_empty_inputs() {
        assert!(matches!(select_k(&FeatureMatrix::default(), 10, 29), Err(DomainError::InvalidArgument(_))));
        assert!(matches!(select_k(&three_groups(), 0, 29), Err(DomainError::InvalidArgument(_))));
    }

    #[test]
    fn budget_exhaustion_is_an_error() {
        let selector = ClusterCountSelector::new(KMeansClusterer::default(), 10, 29)
            .with_time_budget(Some(Duration::ZERO));

        assert!(matches!(
            selector.select(&three_groups()),
            Err(DomainError::BudgetExhausted { phase: "elbow search", .. })
        ));
    }

    #[test]
    fn budget_bounds_a_search_whose_fits_outlast_it() {
        let selector = ClusterCountSelector::new(SlowInertia, 6, 29).with_time_budget(Some(Duration::from_millis(5)));

        assert!(matches!(
            selector.select(&three_groups()),
            Err(DomainError::BudgetExhausted { phase: "elbow search", budget_ms: 5 })
        ));
    }

    #[test]
    fn generous_budget_lets_the_search_finish() {
        let selector = ClusterCountSelector::new(KMeansClusterer::new(KMeansParams::for_elbow()), 10, 29)
            .with_time_budget(Some(Duration::from_secs(60)));

        assert_eq!(selector.select(&three_groups()).map(|selection| selection.elbow), Ok(Some(3)));
    }

    struct SlowInertia;

    impl Clusterer for SlowInertia {
        fn fit(&self, matrix: &FeatureMatrix, k: usize, seed: u64) -> Result<ClusterModel, DomainError> {
            std::thread::sleep(Duration::from_millis(30));
            FixedInertia.fit(matrix, k, seed)
        }
    }

    struct FixedInertia;

    impl Clusterer for FixedInertia {
        fn fit(&self, matrix: &FeatureMatrix, k: usize, _seed: u64) -> Result<ClusterModel, DomainError> {
            Ok(ClusterModel {
                k,
                assignments: vec![0; matrix.n_rows()],
                centroids: vec![Vec::new(); k],
                inertia: 64.0 / (k * k) as f64,
                iterations: 1,
            })
        }
    }

    #[test]
    fn selector_accepts_any_clusterer() {
        let selection = ClusterCountSelector::new(FixedInertia, 6, 1).select(&three_groups()).expect("search succeeds");

        assert_eq!(selection.inertia_at(2), Some(16.0));
        assert_eq!(selection.elbow, Some(2));
    }
}
