//! One pipeline run over one catalog snapshot: encode once, then select k,
//! cluster, and answer recommendation queries against the shared encoding.

use std::time::Instant;

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::clustering::{ClusterCountSelector, ClusterModel, Clusterer, KMeansClusterer, KSelection};
use crate::config::ClusteringConfig;
use crate::encoding::EncodedCatalog;
use crate::errors::DomainError;
use crate::recommend::{recommend_with_model, RecommendationQuery, Recommendations};

/// A fitted clustering together with the elbow search that chose its k, when
/// k was not given explicitly.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClusterRun {
    pub model: ClusterModel,
    pub selection: Option<KSelection>,
}

pub struct Pipeline {
    run_id: String,
    catalog: Catalog,
    encoded: EncodedCatalog,
    settings: ClusteringConfig,
}

impl Pipeline {
    pub fn prepare(catalog: Catalog, settings: ClusteringConfig) -> Self {
        let run_id = format!("RUN-{}", Uuid::new_v4().simple());
        let encoded = EncodedCatalog::from_catalog(&catalog);
        info!(
            event_name = "pipeline.prepared",
            correlation_id = %run_id,
            products = catalog.len(),
            vocabulary_size = encoded.vocabulary.len(),
            seed = settings.seed,
            "pipeline prepared catalog encoding"
        );
        Self { run_id, catalog, encoded, settings }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn encoded(&self) -> &EncodedCatalog {
        &self.encoded
    }

    pub fn settings(&self) -> &ClusteringConfig {
        &self.settings
    }

    pub fn select_k(&self) -> Result<KSelection, DomainError> {
        let started = Instant::now();
        let selector = ClusterCountSelector::new(
            KMeansClusterer::new(self.settings.elbow_params()),
            self.settings.max_k,
            self.settings.seed,
        )
        .with_time_budget(self.settings.time_budget());

        let selection = selector.select(&self.encoded.features)?;
        info!(
            event_name = "pipeline.k_selected",
            correlation_id = %self.run_id,
            elbow = ?selection.elbow,
            candidates = selection.curve.len(),
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "cluster count search finished"
        );
        Ok(selection)
    }

    /// Fits the final model at `k`, or at the elbow when `k` is `None`. A curve
    /// without an elbow is an invalid argument: the caller has to choose k.
    pub fn cluster(&self, k: Option<usize>) -> Result<ClusterRun, DomainError> {
        let (k, selection) = match k {
            Some(k) => (k, None),
            None => {
                let selection = self.select_k()?;
                let k = selection.elbow.ok_or_else(|| {
                    DomainError::InvalidArgument("no elbow found on the inertia curve; pass k explicitly".to_owned())
                })?;
                (k, Some(selection))
            }
        };

        let started = Instant::now();
        let model = KMeansClusterer::new(self.settings.kmeans_params()).fit(&self.encoded.features, k, self.settings.seed)?;
        info!(
            event_name = "pipeline.clustered",
            correlation_id = %self.run_id,
            k,
            inertia = model.inertia,
            iterations = model.iterations,
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "final clustering finished"
        );
        Ok(ClusterRun { model, selection })
    }

    /// Resolves the target before clustering so an unknown name fails fast.
    pub fn recommend(&self, query: RecommendationQuery<'_>, k: Option<usize>) -> Result<Recommendations, DomainError> {
        self.catalog.lookup(query.name, query.brand)?;
        let run = self.cluster(k)?;
        let recommendations = recommend_with_model(&self.catalog, &run.model, query)?;
        info!(
            event_name = "pipeline.recommended",
            correlation_id = %self.run_id,
            product_name = query.name,
            k = run.model.k,
            recommendations = recommendations.len(),
            "recommendation query answered"
        );
        Ok(recommendations)
    }
}
