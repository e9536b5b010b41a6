//! Cluster-based product recommendations.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::catalog::Catalog;
use crate::clustering::{ClusterModel, Clusterer, KMeansClusterer};
use crate::domain::product::{Category, Product};
use crate::encoding::{ensure_rows_match, FeatureMatrix};
use crate::errors::DomainError;
use crate::triggers::annotate_triggers;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRow {
    pub category: Category,
    pub brand: String,
    pub name: String,
    pub price: Decimal,
    pub rank: f64,
    pub triggers: Vec<String>,
}

impl RecommendationRow {
    fn from_product(product: &Product) -> Self {
        Self {
            category: product.category,
            brand: product.brand.clone(),
            name: product.name.clone(),
            price: product.price,
            rank: product.rank,
            triggers: annotate_triggers(product),
        }
    }
}

/// Price-ordered peers of one target product. The target itself is included
/// whenever it survives the category and suitability filter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recommendations {
    pub target_index: usize,
    pub target_cluster: usize,
    /// Other catalog rows that share the target's name and were not used.
    pub duplicate_names: usize,
    pub rows: Vec<RecommendationRow>,
}

impl Recommendations {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Who to recommend for: a product name, optionally narrowed to one brand.
#[derive(Clone, Copy, Debug)]
pub struct RecommendationQuery<'a> {
    pub name: &'a str,
    pub brand: Option<&'a str>,
}

impl<'a> RecommendationQuery<'a> {
    pub fn by_name(name: &'a str) -> Self {
        Self { name, brand: None }
    }

    #[must_use]
    pub fn with_brand(mut self, brand: Option<&'a str>) -> Self {
        self.brand = brand;
        self
    }
}

pub struct RecommendationEngine<C = KMeansClusterer> {
    clusterer: C,
}

impl Default for RecommendationEngine<KMeansClusterer> {
    fn default() -> Self {
        Self::new(KMeansClusterer::default())
    }
}

impl<C: Clusterer> RecommendationEngine<C> {
    pub fn new(clusterer: C) -> Self {
        Self { clusterer }
    }

    /// Clusters `features` at `k`, then recommends from the fitted model.
    pub fn recommend(
        &self,
        catalog: &Catalog,
        features: &FeatureMatrix,
        query: RecommendationQuery<'_>,
        k: usize,
        seed: u64,
    ) -> Result<Recommendations, DomainError> {
        ensure_rows_match(features, catalog)?;
        // Resolve first so an unknown name never pays for a clustering run.
        catalog.lookup(query.name, query.brand)?;
        let model = self.clusterer.fit(features, k, seed)?;
        recommend_with_model(catalog, &model, query)
    }
}

/// Recommends from an already fitted model, e.g. one shared by several queries.
pub fn recommend_with_model(
    catalog: &Catalog,
    model: &ClusterModel,
    query: RecommendationQuery<'_>,
) -> Result<Recommendations, DomainError> {
    model.validate(catalog.len())?;

    let lookup = catalog.lookup(query.name, query.brand)?;
    let target = lookup.product;
    let target_cluster = model.assignments[lookup.index];

    let mut rows: Vec<RecommendationRow> = model
        .members(target_cluster)
        .into_iter()
        .filter_map(|row| catalog.get(row))
        .filter(|peer| peer.category == target.category && peer.suitability == target.suitability)
        .map(RecommendationRow::from_product)
        .collect();
    // Vec::sort_by is stable: equal prices keep catalog order.
    rows.sort_by(|left, right| left.price.cmp(&right.price));

    info!(
        event_name = "recommend.completed",
        product_name = query.name,
        target_index = lookup.index,
        target_cluster,
        k = model.k,
        recommendations = rows.len(),
        "recommendations computed"
    );

    Ok(Recommendations { target_index: lookup.index, target_cluster, duplicate_names: lookup.duplicates, rows })
}

/// Recommends for `target_name` using the default k-means settings and seed.
pub fn recommend(
    catalog: &Catalog,
    features: &FeatureMatrix,
    target_name: &str,
    k: usize,
) -> Result<Recommendations, DomainError> {
    RecommendationEngine::default().recommend(
        catalog,
        features,
        RecommendationQuery::by_name(target_name),
        k,
        crate::clustering::DEFAULT_SEED,
    )
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{recommend, recommend_with_model, RecommendationEngine, RecommendationQuery};
    use crate::catalog::fixtures::{dry_sensitive_moisturizers, product};
    use crate::catalog::Catalog;
    use crate::clustering::{ClusterModel, Clusterer};
    use crate::domain::product::{Category, SkinSuitability};
    use crate::encoding::{EncodedCatalog, FeatureMatrix};
    use crate::errors::DomainError;

    fn model(assignments: Vec<usize>, k: usize) -> ClusterModel {
        ClusterModel { k, assignments, centroids: vec![Vec::new(); k], inertia: 0.0, iterations: 1 }
    }

    #[test]
    fn three_moisturizer_scenario_groups_shared_formulations() {
        let catalog = Catalog::new(dry_sensitive_moisturizers());
        let encoded = EncodedCatalog::from_catalog(&catalog);

        let result = recommend(&catalog, &encoded.features, "Shea Cream", 2).expect("name exists");

        let names: Vec<&str> = result.rows.iter().map(|row| row.name.as_str()).collect();
        assert_eq!(names, vec!["Shea Cream", "Lecithin Cream"]);
        assert_eq!(result.rows[0].price, Decimal::from(10));
        assert_eq!(result.rows[0].triggers, vec!["shea butter"]);
        assert_eq!(result.rows[1].triggers, vec!["lecithin"]);
        assert_eq!(result.target_index, 0);
    }

    #[test]
    fn peers_must_share_category_and_every_suitability_flag() {
        let mut oily = product(Category::Moisturizer, "C", "Oily Cream", 5, "Water, Glycerin");
        oily.suitability = SkinSuitability { oily: true, ..SkinSuitability::default() };
        let catalog = Catalog::new(vec![
            product(Category::Moisturizer, "A", "Target", 20, "Water, Glycerin"),
            product(Category::Cleanser, "B", "Wash", 8, "Water, Glycerin"),
            oily,
            product(Category::Moisturizer, "D", "Twin", 15, "Water, Glycerin"),
        ]);

        let result = recommend_with_model(&catalog, &model(vec![0, 0, 0, 0], 1), RecommendationQuery::by_name("Target"))
            .expect("name exists");

        let names: Vec<&str> = result.rows.iter().map(|row| row.name.as_str()).collect();
        assert_eq!(names, vec!["Twin", "Target"]);
        assert!(result.rows.iter().all(|row| row.category == Category::Moisturizer));
    }

    #[test]
    fn one_differing_suitability_flag_excludes_a_peer() {
        let mut also_oily = product(Category::Moisturizer, "B", "Also Oily", 5, "Water, Glycerin");
        also_oily.suitability.oily = true;
        let target = product(Category::Moisturizer, "A", "Target", 20, "Water, Glycerin");
        let catalog = Catalog::new(vec![target, also_oily]);

        let result = recommend_with_model(&catalog, &model(vec![0, 0], 1), RecommendationQuery::by_name("Target"))
            .expect("name exists");

        assert_eq!(result.len(), 1);
        assert_eq!(result.rows[0].name, "Target");
    }

    #[test]
    fn equal_prices_keep_catalog_order() {
        let catalog = Catalog::new(vec![
            product(Category::Treatment, "A", "First", 12, "Water"),
            product(Category::Treatment, "B", "Second", 12, "Water"),
            product(Category::Treatment, "C", "Cheaper", 9, "Water"),
            product(Category::Treatment, "D", "Third", 12, "Water"),
        ]);

        let result = recommend_with_model(&catalog, &model(vec![0, 0, 0, 0], 1), RecommendationQuery::by_name("Second"))
            .expect("name exists");

        let names: Vec<&str> = result.rows.iter().map(|row| row.name.as_str()).collect();
        assert_eq!(names, vec!["Cheaper", "First", "Second", "Third"]);
    }

    #[test]
    fn only_the_target_cluster_is_considered() {
        let catalog = Catalog::new(vec![
            product(Category::Treatment, "A", "Target", 12, "Water"),
            product(Category::Treatment, "B", "Elsewhere", 3, "Water"),
        ]);

        let result = recommend_with_model(&catalog, &model(vec![1, 0], 2), RecommendationQuery::by_name("Target"))
            .expect("name exists");

        assert_eq!(result.target_cluster, 1);
        assert_eq!(result.len(), 1);
        assert_eq!(result.rows[0].name, "Target");
    }

    #[test]
    fn unknown_name_is_not_found() {
        let catalog = Catalog::new(dry_sensitive_moisturizers());
        let encoded = EncodedCatalog::from_catalog(&catalog);

        assert_eq!(
            recommend(&catalog, &encoded.features, "Missing Balm", 2),
            Err(DomainError::ProductNotFound { name: "Missing Balm".to_owned() })
        );
    }

    #[test]
    fn duplicate_names_use_the_first_match_and_brand_narrows() {
        let catalog = Catalog::new(vec![
            product(Category::Cleanser, "Alpha", "Gentle Wash", 12, "Water"),
            product(Category::Treatment, "Beta", "Gentle Wash", 8, "Water"),
        ]);
        let model = model(vec![0, 0], 1);

        let first = recommend_with_model(&catalog, &model, RecommendationQuery::by_name("Gentle Wash"))
            .expect("name exists");
        assert_eq!(first.target_index, 0);
        assert_eq!(first.duplicate_names, 1);
        assert_eq!(first.rows[0].brand, "Alpha");

        let narrowed = recommend_with_model(
            &catalog,
            &model,
            RecommendationQuery::by_name("Gentle Wash").with_brand(Some("Beta")),
        )
        .expect("brand and name exist");
        assert_eq!(narrowed.target_index, 1);
        assert_eq!(narrowed.rows[0].category, Category::Treatment);
    }

    struct SplitEveryRow;

    impl Clusterer for SplitEveryRow {
        fn fit(&self, matrix: &FeatureMatrix, k: usize, _seed: u64) -> Result<ClusterModel, DomainError> {
            Ok(model((0..matrix.n_rows()).map(|row| row % k).collect(), k))
        }
    }

    #[test]
    fn engine_uses_the_supplied_clusterer() {
        let catalog = Catalog::new(dry_sensitive_moisturizers());
        let encoded = EncodedCatalog::from_catalog(&catalog);
        let engine = RecommendationEngine::new(SplitEveryRow);

        let result = engine
            .recommend(&catalog, &encoded.features, RecommendationQuery::by_name("Lecithin Cream"), 3, 0)
            .expect("name exists");

        assert_eq!(result.len(), 1);
        assert_eq!(result.rows[0].name, "Lecithin Cream");
    }

    #[test]
    fn mismatched_inputs_are_rejected() {
        let catalog = Catalog::new(dry_sensitive_moisturizers());

        assert!(matches!(
            recommend(&catalog, &FeatureMatrix::default(), "Shea Cream", 1),
            Err(DomainError::InvalidArgument(_))
        ));
        assert!(matches!(
            recommend_with_model(&catalog, &model(vec![0], 1), RecommendationQuery::by_name("Shea Cream")),
            Err(DomainError::InvalidArgument(_))
        ));
    }

    #[test]
    fn out_of_range_cluster_ids_are_rejected() {
        let catalog = Catalog::new(dry_sensitive_moisturizers());

        assert!(matches!(
            recommend_with_model(&catalog, &model(vec![0, 2, 0], 2), RecommendationQuery::by_name("Shea Cream")),
            Err(DomainError::InvalidArgument(_))
        ));
    }

    #[test]
    fn lone_target_recommends_itself() {
        let catalog = Catalog::new(vec![product(Category::Treatment, "A", "Target", 12, "Water")]);
        let result = recommend_with_model(&catalog, &model(vec![0], 1), RecommendationQuery::by_name("Target"))
            .expect("name exists");

        assert!(!result.is_empty());
        assert_eq!(result.rows[0].name, "Target");
        assert!(result.rows[0].triggers.is_empty());
    }
}
