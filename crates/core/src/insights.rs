//! Descriptive statistics over a catalog snapshot.

use std::collections::{BTreeMap, HashMap};

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::catalog::Catalog;
use crate::domain::product::{Category, Product, SkinType};

pub const DEFAULT_OUTLIER_Z_THRESHOLD: f64 = 5.0;

/// Base ingredients present in nearly every formulation; they say nothing
/// about what distinguishes a category.
pub const COMMON_BASE_INGREDIENTS: [&str; 5] = ["Water", "Aqua", "Glycerin", "Phenoxyethanol", "Butylene Glycol"];

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CategorySummary {
    pub category: Category,
    pub product_count: usize,
    pub top_rank: Option<f64>,
    /// Every product sharing the top rank, as "Brand - Name" in catalog order.
    pub top_rated: Vec<String>,
    pub mean_price: Option<Decimal>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
}

pub fn category_summary(catalog: &Catalog) -> Vec<CategorySummary> {
    Category::ALL
        .into_iter()
        .map(|category| {
            let products: Vec<&Product> =
                catalog.products().iter().filter(|product| product.category == category).collect();
            summarize(category, &products)
        })
        .collect()
}

fn summarize(category: Category, products: &[&Product]) -> CategorySummary {
    let top_rank = products.iter().map(|product| product.rank).reduce(f64::max);
    let top_rated = top_rank
        .map(|top| {
            products.iter().filter(|product| product.rank == top).map(|product| product.display_name()).collect()
        })
        .unwrap_or_default();

    let prices = products.iter().map(|product| product.price);
    let total: Decimal = prices.clone().sum();
    let mean_price = (!products.is_empty()).then(|| (total / Decimal::from(products.len())).round_dp(2));

    CategorySummary {
        category,
        product_count: products.len(),
        top_rank,
        top_rated,
        mean_price,
        min_price: prices.clone().min(),
        max_price: prices.max(),
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PriceOutlier {
    pub index: usize,
    pub product: String,
    pub category: Category,
    pub price: Decimal,
    pub z_score: f64,
}

/// Products priced more than `threshold` sample standard deviations above the
/// catalog mean, in catalog order.
pub fn price_outliers(catalog: &Catalog, threshold: f64) -> Vec<PriceOutlier> {
    let prices: Vec<f64> = catalog.products().iter().map(|product| product.price.to_f64().unwrap_or(0.0)).collect();
    if prices.len() < 2 {
        return Vec::new();
    }

    let n = prices.len() as f64;
    let mean = prices.iter().sum::<f64>() / n;
    let variance = prices.iter().map(|price| (price - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let std_dev = variance.sqrt();
    if std_dev <= f64::EPSILON {
        return Vec::new();
    }

    catalog
        .products()
        .iter()
        .zip(prices)
        .enumerate()
        .filter_map(|(index, (product, price))| {
            let z_score = (price - mean) / std_dev;
            (z_score > threshold).then(|| PriceOutlier {
                index,
                product: product.display_name(),
                category: product.category,
                price: product.price,
                z_score,
            })
        })
        .collect()
}

/// Ingredient counts for one group, remembering first-occurrence order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TokenCounts {
    entries: Vec<(String, usize)>,
    #[serde(skip)]
    positions: HashMap<String, usize>,
}

impl TokenCounts {
    fn add(&mut self, token: &str) {
        match self.positions.get(token) {
            Some(position) => self.entries[*position].1 += 1,
            None => {
                self.positions.insert(token.to_owned(), self.entries.len());
                self.entries.push((token.to_owned(), 1));
            }
        }
    }

    pub fn count(&self, token: &str) -> usize {
        self.positions.get(token).map_or(0, |position| self.entries[*position].1)
    }

    pub fn distinct(&self) -> usize {
        self.entries.len()
    }

    /// Highest counts first; equal counts keep first-occurrence order.
    pub fn most_common(&self, limit: usize) -> Vec<(&str, usize)> {
        let mut ranked: Vec<(&str, usize)> =
            self.entries.iter().map(|(token, count)| (token.as_str(), *count)).collect();
        ranked.sort_by(|left, right| right.1.cmp(&left.1));
        ranked.truncate(limit);
        ranked
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct IngredientFrequencies {
    pub by_category: BTreeMap<Category, TokenCounts>,
    pub by_skin_type: BTreeMap<SkinType, TokenCounts>,
}

pub fn is_common_base(token: &str) -> bool {
    COMMON_BASE_INGREDIENTS.iter().any(|base| base.eq_ignore_ascii_case(token))
}

/// Counts every listed ingredient per category and per suited skin type, over
/// full label lists, skipping [`COMMON_BASE_INGREDIENTS`].
pub fn ingredient_frequencies(catalog: &Catalog) -> IngredientFrequencies {
    let mut frequencies = IngredientFrequencies::default();
    for product in catalog.products() {
        let tokens = product.ingredients.entries().iter().map(String::as_str).filter(|token| !is_common_base(token));
        for token in tokens {
            frequencies.by_category.entry(product.category).or_default().add(token);
            for skin_type in product.suitability.skin_types() {
                frequencies.by_skin_type.entry(skin_type).or_default().add(token);
            }
        }
    }
    frequencies
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{category_summary, ingredient_frequencies, price_outliers, DEFAULT_OUTLIER_Z_THRESHOLD};
    use crate::catalog::fixtures::{dry_sensitive_moisturizers, product};
    use crate::catalog::Catalog;
    use crate::domain::product::{Category, SkinType};

    #[test]
    fn summary_covers_every_category_in_fixed_order() {
        let mut products = dry_sensitive_moisturizers();
        products[2].rank = 4.0;
        products[1].rank = 3.5;
        let summary = category_summary(&Catalog::new(products));

        assert_eq!(summary.len(), 6);
        let moisturizer = &summary[0];
        assert_eq!(moisturizer.category, Category::Moisturizer);
        assert_eq!(moisturizer.product_count, 3);
        assert_eq!(moisturizer.top_rank, Some(4.0));
        assert_eq!(moisturizer.top_rated, vec!["Barrier Lab - Shea Cream", "Retinoid Co - Night Retinol"]);
        assert_eq!(moisturizer.mean_price, Some(Decimal::from(20)));
        assert_eq!(moisturizer.min_price, Some(Decimal::from(10)));
        assert_eq!(moisturizer.max_price, Some(Decimal::from(30)));

        let cleanser = &summary[1];
        assert_eq!(cleanser.product_count, 0);
        assert!(cleanser.top_rated.is_empty());
        assert_eq!(cleanser.mean_price, None);
    }

    #[test]
    fn outliers_use_sample_standard_deviation() {
        let mut products: Vec<_> =
            (0..9).map(|index| product(Category::Cleanser, "Basic", &format!("Wash {index}"), 10, "Water")).collect();
        products.push(product(Category::Cleanser, "Luxe", "Gold Wash", 100, "Water"));
        let catalog = Catalog::new(products);

        // mean 19, sample std 28.46, z of the expensive row 2.85
        let outliers = price_outliers(&catalog, 2.0);
        assert_eq!(outliers.len(), 1);
        assert_eq!(outliers[0].index, 9);
        assert_eq!(outliers[0].product, "Luxe - Gold Wash");
        assert!((outliers[0].z_score - 2.846).abs() < 1e-3, "z was {}", outliers[0].z_score);

        assert!(price_outliers(&catalog, DEFAULT_OUTLIER_Z_THRESHOLD).is_empty());
    }

    #[test]
    fn degenerate_price_sets_have_no_outliers() {
        let single = Catalog::new(vec![product(Category::Cleanser, "A", "One", 10, "Water")]);
        assert!(price_outliers(&single, 0.5).is_empty());

        let flat = Catalog::new(vec![
            product(Category::Cleanser, "A", "One", 10, "Water"),
            product(Category::Cleanser, "B", "Two", 10, "Water"),
        ]);
        assert!(price_outliers(&flat, 0.5).is_empty());
    }

    #[test]
    fn frequencies_skip_base_ingredients_and_break_ties_by_first_occurrence() {
        let frequencies = ingredient_frequencies(&Catalog::new(dry_sensitive_moisturizers()));
        let moisturizers = &frequencies.by_category[&Category::Moisturizer];

        assert_eq!(moisturizers.count("Water"), 0);
        assert_eq!(moisturizers.count("Glycerin"), 0);
        assert_eq!(moisturizers.count("Aqua"), 0);
        assert_eq!(moisturizers.distinct(), 3);
        assert_eq!(moisturizers.most_common(2), vec![("Shea Butter", 1), ("Lecithin", 1)]);

        assert_eq!(frequencies.by_skin_type[&SkinType::Dry].count("Retinol"), 1);
        assert!(!frequencies.by_skin_type.contains_key(&SkinType::Oily));
    }

    #[test]
    fn most_common_ranks_by_count() {
        let catalog = Catalog::new(vec![
            product(Category::Treatment, "A", "One", 10, "Niacinamide, Zinc PCA"),
            product(Category::Treatment, "B", "Two", 10, "Zinc PCA, Panthenol"),
        ]);
        let frequencies = ingredient_frequencies(&catalog);

        assert_eq!(
            frequencies.by_category[&Category::Treatment].most_common(3),
            vec![("Zinc PCA", 2), ("Niacinamide", 1), ("Panthenol", 1)]
        );
    }
}
