use std::collections::BTreeMap;

use serde::Serialize;
use skinmatch_core::catalog::LoadReport;
use skinmatch_core::insights::{
    category_summary, ingredient_frequencies, price_outliers, CategorySummary, PriceOutlier, TokenCounts,
};

use super::{load_snapshot, CommandResult, RuntimeOptions};

const MOST_COMMON_LIMIT: usize = 5;

#[derive(Debug, Serialize)]
struct IngredientCount {
    ingredient: String,
    count: usize,
}

#[derive(Debug, Serialize)]
struct StatsReport {
    command: &'static str,
    status: &'static str,
    dataset: LoadReport,
    categories: Vec<CategorySummary>,
    outlier_z_threshold: f64,
    price_outliers: Vec<PriceOutlier>,
    most_common_by_category: BTreeMap<String, Vec<IngredientCount>>,
    most_common_by_skin_type: BTreeMap<String, Vec<IngredientCount>>,
}

pub fn run(options: &RuntimeOptions) -> CommandResult {
    let snapshot = match load_snapshot(options) {
        Ok(snapshot) => snapshot,
        Err(error) => return CommandResult::from_error("stats", &error),
    };

    let threshold = snapshot.config.insights.outlier_z_threshold;
    let frequencies = ingredient_frequencies(&snapshot.catalog);
    let report = StatsReport {
        command: "stats",
        status: "ok",
        categories: category_summary(&snapshot.catalog),
        outlier_z_threshold: threshold,
        price_outliers: price_outliers(&snapshot.catalog, threshold),
        most_common_by_category: frequencies
            .by_category
            .iter()
            .map(|(category, counts)| (category.label().to_string(), most_common(counts)))
            .collect(),
        most_common_by_skin_type: frequencies
            .by_skin_type
            .iter()
            .map(|(skin_type, counts)| (skin_type.label().to_string(), most_common(counts)))
            .collect(),
        dataset: snapshot.load_report,
    };

    CommandResult::report("stats", &report)
}

fn most_common(counts: &TokenCounts) -> Vec<IngredientCount> {
    counts
        .most_common(MOST_COMMON_LIMIT)
        .into_iter()
        .map(|(ingredient, count)| IngredientCount { ingredient: ingredient.to_string(), count })
        .collect()
}
