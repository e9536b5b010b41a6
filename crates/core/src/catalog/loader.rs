//! CSV dataset loading and cleaning.
//!
//! Expected headers: `Label, Brand, Name, Price, Rank, Ingredients, Combination,
//! Dry, Normal, Oily, Sensitive`. Extra columns are ignored. Rows with a missing
//! field, a placeholder ingredient text, or a value that does not parse are
//! dropped and counted in the [`LoadReport`].

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::Catalog;
use crate::domain::product::{Category, IngredientList, Product, SkinSuitability};

pub const DEFAULT_PLACEHOLDER_MARKERS: [&str; 3] = ["#NAME?", "No info", "Visit"];

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("could not read dataset `{path}`: {source}")]
    ReadFile { path: PathBuf, source: io::Error },
    #[error("could not parse dataset `{path}`: {source}")]
    Csv { path: PathBuf, source: csv::Error },
    #[error("dataset `{path}` has no usable rows after cleaning")]
    EmptyCatalog { path: PathBuf },
}

#[derive(Clone, Debug)]
pub struct LoadOptions {
    /// Ingredient texts containing any of these markers carry no real data.
    pub placeholder_markers: Vec<String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self { placeholder_markers: DEFAULT_PLACEHOLDER_MARKERS.iter().map(|m| (*m).to_owned()).collect() }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub rows_read: usize,
    pub loaded: usize,
    pub dropped_missing_fields: usize,
    pub dropped_placeholder_ingredients: usize,
    pub dropped_invalid_values: usize,
    pub duplicate_names: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawProductRow {
    #[serde(rename = "Label")]
    label: Option<String>,
    #[serde(rename = "Brand")]
    brand: Option<String>,
    #[serde(rename = "Name")]
    name: Option<String>,
    #[serde(rename = "Price")]
    price: Option<String>,
    #[serde(rename = "Rank")]
    rank: Option<String>,
    #[serde(rename = "Ingredients")]
    ingredients: Option<String>,
    #[serde(rename = "Combination")]
    combination: Option<String>,
    #[serde(rename = "Dry")]
    dry: Option<String>,
    #[serde(rename = "Normal")]
    normal: Option<String>,
    #[serde(rename = "Oily")]
    oily: Option<String>,
    #[serde(rename = "Sensitive")]
    sensitive: Option<String>,
}

enum RowOutcome {
    Loaded(Product),
    MissingField(&'static str),
    Placeholder,
    Invalid(String),
}

pub fn load_catalog(path: &Path, options: &LoadOptions) -> Result<(Catalog, LoadReport), CatalogError> {
    let file = File::open(path).map_err(|source| CatalogError::ReadFile { path: path.to_path_buf(), source })?;
    load_catalog_from_reader(file, path, options)
}

/// Loads from any reader; `source` is only used for error messages.
pub fn load_catalog_from_reader<R: io::Read>(
    reader: R,
    source: &Path,
    options: &LoadOptions,
) -> Result<(Catalog, LoadReport), CatalogError> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::Headers).from_reader(reader);
    let mut report = LoadReport::default();
    let mut products = Vec::new();

    for (line, record) in csv_reader.deserialize::<RawProductRow>().enumerate() {
        let row = record.map_err(|error| CatalogError::Csv { path: source.to_path_buf(), source: error })?;
        report.rows_read += 1;

        match clean_row(row, options) {
            RowOutcome::Loaded(product) => products.push(product),
            RowOutcome::MissingField(field) => {
                report.dropped_missing_fields += 1;
                debug!(event_name = "catalog.load.row_dropped", line, reason = "missing_field", field);
            }
            RowOutcome::Placeholder => {
                report.dropped_placeholder_ingredients += 1;
                debug!(event_name = "catalog.load.row_dropped", line, reason = "placeholder_ingredients");
            }
            RowOutcome::Invalid(detail) => {
                report.dropped_invalid_values += 1;
                debug!(event_name = "catalog.load.row_dropped", line, reason = "invalid_value", detail = %detail);
            }
        }
    }

    if products.is_empty() {
        return Err(CatalogError::EmptyCatalog { path: source.to_path_buf() });
    }

    let catalog = Catalog::new(products);
    report.loaded = catalog.len();
    report.duplicate_names = catalog.duplicate_names().into_iter().map(str::to_owned).collect();

    info!(
        event_name = "catalog.load.completed",
        source = %source.display(),
        rows_read = report.rows_read,
        loaded = report.loaded,
        dropped_missing_fields = report.dropped_missing_fields,
        dropped_placeholder_ingredients = report.dropped_placeholder_ingredients,
        dropped_invalid_values = report.dropped_invalid_values,
        duplicate_names = report.duplicate_names.len(),
        "catalog snapshot loaded"
    );

    Ok((catalog, report))
}

fn clean_row(row: RawProductRow, options: &LoadOptions) -> RowOutcome {
    macro_rules! required {
        ($field:expr, $name:literal) => {
            match $field.as_deref().map(str::trim).filter(|value| !value.is_empty()) {
                Some(value) => value,
                None => return RowOutcome::MissingField($name),
            }
        };
    }

    let label = required!(row.label, "Label");
    let brand = required!(row.brand, "Brand");
    let name = required!(row.name, "Name");
    let price = required!(row.price, "Price");
    let rank = required!(row.rank, "Rank");
    let ingredients = required!(row.ingredients, "Ingredients");
    let combination = required!(row.combination, "Combination");
    let dry = required!(row.dry, "Dry");
    let normal = required!(row.normal, "Normal");
    let oily = required!(row.oily, "Oily");
    let sensitive = required!(row.sensitive, "Sensitive");

    if options.placeholder_markers.iter().any(|marker| ingredients.contains(marker.as_str())) {
        return RowOutcome::Placeholder;
    }

    let category = match Category::from_str(label) {
        Ok(category) => category,
        Err(error) => return RowOutcome::Invalid(error.to_string()),
    };
    let price = match Decimal::from_str(price) {
        Ok(price) if price > Decimal::ZERO => price,
        Ok(price) => return RowOutcome::Invalid(format!("price must be positive, got {price}")),
        Err(_) => return RowOutcome::Invalid(format!("price `{price}` is not a number")),
    };
    let rank = match rank.parse::<f64>() {
        Ok(rank) if rank.is_finite() => rank,
        _ => return RowOutcome::Invalid(format!("rank `{rank}` is not a number")),
    };

    let suitability = match (
        parse_flag(combination),
        parse_flag(dry),
        parse_flag(normal),
        parse_flag(oily),
        parse_flag(sensitive),
    ) {
        (Some(combination), Some(dry), Some(normal), Some(oily), Some(sensitive)) => {
            SkinSuitability { combination, dry, normal, oily, sensitive }
        }
        _ => return RowOutcome::Invalid("skin suitability flags must be 0/1 or true/false".to_owned()),
    };

    RowOutcome::Loaded(Product {
        category,
        brand: brand.to_owned(),
        name: name.to_owned(),
        price,
        rank,
        ingredients: IngredientList::parse(ingredients),
        suitability,
    })
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "1.0" | "true" => Some(true),
        "0" | "0.0" | "false" => Some(false),
        _ => None,
    }
}
