//! Export of recommendation tables and cluster runs.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::catalog::Catalog;
use crate::clustering::ElbowPoint;
use crate::domain::product::Category;
use crate::encoding::Vocabulary;
use crate::pipeline::ClusterRun;
use crate::recommend::Recommendations;

pub const TRIGGER_SEPARATOR: &str = "; ";
const TOP_TOKENS_PER_CLUSTER: usize = 10;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("could not create report file `{path}`: {source}")]
    CreateFile { path: PathBuf, source: io::Error },
    #[error("could not write csv report: {0}")]
    Csv(#[from] csv::Error),
    #[error("could not write json report: {0}")]
    Json(#[from] serde_json::Error),
    #[error("could not write report: {0}")]
    Io(#[from] io::Error),
}

const RECOMMENDATION_COLUMNS: [&str; 6] = ["Label", "Brand", "Name", "Price", "Rank", "Triggers"];

#[derive(Debug, Serialize)]
struct RecommendationCsvRow<'a> {
    category: &'static str,
    brand: &'a str,
    name: &'a str,
    price: Decimal,
    rank: f64,
    triggers: String,
}

/// The header row is written even when there are no recommendations.
pub fn write_recommendations_csv<W: Write>(writer: W, recommendations: &Recommendations) -> Result<(), ReportError> {
    let mut csv_writer = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
    csv_writer.write_record(RECOMMENDATION_COLUMNS)?;
    for row in &recommendations.rows {
        csv_writer.serialize(RecommendationCsvRow {
            category: row.category.label(),
            brand: &row.brand,
            name: &row.name,
            price: row.price,
            rank: row.rank,
            triggers: row.triggers.join(TRIGGER_SEPARATOR),
        })?;
    }
    csv_writer.flush()?;
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TokenWeight {
    pub token: String,
    pub weight: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClusterSummary {
    pub cluster: usize,
    pub size: usize,
    pub top_tokens: Vec<TokenWeight>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProductAssignment {
    pub index: usize,
    pub category: Category,
    pub brand: String,
    pub name: String,
    pub cluster: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClusterReport {
    pub run_id: String,
    pub k: usize,
    pub inertia: f64,
    pub iterations: usize,
    pub elbow: Option<usize>,
    pub curve: Vec<ElbowPoint>,
    pub clusters: Vec<ClusterSummary>,
    pub assignments: Vec<ProductAssignment>,
}

impl ClusterReport {
    pub fn build(run_id: &str, catalog: &Catalog, vocabulary: &Vocabulary, run: &ClusterRun) -> Self {
        let model = &run.model;
        let clusters = model
            .cluster_sizes()
            .into_iter()
            .enumerate()
            .map(|(cluster, size)| ClusterSummary {
                cluster,
                size,
                top_tokens: model
                    .top_tokens(cluster, vocabulary, TOP_TOKENS_PER_CLUSTER)
                    .into_iter()
                    .map(|(token, weight)| TokenWeight { token: token.to_owned(), weight })
                    .collect(),
            })
            .collect();
        let assignments = catalog
            .products()
            .iter()
            .zip(&model.assignments)
            .enumerate()
            .map(|(index, (product, cluster))| ProductAssignment {
                index,
                category: product.category,
                brand: product.brand.clone(),
                name: product.name.clone(),
                cluster: *cluster,
            })
            .collect();

        Self {
            run_id: run_id.to_owned(),
            k: model.k,
            inertia: model.inertia,
            iterations: model.iterations,
            elbow: run.selection.as_ref().and_then(|selection| selection.elbow),
            curve: run.selection.as_ref().map(|selection| selection.curve.clone()).unwrap_or_default(),
            clusters,
            assignments,
        }
    }

    pub fn write_json<W: Write>(&self, mut writer: W) -> Result<(), ReportError> {
        serde_json::to_writer_pretty(&mut writer, self)?;
        writeln!(writer)?;
        Ok(())
    }
}

/// Creates `path` and hands the open file to `write`.
pub fn write_to_path<F>(path: &Path, write: F) -> Result<(), ReportError>
where
    F: FnOnce(File) -> Result<(), ReportError>,
{
    let file = File::create(path).map_err(|source| ReportError::CreateFile { path: path.to_path_buf(), source })?;
    write(file)
}
