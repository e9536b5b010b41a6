use std::path::PathBuf;

use clap::Args;
use serde::Serialize;
use skinmatch_core::errors::ApplicationError;
use skinmatch_core::recommend::{RecommendationQuery, RecommendationRow};
use skinmatch_core::report::{write_recommendations_csv, write_to_path};

use super::{prepare_pipeline, CommandResult, RuntimeOptions};

#[derive(Debug, Clone, Default, Args)]
pub struct RecommendArgs {
    #[arg(help = "Exact product name to find peers for")]
    pub name: String,
    #[arg(long, help = "Brand of the product when several share the name")]
    pub brand: Option<String>,
    #[arg(long, help = "Cluster count; defaults to the elbow of the inertia curve")]
    pub k: Option<usize>,
    #[arg(long, help = "Write the recommendation table as CSV to this file")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct RecommendReport<'a> {
    command: &'static str,
    /// `ok`, or `empty` when no peer survived the filters.
    status: &'static str,
    run_id: &'a str,
    product: &'a str,
    brand: Option<&'a str>,
    duplicate_names: usize,
    cluster: usize,
    recommendations: &'a [RecommendationRow],
}

pub fn run(options: &RuntimeOptions, args: &RecommendArgs) -> CommandResult {
    match execute(options, args) {
        Ok(result) => result,
        Err(error) => CommandResult::from_error("recommend", &error),
    }
}

fn execute(options: &RuntimeOptions, args: &RecommendArgs) -> Result<CommandResult, ApplicationError> {
    let pipeline = prepare_pipeline(options)?;
    let query = RecommendationQuery::by_name(&args.name).with_brand(args.brand.as_deref());
    let recommendations = pipeline.recommend(query, args.k)?;

    if let Some(path) = &args.output {
        write_to_path(path, |file| write_recommendations_csv(file, &recommendations))?;
        return Ok(CommandResult::success(
            "recommend",
            format!("{} recommendations written to {}", recommendations.len(), path.display()),
        ));
    }

    Ok(CommandResult::report(
        "recommend",
        &RecommendReport {
            command: "recommend",
            status: if recommendations.is_empty() { "empty" } else { "ok" },
            run_id: pipeline.run_id(),
            product: &args.name,
            brand: args.brand.as_deref(),
            duplicate_names: recommendations.duplicate_names,
            cluster: recommendations.target_cluster,
            recommendations: &recommendations.rows,
        },
    ))
}
