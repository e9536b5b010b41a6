use std::path::PathBuf;

use clap::Args;
use skinmatch_core::errors::ApplicationError;
use skinmatch_core::report::{write_to_path, ClusterReport};

use super::{prepare_pipeline, CommandResult, RuntimeOptions};

#[derive(Debug, Clone, Default, Args)]
pub struct ClusterArgs {
    #[arg(long, help = "Cluster count; defaults to the elbow of the inertia curve")]
    pub k: Option<usize>,
    #[arg(long, help = "Write the JSON cluster report to this file instead of stdout")]
    pub output: Option<PathBuf>,
}

pub fn run(options: &RuntimeOptions, args: &ClusterArgs) -> CommandResult {
    match execute(options, args) {
        Ok(result) => result,
        Err(error) => CommandResult::from_error("cluster", &error),
    }
}

fn execute(options: &RuntimeOptions, args: &ClusterArgs) -> Result<CommandResult, ApplicationError> {
    let pipeline = prepare_pipeline(options)?;
    let run = pipeline.cluster(args.k)?;
    let report = ClusterReport::build(pipeline.run_id(), pipeline.catalog(), &pipeline.encoded().vocabulary, &run);

    match &args.output {
        Some(path) => {
            write_to_path(path, |file| report.write_json(file))?;
            Ok(CommandResult::success(
                "cluster",
                format!("cluster report for k={} written to {}", report.k, path.display()),
            ))
        }
        None => Ok(CommandResult::report("cluster", &report)),
    }
}
