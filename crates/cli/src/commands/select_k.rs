use serde::Serialize;
use skinmatch_core::clustering::ElbowPoint;
use skinmatch_core::errors::ApplicationError;

use super::{prepare_pipeline, CommandResult, RuntimeOptions};

#[derive(Debug, Serialize)]
struct SelectKReport {
    command: &'static str,
    /// `ok` when an elbow was found, `no_elbow` when k must be chosen by hand.
    status: &'static str,
    run_id: String,
    k: Option<usize>,
    max_k: usize,
    seed: u64,
    curve: Vec<ElbowPoint>,
}

pub fn run(options: &RuntimeOptions) -> CommandResult {
    let pipeline = match prepare_pipeline(options) {
        Ok(pipeline) => pipeline,
        Err(error) => return CommandResult::from_error("select-k", &error),
    };

    let selection = match pipeline.select_k() {
        Ok(selection) => selection,
        Err(error) => return CommandResult::from_error("select-k", &ApplicationError::from(error)),
    };

    CommandResult::report(
        "select-k",
        &SelectKReport {
            command: "select-k",
            status: if selection.elbow.is_some() { "ok" } else { "no_elbow" },
            run_id: pipeline.run_id().to_string(),
            k: selection.elbow,
            max_k: pipeline.settings().max_k,
            seed: pipeline.settings().seed,
            curve: selection.curve,
        },
    )
}
