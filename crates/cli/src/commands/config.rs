use std::env;
use std::fs;
use std::path::Path;

use skinmatch_core::config::resolve_config_path;
use toml::Value;

use super::{CommandResult, RuntimeOptions};

pub fn run(options: &RuntimeOptions) -> CommandResult {
    let config = match options.load_config() {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("config", "config_validation", format!("config validation failed: {error}"), 2)
        }
    };

    let config_file_path = resolve_config_path(options.config_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let file = FileSource { doc: config_file_doc.as_ref(), path: config_file_path.as_deref() };

    let mut lines = vec!["effective config (source precedence: cli > env > file > default):".to_string()];

    let dataset_path_flag = options.overrides.dataset_path.is_some();
    lines.push(render_line(
        "dataset.path",
        &config.dataset.path.display().to_string(),
        field_source("dataset.path", dataset_path_flag.then_some("--dataset"), Some("SKINMATCH_DATASET_PATH"), &file),
    ));
    lines.push(render_line(
        "dataset.placeholder_markers",
        &config.dataset.placeholder_markers.join(", "),
        field_source("dataset.placeholder_markers", None, Some("SKINMATCH_DATASET_PLACEHOLDER_MARKERS"), &file),
    ));

    let seed_flag = options.overrides.seed.is_some();
    lines.push(render_line(
        "clustering.seed",
        &config.clustering.seed.to_string(),
        field_source("clustering.seed", seed_flag.then_some("--seed"), Some("SKINMATCH_CLUSTERING_SEED"), &file),
    ));
    lines.push(render_line(
        "clustering.max_k",
        &config.clustering.max_k.to_string(),
        field_source("clustering.max_k", None, Some("SKINMATCH_CLUSTERING_MAX_K"), &file),
    ));
    lines.push(render_line(
        "clustering.n_init",
        &config.clustering.n_init.to_string(),
        field_source("clustering.n_init", None, Some("SKINMATCH_CLUSTERING_N_INIT"), &file),
    ));
    lines.push(render_line(
        "clustering.max_iter",
        &config.clustering.max_iter.to_string(),
        field_source("clustering.max_iter", None, Some("SKINMATCH_CLUSTERING_MAX_ITER"), &file),
    ));
    lines.push(render_line(
        "clustering.elbow_max_iter",
        &config.clustering.elbow_max_iter.to_string(),
        field_source("clustering.elbow_max_iter", None, Some("SKINMATCH_CLUSTERING_ELBOW_MAX_ITER"), &file),
    ));
    lines.push(render_line(
        "clustering.tolerance",
        &config.clustering.tolerance.to_string(),
        field_source("clustering.tolerance", None, Some("SKINMATCH_CLUSTERING_TOLERANCE"), &file),
    ));
    lines.push(render_line(
        "clustering.time_budget_secs",
        &config.clustering.time_budget_secs.to_string(),
        field_source("clustering.time_budget_secs", None, Some("SKINMATCH_CLUSTERING_TIME_BUDGET_SECS"), &file),
    ));

    lines.push(render_line(
        "insights.outlier_z_threshold",
        &config.insights.outlier_z_threshold.to_string(),
        field_source("insights.outlier_z_threshold", None, Some("SKINMATCH_INSIGHTS_OUTLIER_Z_THRESHOLD"), &file),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        field_source("logging.level", None, Some("SKINMATCH_LOGGING_LEVEL"), &file),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        field_source("logging.format", None, Some("SKINMATCH_LOGGING_FORMAT"), &file),
    ));

    CommandResult::success("config", lines.join("\n"))
}

struct FileSource<'a> {
    doc: Option<&'a Value>,
    path: Option<&'a Path>,
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(key_path: &str, cli_flag: Option<&str>, env_key: Option<&str>, file: &FileSource<'_>) -> String {
    if let Some(flag) = cli_flag {
        return format!("cli ({flag})");
    }

    if let Some(env_key) = env_key {
        if env::var(env_key).is_ok_and(|value| !value.trim().is_empty()) {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = file.doc {
        if contains_path(doc, key_path) {
            let file_path = file
                .path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
