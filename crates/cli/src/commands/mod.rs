pub mod cluster;
pub mod config;
pub mod recommend;
pub mod select_k;
pub mod stats;

use std::path::PathBuf;

use serde::Serialize;
use skinmatch_core::catalog::{self, Catalog, LoadReport};
use skinmatch_core::config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions};
use skinmatch_core::errors::ApplicationError;
use skinmatch_core::pipeline::Pipeline;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(command: &str, error_class: &str, message: impl Into<String>, exit_code: u8) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    pub fn from_error(command: &str, error: &ApplicationError) -> Self {
        tracing::warn!(
            event_name = "cli.command.failed",
            command,
            error_class = error.error_class(),
            error = %error,
            "command failed"
        );
        Self::failure(
            command,
            error.error_class(),
            format!("{} ({error})", error.user_message()),
            error.exit_code(),
        )
    }

    /// Prints a full JSON report instead of the one-line outcome.
    pub fn report<T: Serialize>(command: &str, report: &T) -> Self {
        match serde_json::to_string_pretty(report) {
            Ok(output) => Self { exit_code: 0, output },
            Err(error) => Self::failure(command, "serialization", error.to_string(), 1),
        }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Global flags shared by every command.
#[derive(Debug, Clone, Default)]
pub struct RuntimeOptions {
    pub config_path: Option<PathBuf>,
    pub overrides: ConfigOverrides,
}

impl RuntimeOptions {
    pub fn load_config(&self) -> Result<AppConfig, ConfigError> {
        AppConfig::load(LoadOptions {
            config_path: self.config_path.clone(),
            require_file: self.config_path.is_some(),
            overrides: self.overrides.clone(),
        })
    }
}

pub(crate) struct Snapshot {
    pub config: AppConfig,
    pub catalog: Catalog,
    pub load_report: LoadReport,
}

pub(crate) fn load_snapshot(options: &RuntimeOptions) -> Result<Snapshot, ApplicationError> {
    let config = options.load_config()?;
    let load_options =
        catalog::LoadOptions { placeholder_markers: config.dataset.placeholder_markers.clone() };
    let (catalog, load_report) = catalog::load_catalog(&config.dataset.path, &load_options)?;
    Ok(Snapshot { config, catalog, load_report })
}

pub(crate) fn prepare_pipeline(options: &RuntimeOptions) -> Result<Pipeline, ApplicationError> {
    let snapshot = load_snapshot(options)?;
    Ok(Pipeline::prepare(snapshot.catalog, snapshot.config.clustering))
}
