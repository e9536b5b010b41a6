use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::loader::DEFAULT_PLACEHOLDER_MARKERS;
use crate::clustering::KMeansParams;

pub const DEFAULT_CONFIG_FILES: [&str; 2] = ["skinmatch.toml", "config/skinmatch.toml"];

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub dataset: DatasetConfig,
    pub clustering: ClusteringConfig,
    pub insights: InsightsConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatasetConfig {
    pub path: PathBuf,
    pub placeholder_markers: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct ClusteringConfig {
    pub seed: u64,
    pub max_k: usize,
    pub n_init: usize,
    pub max_iter: usize,
    pub elbow_max_iter: usize,
    pub tolerance: f64,
    /// Zero disables the budget.
    pub time_budget_secs: u64,
}

#[derive(Clone, Debug)]
pub struct InsightsConfig {
    pub outlier_z_threshold: f64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub dataset_path: Option<PathBuf>,
    pub seed: Option<u64>,
    pub max_k: Option<usize>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        let kmeans = KMeansParams::default();
        Self {
            dataset: DatasetConfig {
                path: PathBuf::from("data/cosmetics.csv"),
                placeholder_markers: DEFAULT_PLACEHOLDER_MARKERS.iter().map(|marker| (*marker).to_string()).collect(),
            },
            clustering: ClusteringConfig {
                seed: crate::clustering::DEFAULT_SEED,
                max_k: crate::clustering::DEFAULT_MAX_K,
                n_init: kmeans.n_init,
                max_iter: kmeans.max_iter,
                elbow_max_iter: KMeansParams::for_elbow().max_iter,
                tolerance: kmeans.tolerance,
                time_budget_secs: 120,
            },
            insights: InsightsConfig { outlier_z_threshold: crate::insights::DEFAULT_OUTLIER_Z_THRESHOLD },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl ClusteringConfig {
    pub fn time_budget(&self) -> Option<Duration> {
        (self.time_budget_secs > 0).then(|| Duration::from_secs(self.time_budget_secs))
    }

    /// Parameters for the final clustering run.
    pub fn kmeans_params(&self) -> KMeansParams {
        KMeansParams {
            n_init: self.n_init,
            max_iter: self.max_iter,
            tolerance: self.tolerance,
            time_budget: self.time_budget(),
        }
    }

    /// Parameters for each candidate fit of the elbow search. The budget is a
    /// single deadline shared by every fit of the search, so it is left off here.
    pub fn elbow_params(&self) -> KMeansParams {
        KMeansParams { max_iter: self.elbow_max_iter, time_budget: None, ..self.kmeans_params() }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILES[0]));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(dataset) = patch.dataset {
            if let Some(path) = dataset.path {
                self.dataset.path = path;
            }
            if let Some(placeholder_markers) = dataset.placeholder_markers {
                self.dataset.placeholder_markers = placeholder_markers;
            }
        }

        if let Some(clustering) = patch.clustering {
            if let Some(seed) = clustering.seed {
                self.clustering.seed = seed;
            }
            if let Some(max_k) = clustering.max_k {
                self.clustering.max_k = max_k;
            }
            if let Some(n_init) = clustering.n_init {
                self.clustering.n_init = n_init;
            }
            if let Some(max_iter) = clustering.max_iter {
                self.clustering.max_iter = max_iter;
            }
            if let Some(elbow_max_iter) = clustering.elbow_max_iter {
                self.clustering.elbow_max_iter = elbow_max_iter;
            }
            if let Some(tolerance) = clustering.tolerance {
                self.clustering.tolerance = tolerance;
            }
            if let Some(time_budget_secs) = clustering.time_budget_secs {
                self.clustering.time_budget_secs = time_budget_secs;
            }
        }

        if let Some(insights) = patch.insights {
            if let Some(outlier_z_threshold) = insights.outlier_z_threshold {
                self.insights.outlier_z_threshold = outlier_z_threshold;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("SKINMATCH_DATASET_PATH") {
            self.dataset.path = PathBuf::from(value);
        }
        if let Some(value) = read_env("SKINMATCH_DATASET_PLACEHOLDER_MARKERS") {
            self.dataset.placeholder_markers = parse_list(&value);
        }

        if let Some(value) = read_env("SKINMATCH_CLUSTERING_SEED") {
            self.clustering.seed = parse_u64("SKINMATCH_CLUSTERING_SEED", &value)?;
        }
        if let Some(value) = read_env("SKINMATCH_CLUSTERING_MAX_K") {
            self.clustering.max_k = parse_usize("SKINMATCH_CLUSTERING_MAX_K", &value)?;
        }
        if let Some(value) = read_env("SKINMATCH_CLUSTERING_N_INIT") {
            self.clustering.n_init = parse_usize("SKINMATCH_CLUSTERING_N_INIT", &value)?;
        }
        if let Some(value) = read_env("SKINMATCH_CLUSTERING_MAX_ITER") {
            self.clustering.max_iter = parse_usize("SKINMATCH_CLUSTERING_MAX_ITER", &value)?;
        }
        if let Some(value) = read_env("SKINMATCH_CLUSTERING_ELBOW_MAX_ITER") {
            self.clustering.elbow_max_iter = parse_usize("SKINMATCH_CLUSTERING_ELBOW_MAX_ITER", &value)?;
        }
        if let Some(value) = read_env("SKINMATCH_CLUSTERING_TOLERANCE") {
            self.clustering.tolerance = parse_f64("SKINMATCH_CLUSTERING_TOLERANCE", &value)?;
        }
        if let Some(value) = read_env("SKINMATCH_CLUSTERING_TIME_BUDGET_SECS") {
            self.clustering.time_budget_secs = parse_u64("SKINMATCH_CLUSTERING_TIME_BUDGET_SECS", &value)?;
        }

        if let Some(value) = read_env("SKINMATCH_INSIGHTS_OUTLIER_Z_THRESHOLD") {
            self.insights.outlier_z_threshold = parse_f64("SKINMATCH_INSIGHTS_OUTLIER_Z_THRESHOLD", &value)?;
        }

        let log_level = read_env("SKINMATCH_LOGGING_LEVEL").or_else(|| read_env("SKINMATCH_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("SKINMATCH_LOGGING_FORMAT").or_else(|| read_env("SKINMATCH_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(dataset_path) = overrides.dataset_path {
            self.dataset.path = dataset_path;
        }
        if let Some(seed) = overrides.seed {
            self.clustering.seed = seed;
        }
        if let Some(max_k) = overrides.max_k {
            self.clustering.max_k = max_k;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_dataset(&self.dataset)?;
        validate_clustering(&self.clustering)?;
        validate_insights(&self.insights)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// The config file `load` would read for `explicit_path`, if one exists.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    DEFAULT_CONFIG_FILES.into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw =
        fs::read_to_string(path).map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key).map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_dataset(dataset: &DatasetConfig) -> Result<(), ConfigError> {
    if dataset.path.as_os_str().is_empty() {
        return Err(ConfigError::Validation("dataset.path must not be empty".to_string()));
    }

    if dataset.placeholder_markers.iter().any(|marker| marker.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "dataset.placeholder_markers must not contain blank entries".to_string(),
        ));
    }

    Ok(())
}

fn validate_clustering(clustering: &ClusteringConfig) -> Result<(), ConfigError> {
    if clustering.max_k == 0 || clustering.max_k > 100 {
        return Err(ConfigError::Validation("clustering.max_k must be in range 1..=100".to_string()));
    }

    if clustering.n_init == 0 {
        return Err(ConfigError::Validation("clustering.n_init must be greater than zero".to_string()));
    }

    if clustering.max_iter == 0 || clustering.elbow_max_iter == 0 {
        return Err(ConfigError::Validation(
            "clustering.max_iter and clustering.elbow_max_iter must be greater than zero".to_string(),
        ));
    }

    if !clustering.tolerance.is_finite() || clustering.tolerance < 0.0 {
        return Err(ConfigError::Validation(
            "clustering.tolerance must be a finite, non-negative number".to_string(),
        ));
    }

    if clustering.time_budget_secs > 3600 {
        return Err(ConfigError::Validation(
            "clustering.time_budget_secs must be in range 0..=3600 (0 disables the budget)".to_string(),
        ));
    }

    Ok(())
}

fn validate_insights(insights: &InsightsConfig) -> Result<(), ConfigError> {
    if !insights.outlier_z_threshold.is_finite() || insights.outlier_z_threshold <= 0.0 {
        return Err(ConfigError::Validation(
            "insights.outlier_z_threshold must be a positive number".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation("logging.level must be one of trace|debug|info|warn|error".to_string())),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_list(value: &str) -> Vec<String> {
    value.split(',').map(str::trim).filter(|entry| !entry.is_empty()).map(str::to_string).collect()
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() })
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    dataset: Option<DatasetPatch>,
    clustering: Option<ClusteringPatch>,
    insights: Option<InsightsPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatasetPatch {
    path: Option<PathBuf>,
    placeholder_markers: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct ClusteringPatch {
    seed: Option<u64>,
    max_k: Option<usize>,
    n_init: Option<usize>,
    max_iter: Option<usize>,
    elbow_max_iter: Option<usize>,
    tolerance: Option<f64>,
    time_budget_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct InsightsPatch {
    outlier_z_threshold: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
