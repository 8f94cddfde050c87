//! Run configuration.
//!
//! A run is configured from up to four positional values, merged with an
//! optional TOML settings file and a few environment overrides.
//!
//! Precedence:
//! 1. Positional CLI values
//! 2. Environment variables (`EMOTUNE_*`)
//! 3. Settings file (`--config`, `EMOTUNE_CONFIG`, or `./emotune.toml`)
//! 4. Defaults

use crate::error::{TrainingError, TrainingResult};
use crate::strategy::{HyperParameters, STRATEGY_CHOICES, TrainingStrategy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_NUM_EPOCHS: usize = 10;
pub const DEFAULT_SAMPLE_COUNT: usize = 10;
pub const DEFAULT_LOCAL_MODEL_DIR: &str = "/opt/models/bert-base-uncased";
pub const DEFAULT_REMOTE_MODEL_REPO: &str = "bert-base-uncased";
pub const DEFAULT_DATASET_DIR: &str = "data/go_emotions";
pub const DEFAULT_MAX_SEQ_LEN: usize = 64;

/// Usage line printed on argument errors.
#[must_use]
pub fn usage() -> String {
    format!(
        "Usage: emotune [output_path] [train_strategy ({STRATEGY_CHOICES})] [num_epochs] [use_remote_model (true|false)]"
    )
}

/// Resolved, immutable configuration for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub output_path: PathBuf,
    pub strategy: TrainingStrategy,
    pub num_epochs: usize,
    pub use_remote_model: bool,
    pub hyperparams: HyperParameters,
    pub settings: RunSettings,
}

impl RunConfig {
    /// The seed for sampling, if one was configured.
    #[must_use]
    pub fn seed(&self) -> Option<u64> {
        self.settings.seed
    }
}

/// Validates positional run arguments.
#[derive(Debug, Default)]
pub struct ConfigResolver {
    settings: RunSettings,
}

impl ConfigResolver {
    #[must_use]
    pub fn new(settings: RunSettings) -> Self {
        Self { settings }
    }

    /// Resolve `[output_path] [train_strategy] [num_epochs] [use_remote_model]`.
    pub fn resolve<S: AsRef<str>>(&self, positional: &[S]) -> TrainingResult<RunConfig> {
        if positional.len() > 4 {
            return Err(TrainingError::InvalidArgument(format!(
                "expected at most 4 positional arguments, got {}",
                positional.len()
            )));
        }
        let args: Vec<&str> = positional.iter().map(AsRef::as_ref).collect();
        let arg = |idx: usize| args.get(idx).copied();

        let output_path = arg(0).map_or_else(|| PathBuf::from("."), PathBuf::from);
        let strategy = match arg(1) {
            Some(raw) => raw.parse::<TrainingStrategy>()?,
            None => TrainingStrategy::default(),
        };
        let num_epochs = match arg(2) {
            Some(raw) => raw.trim().parse::<usize>().map_err(|_| {
                TrainingError::InvalidArgument(format!(
                    "num_epochs must be a non-negative integer, got '{raw}'"
                ))
            })?,
            None => DEFAULT_NUM_EPOCHS,
        };
        let use_remote_model = arg(3).is_some_and(|raw| raw.trim().eq_ignore_ascii_case("true"));

        Ok(RunConfig {
            output_path,
            strategy,
            num_epochs,
            use_remote_model,
            hyperparams: HyperParameters::for_strategy(strategy),
            settings: self.settings.clone(),
        })
    }
}

/// Optional settings that are not part of the positional surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSettings {
    #[serde(default = "default_dataset_dir")]
    pub dataset_dir: PathBuf,

    #[serde(default = "default_local_model_dir")]
    pub local_model_dir: PathBuf,

    #[serde(default = "default_remote_model_repo")]
    pub remote_model_repo: String,

    /// Where downloaded hub weights are cached.
    #[serde(default)]
    pub model_cache_dir: Option<PathBuf>,

    /// Seed for batch shuffling and prediction sampling. Unset draws from OS entropy.
    #[serde(default)]
    pub seed: Option<u64>,

    #[serde(default = "default_sample_count")]
    pub sample_count: usize,

    #[serde(default = "default_max_seq_len")]
    pub max_seq_len: usize,
}

fn default_dataset_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DATASET_DIR)
}

fn default_local_model_dir() -> PathBuf {
    PathBuf::from(DEFAULT_LOCAL_MODEL_DIR)
}

fn default_remote_model_repo() -> String {
    DEFAULT_REMOTE_MODEL_REPO.to_string()
}

fn default_sample_count() -> usize {
    DEFAULT_SAMPLE_COUNT
}

fn default_max_seq_len() -> usize {
    DEFAULT_MAX_SEQ_LEN
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            dataset_dir: default_dataset_dir(),
            local_model_dir: default_local_model_dir(),
            remote_model_repo: default_remote_model_repo(),
            model_cache_dir: None,
            seed: None,
            sample_count: DEFAULT_SAMPLE_COUNT,
            max_seq_len: DEFAULT_MAX_SEQ_LEN,
        }
    }
}

/// Partial settings as read from a file; absent keys keep the lower layer.
#[derive(Debug, Clone, Default, Deserialize)]
struct SettingsFile {
    dataset_dir: Option<PathBuf>,
    local_model_dir: Option<PathBuf>,
    remote_model_repo: Option<String>,
    model_cache_dir: Option<PathBuf>,
    seed: Option<u64>,
    sample_count: Option<usize>,
    max_seq_len: Option<usize>,
}

impl RunSettings {
    pub const CONFIG_ENV: &'static str = "EMOTUNE_CONFIG";

    /// Default local settings file path.
    pub fn default_local_path() -> PathBuf {
        PathBuf::from("emotune.toml")
    }

    /// Load settings from a TOML file on top of the defaults.
    pub fn load_from_file(path: &Path) -> TrainingResult<Self> {
        let mut settings = Self::default();
        settings.merge_file(path)?;
        Ok(settings)
    }

    /// Discover and load settings.
    ///
    /// An explicit path must exist. Otherwise `EMOTUNE_CONFIG` is tried, then
    /// `./emotune.toml`; a missing discovered file just keeps the defaults.
    /// Environment overrides are applied last.
    pub fn discover_and_load(explicit: Option<&Path>) -> TrainingResult<Self> {
        let mut settings = Self::default();

        if let Some(path) = explicit {
            settings.merge_file(path)?;
        } else {
            let discovered = std::env::var(Self::CONFIG_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|_| Self::default_local_path());
            if discovered.exists() {
                settings.merge_file(&discovered)?;
            }
        }

        settings.apply_env(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    fn merge_file(&mut self, path: &Path) -> TrainingResult<()> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TrainingError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let file: SettingsFile = toml::from_str(&content).map_err(|e| {
            TrainingError::Config(format!("failed to parse {}: {}", path.display(), e))
        })?;
        self.merge(file);
        Ok(())
    }

    fn merge(&mut self, other: SettingsFile) {
        if let Some(dataset_dir) = other.dataset_dir {
            self.dataset_dir = dataset_dir;
        }
        if let Some(local_model_dir) = other.local_model_dir {
            self.local_model_dir = local_model_dir;
        }
        if let Some(repo) = other.remote_model_repo {
            self.remote_model_repo = repo;
        }
        if other.model_cache_dir.is_some() {
            self.model_cache_dir = other.model_cache_dir;
        }
        if other.seed.is_some() {
            self.seed = other.seed;
        }
        if let Some(sample_count) = other.sample_count {
            self.sample_count = sample_count;
        }
        if let Some(max_seq_len) = other.max_seq_len {
            self.max_seq_len = max_seq_len;
        }
    }

    /// Apply `EMOTUNE_DATASET_DIR`, `EMOTUNE_MODEL_DIR` and `EMOTUNE_SEED`.
    pub fn apply_env<F>(&mut self, lookup: F) -> TrainingResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("EMOTUNE_DATASET_DIR") {
            self.dataset_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("EMOTUNE_MODEL_DIR") {
            self.local_model_dir = PathBuf::from(dir);
        }
        if let Some(seed) = lookup("EMOTUNE_SEED") {
            let seed = seed.trim().parse::<u64>().map_err(|_| {
                TrainingError::Config(format!("EMOTUNE_SEED must be an unsigned integer, got '{seed}'"))
            })?;
            self.seed = Some(seed);
        }
        Ok(())
    }
}
