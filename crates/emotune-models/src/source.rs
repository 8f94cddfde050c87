//! Where pretrained weights come from.

use crate::error::{ModelError, ModelResult};
use emotune_training::RunConfig;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE: &str = "config.json";
pub const WEIGHTS_FILE: &str = "model.safetensors";
pub const TOKENIZER_FILE: &str = "tokenizer.json";

const HUB_URL: &str = "https://huggingface.co";
const MAX_RETRIES: u32 = 2;

/// Files of a resolved checkpoint on local disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
    pub config: Option<PathBuf>,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    Local(PathBuf),
    Hub { repo: String, cache_dir: PathBuf },
}

/// `<user cache dir>/emotune/models`, e.g. `~/.cache/emotune/models` on Linux.
pub fn default_cache_dir() -> ModelResult<PathBuf> {
    dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".cache")))
        .map(|dir| dir.join("emotune").join("models"))
        .ok_or_else(|| {
            ModelError::Source("no user cache directory; set model_cache_dir in the settings".to_string())
        })
}

impl ModelSource {
    pub fn from_config(config: &RunConfig) -> ModelResult<Self> {
        let settings = &config.settings;
        if config.use_remote_model {
            let cache_dir = match &settings.model_cache_dir {
                Some(dir) => dir.clone(),
                None => default_cache_dir()?,
            };
            Ok(Self::Hub { repo: settings.remote_model_repo.clone(), cache_dir })
        } else {
            Ok(Self::Local(settings.local_model_dir.clone()))
        }
    }

    /// Make the checkpoint available locally, downloading hub files once.
    pub fn resolve(&self) -> ModelResult<ModelFiles> {
        match self {
            Self::Local(dir) => local_files(dir),
            Self::Hub { repo, cache_dir } => {
                let dir = cache_dir.join(repo.replace('/', "--"));
                std::fs::create_dir_all(&dir)?;
                let client = HubClient::new()?;
                client.fetch(repo, WEIGHTS_FILE, &dir.join(WEIGHTS_FILE))?;
                client.fetch(repo, TOKENIZER_FILE, &dir.join(TOKENIZER_FILE))?;
                if let Err(err) = client.fetch(repo, CONFIG_FILE, &dir.join(CONFIG_FILE)) {
                    tracing::warn!(repo = %repo, error = %err, "no config.json; using default dimensions");
                }
                local_files(&dir)
            }
        }
    }
}

fn local_files(dir: &Path) -> ModelResult<ModelFiles> {
    if !dir.is_dir() {
        return Err(ModelError::Source(format!("model directory does not exist: {}", dir.display())));
    }
    let weights = dir.join(WEIGHTS_FILE);
    if !weights.is_file() {
        return Err(ModelError::Source(format!("no {} in {}", WEIGHTS_FILE, dir.display())));
    }
    let tokenizer = dir.join(TOKENIZER_FILE);
    if !tokenizer.is_file() {
        return Err(ModelError::Source(format!("no {} in {}", TOKENIZER_FILE, dir.display())));
    }
    let config = Some(dir.join(CONFIG_FILE)).filter(|p| p.is_file());
    Ok(ModelFiles { config, tokenizer, weights })
}

struct HubClient {
    client: reqwest::blocking::Client,
}

impl HubClient {
    fn new() -> ModelResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(600))
            .build()
            .map_err(|e| ModelError::Download(e.to_string()))?;
        Ok(Self { client })
    }

    /// Download `file` from `repo` to `dest` unless it is already there.
    fn fetch(&self, repo: &str, file: &str, dest: &Path) -> ModelResult<()> {
        if dest.is_file() {
            tracing::debug!(path = %dest.display(), "using cached file");
            return Ok(());
        }
        let url = format!("{HUB_URL}/{repo}/resolve/main/{file}");
        tracing::info!(%url, "downloading");

        let response = self.get_with_retry(&url)?;
        let bytes = response.bytes().map_err(|e| ModelError::Download(format!("{url}: {e}")))?;

        let dir = dest.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.persist(dest).map_err(|e| ModelError::Io(e.error))?;
        Ok(())
    }

    fn get_with_retry(&self, url: &str) -> ModelResult<reqwest::blocking::Response> {
        let mut last_error = None;
        for attempt in 0..=MAX_RETRIES {
            match self.client.get(url).send() {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) if response.status().is_server_error() && attempt < MAX_RETRIES => {
                    last_error = Some(format!("status {}", response.status()));
                }
                Ok(response) => {
                    return Err(ModelError::Download(format!("{url}: status {}", response.status())));
                }
                Err(e) => last_error = Some(e.to_string()),
            }
            if attempt < MAX_RETRIES {
                std::thread::sleep(Duration::from_millis(500 * u64::from(attempt + 1)));
            }
        }
        Err(ModelError::Download(format!(
            "{url}: {}",
            last_error.unwrap_or_else(|| "no response".to_string())
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emotune_training::{ConfigResolver, RunSettings};
    use tempfile::TempDir;

    #[test]
    fn test_source_follows_use_remote_model() {
        let local = ConfigResolver::default().resolve(&[".", "head", "1", "false"]).unwrap();
        assert!(matches!(ModelSource::from_config(&local).unwrap(), ModelSource::Local(_)));

        let remote = ConfigResolver::default().resolve(&[".", "head", "1", "TRUE"]).unwrap();
        match ModelSource::from_config(&remote).unwrap() {
            ModelSource::Hub { repo, .. } => assert_eq!(repo, "bert-base-uncased"),
            ModelSource::Local(_) => panic!("expected hub source"),
        }
    }

    #[test]
    fn test_local_source_requires_weights_and_tokenizer() {
        let temp = TempDir::new().unwrap();
        let source = ModelSource::Local(temp.path().to_path_buf());
        assert!(matches!(source.resolve(), Err(ModelError::Source(_))));

        std::fs::write(temp.path().join(WEIGHTS_FILE), b"").unwrap();
        assert!(matches!(source.resolve(), Err(ModelError::Source(_))));

        std::fs::write(temp.path().join(TOKENIZER_FILE), b"{}").unwrap();
        let files = source.resolve().unwrap();
        assert_eq!(files.config, None);
        assert_eq!(files.weights, temp.path().join(WEIGHTS_FILE));
        assert_eq!(files.tokenizer, temp.path().join(TOKENIZER_FILE));
    }

    #[test]
    fn test_default_cache_dir_is_absolute() {
        let dir = default_cache_dir().unwrap();
        assert!(dir.is_absolute());
        assert!(dir.ends_with("emotune/models"));
    }

    #[test]
    fn test_configured_cache_dir_wins() {
        let settings = RunSettings { model_cache_dir: Some(PathBuf::from("/scratch/models")), ..RunSettings::default() };
        let remote = ConfigResolver::new(settings).resolve(&[".", "head", "1", "true"]).unwrap();
        match ModelSource::from_config(&remote).unwrap() {
            ModelSource::Hub { cache_dir, .. } => assert_eq!(cache_dir, PathBuf::from("/scratch/models")),
            ModelSource::Local(_) => panic!("expected hub source"),
        }
    }

    #[test]
    fn test_missing_local_dir() {
        let source = ModelSource::Local(PathBuf::from("/definitely/not/here"));
        assert!(source.resolve().is_err());
    }
}
