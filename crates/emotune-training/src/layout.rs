use crate::error::TrainingResult;
use std::path::{Path, PathBuf};

/// Filesystem layout of one run's artifacts under `output_path`.
#[derive(Debug, Clone)]
pub struct RunLayout {
    root: PathBuf,
}

impl RunLayout {
    pub const WEIGHTS_FILE: &'static str = "selected_layers_state_dict.safetensors";
    pub const SUMMARY_FILE: &'static str = "results.json";

    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn weights_path(&self) -> PathBuf {
        self.root.join(Self::WEIGHTS_FILE)
    }

    #[must_use]
    pub fn summary_path(&self) -> PathBuf {
        self.root.join(Self::SUMMARY_FILE)
    }

    #[must_use]
    pub fn chart_path(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    pub fn ensure_dirs(&self) -> TrainingResult<()> {
        std::fs::create_dir_all(&self.root)?;
        Ok(())
    }
}
