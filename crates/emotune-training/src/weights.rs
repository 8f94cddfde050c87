//! Strategy-specific weight extraction and persistence.
//!
//! A bundle is written as one safetensors file. Tensor names are
//! `<bundle_key>.<parameter_name>`; the metadata records the strategy and
//! the exact key set so empty groups survive a round trip.

use crate::error::{TrainingError, TrainingResult};
use crate::model::{ClassifierModel, ModelLayout, TensorState};
use crate::strategy::{BundleKey, TrainingStrategy};
use safetensors::tensor::{Dtype, SafeTensors, TensorView};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

const META_STRATEGY: &str = "strategy";
const META_KEYS: &str = "bundle_keys";

/// Trained parameter state for exactly the keys of one strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightBundle {
    strategy: TrainingStrategy,
    groups: BTreeMap<BundleKey, BTreeMap<String, TensorState>>,
}

impl WeightBundle {
    #[must_use]
    pub fn strategy(&self) -> TrainingStrategy {
        self.strategy
    }

    #[must_use]
    pub fn keys(&self) -> BTreeSet<BundleKey> {
        self.groups.keys().copied().collect()
    }

    #[must_use]
    pub fn group(&self, key: BundleKey) -> Option<&BTreeMap<String, TensorState>> {
        self.groups.get(&key)
    }

    #[must_use]
    pub fn tensor_count(&self) -> usize {
        self.groups.values().map(BTreeMap::len).sum()
    }

    /// Read a bundle written by [`WeightSelector::persist`].
    pub fn load(path: &Path) -> TrainingResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            TrainingError::Persistence(format!("failed to read {}: {}", path.display(), e))
        })?;
        let safetensors_err =
            |e: safetensors::SafeTensorError| TrainingError::Persistence(format!("{}: {e}", path.display()));

        let (_, metadata) = SafeTensors::read_metadata(&bytes).map_err(safetensors_err)?;
        let info = metadata
            .metadata()
            .as_ref()
            .ok_or_else(|| TrainingError::Persistence("weight bundle has no metadata".to_string()))?;
        let strategy = info
            .get(META_STRATEGY)
            .ok_or_else(|| TrainingError::Persistence("weight bundle metadata lacks strategy".to_string()))?
            .parse::<TrainingStrategy>()
            .map_err(|e| TrainingError::Persistence(e.to_string()))?;

        let mut groups: BTreeMap<BundleKey, BTreeMap<String, TensorState>> = BTreeMap::new();
        if let Some(keys) = info.get(META_KEYS) {
            for key in keys.split(',').filter(|k| !k.is_empty()) {
                groups.insert(BundleKey::from_str(key)?, BTreeMap::new());
            }
        }

        let tensors = SafeTensors::deserialize(&bytes).map_err(safetensors_err)?;
        for (name, view) in tensors.tensors() {
            let (key, param) = name.split_once('.').ok_or_else(|| {
                TrainingError::Persistence(format!("tensor name without bundle key: {name}"))
            })?;
            let key = BundleKey::from_str(key)?;
            if view.dtype() != Dtype::F32 {
                return Err(TrainingError::Persistence(format!("{name}: expected f32, got {:?}", view.dtype())));
            }
            let values = view
                .data()
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect();
            let state = TensorState::new(view.shape().to_vec(), values)?;
            groups.entry(key).or_default().insert(param.to_string(), state);
        }

        Ok(Self { strategy, groups })
    }
}

/// Picks the parameters a strategy persists.
#[derive(Debug, Clone, Default)]
pub struct WeightSelector {
    layout: ModelLayout,
}

impl WeightSelector {
    #[must_use]
    pub fn new(layout: ModelLayout) -> Self {
        Self { layout }
    }

    /// Snapshot exactly the groups `strategy` saves.
    pub fn extract<M: ClassifierModel + ?Sized>(
        &self,
        strategy: TrainingStrategy,
        model: &M,
    ) -> TrainingResult<WeightBundle> {
        let params = model.parameters();
        let mut groups = BTreeMap::new();

        for &key in strategy.profile().bundle_keys {
            let mut states = BTreeMap::new();
            for param in &params {
                let selected = match key.group() {
                    Some(group) => self.layout.group_of(&param.name) == group,
                    None => true,
                };
                if selected {
                    states.insert(param.name.clone(), model.parameter_state(&param.name)?);
                }
            }
            tracing::info!(key = %key, tensors = states.len(), "gathered layer weights");
            groups.insert(key, states);
        }

        Ok(WeightBundle { strategy, groups })
    }

    /// Write the bundle to `path` atomically.
    ///
    /// Bytes go to a temporary file in the target directory which is then
    /// renamed over `path`; on any failure nothing is left at `path`.
    pub fn persist(&self, bundle: &WeightBundle, path: &Path) -> TrainingResult<()> {
        let persistence = |what: &str, e: &dyn std::fmt::Display| {
            TrainingError::Persistence(format!("{what} {}: {e}", path.display()))
        };

        let mut buffers: Vec<(String, Vec<usize>, Vec<u8>)> = Vec::with_capacity(bundle.tensor_count());
        for (key, states) in &bundle.groups {
            for (name, state) in states {
                let bytes = state.values.iter().flat_map(|v| v.to_le_bytes()).collect();
                buffers.push((format!("{key}.{name}"), state.shape.clone(), bytes));
            }
        }

        let mut views = Vec::with_capacity(buffers.len());
        for (name, shape, bytes) in &buffers {
            let view = TensorView::new(Dtype::F32, shape.clone(), bytes)
                .map_err(|e| persistence("failed to encode tensor for", &e))?;
            views.push((name.clone(), view));
        }

        let keys: Vec<&str> = bundle.groups.keys().map(|k| k.as_str()).collect();
        let metadata = HashMap::from([
            (META_STRATEGY.to_string(), bundle.strategy.cli_name().to_string()),
            (META_KEYS.to_string(), keys.join(",")),
        ]);
        let serialized = safetensors::serialize(views, &Some(metadata))
            .map_err(|e| persistence("failed to serialize", &e))?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| persistence("cannot create temporary file for", &e))?;
        tmp.write_all(&serialized)
            .map_err(|e| persistence("failed to write", &e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| persistence("failed to sync", &e))?;
        tmp.persist(path)
            .map_err(|e| persistence("failed to move into place", &e.error))?;

        tracing::info!(path = %path.display(), tensors = bundle.tensor_count(), "layer weights saved");
        Ok(())
    }
}
