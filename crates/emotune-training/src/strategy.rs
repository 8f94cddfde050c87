use crate::error::{TrainingError, TrainingResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Values accepted on the command line, in usage order.
pub const STRATEGY_CHOICES: &str = "head, full, head+1";

/// Which part of the classifier is fine-tuned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingStrategy {
    Head,
    HeadPlusOne,
    Full,
}

/// Logical parameter groups of a sequence classifier.
///
/// `FinalEncoderLayer` and `PoolingLayer` live inside the backbone; a
/// parameter is assigned to the most specific group that matches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterGroup {
    Backbone,
    ClassificationHead,
    FinalEncoderLayer,
    PoolingLayer,
}

impl ParameterGroup {
    pub const ALL: [ParameterGroup; 4] = [
        ParameterGroup::Backbone,
        ParameterGroup::ClassificationHead,
        ParameterGroup::FinalEncoderLayer,
        ParameterGroup::PoolingLayer,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Backbone => "backbone",
            Self::ClassificationHead => "classification_head",
            Self::FinalEncoderLayer => "final_encoder_layer",
            Self::PoolingLayer => "pooling_layer",
        }
    }
}

impl fmt::Display for ParameterGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level keys of a persisted weight bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BundleKey {
    ClassificationHead,
    FinalEncoderLayer,
    PoolingLayer,
    FullModel,
}

impl BundleKey {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClassificationHead => "classification_head",
            Self::FinalEncoderLayer => "final_encoder_layer",
            Self::PoolingLayer => "pooling_layer",
            Self::FullModel => "full_model",
        }
    }

    /// The parameter group a key snapshots, `None` for the whole model.
    #[must_use]
    pub fn group(self) -> Option<ParameterGroup> {
        match self {
            Self::ClassificationHead => Some(ParameterGroup::ClassificationHead),
            Self::FinalEncoderLayer => Some(ParameterGroup::FinalEncoderLayer),
            Self::PoolingLayer => Some(ParameterGroup::PoolingLayer),
            Self::FullModel => None,
        }
    }
}

impl fmt::Display for BundleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BundleKey {
    type Err = TrainingError;

    fn from_str(s: &str) -> TrainingResult<Self> {
        match s {
            "classification_head" => Ok(Self::ClassificationHead),
            "final_encoder_layer" => Ok(Self::FinalEncoderLayer),
            "pooling_layer" => Ok(Self::PoolingLayer),
            "full_model" => Ok(Self::FullModel),
            other => Err(TrainingError::Persistence(format!("unknown bundle key: {other}"))),
        }
    }
}

/// Everything that varies with the strategy, in one place.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrategyProfile {
    pub trainable_groups: &'static [ParameterGroup],
    pub learning_rate: f64,
    pub bundle_keys: &'static [BundleKey],
}

const HEAD_PROFILE: StrategyProfile = StrategyProfile {
    trainable_groups: &[ParameterGroup::ClassificationHead],
    learning_rate: 1e-2,
    bundle_keys: &[BundleKey::ClassificationHead],
};

const HEAD_PLUS_ONE_PROFILE: StrategyProfile = StrategyProfile {
    trainable_groups: &[
        ParameterGroup::ClassificationHead,
        ParameterGroup::FinalEncoderLayer,
        ParameterGroup::PoolingLayer,
    ],
    learning_rate: 1e-3,
    bundle_keys: &[
        BundleKey::ClassificationHead,
        BundleKey::FinalEncoderLayer,
        BundleKey::PoolingLayer,
    ],
};

const FULL_PROFILE: StrategyProfile = StrategyProfile {
    trainable_groups: &ParameterGroup::ALL,
    learning_rate: 2e-5,
    bundle_keys: &[BundleKey::FullModel],
};

impl TrainingStrategy {
    #[must_use]
    pub fn profile(self) -> &'static StrategyProfile {
        match self {
            Self::Head => &HEAD_PROFILE,
            Self::HeadPlusOne => &HEAD_PLUS_ONE_PROFILE,
            Self::Full => &FULL_PROFILE,
        }
    }

    #[must_use]
    pub fn learning_rate(self) -> f64 {
        self.profile().learning_rate
    }

    /// Name as typed on the command line.
    #[must_use]
    pub fn cli_name(self) -> &'static str {
        match self {
            Self::Head => "head",
            Self::HeadPlusOne => "head+1",
            Self::Full => "full",
        }
    }

    /// Title-cased name used in chart titles ("Head", "Head+1", "Full").
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::Head => "Head",
            Self::HeadPlusOne => "Head+1",
            Self::Full => "Full",
        }
    }
}

impl Default for TrainingStrategy {
    fn default() -> Self {
        Self::Full
    }
}

impl fmt::Display for TrainingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cli_name())
    }
}

impl FromStr for TrainingStrategy {
    type Err = TrainingError;

    fn from_str(s: &str) -> TrainingResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "head" => Ok(Self::Head),
            "full" => Ok(Self::Full),
            "head+1" | "head_plus_one" => Ok(Self::HeadPlusOne),
            other => Err(TrainingError::InvalidArgument(format!(
                "invalid train method '{other}'. Options: {STRATEGY_CHOICES}"
            ))),
        }
    }
}

/// Optimizer settings fixed for a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HyperParameters {
    pub learning_rate: f64,
    pub batch_size: usize,
    pub weight_decay: f64,
    pub warmup_steps: usize,
}

impl HyperParameters {
    pub const BATCH_SIZE: usize = 32;
    pub const WEIGHT_DECAY: f64 = 1.0;
    pub const WARMUP_STEPS: usize = 500;

    #[must_use]
    pub fn for_strategy(strategy: TrainingStrategy) -> Self {
        Self {
            learning_rate: strategy.learning_rate(),
            batch_size: Self::BATCH_SIZE,
            weight_decay: Self::WEIGHT_DECAY,
            warmup_steps: Self::WARMUP_STEPS,
        }
    }
}
