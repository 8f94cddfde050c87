//! Strategy-driven parameter freezing.

use crate::error::{TrainingError, TrainingResult};
use crate::model::{ClassifierModel, ModelLayout, ParameterInfo};
use crate::strategy::{ParameterGroup, TrainingStrategy};
use std::collections::BTreeSet;

/// Result of applying a strategy to a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreezeOutcome {
    pub trainable_groups: BTreeSet<ParameterGroup>,
    /// Per-parameter status after the flags were set.
    pub parameters: Vec<ParameterInfo>,
}

impl FreezeOutcome {
    #[must_use]
    pub fn trainable_parameter_count(&self) -> usize {
        self.parameters
            .iter()
            .filter(|p| p.trainable)
            .map(|p| p.shape.iter().product::<usize>())
            .sum()
    }
}

#[derive(Debug, Clone, Default)]
pub struct FreezePolicy {
    layout: ModelLayout,
}

impl FreezePolicy {
    #[must_use]
    pub fn new(layout: ModelLayout) -> Self {
        Self { layout }
    }

    #[must_use]
    pub fn layout(&self) -> &ModelLayout {
        &self.layout
    }

    /// Groups that must exist on the model for `strategy` to apply.
    fn required_groups(strategy: TrainingStrategy) -> &'static [ParameterGroup] {
        match strategy {
            TrainingStrategy::Head | TrainingStrategy::Full => &[ParameterGroup::ClassificationHead],
            TrainingStrategy::HeadPlusOne => &[
                ParameterGroup::ClassificationHead,
                ParameterGroup::FinalEncoderLayer,
                ParameterGroup::PoolingLayer,
            ],
        }
    }

    fn describe(&self, group: ParameterGroup) -> String {
        match group {
            ParameterGroup::ClassificationHead => {
                format!("classification head ({}*)", self.layout.classifier_prefix)
            }
            ParameterGroup::PoolingLayer => format!("pooling layer ({}*)", self.layout.pooler_prefix),
            ParameterGroup::FinalEncoderLayer => format!(
                "encoder layer {} ({}*); the model needs at least {} encoder layers",
                self.layout.final_encoder_layer,
                self.layout.final_encoder_prefix(),
                self.layout.final_encoder_layer + 1
            ),
            ParameterGroup::Backbone => "backbone".to_string(),
        }
    }

    /// Set every parameter's trainable flag for `strategy`.
    ///
    /// Structure is checked before any flag changes, so a mismatch leaves the
    /// model untouched.
    pub fn apply<M: ClassifierModel + ?Sized>(
        &self,
        strategy: TrainingStrategy,
        model: &mut M,
    ) -> TrainingResult<FreezeOutcome> {
        let params = model.parameters();
        let present: BTreeSet<ParameterGroup> =
            params.iter().map(|p| self.layout.group_of(&p.name)).collect();

        for group in Self::required_groups(strategy) {
            if !present.contains(group) {
                return Err(TrainingError::StructuralMismatch(format!(
                    "strategy '{}' needs the {}, which the loaded model does not have",
                    strategy,
                    self.describe(*group)
                )));
            }
        }

        let trainable_groups: BTreeSet<ParameterGroup> =
            strategy.profile().trainable_groups.iter().copied().collect();

        for param in &params {
            let trainable = trainable_groups.contains(&self.layout.group_of(&param.name));
            model.set_trainable(&param.name, trainable)?;
        }

        let parameters = model.parameters();
        let actual: BTreeSet<ParameterGroup> = parameters
            .iter()
            .filter(|p| p.trainable)
            .map(|p| self.layout.group_of(&p.name))
            .collect();
        if !actual.is_subset(&trainable_groups) {
            return Err(TrainingError::StructuralMismatch(format!(
                "model reports trainable groups {:?} outside the '{}' set",
                actual, strategy
            )));
        }

        tracing::info!(
            strategy = %strategy,
            groups = ?trainable_groups,
            "applied freeze policy"
        );

        Ok(FreezeOutcome { trainable_groups, parameters })
    }
}
