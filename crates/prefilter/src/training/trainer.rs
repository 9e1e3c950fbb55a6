//! Dense classifier training: one Adam step per `fit` call.

use std::path::Path;

use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use burn::tensor::backend::AutodiffBackend;

use crate::model::bridge::{features_to_tensor, tensor_to_f64, tensor_to_vec, values_to_tensor};
use crate::model::classifier::{UnifyMlp, UnifyMlpConfig};
use crate::model::{ScorerDescriptor, ScoringFunction};
use crate::training::loss::weighted_bce_loss;
use crate::training::metrics::{binary_accuracy, ClassWeights, StepMetrics};

/// Optimizer settings for the dense classifier.
#[derive(Config, Debug)]
pub struct DenseTrainingConfig {
    /// Adam learning rate.
    #[config(default = 1e-3)]
    pub lr: f64,
}

/// The dense [`ScoringFunction`]: a [`UnifyMlp`] plus its optimizer state.
pub struct DenseClassifier<B: AutodiffBackend, O> {
    model: UnifyMlp<B>,
    optimizer: O,
    model_config: UnifyMlpConfig,
    train_config: DenseTrainingConfig,
    device: B::Device,
}

/// Build a freshly initialized dense classifier with an Adam optimizer.
pub fn dense_classifier<B: AutodiffBackend>(
    model_config: UnifyMlpConfig,
    train_config: DenseTrainingConfig,
    device: &B::Device,
) -> DenseClassifier<B, impl Optimizer<UnifyMlp<B>, B>> {
    DenseClassifier {
        model: model_config.init::<B>(device),
        optimizer: AdamConfig::new().init::<B, UnifyMlp<B>>(),
        model_config,
        train_config,
        device: device.clone(),
    }
}

impl<B, O> ScoringFunction for DenseClassifier<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<UnifyMlp<B>, B>,
{
    fn descriptor(&self) -> ScorerDescriptor {
        ScorerDescriptor::Dense {
            hidden1: self.model_config.hidden1,
            hidden2: self.model_config.hidden2,
            learning_rate: self.train_config.lr,
        }
    }

    fn input_dim(&self) -> usize {
        self.model_config.input_dim
    }

    fn fit(
        &mut self,
        features: &[Vec<f32>],
        targets: &[f32],
        weights: Option<ClassWeights>,
    ) -> anyhow::Result<StepMetrics> {
        anyhow::ensure!(
            features.len() == targets.len(),
            "{} feature rows for {} targets",
            features.len(),
            targets.len()
        );
        let n = targets.len();

        let x = features_to_tensor::<B>(features, &self.device)?;
        let y = values_to_tensor::<B>(targets, &self.device);
        let w = match weights {
            Some(w) => values_to_tensor::<B>(&w.per_example(targets), &self.device),
            None => Tensor::<B, 1>::ones([n], &self.device),
        };

        let probs = self.model.forward(x);
        let accuracy = binary_accuracy(&tensor_to_vec(probs.clone().inner()), targets);

        let loss = weighted_bce_loss(probs, y, w);
        let loss_val = tensor_to_f64(loss.clone().inner());

        let grads = GradientsParams::from_grads(loss.backward(), &self.model);
        self.model = self
            .optimizer
            .step(self.train_config.lr, self.model.clone(), grads);

        Ok(StepMetrics {
            loss: loss_val,
            accuracy,
            examples: n,
        })
    }

    fn predict(&self, features: &[Vec<f32>]) -> anyhow::Result<Vec<f64>> {
        if features.is_empty() {
            return Ok(vec![]);
        }
        let model = self.model.valid();
        let x = features_to_tensor::<B::InnerBackend>(features, &self.device)?;
        Ok(tensor_to_vec(model.forward(x)))
    }

    fn save_params(&self, path: &Path) -> anyhow::Result<()> {
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        self.model
            .clone()
            .save_file(path.to_path_buf(), &recorder)
            .map_err(|e| anyhow::anyhow!("Failed to save model to {}: {e}", path.display()))
    }

    fn load_params(&mut self, path: &Path) -> anyhow::Result<()> {
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        self.model = self
            .model_config
            .init::<B>(&self.device)
            .load_file(path.to_path_buf(), &recorder, &self.device)
            .map_err(|e| anyhow::anyhow!("Failed to load model from {}: {e}", path.display()))?;
        Ok(())
    }
}
