use std::{fs, path::PathBuf};

use anyhow::{bail, Context, Result};
use burn::{
    data::dataloader::DataLoaderBuilder,
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};

use super::{
    checkpoint,
    metrics::{EpochMetrics, MetricsLogger},
    run_name::unique_run_dir,
};
use crate::config::TrainConfig;
use crate::data::{ImageBatcher, ImageDataset, ImageFolder};
use crate::model::VitClassifier;

/// A dataset directory plus everything needed to train on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingJob {
    pub dataset_dir: PathBuf,
    pub config: TrainConfig,
}

#[derive(Debug, Clone)]
pub struct TrainOutcome {
    pub run_dir: PathBuf,
    pub weights_path: PathBuf,
    pub history: Vec<EpochMetrics>,
}

/// Scans the dataset, builds the network and trains it for the configured
/// number of epochs. Progress lines go to `log` as well as to `tracing`.
pub fn train<B: AutodiffBackend>(
    job: &TrainingJob,
    device: B::Device,
    log: &mut dyn FnMut(String),
) -> Result<TrainOutcome> {
    let mut emit = |line: String| {
        tracing::debug!("{}", line);
        log(line);
    };

    let config = &job.config;
    config.validate()?;
    let size = config.data.input_size;

    let folder = ImageFolder::scan(&job.dataset_dir)?;
    let (train_samples, valid_samples) = folder.split(config.data.train_split);
    if train_samples.is_empty() {
        bail!(
            "No training images found under '{}'",
            job.dataset_dir.display()
        );
    }
    emit(format!(
        "Found {} images belonging to {} classes.",
        train_samples.len(),
        folder.num_classes()
    ));
    emit(format!(
        "Found {} images belonging to {} classes.",
        valid_samples.len(),
        folder.num_classes()
    ));
    emit(format!("Class indices: {}", folder.class_indices()));
    if valid_samples.is_empty() {
        tracing::warn!("Validation split is empty, validation metrics will be NaN");
    }

    let model_config = config.model_config(folder.num_classes());
    let mut model: VitClassifier<B> = model_config.init(&device)?;
    emit(format!(
        "Model built: {} patches of size {}, {} transformer layers, {} parameters",
        model.num_patches(),
        config.vit.patch_size,
        model.depth(),
        model.num_params()
    ));

    let run_dir = unique_run_dir(&config.run.log_root, &config.run.log_name)?;
    let config_json = serde_json::to_string_pretty(job)?;
    fs::write(run_dir.join("config.json"), config_json)
        .with_context(|| format!("Cannot write run config into '{}'", run_dir.display()))?;
    let metrics = MetricsLogger::new(&run_dir)?;
    emit("Starting training...".to_string());
    emit(format!("Logging to {}", run_dir.display()));

    let mut optim = AdamConfig::new().init::<B, VitClassifier<B>>();

    let train_dataset = ImageDataset::new(train_samples, size);
    let valid_dataset = ImageDataset::new(valid_samples, size);
    let train_failures = train_dataset.decode_failures();
    let valid_failures = valid_dataset.decode_failures();

    let train_loader = DataLoaderBuilder::new(ImageBatcher::<B>::new(device.clone(), size))
        .batch_size(config.data.batch_size)
        .shuffle(rand::random())
        .num_workers(1)
        .build(train_dataset);

    let valid_loader =
        DataLoaderBuilder::new(ImageBatcher::<B::InnerBackend>::new(device.clone(), size))
            .batch_size(config.data.batch_size)
            .num_workers(1)
            .build(valid_dataset);

    let epochs = config.run.epochs;
    let mut history = Vec::with_capacity(epochs);
    for epoch in 1..=epochs {
        let mut train_stats = Running::default();
        for batch in train_loader.iter() {
            let (loss, logits) =
                model.forward_classification(batch.images, batch.targets.clone())?;
            train_stats.update(&loss, logits, batch.targets);

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optim.step(config.run.learning_rate, model, grads);
        }

        let model_valid = model.valid();
        let mut valid_stats = Running::default();
        for batch in valid_loader.iter() {
            let (loss, logits) =
                model_valid.forward_classification(batch.images, batch.targets.clone())?;
            valid_stats.update(&loss, logits, batch.targets);
        }

        let m = EpochMetrics {
            epoch,
            loss: train_stats.loss(),
            accuracy: train_stats.accuracy(),
            val_loss: valid_stats.loss(),
            val_accuracy: valid_stats.accuracy(),
        };
        metrics.log(&m)?;
        emit(m.log_line(epochs));
        history.push(m);

        let blank = train_failures.take() + valid_failures.take();
        if blank > 0 {
            tracing::warn!("{} images failed to decode during epoch {}", blank, epoch);
            emit(format!(
                "Epoch {epoch}/{epochs} - undecodable images fed as blank: {blank}"
            ));
        }
    }

    let weights_path = checkpoint::save(
        &model,
        &model_config,
        &config.run.weights_dir,
        config.run.weights_name(),
    )?;
    emit(format!("Weights saved to {}", weights_path.display()));
    emit("Training finished successfully!".to_string());

    Ok(TrainOutcome {
        run_dir,
        weights_path,
        history,
    })
}

/// Sample-weighted loss and accuracy over one pass.
#[derive(Debug, Default)]
struct Running {
    loss_sum: f64,
    correct: usize,
    seen: usize,
}

impl Running {
    fn update<B: Backend>(
        &mut self,
        loss: &Tensor<B, 1>,
        logits: Tensor<B, 2>,
        targets: Tensor<B, 1, Int>,
    ) {
        let [batch_size, _] = logits.dims();
        let loss: f64 = loss.clone().into_scalar().elem();
        self.loss_sum += loss * batch_size as f64;
        self.correct += count_correct(logits, targets);
        self.seen += batch_size;
    }

    fn loss(&self) -> f64 {
        if self.seen == 0 {
            return f64::NAN;
        }
        self.loss_sum / self.seen as f64
    }

    fn accuracy(&self) -> f64 {
        if self.seen == 0 {
            return f64::NAN;
        }
        self.correct as f64 / self.seen as f64
    }
}

fn count_correct<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> usize {
    let predicted = logits.argmax(1).squeeze::<1>(1);
    let correct: i64 = predicted.equal(targets).int().sum().into_scalar().elem();
    correct as usize
}
