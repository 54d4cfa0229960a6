//! Run configuration: dataset loading, ViT hyperparameters and training run.
//!
//! These are the values a user picks before training. They are plain serde
//! structs so a run directory can keep a JSON copy of what produced it.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VitError};
use crate::model::{PatchExtractor, VitClassifierConfig};

/// How images are read from disk and split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataParameters {
    /// Images are resized to `input_size x input_size`.
    pub input_size: usize,
    pub batch_size: usize,
    /// Fraction of each class used for training, the rest is validation.
    pub train_split: f64,
}

impl Default for DataParameters {
    fn default() -> Self {
        Self {
            input_size: 224,
            batch_size: 32,
            train_split: 0.8,
        }
    }
}

impl DataParameters {
    pub fn validate(&self) -> Result<()> {
        if self.input_size == 0 {
            return Err(invalid("input_size must be positive"));
        }
        if self.batch_size == 0 {
            return Err(invalid("batch_size must be positive"));
        }
        if !(self.train_split > 0.0 && self.train_split < 1.0) {
            return Err(invalid(format!(
                "train_split must be between 0 and 1 (e.g. 0.8), got {}",
                self.train_split
            )));
        }
        Ok(())
    }
}

/// Vision Transformer hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitParameters {
    pub patch_size: usize,
    pub projection_dim: usize,
    pub transformer_layers: usize,
    pub num_heads: usize,
    pub mlp_units: usize,
}

impl Default for VitParameters {
    fn default() -> Self {
        Self {
            patch_size: 16,
            projection_dim: 64,
            transformer_layers: 8,
            num_heads: 4,
            mlp_units: 128,
        }
    }
}

impl VitParameters {
    pub fn validate(&self, input_size: usize) -> Result<()> {
        for (name, value) in [
            ("patch_size", self.patch_size),
            ("projection_dim", self.projection_dim),
            ("transformer_layers", self.transformer_layers),
            ("num_heads", self.num_heads),
            ("mlp_units", self.mlp_units),
        ] {
            if value == 0 {
                return Err(invalid(format!("{name} must be positive")));
            }
        }
        if self.projection_dim % self.num_heads != 0 {
            return Err(invalid(format!(
                "num_heads ({}) must divide projection_dim ({})",
                self.num_heads, self.projection_dim
            )));
        }
        PatchExtractor::new(self.patch_size).grid_size(input_size)?;
        Ok(())
    }

    /// Patch count a caller would derive as `(input_size / patch_size)^2`.
    pub fn num_patches(&self, input_size: usize) -> usize {
        let grid = input_size / self.patch_size.max(1);
        grid * grid
    }
}

/// Naming, duration and output locations of one training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunParameters {
    /// Prefix of the run directory and of the weights file.
    pub log_name: String,
    pub epochs: usize,
    pub learning_rate: f64,
    /// Parent of all run directories.
    pub log_root: PathBuf,
    /// Stem of the weights file, `<weights_name>_weights.mpk.gz`.
    /// Falls back to `log_name`.
    pub weights_name: Option<String>,
    pub weights_dir: PathBuf,
}

impl Default for RunParameters {
    fn default() -> Self {
        Self {
            log_name: "vit".to_string(),
            epochs: 20,
            learning_rate: 1e-4,
            log_root: PathBuf::from("logs/fit"),
            weights_name: None,
            weights_dir: PathBuf::from("."),
        }
    }
}

impl RunParameters {
    pub fn weights_name(&self) -> &str {
        self.weights_name.as_deref().unwrap_or(&self.log_name)
    }

    pub fn validate(&self) -> Result<()> {
        let names = [
            ("log_name", self.log_name.as_str()),
            ("weights_name", self.weights_name()),
        ];
        for (field, name) in names {
            if name.trim().is_empty() {
                return Err(invalid(format!("{field} must not be empty")));
            }
            if name.contains(['/', '\\']) {
                return Err(invalid(format!(
                    "{field} must not contain path separators, got '{name}'"
                )));
            }
        }
        if self.epochs == 0 {
            return Err(invalid("epochs must be a positive integer"));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(invalid(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }
}

/// Everything a training run needs besides the dataset itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub data: DataParameters,
    pub vit: VitParameters,
    pub run: RunParameters,
}

impl TrainConfig {
    pub fn validate(&self) -> Result<()> {
        self.data.validate()?;
        self.vit.validate(self.data.input_size)?;
        self.run.validate()
    }

    /// Model configuration for a dataset with `num_classes` classes.
    pub fn model_config(&self, num_classes: usize) -> VitClassifierConfig {
        VitClassifierConfig::new(
            self.data.input_size,
            self.vit.patch_size,
            self.vit.projection_dim,
            self.vit.transformer_layers,
            self.vit.num_heads,
            self.vit.mlp_units,
            num_classes,
        )
        .with_num_patches(Some(self.vit.num_patches(self.data.input_size)))
    }
}

fn invalid(message: impl Into<String>) -> VitError {
    VitError::InvalidConfig(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(TrainConfig::default().validate().is_ok());
    }

    #[test]
    fn split_must_be_strictly_between_zero_and_one() {
        for split in [0.0, 1.0, -0.2, 1.5, f64::NAN] {
            let data = DataParameters {
                train_split: split,
                ..Default::default()
            };
            assert!(data.validate().is_err(), "split {split} accepted");
        }
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let data = DataParameters {
            batch_size: 0,
            ..Default::default()
        };

        assert_eq!(
            data.validate(),
            Err(VitError::InvalidConfig("batch_size must be positive".to_string()))
        );
    }

    #[test]
    fn patch_size_must_divide_input_size() {
        let config = TrainConfig {
            data: DataParameters {
                input_size: 225,
                ..Default::default()
            },
            ..Default::default()
        };

        assert_eq!(
            config.validate(),
            Err(VitError::IndivisibleImage {
                image_edge: 225,
                patch_size: 16
            })
        );
    }

    #[test]
    fn heads_must_divide_projection_dim() {
        let vit = VitParameters {
            projection_dim: 30,
            num_heads: 4,
            ..Default::default()
        };

        assert!(matches!(vit.validate(224), Err(VitError::InvalidConfig(_))));
    }

    #[test]
    fn epochs_and_log_name_are_checked() {
        let run = RunParameters {
            epochs: 0,
            ..Default::default()
        };
        assert!(run.validate().is_err());

        let run = RunParameters {
            log_name: "../escape".to_string(),
            ..Default::default()
        };
        assert!(run.validate().is_err());
    }

    #[test]
    fn weights_name_defaults_to_log_name() {
        let mut run = RunParameters {
            log_name: "flowers".to_string(),
            ..Default::default()
        };
        assert_eq!(run.weights_name(), "flowers");

        run.weights_name = Some("best".to_string());
        assert_eq!(run.weights_name(), "best");
    }

    #[test]
    fn model_config_carries_the_derived_patch_count() {
        let config = TrainConfig::default();

        let model = config.model_config(5);

        assert_eq!(model.num_patches, Some(196));
        assert_eq!(model.num_classes, 5);
        assert_eq!(model.image_size, 224);
        assert!(model.validate().is_ok());
    }
}
