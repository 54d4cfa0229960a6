use std::path::PathBuf;

use clap::{Args, Subcommand};
use vit_burn::config::{DataParameters, RunParameters, VitParameters};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan a dataset directory and print the train/validation split
    Dataset(DatasetArgs),

    /// Build the network for a dataset and print its shape
    Build(BuildArgs),

    /// Train on a dataset, streaming progress to stdout
    Train(TrainArgs),
}

/// How images are loaded and split.
#[derive(Args, Debug, Clone)]
pub struct DataArgs {
    /// Images are resized to this square edge
    #[arg(long, default_value_t = 224)]
    pub input_size: usize,

    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    /// Fraction of each class used for training (the rest is validation)
    #[arg(long, default_value_t = 0.8)]
    pub train_split: f64,
}

impl From<DataArgs> for DataParameters {
    fn from(a: DataArgs) -> Self {
        DataParameters {
            input_size: a.input_size,
            batch_size: a.batch_size,
            train_split: a.train_split,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct VitArgs {
    /// Edge of the square patches; must divide --input-size
    #[arg(long, default_value_t = 16)]
    pub patch_size: usize,

    #[arg(long, default_value_t = 64)]
    pub projection_dim: usize,

    #[arg(long, default_value_t = 8)]
    pub transformer_layers: usize,

    /// Attention heads; must divide --projection-dim
    #[arg(long, default_value_t = 4)]
    pub num_heads: usize,

    #[arg(long, default_value_t = 128)]
    pub mlp_units: usize,
}

impl From<VitArgs> for VitParameters {
    fn from(a: VitArgs) -> Self {
        VitParameters {
            patch_size: a.patch_size,
            projection_dim: a.projection_dim,
            transformer_layers: a.transformer_layers,
            num_heads: a.num_heads,
            mlp_units: a.mlp_units,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Prefix of the run directory
    #[arg(long, default_value = "vit")]
    pub log_name: String,

    #[arg(long, default_value_t = 20)]
    pub epochs: usize,

    #[arg(long, default_value_t = 1e-4)]
    pub learning_rate: f64,

    /// Parent directory of all runs
    #[arg(long, default_value = "logs/fit")]
    pub log_root: PathBuf,

    /// Weights are saved as <NAME>_weights.mpk.gz (defaults to --log-name)
    #[arg(long)]
    pub weights_name: Option<String>,

    #[arg(long, default_value = ".")]
    pub weights_dir: PathBuf,
}

impl From<RunArgs> for RunParameters {
    fn from(a: RunArgs) -> Self {
        RunParameters {
            log_name: a.log_name,
            epochs: a.epochs,
            learning_rate: a.learning_rate,
            log_root: a.log_root,
            weights_name: a.weights_name,
            weights_dir: a.weights_dir,
        }
    }
}

#[derive(Args, Debug)]
pub struct DatasetArgs {
    /// Directory with one sub-directory of images per class
    pub dir: PathBuf,

    #[command(flatten)]
    pub data: DataArgs,
}

#[derive(Args, Debug)]
pub struct BuildArgs {
    pub dir: PathBuf,

    #[command(flatten)]
    pub data: DataArgs,

    #[command(flatten)]
    pub vit: VitArgs,
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    pub dir: PathBuf,

    #[command(flatten)]
    pub data: DataArgs,

    #[command(flatten)]
    pub vit: VitArgs,

    #[command(flatten)]
    pub run: RunArgs,
}
