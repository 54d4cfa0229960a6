pub mod commands;

use anyhow::{bail, Result};
use burn::{backend::NdArray, module::Module};
use clap::Parser;
use commands::{BuildArgs, Commands, DatasetArgs, TrainArgs};
use vit_burn::{
    config::{DataParameters, TrainConfig, VitParameters},
    data::ImageFolder,
    train::{TrainerThread, TrainingJob},
};

#[derive(Parser, Debug)]
#[command(
    name = "vit_burn",
    version,
    about = "Configure, build and train a Vision Transformer image classifier."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Dataset(args) => run_dataset(args),
            Commands::Build(args) => run_build(args),
            Commands::Train(args) => run_train(args),
        }
    }
}

fn run_dataset(args: DatasetArgs) -> Result<()> {
    let data = DataParameters::from(args.data);
    data.validate()?;

    let folder = ImageFolder::scan(&args.dir)?;
    let (train, validation) = folder.split(data.train_split);

    println!(
        "Found {} images belonging to {} classes.",
        train.len(),
        folder.num_classes()
    );
    println!(
        "Found {} images belonging to {} classes.",
        validation.len(),
        folder.num_classes()
    );
    println!("Class indices: {}", folder.class_indices());
    Ok(())
}

fn run_build(args: BuildArgs) -> Result<()> {
    let config = TrainConfig {
        data: DataParameters::from(args.data),
        vit: VitParameters::from(args.vit),
        ..Default::default()
    };
    config.data.validate()?;
    config.vit.validate(config.data.input_size)?;

    let folder = ImageFolder::scan(&args.dir)?;
    let model_config = config.model_config(folder.num_classes());
    let model = model_config.init::<NdArray>(&Default::default())?;

    println!("{}", serde_json::to_string_pretty(&model_config)?);
    println!(
        "Patches per image: {} ({}x{} of {} values)",
        model.num_patches(),
        config.vit.patch_size,
        config.vit.patch_size,
        config.vit.patch_size * config.vit.patch_size * model_config.channels
    );
    println!("Transformer layers: {}", model.depth());
    println!("Classes: {}", folder.num_classes());
    println!("Trainable parameters: {}", model.num_params());
    Ok(())
}

fn run_train(args: TrainArgs) -> Result<()> {
    let job = TrainingJob {
        dataset_dir: args.dir,
        config: TrainConfig {
            data: args.data.into(),
            vit: args.vit.into(),
            run: args.run.into(),
        },
    };
    tracing::info!("Starting training on {}", job.dataset_dir.display());

    let handle = TrainerThread::spawn(job)?;
    if !handle.wait(|line| println!("{line}")) {
        bail!("Training did not complete");
    }
    Ok(())
}
