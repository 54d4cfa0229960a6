use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{HalfPrecisionSettings, NamedMpkGzFileRecorder, Recorder},
};

use crate::model::{VitClassifier, VitClassifierConfig};

/// Gzipped MessagePack at half precision, written as `<stem>.mpk.gz`.
type WeightsRecorder = NamedMpkGzFileRecorder<HalfPrecisionSettings>;

/// Recorder path without extension; the recorder appends `.mpk.gz`.
fn weights_stem(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}_weights"))
}

fn config_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}_config.json"))
}

/// Final location of the weights written by [`save`].
pub fn weights_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}_weights.mpk.gz"))
}

/// Writes `<name>_weights.mpk.gz` and `<name>_config.json` into `dir`.
pub fn save<B: Backend>(
    model: &VitClassifier<B>,
    config: &VitClassifierConfig,
    dir: &Path,
    name: &str,
) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Cannot create weights directory '{}'", dir.display()))?;

    let stem = weights_stem(dir, name);
    WeightsRecorder::new()
        .record(model.clone().into_record(), stem.clone())
        .with_context(|| format!("Failed to save weights to '{}'", stem.display()))?;

    let json = serde_json::to_string_pretty(config)?;
    let config_path = config_path(dir, name);
    fs::write(&config_path, json)
        .with_context(|| format!("Cannot write '{}'", config_path.display()))?;

    let path = weights_path(dir, name);
    tracing::debug!("Saved weights to '{}'", path.display());
    Ok(path)
}

/// Rebuilds the network from its saved config and restores the weights.
pub fn load<B: Backend>(
    dir: &Path,
    name: &str,
    device: &B::Device,
) -> Result<(VitClassifier<B>, VitClassifierConfig)> {
    let config_path = config_path(dir, name);
    let json = fs::read_to_string(&config_path)
        .with_context(|| format!("Cannot read '{}'", config_path.display()))?;
    let config: VitClassifierConfig = serde_json::from_str(&json)
        .with_context(|| format!("Invalid model config in '{}'", config_path.display()))?;

    let model = config.init::<B>(device)?;
    let stem = weights_stem(dir, name);
    let record = WeightsRecorder::new()
        .load(stem.clone(), device)
        .with_context(|| format!("Cannot load weights '{}'", stem.display()))?;

    Ok((model.load_record(record), config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray;

    #[test]
    fn saved_weights_reload_to_the_same_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let device = Default::default();
        let config = VitClassifierConfig::new(32, 16, 16, 1, 4, 32, 3).with_num_patches(Some(4));
        let model = config.init::<TestBackend>(&device).unwrap();

        let path = save(&model, &config, dir.path(), "tiny").unwrap();
        let (restored, restored_config) = load::<TestBackend>(dir.path(), "tiny", &device).unwrap();

        assert_eq!(path, dir.path().join("tiny_weights.mpk.gz"));
        assert!(path.is_file());
        let mut written: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        written.sort();
        assert_eq!(written, vec!["tiny_config.json", "tiny_weights.mpk.gz"]);
        assert_eq!(restored_config.num_patches, Some(4));

        let images =
            Tensor::<TestBackend, 4>::random([2, 32, 32, 3], Distribution::Default, &device);
        let expected = model.forward(images.clone()).unwrap();
        let actual = restored.forward(images).unwrap();
        // weights are stored at half precision
        expected.into_data().assert_approx_eq(&actual.into_data(), 2);
    }

    #[test]
    fn loading_a_missing_checkpoint_is_an_error() {
        let dir = tempfile::tempdir().unwrap();

        assert!(load::<TestBackend>(dir.path(), "nothing", &Default::default()).is_err());
    }
}
