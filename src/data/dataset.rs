use std::{
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use anyhow::{Context, Result};
use burn::data::dataset::Dataset;
use image::imageops::FilterType;

use super::folder::ImageSample;
use super::CHANNELS;

/// One decoded image, channel-last `S x S x 3` in `[0, 1]`, and its class.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageItem {
    pub pixels: Vec<f32>,
    pub label: usize,
}

/// Number of images fed as blank because they failed to decode.
///
/// Clones share the same count, so the trainer can read what the loader's
/// workers recorded.
#[derive(Debug, Clone, Default)]
pub struct DecodeFailures(Arc<AtomicUsize>);

impl DecodeFailures {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }

    /// Returns the count and resets it to zero.
    pub fn take(&self) -> usize {
        self.0.swap(0, Ordering::Relaxed)
    }

    fn record(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }
}

/// Decodes images lazily from disk at a fixed square size.
#[derive(Debug, Clone)]
pub struct ImageDataset {
    samples: Vec<ImageSample>,
    image_size: usize,
    failures: DecodeFailures,
}

impl ImageDataset {
    pub fn new(samples: Vec<ImageSample>, image_size: usize) -> Self {
        Self {
            samples,
            image_size,
            failures: DecodeFailures::default(),
        }
    }

    pub fn image_size(&self) -> usize {
        self.image_size
    }

    pub fn decode_failures(&self) -> DecodeFailures {
        self.failures.clone()
    }
}

impl Dataset<ImageItem> for ImageDataset {
    fn get(&self, index: usize) -> Option<ImageItem> {
        let sample = self.samples.get(index)?;

        // A `None` here ends the loader's epoch early, so a file that became
        // unreadable after scanning is fed as a blank image instead.
        let pixels = match load_image(&sample.path, self.image_size) {
            Ok(pixels) => pixels,
            Err(err) => {
                tracing::warn!("{:#}, using a blank image", err);
                self.failures.record();
                vec![0.0; self.image_size * self.image_size * CHANNELS]
            }
        };

        Some(ImageItem {
            pixels,
            label: sample.label,
        })
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

/// Reads an image, resizes it to `size x size` and rescales it by `1/255`.
pub fn load_image(path: &Path, size: usize) -> Result<Vec<f32>> {
    let image = image::open(path)
        .with_context(|| format!("Cannot decode image '{}'", path.display()))?;
    let edge = u32::try_from(size).context("Image size does not fit in u32")?;

    let rgb = image.resize_exact(edge, edge, FilterType::Nearest).to_rgb8();

    Ok(rgb.into_raw().into_iter().map(|v| v as f32 / 255.0).collect())
}
