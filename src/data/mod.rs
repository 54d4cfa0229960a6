pub mod batcher;
pub mod dataset;
pub mod folder;

pub use batcher::{ImageBatch, ImageBatcher};
pub use dataset::{DecodeFailures, ImageDataset, ImageItem};
pub use folder::{ImageFolder, ImageSample};

/// Images are always decoded to RGB.
pub const CHANNELS: usize = 3;
