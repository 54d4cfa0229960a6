pub mod common;
pub mod image_encoder;

pub use image_encoder::{
    patch_encoder::PatchEncoder, patch_extractor::PatchExtractor, VitClassifier,
    VitClassifierConfig,
};
