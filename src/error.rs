//! Errors raised while building or running the patch-embedding pipeline.
//!
//! All of these are deterministic: the same configuration or input shape
//! fails the same way every time, so callers should report them instead of
//! retrying.

/// Configuration and shape errors of the ViT model.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VitError {
    /// The image edge is not an exact multiple of the patch edge.
    #[error("image edge {image_edge} is not divisible by patch size {patch_size}")]
    IndivisibleImage { image_edge: usize, patch_size: usize },

    /// Patch extraction only accepts square images.
    #[error("expected a square image, got {height}x{width}")]
    NonSquareImage { height: usize, width: usize },

    /// The sequence length fed to the encoder differs from its positional table.
    #[error("patch count mismatch: encoder expects {expected} patches, got {actual}")]
    PatchCountMismatch { expected: usize, actual: usize },

    /// The per-patch vector width differs from the projection input width.
    #[error("patch dimension mismatch: encoder expects {expected} values per patch, got {actual}")]
    PatchDimMismatch { expected: usize, actual: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, VitError>;
