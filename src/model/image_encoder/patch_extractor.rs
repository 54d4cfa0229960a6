use burn::prelude::*;

use crate::error::{Result, VitError};

/// Splits square images into non-overlapping, flattened patches.
///
/// Input `(B, S, S, C)`, output `(B, (S/P)^2, P*P*C)`. Patches are ordered
/// row-major over the grid and each patch is flattened row-major with the
/// channel last. There are no weights, only a reshape and a transpose, so
/// gradients flow back unchanged.
#[derive(Module, Clone, Debug)]
pub struct PatchExtractor {
    patch_size: usize,
}

impl PatchExtractor {
    pub fn new(patch_size: usize) -> Self {
        Self { patch_size }
    }

    pub fn patch_size(&self) -> usize {
        self.patch_size
    }

    /// Number of patches along one side of the image.
    pub fn grid_size(&self, image_edge: usize) -> Result<usize> {
        if self.patch_size == 0 || image_edge % self.patch_size != 0 {
            return Err(VitError::IndivisibleImage {
                image_edge,
                patch_size: self.patch_size,
            });
        }

        Ok(image_edge / self.patch_size)
    }

    pub fn num_patches(&self, image_edge: usize) -> Result<usize> {
        let grid = self.grid_size(image_edge)?;
        Ok(grid * grid)
    }

    pub fn patch_dim(&self, channels: usize) -> usize {
        self.patch_size * self.patch_size * channels
    }

    pub fn forward<B: Backend>(&self, images: Tensor<B, 4>) -> Result<Tensor<B, 3>> {
        let [batch_size, height, width, channels] = images.dims();
        if height != width {
            return Err(VitError::NonSquareImage { height, width });
        }
        let grid = self.grid_size(height)?;
        let p = self.patch_size;

        //(b, gh, p, gw, p, c)->(b, gh, gw, p, p, c)
        let patches = images
            .reshape([batch_size, grid, p, grid, p, channels])
            .swap_dims(2, 3)
            .reshape([batch_size, grid * grid, self.patch_dim(channels)]);

        Ok(patches)
    }
}
