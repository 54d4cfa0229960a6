use burn::{
    nn::{Embedding, EmbeddingConfig, Linear, LinearConfig},
    prelude::*,
};

use crate::error::{Result, VitError};

/// Projects flattened patches and adds a learned position vector per patch index.
///
/// `out[b, i, :] = projection(patches[b, i, :]) + positional_table[i]`
#[derive(Module, Debug)]
pub struct PatchEncoder<B: Backend> {
    projection: Linear<B>,
    position_embedding: Embedding<B>,
    num_patches: usize,
    patch_dim: usize,
}

impl<B: Backend> PatchEncoder<B> {
    pub fn new(
        num_patches: usize,
        patch_dim: usize,
        projection_dim: usize,
        device: &Device<B>,
    ) -> Self {
        let projection = LinearConfig::new(patch_dim, projection_dim).init(device);
        let position_embedding = EmbeddingConfig::new(num_patches, projection_dim).init(device);

        Self {
            projection,
            position_embedding,
            num_patches,
            patch_dim,
        }
    }

    pub fn num_patches(&self) -> usize {
        self.num_patches
    }

    pub fn patch_dim(&self) -> usize {
        self.patch_dim
    }

    pub fn projection_dim(&self) -> usize {
        self.position_embedding.weight.dims()[1]
    }

    /// Current positional table, shape `(num_patches, projection_dim)`.
    pub fn positional_table(&self) -> Tensor<B, 2> {
        self.position_embedding.weight.val()
    }

    pub fn forward(&self, patches: Tensor<B, 3>) -> Result<Tensor<B, 3>> {
        let [_, num_patches, patch_dim] = patches.dims();
        if num_patches != self.num_patches {
            return Err(VitError::PatchCountMismatch {
                expected: self.num_patches,
                actual: num_patches,
            });
        }
        if patch_dim != self.patch_dim {
            return Err(VitError::PatchDimMismatch {
                expected: self.patch_dim,
                actual: patch_dim,
            });
        }

        let positions = Tensor::<B, 1, Int>::arange(0..self.num_patches as i64, &patches.device())
            .reshape([1, self.num_patches]);

        // (b, n, d) + (1, n, d)
        let encoded = self.projection.forward(patches) + self.position_embedding.forward(positions);

        Ok(encoded)
    }
}
