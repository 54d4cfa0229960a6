use burn::{
    nn::{
        attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        LayerNorm, LayerNormConfig,
    },
    prelude::*,
};

use crate::model::common::MLPBlock;

/// Pre-norm transformer encoder block with residual connections.
#[derive(Module, Debug)]
pub struct Block<B: Backend> {
    norm1: LayerNorm<B>,
    attn: MultiHeadAttention<B>,
    norm2: LayerNorm<B>,
    mlp: MLPBlock<B>,
}

impl<B: Backend> Block<B> {
    pub fn new(
        dim: usize,
        num_heads: usize,
        mlp_dim: usize,
        attn_dropout: f64,
        norm_eps: f64,
        device: &Device<B>,
    ) -> Self {
        let norm1 = LayerNormConfig::new(dim).with_epsilon(norm_eps).init(device);
        let attn = MultiHeadAttentionConfig::new(dim, num_heads)
            .with_dropout(attn_dropout)
            .init(device);
        let norm2 = LayerNormConfig::new(dim).with_epsilon(norm_eps).init(device);
        let mlp = MLPBlock::new(dim, mlp_dim, device);

        Self {
            norm1,
            attn,
            norm2,
            mlp,
        }
    }

    pub fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 3> {
        let shortcut = input.clone();
        let x = self.norm1.forward(input);
        let x = self.attn.forward(MhaInput::self_attn(x)).context;

        let x = shortcut + x;
        let shortcut = x.clone();
        let x = self.mlp.forward(self.norm2.forward(x));

        shortcut + x
    }
}
