use burn::{
    nn::{Gelu, Linear, LinearConfig},
    prelude::*,
};

/// Two dense layers with a GELU in between: `dim -> mlp_dim -> dim`.
#[derive(Module, Debug)]
pub struct MLPBlock<B: Backend> {
    lin1: Linear<B>,
    lin2: Linear<B>,
    act: Gelu,
}

impl<B: Backend> MLPBlock<B> {
    pub fn new(embedding_dim: usize, mlp_dim: usize, device: &Device<B>) -> Self {
        let lin1 = LinearConfig::new(embedding_dim, mlp_dim).init(device);
        let lin2 = LinearConfig::new(mlp_dim, embedding_dim).init(device);
        let act = Gelu::new();

        Self { lin1, lin2, act }
    }

    pub fn forward<const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        let x = self.lin1.forward(x);
        let x = self.act.forward(x);
        self.lin2.forward(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn mlp_keeps_the_embedding_width() {
        let device = Default::default();
        let mlp = MLPBlock::<NdArray>::new(8, 32, &device);

        let out = mlp.forward(Tensor::<NdArray, 3>::ones([2, 5, 8], &device));

        assert_eq!(out.dims(), [2, 5, 8]);
    }
}
