pub mod block;
pub mod patch_encoder;
pub mod patch_extractor;

use burn::{
    nn::{
        loss::CrossEntropyLossConfig, Dropout, DropoutConfig, Gelu, LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
};

use crate::error::{self, VitError};
use block::Block;
use patch_encoder::PatchEncoder;
use patch_extractor::PatchExtractor;

#[derive(Config, Debug)]
pub struct VitClassifierConfig {
    /// Edge of the square input images.
    pub image_size: usize,
    pub patch_size: usize,
    pub projection_dim: usize,
    pub transformer_layers: usize,
    pub num_heads: usize,
    pub mlp_units: usize,
    pub num_classes: usize,
    #[config(default = 3)]
    pub channels: usize,
    /// Expected patch count; checked against the extractor grid when set.
    pub num_patches: Option<usize>,
    #[config(default = 0.1)]
    pub attention_dropout: f64,
    #[config(default = 0.5)]
    pub head_dropout: f64,
    #[config(default = 1e-6)]
    pub norm_eps: f64,
}

impl VitClassifierConfig {
    /// Patch count produced by the extractor for `image_size`.
    pub fn grid_patches(&self) -> error::Result<usize> {
        PatchExtractor::new(self.patch_size).num_patches(self.image_size)
    }

    pub fn validate(&self) -> error::Result<()> {
        let positive = [
            ("image_size", self.image_size),
            ("patch_size", self.patch_size),
            ("projection_dim", self.projection_dim),
            ("transformer_layers", self.transformer_layers),
            ("num_heads", self.num_heads),
            ("mlp_units", self.mlp_units),
            ("num_classes", self.num_classes),
            ("channels", self.channels),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(VitError::InvalidConfig(format!("{name} must be positive")));
        }
        if self.projection_dim % self.num_heads != 0 {
            return Err(VitError::InvalidConfig(format!(
                "num_heads ({}) must divide projection_dim ({})",
                self.num_heads, self.projection_dim
            )));
        }
        for (name, prob) in [
            ("attention_dropout", self.attention_dropout),
            ("head_dropout", self.head_dropout),
        ] {
            if !(0.0..1.0).contains(&prob) {
                return Err(VitError::InvalidConfig(format!(
                    "{name} must be in [0, 1), got {prob}"
                )));
            }
        }

        let grid_patches = self.grid_patches()?;
        match self.num_patches {
            Some(expected) if expected != grid_patches => Err(VitError::InvalidConfig(format!(
                "num_patches is {expected} but a {0}x{0} image with patch size {1} yields {grid_patches}",
                self.image_size, self.patch_size
            ))),
            _ => Ok(()),
        }
    }

    pub fn init<B: Backend>(&self, device: &Device<B>) -> error::Result<VitClassifier<B>> {
        self.validate()?;

        let patch_extractor = PatchExtractor::new(self.patch_size);
        let num_patches = patch_extractor.num_patches(self.image_size)?;
        let patch_dim = patch_extractor.patch_dim(self.channels);
        let patch_encoder = PatchEncoder::new(num_patches, patch_dim, self.projection_dim, device);

        let blocks = (0..self.transformer_layers)
            .map(|_| {
                Block::new(
                    self.projection_dim,
                    self.num_heads,
                    self.mlp_units,
                    self.attention_dropout,
                    self.norm_eps,
                    device,
                )
            })
            .collect();

        let norm = LayerNormConfig::new(self.projection_dim)
            .with_epsilon(self.norm_eps)
            .init(device);
        let dropout = DropoutConfig::new(self.head_dropout).init();
        let features = LinearConfig::new(num_patches * self.projection_dim, self.mlp_units).init(device);
        let logits = LinearConfig::new(self.mlp_units, self.num_classes).init(device);

        Ok(VitClassifier {
            patch_extractor,
            patch_encoder,
            blocks,
            norm,
            dropout,
            features,
            act: Gelu::new(),
            logits,
        })
    }
}

/// Vision Transformer classifier: patches, encoder blocks, then a dense head.
#[derive(Module, Debug)]
pub struct VitClassifier<B: Backend> {
    patch_extractor: PatchExtractor,
    patch_encoder: PatchEncoder<B>,
    blocks: Vec<Block<B>>,
    norm: LayerNorm<B>,
    dropout: Dropout,
    features: Linear<B>,
    act: Gelu,
    logits: Linear<B>,
}

impl<B: Backend> VitClassifier<B> {
    pub fn num_patches(&self) -> usize {
        self.patch_encoder.num_patches()
    }

    pub fn depth(&self) -> usize {
        self.blocks.len()
    }

    /// Images `(B, S, S, C)` in `[0, 1]` to class logits `(B, num_classes)`.
    pub fn forward(&self, images: Tensor<B, 4>) -> error::Result<Tensor<B, 2>> {
        let patches = self.patch_extractor.forward(images)?;
        let mut x = self.patch_encoder.forward(patches)?;

        for block in &self.blocks {
            x = block.forward(x);
        }

        let x = self.norm.forward(x);
        let [batch_size, num_patches, dim] = x.dims();
        let x = x.reshape([batch_size, num_patches * dim]);
        let x = self.dropout.forward(x);
        let x = self.act.forward(self.features.forward(x));
        let x = self.dropout.forward(x);

        Ok(self.logits.forward(x))
    }

    /// Cross-entropy on the logits, returned with the logits.
    pub fn forward_classification(
        &self,
        images: Tensor<B, 4>,
        targets: Tensor<B, 1, Int>,
    ) -> error::Result<(Tensor<B, 1>, Tensor<B, 2>)> {
        let logits = self.forward(images)?;
        let loss = CrossEntropyLossConfig::new()
            .init(&logits.device())
            .forward(logits.clone(), targets);

        Ok((loss, logits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::{Data, Distribution, Shape};

    type TestBackend = NdArray;

    fn small_config() -> VitClassifierConfig {
        VitClassifierConfig::new(32, 16, 16, 2, 4, 32, 3)
    }

    #[test]
    fn classifier_emits_one_logit_per_class() {
        let device = Default::default();
        let model = small_config().init::<TestBackend>(&device).unwrap();
        let images = Tensor::<TestBackend, 4>::random(
            [2, 32, 32, 3],
            Distribution::Uniform(0.0, 1.0),
            &device,
        );

        let logits = model.forward(images).unwrap();

        assert_eq!(logits.dims(), [2, 3]);
        assert_eq!(model.num_patches(), 4);
        assert_eq!(model.depth(), 2);
    }

    #[test]
    fn classification_loss_is_a_finite_scalar() {
        let device = Default::default();
        let model = small_config().init::<TestBackend>(&device).unwrap();
        let images = Tensor::<TestBackend, 4>::random(
            [2, 32, 32, 3],
            Distribution::Uniform(0.0, 1.0),
            &device,
        );
        let targets = Tensor::<TestBackend, 1, Int>::from_ints(
            Data::new(vec![0, 2], Shape::new([2])),
            &device,
        );

        let (loss, logits) = model.forward_classification(images, targets).unwrap();

        assert_eq!(loss.dims(), [1]);
        assert_eq!(logits.dims(), [2, 3]);
        let loss: f32 = loss.into_scalar().elem();
        assert!(loss.is_finite());
    }

    #[test]
    fn model_built_for_one_size_rejects_another() {
        let device = Default::default();
        let model = small_config().init::<TestBackend>(&device).unwrap();

        let err = model
            .forward(Tensor::zeros([1, 48, 48, 3], &device))
            .unwrap_err();

        assert_eq!(
            err,
            VitError::PatchCountMismatch {
                expected: 4,
                actual: 9
            }
        );
    }

    #[test]
    fn indivisible_image_size_fails_at_construction() {
        let err = VitClassifierConfig::new(225, 16, 16, 1, 4, 32, 2)
            .init::<TestBackend>(&Default::default())
            .unwrap_err();

        assert_eq!(
            err,
            VitError::IndivisibleImage {
                image_edge: 225,
                patch_size: 16
            }
        );
    }

    #[test]
    fn declared_patch_count_must_match_grid() {
        let config = small_config().with_num_patches(Some(16));

        assert!(matches!(config.validate(), Err(VitError::InvalidConfig(_))));
        assert!(small_config().with_num_patches(Some(4)).validate().is_ok());
    }

    #[test]
    fn heads_must_divide_projection_dim() {
        let config = VitClassifierConfig::new(32, 16, 18, 1, 4, 32, 2);

        assert!(matches!(config.validate(), Err(VitError::InvalidConfig(_))));
    }

    #[test]
    fn config_survives_a_json_round_trip() {
        let config = small_config().with_num_patches(Some(4)).with_head_dropout(0.25);

        let json = serde_json::to_string(&config).unwrap();
        let restored: VitClassifierConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.num_patches, Some(4));
        assert_eq!(restored.head_dropout, 0.25);
        assert_eq!(restored.grid_patches(), Ok(4));
    }

    #[test]
    fn zero_sized_parameters_are_rejected() {
        let config = VitClassifierConfig::new(32, 16, 16, 1, 4, 32, 0);

        assert_eq!(
            config.validate(),
            Err(VitError::InvalidConfig("num_classes must be positive".to_string()))
        );
    }
}
