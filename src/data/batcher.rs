use burn::{data::dataloader::batcher::Batcher, prelude::*};

use super::dataset::ImageItem;
use super::CHANNELS;

/// A stack of images `(B, S, S, 3)` with their class indices `(B,)`.
#[derive(Debug, Clone)]
pub struct ImageBatch<B: Backend> {
    pub images: Tensor<B, 4>,
    pub targets: Tensor<B, 1, Int>,
}

#[derive(Clone, Debug)]
pub struct ImageBatcher<B: Backend> {
    device: B::Device,
    image_size: usize,
}

impl<B: Backend> ImageBatcher<B> {
    pub fn new(device: B::Device, image_size: usize) -> Self {
        Self { device, image_size }
    }
}

impl<B: Backend> Batcher<ImageItem, ImageBatch<B>> for ImageBatcher<B> {
    fn batch(&self, items: Vec<ImageItem>) -> ImageBatch<B> {
        let batch_size = items.len();
        let size = self.image_size;

        let pixels: Vec<f32> = items
            .iter()
            .flat_map(|item| item.pixels.iter().copied())
            .collect();
        let labels: Vec<i32> = items.iter().map(|item| item.label as i32).collect();

        let images = Tensor::<B, 1>::from_floats(pixels.as_slice(), &self.device)
            .reshape([batch_size, size, size, CHANNELS]);
        let targets = Tensor::<B, 1, Int>::from_ints(labels.as_slice(), &self.device);

        ImageBatch { images, targets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn items_are_stacked_channel_last() {
        let batcher = ImageBatcher::<NdArray>::new(Default::default(), 2);
        let items = vec![
            ImageItem {
                pixels: vec![0.5; 12],
                label: 3,
            },
            ImageItem {
                pixels: (0..12).map(|v| v as f32).collect(),
                label: 0,
            },
        ];

        let batch = batcher.batch(items);

        assert_eq!(batch.images.dims(), [2, 2, 2, 3]);
        assert_eq!(batch.targets.into_data().convert::<i64>().value, vec![3, 0]);
        let second = batch.images.slice([1..2, 0..1, 1..2, 0..3]);
        assert_eq!(
            second.into_data().convert::<f32>().value,
            vec![3.0, 4.0, 5.0]
        );
    }
}
