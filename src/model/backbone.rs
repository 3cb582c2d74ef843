//! Backbone building blocks
//!
//! Convolutional feature stages assembled from a `BackboneSpec`, plus
//! the optional in-graph normalization block. Each stage halves the
//! spatial resolution.

use burn::{
    module::{Module, Param},
    nn::{
        conv::{Conv2d, Conv2dConfig},
        BatchNorm, BatchNormConfig, PaddingConfig2d, Relu,
    },
    tensor::{backend::Backend, Tensor, TensorData},
};

use crate::config::{BackboneSpec, Normalization};

/// One downsampling feature stage: conv, batch norm, ReLU.
///
/// Depthwise variants use a grouped 3x3 followed by a 1x1 pointwise
/// projection instead of a full 3x3.
#[derive(Module, Debug)]
pub struct ConvStage<B: Backend> {
    depthwise: Option<Conv2d<B>>,
    conv: Conv2d<B>,
    bn: BatchNorm<B, 2>,
    relu: Relu,
}

impl<B: Backend> ConvStage<B> {
    pub fn new(in_channels: usize, out_channels: usize, depthwise: bool, device: &B::Device) -> Self {
        let (depthwise, conv) = if depthwise {
            let dw = Conv2dConfig::new([in_channels, in_channels], [3, 3])
                .with_stride([2, 2])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .with_groups(in_channels)
                .init(device);
            let pw = Conv2dConfig::new([in_channels, out_channels], [1, 1]).init(device);
            (Some(dw), pw)
        } else {
            let conv = Conv2dConfig::new([in_channels, out_channels], [3, 3])
                .with_stride([2, 2])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(device);
            (None, conv)
        };

        Self {
            depthwise,
            conv,
            bn: BatchNormConfig::new(out_channels).init(device),
            relu: Relu::new(),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = match &self.depthwise {
            Some(dw) => self.conv.forward(dw.forward(x)),
            None => self.conv.forward(x),
        };
        let x = self.bn.forward(x);
        self.relu.forward(x)
    }
}

/// Build the full stage stack a spec describes, input channels 3
pub fn build_stages<B: Backend>(spec: &BackboneSpec, device: &B::Device) -> Vec<ConvStage<B>> {
    let mut stages = Vec::with_capacity(spec.num_stages());
    let mut in_channels = 3;
    for &width in spec.stage_widths {
        stages.push(ConvStage::new(in_channels, width, spec.depthwise, device));
        in_channels = width;
    }
    stages
}

/// In-graph normalization: `(x - mean) / std` with fixed channel stats.
///
/// The stats are parameters only so they travel inside the exported
/// record; they are never handed to an optimizer.
#[derive(Module, Debug)]
pub struct PreprocessBlock<B: Backend> {
    mean: Param<Tensor<B, 4>>,
    std: Param<Tensor<B, 4>>,
}

impl<B: Backend> PreprocessBlock<B> {
    pub fn new(normalization: Normalization, device: &B::Device) -> Self {
        let (mean, std) = match normalization {
            // Maps [0, 1] input to [-1, 1]
            Normalization::Scaled => (vec![0.5f32; 3], vec![0.5f32; 3]),
            Normalization::ImageNet => (
                vec![0.485f32, 0.456, 0.406],
                vec![0.229f32, 0.224, 0.225],
            ),
        };

        let as_param = |values: Vec<f32>| {
            Param::from_tensor(Tensor::from_floats(
                TensorData::new(values, [1, 3, 1, 1]),
                device,
            ))
        };

        Self {
            mean: as_param(mean),
            std: as_param(std),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        (x - self.mean.val()) / self.std.val()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DefaultBackend;
    use crate::config::BackboneChoice;

    #[test]
    fn test_stage_halves_resolution() {
        let device = crate::backend::default_device();
        let stage = ConvStage::<DefaultBackend>::new(3, 16, false, &device);

        let input = Tensor::zeros([1, 3, 32, 32], &device);
        let output = stage.forward(input);
        assert_eq!(output.dims(), [1, 16, 16, 16]);
    }

    #[test]
    fn test_depthwise_stage_shape() {
        let device = crate::backend::default_device();
        let stage = ConvStage::<DefaultBackend>::new(8, 16, true, &device);

        let input = Tensor::zeros([2, 8, 16, 16], &device);
        let output = stage.forward(input);
        assert_eq!(output.dims(), [2, 16, 8, 8]);
    }

    #[test]
    fn test_build_stages_matches_spec() {
        let device = crate::backend::default_device();
        let spec = BackboneChoice::EfficientNetV2.spec();
        let stages = build_stages::<DefaultBackend>(&spec, &device);
        assert_eq!(stages.len(), spec.num_stages());
    }

    #[test]
    fn test_preprocess_block_scaled() {
        let device = crate::backend::default_device();
        let block = PreprocessBlock::<DefaultBackend>::new(Normalization::Scaled, &device);

        let input = Tensor::ones([1, 3, 4, 4], &device);
        let output = block.forward(input);
        let data = output.into_data().to_vec::<f32>().unwrap();
        assert!(data.iter().all(|&v| (v - 1.0).abs() < 1e-5));
    }
}
