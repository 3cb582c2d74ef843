//! Classifier model
//!
//! The model is split into two named parameter groups: `frozen` stages
//! that never see an optimizer step, and the `tunable` section (stages
//! unfrozen for fine-tuning plus the classification head) that does.
//! Phase transitions move whole stages between the groups; the
//! optimizer is only ever scoped to `tunable`.

use burn::{
    module::Module,
    nn::{
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig},
        Dropout, DropoutConfig, Linear, LinearConfig,
    },
    tensor::{backend::Backend, Tensor},
};

use crate::model::backbone::{ConvStage, PreprocessBlock};

/// Classification head: global average pool, dropout, linear
#[derive(Module, Debug)]
pub struct Head<B: Backend> {
    global_pool: AdaptiveAvgPool2d,
    dropout: Dropout,
    fc: Linear<B>,
}

impl<B: Backend> Head<B> {
    pub fn new(in_features: usize, num_classes: usize, dropout_rate: f64, device: &B::Device) -> Self {
        Self {
            global_pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            dropout: DropoutConfig::new(dropout_rate).init(),
            fc: LinearConfig::new(in_features, num_classes).init(device),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.global_pool.forward(x);
        let [batch_size, channels, _, _] = x.dims();
        let x = x.reshape([batch_size, channels]);
        let x = self.dropout.forward(x);
        self.fc.forward(x)
    }
}

/// Everything the optimizer is allowed to update
#[derive(Module, Debug)]
pub struct TunableSection<B: Backend> {
    pub stages: Vec<ConvStage<B>>,
    pub head: Head<B>,
}

impl<B: Backend> TunableSection<B> {
    pub fn forward(&self, mut x: Tensor<B, 4>) -> Tensor<B, 2> {
        for stage in &self.stages {
            x = stage.forward(x);
        }
        self.head.forward(x)
    }
}

/// Bean disease classifier with frozen/tunable parameter groups
#[derive(Module, Debug)]
pub struct BeanClassifier<B: Backend> {
    /// In-graph normalization, present in `preprocess_in_model` mode
    pub preprocess: Option<PreprocessBlock<B>>,
    /// Backbone stages excluded from optimization
    pub frozen: Vec<ConvStage<B>>,
    /// Unfrozen stages and the head
    pub tunable: TunableSection<B>,
    num_classes: usize,
}

impl<B: Backend> BeanClassifier<B> {
    pub fn new(
        preprocess: Option<PreprocessBlock<B>>,
        frozen: Vec<ConvStage<B>>,
        tunable: TunableSection<B>,
        num_classes: usize,
    ) -> Self {
        Self {
            preprocess,
            frozen,
            tunable,
            num_classes,
        }
    }

    /// Forward pass, input [batch, 3, height, width], output logits
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = match &self.preprocess {
            Some(block) => block.forward(x),
            None => x,
        };
        for stage in &self.frozen {
            x = stage.forward(x);
        }
        self.tunable.forward(x)
    }

    /// Forward pass with softmax, for inference
    pub fn forward_softmax(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        burn::tensor::activation::softmax(self.forward(x), 1)
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn num_frozen_stages(&self) -> usize {
        self.frozen.len()
    }

    pub fn num_tunable_stages(&self) -> usize {
        self.tunable.stages.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DefaultBackend;
    use crate::config::{BackboneChoice, NUM_CLASSES};
    use crate::model::backbone::build_stages;
    use burn::tensor::ElementConversion;

    fn tiny_model(device: &<DefaultBackend as Backend>::Device) -> BeanClassifier<DefaultBackend> {
        let spec = BackboneChoice::MobileNet.spec();
        let stages = build_stages(&spec, device);
        let head = Head::new(
            *spec.stage_widths.last().unwrap(),
            NUM_CLASSES,
            0.5,
            device,
        );
        BeanClassifier::new(
            None,
            stages,
            TunableSection {
                stages: Vec::new(),
                head,
            },
            NUM_CLASSES,
        )
    }

    #[test]
    fn test_forward_output_shape() {
        let device = crate::backend::default_device();
        let model = tiny_model(&device);

        let input = Tensor::zeros([2, 3, 64, 64], &device);
        let output = model.forward(input);
        assert_eq!(output.dims(), [2, NUM_CLASSES]);
    }

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let device = crate::backend::default_device();
        let model = tiny_model(&device);

        let input = Tensor::ones([1, 3, 64, 64], &device);
        let probs = model.forward_softmax(input);
        let sum: f32 = probs.sum().into_scalar().elem();
        assert!((sum - 1.0).abs() < 1e-4);
    }
}
