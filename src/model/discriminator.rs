//! Discriminator network for the face DCGAN
//!
//! The Discriminator classifies 64x64 RGB images as real or fake.
//! Architecture uses stride-2 2D convolutions to downsample to a single
//! probability per image.

use tch::{nn, nn::Module, nn::ModuleT, Tensor};

/// Leaky ReLU with the 0.2 negative slope used throughout the discriminator.
/// `Tensor::leaky_relu` fixes the default slope, so spell it out.
fn leaky_relu(xs: &Tensor) -> Tensor {
    xs.maximum(&(xs * 0.2))
}

/// Discriminator network configuration
#[derive(Debug, Clone)]
pub struct DiscriminatorConfig {
    /// Number of input image channels
    pub img_channels: i64,
    /// Filter count of the first stage; doubled at each downsampling stage
    pub base_channels: i64,
}

impl Default for DiscriminatorConfig {
    fn default() -> Self {
        Self {
            img_channels: 3,
            base_channels: 128,
        }
    }
}

/// Discriminator network
///
/// Architecture:
/// 1. Four stride-2 Conv2d stages halving spatial resolution:
///    64x64x3 -> 32x32x128 -> 16x16x256 -> 8x8x512 -> 4x4x1024,
///    leaky ReLU (slope 0.2) on every stage, batch norm on interior stages
/// 2. Valid Conv2d down to a 1x1 feature map, leaky ReLU
/// 3. Flatten and sigmoid to one probability per image
#[derive(Debug)]
pub struct Discriminator {
    config: DiscriminatorConfig,
    conv1: nn::Conv2D,
    conv2: nn::Conv2D,
    bn2: nn::BatchNorm,
    conv3: nn::Conv2D,
    bn3: nn::BatchNorm,
    conv4: nn::Conv2D,
    bn4: nn::BatchNorm,
    conv5: nn::Conv2D,
}

impl Discriminator {
    /// Create a new Discriminator network
    pub fn new(vs: &nn::Path, config: DiscriminatorConfig) -> Self {
        let base = config.base_channels;

        let down_config = nn::ConvConfig {
            stride: 2,
            padding: 1,
            ..Default::default()
        };

        let conv1 = nn::conv2d(vs / "conv1", config.img_channels, base, 4, down_config);
        let conv2 = nn::conv2d(vs / "conv2", base, base * 2, 4, down_config);
        let bn2 = nn::batch_norm2d(vs / "bn2", base * 2, Default::default());
        let conv3 = nn::conv2d(vs / "conv3", base * 2, base * 4, 4, down_config);
        let bn3 = nn::batch_norm2d(vs / "bn3", base * 4, Default::default());
        let conv4 = nn::conv2d(vs / "conv4", base * 4, base * 8, 4, down_config);
        let bn4 = nn::batch_norm2d(vs / "bn4", base * 8, Default::default());

        // Valid convolution collapsing the 4x4 map to a single pixel
        let conv5 = nn::conv2d(vs / "conv5", base * 8, 1, 4, Default::default());

        Self {
            config,
            conv1,
            conv2,
            bn2,
            conv3,
            bn3,
            conv4,
            bn4,
            conv5,
        }
    }

    /// Forward pass
    ///
    /// # Arguments
    ///
    /// * `images` - Tensor of shape (batch_size, img_channels, 64, 64)
    /// * `train` - Whether in training mode (affects batch norm)
    ///
    /// # Returns
    ///
    /// Tensor of shape (batch_size, 1) with probabilities in [0, 1]
    pub fn forward_t(&self, images: &Tensor, train: bool) -> Tensor {
        let x = leaky_relu(&self.conv1.forward(images));

        let x = leaky_relu(&self.conv2.forward(&x));
        let x = self.bn2.forward_t(&x, train);

        let x = leaky_relu(&self.conv3.forward(&x));
        let x = self.bn3.forward_t(&x, train);

        let x = leaky_relu(&self.conv4.forward(&x));
        let x = self.bn4.forward_t(&x, train);

        let x = leaky_relu(&self.conv5.forward(&x));

        let batch_size = x.size()[0];
        x.view([batch_size, 1]).sigmoid()
    }

    /// Classify images (inference mode)
    ///
    /// Returns probability of each image being real
    pub fn classify(&self, images: &Tensor) -> Tensor {
        self.forward_t(images, false)
    }

    /// Get configuration
    pub fn config(&self) -> &DiscriminatorConfig {
        &self.config
    }
}

impl ModuleT for Discriminator {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        Discriminator::forward_t(self, xs, train)
    }
}
