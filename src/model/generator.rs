//! Generator network for the face DCGAN
//!
//! The Generator transforms random latent vectors into synthetic 64x64 RGB
//! images. Architecture uses transposed 2D convolutions to upsample from a
//! projected 4x4 spatial volume.

use tch::{nn, nn::Module, nn::ModuleT, Device, Tensor};

/// Spatial side of the initial projected volume (4x4).
const INIT_SIZE: i64 = 4;

/// Generator network configuration
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Size of the latent noise vector
    pub z_dim: i64,
    /// Channel depth of the initial 4x4 volume; halved at each upsampling stage
    pub base_channels: i64,
    /// Number of output image channels
    pub img_channels: i64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            z_dim: 100,
            base_channels: 1024,
            img_channels: 3,
        }
    }
}

/// Generator network
///
/// Architecture:
/// 1. Dense projection from latent space to a 4x4x1024 volume (ReLU)
/// 2. Three ConvTranspose2d upsampling stages (stride 2), each followed by
///    ReLU and batch normalization: 8x8x512 -> 16x16x256 -> 32x32x128
/// 3. Final ConvTranspose2d to 64x64x3 with Tanh, bounding output to [-1, 1]
#[derive(Debug)]
pub struct Generator {
    config: GeneratorConfig,
    /// Initial dense projection
    fc: nn::Linear,
    /// Transposed convolution layers
    tr1: nn::ConvTranspose2D,
    bn1: nn::BatchNorm,
    tr2: nn::ConvTranspose2D,
    bn2: nn::BatchNorm,
    tr3: nn::ConvTranspose2D,
    bn3: nn::BatchNorm,
    tr4: nn::ConvTranspose2D,
}

impl Generator {
    /// Create a new Generator network
    pub fn new(vs: &nn::Path, config: GeneratorConfig) -> Self {
        let base = config.base_channels;
        let init_volume = base * INIT_SIZE * INIT_SIZE;

        let fc = nn::linear(vs / "fc", config.z_dim, init_volume, Default::default());

        // Kernel 4, stride 2, padding 1 doubles the spatial side
        let up_config = nn::ConvTransposeConfig {
            stride: 2,
            padding: 1,
            ..Default::default()
        };

        let tr1 = nn::conv_transpose2d(vs / "tr1", base, base / 2, 4, up_config);
        let bn1 = nn::batch_norm2d(vs / "bn1", base / 2, Default::default());

        let tr2 = nn::conv_transpose2d(vs / "tr2", base / 2, base / 4, 4, up_config);
        let bn2 = nn::batch_norm2d(vs / "bn2", base / 4, Default::default());

        let tr3 = nn::conv_transpose2d(vs / "tr3", base / 4, base / 8, 4, up_config);
        let bn3 = nn::batch_norm2d(vs / "bn3", base / 8, Default::default());

        // Final upsampling stage: no batch norm, tanh activation
        let tr4 = nn::conv_transpose2d(vs / "tr4", base / 8, config.img_channels, 4, up_config);

        Self {
            config,
            fc,
            tr1,
            bn1,
            tr2,
            bn2,
            tr3,
            bn3,
            tr4,
        }
    }

    /// Generate synthetic images from noise
    ///
    /// # Arguments
    ///
    /// * `noise` - Tensor of shape (batch_size, z_dim)
    /// * `train` - Whether in training mode (affects batch norm)
    ///
    /// # Returns
    ///
    /// Tensor of shape (batch_size, img_channels, 64, 64) with values in [-1, 1]
    pub fn forward_t(&self, noise: &Tensor, train: bool) -> Tensor {
        let batch_size = noise.size()[0];
        let base = self.config.base_channels;

        // Project and reshape: (batch, z_dim) -> (batch, base, 4, 4)
        let x = self.fc.forward(noise).relu();
        let x = x.view([batch_size, base, INIT_SIZE, INIT_SIZE]);

        // Upsample, halving channel depth at each stage
        let x = self.tr1.forward(&x).relu();
        let x = self.bn1.forward_t(&x, train);

        let x = self.tr2.forward(&x).relu();
        let x = self.bn2.forward_t(&x, train);

        let x = self.tr3.forward(&x).relu();
        let x = self.bn3.forward_t(&x, train);

        self.tr4.forward(&x).tanh()
    }

    /// Generate images (inference mode)
    pub fn generate(&self, noise: &Tensor) -> Tensor {
        self.forward_t(noise, false)
    }

    /// Sample a batch of latent vectors for this generator
    pub fn sample_noise(&self, batch_size: i64, device: Device) -> Tensor {
        Tensor::randn([batch_size, self.config.z_dim], (tch::Kind::Float, device))
    }

    /// Side length of generated images
    pub fn image_size(&self) -> i64 {
        // 4x4 volume doubled by each of the four upsampling stages
        INIT_SIZE * 16
    }

    /// Get configuration
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }
}

impl ModuleT for Generator {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        Generator::forward_t(self, xs, train)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::nn::VarStore;

    #[test]
    fn test_generator_output_shape() {
        let vs = VarStore::new(Device::Cpu);
        let config = GeneratorConfig {
            z_dim: 100,
            // Small depth keeps the test fast; layer counts are unchanged
            base_channels: 32,
            img_channels: 3,
        };
        let gen = Generator::new(&vs.root(), config);

        let noise = Tensor::randn([4, 100], (tch::Kind::Float, Device::Cpu));
        let output = gen.generate(&noise);

        assert_eq!(output.size(), vec![4, 3, 64, 64]);
    }

    #[test]
    fn test_generator_output_range() {
        let vs = VarStore::new(Device::Cpu);
        let config = GeneratorConfig {
            base_channels: 32,
            ..Default::default()
        };
        let gen = Generator::new(&vs.root(), config);

        let noise = gen.sample_noise(2, Device::Cpu);
        let output = gen.generate(&noise);

        let min_val: f64 = output.min().double_value(&[]);
        let max_val: f64 = output.max().double_value(&[]);
        assert!(min_val >= -1.0 && max_val <= 1.0);
    }

    #[test]
    fn test_generator_deterministic_given_input() {
        let vs = VarStore::new(Device::Cpu);
        let gen = Generator::new(
            &vs.root(),
            GeneratorConfig {
                base_channels: 32,
                ..Default::default()
            },
        );

        let noise = Tensor::randn([2, 100], (tch::Kind::Float, Device::Cpu));
        let a = gen.generate(&noise);
        let b = gen.generate(&noise);

        assert!(a.allclose(&b, 1e-6, 1e-6, false));
    }
}
