//! DCGAN wrapper combining Generator and Discriminator
//!
//! Owns the two disjoint parameter stores and builds the per-model Adam
//! optimizers used by the training loop.

use anyhow::Result;
use std::path::Path;
use tch::{nn, nn::OptimizerConfig, nn::VarStore, Device, Tensor};

use super::discriminator::{Discriminator, DiscriminatorConfig};
use super::generator::{Generator, GeneratorConfig};

/// Complete DCGAN model
pub struct Dcgan {
    /// Generator network
    pub generator: Generator,
    /// Discriminator network
    pub discriminator: Discriminator,
    /// Variable store for generator parameters
    pub gen_vs: VarStore,
    /// Variable store for discriminator parameters
    pub disc_vs: VarStore,
    /// Device (CPU/GPU)
    pub device: Device,
}

impl Dcgan {
    /// Create a new DCGAN model
    pub fn new(
        gen_config: GeneratorConfig,
        disc_config: DiscriminatorConfig,
        device: Device,
    ) -> Self {
        let gen_vs = VarStore::new(device);
        let disc_vs = VarStore::new(device);

        let generator = Generator::new(&gen_vs.root(), gen_config);
        let discriminator = Discriminator::new(&disc_vs.root(), disc_config);

        Self {
            generator,
            discriminator,
            gen_vs,
            disc_vs,
            device,
        }
    }

    /// Create a DCGAN with the default 64x64 face architecture
    ///
    /// # Arguments
    ///
    /// * `z_dim` - Size of the latent noise vector
    /// * `device` - Device to create the model on
    pub fn with_defaults(z_dim: i64, device: Device) -> Self {
        let gen_config = GeneratorConfig {
            z_dim,
            ..Default::default()
        };
        Self::new(gen_config, DiscriminatorConfig::default(), device)
    }

    /// Generate synthetic images from fresh noise
    ///
    /// # Returns
    ///
    /// Tensor of shape (num_samples, 3, 64, 64) with values in [-1, 1]
    pub fn generate(&self, num_samples: i64) -> Tensor {
        let noise = self.generator.sample_noise(num_samples, self.device);
        self.generator.generate(&noise)
    }

    /// Generate images from specific noise vectors
    pub fn generate_from_noise(&self, noise: &Tensor) -> Tensor {
        self.generator.generate(noise)
    }

    /// Discriminate images (probability of being real)
    pub fn discriminate(&self, images: &Tensor) -> Tensor {
        self.discriminator.classify(images)
    }

    /// Build the generator optimizer (Adam)
    pub fn gen_optimizer(&self, lr: f64, beta1: f64) -> Result<nn::Optimizer> {
        Ok(nn::adam(beta1, 0.999, 0.).build(&self.gen_vs, lr)?)
    }

    /// Build the discriminator optimizer (Adam)
    pub fn disc_optimizer(&self, lr: f64, beta1: f64) -> Result<nn::Optimizer> {
        Ok(nn::adam(beta1, 0.999, 0.).build(&self.disc_vs, lr)?)
    }

    /// Save both parameter stores
    pub fn save<P: AsRef<Path>>(&self, gen_path: P, disc_path: P) -> Result<()> {
        self.gen_vs.save(gen_path)?;
        self.disc_vs.save(disc_path)?;
        Ok(())
    }

    /// Load both parameter stores
    ///
    /// Reads via `load_from_stream`: `VarStore::save` always writes the
    /// libtorch C++ module format, but `VarStore::load` dispatches on the
    /// file extension and would misread a `.pt` file as Python pickle.
    pub fn load<P: AsRef<Path>>(&mut self, gen_path: P, disc_path: P) -> Result<()> {
        self.gen_vs.load_from_stream(std::fs::File::open(gen_path)?)?;
        self.disc_vs.load_from_stream(std::fs::File::open(disc_path)?)?;
        Ok(())
    }

    /// Get latent dimension
    pub fn z_dim(&self) -> i64 {
        self.generator.config().z_dim
    }

    /// Side length of generated images
    pub fn image_size(&self) -> i64 {
        self.generator.image_size()
    }
}
