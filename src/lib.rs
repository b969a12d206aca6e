//! # DCGAN for Face Synthesis
//!
//! This crate trains a Deep Convolutional Generative Adversarial Network to
//! synthesize 64x64 RGB face images from random latent noise, and can sample
//! images from a trained generator to disk.
//!
//! ## Modules
//!
//! - `data`: Threaded image-directory batch loader
//! - `model`: DCGAN architecture (Generator and Discriminator)
//! - `training`: Training loop, loss functions, and quality evaluation
//! - `utils`: Configuration, checkpoint management, and sampling

pub mod data;
pub mod model;
pub mod training;
pub mod utils;

pub use data::ImageBatchLoader;
pub use model::{Dcgan, Discriminator, Generator};
pub use training::{FeatureExtractor, QualityEvaluator, Trainer, TrainerOptions, TrainingMetrics};
pub use utils::{sample_images, CheckpointManager, Config, DeviceError, Mode};
