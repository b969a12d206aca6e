//! Model module containing GAN architecture components
//!
//! This module provides:
//! - Generator network mapping latent noise to 64x64 RGB images
//! - Discriminator network scoring images as real or fake
//! - DCGAN wrapper combining both networks

mod dcgan;
mod discriminator;
mod generator;

pub use dcgan::Dcgan;
pub use discriminator::{Discriminator, DiscriminatorConfig};
pub use generator::{Generator, GeneratorConfig};
