//! Utility module with helper functions
//!
//! This module provides:
//! - Run configuration and device selection
//! - Retention-bounded checkpoint management
//! - Sampling generated images to disk

mod checkpoint;
mod config;
mod sampler;

pub use checkpoint::{CheckpointManager, CheckpointMeta};
pub use config::{default_device, parse_device, Config, DeviceError, Mode};
pub use sampler::sample_images;
