//! Run configuration and compute device selection
//!
//! All knobs are parsed once from the CLI into an explicit `Config` that is
//! handed to the model and trainer constructors; nothing reads ambient state.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tch::Device;
use thiserror::Error;

/// Run mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Adversarial training
    Train,
    /// Sample images from a trained generator
    Test,
}

/// Device selection failures — the one error class the operator gets a
/// friendly message for instead of a crash
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("unknown compute device '{0}', expected 'cpu' or 'cuda:<index>'")]
    Unknown(String),
    #[error("device '{0}' requested but CUDA is not available")]
    CudaUnavailable(String),
    #[error("CUDA device index {index} out of range, {count} device(s) available")]
    IndexOutOfRange { index: i64, count: i64 },
}

/// Main run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory of training images
    pub img_dir: String,
    /// Directory sampled images are written to
    pub out_dir: String,
    /// Directory checkpoints are written to
    pub checkpoint_dir: String,
    /// Run mode
    pub mode: Mode,
    /// Resume from the latest checkpoint before training
    pub restore_checkpoint: bool,
    /// Dimensionality of the latent space
    pub z_dim: i64,
    /// Images per batch
    pub batch_size: usize,
    /// Worker threads for image loading
    pub num_data_threads: usize,
    /// Passes through the training data
    pub num_epochs: usize,
    /// Adam learning rate
    pub learn_rate: f64,
    /// Adam beta1 parameter
    pub beta1: f64,
    /// Generator updates per discriminator update
    pub num_gen_updates: usize,
    /// Log losses every N iterations
    pub log_every: usize,
    /// Save a checkpoint every N iterations
    pub save_every: usize,
    /// Compute device, e.g. "cpu", "cuda:0"
    pub device: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            img_dir: "./data/celeba".to_string(),
            out_dir: "./output".to_string(),
            checkpoint_dir: "./checkpoints".to_string(),
            mode: Mode::Train,
            restore_checkpoint: false,
            z_dim: 100,
            batch_size: 128,
            num_data_threads: 2,
            num_epochs: 10,
            learn_rate: 2e-4,
            beta1: 0.5,
            num_gen_updates: 2,
            log_every: 7,
            save_every: 500,
            device: default_device(),
        }
    }
}

impl Config {
    /// Resolve the configured device string, fixed once for the whole run
    pub fn compute_device(&self) -> Result<Device, DeviceError> {
        parse_device(&self.device)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.z_dim <= 0 {
            anyhow::bail!("z-dim must be > 0");
        }
        if self.batch_size == 0 {
            anyhow::bail!("batch size must be > 0");
        }
        if self.num_data_threads == 0 {
            anyhow::bail!("num-data-threads must be > 0");
        }
        if self.num_epochs == 0 {
            anyhow::bail!("num-epochs must be > 0");
        }
        if self.num_gen_updates == 0 {
            anyhow::bail!("num-gen-updates must be > 0");
        }
        Ok(())
    }
}

/// Default device string: the first accelerator when present, else CPU
pub fn default_device() -> String {
    if tch::Cuda::is_available() {
        "cuda:0".to_string()
    } else {
        "cpu".to_string()
    }
}

/// Parse a device string like "cpu", "cuda", "cuda:1" or "gpu:0"
pub fn parse_device(spec: &str) -> Result<Device, DeviceError> {
    let lower = spec.trim().to_lowercase();
    if lower == "cpu" || lower == "cpu:0" {
        return Ok(Device::Cpu);
    }

    let rest = lower
        .strip_prefix("cuda")
        .or_else(|| lower.strip_prefix("gpu"))
        .ok_or_else(|| DeviceError::Unknown(spec.to_string()))?;

    let index: i64 = if rest.is_empty() {
        0
    } else {
        rest.strip_prefix(':')
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| DeviceError::Unknown(spec.to_string()))?
    };

    if !tch::Cuda::is_available() {
        return Err(DeviceError::CudaUnavailable(spec.to_string()));
    }
    let count = tch::Cuda::device_count();
    if index >= count {
        return Err(DeviceError::IndexOutOfRange { index, count });
    }
    Ok(Device::Cuda(index as usize))
}
