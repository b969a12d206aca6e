//! Training module for the face DCGAN
//!
//! This module provides:
//! - Training loop implementation with asymmetric update cadence
//! - Epsilon-clamped binary cross entropy loss functions
//! - Frechet-distance quality evaluation against real data
//! - Training metrics and quality accumulators

mod evaluator;
mod losses;
mod metrics;
mod trainer;

pub use evaluator::{frechet_distance, FeatureExtractor, InceptionExtractor, QualityEvaluator};
pub use losses::{discriminator_loss, generator_loss, stable_log};
pub use metrics::{QualityStats, TrainingMetrics};
pub use trainer::{StepOutcome, Trainer, TrainerOptions};
