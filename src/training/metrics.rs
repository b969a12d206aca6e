//! Training metrics for monitoring GAN progress

/// Sum/count accumulator for sparse quality-score samples within one epoch.
///
/// Guards the no-samples case: `mean` is `None` rather than a division fault
/// when an epoch was too short for any evaluation to fire.
#[derive(Debug, Clone, Copy, Default)]
pub struct QualityStats {
    sum: f64,
    count: usize,
}

impl QualityStats {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one quality score
    pub fn record(&mut self, score: f64) {
        self.sum += score;
        self.count += 1;
    }

    /// Number of recorded scores
    pub fn count(&self) -> usize {
        self.count
    }

    /// Mean of recorded scores, or None if nothing was recorded
    pub fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }
}

/// Metrics collected during training, one entry per epoch
#[derive(Debug, Clone, Default)]
pub struct TrainingMetrics {
    /// Mean generator loss per epoch
    pub gen_losses: Vec<f64>,
    /// Mean discriminator loss per epoch
    pub disc_losses: Vec<f64>,
    /// Mean quality score per epoch, where any was sampled
    pub quality_scores: Vec<Option<f64>>,
}

impl TrainingMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record epoch metrics
    pub fn record_epoch(&mut self, gen_loss: f64, disc_loss: f64, quality: Option<f64>) {
        self.gen_losses.push(gen_loss);
        self.disc_losses.push(disc_loss);
        self.quality_scores.push(quality);
    }

    /// Number of recorded epochs
    pub fn num_epochs(&self) -> usize {
        self.gen_losses.len()
    }

    /// Latest generator loss
    pub fn latest_gen_loss(&self) -> Option<f64> {
        self.gen_losses.last().copied()
    }

    /// Latest discriminator loss
    pub fn latest_disc_loss(&self) -> Option<f64> {
        self.disc_losses.last().copied()
    }

    /// Latest epoch quality score
    pub fn latest_quality(&self) -> Option<f64> {
        self.quality_scores.last().copied().flatten()
    }
}
