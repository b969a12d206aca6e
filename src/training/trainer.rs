//! Training loop implementation for the face DCGAN
//!
//! Runs the adversarial loop with an asymmetric update cadence: the generator
//! steps every iteration, the discriminator only every `num_gen_updates`
//! iterations. Checkpoints and quality evaluation run inline on their own
//! step schedules.

use anyhow::{ensure, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tch::{nn, Tensor};
use tracing::{info, warn};

use super::evaluator::QualityEvaluator;
use super::losses::{discriminator_loss, generator_loss};
use super::metrics::{QualityStats, TrainingMetrics};
use crate::data::ImageBatchLoader;
use crate::model::Dcgan;
use crate::utils::CheckpointManager;

/// Quality evaluation fires every this many iterations. The evaluator runs a
/// full forward pass through the pretrained classifier, so keep it sparse.
const EVAL_EVERY: usize = 500;

/// Training configuration
#[derive(Debug, Clone)]
pub struct TrainerOptions {
    /// Number of passes over the training data
    pub num_epochs: usize,
    /// Adam learning rate, shared by both models
    pub learn_rate: f64,
    /// Adam beta1 parameter
    pub beta1: f64,
    /// Generator updates per discriminator update
    pub num_gen_updates: usize,
    /// Log losses every N iterations
    pub log_every: usize,
    /// Save a checkpoint every N iterations
    pub save_every: usize,
}

impl Default for TrainerOptions {
    fn default() -> Self {
        Self {
            num_epochs: 10,
            learn_rate: 2e-4,
            beta1: 0.5,
            num_gen_updates: 2,
            log_every: 7,
            save_every: 500,
        }
    }
}

/// Result of one training iteration
pub struct StepOutcome {
    /// Generator loss value
    pub gen_loss: f64,
    /// Discriminator loss value, present only on discriminator-update iterations
    pub disc_loss: Option<f64>,
    /// The generated batch of this iteration, detached
    pub fake: Tensor,
}

/// DCGAN trainer
///
/// Holds the model it was built for; the Adam optimizers are bound to that
/// model's parameter stores at construction.
pub struct Trainer<'a> {
    model: &'a Dcgan,
    options: TrainerOptions,
    gen_opt: nn::Optimizer,
    disc_opt: nn::Optimizer,
    metrics: TrainingMetrics,
}

impl<'a> Trainer<'a> {
    /// Create a trainer with per-model Adam optimizers
    pub fn new(model: &'a Dcgan, options: TrainerOptions) -> Result<Self> {
        ensure!(options.num_gen_updates >= 1, "num_gen_updates must be >= 1");
        ensure!(options.save_every >= 1, "save_every must be >= 1");
        ensure!(options.log_every >= 1, "log_every must be >= 1");

        let gen_opt = model.gen_optimizer(options.learn_rate, options.beta1)?;
        let disc_opt = model.disc_optimizer(options.learn_rate, options.beta1)?;

        Ok(Self {
            model,
            options,
            gen_opt,
            disc_opt,
            metrics: TrainingMetrics::new(),
        })
    }

    /// Train the model over the configured number of epochs
    pub fn train(
        &mut self,
        loader: &ImageBatchLoader,
        evaluator: &QualityEvaluator,
        checkpoints: &mut CheckpointManager,
    ) -> Result<&TrainingMetrics> {
        info!(
            "Starting training for {} epochs, {} batches per epoch",
            self.options.num_epochs,
            loader.num_batches()
        );

        for epoch in 0..self.options.num_epochs {
            info!("========== epoch {} ==========", epoch);
            self.train_epoch(loader, evaluator, checkpoints, epoch)?;
        }

        Ok(&self.metrics)
    }

    /// Train for one epoch, saving checkpoints and sampling quality scores on
    /// their step schedules, with a forced checkpoint at epoch end
    fn train_epoch(
        &mut self,
        loader: &ImageBatchLoader,
        evaluator: &QualityEvaluator,
        checkpoints: &mut CheckpointManager,
        epoch: usize,
    ) -> Result<()> {
        let mut quality = QualityStats::new();
        let mut gen_loss_sum = 0.0;
        let mut disc_loss_sum = 0.0;
        let mut disc_updates = 0usize;
        let mut last_disc_loss = f64::NAN;
        let mut iterations = 0usize;

        let pb = ProgressBar::new(loader.num_batches() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("##-"),
        );

        for (iteration, batch) in loader.epoch_iter().enumerate() {
            let real = batch?.to_device(self.model.device);

            let outcome = self.train_iteration(&real, iteration)?;
            gen_loss_sum += outcome.gen_loss;
            if let Some(d_loss) = outcome.disc_loss {
                disc_loss_sum += d_loss;
                disc_updates += 1;
                last_disc_loss = d_loss;
            }

            if iteration % self.options.save_every == 0 {
                checkpoints.save(self.model, epoch)?;
            }

            if iteration % EVAL_EVERY == 0 {
                let score = evaluator.distance(&real, &outcome.fake)?;
                quality.record(score);
                info!("**** FRECHET DISTANCE: {:.4} ****", score);
            }

            if iteration % self.options.log_every == 0 {
                pb.set_message(format!(
                    "g_loss: {:.3}, d_loss: {:.3}",
                    outcome.gen_loss, last_disc_loss
                ));
            }
            pb.inc(1);
            iterations += 1;
        }

        pb.finish_with_message("done");

        match quality.mean() {
            Some(mean) => info!("Average Frechet distance for epoch {}: {:.4}", epoch, mean),
            None => info!("Epoch {}: no quality samples collected", epoch),
        }

        if iterations > 0 {
            let avg_gen = gen_loss_sum / iterations as f64;
            let avg_disc = if disc_updates > 0 {
                disc_loss_sum / disc_updates as f64
            } else {
                f64::NAN
            };
            self.metrics.record_epoch(avg_gen, avg_disc, quality.mean());
            info!(
                "Epoch {}: g_loss={:.4}, d_loss={:.4}",
                epoch, avg_gen, avg_disc
            );
        } else {
            warn!("Epoch {} produced no batches", epoch);
        }

        info!("**** SAVING CHECKPOINT AT END OF EPOCH ****");
        checkpoints.save(self.model, epoch)?;

        Ok(())
    }

    /// Run one training iteration on one real batch
    ///
    /// The generator forward pass happens once; its output feeds the
    /// generator loss directly and, on discriminator-update iterations, is
    /// re-read detached for the discriminator loss. `tch` frees the autograd
    /// graph on backward, so the two losses cannot share a single recording;
    /// the detached re-read yields identical discriminator gradients. The
    /// discriminator loss therefore sees this step's pre-update generator
    /// output.
    pub fn train_iteration(&mut self, real: &Tensor, iteration: usize) -> Result<StepOutcome> {
        let model = self.model;
        let batch_size = real.size()[0];

        let noise = model.generator.sample_noise(batch_size, model.device);
        let fake = model.generator.forward_t(&noise, true);
        let fake_probs = model.discriminator.forward_t(&fake, true);
        let real_probs = model.discriminator.forward_t(real, true);

        let g_loss = generator_loss(&fake_probs);
        self.gen_opt.backward_step(&g_loss);

        let disc_loss = if iteration % self.options.num_gen_updates == 0 {
            let fake_probs_detached = model.discriminator.forward_t(&fake.detach(), true);
            let d_loss = discriminator_loss(&real_probs, &fake_probs_detached);
            self.disc_opt.backward_step(&d_loss);
            Some(d_loss.double_value(&[]))
        } else {
            None
        };

        Ok(StepOutcome {
            gen_loss: g_loss.double_value(&[]),
            disc_loss,
            fake: fake.detach(),
        })
    }

    /// Get training metrics
    pub fn metrics(&self) -> &TrainingMetrics {
        &self.metrics
    }

    /// Get configuration
    pub fn options(&self) -> &TrainerOptions {
        &self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::small_model;
    use tch::{nn::VarStore, Device};

    fn snapshot(vs: &VarStore) -> Vec<Tensor> {
        // Creation order is stable, so positional comparison is sound
        vs.trainable_variables()
            .iter()
            .map(|t| t.detach().copy())
            .collect()
    }

    fn params_changed(before: &[Tensor], vs: &VarStore) -> bool {
        before
            .iter()
            .zip(vs.trainable_variables())
            .any(|(b, a)| !a.allclose(b, 1e-9, 1e-9, false))
    }

    #[test]
    fn test_trainer_options_default() {
        let options = TrainerOptions::default();
        assert_eq!(options.num_epochs, 10);
        assert_eq!(options.num_gen_updates, 2);
        assert_eq!(options.save_every, 500);
    }

    #[test]
    fn test_trainer_rejects_zero_cadence() {
        let model = small_model();
        let options = TrainerOptions {
            num_gen_updates: 0,
            ..Default::default()
        };
        assert!(Trainer::new(&model, options).is_err());
    }

    #[test]
    fn test_iteration_losses_are_finite() {
        let model = small_model();
        let mut trainer = Trainer::new(&model, TrainerOptions::default()).unwrap();

        let real = Tensor::randn([4, 3, 64, 64], (tch::Kind::Float, Device::Cpu));
        let outcome = trainer.train_iteration(&real, 0).unwrap();

        assert!(outcome.gen_loss.is_finite());
        assert!(outcome.disc_loss.unwrap().is_finite());
        assert_eq!(outcome.fake.size(), vec![4, 3, 64, 64]);
    }

    #[test]
    fn test_discriminator_update_cadence() {
        let model = small_model();
        let options = TrainerOptions {
            // Large learning rate so a single step moves parameters well
            // past the comparison tolerance
            learn_rate: 0.05,
            num_gen_updates: 2,
            ..Default::default()
        };
        let mut trainer = Trainer::new(&model, options).unwrap();

        let real = Tensor::randn([4, 3, 64, 64], (tch::Kind::Float, Device::Cpu));

        for iteration in 0..10 {
            let disc_before = snapshot(&model.disc_vs);
            let gen_before = snapshot(&model.gen_vs);

            trainer.train_iteration(&real, iteration).unwrap();

            // Generator steps every iteration, discriminator on even ones only
            assert!(params_changed(&gen_before, &model.gen_vs));
            assert_eq!(
                params_changed(&disc_before, &model.disc_vs),
                iteration % 2 == 0,
                "unexpected discriminator update at iteration {iteration}"
            );
        }
    }

    #[test]
    fn test_trainer_steps_only_its_bound_model() {
        let model = small_model();
        let bystander = small_model();
        let options = TrainerOptions {
            learn_rate: 0.05,
            ..Default::default()
        };
        let mut trainer = Trainer::new(&model, options).unwrap();

        let gen_before = snapshot(&bystander.gen_vs);
        let disc_before = snapshot(&bystander.disc_vs);

        let real = Tensor::randn([4, 3, 64, 64], (tch::Kind::Float, Device::Cpu));
        trainer.train_iteration(&real, 0).unwrap();

        assert!(!params_changed(&gen_before, &bystander.gen_vs));
        assert!(!params_changed(&disc_before, &bystander.disc_vs));
    }
}
