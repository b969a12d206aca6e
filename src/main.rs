//! DCGAN face synthesis
//!
//! Main entry point providing a CLI for:
//! - Training the GAN on an image directory
//! - Sampling images from a trained generator

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use face_dcgan::training::InceptionExtractor;
use face_dcgan::{
    sample_images, CheckpointManager, Config, Dcgan, DeviceError, ImageBatchLoader, Mode,
    QualityEvaluator, Trainer, TrainerOptions,
};

/// Local cache for the pretrained feature extractor weights, fetched on
/// first use.
const EXTRACTOR_CACHE: &str = "./models/inception-v3.ot";

/// DCGAN for synthesizing face images
#[derive(Parser)]
#[command(name = "face_dcgan")]
#[command(version = "0.1.0")]
#[command(about = "Train a DCGAN on face images and sample from it")]
struct Cli {
    /// Directory where training images live
    #[arg(long, default_value = "./data/celeba")]
    img_dir: String,

    /// Directory where sampled output images will be written
    #[arg(long, default_value = "./output")]
    out_dir: String,

    /// Directory where checkpoints will be written
    #[arg(long, default_value = "./checkpoints")]
    checkpoint_dir: String,

    /// Run mode
    #[arg(long, value_enum, default_value = "train")]
    mode: Mode,

    /// Resume training from the latest saved checkpoint
    #[arg(long)]
    restore_checkpoint: bool,

    /// Dimensionality of the latent space
    #[arg(long, default_value_t = 100)]
    z_dim: i64,

    /// Size of image batches fed through the networks
    #[arg(long, default_value_t = 128)]
    batch_size: usize,

    /// Number of threads used for loading training images
    #[arg(long, default_value_t = 2)]
    num_data_threads: usize,

    /// Number of passes through the training data
    #[arg(long, default_value_t = 10)]
    num_epochs: usize,

    /// Learning rate for the Adam optimizers
    #[arg(long, default_value_t = 0.0002)]
    learn_rate: f64,

    /// beta1 parameter for the Adam optimizers
    #[arg(long, default_value_t = 0.5)]
    beta1: f64,

    /// Number of generator updates per discriminator update
    #[arg(long, default_value_t = 2)]
    num_gen_updates: usize,

    /// Print losses after every this many training iterations
    #[arg(long, default_value_t = 7)]
    log_every: usize,

    /// Save the network state after every this many training iterations
    #[arg(long, default_value_t = 500)]
    save_every: usize,

    /// Compute device, e.g. cpu, cuda:0, cuda:1 (defaults to the first
    /// accelerator when available)
    #[arg(long)]
    device: Option<String>,
}

impl From<Cli> for Config {
    fn from(cli: Cli) -> Self {
        Config {
            img_dir: cli.img_dir,
            out_dir: cli.out_dir,
            checkpoint_dir: cli.checkpoint_dir,
            mode: cli.mode,
            restore_checkpoint: cli.restore_checkpoint,
            z_dim: cli.z_dim,
            batch_size: cli.batch_size,
            num_data_threads: cli.num_data_threads,
            num_epochs: cli.num_epochs,
            learn_rate: cli.learn_rate,
            beta1: cli.beta1,
            num_gen_updates: cli.num_gen_updates,
            log_every: cli.log_every,
            save_every: cli.save_every,
            device: cli.device.unwrap_or_else(face_dcgan::utils::default_device),
        }
    }
}

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config: Config = Cli::parse().into();
    config.validate()?;

    if let Err(err) = run(&config) {
        // Device selection is the one failure reported gracefully; anything
        // else propagates and terminates the run
        if let Some(device_err) = err.downcast_ref::<DeviceError>() {
            error!("{device_err}");
            return Ok(());
        }
        return Err(err);
    }
    Ok(())
}

fn run(config: &Config) -> Result<()> {
    let device = config.compute_device()?;
    info!("Using device: {:?}", device);

    let mut model = Dcgan::with_defaults(config.z_dim, device);
    let mut checkpoints =
        CheckpointManager::new(&config.checkpoint_dir, CheckpointManager::DEFAULT_KEEP)?;

    if config.restore_checkpoint || config.mode == Mode::Test {
        checkpoints.restore_latest(&mut model)?;
    }

    match config.mode {
        Mode::Train => train(config, &model, &mut checkpoints),
        Mode::Test => {
            sample_images(&model, config.batch_size as i64, &config.out_dir)?;
            Ok(())
        }
    }
}

fn train(config: &Config, model: &Dcgan, checkpoints: &mut CheckpointManager) -> Result<()> {
    let loader = ImageBatchLoader::new(
        &config.img_dir,
        config.batch_size,
        config.num_data_threads,
        model.image_size(),
    )?;
    info!(
        "Found {} training images ({} batches per epoch)",
        loader.num_images(),
        loader.num_batches()
    );

    let extractor = InceptionExtractor::fetch(EXTRACTOR_CACHE, model.device)?;
    let evaluator = QualityEvaluator::new(Box::new(extractor));

    let options = TrainerOptions {
        num_epochs: config.num_epochs,
        learn_rate: config.learn_rate,
        beta1: config.beta1,
        num_gen_updates: config.num_gen_updates,
        log_every: config.log_every,
        save_every: config.save_every,
    };

    let mut trainer = Trainer::new(model, options)?;
    let metrics = trainer.train(&loader, &evaluator, checkpoints)?;

    info!(
        "Training complete. Final g_loss={:.4}, d_loss={:.4}",
        metrics.latest_gen_loss().unwrap_or(f64::NAN),
        metrics.latest_disc_loss().unwrap_or(f64::NAN)
    );
    Ok(())
}
