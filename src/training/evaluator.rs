//! Image quality evaluation via Frechet distance
//!
//! Projects real and generated batches through a frozen pretrained classifier
//! and computes the Frechet distance between the two activation populations.
//! Lower is better. Strictly read-only: everything runs under `no_grad` and
//! never touches model parameters.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tch::nn::{ModuleT, VarStore};
use tch::{Device, Kind, Tensor};
use tracing::info;

/// Input resolution expected by the pretrained feature extractor.
const EXTRACTOR_INPUT_SIZE: i64 = 299;

/// ImageNet-pretrained weights for `tch::vision::inception::v3`, published as
/// a named-tensor archive in the tch-rs model weights release. Downloaded
/// once on first use and restored with `VarStore::load`.
const INCEPTION_WEIGHTS_URL: &str =
    "https://github.com/LaurentMazare/tch-rs/releases/download/mw/inception-v3.ot";

/// ImageNet classes the pretrained head was trained on.
const IMAGENET_CLASSES: i64 = 1000;

/// ImageNet channel statistics applied before the classifier forward.
const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Capability interface over the pretrained feature extractor, so the
/// evaluator can be exercised in tests without network access.
pub trait FeatureExtractor {
    /// Project a batch of images, shape (batch, 3, H, W) with values in
    /// [0, 1], into a batch of activation vectors, shape (batch, dim).
    fn embed(&self, images: &Tensor) -> Result<Tensor>;
}

/// Frozen pretrained Inception-v3 classifier: the `tch::vision` graph with
/// ImageNet weights restored into its `VarStore`.
pub struct InceptionExtractor {
    vs: VarStore,
    net: Box<dyn ModuleT>,
}

impl InceptionExtractor {
    /// Load the extractor from a local named-tensor weight archive
    pub fn load<P: AsRef<Path>>(path: P, device: Device) -> Result<Self> {
        let mut vs = VarStore::new(device);
        let net = Box::new(tch::vision::inception::v3(&vs.root(), IMAGENET_CLASSES));
        vs.load(&path)
            .with_context(|| format!("loading feature extractor weights from {:?}", path.as_ref()))?;
        vs.freeze();
        Ok(Self { vs, net })
    }

    /// Load the extractor, downloading the weight archive from the model
    /// registry if it is not cached locally yet
    pub fn fetch<P: AsRef<Path>>(cache_path: P, device: Device) -> Result<Self> {
        let cache_path = cache_path.as_ref();
        if !cache_path.exists() {
            if let Some(parent) = cache_path.parent() {
                fs::create_dir_all(parent)?;
            }
            info!("Downloading pretrained feature extractor from {}", INCEPTION_WEIGHTS_URL);
            let response = reqwest::blocking::get(INCEPTION_WEIGHTS_URL)?.error_for_status()?;
            let bytes = response.bytes()?;
            fs::write(cache_path, &bytes)
                .with_context(|| format!("caching feature extractor at {cache_path:?}"))?;
            info!("Cached feature extractor at {:?}", cache_path);
        }
        Self::load(cache_path, device)
    }
}

impl FeatureExtractor for InceptionExtractor {
    fn embed(&self, images: &Tensor) -> Result<Tensor> {
        let images = images.to_device(self.vs.device());
        Ok(self.net.forward_t(&imagenet_normalize(&images), false))
    }
}

/// Shift [0, 1] images to the ImageNet channel statistics the pretrained
/// classifier expects
fn imagenet_normalize(images: &Tensor) -> Tensor {
    let mean = Tensor::from_slice(&IMAGENET_MEAN)
        .view([3, 1, 1])
        .to_device(images.device());
    let std = Tensor::from_slice(&IMAGENET_STD)
        .view([3, 1, 1])
        .to_device(images.device());
    (images - mean) / std
}

/// Quality evaluator comparing generated images against real ones
pub struct QualityEvaluator {
    extractor: Box<dyn FeatureExtractor>,
}

impl QualityEvaluator {
    /// Create an evaluator around a feature extractor
    pub fn new(extractor: Box<dyn FeatureExtractor>) -> Self {
        Self { extractor }
    }

    /// Frechet distance between a real and a generated image batch
    ///
    /// # Arguments
    ///
    /// * `real` - Real images, shape (batch, 3, H, W), values in [-1, 1]
    /// * `fake` - Generated images, same shape and range
    ///
    /// # Returns
    ///
    /// Non-negative scalar; lower means the generated distribution is closer
    /// to the real one
    pub fn distance(&self, real: &Tensor, fake: &Tensor) -> Result<f64> {
        tch::no_grad(|| {
            let real_features = self.embed_resized(real)?;
            let fake_features = self.embed_resized(fake)?;
            Ok(frechet_distance(&real_features, &fake_features))
        })
    }

    fn embed_resized(&self, images: &Tensor) -> Result<Tensor> {
        let resized = images.detach().upsample_bilinear2d(
            [EXTRACTOR_INPUT_SIZE, EXTRACTOR_INPUT_SIZE],
            false,
            None::<f64>,
            None::<f64>,
        );
        // [-1, 1] -> [0, 1] for the extractor
        let rescaled = (resized + 1.0) / 2.0;
        self.extractor.embed(&rescaled)
    }
}

/// Frechet distance between two activation populations
///
/// `|mu_x - mu_y|^2 + tr(Cx + Cy - 2 sqrtm(Cx Cy))`, with the matrix square
/// root taken in the symmetric form sqrtm(sqrt(Cx) Cy sqrt(Cx)) and
/// eigenvalues clamped at zero.
///
/// # Arguments
///
/// * `x` / `y` - Activation batches of shape (n, dim), n >= 2
pub fn frechet_distance(x: &Tensor, y: &Tensor) -> f64 {
    let x = x.to_kind(Kind::Double);
    let y = y.to_kind(Kind::Double);

    let mu_x = x.mean_dim([0i64].as_slice(), false, Kind::Double);
    let mu_y = y.mean_dim([0i64].as_slice(), false, Kind::Double);
    let cov_x = covariance(&x, &mu_x);
    let cov_y = covariance(&y, &mu_y);

    let diff = &mu_x - &mu_y;
    let mean_term = diff.dot(&diff);

    let sqrt_cov_x = symmetric_sqrt(&cov_x);
    let product = sqrt_cov_x.matmul(&cov_y).matmul(&sqrt_cov_x);
    let (eigenvalues, _) = product.linalg_eigh("L");
    let trace_sqrt = eigenvalues.clamp_min(0.0).sqrt().sum(Kind::Double);

    let trace_term = cov_x.trace() + cov_y.trace() - trace_sqrt * 2.0;

    let distance = (mean_term + trace_term).double_value(&[]);
    // Tiny negative values can arise from eigenvalue round-off
    distance.max(0.0)
}

/// Unbiased covariance of a feature batch, shape (dim, dim)
fn covariance(features: &Tensor, mean: &Tensor) -> Tensor {
    let n = features.size()[0];
    let centered = features - mean.unsqueeze(0);
    centered.transpose(0, 1).matmul(&centered) / (n - 1).max(1) as f64
}

/// Square root of a symmetric positive semi-definite matrix via
/// eigendecomposition, negative round-off eigenvalues clamped to zero
fn symmetric_sqrt(m: &Tensor) -> Tensor {
    let (eigenvalues, eigenvectors) = m.linalg_eigh("L");
    let sqrt_eigenvalues = eigenvalues.clamp_min(0.0).sqrt();
    eigenvectors
        .matmul(&sqrt_eigenvalues.diag_embed(0, -2, -1))
        .matmul(&eigenvectors.transpose(-2, -1))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic network-free extractor: channel-wise spatial pooling.
    pub(crate) struct StubExtractor;

    impl FeatureExtractor for StubExtractor {
        fn embed(&self, images: &Tensor) -> Result<Tensor> {
            Ok(images.adaptive_avg_pool2d([2, 2]).flatten(1, -1))
        }
    }

    #[test]
    fn test_frechet_distance_zero_for_identical_populations() {
        let x = Tensor::randn([8, 6], (Kind::Float, Device::Cpu));
        let d = frechet_distance(&x, &x.shallow_clone());

        assert!(d.abs() < 1e-6);
    }

    #[test]
    fn test_frechet_distance_positive_for_shifted_populations() {
        let x = Tensor::randn([8, 6], (Kind::Float, Device::Cpu));
        let y = &x + 3.0;
        let d = frechet_distance(&x, &y);

        assert!(d > 1.0);
    }

    #[test]
    fn test_evaluator_distance_on_image_batches() {
        let evaluator = QualityEvaluator::new(Box::new(StubExtractor));

        let real = Tensor::full([4, 3, 64, 64], -0.5, (Kind::Float, Device::Cpu));
        let fake = Tensor::full([4, 3, 64, 64], 0.5, (Kind::Float, Device::Cpu));

        let same = evaluator.distance(&real, &real.shallow_clone()).unwrap();
        let apart = evaluator.distance(&real, &fake).unwrap();

        assert!(same.abs() < 1e-6);
        assert!(apart > 1.0);
    }

    #[test]
    fn test_extractor_restores_weight_archive_and_embeds() {
        let dir = tempfile::tempdir().unwrap();
        let weights = dir.path().join("inception-v3.ot");

        // A named-tensor archive saved from the same graph shape is exactly
        // what the registry download contains
        let vs = VarStore::new(Device::Cpu);
        let _net = tch::vision::inception::v3(&vs.root(), IMAGENET_CLASSES);
        vs.save(&weights).unwrap();

        let extractor = InceptionExtractor::load(&weights, Device::Cpu).unwrap();
        let images = Tensor::rand(
            [1, 3, EXTRACTOR_INPUT_SIZE, EXTRACTOR_INPUT_SIZE],
            (Kind::Float, Device::Cpu),
        );
        let features = extractor.embed(&images).unwrap();

        assert_eq!(features.size(), vec![1, IMAGENET_CLASSES]);
    }

    #[test]
    fn test_extractor_load_rejects_missing_archive() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.ot");

        assert!(InceptionExtractor::load(&missing, Device::Cpu).is_err());
    }

    #[test]
    fn test_symmetric_sqrt_roundtrip() {
        let a = Tensor::randn([5, 5], (Kind::Double, Device::Cpu));
        // Symmetric PSD by construction
        let m = a.matmul(&a.transpose(0, 1));
        let root = symmetric_sqrt(&m);
        let back = root.matmul(&root);

        assert!(back.allclose(&m, 1e-6, 1e-6, false));
    }
}
