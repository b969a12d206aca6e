//! Loss functions for GAN training
//!
//! Implements binary cross entropy on discriminator probabilities, with the
//! logarithm clamped away from zero for numerical stability.

use tch::{Kind, Tensor};

/// Probabilities are floored at this value before taking the logarithm.
const LOG_EPS: f64 = 1e-5;

/// Numerically stable logarithm: ln(max(x, 1e-5))
///
/// Finite even at x = 0, never -inf or NaN.
pub fn stable_log(x: &Tensor) -> Tensor {
    x.clamp_min(LOG_EPS).log()
}

/// Generator loss: -mean(log(D(G(z))))
///
/// Mean cross entropy between the discriminator's fake-image predictions and
/// an all-real target: the generator is rewarded when the discriminator is
/// fooled into predicting "real".
///
/// # Arguments
///
/// * `fake_probs` - Discriminator probabilities on generated images, shape (batch, 1)
///
/// # Returns
///
/// Scalar loss tensor, non-negative
pub fn generator_loss(fake_probs: &Tensor) -> Tensor {
    -stable_log(fake_probs).mean(Kind::Float)
}

/// Discriminator loss: -mean(log(1 - D(G(z)))) - mean(log(D(x)))
///
/// Sum of the cross entropy pushing fake predictions toward "fake" and the
/// cross entropy pushing real predictions toward "real".
///
/// # Arguments
///
/// * `real_probs` - Discriminator probabilities on real images, shape (batch, 1)
/// * `fake_probs` - Discriminator probabilities on generated images, shape (batch, 1)
///
/// # Returns
///
/// Scalar loss tensor, non-negative
pub fn discriminator_loss(real_probs: &Tensor, fake_probs: &Tensor) -> Tensor {
    let fake_loss = -stable_log(&(Tensor::ones_like(fake_probs) - fake_probs)).mean(Kind::Float);
    let real_loss = -stable_log(real_probs).mean(Kind::Float);
    fake_loss + real_loss
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_log_finite_at_zero() {
        let zero = Tensor::from_slice(&[0.0f32]);
        let out = stable_log(&zero).double_value(&[0]);

        assert!(out.is_finite());
        assert!((out - LOG_EPS.ln()).abs() < 1e-4);
    }

    #[test]
    fn test_generator_loss_near_zero_when_fooled() {
        // Discriminator predicts "real" for every fake
        let fooled = Tensor::from_slice(&[0.999f32, 0.999, 0.999]).view([3, 1]);
        let loss = generator_loss(&fooled).double_value(&[]);

        assert!(loss >= 0.0);
        assert!(loss < 0.01);
    }

    #[test]
    fn test_generator_loss_decreases_as_discriminator_is_fooled() {
        let mut prev = f64::INFINITY;
        for p in [0.1f32, 0.5, 0.9, 0.99] {
            let probs = Tensor::from_slice(&[p; 4]).view([4, 1]);
            let loss = generator_loss(&probs).double_value(&[]);
            assert!(loss < prev);
            prev = loss;
        }
    }

    #[test]
    fn test_generator_loss_finite_at_worst_case() {
        let rejected = Tensor::from_slice(&[0.0f32, 0.0]).view([2, 1]);
        let loss = generator_loss(&rejected).double_value(&[]);

        assert!(loss.is_finite());
        assert!(loss > 10.0); // -ln(1e-5) ~= 11.5
    }

    #[test]
    fn test_discriminator_loss_near_zero_when_perfect() {
        let real = Tensor::from_slice(&[0.999f32, 0.999]).view([2, 1]);
        let fake = Tensor::from_slice(&[0.001f32, 0.001]).view([2, 1]);
        let loss = discriminator_loss(&real, &fake).double_value(&[]);

        assert!(loss >= 0.0);
        assert!(loss < 0.01);
    }

    #[test]
    fn test_discriminator_loss_large_when_inverted() {
        let real = Tensor::from_slice(&[0.001f32, 0.001]).view([2, 1]);
        let fake = Tensor::from_slice(&[0.999f32, 0.999]).view([2, 1]);
        let loss = discriminator_loss(&real, &fake).double_value(&[]);

        assert!(loss.is_finite());
        assert!(loss > 10.0);
    }
}
