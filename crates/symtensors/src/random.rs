//! Random tensor construction.
//!
//! Random tensors have every block allowed by their legs and total charge,
//! filled with independent samples.

use rand::Rng;
use rand::distr::StandardUniform;
use rand_distr::StandardNormal;

use crate::config::Config;
use crate::error::TensorError;
use crate::scalar::{Scalar, c64};
use crate::structure::Leg;
use crate::tensor::SymTensor;

/// Trait for types that can be sampled uniformly from `[-1, 1)`.
pub trait RandomUniform: Scalar {
    /// Sample from `[-1, 1)`; complex types sample both parts.
    fn sample_uniform<R: Rng>(rng: &mut R) -> Self;
}

impl RandomUniform for f64 {
    fn sample_uniform<R: Rng>(rng: &mut R) -> Self {
        2.0 * rng.sample::<f64, _>(StandardUniform) - 1.0
    }
}

impl RandomUniform for c64 {
    fn sample_uniform<R: Rng>(rng: &mut R) -> Self {
        c64::new(f64::sample_uniform(rng), f64::sample_uniform(rng))
    }
}

/// Trait for types that can be randomly sampled from a normal distribution.
pub trait RandomNormal: Scalar {
    /// Sample a random value from the standard normal distribution.
    fn sample_normal<R: Rng>(rng: &mut R) -> Self;
}

impl RandomNormal for f64 {
    fn sample_normal<R: Rng>(rng: &mut R) -> Self {
        rng.sample(StandardNormal)
    }
}

impl RandomNormal for c64 {
    fn sample_normal<R: Rng>(rng: &mut R) -> Self {
        // real and imaginary parts are independent N(0, 1/2)
        let scale = std::f64::consts::FRAC_1_SQRT_2;
        c64::new(
            rng.sample::<f64, _>(StandardNormal) * scale,
            rng.sample::<f64, _>(StandardNormal) * scale,
        )
    }
}

impl<T: RandomUniform> SymTensor<T> {
    /// Tensor with uniform random entries in `[-1, 1)`.
    ///
    /// # Example
    ///
    /// ```
    /// use symtensors::{Config, Leg, SymTensor, Symmetry};
    ///
    /// let config = Config::new(Symmetry::z2());
    /// let sym = config.sym().clone();
    /// let leg = Leg::new(&sym, 1, &[0, 1], &[2, 3]).unwrap();
    /// let t: SymTensor<f64> = SymTensor::rand(&config, &[leg.clone(), leg.conj()], &[0]).unwrap();
    /// assert_eq!(t.size(), 4 + 9);
    /// assert!(t.data().iter().all(|v| (-1.0..1.0).contains(v)));
    /// ```
    pub fn rand(config: &Config, legs: &[Leg], n: &[i64]) -> Result<Self, TensorError> {
        Self::rand_with_rng(config, legs, n, &mut rand::rng())
    }

    /// Uniform random tensor drawing from `rng`, for reproducible results.
    pub fn rand_with_rng<R: Rng>(config: &Config, legs: &[Leg], n: &[i64], rng: &mut R) -> Result<Self, TensorError> {
        Self::from_legs_with(config, legs, n, |size| {
            (0..size).map(|_| T::sample_uniform(rng)).collect()
        })
    }
}

impl<T: RandomNormal> SymTensor<T> {
    /// Tensor with standard normal random entries.
    pub fn randn(config: &Config, legs: &[Leg], n: &[i64]) -> Result<Self, TensorError> {
        Self::randn_with_rng(config, legs, n, &mut rand::rng())
    }

    /// Normal random tensor drawing from `rng`, for reproducible results.
    pub fn randn_with_rng<R: Rng>(config: &Config, legs: &[Leg], n: &[i64], rng: &mut R) -> Result<Self, TensorError> {
        Self::from_legs_with(config, legs, n, |size| {
            (0..size).map(|_| T::sample_normal(rng)).collect()
        })
    }
}
