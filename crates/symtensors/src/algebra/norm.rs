//! Tensor norms and spectral entropy.

use crate::error::TensorError;
use crate::scalar::Scalar;
use crate::tensor::SymTensor;

use super::sub;

/// Which norm to compute.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Norm {
    /// Frobenius norm, `sqrt(Σ |x|^2)`.
    #[default]
    Fro,
    /// Largest modulus of an entry.
    Inf,
}

/// Norm of a tensor. Absent blocks are zero, so an empty tensor has norm 0.
///
/// # Example
///
/// ```
/// use symtensors::{Config, Norm, SymTensor, Symmetry, norm};
///
/// let config = Config::new(Symmetry::u1());
/// let mut t: SymTensor<f64> = SymTensor::new(&config, &[1, -1], &[0]).unwrap();
/// t.set_block(&[0, 0], &[1, 1], vec![3.0]).unwrap();
/// t.set_block(&[1, 1], &[1, 1], vec![-4.0]).unwrap();
/// assert!((norm(&t, Norm::Fro) - 5.0).abs() < 1e-12);
/// assert_eq!(norm(&t, Norm::Inf), 4.0);
/// ```
pub fn norm<T: Scalar>(a: &SymTensor<T>, p: Norm) -> f64 {
    match p {
        Norm::Fro => a.data().iter().map(|x| x.abs_sqr()).sum::<f64>().sqrt(),
        Norm::Inf => a.data().iter().map(|x| x.modulus()).fold(0.0, f64::max),
    }
}

/// Whether `max |a - b| <= atol + rtol * max |b|`.
///
/// The operands must be combinable by [`sub`](super::sub).
pub fn allclose<T: Scalar>(a: &SymTensor<T>, b: &SymTensor<T>, rtol: f64, atol: f64) -> Result<bool, TensorError> {
    let diff = sub(a, b)?;
    Ok(norm(&diff, Norm::Inf) <= atol + rtol * norm(b, Norm::Inf))
}

/// Entropy of a spectrum, with its smallest value and norm.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Entropy {
    pub entropy: f64,
    pub min: f64,
    pub norm: f64,
}

/// Von Neumann (`alpha == 1`) or Renyi entropy, base 2, of the diagonal
/// tensor `s` of singular values.
///
/// Values are normalized by the Frobenius norm of `s`; normalized values at
/// or below `tol` do not contribute. A zero spectrum gives all zeros.
pub fn entropy<T: Scalar>(s: &SymTensor<T>, alpha: f64, tol: f64) -> Result<Entropy, TensorError> {
    if !s.is_diag() {
        return Err(TensorError::unsupported("entropy of a non-diagonal tensor"));
    }
    let total = norm(s, Norm::Fro);
    if total == 0.0 {
        return Ok(Entropy {
            entropy: 0.0,
            min: 0.0,
            norm: 0.0,
        });
    }
    let min = s
        .data()
        .iter()
        .map(|x| x.modulus())
        .fold(f64::INFINITY, f64::min);
    let values = s
        .data()
        .iter()
        .map(|x| x.modulus() / total)
        .filter(|&x| x > tol);
    let entropy = if alpha == 1.0 {
        values.map(|x| -2.0 * x * x * x.log2()).sum()
    } else {
        values.map(|x| x.powf(2.0 * alpha)).sum::<f64>().log2() / (1.0 - alpha)
    };
    Ok(Entropy {
        entropy,
        min,
        norm: total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::c64;
    use crate::config::Config;
    use crate::symmetry::Symmetry;
    use approx::assert_relative_eq;

    fn spectrum(values: &[f64]) -> SymTensor<f64> {
        let config = Config::new(Symmetry::u1());
        let mut d = SymTensor::new_diag(&config, 1).unwrap();
        for (c, &v) in values.iter().enumerate() {
            d.set_block(&[c as i64, c as i64], &[1], vec![v]).unwrap();
        }
        d
    }

    #[test]
    fn test_norm_complex() {
        let config = Config::new(Symmetry::z2());
        let mut t: SymTensor<c64> = SymTensor::new(&config, &[1, 1], &[0]).unwrap();
        t.set_block(&[1, 1], &[2, 1], vec![c64::new(3.0, 4.0), c64::new(0.0, 1.0)])
            .unwrap();
        assert_relative_eq!(norm(&t, Norm::Fro), 26f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(norm(&t, Norm::Inf), 5.0, epsilon = 1e-12);
        let empty: SymTensor<f64> = SymTensor::new(&config, &[1], &[0]).unwrap();
        assert_eq!(norm(&empty, Norm::Fro), 0.0);
    }

    #[test]
    fn test_allclose() {
        let a = spectrum(&[1.0, 2.0]);
        let b = spectrum(&[1.0, 2.0 + 1e-10]);
        assert!(allclose(&a, &b, 1e-8, 0.0).unwrap());
        let c = spectrum(&[1.0, 2.5]);
        assert!(!allclose(&a, &c, 1e-8, 1e-8).unwrap());
    }

    #[test]
    fn test_entropy() {
        let s = spectrum(&[1.0, 1.0]);
        let e = entropy(&s, 1.0, 1e-12).unwrap();
        assert_relative_eq!(e.entropy, 1.0, epsilon = 1e-12);
        assert_relative_eq!(e.norm, 2f64.sqrt(), epsilon = 1e-12);
        assert_eq!(e.min, 1.0);
        let r = entropy(&s, 2.0, 1e-12).unwrap();
        assert_relative_eq!(r.entropy, 1.0, epsilon = 1e-12);

        let product = spectrum(&[1.0]);
        assert_relative_eq!(entropy(&product, 1.0, 1e-12).unwrap().entropy, 0.0);
    }
}
