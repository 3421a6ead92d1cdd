//! Generic (naive loop-based) backend implementation.

use crate::backend::DenseBackend;
use crate::scalar::Scalar;
use crate::strides::{cartesian_to_linear, compute_strides, linear_to_cartesian};

/// Generic backend using naive loop-based implementations.
///
/// This backend is always available and serves as a reference for the faer
/// kernels. It's suitable for small blocks and debugging.
pub struct GenericBackend;

impl DenseBackend for GenericBackend {
    fn permute_into<T: Scalar>(dest: &mut [T], src: &[T], shape: &[usize], perm: &[usize]) {
        let new_shape: Vec<usize> = perm.iter().map(|&p| shape[p]).collect();
        let new_strides = compute_strides(&new_shape);

        for (linear_old, &value) in src.iter().enumerate() {
            let old_indices = linear_to_cartesian(linear_old, shape);
            // new_indices[i] = old_indices[perm[i]]
            let new_indices: Vec<usize> = perm.iter().map(|&p| old_indices[p]).collect();
            dest[cartesian_to_linear(&new_indices, &new_strides)] = value;
        }
    }

    fn matmul_into<T: Scalar>(
        c: &mut [T],
        a: &[T],
        b: &[T],
        m: usize,
        k: usize,
        n: usize,
        accumulate: bool,
    ) {
        for j in 0..n {
            for i in 0..m {
                let mut acc = if accumulate { c[i + m * j] } else { T::zero() };
                for l in 0..k {
                    acc += a[i + m * l] * b[l + k * j];
                }
                c[i + m * j] = acc;
            }
        }
    }
}
