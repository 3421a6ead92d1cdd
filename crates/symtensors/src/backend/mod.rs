//! Dense backend for block kernels.
//!
//! The block-sparse engine never computes element values itself: it decides
//! which blocks meet and hands dense, column-major buffers to a backend.
//!
//! # Backends
//!
//! - `FaerBackend`: faer matmul and a stride-walking permute (default)
//! - `GenericBackend`: naive loop-based implementation, for cross-checks
//!
//! Factorizations live in [`faer_interop`](self) and are shared by both.

mod faer_interop;
mod generic;

use faer::linalg::matmul::matmul;
use faer::{Accum, MatMut, MatRef, Par};

use crate::config::BackendKind;
use crate::scalar::Scalar;
use crate::strides::{compute_strides, next_index};

pub use faer_interop::{DenseEigh, DenseQr, DenseSvd, dense_eigh, dense_qr, dense_svd};
pub use generic::GenericBackend;

/// Trait for permute and matrix-product kernels.
pub trait DenseBackend {
    /// Permute `src` (shape `shape`) into `dest`, so that axis `i` of
    /// `dest` is axis `perm[i]` of `src`.
    fn permute_into<T: Scalar>(dest: &mut [T], src: &[T], shape: &[usize], perm: &[usize]);

    /// `c = a b` (or `c += a b` when `accumulate`), with `a` of shape
    /// `(m, k)`, `b` of shape `(k, n)` and `c` of shape `(m, n)`.
    #[allow(clippy::too_many_arguments)]
    fn matmul_into<T: Scalar>(
        c: &mut [T],
        a: &[T],
        b: &[T],
        m: usize,
        k: usize,
        n: usize,
        accumulate: bool,
    );
}

/// faer-backed kernels.
pub struct FaerBackend;

impl DenseBackend for FaerBackend {
    fn permute_into<T: Scalar>(dest: &mut [T], src: &[T], shape: &[usize], perm: &[usize]) {
        if src.is_empty() {
            return;
        }
        if perm.iter().enumerate().all(|(i, &p)| i == p) {
            dest.copy_from_slice(src);
            return;
        }
        let src_strides = compute_strides(shape);
        let new_shape: Vec<usize> = perm.iter().map(|&p| shape[p]).collect();
        let walk: Vec<usize> = perm.iter().map(|&p| src_strides[p]).collect();
        let mut index = vec![0usize; new_shape.len()];
        let mut offset = 0usize;
        for d in dest.iter_mut() {
            *d = src[offset];
            // advance column-major over the destination, tracking the source offset
            for (axis, i) in index.iter_mut().enumerate() {
                *i += 1;
                offset += walk[axis];
                if *i < new_shape[axis] {
                    break;
                }
                offset -= walk[axis] * new_shape[axis];
                *i = 0;
            }
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
        let a_mat = MatRef::from_column_major_slice(a, m, k);
        let b_mat = MatRef::from_column_major_slice(b, k, n);
        let mut c_mat = MatMut::from_column_major_slice_mut(c, m, n);
        let accum = if accumulate {
            Accum::Add
        } else {
            Accum::Replace
        };
        matmul(c_mat.as_mut(), accum, a_mat, b_mat, T::one(), Par::Seq);
    }
}

/// Permute a buffer with the selected backend.
pub fn permute<T: Scalar>(kind: BackendKind, src: &[T], shape: &[usize], perm: &[usize]) -> Vec<T> {
    let mut dest = vec![T::zero(); src.len()];
    match kind {
        BackendKind::Faer => FaerBackend::permute_into(&mut dest, src, shape, perm),
        BackendKind::Generic => GenericBackend::permute_into(&mut dest, src, shape, perm),
    }
    dest
}

/// Matrix product with the selected backend.
#[allow(clippy::too_many_arguments)]
pub fn matmul_into<T: Scalar>(
    kind: BackendKind,
    c: &mut [T],
    a: &[T],
    b: &[T],
    m: usize,
    k: usize,
    n: usize,
    accumulate: bool,
) {
    match kind {
        BackendKind::Faer => FaerBackend::matmul_into(c, a, b, m, k, n, accumulate),
        BackendKind::Generic => GenericBackend::matmul_into(c, a, b, m, k, n, accumulate),
    }
}

/// Sum of the diagonal over the paired axes `axes1[i] <-> axes2[i]` of a
/// dense block, leaving the remaining axes in order.
pub fn trace_block<T: Scalar>(
    src: &[T],
    shape: &[usize],
    axes1: &[usize],
    axes2: &[usize],
) -> (Vec<T>, Vec<usize>) {
    let strides = compute_strides(shape);
    let keep: Vec<usize> = (0..shape.len())
        .filter(|a| !axes1.contains(a) && !axes2.contains(a))
        .collect();
    let out_shape: Vec<usize> = keep.iter().map(|&a| shape[a]).collect();
    let traced: Vec<usize> = axes1.iter().map(|&a| shape[a]).collect();
    let diag_strides: Vec<usize> = axes1
        .iter()
        .zip(axes2)
        .map(|(&a1, &a2)| strides[a1] + strides[a2])
        .collect();
    let out_len: usize = out_shape.iter().product();
    let mut out = vec![T::zero(); out_len];
    if traced.iter().any(|&d| d == 0) {
        return (out, out_shape);
    }
    let mut out_index = vec![0usize; keep.len()];
    for o in out.iter_mut() {
        let base: usize = out_index
            .iter()
            .zip(&keep)
            .map(|(&i, &a)| i * strides[a])
            .sum();
        let mut acc = T::zero();
        let mut t_index = vec![0usize; traced.len()];
        loop {
            let off: usize = t_index
                .iter()
                .zip(&diag_strides)
                .map(|(&i, &s)| i * s)
                .sum();
            acc += src[base + off];
            if !next_index(&mut t_index, &traced) {
                break;
            }
        }
        *o = acc;
        next_index(&mut out_index, &out_shape);
    }
    (out, out_shape)
}
