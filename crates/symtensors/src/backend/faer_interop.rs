//! Dense factorizations of single blocks through faer.
//!
//! Blocks are column-major, like faer matrices, so a block buffer is viewed
//! as a `MatRef` without copying. Results are copied back into plain
//! column-major buffers.

use faer::MatRef;
use faer::linalg::solvers::{EvdError, Qr, Svd, SvdError};

use crate::error::TensorError;
use crate::scalar::Scalar;

/// Thin SVD of an `m x n` block: `A = U diag(S) Vh`.
#[derive(Clone, Debug)]
pub struct DenseSvd<T> {
    /// `m x k`
    pub u: Vec<T>,
    /// Singular values in non-increasing order.
    pub s: Vec<f64>,
    /// `k x n`
    pub vh: Vec<T>,
    pub k: usize,
}

/// Hermitian eigendecomposition of an `n x n` block: `A = U diag(S) U^H`.
#[derive(Clone, Debug)]
pub struct DenseEigh<T> {
    /// Eigenvalues in non-decreasing order.
    pub values: Vec<f64>,
    /// Eigenvectors as columns, `n x n`.
    pub vectors: Vec<T>,
}

/// Thin QR of an `m x n` block with non-negative real diagonal of R.
#[derive(Clone, Debug)]
pub struct DenseQr<T> {
    /// `m x k`
    pub q: Vec<T>,
    /// `k x n`
    pub r: Vec<T>,
    pub k: usize,
}

/// Thin SVD of a column-major `m x n` block.
pub fn dense_svd<T: Scalar>(data: &[T], m: usize, n: usize) -> Result<DenseSvd<T>, TensorError> {
    let mat = MatRef::from_column_major_slice(data, m, n);
    let k = m.min(n);

    let svd: Svd<T> = Svd::new_thin(mat).map_err(|e: SvdError| TensorError::SvdError {
        message: format!("{:?}", e),
    })?;
    let u_mat = svd.U();
    let s_diag = svd.S();
    let v_mat = svd.V();

    let mut u = Vec::with_capacity(m * k);
    for j in 0..k {
        for i in 0..m {
            u.push(u_mat[(i, j)]);
        }
    }
    let s: Vec<f64> = (0..k).map(|i| s_diag[i].real_part()).collect();
    // Vh[i, j] = conj(V[j, i])
    let mut vh = Vec::with_capacity(k * n);
    for j in 0..n {
        for i in 0..k {
            vh.push(v_mat[(j, i)].conjugate());
        }
    }
    Ok(DenseSvd { u, s, vh, k })
}

/// Hermitian eigendecomposition of a column-major `n x n` block.
pub fn dense_eigh<T: Scalar>(data: &[T], n: usize) -> Result<DenseEigh<T>, TensorError> {
    if data.len() != n * n {
        return Err(TensorError::NotSquareMatrix {
            rows: n,
            cols: data.len() / n.max(1),
        });
    }
    let mat = MatRef::from_column_major_slice(data, n, n);
    let evd = mat
        .self_adjoint_eigen(faer::Side::Lower)
        .map_err(|e: EvdError| TensorError::EigenError {
            message: format!("Hermitian eigendecomposition failed: {:?}", e),
        })?;

    let s_diag = evd.S();
    let values: Vec<f64> = (0..n).map(|i| s_diag[i].real_part()).collect();
    let u_mat = evd.U();
    let mut vectors = Vec::with_capacity(n * n);
    for j in 0..n {
        for i in 0..n {
            vectors.push(u_mat[(i, j)]);
        }
    }
    Ok(DenseEigh { values, vectors })
}

/// Thin QR of a column-major `m x n` block.
///
/// Columns of Q and rows of R are rescaled so that the real part of the
/// diagonal of R is non-negative.
pub fn dense_qr<T: Scalar>(data: &[T], m: usize, n: usize) -> DenseQr<T> {
    let mat = MatRef::from_column_major_slice(data, m, n);
    let k = m.min(n);
    let qr: Qr<T> = Qr::new(mat);
    let q_mat = qr.compute_thin_Q();
    let r_mat = qr.thin_R();

    let signs: Vec<T> = (0..k)
        .map(|i| {
            if r_mat[(i, i)].real_part() < 0.0 {
                -T::one()
            } else {
                T::one()
            }
        })
        .collect();

    let mut q = Vec::with_capacity(m * k);
    for (j, &sign) in signs.iter().enumerate() {
        for i in 0..m {
            q.push(q_mat[(i, j)] * sign);
        }
    }
    let mut r = Vec::with_capacity(k * n);
    for j in 0..n {
        for (i, &sign) in signs.iter().enumerate() {
            r.push(r_mat[(i, j)] * sign);
        }
    }
    DenseQr { q, r, k }
}
