//! Hermitian eigendecomposition of symmetric tensors.

use std::collections::BTreeMap;

use log::debug;

use crate::backend::dense_eigh;
use crate::contract::apply_mask;
use crate::error::TensorError;
use crate::scalar::Scalar;
use crate::symmetry::Charge;
use crate::tensor::SymTensor;

use super::truncation::{TruncationOptions, truncation_mask};
use super::{BondFactor, Split, SplitOptions};

/// Result of a Hermitian eigendecomposition: `A = U S U^H`.
#[derive(Debug, Clone)]
pub struct EighResult<T: Scalar> {
    /// Eigenvalues, diagonal with signature `(-s_u, s_u)`, non-increasing
    /// inside every sector.
    pub s: SymTensor<T>,
    /// Eigenvectors, legs `(left..., s_u)`.
    pub u: SymTensor<T>,
}

/// Eigendecomposition of a Hermitian operator mapping the `right` axes to
/// the `left` axes.
///
/// The total charge must be zero and every sector matrix square. Only the
/// lower triangle of each sector matrix is read.
pub fn eigh<T: Scalar>(
    a: &SymTensor<T>,
    left: &[usize],
    right: &[usize],
    s_u: i32,
) -> Result<EighResult<T>, TensorError> {
    let zero = a.sym().zero();
    if a.n() != zero.as_slice() {
        return Err(TensorError::TotalChargeMismatch {
            a: a.n().to_vec(),
            b: zero.to_vec(),
        });
    }
    let split = Split::new(a, left, right)?;
    let opts = SplitOptions { s_u, n_u: true };
    let mut us: BTreeMap<Charge, BondFactor<T>> = BTreeMap::new();
    let mut values: BTreeMap<Charge, Vec<f64>> = BTreeMap::new();
    for m in split.matrices() {
        if m.rows != m.cols {
            return Err(TensorError::NotSquareMatrix {
                rows: m.rows,
                cols: m.cols,
            });
        }
        let dec = dense_eigh(&m.data, m.rows)?;
        let k = m.rows;
        // largest first
        let mut vectors = Vec::with_capacity(k * k);
        for col in dec.vectors.chunks(k).rev() {
            vectors.extend_from_slice(col);
        }
        let mut vals = dec.values;
        vals.reverse();
        let bond = split.bond_charge(&m.charge, opts);
        us.insert(
            m.charge,
            BondFactor {
                bond: bond.clone(),
                k,
                data: vectors,
            },
        );
        values.insert(bond, vals);
    }
    let u = split.left_factor(s_u, &zero, &us)?;
    let s = split.spectrum(-s_u, values)?;
    debug!("eigh: {} sectors, bond dimension {}", s.num_blocks(), s.size());
    Ok(EighResult { s, u })
}

/// Eigendecomposition followed by global truncation of the bond.
///
/// Ranking uses the eigenvalues themselves, so the largest eigenvalues are
/// kept.
pub fn eigh_with_truncation<T: Scalar>(
    a: &SymTensor<T>,
    left: &[usize],
    right: &[usize],
    s_u: i32,
    trunc: &TruncationOptions,
) -> Result<EighResult<T>, TensorError> {
    let EighResult { s, u } = eigh(a, left, right, s_u)?;
    let mask = truncation_mask(&s, trunc)?;
    Ok(EighResult {
        s: apply_mask(&s, &mask, 0)?,
        u: apply_mask(&u, &mask, u.ndim() - 1)?,
    })
}
