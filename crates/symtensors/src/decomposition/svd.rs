//! Singular value decomposition of symmetric tensors.

use std::collections::BTreeMap;

use log::debug;

use crate::backend::dense_svd;
use crate::contract::apply_mask;
use crate::error::TensorError;
use crate::scalar::Scalar;
use crate::symmetry::Charge;
use crate::tensor::SymTensor;

use super::truncation::{TruncationOptions, truncation_mask};
use super::{BondFactor, Split, SplitOptions};

/// Result of an SVD: `A = U S V`.
#[derive(Debug, Clone)]
pub struct SvdResult<T: Scalar> {
    /// Left singular vectors, legs `(left..., s_u)`.
    pub u: SymTensor<T>,
    /// Singular values, diagonal with signature `(-s_u, s_u)`, non-increasing
    /// inside every sector.
    pub s: SymTensor<T>,
    /// Right singular vectors, legs `(-s_u, right...)`.
    pub v: SymTensor<T>,
}

/// Thin SVD with `left` axes on `U` and `right` axes on `V`.
///
/// Each sector keeps `min(rows, cols)` singular values, zeros included.
/// Meta and hard fusions of the split axes carry over to the factors.
pub fn svd<T: Scalar>(
    a: &SymTensor<T>,
    left: &[usize],
    right: &[usize],
    opts: SplitOptions,
) -> Result<SvdResult<T>, TensorError> {
    let split = Split::new(a, left, right)?;
    let mut us: BTreeMap<Charge, BondFactor<T>> = BTreeMap::new();
    let mut vs: BTreeMap<Charge, BondFactor<T>> = BTreeMap::new();
    let mut values: BTreeMap<Charge, Vec<f64>> = BTreeMap::new();
    for m in split.matrices() {
        let dec = dense_svd(&m.data, m.rows, m.cols)?;
        let bond = split.bond_charge(&m.charge, opts);
        us.insert(
            m.charge.clone(),
            BondFactor {
                bond: bond.clone(),
                k: dec.k,
                data: dec.u,
            },
        );
        vs.insert(
            m.charge,
            BondFactor {
                bond: bond.clone(),
                k: dec.k,
                data: dec.vh,
            },
        );
        values.insert(bond, dec.s);
    }
    let (n_u, n_v) = split.factor_charges(opts);
    let u = split.left_factor(opts.s_u, &n_u, &us)?;
    let v = split.right_factor(-opts.s_u, &n_v, &vs)?;
    let s = split.spectrum(-opts.s_u, values)?;
    debug!("svd: {} sectors, bond dimension {}", s.num_blocks(), s.size());
    Ok(SvdResult { u, s, v })
}

/// SVD followed by global truncation of the bond.
///
/// The kept singular values are chosen by [`truncation_mask`] over all
/// sectors at once; sectors losing every value disappear from all three
/// factors.
pub fn svd_with_truncation<T: Scalar>(
    a: &SymTensor<T>,
    left: &[usize],
    right: &[usize],
    opts: SplitOptions,
    trunc: &TruncationOptions,
) -> Result<SvdResult<T>, TensorError> {
    let SvdResult { u, s, v } = svd(a, left, right, opts)?;
    let mask = truncation_mask(&s, trunc)?;
    Ok(SvdResult {
        u: apply_mask(&u, &mask, u.ndim() - 1)?,
        s: apply_mask(&s, &mask, 0)?,
        v: apply_mask(&v, &mask, 0)?,
    })
}
