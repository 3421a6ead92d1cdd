//! Multiplication by a diagonal tensor along one axis, and projection onto
//! the nonzero entries of a diagonal tensor.

use std::collections::HashMap;

use crate::error::TensorError;
use crate::fusion::mask::restrict_axis;
use crate::fusion::native_ranges;
use crate::scalar::Scalar;
use crate::structure::BlockKey;
use crate::symmetry::Charge;
use crate::tensor::{OwnedBlock, SymTensor};

/// Native position of logical `axis`, which must be unfused.
fn plain_axis<T: Scalar>(a: &SymTensor<T>, axis: usize) -> Result<usize, TensorError> {
    if axis >= a.ndim() {
        return Err(TensorError::InvalidPermutation {
            perm: vec![axis],
            ndim: a.ndim(),
        });
    }
    if !a.meta_fusion()[axis].is_leaf() {
        return Err(TensorError::unsupported(format!(
            "axis {} is meta-fused; unfuse it before multiplying by a diagonal",
            axis
        )));
    }
    let p = native_ranges(a.meta_fusion())[axis].start;
    if !a.hard_fusion()[p].is_leaf() {
        return Err(TensorError::unsupported(format!(
            "axis {} is hard-fused; unfuse it before multiplying by a diagonal",
            axis
        )));
    }
    Ok(p)
}

/// Diagonal entries of `d` keyed by sector charge.
fn diagonal_sectors<T: Scalar>(d: &SymTensor<T>) -> Result<HashMap<Charge, &[T]>, TensorError> {
    if !d.is_diag() {
        return Err(TensorError::unsupported("expected a diagonal tensor"));
    }
    Ok(d.blocks()
        .map(|(k, _, x)| (Charge::from_slice(k.charge(0)), x))
        .collect())
}

/// Multiply the slices of logical `axis` of `a` by the diagonal `d`.
///
/// Blocks of `a` whose charge on `axis` has no sector in `d` are dropped.
/// `conj` conjugates `a` and `d` before the product. If `a` is diagonal
/// the result is diagonal.
///
/// # Example
///
/// ```
/// use symtensors::{Config, Leg, SymTensor, Symmetry, broadcast};
///
/// let config = Config::new(Symmetry::u1());
/// let sym = config.sym().clone();
/// let leg = Leg::new(&sym, 1, &[0, 1], &[1, 2]).unwrap();
/// let a: SymTensor<f64> = SymTensor::ones(&config, &[leg.clone(), leg.conj()], &[0]).unwrap();
/// let mut d: SymTensor<f64> = SymTensor::new_diag(&config, 1).unwrap();
/// d.set_block(&[1, 1], &[2], vec![2.0, 3.0]).unwrap();
/// let b = broadcast(&a, &d, 1, (false, false)).unwrap();
/// assert_eq!(b.num_blocks(), 1);
/// assert_eq!(b.block(&[1, 1]).unwrap(), &[2.0, 2.0, 3.0, 3.0]);
/// ```
pub fn broadcast<T: Scalar>(
    a: &SymTensor<T>,
    d: &SymTensor<T>,
    axis: usize,
    conj: (bool, bool),
) -> Result<SymTensor<T>, TensorError> {
    a.config().check_compatible(d.config())?;
    let a = if conj.0 { a.conj() } else { a.clone() };
    let d = if conj.1 { d.conj() } else { d.clone() };
    let p = plain_axis(&a, axis)?;
    let sectors = diagonal_sectors(&d)?;

    let mut blocks: Vec<OwnedBlock<T>> = Vec::with_capacity(a.num_blocks());
    for (key, shape, x) in a.blocks() {
        let c = key.charge(p);
        let Some(&diag) = sectors.get(c) else {
            continue;
        };
        if diag.len() != shape[p] {
            return Err(TensorError::BondDimensionMismatch {
                charge: c.to_vec(),
                dim_a: shape[p],
                dim_b: diag.len(),
            });
        }
        let data = if a.is_diag() {
            x.iter().zip(diag).map(|(&v, &w)| v * w).collect()
        } else {
            scale_axis(x, shape, p, diag)
        };
        blocks.push((key.clone(), shape.to_vec(), data));
    }
    SymTensor::assemble(
        a.config(),
        a.s().to_vec(),
        a.n(),
        a.is_diag(),
        a.meta_fusion().to_vec(),
        a.hard_fusion().to_vec(),
        blocks,
    )
}

/// Keep only the positions of logical `axis` of `a` where the diagonal `d`
/// is nonzero, shrinking the bond dimensions.
///
/// Blocks whose sector is absent from `d`, or whose mask is empty, are
/// dropped. A diagonal `a` is masked on both axes and stays diagonal.
pub fn apply_mask<T: Scalar>(
    a: &SymTensor<T>,
    d: &SymTensor<T>,
    axis: usize,
) -> Result<SymTensor<T>, TensorError> {
    a.config().check_compatible(d.config())?;
    let p = plain_axis(a, axis)?;
    let sectors = diagonal_sectors(d)?;
    let mut positions: HashMap<Charge, Vec<usize>> = HashMap::new();
    for (key, shape, _) in a.blocks() {
        let c = key.charge(p);
        if positions.contains_key(c) {
            continue;
        }
        let Some(&diag) = sectors.get(c) else {
            continue;
        };
        if diag.len() != shape[p] {
            return Err(TensorError::BondDimensionMismatch {
                charge: c.to_vec(),
                dim_a: shape[p],
                dim_b: diag.len(),
            });
        }
        let idx: Vec<usize> = (0..diag.len()).filter(|&i| diag[i] != T::zero()).collect();
        positions.insert(Charge::from_slice(c), idx);
    }

    if !a.is_diag() {
        return restrict_axis(a, p, a.hard_fusion()[p].clone(), &positions);
    }
    let blocks: Vec<OwnedBlock<T>> = a
        .blocks()
        .filter_map(|(key, _, x)| {
            let idx = positions.get(key.charge(0))?;
            let data: Vec<T> = idx.iter().map(|&i| x[i]).collect();
            Some((BlockKey::clone(key), vec![idx.len(), idx.len()], data))
        })
        .collect();
    SymTensor::assemble(
        a.config(),
        a.s().to_vec(),
        a.n(),
        true,
        a.meta_fusion().to_vec(),
        a.hard_fusion().to_vec(),
        blocks,
    )
}

/// Multiply slice `i` along `axis` of a column-major block by `w[i]`.
fn scale_axis<T: Scalar>(x: &[T], shape: &[usize], axis: usize, w: &[T]) -> Vec<T> {
    let inner: usize = shape[..axis].iter().product();
    let dim = shape[axis];
    let mut out = x.to_vec();
    for (chunk_idx, chunk) in out.chunks_mut(inner.max(1)).enumerate() {
        let f = w[chunk_idx % dim];
        for v in chunk.iter_mut() {
            *v = *v * f;
        }
    }
    out
}
