//! Partial traces and scalar products.

use std::collections::BTreeMap;

use log::trace as log_trace;

use crate::backend::trace_block;
use crate::error::TensorError;
use crate::fusion::mask::{align_axes, align_within};
use crate::fusion::{FusionTree, native_axes};
use crate::scalar::Scalar;
use crate::structure::BlockKey;
use crate::tensor::SymTensor;

use super::check_axes;

/// Trace over pairs of logical axes `axes1[i] <-> axes2[i]`.
///
/// Paired axes need opposite signatures and identical fusion trees. Only
/// blocks carrying equal charges on both axes of every pair contribute.
/// The trace over both axes of a diagonal tensor is the sum of its entries.
pub fn trace<T: Scalar>(
    a: &SymTensor<T>,
    axes1: &[usize],
    axes2: &[usize],
) -> Result<SymTensor<T>, TensorError> {
    if axes1.len() != axes2.len() {
        return Err(TensorError::WrongNumberOfIndices {
            expected: axes1.len(),
            actual: axes2.len(),
        });
    }
    let all: Vec<usize> = axes1.iter().chain(axes2).copied().collect();
    check_axes(&all, a.ndim())?;
    if axes1.is_empty() {
        return Ok(a.clone());
    }
    for (&i, &j) in axes1.iter().zip(axes2) {
        if a.meta_fusion()[i] != a.meta_fusion()[j] {
            return Err(TensorError::fusion_mismatch(format!(
                "traced axes {} and {} are meta-fused as {} and {}",
                i,
                j,
                a.meta_fusion()[i],
                a.meta_fusion()[j]
            )));
        }
    }
    let n1 = native_axes(a.meta_fusion(), axes1);
    let n2 = native_axes(a.meta_fusion(), axes2);
    for (&p, &q) in n1.iter().zip(&n2) {
        if a.s()[p] != -a.s()[q] {
            return Err(TensorError::SignatureMismatch {
                axis_a: p,
                axis_b: q,
                s_a: a.s()[p],
                s_b: a.s()[q],
            });
        }
    }

    let keep: Vec<usize> = (0..a.ndim_native())
        .filter(|x| !n1.contains(x) && !n2.contains(x))
        .collect();
    let mfs: Vec<FusionTree> = (0..a.ndim())
        .filter(|x| !all.contains(x))
        .map(|x| a.meta_fusion()[x].clone())
        .collect();

    if a.is_diag() {
        let total = a.data().iter().fold(T::zero(), |acc, &v| acc + v);
        let blocks = if a.num_blocks() > 0 {
            vec![(BlockKey::new(&[], 0), vec![], vec![total])]
        } else {
            vec![]
        };
        return SymTensor::assemble(a.config(), vec![], a.n(), false, mfs, vec![], blocks);
    }

    let mut t = a.clone();
    for (&p, &q) in n1.iter().zip(&n2) {
        t = align_within(t, p, q)?;
    }

    let mut acc: BTreeMap<BlockKey, (Vec<usize>, Vec<T>)> = BTreeMap::new();
    for (key, d, x) in t.blocks() {
        if n1.iter().zip(&n2).any(|(&p, &q)| key.charge(p) != key.charge(q)) {
            continue;
        }
        for (&p, &q) in n1.iter().zip(&n2) {
            if d[p] != d[q] {
                return Err(TensorError::BondDimensionMismatch {
                    charge: key.charge(p).to_vec(),
                    dim_a: d[p],
                    dim_b: d[q],
                });
            }
        }
        let (data, shape) = trace_block(x, d, &n1, &n2);
        let out_key = BlockKey::collect_from(
            keep.iter().flat_map(|&k| key.charge(k).iter().copied()),
            keep.len(),
        );
        match acc.get_mut(&out_key) {
            Some((_, buf)) => {
                for (o, v) in buf.iter_mut().zip(data) {
                    *o += v;
                }
            }
            None => {
                acc.insert(out_key, (shape, data));
            }
        }
    }
    let s = keep.iter().map(|&k| t.s()[k]).collect();
    let hfs = keep.iter().map(|&k| t.hard_fusion()[k].clone()).collect();
    let blocks = acc.into_iter().map(|(k, (d, x))| (k, d, x)).collect();
    SymTensor::assemble(t.config(), s, t.n(), false, mfs, hfs, blocks)
}

/// Scalar product `Σ a_x b_x` over common blocks, with `a` and/or `b`
/// conjugated first according to `conj`.
///
/// With `conj = (true, false)` this is the usual inner product and the
/// operands must carry the same signatures. When the combined total charge
/// is not the identity the result is exactly zero.
pub fn vdot<T: Scalar>(a: &SymTensor<T>, b: &SymTensor<T>, conj: (bool, bool)) -> Result<T, TensorError> {
    a.config().check_compatible(b.config())?;
    let a = if conj.0 { a.conj() } else { a.clone() };
    let b = if conj.1 { b.conj() } else { b.clone() };
    if a.ndim() != b.ndim() || a.ndim_native() != b.ndim_native() {
        return Err(TensorError::WrongNumberOfIndices {
            expected: a.ndim_native(),
            actual: b.ndim_native(),
        });
    }
    if a.meta_fusion() != b.meta_fusion() {
        return Err(TensorError::fusion_mismatch(
            "operands of vdot have different meta fusions",
        ));
    }
    for (p, (&sa, &sb)) in a.s().iter().zip(b.s()).enumerate() {
        if sa != -sb {
            return Err(TensorError::SignatureMismatch {
                axis_a: p,
                axis_b: p,
                s_a: sa,
                s_b: sb,
            });
        }
    }
    let sym = a.sym();
    if sym.fuse_pair(a.n(), 1, b.n(), 1) != sym.zero() {
        log_trace!("vdot: total charges {:?} and {:?} do not cancel", a.n(), b.n());
        return Ok(T::zero());
    }
    let (mut a, mut b) = if a.is_diag() == b.is_diag() {
        (a, b)
    } else {
        (a.to_nondiag()?, b.to_nondiag()?)
    };
    for p in 0..a.ndim_native() {
        (a, b) = align_axes(a, p, b, p, -1)?;
    }

    let mut total = T::zero();
    let mut ib = b.blocks().peekable();
    for (ka, da, xa) in a.blocks() {
        while ib.next_if(|(kb, _, _)| *kb < ka).is_some() {}
        let Some((_, db, xb)) = ib.next_if(|(kb, _, _)| *kb == ka) else {
            continue;
        };
        if da != db {
            let p = (0..da.len()).find(|&p| da[p] != db[p]).unwrap_or(0);
            return Err(TensorError::BondDimensionMismatch {
                charge: ka.charge(p).to_vec(),
                dim_a: da[p],
                dim_b: db[p],
            });
        }
        for (&x, &y) in xa.iter().zip(xb) {
            total += x * y;
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::c64;
    use crate::config::Config;
    use crate::structure::Leg;
    use crate::symmetry::Symmetry;
    use approx::assert_relative_eq;

    #[test]
    fn test_trace_of_matrix() {
        let config = Config::new(Symmetry::u1());
        let mut t: SymTensor<f64> = SymTensor::new(&config, &[1, -1], &[0]).unwrap();
        t.set_block(&[0, 0], &[2, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        t.set_block(&[1, 1], &[1, 1], vec![10.0]).unwrap();
        let tr = trace(&t, &[0], &[1]).unwrap();
        assert_relative_eq!(tr.item().unwrap(), 15.0);

        let d = t.to_diag().unwrap();
        assert_relative_eq!(trace(&d, &[0], &[1]).unwrap().item().unwrap(), 15.0);
    }

    #[test]
    fn test_partial_trace() {
        let config = Config::new(Symmetry::u1());
        let sym = config.sym().clone();
        let l = Leg::new(&sym, 1, &[0, 1], &[1, 2]).unwrap();
        let t: SymTensor<f64> =
            SymTensor::ones(&config, &[l.clone(), l.conj(), l.clone()], &[1]).unwrap();
        let tr = trace(&t, &[0], &[1]).unwrap();
        assert_eq!(tr.s(), &[1]);
        // charge 1 on the last axis: sum over t0 = t1 of dim(t0)
        assert_eq!(tr.block(&[1]).unwrap(), &[3.0, 3.0]);
        assert!(matches!(
            trace(&t, &[0], &[2]),
            Err(TensorError::SignatureMismatch { .. })
        ));
    }

    #[test]
    fn test_vdot_norm_and_zero_charge() {
        let config = Config::new(Symmetry::u1());
        let mut a: SymTensor<c64> = SymTensor::new(&config, &[1, -1], &[1]).unwrap();
        a.set_block(&[1, 0], &[1, 2], vec![c64::new(1.0, 1.0), c64::new(0.0, 2.0)])
            .unwrap();
        let v = vdot(&a, &a, (true, false)).unwrap();
        assert_relative_eq!(v.re, 6.0);
        assert_relative_eq!(v.im, 0.0);

        let mut b: SymTensor<c64> = SymTensor::new(&config, &[1, -1], &[0]).unwrap();
        b.set_block(&[0, 0], &[1, 1], vec![c64::new(1.0, 0.0)]).unwrap();
        assert_eq!(vdot(&a, &b, (true, false)).unwrap(), c64::new(0.0, 0.0));
    }
}
