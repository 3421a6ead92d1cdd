//! Linear algebra on whole tensors: linear combinations, norms and
//! elementwise maps.
//!
//! Operands of a linear combination must agree on everything but their
//! block sets: symmetry, signature, total charge, diagonal flag and
//! meta fusion. Hard-fused legs built from different sector tables are
//! first embedded into the union of their tables.

mod elementwise;
mod norm;

pub use norm::{Entropy, Norm, allclose, entropy, norm};

use std::collections::BTreeMap;

use crate::error::TensorError;
use crate::fusion::HardFusion;
use crate::fusion::mask::{embed_axis, union_hard_fusion};
use crate::scalar::Scalar;
use crate::structure::BlockKey;
use crate::tensor::SymTensor;

/// `Σ_i coefs[i] * tensors[i]`.
///
/// Blocks present in only some operands are copied with their coefficient;
/// blocks absent from every operand stay absent.
///
/// # Example
///
/// ```
/// use symtensors::{Config, Leg, SymTensor, Symmetry, linear_combine};
///
/// let config = Config::new(Symmetry::u1());
/// let sym = config.sym().clone();
/// let leg = Leg::new(&sym, 1, &[0, 1], &[1, 1]).unwrap();
/// let a: SymTensor<f64> = SymTensor::ones(&config, &[leg.clone(), leg.conj()], &[0]).unwrap();
/// let c = linear_combine(&[&a, &a], &[2.0, -0.5]).unwrap();
/// assert_eq!(c.data(), &[1.5, 1.5]);
/// ```
pub fn linear_combine<T: Scalar>(tensors: &[&SymTensor<T>], coefs: &[T]) -> Result<SymTensor<T>, TensorError> {
    if tensors.is_empty() || tensors.len() != coefs.len() {
        return Err(TensorError::WrongNumberOfIndices {
            expected: tensors.len(),
            actual: coefs.len(),
        });
    }
    let first = tensors[0];
    for t in &tensors[1..] {
        check_same_layout(first, t)?;
    }
    let aligned = align_hard_fusions(tensors)?;

    let mut acc: BTreeMap<BlockKey, (Vec<usize>, Vec<T>)> = BTreeMap::new();
    for (t, &coef) in aligned.iter().zip(coefs) {
        for (key, d, x) in t.blocks() {
            match acc.get_mut(key) {
                Some((shape, buf)) => {
                    if shape.as_slice() != d {
                        let p = (0..d.len()).find(|&p| shape[p] != d[p]).unwrap_or(0);
                        return Err(TensorError::BondDimensionMismatch {
                            charge: key.charge(p).to_vec(),
                            dim_a: shape[p],
                            dim_b: d[p],
                        });
                    }
                    for (o, &v) in buf.iter_mut().zip(x) {
                        *o += coef * v;
                    }
                }
                None => {
                    acc.insert(key.clone(), (d.to_vec(), x.iter().map(|&v| coef * v).collect()));
                }
            }
        }
    }
    let base = &aligned[0];
    let blocks = acc.into_iter().map(|(k, (d, x))| (k, d, x)).collect();
    SymTensor::assemble(
        base.config(),
        base.s().to_vec(),
        base.n(),
        base.is_diag(),
        base.meta_fusion().to_vec(),
        base.hard_fusion().to_vec(),
        blocks,
    )
}

/// `a + b`.
pub fn add<T: Scalar>(a: &SymTensor<T>, b: &SymTensor<T>) -> Result<SymTensor<T>, TensorError> {
    linear_combine(&[a, b], &[T::one(), T::one()])
}

/// `a - b`.
pub fn sub<T: Scalar>(a: &SymTensor<T>, b: &SymTensor<T>) -> Result<SymTensor<T>, TensorError> {
    linear_combine(&[a, b], &[T::one(), -T::one()])
}

/// `a + x * b`.
pub fn apxb<T: Scalar>(a: &SymTensor<T>, b: &SymTensor<T>, x: T) -> Result<SymTensor<T>, TensorError> {
    linear_combine(&[a, b], &[T::one(), x])
}

/// `x * a`.
pub fn scale<T: Scalar>(a: &SymTensor<T>, x: T) -> SymTensor<T> {
    a.map_elements(|v| x * v)
}

/// `-a`.
pub fn neg<T: Scalar>(a: &SymTensor<T>) -> SymTensor<T> {
    a.map_elements(|v| -v)
}

fn check_same_layout<T: Scalar>(a: &SymTensor<T>, b: &SymTensor<T>) -> Result<(), TensorError> {
    a.config().check_compatible(b.config())?;
    if a.ndim_native() != b.ndim_native() {
        return Err(TensorError::WrongNumberOfIndices {
            expected: a.ndim_native(),
            actual: b.ndim_native(),
        });
    }
    if let Some(p) = (0..a.ndim_native()).find(|&p| a.s()[p] != b.s()[p]) {
        return Err(TensorError::SignatureMismatch {
            axis_a: p,
            axis_b: p,
            s_a: a.s()[p],
            s_b: b.s()[p],
        });
    }
    if a.n() != b.n() {
        return Err(TensorError::TotalChargeMismatch {
            a: a.n().to_vec(),
            b: b.n().to_vec(),
        });
    }
    if a.is_diag() != b.is_diag() {
        return Err(TensorError::unsupported(
            "cannot combine a diagonal and a non-diagonal tensor",
        ));
    }
    if a.meta_fusion() != b.meta_fusion() {
        return Err(TensorError::fusion_mismatch(
            "operands have different meta fusions",
        ));
    }
    Ok(())
}

/// Copies of `tensors` whose hard-fused axes all carry the union descriptor.
fn align_hard_fusions<T: Scalar>(tensors: &[&SymTensor<T>]) -> Result<Vec<SymTensor<T>>, TensorError> {
    let config = tensors[0].config();
    let mut out: Vec<SymTensor<T>> = tensors.iter().map(|&t| t.clone()).collect();
    for p in 0..tensors[0].ndim_native() {
        let first = &tensors[0].hard_fusion()[p];
        if tensors.iter().all(|t| &t.hard_fusion()[p] == first) {
            continue;
        }
        let mut union: HardFusion = first.clone();
        for t in &tensors[1..] {
            union = union_hard_fusion(config, &union, &t.hard_fusion()[p])?;
        }
        for t in out.iter_mut() {
            if t.hard_fusion()[p] != union {
                *t = embed_axis(t, p, union.clone())?;
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::structure::Leg;
    use crate::symmetry::Symmetry;
    use crate::tensor::FusionMode;

    fn u1() -> Config {
        Config::new(Symmetry::u1())
    }

    #[test]
    fn test_add_merges_block_sets() {
        let config = u1();
        let mut a: SymTensor<f64> = SymTensor::new(&config, &[1, -1], &[0]).unwrap();
        a.set_block(&[0, 0], &[1, 1], vec![1.0]).unwrap();
        a.set_block(&[1, 1], &[1, 1], vec![2.0]).unwrap();
        let mut b: SymTensor<f64> = SymTensor::new(&config, &[1, -1], &[0]).unwrap();
        b.set_block(&[1, 1], &[1, 1], vec![3.0]).unwrap();
        b.set_block(&[2, 2], &[1, 1], vec![4.0]).unwrap();

        let c = add(&a, &b).unwrap();
        assert_eq!(c.num_blocks(), 3);
        assert_eq!(c.data(), &[1.0, 5.0, 4.0]);
        let d = sub(&a, &b).unwrap();
        assert_eq!(d.data(), &[1.0, -1.0, -4.0]);
        let e = apxb(&a, &b, 2.0).unwrap();
        assert_eq!(e.data(), &[1.0, 8.0, 8.0]);
        assert_eq!(scale(&a, 3.0).data(), &[3.0, 6.0]);
        assert_eq!(neg(&a).data(), &[-1.0, -2.0]);
    }

    #[test]
    fn test_add_rejects_mismatches() {
        let config = u1();
        let a: SymTensor<f64> = SymTensor::new(&config, &[1, -1], &[0]).unwrap();
        let b: SymTensor<f64> = SymTensor::new(&config, &[1, 1], &[0]).unwrap();
        assert!(matches!(add(&a, &b), Err(TensorError::SignatureMismatch { .. })));
        let c: SymTensor<f64> = SymTensor::new(&config, &[1, -1], &[1]).unwrap();
        assert!(matches!(add(&a, &c), Err(TensorError::TotalChargeMismatch { .. })));
        let d: SymTensor<f64> = SymTensor::new_diag(&config, 1).unwrap();
        assert!(matches!(add(&a, &d), Err(TensorError::UnsupportedOperation { .. })));

        let mut e: SymTensor<f64> = SymTensor::new(&config, &[1, -1], &[0]).unwrap();
        e.set_block(&[0, 0], &[1, 1], vec![1.0]).unwrap();
        let mut f: SymTensor<f64> = SymTensor::new(&config, &[1, -1], &[0]).unwrap();
        f.set_block(&[0, 0], &[2, 2], vec![1.0; 4]).unwrap();
        assert!(matches!(
            add(&e, &f),
            Err(TensorError::BondDimensionMismatch { .. })
        ));
        let other = Config::new(Symmetry::z2());
        let g: SymTensor<f64> = SymTensor::new(&other, &[1, -1], &[0]).unwrap();
        assert!(matches!(add(&a, &g), Err(TensorError::SymmetryMismatch { .. })));
    }

    #[test]
    fn test_add_embeds_hard_fused_legs() {
        let config = u1();
        let sym = config.sym().clone();
        let small = Leg::new(&sym, 1, &[0], &[1]).unwrap();
        let big = Leg::new(&sym, 1, &[0, 1], &[1, 1]).unwrap();
        let out = Leg::new(&sym, -1, &[0, 1], &[1, 1]).unwrap();
        let a: SymTensor<f64> = SymTensor::ones(&config, &[small.clone(), small, out.clone()], &[0])
            .unwrap()
            .fuse_legs(&[&[0, 1], &[2]], FusionMode::Hard)
            .unwrap();
        let b: SymTensor<f64> = SymTensor::ones(&config, &[big.clone(), big, out], &[0])
            .unwrap()
            .fuse_legs(&[&[0, 1], &[2]], FusionMode::Hard)
            .unwrap();
        let c = add(&a, &b).unwrap();
        c.is_consistent().unwrap();
        assert_eq!(c.hard_fusion()[0], b.hard_fusion()[0]);
        // (0,0) appears in both operands, (0,1) and (1,0) only in b
        assert_eq!(c.block(&[0, 0]).unwrap(), &[2.0]);
        assert_eq!(c.block(&[1, 1]).unwrap(), &[1.0, 1.0]);
    }
}
