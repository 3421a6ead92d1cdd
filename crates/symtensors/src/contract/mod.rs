//! Contractions: tensordot, broadcast by a diagonal, trace, vdot, swap gate
//! and multi-tensor `ncon`.
//!
//! Every binary operation first checks axis counts, signatures and fusion
//! trees, then aligns hard-fused legs whose sector tables differ, and only
//! then touches block data.

mod broadcast;
mod ncon;
mod swap_gate;
mod trace;

pub use broadcast::{apply_mask, broadcast};
pub use ncon::ncon;
pub use swap_gate::{CHARGE_AXIS, swap_gate};
pub use trace::{trace, vdot};

use std::collections::BTreeMap;

use log::debug;

use crate::backend;
use crate::config::TensordotPolicy;
use crate::error::TensorError;
use crate::fusion::mask::align_axes;
use crate::fusion::merge::{Grouping, MergedIndex, build_matrices, collect_indices, extract_part, tuple_of};
use crate::fusion::{FusionTree, native_axes};
use crate::scalar::Scalar;
use crate::structure::BlockKey;
use crate::symmetry::Charge;
use crate::tensor::{OwnedBlock, SymTensor};

/// Contract logical axes `axes_a` of `a` with `axes_b` of `b`.
///
/// `conj` selects which operands are complex-conjugated first. Paired axes
/// must have opposite signatures after conjugation and identical fusion
/// trees. The result carries the free axes of `a` followed by those of `b`,
/// and total charge `n_a + n_b` (after conjugation).
///
/// # Example
///
/// ```
/// use symtensors::{Config, Leg, SymTensor, Symmetry, tensordot};
///
/// let config = Config::new(Symmetry::u1());
/// let sym = config.sym().clone();
/// let leg = Leg::new(&sym, 1, &[0, 1], &[2, 3]).unwrap();
/// let a: SymTensor<f64> = SymTensor::ones(&config, &[leg.clone(), leg.conj()], &[0]).unwrap();
/// let c = tensordot(&a, &a, &[1], &[0], (false, false)).unwrap();
/// // block (1, 1) of a * a is 3 * ones(3, 3)
/// assert_eq!(c.block(&[1, 1]).unwrap()[0], 3.0);
/// ```
pub fn tensordot<T: Scalar>(
    a: &SymTensor<T>,
    b: &SymTensor<T>,
    axes_a: &[usize],
    axes_b: &[usize],
    conj: (bool, bool),
) -> Result<SymTensor<T>, TensorError> {
    a.config().check_compatible(b.config())?;
    if axes_a.len() != axes_b.len() {
        return Err(TensorError::WrongNumberOfIndices {
            expected: axes_a.len(),
            actual: axes_b.len(),
        });
    }
    check_axes(axes_a, a.ndim())?;
    check_axes(axes_b, b.ndim())?;
    let a = if conj.0 { a.conj() } else { a.clone() };
    let b = if conj.1 { b.conj() } else { b.clone() };

    for (&ia, &ib) in axes_a.iter().zip(axes_b) {
        if a.meta_fusion()[ia] != b.meta_fusion()[ib] {
            return Err(TensorError::fusion_mismatch(format!(
                "axis {} is meta-fused as {} but axis {} as {}",
                ia,
                a.meta_fusion()[ia],
                ib,
                b.meta_fusion()[ib]
            )));
        }
    }
    let na = native_axes(a.meta_fusion(), axes_a);
    let nb = native_axes(b.meta_fusion(), axes_b);
    for (&p, &q) in na.iter().zip(&nb) {
        if a.s()[p] != -b.s()[q] {
            return Err(TensorError::SignatureMismatch {
                axis_a: p,
                axis_b: q,
                s_a: a.s()[p],
                s_b: b.s()[q],
            });
        }
    }

    if a.is_diag() || b.is_diag() {
        return tensordot_diag(a, b, axes_a, axes_b);
    }

    let (mut a, mut b) = (a, b);
    for (&p, &q) in na.iter().zip(&nb) {
        (a, b) = align_axes(a, p, b, q, -1)?;
    }

    let out_a: Vec<usize> = (0..a.ndim_native()).filter(|x| !na.contains(x)).collect();
    let out_b: Vec<usize> = (0..b.ndim_native()).filter(|x| !nb.contains(x)).collect();
    let sym = a.sym().clone();
    let n = sym.fuse_pair(a.n(), 1, b.n(), 1);
    let s: Vec<i32> = out_a
        .iter()
        .map(|&x| a.s()[x])
        .chain(out_b.iter().map(|&x| b.s()[x]))
        .collect();
    let hfs = out_a
        .iter()
        .map(|&x| a.hard_fusion()[x].clone())
        .chain(out_b.iter().map(|&x| b.hard_fusion()[x].clone()))
        .collect();
    let mfs: Vec<FusionTree> = (0..a.ndim())
        .filter(|x| !axes_a.contains(x))
        .map(|x| a.meta_fusion()[x].clone())
        .chain(
            (0..b.ndim())
                .filter(|x| !axes_b.contains(x))
                .map(|x| b.meta_fusion()[x].clone()),
        )
        .collect();

    let use_merge = match a.config().policy() {
        TensordotPolicy::Merge => true,
        TensordotPolicy::Direct => false,
        TensordotPolicy::Hybrid => na.len() != 1 || sym.nsym() == 0,
    };
    debug!(
        "tensordot: {} x {} blocks over {} native axes, {} policy",
        a.num_blocks(),
        b.num_blocks(),
        na.len(),
        if use_merge { "merge" } else { "direct" }
    );
    let pair = Contraction {
        a: &a,
        b: &b,
        na: &na,
        nb: &nb,
        out_a: &out_a,
        out_b: &out_b,
    };
    let blocks = if use_merge {
        pair.merge()?
    } else {
        pair.direct()?
    };
    SymTensor::assemble(a.config(), s, &n, false, mfs, hfs, blocks)
}

/// Outer product: tensordot over no axes.
pub fn outer<T: Scalar>(a: &SymTensor<T>, b: &SymTensor<T>) -> Result<SymTensor<T>, TensorError> {
    let a = a.to_nondiag()?;
    let b = b.to_nondiag()?;
    tensordot(&a, &b, &[], &[], (false, false))
}

pub(crate) fn check_axes(axes: &[usize], ndim: usize) -> Result<(), TensorError> {
    let mut seen = vec![false; ndim];
    for &a in axes {
        if a >= ndim || seen[a] {
            return Err(TensorError::InvalidPermutation {
                perm: axes.to_vec(),
                ndim,
            });
        }
        seen[a] = true;
    }
    Ok(())
}

/// Contraction where at least one operand is diagonal: a broadcast for one
/// paired axis, a broadcast followed by a trace for two.
fn tensordot_diag<T: Scalar>(
    a: SymTensor<T>,
    b: SymTensor<T>,
    axes_a: &[usize],
    axes_b: &[usize],
) -> Result<SymTensor<T>, TensorError> {
    if a.is_diag() && b.is_diag() {
        if let ([ia], [ib]) = (axes_a, axes_b) {
            return diag_product(&a, &b, *ia, *ib);
        }
        let b = b.to_nondiag()?;
        return tensordot_diag(a, b, axes_a, axes_b);
    }
    let b_is_diag = b.is_diag();
    let (t, d, t_axes) = if b_is_diag {
        (a, b, axes_a)
    } else {
        (b, a, axes_b)
    };
    match t_axes.len() {
        1 => {
            let x = broadcast(&t, &d, t_axes[0], (false, false))?;
            if b_is_diag {
                x.move_leg(t_axes[0], x.ndim() - 1)
            } else {
                x.move_leg(t_axes[0], 0)
            }
        }
        2 => {
            let x = broadcast(&t, &d, t_axes[0], (false, false))?;
            trace(&x, &t_axes[..1], &t_axes[1..])
        }
        _ => Err(TensorError::unsupported(
            "outer product with a diagonal tensor; convert it with to_nondiag first",
        )),
    }
}

/// Product of two diagonal tensors over one axis: a diagonal tensor whose
/// sectors are those present in both operands.
fn diag_product<T: Scalar>(
    a: &SymTensor<T>,
    b: &SymTensor<T>,
    ia: usize,
    ib: usize,
) -> Result<SymTensor<T>, TensorError> {
    let mut blocks: Vec<OwnedBlock<T>> = Vec::new();
    for (key, d, x) in a.blocks() {
        let Some(range) = b.structure().slice_of(key) else {
            continue;
        };
        let y = &b.data()[range];
        if x.len() != y.len() {
            return Err(TensorError::BondDimensionMismatch {
                charge: key.charge(ia).to_vec(),
                dim_a: x.len(),
                dim_b: y.len(),
            });
        }
        let data = x.iter().zip(y).map(|(&u, &v)| u * v).collect();
        blocks.push((key.clone(), d.to_vec(), data));
    }
    let n = a.sym().fuse_pair(a.n(), 1, b.n(), 1);
    SymTensor::assemble(
        a.config(),
        vec![a.s()[1 - ia], b.s()[1 - ib]],
        &n,
        true,
        vec![a.meta_fusion()[1 - ia].clone(), b.meta_fusion()[1 - ib].clone()],
        vec![a.hard_fusion()[1 - ia].clone(), b.hard_fusion()[1 - ib].clone()],
        blocks,
    )
}

/// Operands of a block-sparse contraction over native axes.
struct Contraction<'a, T: Scalar> {
    a: &'a SymTensor<T>,
    b: &'a SymTensor<T>,
    na: &'a [usize],
    nb: &'a [usize],
    out_a: &'a [usize],
    out_b: &'a [usize],
}

impl<T: Scalar> Contraction<'_, T> {
    fn output_key(&self, row: &[i64], col: &[i64]) -> BlockKey {
        let charges: Vec<i64> = row.iter().chain(col).copied().collect();
        BlockKey::new(&charges, self.out_a.len() + self.out_b.len())
    }

    /// One matrix product per effective charge of the contracted legs.
    fn merge(&self) -> Result<Vec<OwnedBlock<T>>, TensorError> {
        let signs: Vec<i32> = self.na.iter().map(|&x| self.a.s()[x]).collect();
        let ga = Grouping {
            row_axes: self.out_a.to_vec(),
            col_axes: self.na.to_vec(),
            group_axes: self.na.to_vec(),
            group_signs: signs.clone(),
        };
        let gb = Grouping {
            row_axes: self.nb.to_vec(),
            col_axes: self.out_b.to_vec(),
            group_axes: self.nb.to_vec(),
            group_signs: signs,
        };
        let idx_a = collect_indices(self.a, &ga)?;
        let idx_b = collect_indices(self.b, &gb)?;

        let mut plan_a: BTreeMap<Charge, (MergedIndex, MergedIndex)> = BTreeMap::new();
        let mut plan_b: BTreeMap<Charge, (MergedIndex, MergedIndex)> = BTreeMap::new();
        for (g, (rows, ka)) in &idx_a {
            let Some((kb, cols)) = idx_b.get(g) else {
                continue;
            };
            let k = ka.intersect(kb)?;
            if k.is_empty() {
                continue;
            }
            plan_a.insert(g.clone(), (rows.clone(), k.clone()));
            plan_b.insert(g.clone(), (k, cols.clone()));
        }
        let mats_a = build_matrices(self.a, &ga, &plan_a);
        let mats_b = build_matrices(self.b, &gb, &plan_b);
        let support_a = support(self.a, &ga, &plan_a, true);
        let support_b = support(self.b, &gb, &plan_b, false);

        let kind = self.a.config().backend();
        let mut blocks = Vec::new();
        for (g, (rows, k)) in &plan_a {
            let cols = &plan_b[g].1;
            let (m, kd, n) = (rows.dim(), k.dim(), cols.dim());
            let mut c = vec![T::zero(); m * n];
            backend::matmul_into(kind, &mut c, &mats_a[g], &mats_b[g], m, kd, n, false);
            let sa = &support_a[g];
            let sb = &support_b[g];
            for (i, r) in rows.parts().iter().enumerate() {
                for (j, col) in cols.parts().iter().enumerate() {
                    if !sa[i].iter().zip(&sb[j]).any(|(x, y)| *x && *y) {
                        continue;
                    }
                    let shape: Vec<usize> = r.shape.iter().chain(&col.shape).copied().collect();
                    blocks.push((
                        self.output_key(&r.charges, &col.charges),
                        shape,
                        extract_part(&c, m, n, r, col),
                    ));
                }
            }
        }
        Ok(blocks)
    }

    /// One matrix product per pair of blocks sharing contracted charges.
    fn direct(&self) -> Result<Vec<OwnedBlock<T>>, TensorError> {
        let kind = self.a.config().backend();
        let mut by_k: BTreeMap<Vec<i64>, (Vec<usize>, Vec<usize>)> = BTreeMap::new();
        let keys_a = self.a.structure().keys();
        let keys_b = self.b.structure().keys();
        for (i, key) in keys_a.iter().enumerate() {
            by_k.entry(tuple_of(key, self.na)).or_default().0.push(i);
        }
        for (j, key) in keys_b.iter().enumerate() {
            by_k.entry(tuple_of(key, self.nb)).or_default().1.push(j);
        }
        let perm_a: Vec<usize> = self.out_a.iter().chain(self.na).copied().collect();
        let perm_b: Vec<usize> = self.nb.iter().chain(self.out_b).copied().collect();
        let shapes_a = self.a.structure().shapes();
        let shapes_b = self.b.structure().shapes();
        let mats_a: Vec<Vec<T>> = self
            .a
            .blocks()
            .map(|(_, d, x)| backend::permute(kind, x, d, &perm_a))
            .collect();
        let mats_b: Vec<Vec<T>> = self
            .b
            .blocks()
            .map(|(_, d, x)| backend::permute(kind, x, d, &perm_b))
            .collect();
        let mut acc: BTreeMap<BlockKey, (Vec<usize>, Vec<T>)> = BTreeMap::new();

        for (ia, ib) in by_k.values() {
            for &i in ia {
                let da = &shapes_a[i];
                let m: usize = self.out_a.iter().map(|&x| da[x]).product();
                let k: usize = self.na.iter().map(|&x| da[x]).product();
                for &j in ib {
                    let db = &shapes_b[j];
                    for (&p, &q) in self.na.iter().zip(self.nb) {
                        if da[p] != db[q] {
                            return Err(TensorError::BondDimensionMismatch {
                                charge: keys_a[i].charge(p).to_vec(),
                                dim_a: da[p],
                                dim_b: db[q],
                            });
                        }
                    }
                    let n: usize = self.out_b.iter().map(|&x| db[x]).product();
                    let key = self.output_key(
                        &tuple_of(&keys_a[i], self.out_a),
                        &tuple_of(&keys_b[j], self.out_b),
                    );
                    let shape: Vec<usize> = self
                        .out_a
                        .iter()
                        .map(|&x| da[x])
                        .chain(self.out_b.iter().map(|&x| db[x]))
                        .collect();
                    let entry = acc
                        .entry(key)
                        .or_insert_with(|| (shape, vec![T::zero(); m * n]));
                    backend::matmul_into(kind, &mut entry.1, &mats_a[i], &mats_b[j], m, k, n, true);
                }
            }
        }
        Ok(acc.into_iter().map(|(k, (d, x))| (k, d, x)).collect())
    }
}

/// For every group, which contracted parts each row (`rows == true`) or
/// column of the matrix is connected to by an actual block.
fn support<T: Scalar>(
    t: &SymTensor<T>,
    grouping: &Grouping,
    plan: &BTreeMap<Charge, (MergedIndex, MergedIndex)>,
    rows: bool,
) -> BTreeMap<Charge, Vec<Vec<bool>>> {
    let sym = t.sym();
    let mut out: BTreeMap<Charge, Vec<Vec<bool>>> = plan
        .iter()
        .map(|(g, (r, c))| {
            let (free, k) = if rows { (r, c) } else { (c, r) };
            (g.clone(), vec![vec![false; k.parts().len()]; free.parts().len()])
        })
        .collect();
    for key in t.structure().keys() {
        let g = sym.fuse(&tuple_of(key, &grouping.group_axes), &grouping.group_signs);
        let Some((r, c)) = plan.get(&g) else {
            continue;
        };
        let rt = tuple_of(key, &grouping.row_axes);
        let ct = tuple_of(key, &grouping.col_axes);
        let (ri, ci) = (
            r.parts().binary_search_by(|p| p.charges.cmp(&rt)),
            c.parts().binary_search_by(|p| p.charges.cmp(&ct)),
        );
        if let (Ok(ri), Ok(ci), Some(flags)) = (ri, ci, out.get_mut(&g)) {
            if rows {
                flags[ri][ci] = true;
            } else {
                flags[ci][ri] = true;
            }
        }
    }
    out
}
