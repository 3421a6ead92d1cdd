//! Fusion and unfusion of legs.

use std::collections::HashMap;
use std::ops::Range;

use crate::error::TensorError;
use crate::fusion::{FusionTree, HardFusion, native_ranges};
use crate::scalar::Scalar;
use crate::strides::{copy_subblock, extract_subblock};
use crate::structure::BlockKey;
use crate::symmetry::Charge;
use crate::tensor::{OwnedBlock, SymTensor};

/// How [`SymTensor::fuse_legs`] groups legs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FusionMode {
    /// Record the grouping only; the native axes and blocks are unchanged.
    Meta,
    /// Merge each group into one native axis.
    #[default]
    Hard,
}

/// One group of native axes of the transposed tensor.
struct GroupPlan {
    native: Range<usize>,
    fused: Option<HardFusion>,
}

impl<T: Scalar> SymTensor<T> {
    /// Fuse groups of logical axes.
    ///
    /// `groups` lists every logical axis exactly once; the result has one
    /// logical axis per group, in order. A group of one axis keeps that axis
    /// unchanged.
    ///
    /// # Example
    ///
    /// ```
    /// use symtensors::{Config, FusionMode, Leg, SymTensor, Symmetry};
    ///
    /// let config = Config::new(Symmetry::u1());
    /// let sym = config.sym().clone();
    /// let leg = Leg::new(&sym, 1, &[0, 1], &[1, 2]).unwrap();
    /// let t: SymTensor<f64> =
    ///     SymTensor::ones(&config, &[leg.clone(), leg.clone(), leg.conj()], &[0]).unwrap();
    /// let f = t.fuse_legs(&[&[0, 1], &[2]], FusionMode::Hard).unwrap();
    /// assert_eq!(f.ndim(), 2);
    /// assert_eq!(f.ndim_native(), 2);
    /// let back = f.unfuse_legs(&[0]).unwrap();
    /// assert_eq!(back.data(), t.data());
    /// ```
    pub fn fuse_legs(&self, groups: &[&[usize]], mode: FusionMode) -> Result<Self, TensorError> {
        let order: Vec<usize> = groups.iter().flat_map(|g| g.iter().copied()).collect();
        super::ops::check_permutation(&order, self.ndim())?;
        match mode {
            FusionMode::Meta => self.fuse_meta(groups, &order),
            FusionMode::Hard => self.fuse_hard(groups, &order),
        }
    }

    fn fuse_meta(&self, groups: &[&[usize]], order: &[usize]) -> Result<Self, TensorError> {
        if self.is_diag() && groups.iter().any(|g| g.len() > 1) {
            return Err(TensorError::unsupported("meta fusion of a diagonal tensor"));
        }
        let u = self.transpose(order)?;
        let mut mfs = Vec::with_capacity(groups.len());
        let mut pos = 0;
        for g in groups {
            let trees = &u.meta_fusion()[pos..pos + g.len()];
            mfs.push(if g.len() == 1 {
                trees[0].clone()
            } else {
                FusionTree::Node(trees.to_vec())
            });
            pos += g.len();
        }
        Ok(u.with_meta_fusion(mfs))
    }

    fn fuse_hard(&self, groups: &[&[usize]], order: &[usize]) -> Result<Self, TensorError> {
        for g in groups.iter().filter(|g| g.len() > 1) {
            if let Some(&a) = g.iter().find(|&&a| !self.mfs[a].is_leaf()) {
                return Err(TensorError::unsupported(format!(
                    "logical axis {} is meta-fused and cannot be hard-fused; unfuse it first",
                    a
                )));
            }
        }
        let full = if self.is_diag() {
            self.to_nondiag()?
        } else {
            self.clone()
        };
        let u = full.transpose(order)?;
        let config = u.config().clone();
        let sym = config.sym();
        let ranges = native_ranges(u.meta_fusion());

        let mut plans = Vec::with_capacity(groups.len());
        let mut s = Vec::new();
        let mut hfs = Vec::new();
        let mut mfs = Vec::with_capacity(groups.len());
        let mut pos = 0;
        for g in groups {
            let native = ranges[pos].start..ranges[pos + g.len() - 1].end;
            if g.len() == 1 {
                s.extend_from_slice(&u.s()[native.clone()]);
                hfs.extend_from_slice(&u.hfs[native.clone()]);
                mfs.push(u.mfs[pos].clone());
                plans.push(GroupPlan {
                    native,
                    fused: None,
                });
            } else {
                let hf = HardFusion::new(
                    u.s()[native.clone()].to_vec(),
                    native.clone().map(|a| u.structure.axis_sectors(a)).collect(),
                    u.hfs[native.clone()].to_vec(),
                );
                s.push(hf.s()[0]);
                hfs.push(hf.clone());
                mfs.push(FusionTree::Leaf);
                plans.push(GroupPlan {
                    native,
                    fused: Some(hf),
                });
            }
            pos += g.len();
        }
        let layouts: Vec<_> = plans
            .iter()
            .map(|p| p.fused.as_ref().map(|hf| config.fused_leg(hf)))
            .collect();

        let ndim = s.len();
        let mut acc: HashMap<BlockKey, (Vec<usize>, Vec<T>)> = HashMap::new();
        for (key, d, x) in u.blocks() {
            let mut charges: Vec<i64> = Vec::with_capacity(key.charges().len());
            let mut shape = Vec::with_capacity(ndim);
            let mut offsets = Vec::with_capacity(ndim);
            let mut src_shape = Vec::with_capacity(ndim);
            for (plan, layout) in plans.iter().zip(&layouts) {
                match (&plan.fused, layout) {
                    (Some(hf), Some(layout)) => {
                        let sf = hf.s()[0];
                        let signs: Vec<i32> = hf.s().iter().map(|&x| x * sf).collect();
                        let flat: Vec<i64> = plan
                            .native
                            .clone()
                            .flat_map(|a| key.charge(a).iter().copied())
                            .collect();
                        let tf = sym.fuse(&flat, &signs);
                        let children: Vec<Charge> = plan
                            .native
                            .clone()
                            .map(|a| Charge::from_slice(key.charge(a)))
                            .collect();
                        let combo = layout
                            .sector(&tf)
                            .and_then(|sector| sector.combo(&children).map(|c| (sector.dim, c)));
                        let Some((dim, combo)) = combo else {
                            return Err(TensorError::inconsistent(format!(
                                "block {} is not covered by the fused layout",
                                key
                            )));
                        };
                        charges.extend_from_slice(&tf);
                        shape.push(dim);
                        offsets.push(combo.start);
                        src_shape.push(combo.size);
                    }
                    _ => {
                        for a in plan.native.clone() {
                            charges.extend_from_slice(key.charge(a));
                            shape.push(d[a]);
                            offsets.push(0);
                            src_shape.push(d[a]);
                        }
                    }
                }
            }
            let entry = acc
                .entry(BlockKey::new(&charges, ndim))
                .or_insert_with(|| (shape.clone(), vec![T::zero(); shape.iter().product()]));
            copy_subblock(&mut entry.1, &shape, &offsets, x, &src_shape);
        }
        let blocks: Vec<OwnedBlock<T>> = acc.into_iter().map(|(k, (d, x))| (k, d, x)).collect();
        Self::assemble(&config, s, u.n(), false, mfs, hfs, blocks)
    }

    /// Undo one level of fusion on each of the given logical axes.
    ///
    /// A meta-fused axis is replaced by its subtrees. A hard-fused axis is
    /// split back into the legs it was fused from. Every combination of a
    /// present fused block is materialized, zero-valued or not; use
    /// [`remove_zero_blocks`](Self::remove_zero_blocks) to prune. Unfused
    /// axes are left unchanged.
    pub fn unfuse_legs(&self, axes: &[usize]) -> Result<Self, TensorError> {
        let mut axes = axes.to_vec();
        axes.sort_unstable();
        axes.dedup();
        if let Some(&a) = axes.iter().find(|&&a| a >= self.ndim()) {
            return Err(TensorError::InvalidPermutation {
                perm: vec![a],
                ndim: self.ndim(),
            });
        }
        let mut t = self.clone();
        for &a in axes.iter().rev() {
            match t.mfs[a].clone() {
                FusionTree::Node(children) => {
                    let mut mfs = t.mfs.clone();
                    mfs.splice(a..a + 1, children);
                    t = t.with_meta_fusion(mfs);
                }
                FusionTree::Leaf => {
                    let native = native_ranges(&t.mfs)[a].start;
                    if !t.hfs[native].is_leaf() {
                        t = t.unfuse_native(native, a)?;
                    }
                }
            }
        }
        Ok(t)
    }

    fn unfuse_native(&self, axis: usize, logical: usize) -> Result<Self, TensorError> {
        let hf = self.hfs[axis].clone();
        let layout = self.config().fused_leg(&hf);
        let k = hf.s().len();

        let mut s = self.s()[..axis].to_vec();
        s.extend_from_slice(hf.s());
        s.extend_from_slice(&self.s()[axis + 1..]);
        let mut hfs = self.hfs[..axis].to_vec();
        hfs.extend_from_slice(hf.children());
        hfs.extend_from_slice(&self.hfs[axis + 1..]);
        let mut mfs = self.mfs.clone();
        mfs.splice(logical..logical + 1, vec![FusionTree::Leaf; k]);
        let ndim = s.len();

        let mut blocks: Vec<OwnedBlock<T>> = Vec::new();
        for (key, d, x) in self.blocks() {
            let c = key.charge(axis);
            let sector = layout.sector(c).ok_or_else(|| {
                TensorError::inconsistent(format!(
                    "charge {:?} on axis {} is not produced by its fusion",
                    c, axis
                ))
            })?;
            if sector.dim != d[axis] {
                return Err(TensorError::BondDimensionMismatch {
                    charge: c.to_vec(),
                    dim_a: d[axis],
                    dim_b: sector.dim,
                });
            }
            for combo in &sector.combos {
                let mut sub_shape = d.to_vec();
                sub_shape[axis] = combo.size;
                let mut offsets = vec![0; d.len()];
                offsets[axis] = combo.start;
                let data = extract_subblock(x, d, &offsets, &sub_shape);
                let mut charges: Vec<i64> = Vec::with_capacity(ndim * c.len());
                for a in 0..axis {
                    charges.extend_from_slice(key.charge(a));
                }
                for cc in &combo.charges {
                    charges.extend_from_slice(cc);
                }
                for a in axis + 1..d.len() {
                    charges.extend_from_slice(key.charge(a));
                }
                let mut shape = d[..axis].to_vec();
                shape.extend_from_slice(&combo.dims);
                shape.extend_from_slice(&d[axis + 1..]);
                blocks.push((BlockKey::new(&charges, ndim), shape, data));
            }
        }
        Self::assemble(self.config(), s, self.n(), false, mfs, hfs, blocks)
    }
}
