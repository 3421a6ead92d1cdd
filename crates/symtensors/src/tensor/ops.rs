//! Structural single-tensor operations: conjugation, transposition,
//! diagonal conversions and dense export.

use std::collections::HashMap;

use crate::backend;
use crate::error::TensorError;
use crate::fusion::{FusionTree, HardFusion, native_ranges};
use crate::scalar::Scalar;
use crate::strides::{self, copy_subblock};
use crate::structure::{BlockKey, Leg, Structure};
use crate::symmetry::Charge;
use crate::tensor::{OwnedBlock, SymTensor};

impl<T: Scalar> SymTensor<T> {
    /// Complex conjugate: data conjugated, signatures and total charge
    /// reversed. Block keys are unchanged.
    pub fn conj(&self) -> Self {
        Self {
            config: self.config.clone(),
            structure: self.structure.conj(self.sym()),
            data: self.data.iter().map(|v| v.conjugate()).collect(),
            mfs: self.mfs.clone(),
            hfs: self.hfs.iter().map(HardFusion::conj).collect(),
        }
    }

    /// Reverse all signatures and negate all charges. The total charge is
    /// unchanged. Entries of unfused axes keep their positions; within a
    /// hard-fused axis the combination slabs follow the flipped layout.
    pub fn flip_signature(&self) -> Result<Self, TensorError> {
        let sym = self.sym().clone();
        let nsym = sym.nsym();
        let ndim = self.ndim_native();
        let s: Vec<i32> = self.s().iter().map(|x| -x).collect();
        let mut perms: HashMap<(usize, Charge), Vec<usize>> = HashMap::new();
        let mut blocks: Vec<OwnedBlock<T>> = Vec::with_capacity(self.num_blocks());
        for (k, d, x) in self.blocks() {
            let key = BlockKey::collect_from(
                (0..ndim).flat_map(|a| sym.negate(&k.charges()[a * nsym..(a + 1) * nsym])),
                ndim,
            );
            let mut data = x.to_vec();
            if !self.is_diag() {
                for (axis, hf) in self.hfs.iter().enumerate().filter(|(_, h)| !h.is_leaf()) {
                    let charge: Charge = k.charge(axis).iter().copied().collect();
                    let perm = perms
                        .entry((axis, charge))
                        .or_insert_with_key(|(_, c)| hf.flip_permutation(&sym, c));
                    if perm.len() == d[axis] {
                        data = strides::gather_axis(&data, d, axis, perm);
                    }
                }
            }
            blocks.push((key, d.to_vec(), data));
        }
        Self::assemble(
            self.config(),
            s,
            self.n(),
            self.is_diag(),
            self.mfs.clone(),
            self.hfs.iter().map(|h| h.flip_charges(&sym)).collect(),
            blocks,
        )
    }

    /// Permute logical axes: axis `i` of the result is axis `axes[i]`.
    pub fn transpose(&self, axes: &[usize]) -> Result<Self, TensorError> {
        check_permutation(axes, self.ndim())?;
        let ranges = native_ranges(&self.mfs);
        let perm: Vec<usize> = axes.iter().flat_map(|&a| ranges[a].clone()).collect();
        let mfs: Vec<FusionTree> = axes.iter().map(|&a| self.mfs[a].clone()).collect();
        Ok(self.permute_native(&perm)?.with_meta_fusion(mfs))
    }

    /// Move logical axis `source` to position `destination`.
    pub fn move_leg(&self, source: usize, destination: usize) -> Result<Self, TensorError> {
        let ndim = self.ndim();
        if source >= ndim || destination >= ndim {
            return Err(TensorError::InvalidPermutation {
                perm: vec![source, destination],
                ndim,
            });
        }
        let mut order: Vec<usize> = (0..ndim).filter(|&a| a != source).collect();
        order.insert(destination, source);
        self.transpose(&order)
    }

    /// Permute native axes. Meta-fusion trees are reset to leaves; callers
    /// that keep them restore them afterwards.
    pub(crate) fn permute_native(&self, perm: &[usize]) -> Result<Self, TensorError> {
        check_permutation(perm, self.ndim_native())?;
        let s: Vec<i32> = perm.iter().map(|&p| self.s()[p]).collect();
        let hfs = perm.iter().map(|&p| self.hfs[p].clone()).collect();
        let mfs = vec![FusionTree::Leaf; perm.len()];
        let identity = perm.iter().enumerate().all(|(i, &p)| i == p);
        let blocks: Vec<OwnedBlock<T>> = if identity || self.is_diag() {
            // a diagonal block (t, t) is its own transpose
            self.to_blocks()
        } else {
            let kind = self.config().backend();
            self.blocks()
                .map(|(k, d, x)| {
                    let shape = perm.iter().map(|&p| d[p]).collect();
                    (k.permute(perm), shape, backend::permute(kind, x, d, perm))
                })
                .collect()
        };
        Self::assemble(
            self.config(),
            s,
            self.n(),
            self.is_diag(),
            mfs,
            hfs,
            blocks,
        )
    }

    /// Dense array over the sectors present on each native axis, sectors
    /// ordered by charge. Returns `(data, shape)`.
    pub fn to_dense(&self) -> Result<(Vec<T>, Vec<usize>), TensorError> {
        let legs = self.legs();
        self.to_dense_with_legs(&legs)
    }

    /// Dense array over the sectors of the given legs (one per native axis).
    ///
    /// Every charge carried by a block must be present in the matching leg
    /// with the same dimension; sectors absent from the tensor are zero.
    pub fn to_dense_with_legs(&self, legs: &[Leg]) -> Result<(Vec<T>, Vec<usize>), TensorError> {
        let ndim = self.ndim_native();
        if legs.len() != ndim {
            return Err(TensorError::WrongNumberOfIndices {
                expected: ndim,
                actual: legs.len(),
            });
        }
        let mut offsets: Vec<HashMap<Charge, (usize, usize)>> = Vec::with_capacity(ndim);
        let mut shape = Vec::with_capacity(ndim);
        for leg in legs {
            let mut map = HashMap::new();
            let mut start = 0;
            for (c, d) in leg.sectors() {
                map.insert(c.clone(), (start, *d));
                start += d;
            }
            offsets.push(map);
            shape.push(start);
        }
        let total: usize = shape.iter().product();
        let mut dense = vec![T::zero(); total];
        let full = if self.is_diag() {
            self.to_nondiag()?
        } else {
            self.clone()
        };
        for (key, d, x) in full.blocks() {
            let mut at = Vec::with_capacity(ndim);
            for axis in 0..ndim {
                let c = key.charge(axis);
                match offsets[axis].get(c) {
                    Some(&(start, dim)) if dim == d[axis] => at.push(start),
                    Some(&(_, dim)) => {
                        return Err(TensorError::BondDimensionMismatch {
                            charge: c.to_vec(),
                            dim_a: d[axis],
                            dim_b: dim,
                        });
                    }
                    None => {
                        return Err(TensorError::MissingBlock {
                            key: key.charges().to_vec(),
                        });
                    }
                }
            }
            copy_subblock(&mut dense, &shape, &at, x, d);
        }
        Ok((dense, shape))
    }

    /// Expand a diagonal tensor into full square blocks.
    pub fn to_nondiag(&self) -> Result<Self, TensorError> {
        if !self.is_diag() {
            return Ok(self.clone());
        }
        let blocks = self
            .blocks()
            .map(|(k, d, x)| {
                let dim = d[0];
                let mut full = vec![T::zero(); dim * dim];
                for (i, &v) in x.iter().enumerate() {
                    full[i * (dim + 1)] = v;
                }
                (k.clone(), d.to_vec(), full)
            })
            .collect();
        Self::assemble(
            self.config(),
            self.s().to_vec(),
            self.n(),
            false,
            self.mfs.clone(),
            self.hfs.clone(),
            blocks,
        )
    }

    /// Keep only the diagonals of a rank-2 tensor with opposite signatures
    /// and zero total charge.
    pub fn to_diag(&self) -> Result<Self, TensorError> {
        if self.is_diag() {
            return Ok(self.clone());
        }
        if self.ndim_native() != 2 || self.s()[0] != -self.s()[1] {
            return Err(TensorError::unsupported(
                "only rank-2 tensors with opposite signatures have a diagonal",
            ));
        }
        if self.hfs.iter().any(|h| !h.is_leaf()) || self.mfs.iter().any(|m| !m.is_leaf()) {
            return Err(TensorError::unsupported("diagonal of a fused tensor"));
        }
        if self.n() != self.sym().zero().as_slice() {
            return Err(TensorError::TotalChargeMismatch {
                a: self.n().to_vec(),
                b: self.sym().zero().to_vec(),
            });
        }
        let blocks = self
            .blocks()
            .map(|(k, d, x)| {
                let dim = d[0].min(d[1]);
                let diag: Vec<T> = (0..dim).map(|i| x[i + d[0] * i]).collect();
                (k.clone(), vec![dim, dim], diag)
            })
            .collect();
        Self::assemble(
            self.config(),
            self.s().to_vec(),
            self.n(),
            true,
            self.mfs.clone(),
            self.hfs.clone(),
            blocks,
        )
    }

    /// Drop blocks whose entries are all at most `tol` in modulus.
    pub fn remove_zero_blocks(&self, tol: f64) -> Result<Self, TensorError> {
        let blocks = self
            .blocks()
            .filter(|(_, _, x)| x.iter().any(|v| v.modulus() > tol))
            .map(|(k, d, x)| (k.clone(), d.to_vec(), x.to_vec()))
            .collect();
        Self::assemble(
            self.config(),
            self.s().to_vec(),
            self.n(),
            self.is_diag(),
            self.mfs.clone(),
            self.hfs.clone(),
            blocks,
        )
    }

    /// Verify internal invariants: structure rebuilt from the blocks is
    /// identical, fusion descriptors cover the native axes, and hard-fused
    /// axes agree with their layouts.
    pub fn is_consistent(&self) -> Result<(), TensorError> {
        let rebuilt = Structure::build(
            self.sym(),
            self.s(),
            self.n(),
            self.structure
                .keys()
                .iter()
                .cloned()
                .zip(self.structure.shapes().iter().cloned())
                .collect(),
            self.is_diag(),
        )?;
        if rebuilt != self.structure {
            return Err(TensorError::inconsistent("structure is not canonical"));
        }
        if self.data.len() != self.structure.size() {
            return Err(TensorError::ShapeMismatch {
                expected: self.structure.size(),
                actual: self.data.len(),
            });
        }
        let native: usize = self.mfs.iter().map(FusionTree::num_native).sum();
        if native != self.ndim_native() || self.hfs.len() != self.ndim_native() {
            return Err(TensorError::inconsistent(
                "fusion descriptors do not cover the native axes",
            ));
        }
        for (axis, hf) in self.hfs.iter().enumerate() {
            if hf.is_leaf() {
                continue;
            }
            if hf.s()[0] != self.s()[axis] {
                return Err(TensorError::inconsistent(format!(
                    "fused axis {} has signature {} but its first leg {}",
                    axis,
                    self.s()[axis],
                    hf.s()[0]
                )));
            }
            let layout = self.config().fused_leg(hf);
            for (c, d) in self.structure.axis_sectors(axis) {
                match layout.dim(&c) {
                    Some(ld) if ld == d => {}
                    Some(ld) => {
                        return Err(TensorError::BondDimensionMismatch {
                            charge: c.to_vec(),
                            dim_a: d,
                            dim_b: ld,
                        });
                    }
                    None => {
                        return Err(TensorError::inconsistent(format!(
                            "charge {:?} on fused axis {} is not produced by its fusion",
                            c.as_slice(),
                            axis
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// The single element of a tensor holding at most one value.
    pub fn item(&self) -> Result<T, TensorError> {
        match self.size() {
            0 => Ok(T::zero()),
            1 => Ok(self.data[0]),
            size => Err(TensorError::ShapeMismatch {
                expected: 1,
                actual: size,
            }),
        }
    }
}

pub(crate) fn check_permutation(perm: &[usize], ndim: usize) -> Result<(), TensorError> {
    let mut seen = vec![false; ndim];
    if perm.len() != ndim {
        return Err(TensorError::InvalidPermutation {
            perm: perm.to_vec(),
            ndim,
        });
    }
    for &p in perm {
        if p >= ndim || seen[p] {
            return Err(TensorError::InvalidPermutation {
                perm: perm.to_vec(),
                ndim,
            });
        }
        seen[p] = true;
    }
    Ok(())
}
