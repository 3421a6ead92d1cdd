//! The block-sparse symmetric tensor.
//!
//! A [`SymTensor`] owns a [`Structure`], one flat column-major buffer holding
//! all blocks in key order, a meta-fusion tree per logical axis and a
//! hard-fusion descriptor per native axis. Every operation returns a new
//! tensor; buffers are never shared between tensors.

mod fuse;
mod ops;
mod parts;

pub use fuse::FusionMode;
pub use parts::TensorParts;

pub(crate) use ops::check_permutation;

use crate::config::Config;
use crate::error::TensorError;
use crate::fusion::{FusionTree, HardFusion};
use crate::scalar::Scalar;
use crate::structure::{BlockKey, Leg, Structure};
use crate::symmetry::Symmetry;

/// A block together with its key and shape, owned.
pub(crate) type OwnedBlock<T> = (BlockKey, Vec<usize>, Vec<T>);

/// Block-sparse tensor with abelian symmetry.
///
/// # Example
///
/// ```
/// use symtensors::{Config, Leg, SymTensor, Symmetry};
///
/// let config = Config::new(Symmetry::u1());
/// let sym = config.sym().clone();
/// let a = Leg::new(&sym, 1, &[0, 1], &[2, 3]).unwrap();
/// let b = Leg::new(&sym, -1, &[0, 1], &[2, 3]).unwrap();
/// let t: SymTensor<f64> = SymTensor::ones(&config, &[a, b], &[0]).unwrap();
/// assert_eq!(t.num_blocks(), 2);
/// assert_eq!(t.size(), 4 + 9);
/// assert_eq!(t.block(&[1, 1]).unwrap().len(), 9);
/// ```
#[derive(Clone, Debug)]
pub struct SymTensor<T: Scalar> {
    config: Config,
    structure: Structure,
    data: Vec<T>,
    mfs: Vec<FusionTree>,
    hfs: Vec<HardFusion>,
}

impl<T: Scalar> SymTensor<T> {
    /// Create a tensor without blocks.
    pub fn new(config: &Config, s: &[i32], n: &[i64]) -> Result<Self, TensorError> {
        Self::assemble(
            config,
            s.to_vec(),
            n,
            false,
            vec![FusionTree::Leaf; s.len()],
            vec![HardFusion::leaf(); s.len()],
            vec![],
        )
    }

    /// Create a diagonal tensor without blocks, with signature `(s, -s)`.
    pub fn new_diag(config: &Config, s: i32) -> Result<Self, TensorError> {
        let zero = config.sym().zero();
        Self::assemble(
            config,
            vec![s, -s],
            &zero,
            true,
            vec![FusionTree::Leaf; 2],
            vec![HardFusion::leaf(); 2],
            vec![],
        )
    }

    /// Build a tensor from blocks in any order.
    pub(crate) fn assemble(
        config: &Config,
        s: Vec<i32>,
        n: &[i64],
        diag: bool,
        mfs: Vec<FusionTree>,
        hfs: Vec<HardFusion>,
        blocks: Vec<OwnedBlock<T>>,
    ) -> Result<Self, TensorError> {
        let native: usize = mfs.iter().map(FusionTree::num_native).sum();
        if native != s.len() || hfs.len() != s.len() {
            return Err(TensorError::WrongNumberOfIndices {
                expected: s.len(),
                actual: if native != s.len() { native } else { hfs.len() },
            });
        }
        let mut blocks: Vec<OwnedBlock<T>> = blocks
            .into_iter()
            .filter(|(_, shape, _)| shape.iter().all(|&d| d > 0))
            .collect();
        for (_, shape, data) in &blocks {
            let expected = if diag {
                shape.first().copied().unwrap_or(0)
            } else {
                shape.iter().product()
            };
            if data.len() != expected {
                return Err(TensorError::ShapeMismatch {
                    expected,
                    actual: data.len(),
                });
            }
        }
        blocks.sort_by(|a, b| a.0.cmp(&b.0));
        let structure = Structure::build(
            config.sym(),
            &s,
            n,
            blocks
                .iter()
                .map(|(k, d, _)| (k.clone(), d.clone()))
                .collect(),
            diag,
        )?;
        let mut data = Vec::with_capacity(structure.size());
        for (_, _, d) in blocks {
            data.extend(d);
        }
        Ok(Self {
            config: config.clone(),
            structure,
            data,
            mfs,
            hfs,
        })
    }

    /// Tensor with every charge-conserving combination of leg sectors,
    /// filled block by block by `fill(size)`.
    pub(crate) fn from_legs_with<F: FnMut(usize) -> Vec<T>>(
        config: &Config,
        legs: &[Leg],
        n: &[i64],
        mut fill: F,
    ) -> Result<Self, TensorError> {
        let sym = config.sym();
        if n.len() != sym.nsym() {
            return Err(TensorError::WrongNumberOfIndices {
                expected: sym.nsym(),
                actual: n.len(),
            });
        }
        let n = sym.reduce(n);
        let s: Vec<i32> = legs.iter().map(Leg::s).collect();
        let mut blocks = Vec::new();
        if legs.iter().all(|l| !l.sectors().is_empty()) {
            let sizes: Vec<usize> = legs.iter().map(|l| l.sectors().len()).collect();
            let mut idx = vec![0usize; legs.len()];
            let mut flat: Vec<i64> = Vec::with_capacity(legs.len() * sym.nsym());
            loop {
                flat.clear();
                let mut shape = Vec::with_capacity(legs.len());
                for (leg, &i) in legs.iter().zip(&idx) {
                    let (c, d) = &leg.sectors()[i];
                    flat.extend_from_slice(c);
                    shape.push(*d);
                }
                if sym.fuse(&flat, &s) == n {
                    let size = shape.iter().product();
                    blocks.push((BlockKey::new(&flat, legs.len()), shape, fill(size)));
                }
                if !crate::strides::next_index(&mut idx, &sizes) {
                    break;
                }
            }
        }
        Self::assemble(
            config,
            s,
            &n,
            false,
            vec![FusionTree::Leaf; legs.len()],
            legs.iter().map(|l| l.hard_fusion().clone()).collect(),
            blocks,
        )
    }

    /// Zero tensor with all blocks allowed by `legs` and total charge `n`.
    pub fn zeros(config: &Config, legs: &[Leg], n: &[i64]) -> Result<Self, TensorError> {
        Self::from_legs_with(config, legs, n, |size| vec![T::zero(); size])
    }

    /// Tensor of ones with all blocks allowed by `legs` and total charge `n`.
    pub fn ones(config: &Config, legs: &[Leg], n: &[i64]) -> Result<Self, TensorError> {
        Self::from_legs_with(config, legs, n, |size| vec![T::one(); size])
    }

    /// Diagonal identity on `leg`, with signature `(leg.s, -leg.s)`.
    pub fn eye(config: &Config, leg: &Leg) -> Result<Self, TensorError> {
        if leg.is_fused() {
            return Err(TensorError::unsupported(
                "identity on a hard-fused leg; build it before fusing",
            ));
        }
        let blocks = leg
            .sectors()
            .iter()
            .map(|(c, d)| {
                let key = BlockKey::collect_from(c.iter().chain(c.iter()).copied(), 2);
                (key, vec![*d, *d], vec![T::one(); *d])
            })
            .collect();
        let zero = config.sym().zero();
        Self::assemble(
            config,
            vec![leg.s(), -leg.s()],
            &zero,
            true,
            vec![FusionTree::Leaf; 2],
            vec![HardFusion::leaf(); 2],
            blocks,
        )
    }

    /// Insert or replace one block.
    ///
    /// `charges` holds one charge per native axis, concatenated. For a
    /// diagonal tensor `shape` may be `[D]` or `[D, D]` and `data` holds the
    /// `D` diagonal entries.
    pub fn set_block(&mut self, charges: &[i64], shape: &[usize], data: Vec<T>) -> Result<(), TensorError> {
        let key = self.make_key(charges)?;
        let shape = if self.is_diag() && shape.len() == 1 {
            vec![shape[0], shape[0]]
        } else {
            shape.to_vec()
        };
        if shape.len() != self.ndim_native() {
            return Err(TensorError::WrongNumberOfIndices {
                expected: self.ndim_native(),
                actual: shape.len(),
            });
        }
        let mut blocks: Vec<OwnedBlock<T>> = self
            .to_blocks()
            .into_iter()
            .filter(|(k, _, _)| *k != key)
            .collect();
        blocks.push((key, shape, data));
        *self = Self::assemble(
            &self.config,
            self.structure.s().to_vec(),
            self.structure.n(),
            self.is_diag(),
            self.mfs.clone(),
            self.hfs.clone(),
            blocks,
        )?;
        Ok(())
    }

    /// Key from concatenated per-axis charges, reduced to canonical form.
    pub fn make_key(&self, charges: &[i64]) -> Result<BlockKey, TensorError> {
        let nsym = self.sym().nsym();
        let ndim = self.ndim_native();
        if charges.len() != ndim * nsym {
            return Err(TensorError::WrongNumberOfIndices {
                expected: ndim * nsym,
                actual: charges.len(),
            });
        }
        let sym = self.sym();
        Ok(BlockKey::collect_from(
            (0..ndim).flat_map(|a| sym.reduce(&charges[a * nsym..(a + 1) * nsym])),
            ndim,
        ))
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn sym(&self) -> &Symmetry {
        self.config.sym()
    }

    #[inline]
    pub fn structure(&self) -> &Structure {
        &self.structure
    }

    /// Flat buffer with all blocks in key order.
    #[inline]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Signature per native axis.
    #[inline]
    pub fn s(&self) -> &[i32] {
        self.structure.s()
    }

    /// Total charge.
    #[inline]
    pub fn n(&self) -> &[i64] {
        self.structure.n()
    }

    /// Number of logical axes.
    #[inline]
    pub fn ndim(&self) -> usize {
        self.mfs.len()
    }

    /// Number of native axes.
    #[inline]
    pub fn ndim_native(&self) -> usize {
        self.structure.ndim()
    }

    #[inline]
    pub fn is_diag(&self) -> bool {
        self.structure.is_diag()
    }

    #[inline]
    pub fn num_blocks(&self) -> usize {
        self.structure.num_blocks()
    }

    /// Number of stored elements.
    #[inline]
    pub fn size(&self) -> usize {
        self.structure.size()
    }

    /// Meta-fusion tree per logical axis.
    #[inline]
    pub fn meta_fusion(&self) -> &[FusionTree] {
        &self.mfs
    }

    /// Hard-fusion descriptor per native axis.
    #[inline]
    pub fn hard_fusion(&self) -> &[HardFusion] {
        &self.hfs
    }

    /// Data of one block; `MissingBlock` if absent.
    pub fn block(&self, charges: &[i64]) -> Result<&[T], TensorError> {
        let key = self.make_key(charges)?;
        self.structure
            .slice_of(&key)
            .map(|r| &self.data[r])
            .ok_or_else(|| TensorError::MissingBlock {
                key: key.charges().to_vec(),
            })
    }

    /// Shape of one block; `MissingBlock` if absent.
    pub fn block_shape(&self, charges: &[i64]) -> Result<&[usize], TensorError> {
        let key = self.make_key(charges)?;
        self.structure
            .block_index(&key)
            .map(|i| self.structure.shapes()[i].as_slice())
            .ok_or_else(|| TensorError::MissingBlock {
                key: key.charges().to_vec(),
            })
    }

    /// Iterate over `(key, shape, data)` of all blocks in key order.
    pub fn blocks(&self) -> impl Iterator<Item = (&BlockKey, &[usize], &[T])> {
        let st = &self.structure;
        st.keys()
            .iter()
            .zip(st.shapes())
            .enumerate()
            .map(move |(i, (k, d))| (k, d.as_slice(), &self.data[st.range(i)]))
    }

    /// Copy of all blocks.
    pub(crate) fn to_blocks(&self) -> Vec<OwnedBlock<T>> {
        self.blocks()
            .map(|(k, d, x)| (k.clone(), d.to_vec(), x.to_vec()))
            .collect()
    }

    /// Leg of one native axis, with the sectors present in this tensor.
    pub fn leg(&self, axis: usize) -> Leg {
        Leg::from_parts(
            self.s()[axis],
            self.structure.axis_sectors(axis),
            self.hfs[axis].clone(),
        )
    }

    /// Legs of all native axes.
    pub fn legs(&self) -> Vec<Leg> {
        (0..self.ndim_native()).map(|a| self.leg(a)).collect()
    }

    /// Same structure and fusions with a new buffer.
    pub(crate) fn with_data(&self, data: Vec<T>) -> Self {
        debug_assert_eq!(data.len(), self.data.len());
        Self {
            config: self.config.clone(),
            structure: self.structure.clone(),
            data,
            mfs: self.mfs.clone(),
            hfs: self.hfs.clone(),
        }
    }

    /// Apply `f` to every stored element.
    pub fn map_elements<F: Fn(T) -> T>(&self, f: F) -> Self {
        self.with_data(self.data.iter().map(|&x| f(x)).collect())
    }

    /// Replace the meta-fusion trees (same native layout).
    pub(crate) fn with_meta_fusion(mut self, mfs: Vec<FusionTree>) -> Self {
        debug_assert_eq!(
            mfs.iter().map(FusionTree::num_native).sum::<usize>(),
            self.ndim_native()
        );
        self.mfs = mfs;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u1() -> Config {
        Config::new(Symmetry::u1())
    }

    #[test]
    fn test_zeros_respects_charge_conservation() {
        let config = u1();
        let sym = config.sym().clone();
        let l = Leg::new(&sym, 1, &[-1, 0, 1], &[1, 2, 1]).unwrap();
        let t: SymTensor<f64> =
            SymTensor::zeros(&config, &[l.clone(), l.clone(), l.conj()], &[1]).unwrap();
        for (key, _, _) in t.blocks() {
            assert_eq!(sym.fuse(key.charges(), t.s()).as_slice(), &[1]);
        }
        // (t0, t1, t2) with t0 + t1 - t2 = 1
        assert_eq!(t.num_blocks(), 6);
    }

    #[test]
    fn test_set_block_and_missing_block() {
        let config = u1();
        let mut t: SymTensor<f64> = SymTensor::new(&config, &[1, -1], &[0]).unwrap();
        t.set_block(&[1, 1], &[2, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        t.set_block(&[0, 0], &[1, 1], vec![5.0]).unwrap();
        assert_eq!(t.block(&[1, 1]).unwrap(), &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(t.data(), &[5.0, 1.0, 2.0, 3.0, 4.0]);
        assert!(matches!(t.block(&[2, 2]), Err(TensorError::MissingBlock { .. })));

        // replacing keeps a single copy
        t.set_block(&[0, 0], &[1, 1], vec![6.0]).unwrap();
        assert_eq!(t.num_blocks(), 2);
        assert_eq!(t.block(&[0, 0]).unwrap(), &[6.0]);
    }

    #[test]
    fn test_set_block_rejects_bad_input() {
        let config = u1();
        let mut t: SymTensor<f64> = SymTensor::new(&config, &[1, -1], &[0]).unwrap();
        assert!(matches!(
            t.set_block(&[1, 0], &[1, 1], vec![1.0]),
            Err(TensorError::ChargeConservation { .. })
        ));
        assert!(matches!(
            t.set_block(&[1, 1], &[2, 2], vec![1.0]),
            Err(TensorError::ShapeMismatch { .. })
        ));
        t.set_block(&[1, 1], &[2, 2], vec![0.0; 4]).unwrap();
        assert!(matches!(
            t.set_block(&[1, 1, 0, 0], &[1, 1], vec![0.0]),
            Err(TensorError::WrongNumberOfIndices { .. })
        ));
        // failed insertions leave the tensor untouched
        assert_eq!(t.num_blocks(), 1);
    }

    #[test]
    fn test_eye_is_diagonal() {
        let config = u1();
        let sym = config.sym().clone();
        let leg = Leg::new(&sym, 1, &[0, 1], &[2, 3]).unwrap();
        let e: SymTensor<f64> = SymTensor::eye(&config, &leg).unwrap();
        assert!(e.is_diag());
        assert_eq!(e.size(), 5);
        assert_eq!(e.block_shape(&[1, 1]).unwrap(), &[3, 3]);
        assert_eq!(e.s(), &[1, -1]);
    }

    #[test]
    fn test_trivial_symmetry_single_block() {
        let config = Config::default();
        let sym = config.sym().clone();
        let leg = Leg::new(&sym, 1, &[], &[3]).unwrap();
        let t: SymTensor<f64> = SymTensor::ones(&config, &[leg.clone(), leg.conj()], &[]).unwrap();
        assert_eq!(t.num_blocks(), 1);
        assert_eq!(t.block(&[]).unwrap().len(), 9);
    }
}
