//! Tensor decompositions.
//!
//! A decomposition splits the logical axes of a tensor into a left and a
//! right group. Blocks are merged into one matrix per charge flowing from
//! the left group to the right group, each matrix is factorized with the
//! dense backend, and the factors are cut back into blocks. The factors are
//! joined by a new bond whose sectors are exactly these charges.
//!
//! # Available Decompositions
//!
//! - [`svd`] / [`svd_with_truncation`]: `A = U S V`
//! - [`eigh`] / [`eigh_with_truncation`]: `A = U S U^H` for Hermitian `A`
//! - [`qr`]: `A = Q R` with non-negative diagonal of `R`
//!
//! Truncation is global: [`truncation_mask`] ranks the values of all sectors
//! together and [`apply_mask`](crate::contract::apply_mask) shrinks the bond.
//!
//! # Example
//!
//! ```
//! use symtensors::decomposition::{SplitOptions, svd};
//! use symtensors::{Config, Leg, SymTensor, Symmetry};
//!
//! let config = Config::new(Symmetry::u1());
//! let sym = config.sym().clone();
//! let leg = Leg::new(&sym, 1, &[0, 1], &[2, 3]).unwrap();
//! let a: SymTensor<f64> =
//!     SymTensor::ones(&config, &[leg.clone(), leg.clone(), leg.conj()], &[1]).unwrap();
//! let res = svd(&a, &[0, 1], &[2], SplitOptions::default()).unwrap();
//! assert_eq!(res.u.s(), &[1, 1, 1]);
//! assert_eq!(res.s.s(), &[-1, 1]);
//! assert_eq!(res.v.s(), &[-1, -1]);
//! ```

mod eigh;
mod qr;
mod svd;
mod truncation;

pub use eigh::{EighResult, eigh, eigh_with_truncation};
pub use qr::{QrResult, qr};
pub use svd::{SvdResult, svd, svd_with_truncation};
pub use truncation::{TruncationOptions, truncation_mask};

use std::collections::BTreeMap;

use crate::error::TensorError;
use crate::fusion::merge::{GroupIndex, Grouping, build_matrices, collect_indices};
use crate::fusion::{FusionTree, HardFusion, native_axes};
use crate::scalar::Scalar;
use crate::strides::extract_subblock;
use crate::structure::BlockKey;
use crate::symmetry::Charge;
use crate::tensor::{OwnedBlock, SymTensor, check_permutation};

/// Placement of the bond created by a decomposition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SplitOptions {
    /// Signature of the new leg on the left factor; the right factor and
    /// the first leg of the spectrum get `-s_u`.
    pub s_u: i32,
    /// Whether the left factor carries the total charge. Otherwise the right
    /// factor does.
    pub n_u: bool,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self { s_u: 1, n_u: true }
    }
}

impl SplitOptions {
    pub fn with_s_u(mut self, s_u: i32) -> Self {
        self.s_u = s_u;
        self
    }

    pub fn with_n_u(mut self, n_u: bool) -> Self {
        self.n_u = n_u;
        self
    }
}

/// Merged matrix of one group.
pub(crate) struct GroupMatrix<T> {
    pub charge: Charge,
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<T>,
}

/// Dense factor of one group, attached to bond sector `bond` of size `k`.
pub(crate) struct BondFactor<T> {
    pub bond: Charge,
    pub k: usize,
    pub data: Vec<T>,
}

/// A tensor prepared for factorization along a left/right split.
pub(crate) struct Split<T: Scalar> {
    source: SymTensor<T>,
    left: Vec<usize>,
    right: Vec<usize>,
    grouping: Grouping,
    indices: BTreeMap<Charge, GroupIndex>,
}

impl<T: Scalar> Split<T> {
    pub fn new(a: &SymTensor<T>, left: &[usize], right: &[usize]) -> Result<Self, TensorError> {
        let all: Vec<usize> = left.iter().chain(right).copied().collect();
        check_permutation(&all, a.ndim())?;
        if left.is_empty() || right.is_empty() {
            return Err(TensorError::unsupported(
                "a decomposition needs axes on both sides",
            ));
        }
        let source = a.to_nondiag()?;
        let nl = native_axes(source.meta_fusion(), left);
        let nr = native_axes(source.meta_fusion(), right);
        let grouping = Grouping::by_rows(source.s(), &nl, &nr);
        let indices = collect_indices(&source, &grouping)?;
        Ok(Self {
            source,
            left: left.to_vec(),
            right: right.to_vec(),
            grouping,
            indices,
        })
    }

    pub fn source(&self) -> &SymTensor<T> {
        &self.source
    }

    pub fn matrices(&self) -> Vec<GroupMatrix<T>> {
        build_matrices(&self.source, &self.grouping, &self.indices)
            .into_iter()
            .filter_map(|(charge, data)| {
                let (rows, cols) = self.indices.get(&charge)?;
                Some(GroupMatrix {
                    rows: rows.dim(),
                    cols: cols.dim(),
                    charge,
                    data,
                })
            })
            .collect()
    }

    /// Charge of the bond sector of group `g`.
    ///
    /// The left factor satisfies `g + s_u c = n_left`, so
    /// `c = s_u (n - g)` when it carries the total charge and `c = -s_u g`
    /// otherwise.
    pub fn bond_charge(&self, g: &[i64], opts: SplitOptions) -> Charge {
        let sym = self.source.sym();
        if opts.n_u {
            sym.fuse_pair(self.source.n(), opts.s_u, g, -opts.s_u)
        } else {
            sym.fuse_pair(&sym.zero(), 1, g, -opts.s_u)
        }
    }

    /// Total charges of the left and right factors.
    pub fn factor_charges(&self, opts: SplitOptions) -> (Charge, Charge) {
        let n = Charge::from_slice(self.source.n());
        let zero = self.source.sym().zero();
        if opts.n_u { (n, zero) } else { (zero, n) }
    }

    /// Left factor `(left..., s_bond)` from per-group `rows x k` matrices.
    pub fn left_factor(
        &self,
        s_bond: i32,
        n: &[i64],
        factors: &BTreeMap<Charge, BondFactor<T>>,
    ) -> Result<SymTensor<T>, TensorError> {
        let src = &self.source;
        let axes = &self.grouping.row_axes;
        let mut blocks: Vec<OwnedBlock<T>> = Vec::new();
        for (g, f) in factors {
            let Some((rows, _)) = self.indices.get(g) else {
                continue;
            };
            for r in rows.parts() {
                let data = extract_subblock(&f.data, &[rows.dim(), f.k], &[r.start, 0], &[r.size, f.k]);
                let key = BlockKey::collect_from(r.charges.iter().chain(&f.bond).copied(), axes.len() + 1);
                let mut shape = r.shape.clone();
                shape.push(f.k);
                blocks.push((key, shape, data));
            }
        }
        let mut s: Vec<i32> = axes.iter().map(|&p| src.s()[p]).collect();
        s.push(s_bond);
        let mut mfs: Vec<FusionTree> = self.left.iter().map(|&x| src.meta_fusion()[x].clone()).collect();
        mfs.push(FusionTree::Leaf);
        let mut hfs: Vec<HardFusion> = axes.iter().map(|&p| src.hard_fusion()[p].clone()).collect();
        hfs.push(HardFusion::leaf());
        SymTensor::assemble(src.config(), s, n, false, mfs, hfs, blocks)
    }

    /// Right factor `(s_bond, right...)` from per-group `k x cols` matrices.
    pub fn right_factor(
        &self,
        s_bond: i32,
        n: &[i64],
        factors: &BTreeMap<Charge, BondFactor<T>>,
    ) -> Result<SymTensor<T>, TensorError> {
        let src = &self.source;
        let axes = &self.grouping.col_axes;
        let mut blocks: Vec<OwnedBlock<T>> = Vec::new();
        for (g, f) in factors {
            let Some((_, cols)) = self.indices.get(g) else {
                continue;
            };
            for c in cols.parts() {
                let data = extract_subblock(&f.data, &[f.k, cols.dim()], &[0, c.start], &[f.k, c.size]);
                let key = BlockKey::collect_from(f.bond.iter().chain(&c.charges).copied(), axes.len() + 1);
                let mut shape = vec![f.k];
                shape.extend_from_slice(&c.shape);
                blocks.push((key, shape, data));
            }
        }
        let mut s = vec![s_bond];
        s.extend(axes.iter().map(|&p| src.s()[p]));
        let mut mfs = vec![FusionTree::Leaf];
        mfs.extend(self.right.iter().map(|&x| src.meta_fusion()[x].clone()));
        let mut hfs = vec![HardFusion::leaf()];
        hfs.extend(axes.iter().map(|&p| src.hard_fusion()[p].clone()));
        SymTensor::assemble(src.config(), s, n, false, mfs, hfs, blocks)
    }

    /// Diagonal spectrum `(s_first, -s_first)` keyed by bond charge.
    pub fn spectrum(&self, s_first: i32, values: BTreeMap<Charge, Vec<f64>>) -> Result<SymTensor<T>, TensorError> {
        let src = &self.source;
        let blocks: Vec<OwnedBlock<T>> = values
            .into_iter()
            .map(|(c, v)| {
                let k = v.len();
                let key = BlockKey::collect_from(c.iter().chain(c.iter()).copied(), 2);
                (key, vec![k, k], v.into_iter().map(T::from_real).collect())
            })
            .collect();
        SymTensor::assemble(
            src.config(),
            vec![s_first, -s_first],
            &src.sym().zero(),
            true,
            vec![FusionTree::Leaf; 2],
            vec![HardFusion::leaf(); 2],
            blocks,
        )
    }
}
