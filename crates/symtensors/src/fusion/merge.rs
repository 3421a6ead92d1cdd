//! Reshaping blocks into per-charge matrices and back.
//!
//! Blocks are grouped by an effective charge computed from a subset of their
//! axes. Inside a group, rows are indexed by the charge tuples found on the
//! row axes and columns by those on the column axes, each tuple owning a
//! contiguous range. Tuples are sorted, so two tensors grouped the same way
//! agree on the order of shared tuples.

use std::collections::BTreeMap;

use crate::backend;
use crate::error::TensorError;
use crate::scalar::Scalar;
use crate::strides::{copy_subblock, extract_subblock};
use crate::structure::BlockKey;
use crate::symmetry::{Charge, Symmetry};
use crate::tensor::SymTensor;

/// One charge tuple of a merged index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct IndexPart {
    /// Concatenated charges of the merged axes.
    pub charges: Vec<i64>,
    pub shape: Vec<usize>,
    pub start: usize,
    pub size: usize,
}

/// Row or column index of a merged matrix.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct MergedIndex {
    parts: Vec<IndexPart>,
    dim: usize,
}

impl MergedIndex {
    /// Index over the given tuples; duplicates collapse.
    pub fn new(mut items: Vec<(Vec<i64>, Vec<usize>)>) -> Result<Self, TensorError> {
        items.sort();
        items.dedup();
        let mut parts: Vec<IndexPart> = Vec::with_capacity(items.len());
        let mut start = 0;
        for (charges, shape) in items {
            if let Some(last) = parts.last() {
                if last.charges == charges {
                    return Err(TensorError::inconsistent(format!(
                        "charges {:?} appear with shapes {:?} and {:?}",
                        charges, last.shape, shape
                    )));
                }
            }
            let size = shape.iter().product();
            parts.push(IndexPart {
                charges,
                shape,
                start,
                size,
            });
            start += size;
        }
        Ok(Self { parts, dim: start })
    }

    pub fn parts(&self) -> &[IndexPart] {
        &self.parts
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn find(&self, charges: &[i64]) -> Option<&IndexPart> {
        self.parts
            .binary_search_by(|p| p.charges.as_slice().cmp(charges))
            .ok()
            .map(|i| &self.parts[i])
    }

    /// Tuples present in both indices. Shared tuples must have equal shapes.
    pub fn intersect(&self, other: &Self) -> Result<Self, TensorError> {
        let mut items = Vec::new();
        for p in &self.parts {
            if let Some(q) = other.find(&p.charges) {
                if p.shape != q.shape {
                    return Err(TensorError::BondDimensionMismatch {
                        charge: p.charges.clone(),
                        dim_a: p.size,
                        dim_b: q.size,
                    });
                }
                items.push((p.charges.clone(), p.shape.clone()));
            }
        }
        Self::new(items)
    }
}

/// Concatenated charges of `key` on `axes`.
pub(crate) fn tuple_of(key: &BlockKey, axes: &[usize]) -> Vec<i64> {
    axes.iter()
        .flat_map(|&a| key.charge(a).iter().copied())
        .collect()
}

/// Effective charge `fuse(key[axes], signs)` of a block.
pub(crate) fn group_charge(sym: &Symmetry, key: &BlockKey, axes: &[usize], signs: &[i32]) -> Charge {
    sym.fuse(&tuple_of(key, axes), signs)
}

/// How blocks are sorted into matrices.
#[derive(Clone, Debug)]
pub(crate) struct Grouping {
    pub row_axes: Vec<usize>,
    pub col_axes: Vec<usize>,
    /// Axes and signatures defining the group charge.
    pub group_axes: Vec<usize>,
    pub group_signs: Vec<i32>,
}

impl Grouping {
    /// Group by the charge flowing through the row axes.
    pub fn by_rows(s: &[i32], row_axes: &[usize], col_axes: &[usize]) -> Self {
        Self {
            row_axes: row_axes.to_vec(),
            col_axes: col_axes.to_vec(),
            group_axes: row_axes.to_vec(),
            group_signs: row_axes.iter().map(|&a| s[a]).collect(),
        }
    }

    fn group(&self, sym: &Symmetry, key: &BlockKey) -> Charge {
        group_charge(sym, key, &self.group_axes, &self.group_signs)
    }
}

/// Row and column indices of one group.
pub(crate) type GroupIndex = (MergedIndex, MergedIndex);

/// Row and column indices of every group of `t`.
pub(crate) fn collect_indices<T: Scalar>(
    t: &SymTensor<T>,
    grouping: &Grouping,
) -> Result<BTreeMap<Charge, GroupIndex>, TensorError> {
    let sym = t.sym();
    let mut items: BTreeMap<Charge, (Vec<(Vec<i64>, Vec<usize>)>, Vec<(Vec<i64>, Vec<usize>)>)> =
        BTreeMap::new();
    for (key, d, _) in t.blocks() {
        let entry = items.entry(grouping.group(sym, key)).or_default();
        entry.0.push((
            tuple_of(key, &grouping.row_axes),
            grouping.row_axes.iter().map(|&a| d[a]).collect(),
        ));
        entry.1.push((
            tuple_of(key, &grouping.col_axes),
            grouping.col_axes.iter().map(|&a| d[a]).collect(),
        ));
    }
    items
        .into_iter()
        .map(|(g, (rows, cols))| Ok((g, (MergedIndex::new(rows)?, MergedIndex::new(cols)?))))
        .collect()
}

/// Assemble one matrix per group of `indices`. Blocks whose tuples are absent
/// from the indices are skipped. `t` must not be diagonal.
pub(crate) fn build_matrices<T: Scalar>(
    t: &SymTensor<T>,
    grouping: &Grouping,
    indices: &BTreeMap<Charge, GroupIndex>,
) -> BTreeMap<Charge, Vec<T>> {
    let sym = t.sym();
    let kind = t.config().backend();
    let perm: Vec<usize> = grouping
        .row_axes
        .iter()
        .chain(&grouping.col_axes)
        .copied()
        .collect();
    let identity = perm.iter().enumerate().all(|(i, &p)| i == p);
    let mut out: BTreeMap<Charge, Vec<T>> = indices
        .iter()
        .map(|(g, (r, c))| (g.clone(), vec![T::zero(); r.dim() * c.dim()]))
        .collect();
    for (key, d, x) in t.blocks() {
        let g = grouping.group(sym, key);
        let Some((rows, cols)) = indices.get(&g) else {
            continue;
        };
        let (Some(r), Some(c)) = (
            rows.find(&tuple_of(key, &grouping.row_axes)),
            cols.find(&tuple_of(key, &grouping.col_axes)),
        ) else {
            continue;
        };
        let permuted;
        let src: &[T] = if identity {
            x
        } else {
            permuted = backend::permute(kind, x, d, &perm);
            &permuted
        };
        if let Some(mat) = out.get_mut(&g) {
            copy_subblock(
                mat,
                &[rows.dim(), cols.dim()],
                &[r.start, c.start],
                src,
                &[r.size, c.size],
            );
        }
    }
    out
}

/// Block `(r, c)` of a merged matrix with `nrows` rows, column-major with
/// shape `r.shape ++ c.shape`.
pub(crate) fn extract_part<T: Scalar>(mat: &[T], nrows: usize, ncols: usize, r: &IndexPart, c: &IndexPart) -> Vec<T> {
    extract_subblock(mat, &[nrows, ncols], &[r.start, c.start], &[r.size, c.size])
}
