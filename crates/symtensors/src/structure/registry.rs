//! Canonical description of a tensor's blocks.

use std::collections::HashMap;
use std::ops::Range;

use crate::error::TensorError;
use crate::structure::BlockKey;
use crate::symmetry::{Charge, Symmetry};

/// Immutable block layout of a symmetric tensor.
///
/// Holds the sorted block keys `t`, their shapes `D`, and the packing of all
/// blocks into one flat column-major buffer, together with the signature `s`
/// and total charge `n`. A diagonal structure has rank 2 and stores only the
/// `D` diagonal entries of each `(D, D)` block.
///
/// # Example
///
/// ```
/// use symtensors::structure::{BlockKey, Structure};
/// use symtensors::symmetry::Symmetry;
///
/// let sym = Symmetry::u1();
/// let st = Structure::build(
///     &sym,
///     &[1, -1],
///     &[0],
///     vec![
///         (BlockKey::new(&[1, 1], 2), vec![3, 3]),
///         (BlockKey::new(&[0, 0], 2), vec![2, 2]),
///     ],
///     false,
/// )
/// .unwrap();
/// assert_eq!(st.keys()[0].charges(), &[0, 0]);
/// assert_eq!(st.slice_of(&BlockKey::new(&[1, 1], 2)), Some(4..13));
/// assert_eq!(st.size(), 13);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Structure {
    s: Vec<i32>,
    n: Charge,
    diag: bool,
    keys: Vec<BlockKey>,
    shapes: Vec<Vec<usize>>,
    offsets: Vec<usize>,
    size: usize,
}

impl Structure {
    /// Build a structure from `(key, shape)` pairs in any order.
    ///
    /// Blocks with zero elements are dropped. Fails with
    /// `InconsistentBlocks` on duplicate keys or when two blocks disagree on
    /// the dimension of one charge on one axis, and with
    /// `ChargeConservation` when a key does not fuse to `n`.
    pub fn build(
        sym: &Symmetry,
        s: &[i32],
        n: &[i64],
        blocks: Vec<(BlockKey, Vec<usize>)>,
        diag: bool,
    ) -> Result<Self, TensorError> {
        let ndim = s.len();
        let nsym = sym.nsym();
        if n.len() != nsym {
            return Err(TensorError::WrongNumberOfIndices {
                expected: nsym,
                actual: n.len(),
            });
        }
        if let Some(&bad) = s.iter().find(|&&x| x != 1 && x != -1) {
            return Err(TensorError::inconsistent(format!(
                "signature entries must be +1 or -1, got {}",
                bad
            )));
        }
        if diag && ndim != 2 {
            return Err(TensorError::inconsistent("diagonal tensor must have rank 2"));
        }
        let n = sym.reduce(n);

        let mut blocks: Vec<(BlockKey, Vec<usize>)> = blocks
            .into_iter()
            .filter(|(_, shape)| shape.iter().all(|&d| d > 0))
            .collect();
        blocks.sort_by(|a, b| a.0.cmp(&b.0));

        let mut seen: Vec<HashMap<Charge, usize>> = vec![HashMap::new(); ndim];
        for (i, (key, shape)) in blocks.iter().enumerate() {
            if key.ndim() != ndim || shape.len() != ndim {
                return Err(TensorError::WrongNumberOfIndices {
                    expected: ndim,
                    actual: if key.ndim() != ndim {
                        key.ndim()
                    } else {
                        shape.len()
                    },
                });
            }
            if key.charges().len() != ndim * nsym {
                return Err(TensorError::WrongNumberOfIndices {
                    expected: ndim * nsym,
                    actual: key.charges().len(),
                });
            }
            if i > 0 && blocks[i - 1].0 == *key {
                return Err(TensorError::inconsistent(format!("duplicate block {}", key)));
            }
            if diag && shape[0] != shape[1] {
                return Err(TensorError::inconsistent(format!(
                    "diagonal block {} must be square, got {:?}",
                    key, shape
                )));
            }
            if sym.fuse(key.charges(), s) != n {
                return Err(TensorError::ChargeConservation {
                    key: key.charges().to_vec(),
                    n: n.to_vec(),
                });
            }
            for axis in 0..ndim {
                let c: Charge = key.charge(axis).iter().copied().collect();
                match seen[axis].get(&c) {
                    Some(&d) if d != shape[axis] => {
                        return Err(TensorError::inconsistent(format!(
                            "charge {:?} on axis {} has dimensions {} and {}",
                            c.as_slice(),
                            axis,
                            d,
                            shape[axis]
                        )));
                    }
                    Some(_) => {}
                    None => {
                        seen[axis].insert(c, shape[axis]);
                    }
                }
            }
        }

        let mut keys = Vec::with_capacity(blocks.len());
        let mut shapes = Vec::with_capacity(blocks.len());
        let mut offsets = Vec::with_capacity(blocks.len());
        let mut size = 0;
        for (key, shape) in blocks {
            offsets.push(size);
            size += if diag {
                shape[0]
            } else {
                shape.iter().product::<usize>()
            };
            keys.push(key);
            shapes.push(shape);
        }

        Ok(Self {
            s: s.to_vec(),
            n,
            diag,
            keys,
            shapes,
            offsets,
            size,
        })
    }

    /// Structure of the conjugate tensor: signature and total charge
    /// reversed, keys unchanged.
    pub(crate) fn conj(&self, sym: &Symmetry) -> Self {
        Self {
            s: self.s.iter().map(|x| -x).collect(),
            n: sym.negate(&self.n),
            ..self.clone()
        }
    }

    /// Number of native axes.
    #[inline]
    pub fn ndim(&self) -> usize {
        self.s.len()
    }

    /// Signature per native axis.
    #[inline]
    pub fn s(&self) -> &[i32] {
        &self.s
    }

    /// Total charge.
    #[inline]
    pub fn n(&self) -> &[i64] {
        &self.n
    }

    /// Whether blocks store only their diagonal.
    #[inline]
    pub fn is_diag(&self) -> bool {
        self.diag
    }

    /// Sorted block keys.
    #[inline]
    pub fn keys(&self) -> &[BlockKey] {
        &self.keys
    }

    /// Block shapes, parallel to [`keys`](Self::keys).
    #[inline]
    pub fn shapes(&self) -> &[Vec<usize>] {
        &self.shapes
    }

    /// Number of blocks.
    #[inline]
    pub fn num_blocks(&self) -> usize {
        self.keys.len()
    }

    /// Total number of stored elements.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Position of a key in the sorted key list.
    pub fn block_index(&self, key: &BlockKey) -> Option<usize> {
        self.keys.binary_search(key).ok()
    }

    /// Range of the i-th block in the flat buffer.
    #[inline]
    pub fn range(&self, i: usize) -> Range<usize> {
        let end = self
            .offsets
            .get(i + 1)
            .copied()
            .unwrap_or(self.size);
        self.offsets[i]..end
    }

    /// Range of a block in the flat buffer, or `None` if absent.
    pub fn slice_of(&self, key: &BlockKey) -> Option<Range<usize>> {
        self.block_index(key).map(|i| self.range(i))
    }

    /// Sorted `(charge, dim)` table of one axis.
    pub fn axis_sectors(&self, axis: usize) -> Vec<(Charge, usize)> {
        let mut out: Vec<(Charge, usize)> = self
            .keys
            .iter()
            .zip(&self.shapes)
            .map(|(k, d)| (k.charge(axis).iter().copied().collect(), d[axis]))
            .collect();
        out.sort();
        out.dedup();
        out
    }

    /// Sector tables of all axes.
    pub fn legs(&self) -> Vec<Vec<(Charge, usize)>> {
        (0..self.ndim()).map(|a| self.axis_sectors(a)).collect()
    }

    /// Dimension of `charge` on `axis`, if any block carries it.
    pub fn axis_dim(&self, axis: usize, charge: &[i64]) -> Option<usize> {
        self.keys
            .iter()
            .zip(&self.shapes)
            .find(|(k, _)| k.charge(axis) == charge)
            .map(|(_, d)| d[axis])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    fn key(c: &[i64]) -> BlockKey {
        BlockKey::new(c, c.len())
    }

    #[test]
    fn test_build_sorts_and_offsets() {
        let sym = Symmetry::u1();
        let st = Structure::build(
            &sym,
            &[1, 1, -1],
            &[1],
            vec![
                (key(&[1, 1, 1]), vec![1, 1, 2]),
                (key(&[0, 1, 0]), vec![2, 1, 3]),
                (key(&[1, 0, 0]), vec![1, 2, 3]),
            ],
            false,
        )
        .unwrap();
        assert_eq!(st.num_blocks(), 3);
        assert_eq!(st.keys()[0].charges(), &[0, 1, 0]);
        assert_eq!(st.range(0), 0..6);
        assert_eq!(st.range(1), 6..12);
        assert_eq!(st.range(2), 12..14);
        assert_eq!(st.size(), 14);
        assert_eq!(
            st.axis_sectors(2),
            vec![(smallvec![0], 3), (smallvec![1], 2)]
        );
        let legs = st.legs();
        assert_eq!(legs.len(), 3);
        assert_eq!(legs[1], vec![(smallvec![0], 2), (smallvec![1], 1)]);
    }

    #[test]
    fn test_missing_slice() {
        let sym = Symmetry::u1();
        let st = Structure::build(&sym, &[1, -1], &[0], vec![(key(&[0, 0]), vec![2, 2])], false)
            .unwrap();
        assert_eq!(st.slice_of(&key(&[1, 1])), None);
    }

    #[test]
    fn test_inconsistent_dims() {
        let sym = Symmetry::u1();
        let err = Structure::build(
            &sym,
            &[1, -1],
            &[0],
            vec![(key(&[0, 0]), vec![2, 2]), (key(&[1, 1]), vec![3, 3])],
            false,
        );
        assert!(err.is_ok());

        let err = Structure::build(
            &sym,
            &[1, 1, -1],
            &[0],
            vec![
                (key(&[0, 0, 0]), vec![2, 2, 2]),
                (key(&[0, 1, 1]), vec![3, 2, 2]),
            ],
            false,
        );
        assert!(matches!(err, Err(TensorError::InconsistentBlocks { .. })));
    }

    #[test]
    fn test_charge_conservation_checked() {
        let sym = Symmetry::z2();
        let err = Structure::build(&sym, &[1, 1], &[0], vec![(key(&[0, 1]), vec![1, 1])], false);
        assert!(matches!(err, Err(TensorError::ChargeConservation { .. })));
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let sym = Symmetry::u1();
        let err = Structure::build(
            &sym,
            &[1, -1],
            &[0],
            vec![(key(&[0, 0]), vec![2, 2]), (key(&[0, 0]), vec![2, 2])],
            false,
        );
        assert!(matches!(err, Err(TensorError::InconsistentBlocks { .. })));
    }

    #[test]
    fn test_diag_sizes() {
        let sym = Symmetry::u1();
        let st = Structure::build(
            &sym,
            &[1, -1],
            &[0],
            vec![(key(&[0, 0]), vec![2, 2]), (key(&[1, 1]), vec![3, 3])],
            true,
        )
        .unwrap();
        assert_eq!(st.size(), 5);
        assert_eq!(st.range(1), 2..5);
    }

    #[test]
    fn test_zero_size_blocks_dropped() {
        let sym = Symmetry::u1();
        let st = Structure::build(
            &sym,
            &[1, -1],
            &[0],
            vec![(key(&[0, 0]), vec![0, 2]), (key(&[1, 1]), vec![1, 1])],
            false,
        )
        .unwrap();
        assert_eq!(st.num_blocks(), 1);
    }
}
