//! Decomposition of a tensor into plain parts and exact reconstruction.

use crate::config::Config;
use crate::error::TensorError;
use crate::fusion::{FusionTree, HardFusion};
use crate::scalar::Scalar;
use crate::structure::BlockKey;
use crate::tensor::{OwnedBlock, SymTensor};

/// Everything needed to rebuild a tensor bit-exactly.
///
/// `keys[i]` holds the concatenated charges of block `i` (one charge per
/// native axis) and `shapes[i]` its shape. Blocks are in canonical key order
/// and `data` is their concatenation.
#[derive(Clone, Debug, PartialEq)]
pub struct TensorParts<T> {
    pub s: Vec<i32>,
    pub n: Vec<i64>,
    pub keys: Vec<Vec<i64>>,
    pub shapes: Vec<Vec<usize>>,
    pub diag: bool,
    pub meta_fusion: Vec<FusionTree>,
    pub hard_fusion: Vec<HardFusion>,
    pub data: Vec<T>,
}

impl<T: Scalar> SymTensor<T> {
    /// Export the tensor as [`TensorParts`].
    pub fn to_parts(&self) -> TensorParts<T> {
        TensorParts {
            s: self.s().to_vec(),
            n: self.n().to_vec(),
            keys: self
                .structure
                .keys()
                .iter()
                .map(|k| k.charges().to_vec())
                .collect(),
            shapes: self.structure.shapes().to_vec(),
            diag: self.is_diag(),
            meta_fusion: self.mfs.clone(),
            hard_fusion: self.hfs.clone(),
            data: self.data.clone(),
        }
    }

    /// Rebuild a tensor from [`TensorParts`].
    pub fn from_parts(config: &Config, parts: TensorParts<T>) -> Result<Self, TensorError> {
        let TensorParts {
            s,
            n,
            keys,
            shapes,
            diag,
            meta_fusion,
            hard_fusion,
            data,
        } = parts;
        if keys.len() != shapes.len() {
            return Err(TensorError::WrongNumberOfIndices {
                expected: keys.len(),
                actual: shapes.len(),
            });
        }
        let sizes: Vec<usize> = shapes
            .iter()
            .map(|d| {
                if diag {
                    d.first().copied().unwrap_or(0)
                } else {
                    d.iter().product()
                }
            })
            .collect();
        let total: usize = sizes.iter().sum();
        if total != data.len() {
            return Err(TensorError::ShapeMismatch {
                expected: total,
                actual: data.len(),
            });
        }
        let ndim = s.len();
        let mut blocks: Vec<OwnedBlock<T>> = Vec::with_capacity(keys.len());
        let mut start = 0;
        for ((key, shape), size) in keys.iter().zip(shapes).zip(sizes) {
            let nsym = config.sym().nsym();
            if key.len() != ndim * nsym {
                return Err(TensorError::WrongNumberOfIndices {
                    expected: ndim * nsym,
                    actual: key.len(),
                });
            }
            blocks.push((
                BlockKey::new(key, ndim),
                shape,
                data[start..start + size].to_vec(),
            ));
            start += size;
        }
        Self::assemble(config, s, &n, diag, meta_fusion, hard_fusion, blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::Leg;
    use crate::symmetry::Symmetry;

    #[test]
    fn test_parts_roundtrip() {
        let config = Config::new(Symmetry::z2xu1());
        let sym = config.sym().clone();
        let a = Leg::new(&sym, 1, &[0, 0, 1, 1], &[2, 1]).unwrap();
        let b = Leg::new(&sym, -1, &[0, 0, 1, 1, 0, 1], &[1, 2, 2]).unwrap();
        let t: SymTensor<f64> = SymTensor::ones(&config, &[a, b], &[0, 0]).unwrap();
        let parts = t.to_parts();
        let back = SymTensor::from_parts(&config, parts.clone()).unwrap();
        assert_eq!(back.structure(), t.structure());
        assert_eq!(back.to_parts(), parts);
    }

    #[test]
    fn test_parts_length_checked() {
        let config = Config::new(Symmetry::u1());
        let parts = TensorParts::<f64> {
            s: vec![1, -1],
            n: vec![0],
            keys: vec![vec![0, 0]],
            shapes: vec![vec![2, 2]],
            diag: false,
            meta_fusion: vec![FusionTree::Leaf; 2],
            hard_fusion: vec![HardFusion::leaf(); 2],
            data: vec![1.0; 3],
        };
        assert!(matches!(
            SymTensor::from_parts(&config, parts),
            Err(TensorError::ShapeMismatch { .. })
        ));
    }
}
