//! Error types for symtensors.

use thiserror::Error;

/// Errors that can occur in symmetric tensor operations.
///
/// All variants describe usage or consistency problems detected before any
/// numeric work is issued; none of them is recoverable inside the engine.
#[derive(Debug, Error)]
pub enum TensorError {
    /// Shape mismatch between data length and expected size.
    #[error("shape mismatch: expected {expected} elements, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// Wrong number of indices (axes, charges, signatures) provided.
    #[error("wrong number of indices: expected {expected}, got {actual}")]
    WrongNumberOfIndices { expected: usize, actual: usize },

    /// Invalid permutation or axis grouping.
    #[error("invalid permutation {perm:?} for tensor with {ndim} dimensions")]
    InvalidPermutation { perm: Vec<usize>, ndim: usize },

    /// Paired axes have incompatible signatures.
    #[error("signature mismatch on axes ({axis_a}, {axis_b}): {s_a} vs {s_b}")]
    SignatureMismatch {
        axis_a: usize,
        axis_b: usize,
        s_a: i32,
        s_b: i32,
    },

    /// Fused legs combined in one operation have different nesting.
    #[error("fusion tree mismatch: {message}")]
    FusionTreeMismatch { message: String },

    /// Matching sectors declare different dimensions.
    #[error("bond dimension mismatch for charge {charge:?}: {dim_a} vs {dim_b}")]
    BondDimensionMismatch {
        charge: Vec<i64>,
        dim_a: usize,
        dim_b: usize,
    },

    /// A block violates charge conservation.
    #[error("block {key:?} does not fuse to total charge {n:?}")]
    ChargeConservation { key: Vec<i64>, n: Vec<i64> },

    /// Block not found in tensor.
    #[error("block {key:?} not found in tensor")]
    MissingBlock { key: Vec<i64> },

    /// Supplied blocks disagree with each other.
    #[error("inconsistent blocks: {message}")]
    InconsistentBlocks { message: String },

    /// Operation is not defined for the given operands.
    #[error("unsupported operation: {message}")]
    UnsupportedOperation { message: String },

    /// Operands were created with different symmetries.
    #[error("symmetry mismatch: {a} vs {b}")]
    SymmetryMismatch { a: String, b: String },

    /// Operands carry different total charges.
    #[error("total charge mismatch: {a:?} vs {b:?}")]
    TotalChargeMismatch { a: Vec<i64>, b: Vec<i64> },

    /// SVD computation error.
    #[error("SVD error: {message}")]
    SvdError { message: String },

    /// Eigendecomposition error.
    #[error("eigendecomposition error: {message}")]
    EigenError { message: String },

    /// Matrix must be square.
    #[error("matrix must be square: got {rows}x{cols}")]
    NotSquareMatrix { rows: usize, cols: usize },
}

impl TensorError {
    pub(crate) fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedOperation {
            message: message.into(),
        }
    }

    pub(crate) fn inconsistent(message: impl Into<String>) -> Self {
        Self::InconsistentBlocks {
            message: message.into(),
        }
    }

    pub(crate) fn fusion_mismatch(message: impl Into<String>) -> Self {
        Self::FusionTreeMismatch {
            message: message.into(),
        }
    }
}
