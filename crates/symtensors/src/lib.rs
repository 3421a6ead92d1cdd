//! symtensors - block-sparse tensors with abelian symmetries
//!
//! Every leg of a tensor carries charge sectors of an abelian group (U(1),
//! Z_n or products of them, optionally fermionic). Only blocks whose charges
//! fuse to the tensor's total charge are stored, each as a dense
//! column-major array.
//!
//! # Architecture
//!
//! ```text
//! Level 1: Tensor operations
//!     → contract (tensordot, trace, ncon, ...), decomposition, algebra
//!
//! Level 2: Structure and fusion
//!     → Structure (sorted block keys), meta/hard fusion, masks, merged matrices
//!
//! Level 3: Dense kernels (backend module)
//!     → FaerBackend, GenericBackend, faer factorizations
//! ```
//!
//! # Example
//!
//! ```
//! use symtensors::decomposition::{SplitOptions, TruncationOptions, svd_with_truncation};
//! use symtensors::{Config, Leg, Norm, SymTensor, Symmetry, norm, tensordot};
//!
//! let config = Config::new(Symmetry::u1());
//! let sym = config.sym().clone();
//! let leg = Leg::new(&sym, 1, &[-1, 0, 1], &[1, 2, 1]).unwrap();
//!
//! let a: SymTensor<f64> =
//!     SymTensor::rand(&config, &[leg.clone(), leg.clone(), leg.conj()], &[0]).unwrap();
//! let b: SymTensor<f64> = SymTensor::rand(&config, &[leg.clone(), leg.conj()], &[0]).unwrap();
//!
//! // contract the last leg of `a` with the first leg of `b`
//! let c = tensordot(&a, &b, &[2], &[0], (false, false)).unwrap();
//! assert_eq!(c.s(), &[1, 1, -1]);
//!
//! // keep at most 3 singular values over all sectors
//! let trunc = TruncationOptions::default().with_d_total(3);
//! let res = svd_with_truncation(&c, &[0], &[1, 2], SplitOptions::default(), &trunc).unwrap();
//! assert!(res.s.size() <= 3);
//! assert!(norm(&res.s, Norm::Fro) <= norm(&c, Norm::Fro) + 1e-12);
//! ```

pub mod algebra;
pub mod backend;
pub mod config;
pub mod contract;
pub mod decomposition;
pub mod error;
pub mod fusion;
pub mod random;
pub mod scalar;
pub mod strides;
pub mod structure;
pub mod symmetry;
pub mod tensor;

pub use algebra::{Norm, add, allclose, apxb, entropy, linear_combine, neg, norm, scale, sub};
pub use config::{BackendKind, Config, TensordotPolicy};
pub use contract::{CHARGE_AXIS, apply_mask, broadcast, ncon, outer, swap_gate, tensordot, trace, vdot};
pub use decomposition::{SplitOptions, TruncationOptions, eigh, qr, svd, truncation_mask};
pub use error::TensorError;
pub use scalar::{Scalar, c64};
pub use structure::{BlockKey, Leg, Structure};
pub use symmetry::{Charge, Symmetry};
pub use tensor::{FusionMode, SymTensor, TensorParts};
