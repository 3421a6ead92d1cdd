//! QR decomposition of symmetric tensors.

use std::collections::BTreeMap;

use log::debug;

use crate::backend::dense_qr;
use crate::error::TensorError;
use crate::scalar::Scalar;
use crate::symmetry::Charge;
use crate::tensor::SymTensor;

use super::{BondFactor, Split, SplitOptions};

/// Result of a QR decomposition: `A = Q R`.
#[derive(Debug, Clone)]
pub struct QrResult<T: Scalar> {
    /// Isometry with legs `(left..., s_u)`.
    pub q: SymTensor<T>,
    /// Legs `(-s_u, right...)`; every sector matrix is upper triangular with
    /// a non-negative real diagonal.
    pub r: SymTensor<T>,
}

/// Thin QR with `left` axes on `Q` and `right` axes on `R`.
pub fn qr<T: Scalar>(
    a: &SymTensor<T>,
    left: &[usize],
    right: &[usize],
    opts: SplitOptions,
) -> Result<QrResult<T>, TensorError> {
    let split = Split::new(a, left, right)?;
    let mut qs: BTreeMap<Charge, BondFactor<T>> = BTreeMap::new();
    let mut rs: BTreeMap<Charge, BondFactor<T>> = BTreeMap::new();
    for m in split.matrices() {
        let dec = dense_qr(&m.data, m.rows, m.cols);
        let bond = split.bond_charge(&m.charge, opts);
        qs.insert(
            m.charge.clone(),
            BondFactor {
                bond: bond.clone(),
                k: dec.k,
                data: dec.q,
            },
        );
        rs.insert(
            m.charge,
            BondFactor {
                bond,
                k: dec.k,
                data: dec.r,
            },
        );
    }
    let (n_q, n_r) = split.factor_charges(opts);
    let q = split.left_factor(opts.s_u, &n_q, &qs)?;
    let r = split.right_factor(-opts.s_u, &n_r, &rs)?;
    debug!("qr: {} sectors", qs.len());
    Ok(QrResult { q, r })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::contract::tensordot;
    use crate::decomposition::test_util::{assert_tensors_close, join};
    use crate::structure::Leg;
    use crate::symmetry::Symmetry;

    fn sample(config: &Config) -> SymTensor<f64> {
        let sym = config.sym().clone();
        let leg = Leg::new(&sym, 1, &[0, 1], &[2, 3]).unwrap();
        let mut k = 0usize;
        SymTensor::from_legs_with(config, &[leg.clone(), leg.conj(), leg.clone()], &[1], |size| {
            (0..size)
                .map(|_| {
                    k += 1;
                    ((k * 3) % 5) as f64 - 1.5
                })
                .collect()
        })
        .unwrap()
    }

    #[test]
    fn test_qr_reconstructs() {
        let config = Config::new(Symmetry::u1());
        let a = sample(&config);
        for opts in [SplitOptions::default(), SplitOptions::default().with_n_u(false)] {
            let res = qr(&a, &[0, 1], &[2], opts).unwrap();
            assert_eq!(res.q.s(), &[1, -1, 1]);
            assert_eq!(res.r.s(), &[-1, 1]);
            let rebuilt = join(&res.q, &res.r);
            assert_tensors_close(&a, &rebuilt, 1e-10);
        }
    }

    #[test]
    fn test_q_is_isometry_and_r_diagonal_positive() {
        let config = Config::new(Symmetry::u1());
        let a = sample(&config);
        let res = qr(&a, &[0, 1], &[2], SplitOptions::default()).unwrap();
        let qq = tensordot(&res.q, &res.q, &[0, 1], &[0, 1], (true, false)).unwrap();
        for (_, d, x) in qq.blocks() {
            for i in 0..d[0] {
                for j in 0..d[1] {
                    let expected = if i == j { 1.0 } else { 0.0 };
                    assert!((x[i + d[0] * j] - expected).abs() < 1e-10);
                }
            }
        }
        for (_, d, x) in res.r.blocks() {
            for i in 0..d[0].min(d[1]) {
                assert!(x[i + d[0] * i] >= 0.0);
            }
        }
    }
}
