//! Integration tests for decompositions and global truncation.

use approx::assert_relative_eq;
use rand::SeedableRng;
use rand::rngs::StdRng;
use symtensors::decomposition::{SplitOptions, TruncationOptions, svd_with_truncation};
use symtensors::{Config, FusionMode, Leg, Norm, SymTensor, Symmetry, eigh, norm, qr, sub, svd, tensordot};

fn rebuild(u: &SymTensor<f64>, s: &SymTensor<f64>, v: &SymTensor<f64>) -> SymTensor<f64> {
    let us = tensordot(u, s, &[u.ndim() - 1], &[0], (false, false)).unwrap();
    tensordot(&us, v, &[us.ndim() - 1], &[0], (false, false)).unwrap()
}

fn random_u1(seed: u64) -> SymTensor<f64> {
    let config = Config::new(Symmetry::u1());
    let sym = config.sym().clone();
    let leg = Leg::new(&sym, 1, &[-1, 0, 1], &[2, 3, 2]).unwrap();
    let mut rng = StdRng::seed_from_u64(seed);
    SymTensor::randn_with_rng(&config, &[leg.clone(), leg.clone(), leg.conj(), leg.conj()], &[0], &mut rng)
        .unwrap()
}

#[test]
fn test_truncation_error_decreases_with_d_total() {
    let a = random_u1(11);
    let full = svd(&a, &[0, 1], &[2, 3], SplitOptions::default()).unwrap();
    let total = full.s.size();
    let mut previous = f64::INFINITY;
    for d in 1..=total {
        let trunc = TruncationOptions::default().with_d_total(d);
        let res = svd_with_truncation(&a, &[0, 1], &[2, 3], SplitOptions::default(), &trunc).unwrap();
        assert_eq!(res.s.size(), d);
        let err = norm(&sub(&a, &rebuild(&res.u, &res.s, &res.v)).unwrap(), Norm::Fro);
        assert!(err <= previous + 1e-10, "error grew from {} to {} at D = {}", previous, err, d);
        previous = err;
    }
    assert_relative_eq!(previous, 0.0, epsilon = 1e-10);
}

#[test]
fn test_truncation_error_matches_discarded_weight() {
    let a = random_u1(12);
    let full = svd(&a, &[0, 1], &[2, 3], SplitOptions::default()).unwrap();
    let mut values: Vec<f64> = full.s.data().to_vec();
    values.sort_by(|x, y| y.total_cmp(x));
    let d = 5;
    let trunc = TruncationOptions::default().with_d_total(d);
    let res = svd_with_truncation(&a, &[0, 1], &[2, 3], SplitOptions::default(), &trunc).unwrap();
    let err = norm(&sub(&a, &rebuild(&res.u, &res.s, &res.v)).unwrap(), Norm::Fro);
    let discarded: f64 = values[d..].iter().map(|x| x * x).sum::<f64>().sqrt();
    assert_relative_eq!(err, discarded, epsilon = 1e-10);
}

/// Block-diagonal matrix with a threefold degenerate value spread over sectors.
fn degenerate() -> SymTensor<f64> {
    let config = Config::new(Symmetry::u1());
    let mut a: SymTensor<f64> = SymTensor::new(&config, &[1, -1], &[0]).unwrap();
    a.set_block(&[-1, -1], &[2, 2], vec![2.0, 0.0, 0.0, 0.5]).unwrap();
    a.set_block(&[0, 0], &[2, 2], vec![3.0, 0.0, 0.0, 2.0]).unwrap();
    a.set_block(&[1, 1], &[2, 2], vec![2.0, 0.0, 0.0, 1.0]).unwrap();
    a
}

#[test]
fn test_multiplets_are_never_split() {
    let a = degenerate();
    let all: [f64; 6] = [3.0, 2.0, 2.0, 2.0, 1.0, 0.5];
    let eps = 1e-8;
    for d in 1..=all.len() {
        let trunc = TruncationOptions::default().with_d_total(d).with_multiplets(eps);
        let res = svd_with_truncation(&a, &[0], &[1], SplitOptions::default(), &trunc).unwrap();
        let kept = res.s.data().to_vec();
        assert!(kept.len() <= d);
        let smallest_kept = kept.iter().copied().fold(f64::INFINITY, f64::min);
        // every discarded value is separated from the kept ones by a gap
        let n_discarded = all.len() - kept.len();
        let mut sorted = all.to_vec();
        sorted.sort_by(|x, y| y.total_cmp(x));
        for &w in &sorted[sorted.len() - n_discarded..] {
            assert!((smallest_kept - w).abs() / 3.0 > eps, "split multiplet at D = {}", d);
        }
    }
    let trunc = TruncationOptions::default().with_d_total(3).with_multiplets(eps);
    let res = svd_with_truncation(&a, &[0], &[1], SplitOptions::default(), &trunc).unwrap();
    assert_eq!(res.s.size(), 1);
    let trunc = TruncationOptions::default().with_d_total(4).with_multiplets(eps);
    let res = svd_with_truncation(&a, &[0], &[1], SplitOptions::default(), &trunc).unwrap();
    assert_eq!(res.s.size(), 4);
}

#[test]
fn test_block_bounds_and_tolerance() {
    let a = degenerate();
    let trunc = TruncationOptions::default().with_d_block(1);
    let res = svd_with_truncation(&a, &[0], &[1], SplitOptions::default(), &trunc).unwrap();
    assert_eq!(res.s.num_blocks(), 3);
    assert_eq!(res.s.size(), 3);

    let trunc = TruncationOptions::default().with_tol(0.5);
    let res = svd_with_truncation(&a, &[0], &[1], SplitOptions::default(), &trunc).unwrap();
    // values >= 1.5 survive
    assert_eq!(res.s.size(), 4);

    let trunc = TruncationOptions::default().with_d_total(1).with_d_block_min(1);
    let res = svd_with_truncation(&a, &[0], &[1], SplitOptions::default(), &trunc).unwrap();
    assert_eq!(res.s.num_blocks(), 3);
}

#[test]
fn test_svd_of_hard_fused_tensor_unfuses() {
    let a = random_u1(13);
    let f = a.fuse_legs(&[&[0, 1], &[2, 3]], FusionMode::Hard).unwrap();
    let res = svd(&f, &[0], &[1], SplitOptions::default()).unwrap();
    let u = res.u.unfuse_legs(&[0]).unwrap();
    let v = res.v.unfuse_legs(&[1]).unwrap();
    assert_eq!(u.ndim(), 3);
    assert_eq!(v.ndim(), 3);
    let rebuilt = rebuild(&u, &res.s, &v);
    let err = norm(&sub(&a, &rebuilt).unwrap(), Norm::Fro);
    assert!(err < 1e-10 * norm(&a, Norm::Fro).max(1.0));
}

#[test]
fn test_eigh_and_qr_round_trip() {
    let a = random_u1(14);
    let h = tensordot(&a, &a, &[2, 3], &[2, 3], (false, true)).unwrap();
    let res = eigh(&h, &[0, 1], &[2, 3], 1).unwrap();
    let us = tensordot(&res.u, &res.s, &[2], &[0], (false, false)).unwrap();
    let rebuilt = tensordot(&us, &res.u, &[2], &[2], (false, true)).unwrap();
    assert!(norm(&sub(&h, &rebuilt).unwrap(), Norm::Fro) < 1e-9);
    assert!(res.s.data().iter().all(|&x| x > -1e-10));

    let res = qr(&a, &[0, 2], &[1, 3], SplitOptions::default().with_s_u(-1)).unwrap();
    let rebuilt = tensordot(&res.q, &res.r, &[2], &[0], (false, false)).unwrap();
    let a_perm = a.transpose(&[0, 2, 1, 3]).unwrap();
    assert!(norm(&sub(&a_perm, &rebuilt).unwrap(), Norm::Fro) < 1e-10);
}
