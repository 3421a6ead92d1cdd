//! Integration tests for contractions.
//!
//! Results are compared densely against each other or against hand-computed
//! values, across symmetries, policies and backends.

use approx::assert_relative_eq;
use rand::SeedableRng;
use rand::rngs::StdRng;
use symtensors::{
    BackendKind, Config, FusionMode, Leg, SymTensor, Symmetry, TensorError, TensordotPolicy, apply_mask,
    broadcast, ncon, swap_gate, tensordot, trace, vdot,
};

fn assert_dense_eq(a: &SymTensor<f64>, b: &SymTensor<f64>, legs: &[Leg]) {
    let (x, sx) = a.to_dense_with_legs(legs).unwrap();
    let (y, sy) = b.to_dense_with_legs(legs).unwrap();
    assert_eq!(sx, sy);
    for (u, v) in x.iter().zip(&y) {
        assert_relative_eq!(*u, *v, epsilon = 1e-10);
    }
}

fn z2xu1_leg(config: &Config, s: i32) -> Leg {
    Leg::new(config.sym(), s, &[0, 0, 1, 1, 0, 1, 1, -1], &[1, 2, 2, 1]).unwrap()
}

#[test]
fn test_broadcast_drops_missing_sectors() {
    let config = Config::new(Symmetry::u1());
    let sym = config.sym().clone();
    let leg = Leg::new(&sym, 1, &[-1, 0, 1], &[1, 2, 3]).unwrap();
    let mut rng = StdRng::seed_from_u64(1);
    let a: SymTensor<f64> = SymTensor::rand_with_rng(&config, &[leg.clone(), leg.conj()], &[0], &mut rng).unwrap();
    let mut d: SymTensor<f64> = SymTensor::new_diag(&config, 1).unwrap();
    d.set_block(&[0, 0], &[2], vec![2.0, 3.0]).unwrap();
    d.set_block(&[1, 1], &[3], vec![-1.0, 0.5, 4.0]).unwrap();

    let b = broadcast(&a, &d, 1, (false, false)).unwrap();
    assert_eq!(b.num_blocks(), 2);
    assert!(matches!(b.block(&[-1, -1]), Err(TensorError::MissingBlock { .. })));
    let x = a.block(&[1, 1]).unwrap();
    let y = b.block(&[1, 1]).unwrap();
    let w = [-1.0, 0.5, 4.0];
    for j in 0..3 {
        for i in 0..3 {
            assert_relative_eq!(y[i + 3 * j], x[i + 3 * j] * w[j]);
        }
    }

    // same as contracting with the non-diagonal form of d
    let dd = d.to_nondiag().unwrap();
    let c = tensordot(&a, &dd, &[1], &[0], (false, false)).unwrap();
    assert_dense_eq(&b, &c, &[leg.clone(), leg.conj()]);
}

#[test]
fn test_contracting_with_identity() {
    let config = Config::new(Symmetry::z2xu1());
    let legs = [z2xu1_leg(&config, 1), z2xu1_leg(&config, -1), z2xu1_leg(&config, 1)];
    let mut rng = StdRng::seed_from_u64(2);
    let a: SymTensor<f64> = SymTensor::randn_with_rng(&config, &legs, &[1, 0], &mut rng).unwrap();
    let eye = SymTensor::<f64>::eye(&config, &legs[1].conj()).unwrap();
    let b = tensordot(&a, &eye, &[1], &[0], (false, false)).unwrap();
    let b = b.move_leg(2, 1).unwrap();
    assert_dense_eq(&a, &b, &legs);
}

fn associativity(config: &Config, seed: u64) {
    let sym = config.sym().clone();
    let leg = if sym.nsym() == 2 {
        z2xu1_leg(config, 1)
    } else {
        Leg::new(&sym, 1, &[0, 1], &[2, 3]).unwrap()
    };
    let n = sym.zero();
    let mut rng = StdRng::seed_from_u64(seed);
    let a: SymTensor<f64> =
        SymTensor::randn_with_rng(config, &[leg.clone(), leg.clone(), leg.conj()], &n, &mut rng).unwrap();
    let b: SymTensor<f64> =
        SymTensor::randn_with_rng(config, &[leg.clone(), leg.conj(), leg.conj()], &n, &mut rng).unwrap();
    let c: SymTensor<f64> = SymTensor::randn_with_rng(config, &[leg.clone(), leg.clone()], &n, &mut rng).unwrap();

    // (A B) C and A (B C) over the bonds a2-b0 and b2-c0
    let ab = tensordot(&a, &b, &[2], &[0], (false, false)).unwrap();
    let left = tensordot(&ab, &c, &[3], &[0], (false, false)).unwrap();
    let bc = tensordot(&b, &c, &[2], &[0], (false, false)).unwrap();
    let right = tensordot(&a, &bc, &[2], &[0], (false, false)).unwrap();
    let out = [leg.clone(), leg.clone(), leg.conj(), leg.clone()];
    assert_dense_eq(&left, &right, &out);

    let net = ncon(&[&a, &b, &c], &[&[-1, -2, 1], &[1, -3, 2], &[2, -4]], &[]).unwrap();
    assert_dense_eq(&left, &net, &out);
}

#[test]
fn test_associativity_z2xu1() {
    associativity(&Config::new(Symmetry::z2xu1()), 3);
}

#[test]
fn test_associativity_fermionic_z2() {
    associativity(&Config::new(Symmetry::fermionic_z2()), 4);
}

#[test]
fn test_policies_backends_and_cache_agree() {
    let base = Config::new(Symmetry::z2xu1());
    let legs = [z2xu1_leg(&base, 1), z2xu1_leg(&base, 1), z2xu1_leg(&base, -1)];
    let mut rng = StdRng::seed_from_u64(5);
    let a: SymTensor<f64> = SymTensor::rand_with_rng(&base, &legs, &[0, 1], &mut rng).unwrap();
    let b: SymTensor<f64> = SymTensor::rand_with_rng(&base, &legs, &[1, 0], &mut rng).unwrap();
    // paired axes must have opposite signatures after conjugation
    assert!(matches!(
        tensordot(&a, &b, &[0], &[2], (true, false)),
        Err(TensorError::SignatureMismatch { .. })
    ));

    let configs = [
        base.clone().with_policy(TensordotPolicy::Merge),
        base.clone().with_policy(TensordotPolicy::Direct),
        base.clone().with_backend(BackendKind::Generic),
        base.clone().without_cache(),
    ];
    let mut results = Vec::new();
    for config in &configs {
        let a = SymTensor::from_parts(config, a.to_parts()).unwrap();
        let b = SymTensor::from_parts(config, b.to_parts()).unwrap();
        let af = a.fuse_legs(&[&[0, 1], &[2]], FusionMode::Hard).unwrap();
        let bf = b.fuse_legs(&[&[0, 1], &[2]], FusionMode::Hard).unwrap();
        let c = tensordot(&af, &bf, &[0], &[0], (true, false)).unwrap();
        results.push(c.to_dense().unwrap());
    }
    for r in &results[1..] {
        assert_eq!(r.1, results[0].1);
        for (x, y) in r.0.iter().zip(&results[0].0) {
            assert_relative_eq!(*x, *y, epsilon = 1e-10);
        }
    }
}

#[test]
fn test_trace_and_vdot_agree() {
    let config = Config::new(Symmetry::u1());
    let sym = config.sym().clone();
    let leg = Leg::new(&sym, 1, &[-1, 0, 1], &[1, 2, 1]).unwrap();
    let mut rng = StdRng::seed_from_u64(6);
    let a: SymTensor<f64> =
        SymTensor::rand_with_rng(&config, &[leg.clone(), leg.conj(), leg.clone()], &[1], &mut rng).unwrap();
    let full = tensordot(&a, &a, &[0, 1, 2], &[0, 1, 2], (true, false)).unwrap();
    let v = vdot(&a, &a, (true, false)).unwrap();
    assert_relative_eq!(full.item().unwrap(), v, epsilon = 1e-12);

    // trace of A^H A over the open pair equals vdot
    let m = tensordot(&a, &a, &[0, 1], &[0, 1], (true, false)).unwrap();
    let t = trace(&m, &[0], &[1]).unwrap();
    assert_relative_eq!(t.item().unwrap(), v, epsilon = 1e-12);
}

#[test]
fn test_apply_mask_then_contract() {
    let config = Config::new(Symmetry::u1());
    let sym = config.sym().clone();
    let leg = Leg::new(&sym, 1, &[0, 1], &[2, 2]).unwrap();
    let a: SymTensor<f64> = SymTensor::ones(&config, &[leg.clone(), leg.conj()], &[0]).unwrap();
    let mut mask: SymTensor<f64> = SymTensor::new_diag(&config, 1).unwrap();
    mask.set_block(&[0, 0], &[2], vec![1.0, 0.0]).unwrap();
    mask.set_block(&[1, 1], &[2], vec![1.0, 1.0]).unwrap();
    let am = apply_mask(&a, &mask, 0).unwrap();
    let c = tensordot(&am, &am, &[1], &[1], (false, true)).unwrap();
    assert_eq!(c.block_shape(&[0, 0]).unwrap(), &[1, 1]);
    assert_eq!(c.block(&[0, 0]).unwrap(), &[2.0]);
    assert_eq!(c.block(&[1, 1]).unwrap(), &[2.0, 2.0, 2.0, 2.0]);
}

#[test]
fn test_swap_gate_commutes_with_leg_order() {
    let config = Config::new(Symmetry::fermionic_z2());
    let sym = config.sym().clone();
    let leg = Leg::new(&sym, 1, &[0, 1], &[1, 2]).unwrap();
    let mut rng = StdRng::seed_from_u64(8);
    let a: SymTensor<f64> = SymTensor::rand_with_rng(&config, &[leg.clone(), leg.clone()], &[1], &mut rng).unwrap();
    let g = swap_gate(&a, &[&[0], &[1]]).unwrap();
    // exactly one of the legs is odd in every block
    for ((_, _, x), (_, _, y)) in a.blocks().zip(g.blocks()) {
        for (u, v) in x.iter().zip(y) {
            assert_eq!(*u, *v);
        }
    }
    let even: SymTensor<f64> = SymTensor::rand_with_rng(&config, &[leg.clone(), leg], &[0], &mut rng).unwrap();
    let ge = swap_gate(&even, &[&[0], &[1]]).unwrap();
    assert_eq!(ge.block(&[1, 1]).unwrap().iter().map(|v| -v).collect::<Vec<_>>(), even.block(&[1, 1]).unwrap());
    assert_eq!(ge.block(&[0, 0]).unwrap(), even.block(&[0, 0]).unwrap());
}
