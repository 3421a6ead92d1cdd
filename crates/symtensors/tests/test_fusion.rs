//! Integration tests for meta and hard fusion, including contraction of
//! hard-fused legs built from different sector tables.

use approx::assert_relative_eq;
use rand::SeedableRng;
use rand::rngs::StdRng;
use symtensors::{Config, FusionMode, Leg, SymTensor, Symmetry, TensorError, add, tensordot, trace, vdot};

fn assert_dense_eq(a: &SymTensor<f64>, b: &SymTensor<f64>, legs: &[Leg]) {
    let (x, sx) = a.to_dense_with_legs(legs).unwrap();
    let (y, sy) = b.to_dense_with_legs(legs).unwrap();
    assert_eq!(sx, sy);
    for (u, v) in x.iter().zip(&y) {
        assert_relative_eq!(*u, *v, epsilon = 1e-10);
    }
}

struct Legs {
    small: Leg,
    big: Leg,
    y: Leg,
    z: Leg,
}

fn legs(config: &Config) -> Legs {
    let sym = config.sym();
    Legs {
        small: Leg::new(sym, 1, &[0, 1], &[1, 2]).unwrap(),
        big: Leg::new(sym, 1, &[0, 1, 2], &[1, 2, 1]).unwrap(),
        y: Leg::new(sym, 1, &[-4, -3, -2, -1, 0, 1, 2], &[1, 1, 1, 1, 2, 1, 1]).unwrap(),
        z: Leg::new(sym, 1, &[-1, 0, 1, 2, 3, 4], &[1, 1, 2, 2, 1, 1]).unwrap(),
    }
}

#[test]
fn test_hard_fused_contraction_over_different_tables() {
    let config = Config::new(Symmetry::u1());
    let l = legs(&config);
    let mut rng = StdRng::seed_from_u64(21);
    let a: SymTensor<f64> =
        SymTensor::randn_with_rng(&config, &[l.small.clone(), l.small.clone(), l.y.clone()], &[0], &mut rng)
            .unwrap();
    let b: SymTensor<f64> =
        SymTensor::randn_with_rng(&config, &[l.big.conj(), l.big.conj(), l.z.clone()], &[0], &mut rng).unwrap();

    let expected = tensordot(&a, &b, &[0, 1], &[0, 1], (false, false)).unwrap();

    let af = a.fuse_legs(&[&[0, 1], &[2]], FusionMode::Hard).unwrap();
    let bf = b.fuse_legs(&[&[0, 1], &[2]], FusionMode::Hard).unwrap();
    assert_eq!(af.leg(0).total_dim(), 9);
    assert_eq!(bf.leg(0).total_dim(), 16);
    let c = tensordot(&af, &bf, &[0], &[0], (false, false)).unwrap();
    c.is_consistent().unwrap();
    assert_dense_eq(&c, &expected, &[l.y.clone(), l.z.clone()]);
}

#[test]
fn test_meta_fused_contraction_matches_unfused() {
    let config = Config::new(Symmetry::u1());
    let l = legs(&config);
    let mut rng = StdRng::seed_from_u64(22);
    let a: SymTensor<f64> =
        SymTensor::randn_with_rng(&config, &[l.y.clone(), l.small.clone(), l.small.clone()], &[1], &mut rng)
            .unwrap();
    let b: SymTensor<f64> =
        SymTensor::randn_with_rng(&config, &[l.small.conj(), l.small.conj(), l.z.clone()], &[-1], &mut rng)
            .unwrap();
    let expected = tensordot(&a, &b, &[1, 2], &[0, 1], (false, false)).unwrap();

    let am = a.fuse_legs(&[&[0], &[1, 2]], FusionMode::Meta).unwrap();
    let bm = b.fuse_legs(&[&[0, 1], &[2]], FusionMode::Meta).unwrap();
    assert_eq!(am.ndim_native(), 3);
    let c = tensordot(&am, &bm, &[1], &[0], (false, false)).unwrap();
    assert_eq!(c.ndim(), 2);
    assert_dense_eq(&c, &expected, &[l.y.clone(), l.z.clone()]);

    // the meta trees of paired axes must agree
    let flat = b.fuse_legs(&[&[0], &[1], &[2]], FusionMode::Meta).unwrap();
    assert!(matches!(
        tensordot(&am, &flat, &[1], &[0], (false, false)),
        Err(TensorError::FusionTreeMismatch { .. })
    ));
}

#[test]
fn test_fused_leg_union() {
    let config = Config::new(Symmetry::u1());
    let l = legs(&config);
    let a: SymTensor<f64> =
        SymTensor::ones(&config, &[l.small.clone(), l.small.clone(), l.y.clone()], &[0]).unwrap();
    let b: SymTensor<f64> = SymTensor::ones(&config, &[l.big.clone(), l.big.clone(), l.y.clone()], &[0]).unwrap();
    let af = a.fuse_legs(&[&[0, 1], &[2]], FusionMode::Hard).unwrap();
    let bf = b.fuse_legs(&[&[0, 1], &[2]], FusionMode::Hard).unwrap();

    let u = af.leg(0).union(&bf.leg(0), &config).unwrap();
    assert_eq!(u.total_dim(), 16);
    assert_eq!(u.dim(&[1]), Some(4));
    assert!(u.is_fused());
    assert!(matches!(
        af.leg(0).union(&bf.leg(0).conj(), &config),
        Err(TensorError::SignatureMismatch { .. })
    ));

    // adding embeds both operands into the union layout
    let c = add(&af, &bf).unwrap();
    c.is_consistent().unwrap();
    assert_eq!(c.leg(0).total_dim(), 16);
    let back = c.unfuse_legs(&[0]).unwrap();
    let expected = add(&a, &b).unwrap();
    assert_dense_eq(&back, &expected, &[l.big.clone(), l.big.clone(), l.y.clone()]);
}

#[test]
fn test_fusion_with_and_without_cache() {
    let cached = Config::new(Symmetry::z2xu1());
    let uncached = cached.clone().without_cache();
    let leg = Leg::new(cached.sym(), 1, &[0, 0, 1, 1, 0, 1, 1, -1], &[1, 2, 2, 1]).unwrap();
    let mut rng = StdRng::seed_from_u64(23);
    let a: SymTensor<f64> =
        SymTensor::rand_with_rng(&cached, &[leg.clone(), leg.conj(), leg.clone(), leg.conj()], &[1, 0], &mut rng)
            .unwrap();
    let b = SymTensor::from_parts(&uncached, a.to_parts()).unwrap();

    let fa = a.fuse_legs(&[&[0, 3], &[1, 2]], FusionMode::Hard).unwrap();
    let fb = b.fuse_legs(&[&[0, 3], &[1, 2]], FusionMode::Hard).unwrap();
    assert_eq!(fa.structure(), fb.structure());
    assert_eq!(fa.data(), fb.data());
    assert!(cached.cache().is_some_and(|c| !c.is_empty()));
    assert!(uncached.cache().is_none());

    let back = fa.unfuse_legs(&[0, 1]).unwrap().transpose(&[0, 2, 3, 1]).unwrap();
    assert_eq!(back.structure(), a.structure());
    assert_eq!(back.data(), a.data());
}

#[test]
fn test_flip_and_conj_commute_with_hard_fusion() {
    let config = Config::new(Symmetry::u1());
    let l = legs(&config);
    let mut rng = StdRng::seed_from_u64(24);
    let a: SymTensor<f64> = SymTensor::randn_with_rng(
        &config,
        &[l.small.clone(), l.small.clone(), l.big.clone(), l.y.clone()],
        &[0],
        &mut rng,
    )
    .unwrap();
    let f = a.fuse_legs(&[&[0, 1], &[2], &[3]], FusionMode::Hard).unwrap();
    let ff = f.fuse_legs(&[&[0, 1], &[2]], FusionMode::Hard).unwrap();

    let flipped = f.flip_signature().unwrap();
    flipped.is_consistent().unwrap();
    let back = flipped.unfuse_legs(&[0]).unwrap();
    let expected = a.flip_signature().unwrap();
    assert_eq!(back.structure(), expected.structure());
    assert_eq!(back.data(), expected.data());

    // nested fusions are reordered at every level
    let back = ff.flip_signature().unwrap().unfuse_legs(&[0]).unwrap().unfuse_legs(&[0]).unwrap();
    assert_eq!(back.structure(), expected.structure());
    assert_eq!(back.data(), expected.data());

    let back = ff.conj().unfuse_legs(&[0]).unwrap().unfuse_legs(&[0]).unwrap();
    let expected = a.conj();
    assert_eq!(back.structure(), expected.structure());
    assert_eq!(back.data(), expected.data());

    // flipping twice is the identity, also on fused legs
    let twice = ff.flip_signature().unwrap().flip_signature().unwrap();
    assert_eq!(twice.structure(), ff.structure());
    assert_eq!(twice.data(), ff.data());
}

#[test]
fn test_zero_blocks_survive_hard_fusion_round_trip() {
    let config = Config::new(Symmetry::u1());
    let l = legs(&config);
    let mut rng = StdRng::seed_from_u64(25);
    let mut a: SymTensor<f64> =
        SymTensor::randn_with_rng(&config, &[l.small.clone(), l.small.clone(), l.y.clone()], &[0], &mut rng)
            .unwrap();
    a.set_block(&[1, 0, -1], &[2, 1, 1], vec![0.0; 2]).unwrap();
    a.set_block(&[0, 0, 0], &[1, 1, 2], vec![0.0; 2]).unwrap();
    let blocks = a.num_blocks();

    let f = a.fuse_legs(&[&[0, 1], &[2]], FusionMode::Hard).unwrap();
    let back = f.unfuse_legs(&[0]).unwrap();
    assert_eq!(back.num_blocks(), blocks);
    assert_eq!(back.structure(), a.structure());
    assert_eq!(back.data(), a.data());
}

#[test]
fn test_vdot_and_trace_over_different_tables() {
    let config = Config::new(Symmetry::u1());
    let l = legs(&config);
    let mut rng = StdRng::seed_from_u64(26);
    let a: SymTensor<f64> =
        SymTensor::randn_with_rng(&config, &[l.small.clone(), l.small.clone(), l.y.clone()], &[0], &mut rng)
            .unwrap();
    let b: SymTensor<f64> =
        SymTensor::randn_with_rng(&config, &[l.big.clone(), l.big.clone(), l.y.clone()], &[0], &mut rng).unwrap();
    let expected = vdot(&a, &b, (true, false)).unwrap();
    let af = a.fuse_legs(&[&[0, 1], &[2]], FusionMode::Hard).unwrap();
    let bf = b.fuse_legs(&[&[0, 1], &[2]], FusionMode::Hard).unwrap();
    assert_ne!(af.leg(0).total_dim(), bf.leg(0).total_dim());
    assert_relative_eq!(vdot(&af, &bf, (true, false)).unwrap(), expected, epsilon = 1e-10);
    assert_relative_eq!(vdot(&bf, &af, (true, false)).unwrap(), expected, epsilon = 1e-10);

    let t: SymTensor<f64> = SymTensor::randn_with_rng(
        &config,
        &[l.small.clone(), l.small.clone(), l.big.conj(), l.big.conj()],
        &[0],
        &mut rng,
    )
    .unwrap();
    let expected = trace(&t, &[0, 1], &[2, 3]).unwrap();
    let tf = t.fuse_legs(&[&[0, 1], &[2, 3]], FusionMode::Hard).unwrap();
    let got = trace(&tf, &[0], &[1]).unwrap();
    assert_eq!(got.ndim(), 0);
    let sum = |x: &SymTensor<f64>| x.data().iter().sum::<f64>();
    assert!(sum(&expected) != 0.0);
    assert_relative_eq!(sum(&got), sum(&expected), epsilon = 1e-10);
}
