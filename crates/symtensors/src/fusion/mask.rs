//! Alignment of hard-fused legs whose sector tables differ.
//!
//! Every position of a fused dimension belongs to an *atom*: the tuple of
//! leaf charges it was built from. Two legs with the same fusion tree agree
//! on the relative order of the positions of any atom they share, so
//!
//! * the common support of two legs is the sorted list of positions of the
//!   shared atoms, taken on each side, and
//! * the embedding of a leg into the union of two legs is the sorted list of
//!   union positions belonging to the leg's atoms.
//!
//! Both lists are aligned even when the nested offsets differ between the
//! two legs, which a per-combination range comparison would not guarantee.

use std::collections::{HashMap, HashSet};

use crate::config::Config;
use crate::error::TensorError;
use crate::fusion::HardFusion;
use crate::fusion::hard::SectorTable;
use crate::scalar::Scalar;
use crate::strides::{compute_strides, gather_axis, next_index, scatter_axis};
use crate::structure::merge_tables;
use crate::symmetry::Charge;
use crate::tensor::{OwnedBlock, SymTensor};

/// Positions of one atom inside a fused sector.
#[derive(Clone, Debug)]
pub(crate) struct Atom {
    pub leaves: Vec<i64>,
    pub positions: Vec<usize>,
}

/// Atoms of sector `charge` (dimension `dim`) of a leg with descriptor `hf`.
pub(crate) fn atoms(config: &Config, hf: &HardFusion, charge: &[i64], dim: usize) -> Vec<Atom> {
    if hf.is_leaf() {
        return vec![Atom {
            leaves: charge.to_vec(),
            positions: (0..dim).collect(),
        }];
    }
    let layout = config.fused_leg(hf);
    let Some(sector) = layout.sector(charge) else {
        return vec![];
    };
    let mut out = Vec::new();
    for combo in &sector.combos {
        let child_atoms: Vec<Vec<Atom>> = hf
            .children()
            .iter()
            .zip(&combo.charges)
            .zip(&combo.dims)
            .map(|((child, c), &d)| atoms(config, child, c, d))
            .collect();
        if child_atoms.iter().any(Vec::is_empty) {
            continue;
        }
        let strides = compute_strides(&combo.dims);
        let counts: Vec<usize> = child_atoms.iter().map(Vec::len).collect();
        let mut pick = vec![0usize; counts.len()];
        loop {
            let chosen: Vec<&Atom> = pick
                .iter()
                .zip(&child_atoms)
                .map(|(&i, list)| &list[i])
                .collect();
            let leaves: Vec<i64> = chosen.iter().flat_map(|a| a.leaves.iter().copied()).collect();
            let sizes: Vec<usize> = chosen.iter().map(|a| a.positions.len()).collect();
            let mut positions = Vec::with_capacity(sizes.iter().product());
            let mut p = vec![0usize; sizes.len()];
            loop {
                let mut pos = combo.start;
                for (k, &i) in p.iter().enumerate() {
                    pos += chosen[k].positions[i] * strides[k];
                }
                positions.push(pos);
                if !next_index(&mut p, &sizes) {
                    break;
                }
            }
            out.push(Atom { leaves, positions });
            if !next_index(&mut pick, &counts) {
                break;
            }
        }
    }
    out
}

/// Positions of the common support of two legs in sector `charge`, on each
/// side. Both lists have the same length and are aligned.
pub(crate) fn common_support(
    config: &Config,
    hf_a: &HardFusion,
    dim_a: usize,
    hf_b: &HardFusion,
    dim_b: usize,
    charge: &[i64],
) -> Result<(Vec<usize>, Vec<usize>), TensorError> {
    let atoms_a = atoms(config, hf_a, charge, dim_a);
    let atoms_b = atoms(config, hf_b, charge, dim_b);
    let by_leaves: HashMap<&[i64], &Vec<usize>> = atoms_b
        .iter()
        .map(|a| (a.leaves.as_slice(), &a.positions))
        .collect();
    let mut pos_a = Vec::new();
    let mut pos_b = Vec::new();
    for atom in &atoms_a {
        if let Some(pb) = by_leaves.get(atom.leaves.as_slice()) {
            if pb.len() != atom.positions.len() {
                return Err(TensorError::BondDimensionMismatch {
                    charge: atom.leaves.clone(),
                    dim_a: atom.positions.len(),
                    dim_b: pb.len(),
                });
            }
            pos_a.extend_from_slice(&atom.positions);
            pos_b.extend_from_slice(pb);
        }
    }
    pos_a.sort_unstable();
    pos_b.sort_unstable();
    Ok((pos_a, pos_b))
}

/// Positions of a leg with descriptor `small` inside a leg with descriptor
/// `big` that contains it, for sector `charge`.
pub(crate) fn embedding(
    config: &Config,
    small: &HardFusion,
    dim_small: usize,
    big: &HardFusion,
    dim_big: usize,
    charge: &[i64],
) -> Result<Vec<usize>, TensorError> {
    let own: HashSet<Vec<i64>> = atoms(config, small, charge, dim_small)
        .into_iter()
        .map(|a| a.leaves)
        .collect();
    let mut positions: Vec<usize> = atoms(config, big, charge, dim_big)
        .into_iter()
        .filter(|a| own.contains(&a.leaves))
        .flat_map(|a| a.positions)
        .collect();
    positions.sort_unstable();
    if positions.len() != dim_small {
        return Err(TensorError::BondDimensionMismatch {
            charge: charge.to_vec(),
            dim_a: dim_small,
            dim_b: positions.len(),
        });
    }
    Ok(positions)
}

/// Union of two descriptors with matching trees.
pub(crate) fn union_hard_fusion(
    config: &Config,
    a: &HardFusion,
    b: &HardFusion,
) -> Result<HardFusion, TensorError> {
    combine_hard_fusion(config, a, b, true)
}

/// Intersection of two descriptors with matching trees (up to a global
/// signature flip); the result carries the signatures of `a`.
pub(crate) fn intersect_hard_fusion(
    config: &Config,
    a: &HardFusion,
    b: &HardFusion,
) -> Result<HardFusion, TensorError> {
    combine_hard_fusion(config, a, b, false)
}

fn combine_hard_fusion(
    config: &Config,
    a: &HardFusion,
    b: &HardFusion,
    union: bool,
) -> Result<HardFusion, TensorError> {
    if a.is_leaf() && b.is_leaf() {
        return Ok(HardFusion::leaf());
    }
    if !a.matches(b, 1) && !a.matches(b, -1) {
        return Err(TensorError::fusion_mismatch(format!(
            "legs fused from {:?} and {:?} cannot be combined",
            a.s(),
            b.s()
        )));
    }
    let mut tables = Vec::with_capacity(a.s().len());
    let mut children = Vec::with_capacity(a.s().len());
    for i in 0..a.s().len() {
        let child = combine_hard_fusion(config, &a.children()[i], &b.children()[i], union)?;
        let fused = !child.is_leaf();
        let table: SectorTable = if union {
            merge_tables(&a.tables()[i], &b.tables()[i], fused)?
        } else {
            intersect_tables(&a.tables()[i], &b.tables()[i], fused)?
        };
        let table = if fused {
            let layout = config.fused_leg(&child);
            table
                .into_iter()
                .filter_map(|(c, _)| layout.dim(&c).map(|d| (c, d)))
                .collect()
        } else {
            table
        };
        tables.push(table);
        children.push(child);
    }
    Ok(HardFusion::new(a.s().to_vec(), tables, children))
}

fn intersect_tables(
    a: &[(Charge, usize)],
    b: &[(Charge, usize)],
    fused: bool,
) -> Result<SectorTable, TensorError> {
    let mut out = Vec::new();
    for (c, da) in a {
        if let Ok(j) = b.binary_search_by(|(cb, _)| cb.cmp(c)) {
            let db = b[j].1;
            if da != &db && !fused {
                return Err(TensorError::BondDimensionMismatch {
                    charge: c.to_vec(),
                    dim_a: *da,
                    dim_b: db,
                });
            }
            out.push((c.clone(), *da));
        }
    }
    Ok(out)
}

/// Restrict `axis` of `t` to `positions[charge]`; blocks whose charge has no
/// entry are dropped. The axis takes descriptor `hf`.
pub(crate) fn restrict_axis<T: Scalar>(
    t: &SymTensor<T>,
    axis: usize,
    hf: HardFusion,
    positions: &HashMap<Charge, Vec<usize>>,
) -> Result<SymTensor<T>, TensorError> {
    let mut blocks: Vec<OwnedBlock<T>> = Vec::with_capacity(t.num_blocks());
    for (key, d, x) in t.blocks() {
        let Some(idx) = positions.get(key.charge(axis)) else {
            continue;
        };
        if idx.is_empty() {
            continue;
        }
        let mut shape = d.to_vec();
        shape[axis] = idx.len();
        blocks.push((key.clone(), shape, gather_axis(x, d, axis, idx)));
    }
    let mut hfs = t.hard_fusion().to_vec();
    hfs[axis] = hf;
    SymTensor::assemble(
        t.config(),
        t.s().to_vec(),
        t.n(),
        t.is_diag(),
        t.meta_fusion().to_vec(),
        hfs,
        blocks,
    )
}

/// Zero-extend `axis` of `t` into a leg with descriptor `hf`.
pub(crate) fn embed_axis<T: Scalar>(
    t: &SymTensor<T>,
    axis: usize,
    hf: HardFusion,
) -> Result<SymTensor<T>, TensorError> {
    let config = t.config();
    let own = &t.hard_fusion()[axis];
    let layout = config.fused_leg(&hf);
    let mut cache: HashMap<Charge, (Vec<usize>, usize)> = HashMap::new();
    let mut blocks: Vec<OwnedBlock<T>> = Vec::with_capacity(t.num_blocks());
    for (key, d, x) in t.blocks() {
        let c = key.charge(axis);
        if !cache.contains_key(c) {
            let big = layout.dim(c).ok_or_else(|| {
                TensorError::fusion_mismatch(format!(
                    "charge {:?} is not produced by the union leg",
                    c
                ))
            })?;
            let pos = embedding(config, own, d[axis], &hf, big, c)?;
            cache.insert(c.iter().copied().collect(), (pos, big));
        }
        let (pos, big) = &cache[c];
        let mut shape = d.to_vec();
        shape[axis] = *big;
        blocks.push((key.clone(), shape, scatter_axis(x, d, axis, pos, *big)));
    }
    let mut hfs = t.hard_fusion().to_vec();
    hfs[axis] = hf;
    SymTensor::assemble(
        config,
        t.s().to_vec(),
        t.n(),
        t.is_diag(),
        t.meta_fusion().to_vec(),
        hfs,
        blocks,
    )
}

/// Intersected descriptor and per-charge common positions of two legs.
struct CommonSupport {
    inter: HardFusion,
    pos_a: HashMap<Charge, Vec<usize>>,
    pos_b: HashMap<Charge, Vec<usize>>,
}

/// `None` when the legs need no restriction: both unfused, or identical up
/// to `sign`.
fn plan_common_support(
    config: &Config,
    hf_a: &HardFusion,
    sectors_a: &[(Charge, usize)],
    hf_b: &HardFusion,
    sectors_b: &[(Charge, usize)],
    sign: i32,
) -> Result<Option<CommonSupport>, TensorError> {
    if !hf_a.matches(hf_b, sign) {
        return Err(TensorError::fusion_mismatch(format!(
            "leg fused as {:?} does not match leg fused as {:?}",
            hf_a.s(),
            hf_b.s()
        )));
    }
    let same = if sign == 1 {
        hf_a == hf_b
    } else {
        *hf_a == hf_b.conj()
    };
    if hf_a.is_leaf() || same {
        return Ok(None);
    }
    let inter = intersect_hard_fusion(config, hf_a, hf_b)?;
    let mut pos_a: HashMap<Charge, Vec<usize>> = HashMap::new();
    let mut pos_b: HashMap<Charge, Vec<usize>> = HashMap::new();
    for (c, da) in sectors_a {
        if let Ok(j) = sectors_b.binary_search_by(|(cb, _)| cb.cmp(c)) {
            let (pa, pb) = common_support(config, hf_a, *da, hf_b, sectors_b[j].1, c)?;
            pos_a.insert(c.clone(), pa);
            pos_b.insert(c.clone(), pb);
        }
    }
    Ok(Some(CommonSupport { inter, pos_a, pos_b }))
}

/// Restrict axis `axis_a` of `a` and `axis_b` of `b` to their common support.
///
/// The legs must have matching fusion trees with signatures related by
/// `sign`. Unfused legs and identical descriptors are returned unchanged.
pub(crate) fn align_axes<T: Scalar>(
    a: SymTensor<T>,
    axis_a: usize,
    b: SymTensor<T>,
    axis_b: usize,
    sign: i32,
) -> Result<(SymTensor<T>, SymTensor<T>), TensorError> {
    let config = a.config().clone();
    let plan = plan_common_support(
        &config,
        &a.hard_fusion()[axis_a],
        &a.structure().axis_sectors(axis_a),
        &b.hard_fusion()[axis_b],
        &b.structure().axis_sectors(axis_b),
        sign,
    )?;
    let Some(CommonSupport { inter, pos_a, pos_b }) = plan else {
        return Ok((a, b));
    };
    let inter_b = if sign == 1 { inter.clone() } else { inter.conj() };
    let a = restrict_axis(&a, axis_a, inter, &pos_a)?;
    let b = restrict_axis(&b, axis_b, inter_b, &pos_b)?;
    Ok((a, b))
}

/// Restrict two axes of one tensor, with opposite signatures, to their
/// common support.
pub(crate) fn align_within<T: Scalar>(
    t: SymTensor<T>,
    axis_a: usize,
    axis_b: usize,
) -> Result<SymTensor<T>, TensorError> {
    let config = t.config().clone();
    let plan = plan_common_support(
        &config,
        &t.hard_fusion()[axis_a],
        &t.structure().axis_sectors(axis_a),
        &t.hard_fusion()[axis_b],
        &t.structure().axis_sectors(axis_b),
        -1,
    )?;
    let Some(CommonSupport { inter, pos_a, pos_b }) = plan else {
        return Ok(t);
    };
    let inter_b = inter.conj();
    let t = restrict_axis(&t, axis_a, inter, &pos_a)?;
    restrict_axis(&t, axis_b, inter_b, &pos_b)
}
