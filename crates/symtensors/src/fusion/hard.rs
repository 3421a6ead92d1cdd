//! Hard-fusion descriptors and fused-leg layouts.
//!
//! A hard fusion physically merges a group of native axes into one. The
//! descriptor kept on the fused axis records what is needed to split it
//! again: the signatures of the merged axes, their `(charge, dim)` tables,
//! and their own descriptors (for nested fusions).
//!
//! From a descriptor, [`HardFusion::layout`] derives the [`FusedLeg`]: for
//! each fused charge, the combinations of child charges that map into it,
//! each with its sub-range of the fused dimension. Combinations are listed
//! in lexicographic order of child charges, so splitting is a table lookup.

use std::collections::BTreeMap;

use crate::symmetry::{Charge, Symmetry};

/// Sorted `(charge, dim)` table of one leg.
pub type SectorTable = Vec<(Charge, usize)>;

/// Recombination metadata of a native axis.
///
/// An unfused axis carries [`HardFusion::leaf`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct HardFusion {
    s: Vec<i32>,
    tables: Vec<SectorTable>,
    children: Vec<HardFusion>,
}

impl HardFusion {
    /// Descriptor of an unfused axis.
    pub fn leaf() -> Self {
        Self::default()
    }

    /// Descriptor of an axis fused from legs with signatures `s`, sector
    /// tables `tables` and descriptors `children`.
    ///
    /// # Panics
    ///
    /// Panics if the three lists differ in length or are empty.
    pub fn new(s: Vec<i32>, mut tables: Vec<SectorTable>, children: Vec<HardFusion>) -> Self {
        assert!(!s.is_empty(), "hard fusion needs at least one leg");
        assert_eq!(s.len(), tables.len(), "one sector table per fused leg");
        assert_eq!(s.len(), children.len(), "one descriptor per fused leg");
        for t in tables.iter_mut() {
            t.sort();
            t.dedup();
        }
        Self {
            s,
            tables,
            children,
        }
    }

    /// Whether this axis is unfused.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.s.is_empty()
    }

    /// Signatures of the fused legs.
    #[inline]
    pub fn s(&self) -> &[i32] {
        &self.s
    }

    /// Sector tables of the fused legs.
    #[inline]
    pub fn tables(&self) -> &[SectorTable] {
        &self.tables
    }

    /// Descriptors of the fused legs.
    #[inline]
    pub fn children(&self) -> &[HardFusion] {
        &self.children
    }

    /// Number of unfused legs at the bottom of the tree.
    pub fn num_leaves(&self) -> usize {
        if self.is_leaf() {
            1
        } else {
            self.children.iter().map(HardFusion::num_leaves).sum()
        }
    }

    /// Reordering of the fused sector `charge` under
    /// [`flip_charges`](Self::flip_charges): position `i` of the flipped
    /// sector `-charge` holds position `perm[i]` of the original one.
    ///
    /// Flipping negates every child charge, which reverses the lexicographic
    /// order of the combinations and, for nested fusions, of their inner
    /// slabs. Empty if `charge` is not a fused sector.
    pub(crate) fn flip_permutation(&self, sym: &Symmetry, charge: &[i64]) -> Vec<usize> {
        let before = self.layout(sym);
        let after = self.flip_charges(sym).layout(sym);
        let (Some(old), Some(new)) = (before.sector(charge), after.sector(&sym.negate(charge))) else {
            return vec![];
        };
        let mut perm = vec![0; new.dim];
        for combo in &new.combos {
            let charges: Vec<Charge> = combo.charges.iter().map(|c| sym.negate(c)).collect();
            let Some(prev) = old.combo(&charges) else {
                continue;
            };
            let inner: Vec<Vec<usize>> = self
                .children
                .iter()
                .zip(&charges)
                .zip(&combo.dims)
                .map(|((h, c), &d)| {
                    let p = if h.is_leaf() { vec![] } else { h.flip_permutation(sym, c) };
                    if p.len() == d { p } else { (0..d).collect() }
                })
                .collect();
            // slabs are column-major over the child dimensions
            for j in 0..combo.size {
                let (mut rest, mut stride, mut src) = (j, 1, prev.start);
                for (p, &d) in inner.iter().zip(&combo.dims) {
                    src += p[rest % d] * stride;
                    rest /= d;
                    stride *= d;
                }
                perm[combo.start + j] = src;
            }
        }
        perm
    }

    /// Descriptor after conjugation: every signature is reversed.
    pub fn conj(&self) -> Self {
        Self {
            s: self.s.iter().map(|x| -x).collect(),
            tables: self.tables.clone(),
            children: self.children.iter().map(HardFusion::conj).collect(),
        }
    }

    /// Descriptor after reversing signatures and negating all charges.
    pub fn flip_charges(&self, sym: &Symmetry) -> Self {
        Self {
            s: self.s.iter().map(|x| -x).collect(),
            tables: self
                .tables
                .iter()
                .map(|t| {
                    let mut t: SectorTable =
                        t.iter().map(|(c, d)| (sym.negate(c), *d)).collect();
                    t.sort();
                    t
                })
                .collect(),
            children: self
                .children
                .iter()
                .map(|c| c.flip_charges(sym))
                .collect(),
        }
    }

    /// Whether `other` has the same nesting, with signatures equal up to the
    /// overall factor `sign`.
    pub fn matches(&self, other: &Self, sign: i32) -> bool {
        self.s.len() == other.s.len()
            && self.s.iter().zip(&other.s).all(|(a, b)| *a == sign * *b)
            && self
                .children
                .iter()
                .zip(&other.children)
                .all(|(a, b)| a.matches(b, sign))
    }

    /// Compute the fused-leg layout. The fused signature is the signature of
    /// the first leg; the fused charge of a combination is
    /// `s_f * Σ_i s_i c_i`.
    pub fn layout(&self, sym: &Symmetry) -> FusedLeg {
        if self.is_leaf() {
            return FusedLeg { sectors: vec![] };
        }
        let sf = self.s[0];
        let signs: Vec<i32> = self.s.iter().map(|&x| x * sf).collect();
        let k = self.s.len();
        let mut groups: BTreeMap<Charge, Vec<FusionCombo>> = BTreeMap::new();

        if self.tables.iter().all(|t| !t.is_empty()) {
            let mut idx = vec![0usize; k];
            let mut flat: Vec<i64> = Vec::with_capacity(k * sym.nsym());
            loop {
                flat.clear();
                let mut charges = Vec::with_capacity(k);
                let mut dims = Vec::with_capacity(k);
                for (i, &j) in idx.iter().enumerate() {
                    let (c, d) = &self.tables[i][j];
                    flat.extend_from_slice(c);
                    charges.push(c.clone());
                    dims.push(*d);
                }
                let t = sym.fuse(&flat, &signs);
                let size = dims.iter().product();
                groups.entry(t).or_default().push(FusionCombo {
                    charges,
                    dims,
                    start: 0,
                    size,
                });

                // last leg runs fastest: lexicographic order of child charges
                let mut axis = k;
                let done = loop {
                    if axis == 0 {
                        break true;
                    }
                    axis -= 1;
                    idx[axis] += 1;
                    if idx[axis] < self.tables[axis].len() {
                        break false;
                    }
                    idx[axis] = 0;
                };
                if done {
                    break;
                }
            }
        }

        let sectors = groups
            .into_iter()
            .map(|(charge, mut combos)| {
                let mut start = 0;
                for c in combos.iter_mut() {
                    c.start = start;
                    start += c.size;
                }
                FusedSector {
                    charge,
                    dim: start,
                    combos,
                }
            })
            .collect();
        FusedLeg { sectors }
    }
}

/// One combination of child charges inside a fused sector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FusionCombo {
    /// Charge of each fused leg.
    pub charges: Vec<Charge>,
    /// Dimension of each fused leg.
    pub dims: Vec<usize>,
    /// Offset of this combination in the fused dimension.
    pub start: usize,
    /// Product of `dims`.
    pub size: usize,
}

/// All combinations fusing into one charge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FusedSector {
    pub charge: Charge,
    /// Sum of the combination sizes.
    pub dim: usize,
    pub combos: Vec<FusionCombo>,
}

impl FusedSector {
    /// Look up the combination with the given child charges.
    pub fn combo(&self, charges: &[Charge]) -> Option<&FusionCombo> {
        self.combos
            .binary_search_by(|c| c.charges.as_slice().cmp(charges))
            .ok()
            .map(|i| &self.combos[i])
    }
}

/// Layout of a hard-fused leg: sectors sorted by fused charge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FusedLeg {
    sectors: Vec<FusedSector>,
}

impl FusedLeg {
    pub fn sectors(&self) -> &[FusedSector] {
        &self.sectors
    }

    pub fn sector(&self, charge: &[i64]) -> Option<&FusedSector> {
        self.sectors
            .binary_search_by(|s| s.charge.as_slice().cmp(charge))
            .ok()
            .map(|i| &self.sectors[i])
    }

    /// Fused dimension of a charge, if present.
    pub fn dim(&self, charge: &[i64]) -> Option<usize> {
        self.sector(charge).map(|s| s.dim)
    }
}
