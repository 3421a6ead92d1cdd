//! Leg descriptors.
//!
//! A [`Leg`] describes one axis independently of any tensor: its signature,
//! its sorted `(charge, dim)` table and, for a hard-fused axis, the fusion
//! descriptor. Legs declare new tensors and are the unit of leg unions.

use crate::config::Config;
use crate::error::TensorError;
use crate::fusion::{HardFusion, SectorTable};
use crate::symmetry::{Charge, Symmetry};

/// Detached description of one native axis.
///
/// # Example
///
/// ```
/// use symtensors::structure::Leg;
/// use symtensors::symmetry::Symmetry;
///
/// let sym = Symmetry::u1();
/// let leg = Leg::new(&sym, 1, &[-1, 0, 1], &[1, 2, 3]).unwrap();
/// assert_eq!(leg.total_dim(), 6);
/// assert_eq!(leg.dim(&[0]), Some(2));
/// assert_eq!(leg.conj().s(), -1);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Leg {
    s: i32,
    sectors: SectorTable,
    hf: HardFusion,
}

impl Leg {
    /// Create an unfused leg from flat charges (`dims.len() * nsym` entries)
    /// and one dimension per charge.
    ///
    /// Charges are reduced and sorted; a charge listed twice with different
    /// dimensions is `InconsistentBlocks`.
    pub fn new(sym: &Symmetry, s: i32, charges: &[i64], dims: &[usize]) -> Result<Self, TensorError> {
        let nsym = sym.nsym();
        if charges.len() != dims.len() * nsym {
            return Err(TensorError::WrongNumberOfIndices {
                expected: dims.len() * nsym,
                actual: charges.len(),
            });
        }
        if s != 1 && s != -1 {
            return Err(TensorError::inconsistent(format!(
                "leg signature must be +1 or -1, got {}",
                s
            )));
        }
        let mut sectors: SectorTable = dims
            .iter()
            .enumerate()
            .map(|(i, &d)| (sym.reduce(&charges[i * nsym..(i + 1) * nsym]), d))
            .collect();
        sectors.sort();
        sectors.dedup();
        check_table(&sectors)?;
        Ok(Self {
            s,
            sectors,
            hf: HardFusion::leaf(),
        })
    }

    /// Assemble a leg from parts already in canonical form.
    pub(crate) fn from_parts(s: i32, mut sectors: SectorTable, hf: HardFusion) -> Self {
        sectors.sort();
        sectors.dedup();
        Self { s, sectors, hf }
    }

    /// Signature.
    #[inline]
    pub fn s(&self) -> i32 {
        self.s
    }

    /// Sorted `(charge, dim)` table.
    #[inline]
    pub fn sectors(&self) -> &[(Charge, usize)] {
        &self.sectors
    }

    /// Hard-fusion descriptor of the leg.
    #[inline]
    pub fn hard_fusion(&self) -> &HardFusion {
        &self.hf
    }

    /// Whether the leg is hard-fused.
    pub fn is_fused(&self) -> bool {
        !self.hf.is_leaf()
    }

    /// Dimension of a charge sector, if present.
    pub fn dim(&self, charge: &[i64]) -> Option<usize> {
        self.sectors
            .binary_search_by(|(c, _)| c.as_slice().cmp(charge))
            .ok()
            .map(|i| self.sectors[i].1)
    }

    /// Sum of all sector dimensions.
    pub fn total_dim(&self) -> usize {
        self.sectors.iter().map(|(_, d)| d).sum()
    }

    /// The same leg with reversed signature.
    pub fn conj(&self) -> Self {
        Self {
            s: -self.s,
            sectors: self.sectors.clone(),
            hf: self.hf.conj(),
        }
    }

    /// Union of two legs describing the same axis.
    ///
    /// Signatures must agree and shared charges must have equal dimensions.
    /// For hard-fused legs the fusion trees must match; the union is taken
    /// recursively on the fused sub-legs.
    pub fn union(&self, other: &Leg, config: &Config) -> Result<Leg, TensorError> {
        if self.s != other.s {
            return Err(TensorError::SignatureMismatch {
                axis_a: 0,
                axis_b: 0,
                s_a: self.s,
                s_b: other.s,
            });
        }
        let hf = crate::fusion::union_hard_fusion(config, &self.hf, &other.hf)?;
        let merged = merge_tables(&self.sectors, &other.sectors, !hf.is_leaf())?;
        let sectors = if hf.is_leaf() {
            merged
        } else {
            let layout = config.fused_leg(&hf);
            merged
                .into_iter()
                .map(|(c, _)| {
                    let d = layout.dim(&c).unwrap_or(0);
                    (c, d)
                })
                .collect()
        };
        Ok(Leg::from_parts(self.s, sectors, hf))
    }
}

fn check_table(table: &[(Charge, usize)]) -> Result<(), TensorError> {
    for w in table.windows(2) {
        if w[0].0 == w[1].0 {
            return Err(TensorError::inconsistent(format!(
                "charge {:?} declared with dimensions {} and {}",
                w[0].0.as_slice(),
                w[0].1,
                w[1].1
            )));
        }
    }
    Ok(())
}

/// Sorted union of two sector tables. When `fused`, dimensions of shared
/// charges may differ (they are recomputed from the union layout).
pub(crate) fn merge_tables(
    a: &[(Charge, usize)],
    b: &[(Charge, usize)],
    fused: bool,
) -> Result<SectorTable, TensorError> {
    let mut out: SectorTable = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() || j < b.len() {
        let take_a = j >= b.len() || (i < a.len() && a[i].0 < b[j].0);
        let take_b = i >= a.len() || (j < b.len() && b[j].0 < a[i].0);
        if take_a {
            out.push(a[i].clone());
            i += 1;
        } else if take_b {
            out.push(b[j].clone());
            j += 1;
        } else {
            if a[i].1 != b[j].1 && !fused {
                return Err(TensorError::BondDimensionMismatch {
                    charge: a[i].0.to_vec(),
                    dim_a: a[i].1,
                    dim_b: b[j].1,
                });
            }
            out.push(a[i].clone());
            i += 1;
            j += 1;
        }
    }
    Ok(out)
}
