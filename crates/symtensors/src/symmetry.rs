//! Abelian symmetries and their charge fusion rules.
//!
//! A symmetry is a direct product of abelian factors, each either U(1)
//! (integer charges) or Z_n (charges modulo `n`). A charge is a tuple with
//! one integer per factor, so the trivial symmetry has charges of length 0.
//!
//! # Example
//!
//! ```
//! use symtensors::symmetry::Symmetry;
//!
//! let sym = Symmetry::z2xu1();
//! // (1, 2) fused with (1, -1) under signature (+1, +1)
//! let c = sym.fuse(&[1, 2, 1, -1], &[1, 1]);
//! assert_eq!(c.as_slice(), &[0, 1]);
//! ```

use smallvec::SmallVec;
use std::fmt;

/// A charge tuple, one entry per symmetry factor.
pub type Charge = SmallVec<[i64; 4]>;

/// One abelian factor of a symmetry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Group {
    /// U(1): integer charges under addition.
    U1,
    /// Z_n: charges modulo `n`.
    Zn(i64),
}

impl Group {
    /// Bring a charge of this factor into canonical form.
    #[inline]
    pub fn reduce(self, c: i64) -> i64 {
        match self {
            Group::U1 => c,
            Group::Zn(n) => c.rem_euclid(n),
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Group::U1 => write!(f, "U1"),
            Group::Zn(n) => write!(f, "Z{}", n),
        }
    }
}

/// A direct product of abelian groups, with fermionic flags per factor.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Symmetry {
    groups: Vec<Group>,
    fermionic: Vec<bool>,
}

impl Symmetry {
    /// Build a product symmetry. `fermionic[i]` marks factors whose charge
    /// parity contributes to fermionic signs.
    ///
    /// # Panics
    ///
    /// Panics if the lengths differ or a Z_n factor has `n < 1`.
    pub fn product(groups: Vec<Group>, fermionic: Vec<bool>) -> Self {
        assert_eq!(
            groups.len(),
            fermionic.len(),
            "one fermionic flag per symmetry factor"
        );
        for g in &groups {
            if let Group::Zn(n) = g {
                assert!(*n >= 1, "Z_n requires n >= 1");
            }
        }
        Self { groups, fermionic }
    }

    /// No symmetry: a single block per tensor.
    pub fn none() -> Self {
        Self::product(vec![], vec![])
    }

    /// U(1) symmetry.
    pub fn u1() -> Self {
        Self::product(vec![Group::U1], vec![false])
    }

    /// Z2 symmetry.
    pub fn z2() -> Self {
        Self::zn(2)
    }

    /// Z_n symmetry.
    pub fn zn(n: i64) -> Self {
        Self::product(vec![Group::Zn(n)], vec![false])
    }

    /// Z2 x U(1) symmetry.
    pub fn z2xu1() -> Self {
        Self::product(vec![Group::Zn(2), Group::U1], vec![false, false])
    }

    /// U(1) x U(1) symmetry.
    pub fn u1xu1() -> Self {
        Self::product(vec![Group::U1, Group::U1], vec![false, false])
    }

    /// Fermionic Z2 (parity) symmetry.
    pub fn fermionic_z2() -> Self {
        Self::product(vec![Group::Zn(2)], vec![true])
    }

    /// Fermionic U(1) (particle number) symmetry.
    pub fn fermionic_u1() -> Self {
        Self::product(vec![Group::U1], vec![true])
    }

    /// Spinful fermions: U(1) x U(1), both factors fermionic.
    pub fn fermionic_u1xu1() -> Self {
        Self::product(vec![Group::U1, Group::U1], vec![true, true])
    }

    /// Number of factors (length of a charge).
    #[inline]
    pub fn nsym(&self) -> usize {
        self.groups.len()
    }

    /// The factors of this symmetry.
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// Fermionic flags, one per factor.
    pub fn fermionic(&self) -> &[bool] {
        &self.fermionic
    }

    /// Whether any factor is fermionic.
    pub fn is_fermionic(&self) -> bool {
        self.fermionic.iter().any(|&f| f)
    }

    /// Identity charge.
    pub fn zero(&self) -> Charge {
        SmallVec::from_elem(0, self.nsym())
    }

    /// Canonical representative of a charge.
    pub fn reduce(&self, c: &[i64]) -> Charge {
        debug_assert_eq!(c.len(), self.nsym());
        self.groups
            .iter()
            .zip(c.iter())
            .map(|(g, &x)| g.reduce(x))
            .collect()
    }

    /// Additive inverse.
    pub fn negate(&self, c: &[i64]) -> Charge {
        self.groups
            .iter()
            .zip(c.iter())
            .map(|(g, &x)| g.reduce(-x))
            .collect()
    }

    /// Fuse a flat list of charges with one sign per charge: `Σ_i s_i c_i`.
    ///
    /// `charges` holds `signs.len()` consecutive charges of length `nsym`.
    pub fn fuse(&self, charges: &[i64], signs: &[i32]) -> Charge {
        let nsym = self.nsym();
        debug_assert_eq!(charges.len(), nsym * signs.len());
        let mut out: Charge = SmallVec::from_elem(0, nsym);
        for (i, &s) in signs.iter().enumerate() {
            for k in 0..nsym {
                out[k] += s as i64 * charges[i * nsym + k];
            }
        }
        for (k, g) in self.groups.iter().enumerate() {
            out[k] = g.reduce(out[k]);
        }
        out
    }

    /// Fuse two charges: `sa * a + sb * b`.
    pub fn fuse_pair(&self, a: &[i64], sa: i32, b: &[i64], sb: i32) -> Charge {
        self.groups
            .iter()
            .enumerate()
            .map(|(k, g)| g.reduce(sa as i64 * a[k] + sb as i64 * b[k]))
            .collect()
    }

    /// Fermionic parity (0 or 1) of a charge: the sum of its fermionic
    /// components modulo 2.
    pub fn parity(&self, c: &[i64]) -> i64 {
        self.fermionic
            .iter()
            .zip(c.iter())
            .filter(|(f, _)| **f)
            .map(|(_, &x)| x)
            .sum::<i64>()
            .rem_euclid(2)
    }

    /// Per-factor parities, used when several fermionic species coexist.
    pub fn parities(&self, c: &[i64]) -> SmallVec<[i64; 4]> {
        self.fermionic
            .iter()
            .zip(c.iter())
            .filter(|(f, _)| **f)
            .map(|(_, &x)| x.rem_euclid(2))
            .collect()
    }
}

impl fmt::Display for Symmetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.groups.is_empty() {
            return write!(f, "none");
        }
        for (i, (g, fer)) in self.groups.iter().zip(&self.fermionic).enumerate() {
            if i > 0 {
                write!(f, "x")?;
            }
            write!(f, "{}", g)?;
            if *fer {
                write!(f, "(f)")?;
            }
        }
        Ok(())
    }
}
