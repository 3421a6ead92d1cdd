//! Charge-sector keys identifying blocks.
//!
//! A [`BlockKey`] is the flat concatenation of one charge per native axis.
//! Keys are ordered lexicographically, which is the canonical block order of
//! a [`Structure`](super::Structure).

use smallvec::SmallVec;
use std::hash::{Hash, Hasher};

/// A block key with precomputed hash.
///
/// Stores `ndim * nsym` charges in a `SmallVec<[i64; 8]>`, so typical keys
/// (rank <= 4 with two symmetry factors) live on the stack.
///
/// # Example
/// ```
/// use symtensors::structure::BlockKey;
///
/// // rank-3 key under a single U(1)
/// let key = BlockKey::new(&[1, -1, 0], 3);
/// assert_eq!(key.ndim(), 3);
/// assert_eq!(key.nsym(), 1);
/// assert_eq!(key.charge(1), &[-1]);
/// ```
#[derive(Clone, Debug)]
pub struct BlockKey {
    charges: SmallVec<[i64; 8]>,
    ndim: usize,
    hash: u64,
}

impl BlockKey {
    /// Create a key from flat charges for a tensor with `ndim` native axes.
    ///
    /// # Panics
    ///
    /// Panics if `charges.len()` is not a multiple of `ndim`.
    pub fn new(charges: &[i64], ndim: usize) -> Self {
        Self::collect_from(charges.iter().copied(), ndim)
    }

    /// Create a key by collecting charges from an iterator.
    pub fn collect_from<I: IntoIterator<Item = i64>>(iter: I, ndim: usize) -> Self {
        let charges: SmallVec<[i64; 8]> = iter.into_iter().collect();
        assert!(
            (ndim == 0 && charges.is_empty()) || (ndim > 0 && charges.len() % ndim == 0),
            "key length {} is not a multiple of ndim {}",
            charges.len(),
            ndim
        );
        let hash = compute_hash(&charges, ndim);
        Self {
            charges,
            ndim,
            hash,
        }
    }

    /// Number of native axes.
    #[inline]
    pub fn ndim(&self) -> usize {
        self.ndim
    }

    /// Number of symmetry factors per charge.
    #[inline]
    pub fn nsym(&self) -> usize {
        if self.ndim == 0 {
            0
        } else {
            self.charges.len() / self.ndim
        }
    }

    /// All charges as one flat slice.
    #[inline]
    pub fn charges(&self) -> &[i64] {
        &self.charges
    }

    /// Charge on one axis.
    #[inline]
    pub fn charge(&self, axis: usize) -> &[i64] {
        let nsym = self.nsym();
        &self.charges[axis * nsym..(axis + 1) * nsym]
    }

    /// Charges of the selected axes, concatenated.
    pub fn select(&self, axes: &[usize]) -> SmallVec<[i64; 8]> {
        let mut out = SmallVec::with_capacity(axes.len() * self.nsym());
        for &a in axes {
            out.extend_from_slice(self.charge(a));
        }
        out
    }

    /// Create a permuted key: axis `i` of the result is axis `perm[i]`.
    pub fn permute(&self, perm: &[usize]) -> Self {
        assert_eq!(
            perm.len(),
            self.ndim,
            "permutation length must match key dimensions"
        );
        let nsym = self.nsym();
        Self::collect_from(
            perm.iter()
                .flat_map(|&p| self.charges[p * nsym..(p + 1) * nsym].iter().copied()),
            self.ndim,
        )
    }

    /// Concatenate two keys (outer product of blocks).
    pub fn concat(&self, other: &Self) -> Self {
        Self::collect_from(
            self.charges.iter().chain(other.charges.iter()).copied(),
            self.ndim + other.ndim,
        )
    }
}

impl PartialEq for BlockKey {
    fn eq(&self, other: &Self) -> bool {
        // Fast path: check hash first
        if self.hash != other.hash {
            return false;
        }
        self.ndim == other.ndim && self.charges == other.charges
    }
}

impl Eq for BlockKey {}

impl Hash for BlockKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl PartialOrd for BlockKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BlockKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.charges
            .cmp(&other.charges)
            .then(self.ndim.cmp(&other.ndim))
    }
}

impl std::fmt::Display for BlockKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let nsym = self.nsym();
        write!(f, "(")?;
        for axis in 0..self.ndim {
            if axis > 0 {
                write!(f, ", ")?;
            }
            if nsym == 1 {
                write!(f, "{}", self.charges[axis])?;
            } else {
                write!(f, "{:?}", self.charge(axis))?;
            }
        }
        write!(f, ")")
    }
}

/// FNV-1a hash over the charges and the rank.
fn compute_hash(charges: &[i64], ndim: usize) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    let mut hash = FNV_OFFSET ^ ndim as u64;
    hash = hash.wrapping_mul(FNV_PRIME);
    for &c in charges {
        hash ^= c as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_key_axes() {
        let key = BlockKey::new(&[0, 1, 1, -1], 2);
        assert_eq!(key.nsym(), 2);
        assert_eq!(key.charge(0), &[0, 1]);
        assert_eq!(key.charge(1), &[1, -1]);
        assert_eq!(key.select(&[1, 0]).as_slice(), &[1, -1, 0, 1]);
    }

    #[test]
    fn test_key_permute() {
        let key = BlockKey::new(&[1, 2, 3], 3);
        let p = key.permute(&[2, 0, 1]);
        assert_eq!(p.charges(), &[3, 1, 2]);
    }

    #[test]
    fn test_key_order_is_lexicographic() {
        let mut keys = [
            BlockKey::new(&[1, 0], 2),
            BlockKey::new(&[-1, 2], 2),
            BlockKey::new(&[0, 5], 2),
        ];
        keys.sort();
        assert_eq!(keys[0].charges(), &[-1, 2]);
        assert_eq!(keys[2].charges(), &[1, 0]);
    }

    #[test]
    fn test_key_as_hashmap_key() {
        let mut map = HashMap::new();
        map.insert(BlockKey::new(&[1, 1], 2), 10);
        assert_eq!(map.get(&BlockKey::new(&[1, 1], 2)), Some(&10));
        assert_eq!(map.get(&BlockKey::new(&[1, 1], 1)), None);
    }

    #[test]
    fn test_trivial_symmetry_key() {
        let key = BlockKey::new(&[], 3);
        assert_eq!(key.nsym(), 0);
        assert!(key.charge(2).is_empty());
        assert_eq!(key.to_string(), "([], [], [])");
    }
}
