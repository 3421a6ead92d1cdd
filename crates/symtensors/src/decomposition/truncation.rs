//! Global truncation of spectra spread over charge sectors.

use std::collections::BTreeMap;

use log::debug;

use crate::error::TensorError;
use crate::scalar::Scalar;
use crate::symmetry::Charge;
use crate::tensor::{OwnedBlock, SymTensor};

/// Controls for truncating a block-diagonal spectrum.
///
/// Values below `tol` times the largest value overall, or below
/// `tol_block` times the largest value of their own sector, are discarded.
/// At most `d_block` values are kept per sector and at most `d_total`
/// overall; `d_block_min` values per sector always survive. With
/// `keep_multiplets`, the cut never separates values whose relative gap is
/// below `eps_multiplet`.
#[derive(Clone, Debug, PartialEq)]
pub struct TruncationOptions {
    pub tol: f64,
    pub tol_block: f64,
    pub d_block: usize,
    pub d_total: usize,
    pub d_block_min: usize,
    pub keep_multiplets: bool,
    pub eps_multiplet: f64,
}

impl Default for TruncationOptions {
    fn default() -> Self {
        Self {
            tol: 0.0,
            tol_block: 0.0,
            d_block: usize::MAX,
            d_total: usize::MAX,
            d_block_min: 0,
            keep_multiplets: false,
            eps_multiplet: 1e-14,
        }
    }
}

impl TruncationOptions {
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    pub fn with_tol_block(mut self, tol_block: f64) -> Self {
        self.tol_block = tol_block;
        self
    }

    pub fn with_d_block(mut self, d_block: usize) -> Self {
        self.d_block = d_block;
        self
    }

    pub fn with_d_total(mut self, d_total: usize) -> Self {
        self.d_total = d_total;
        self
    }

    pub fn with_d_block_min(mut self, d_block_min: usize) -> Self {
        self.d_block_min = d_block_min;
        self
    }

    /// Keep clusters of values with relative gaps below `eps` together.
    pub fn with_multiplets(mut self, eps: f64) -> Self {
        self.keep_multiplets = true;
        self.eps_multiplet = eps;
        self
    }
}

/// Select the values to keep. Returns one flag per value, per sector.
pub(crate) fn select(
    spectra: &BTreeMap<Charge, Vec<f64>>,
    opts: &TruncationOptions,
) -> BTreeMap<Charge, Vec<bool>> {
    let mut keep: BTreeMap<Charge, Vec<bool>> = spectra
        .iter()
        .map(|(c, v)| (c.clone(), vec![false; v.len()]))
        .collect();
    let global_max = spectra
        .values()
        .flatten()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    if !global_max.is_finite() {
        return keep;
    }

    // candidates surviving the per-sector controls: (value, sector, position)
    let mut candidates: Vec<(f64, &Charge, usize)> = Vec::new();
    for (c, values) in spectra {
        let mut order: Vec<usize> = (0..values.len()).collect();
        order.sort_by(|&i, &j| values[j].total_cmp(&values[i]));
        let block_max = order.first().map(|&i| values[i]).unwrap_or(0.0);
        for &i in order.iter().take(opts.d_block) {
            let v = values[i];
            if v >= opts.tol * global_max && v >= opts.tol_block * block_max {
                candidates.push((v, c, i));
            }
        }
    }
    candidates.sort_by(|x, y| y.0.total_cmp(&x.0).then_with(|| x.1.cmp(y.1)).then(x.2.cmp(&y.2)));

    let mut count = candidates.len().min(opts.d_total);
    if opts.keep_multiplets && count < candidates.len() && count > 0 {
        count = multiplet_boundary(&candidates, count, opts.eps_multiplet);
    }
    for &(_, c, i) in &candidates[..count] {
        if let Some(flags) = keep.get_mut(c) {
            flags[i] = true;
        }
    }

    if opts.d_block_min > 0 {
        for (c, values) in spectra {
            let mut order: Vec<usize> = (0..values.len()).collect();
            order.sort_by(|&i, &j| values[j].total_cmp(&values[i]));
            if let Some(flags) = keep.get_mut(c) {
                for &i in order.iter().take(opts.d_block_min) {
                    flags[i] = true;
                }
            }
        }
    }
    keep
}

/// Move a cut of `count` values out of a cluster of near-degenerate values:
/// down to the closest gap above `eps` if there is one, otherwise up to the
/// first such gap past the cut.
fn multiplet_boundary(sorted: &[(f64, &Charge, usize)], count: usize, eps: f64) -> usize {
    let scale = sorted[0].0.abs();
    if scale == 0.0 {
        return count;
    }
    let gap = |i: usize| (sorted[i].0 - sorted[i + 1].0).abs() / scale;
    if gap(count - 1) > eps {
        return count;
    }
    if let Some(i) = (0..count - 1).rev().find(|&i| gap(i) > eps) {
        return i + 1;
    }
    (count..sorted.len() - 1)
        .find(|&i| gap(i) > eps)
        .map(|i| i + 1)
        .unwrap_or(sorted.len())
}

/// Diagonal mask selecting the entries of the diagonal tensor `s` kept by
/// `opts`: kept entries are one, discarded ones zero.
///
/// Values are the real parts of the entries. The mask is consumed by
/// [`apply_mask`](crate::contract::apply_mask).
pub fn truncation_mask<T: Scalar>(
    s: &SymTensor<T>,
    opts: &TruncationOptions,
) -> Result<SymTensor<T>, TensorError> {
    if !s.is_diag() {
        return Err(TensorError::unsupported("truncation mask of a non-diagonal tensor"));
    }
    let spectra: BTreeMap<Charge, Vec<f64>> = s
        .blocks()
        .map(|(k, _, x)| {
            (
                Charge::from_slice(k.charge(0)),
                x.iter().map(|v| v.real_part()).collect(),
            )
        })
        .collect();
    let keep = select(&spectra, opts);
    let total: usize = spectra.values().map(Vec::len).sum();
    let kept: usize = keep.values().flatten().filter(|&&f| f).count();
    debug!("truncation: keeping {} of {} values", kept, total);

    let blocks: Vec<OwnedBlock<T>> = s
        .blocks()
        .map(|(k, d, _)| {
            let flags = &keep[k.charge(0)];
            let data = flags
                .iter()
                .map(|&f| if f { T::one() } else { T::zero() })
                .collect();
            (k.clone(), d.to_vec(), data)
        })
        .collect();
    SymTensor::assemble(
        s.config(),
        s.s().to_vec(),
        s.n(),
        true,
        s.meta_fusion().to_vec(),
        s.hard_fusion().to_vec(),
        blocks,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    fn spectra(entries: &[(i64, &[f64])]) -> BTreeMap<Charge, Vec<f64>> {
        entries
            .iter()
            .map(|&(c, v)| (smallvec![c], v.to_vec()))
            .collect()
    }

    fn kept(keep: &BTreeMap<Charge, Vec<bool>>) -> Vec<usize> {
        keep.values().map(|f| f.iter().filter(|&&x| x).count()).collect()
    }

    #[test]
    fn test_global_d_total() {
        let s = spectra(&[(0, &[1.0, 0.5, 0.1]), (1, &[0.8, 0.3])]);
        let keep = select(&s, &TruncationOptions::default().with_d_total(3));
        assert_eq!(kept(&keep), vec![2, 1]);
    }

    #[test]
    fn test_tolerances_and_block_bounds() {
        let s = spectra(&[(0, &[1.0, 0.5, 0.01]), (1, &[0.02, 0.001])]);
        let keep = select(&s, &TruncationOptions::default().with_tol(0.015));
        assert_eq!(kept(&keep), vec![2, 1]);
        let keep = select(&s, &TruncationOptions::default().with_tol_block(0.1));
        assert_eq!(kept(&keep), vec![2, 1]);
        let keep = select(&s, &TruncationOptions::default().with_d_block(1));
        assert_eq!(kept(&keep), vec![1, 1]);
        let keep = select(
            &s,
            &TruncationOptions::default().with_d_total(1).with_d_block_min(1),
        );
        assert_eq!(kept(&keep), vec![1, 1]);
    }

    #[test]
    fn test_multiplets_not_split() {
        // a doublet at 0.5 spread over two sectors
        let s = spectra(&[(0, &[1.0, 0.5]), (1, &[0.5, 0.1])]);
        let plain = select(&s, &TruncationOptions::default().with_d_total(2));
        assert_eq!(kept(&plain), vec![2, 0]);
        let keep = select(
            &s,
            &TruncationOptions::default().with_d_total(2).with_multiplets(1e-10),
        );
        assert_eq!(kept(&keep), vec![1, 0]);
    }

    #[test]
    fn test_multiplet_extends_when_no_gap_below() {
        let s = spectra(&[(0, &[1.0, 1.0, 0.2])]);
        let keep = select(
            &s,
            &TruncationOptions::default().with_d_total(1).with_multiplets(1e-10),
        );
        assert_eq!(kept(&keep), vec![2]);
    }
}
