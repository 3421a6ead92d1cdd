//! Fermionic swap gate.

use crate::error::TensorError;
use crate::fusion::native_axes;
use crate::scalar::Scalar;
use crate::symmetry::Charge;
use crate::tensor::SymTensor;

use super::check_axes;

/// Pseudo-axis standing for the total charge `n` in a [`swap_gate`] group.
pub const CHARGE_AXIS: usize = usize::MAX;

/// Apply the fermionic sign of exchanging groups of legs.
///
/// `groups` is read in consecutive pairs `(g0, g1), (g2, g3), ...`. A block
/// is negated when `Σ_pairs Σ_k p_k(g) p_k(g')` is odd, where `p_k(g)` is
/// the parity of fermionic component `k` of the summed charges on group `g`.
/// A group may contain [`CHARGE_AXIS`], which adds the total charge of the
/// tensor to its sum. For a bosonic symmetry the tensor is returned
/// unchanged.
pub fn swap_gate<T: Scalar>(a: &SymTensor<T>, groups: &[&[usize]]) -> Result<SymTensor<T>, TensorError> {
    if groups.len() % 2 == 1 {
        return Err(TensorError::unsupported(
            "swap gate needs an even number of leg groups",
        ));
    }
    for pair in groups.chunks(2) {
        if pair[0].iter().any(|x| pair[1].contains(x)) {
            return Err(TensorError::unsupported(
                "swap gate groups of one pair overlap",
            ));
        }
        for g in pair {
            let legs: Vec<usize> = g.iter().copied().filter(|&x| x != CHARGE_AXIS).collect();
            check_axes(&legs, a.ndim())?;
        }
    }
    let sym = a.sym();
    if !sym.is_fermionic() {
        return Ok(a.clone());
    }
    let native: Vec<(Vec<usize>, bool)> = groups
        .iter()
        .map(|g| {
            let legs: Vec<usize> = g.iter().copied().filter(|&x| x != CHARGE_AXIS).collect();
            (native_axes(a.meta_fusion(), &legs), g.contains(&CHARGE_AXIS))
        })
        .collect();
    let nsym = sym.nsym();
    let summed = |key: &crate::structure::BlockKey, (axes, with_n): &(Vec<usize>, bool)| -> Charge {
        let mut c: Charge = if *with_n {
            a.n().iter().copied().collect()
        } else {
            Charge::from_elem(0, nsym)
        };
        for &p in axes {
            for (k, &x) in key.charge(p).iter().enumerate() {
                c[k] += x;
            }
        }
        sym.parities(&c)
    };

    let mut data = a.data().to_vec();
    for (i, key) in a.structure().keys().iter().enumerate() {
        let mut odd = 0;
        for pair in native.chunks(2) {
            let p1 = summed(key, &pair[0]);
            let p2 = summed(key, &pair[1]);
            odd += p1.iter().zip(&p2).map(|(x, y)| x * y).sum::<i64>();
        }
        if odd % 2 == 1 {
            for v in &mut data[a.structure().range(i)] {
                *v = -*v;
            }
        }
    }
    Ok(a.with_data(data))
}
