//! Contraction of a network of tensors described by edge labels.

use crate::error::TensorError;
use crate::scalar::Scalar;
use crate::tensor::SymTensor;

use super::{outer, tensordot, trace};

/// Offset placing open (negative) labels after every contracted label.
const OPEN_OFFSET: i64 = 1 << 40;

#[derive(Clone, Copy, Debug)]
struct Edge {
    order: i64,
    leg: usize,
    ten: usize,
}

/// Contract a network in `ncon` convention.
///
/// `labels[i]` has one label per logical axis of `tensors[i]`. Positive
/// labels appear exactly twice and are contracted in increasing order;
/// consecutive labels joining the same pair of tensors are contracted in one
/// call. Negative labels appear once and become the open legs of the result,
/// ordered `-1, -2, ...`. Disconnected parts are joined by outer products.
/// `conjs` is empty or has one flag per tensor.
///
/// # Example
///
/// ```
/// use symtensors::{Config, Leg, SymTensor, Symmetry, ncon};
///
/// let config = Config::new(Symmetry::u1());
/// let sym = config.sym().clone();
/// let leg = Leg::new(&sym, 1, &[0, 1], &[1, 2]).unwrap();
/// let a: SymTensor<f64> = SymTensor::ones(&config, &[leg.clone(), leg.conj()], &[0]).unwrap();
/// let c = ncon(&[&a, &a, &a], &[&[-1, 1], &[1, 2], &[2, -2]], &[]).unwrap();
/// assert_eq!(c.block(&[1, 1]).unwrap()[0], 4.0);
/// ```
pub fn ncon<T: Scalar>(
    tensors: &[&SymTensor<T>],
    labels: &[&[i64]],
    conjs: &[bool],
) -> Result<SymTensor<T>, TensorError> {
    if tensors.len() != labels.len() || tensors.is_empty() {
        return Err(TensorError::WrongNumberOfIndices {
            expected: tensors.len(),
            actual: labels.len(),
        });
    }
    if !conjs.is_empty() && conjs.len() != tensors.len() {
        return Err(TensorError::WrongNumberOfIndices {
            expected: tensors.len(),
            actual: conjs.len(),
        });
    }
    for (t, l) in tensors.iter().zip(labels) {
        if t.ndim() != l.len() {
            return Err(TensorError::WrongNumberOfIndices {
                expected: t.ndim(),
                actual: l.len(),
            });
        }
    }
    let mut edges: Vec<Edge> = labels
        .iter()
        .enumerate()
        .flat_map(|(ten, l)| {
            l.iter().enumerate().map(move |(leg, &label)| Edge {
                order: if label > 0 { label } else { OPEN_OFFSET - label },
                leg,
                ten,
            })
        })
        .collect();
    edges.sort_by_key(|e| e.order);
    check_labels(&edges)?;

    let mut ts: Vec<Option<SymTensor<T>>> = tensors.iter().map(|&t| Some(t.clone())).collect();
    let mut conj: Vec<bool> = if conjs.is_empty() {
        vec![false; tensors.len()]
    } else {
        conjs.to_vec()
    };

    let num_closed = edges.iter().filter(|e| e.order < OPEN_OFFSET).count();
    let mut closed: Vec<Edge> = edges[..num_closed].to_vec();
    let mut open: Vec<Edge> = edges[num_closed..].to_vec();

    while !closed.is_empty() {
        // batch consecutive edges between the same pair of tensors
        let pair = ordered_pair(closed[0], closed[1]);
        let mut count = 1;
        while 2 * count < closed.len() && ordered_pair(closed[2 * count], closed[2 * count + 1]) == pair {
            count += 1;
        }
        let (t1, t2) = pair;
        let mut ax1 = Vec::with_capacity(count);
        let mut ax2 = Vec::with_capacity(count);
        for chunk in closed[..2 * count].chunks(2) {
            let (e1, e2) = if chunk[0].ten == t1 && (t1 != t2 || chunk[0].leg < chunk[1].leg) {
                (chunk[0], chunk[1])
            } else {
                (chunk[1], chunk[0])
            };
            ax1.push(e1.leg);
            ax2.push(e2.leg);
        }
        closed.drain(..2 * count);

        let a = take(&mut ts, t1)?;
        if t1 == t2 {
            let a = if conj[t1] { a.conj() } else { a };
            conj[t1] = false;
            ts[t1] = Some(trace(&a, &ax1, &ax2)?);
            let removed: Vec<usize> = ax1.iter().chain(&ax2).copied().collect();
            for e in closed.iter_mut().chain(open.iter_mut()) {
                if e.ten == t1 {
                    e.leg -= removed.iter().filter(|&&x| x < e.leg).count();
                }
            }
        } else {
            let b = take(&mut ts, t2)?;
            let lt1 = a.ndim() - ax1.len();
            ts[t1] = Some(tensordot(&a, &b, &ax1, &ax2, (conj[t1], conj[t2]))?);
            conj[t1] = false;
            conj[t2] = false;
            for e in closed.iter_mut().chain(open.iter_mut()) {
                if e.ten == t1 {
                    e.leg -= ax1.iter().filter(|&&x| x < e.leg).count();
                } else if e.ten == t2 {
                    e.leg = lt1 + e.leg - ax2.iter().filter(|&&x| x < e.leg).count();
                    e.ten = t1;
                }
            }
        }
    }

    // join disconnected parts
    loop {
        let alive: Vec<usize> = (0..ts.len()).filter(|&i| ts[i].is_some()).collect();
        if alive.len() < 2 {
            break;
        }
        let (t1, t2) = (alive[0], alive[1]);
        let a = take(&mut ts, t1)?;
        let b = take(&mut ts, t2)?;
        let a = if conj[t1] { a.conj() } else { a };
        let b = if conj[t2] { b.conj() } else { b };
        conj[t1] = false;
        conj[t2] = false;
        let lt1 = a.ndim();
        ts[t1] = Some(outer(&a, &b)?);
        for e in open.iter_mut() {
            if e.ten == t2 {
                e.leg += lt1;
                e.ten = t1;
            }
        }
    }

    let (last, result) = ts
        .into_iter()
        .enumerate()
        .find_map(|(i, t)| t.map(|t| (i, t)))
        .ok_or_else(|| TensorError::unsupported("empty network"))?;
    let result = if conj[last] { result.conj() } else { result };
    let order: Vec<usize> = open.iter().map(|e| e.leg).collect();
    result.transpose(&order)
}

fn ordered_pair(e1: Edge, e2: Edge) -> (usize, usize) {
    (e1.ten.min(e2.ten), e1.ten.max(e2.ten))
}

fn take<T: Scalar>(ts: &mut [Option<SymTensor<T>>], i: usize) -> Result<SymTensor<T>, TensorError> {
    ts[i]
        .take()
        .ok_or_else(|| TensorError::unsupported(format!("tensor {} was already contracted", i)))
}

/// Positive labels must appear twice, negative labels once; zero is invalid.
fn check_labels(edges: &[Edge]) -> Result<(), TensorError> {
    let mut i = 0;
    while i < edges.len() {
        let mut j = i;
        while j < edges.len() && edges[j].order == edges[i].order {
            j += 1;
        }
        let label = if edges[i].order < OPEN_OFFSET {
            edges[i].order
        } else {
            OPEN_OFFSET - edges[i].order
        };
        let expected = if label > 0 { 2 } else { 1 };
        if label == 0 || j - i != expected {
            return Err(TensorError::unsupported(format!(
                "label {} appears {} times",
                label,
                j - i
            )));
        }
        i = j;
    }
    Ok(())
}
