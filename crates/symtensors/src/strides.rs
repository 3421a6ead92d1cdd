//! Stride computation and sub-block copy utilities.
//!
//! Uses column-major (Fortran) order throughout, matching faer.

/// Compute column-major strides from shape.
///
/// For shape [d0, d1, d2, ...], returns strides [1, d0, d0*d1, ...].
///
/// # Examples
///
/// ```
/// use symtensors::strides::compute_strides;
///
/// assert_eq!(compute_strides(&[3, 4, 5]), vec![1, 3, 12]);
/// assert_eq!(compute_strides(&[5]), vec![1]);
/// assert_eq!(compute_strides(&[]), Vec::<usize>::new());
/// ```
pub fn compute_strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = Vec::with_capacity(shape.len());
    let mut stride = 1;
    for &dim in shape.iter() {
        strides.push(stride);
        stride *= dim;
    }
    strides
}

/// Convert cartesian indices to linear index using the given strides.
#[inline]
pub fn cartesian_to_linear(indices: &[usize], strides: &[usize]) -> usize {
    indices
        .iter()
        .zip(strides.iter())
        .map(|(&idx, &stride)| idx * stride)
        .sum()
}

/// Convert linear index to cartesian indices using column-major order.
pub fn linear_to_cartesian(mut linear: usize, shape: &[usize]) -> Vec<usize> {
    let mut indices = Vec::with_capacity(shape.len());
    for &dim in shape.iter() {
        indices.push(linear % dim);
        linear /= dim;
    }
    indices
}

/// Advance a column-major multi-index; returns `false` after the last one.
#[inline]
pub(crate) fn next_index(index: &mut [usize], shape: &[usize]) -> bool {
    for (i, d) in index.iter_mut().zip(shape.iter()) {
        *i += 1;
        if *i < *d {
            return true;
        }
        *i = 0;
    }
    false
}

/// Copy `src` (shape `src_shape`) into the region of `dst` (shape
/// `dst_shape`) starting at `offsets`.
///
/// Contiguous runs along the first axis are copied as slices.
pub fn copy_subblock<T: Copy>(
    dst: &mut [T],
    dst_shape: &[usize],
    offsets: &[usize],
    src: &[T],
    src_shape: &[usize],
) {
    debug_assert_eq!(dst_shape.len(), src_shape.len());
    debug_assert_eq!(src.len(), src_shape.iter().product::<usize>());
    if src.is_empty() {
        return;
    }
    if src_shape.is_empty() {
        dst[0] = src[0];
        return;
    }
    let dst_strides = compute_strides(dst_shape);
    let run = src_shape[0];
    let outer = &src_shape[1..];
    let mut index = vec![0usize; outer.len()];
    let mut pos = 0;
    loop {
        let mut start = offsets[0];
        for (k, &i) in index.iter().enumerate() {
            start += (offsets[k + 1] + i) * dst_strides[k + 1];
        }
        dst[start..start + run].copy_from_slice(&src[pos..pos + run]);
        pos += run;
        if !next_index(&mut index, outer) {
            break;
        }
    }
}

/// Extract the region of `src` (shape `src_shape`) of shape `sub_shape`
/// starting at `offsets`, as a new column-major buffer.
pub fn extract_subblock<T: Copy>(
    src: &[T],
    src_shape: &[usize],
    offsets: &[usize],
    sub_shape: &[usize],
) -> Vec<T> {
    debug_assert_eq!(src_shape.len(), sub_shape.len());
    let total: usize = sub_shape.iter().product();
    let mut out = Vec::with_capacity(total);
    if total == 0 {
        return out;
    }
    if sub_shape.is_empty() {
        out.push(src[0]);
        return out;
    }
    let src_strides = compute_strides(src_shape);
    let run = sub_shape[0];
    let outer = &sub_shape[1..];
    let mut index = vec![0usize; outer.len()];
    loop {
        let mut start = offsets[0];
        for (k, &i) in index.iter().enumerate() {
            start += (offsets[k + 1] + i) * src_strides[k + 1];
        }
        out.extend_from_slice(&src[start..start + run]);
        if !next_index(&mut index, outer) {
            break;
        }
    }
    out
}

/// Select positions `idx` along `axis`; the result has `shape[axis] ==
/// idx.len()`.
pub fn gather_axis<T: Copy>(src: &[T], shape: &[usize], axis: usize, idx: &[usize]) -> Vec<T> {
    let inner: usize = shape[..axis].iter().product();
    let outer: usize = shape[axis + 1..].iter().product();
    let dim = shape[axis];
    let mut out = Vec::with_capacity(inner * idx.len() * outer);
    for o in 0..outer {
        for &i in idx {
            let start = (o * dim + i) * inner;
            out.extend_from_slice(&src[start..start + inner]);
        }
    }
    out
}

/// Inverse of [`gather_axis`]: place slice `j` of `src` at position `idx[j]`
/// of a zero-filled buffer whose `axis` has length `new_dim`.
pub fn scatter_axis<T: Copy + Default>(
    src: &[T],
    shape: &[usize],
    axis: usize,
    idx: &[usize],
    new_dim: usize,
) -> Vec<T> {
    let inner: usize = shape[..axis].iter().product();
    let outer: usize = shape[axis + 1..].iter().product();
    let dim = shape[axis];
    debug_assert_eq!(dim, idx.len());
    let mut out = vec![T::default(); inner * new_dim * outer];
    for o in 0..outer {
        for (j, &i) in idx.iter().enumerate() {
            let src_start = (o * dim + j) * inner;
            let dst_start = (o * new_dim + i) * inner;
            out[dst_start..dst_start + inner].copy_from_slice(&src[src_start..src_start + inner]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cartesian_to_linear() {
        let strides = compute_strides(&[3, 4, 5]);
        assert_eq!(cartesian_to_linear(&[0, 0, 0], &strides), 0);
        assert_eq!(cartesian_to_linear(&[1, 0, 0], &strides), 1);
        assert_eq!(cartesian_to_linear(&[0, 1, 0], &strides), 3);
        assert_eq!(cartesian_to_linear(&[2, 3, 4], &strides), 2 + 9 + 48);
    }

    #[test]
    fn test_roundtrip() {
        let shape = [3, 4, 5];
        let strides = compute_strides(&shape);
        for linear in 0..60 {
            let cartesian = linear_to_cartesian(linear, &shape);
            assert_eq!(cartesian_to_linear(&cartesian, &strides), linear);
        }
    }

    #[test]
    fn test_subblock_copy_and_extract() {
        // 2x3 block placed at (1, 1) inside a 4x5 zero matrix
        let src: Vec<f64> = (1..=6).map(|x| x as f64).collect();
        let mut dst = vec![0.0; 20];
        copy_subblock(&mut dst, &[4, 5], &[1, 1], &src, &[2, 3]);
        assert_eq!(dst[1 + 4], 1.0);
        assert_eq!(dst[2 + 4], 2.0);
        assert_eq!(dst[1 + 8], 3.0);
        assert_eq!(dst[2 + 12], 6.0);
        assert_eq!(dst.iter().filter(|&&x| x != 0.0).count(), 6);

        let back = extract_subblock(&dst, &[4, 5], &[1, 1], &[2, 3]);
        assert_eq!(back, src);
    }

    #[test]
    fn test_gather_scatter_axis() {
        // shape [2, 3, 2], select positions 0 and 2 along axis 1
        let src: Vec<i32> = (0..12).collect();
        let g = gather_axis(&src, &[2, 3, 2], 1, &[0, 2]);
        assert_eq!(g, vec![0, 1, 4, 5, 6, 7, 10, 11]);
        let s = scatter_axis(&g, &[2, 2, 2], 1, &[0, 2], 3);
        assert_eq!(s, vec![0, 1, 0, 0, 4, 5, 6, 7, 0, 0, 10, 11]);
    }

    #[test]
    fn test_next_index_order() {
        let shape = [2, 2];
        let mut idx = vec![0, 0];
        let mut seen = vec![idx.clone()];
        while next_index(&mut idx, &shape) {
            seen.push(idx.clone());
        }
        assert_eq!(seen, vec![vec![0, 0], vec![1, 0], vec![0, 1], vec![1, 1]]);
    }
}
