//! Column-major (first-index-fastest) flattening between a spatial shape
//! `S = (s1, .., sd)` and its flattened length-Nx vector form. Flattening
//! and unflattening must round-trip exactly.

use ndarray::{Array1, ArrayD, IxDyn};
use num_complex::Complex64;

/// Total number of spatial points `Nx = prod(shape)`.
pub fn n_points(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// Decode a column-major linear index into per-axis indices for `shape`.
fn decode(shape: &[usize], mut linear: usize) -> Vec<usize> {
    let mut idx = vec![0usize; shape.len()];
    for (d, &dim) in shape.iter().enumerate() {
        idx[d] = linear % dim;
        linear /= dim;
    }
    idx
}

/// Flatten a spatial array of shape `S` into a length-Nx vector, iterating
/// with the first spatial index fastest.
pub fn flatten_col_major(shape: &[usize], data: &ArrayD<Complex64>) -> Array1<Complex64> {
    let nx = n_points(shape);
    Array1::from_shape_fn(nx, |linear| {
        let idx = decode(shape, linear);
        data[IxDyn(&idx)]
    })
}

/// Reconstruct a spatial array of shape `S` from its column-major
/// flattened form.
pub fn unflatten_col_major(shape: &[usize], flat: &Array1<Complex64>) -> ArrayD<Complex64> {
    let mut out = ArrayD::<Complex64>::zeros(IxDyn(shape));
    let nx = n_points(shape);
    for linear in 0..nx {
        let idx = decode(shape, linear);
        out[IxDyn(&idx)] = flat[linear];
    }
    out
}
