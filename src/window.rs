//! Hamming window generation and gain correction.

use ndarray::Array1;
use std::f64::consts::PI;

/// Hamming window of length `n`: `w[k] = 0.54 - 0.46*cos(2*pi*k/(n-1))`.
///
/// `n == 1` is a degenerate single-sample window, returned as `[1.0]` to
/// avoid dividing by zero.
pub fn hamming(n: usize) -> Array1<f64> {
    if n <= 1 {
        return Array1::from_elem(n.max(1), 1.0);
    }
    let denom = (n - 1) as f64;
    Array1::from_shape_fn(n, |k| 0.54 - 0.46 * (2.0 * PI * k as f64 / denom).cos())
}

/// Window gain correction `g = 1 / mean(w)`, applied multiplicatively to
/// each segment's Fourier coefficients to undo the energy lost to windowing.
pub fn window_gain(window: &Array1<f64>) -> f64 {
    let mean = window.sum() / window.len() as f64;
    1.0 / mean
}
