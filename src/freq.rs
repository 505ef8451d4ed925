//! Frequency axis construction.

use ndarray::Array1;

/// Number of one-sided frequency bins for a real-valued transform of
/// length `n_dft`.
pub fn n_freq_real(n_dft: usize) -> usize {
    n_dft / 2 + 1
}

/// Build the frequency grid `f[0..N_f-1]` for a transform of length
/// `n_dft` sampled at timestep `dt`.
///
/// Real data: one-sided, non-negative, monotone increasing, `N_f =
/// floor(n_dft/2) + 1`. Complex data: the standard signed two-sided grid
/// of length `n_dft`, with the upper half shifted by `-1/dt`.
pub fn frequency_axis(n_dft: usize, dt: f64, is_complex: bool) -> Array1<f64> {
    let df = 1.0 / (n_dft as f64 * dt);
    if !is_complex {
        let n_f = n_freq_real(n_dft);
        Array1::from_shape_fn(n_f, |k| k as f64 * df)
    } else {
        // ceil(n_dft / 2) computed with integer arithmetic to avoid
        // floating-point rounding at the half-point boundary.
        let half = (n_dft + 1) / 2;
        Array1::from_shape_fn(n_dft, |k| {
            if k < half {
                k as f64 * df
            } else {
                k as f64 * df - 1.0 / dt
            }
        })
    }
}
