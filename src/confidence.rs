//! Chi-squared confidence bounds for SPOD mode energies.
//!
//! A chi-squared variable with `2k` degrees of freedom is `2 *
//! Gamma(shape=k, scale=1)`, so the spec's `2*Gamma_inv(p; N_blks)` is
//! exactly `ChiSquared(2*N_blks).inverse_cdf(p)`.

use statrs::distribution::{ChiSquared, ContinuousCDF};

/// Lower/upper energy bound scale factors `2*N_blks/xi_{lower,upper}` at
/// confidence level `conf_level`.
pub fn bound_factors(n_blks: usize, conf_level: f64) -> (f64, f64) {
    let dof = 2.0 * n_blks as f64;
    let dist = ChiSquared::new(dof).expect("degrees of freedom must be positive");
    let xi_lower = dist.inverse_cdf(conf_level);
    let xi_upper = dist.inverse_cdf(1.0 - conf_level);
    (dof / xi_lower, dof / xi_upper)
}

/// Apply the bound factors to a row of mode energies, returning
/// `(lower, upper)` vectors.
pub fn confidence_bounds(l: &[f64], n_blks: usize, conf_level: f64) -> (Vec<f64>, Vec<f64>) {
    let (lo_factor, hi_factor) = bound_factors(n_blks, conf_level);
    let lower = l.iter().map(|&v| v * lo_factor).collect();
    let upper = l.iter().map(|&v| v * hi_factor).collect();
    (lower, upper)
}
