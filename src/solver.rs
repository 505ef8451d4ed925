//! Per-frequency solver: cross-spectral density assembly, weighted
//! Hermitian eigendecomposition, and mode reconstruction via the method
//! of snapshots.

use crate::block_store::BlockStore;
use crate::confidence::confidence_bounds;
use crate::error::Result;
use nalgebra::DMatrix;
use ndarray::{Array1, Array2};
use num_complex::Complex64;
use rayon::prelude::*;

/// Result of solving a single frequency: ranked energies, confidence
/// bounds (if requested), and the weight-orthonormal mode matrix
/// `Psi_f` (`Nx x N_blks`, columns ranked by descending energy).
pub struct FrequencyResult {
    pub freq_index: usize,
    pub energies: Array1<f64>,
    pub bounds: Option<(Array1<f64>, Array1<f64>)>,
    pub modes: Array2<Complex64>,
}

/// Re-Hermitize `m` as `(m + m^H) / 2`, emitting a `NumericWarning` if the
/// discarded anti-Hermitian part is non-negligible (floating-point drift
/// from the `A^H diag(w) A` assembly rather than a true asymmetry).
fn hermitian_symmetrize(m: &Array2<Complex64>) -> Array2<Complex64> {
    let m_h = m.t().mapv(|c| c.conj());
    let sym = (m + &m_h).mapv(|c| c * 0.5);
    let drift = (m - &sym).iter().map(|c| c.norm()).fold(0.0_f64, f64::max);
    if drift > 1e-8 {
        tracing::warn!(drift, "non-Hermitian drift in cross-spectral density before symmetrization");
    }
    sym
}

fn ndarray_to_nalgebra(m: &Array2<Complex64>) -> DMatrix<Complex64> {
    let n = m.nrows();
    DMatrix::from_fn(n, n, |r, c| m[[r, c]])
}

/// Assemble `M_f = A^H diag(w) A / N_blks` from the cross-spectral
/// snapshot matrix `A` (`Nx x N_blks`) and the weight vector `w`.
fn assemble_csd(a: &Array2<Complex64>, weight: &Array1<f64>, n_blks: usize) -> Array2<Complex64> {
    let mut weighted_a = a.clone();
    for i in 0..weighted_a.nrows() {
        let wi = weight[i];
        let mut row = weighted_a.row_mut(i);
        row.mapv_inplace(|c| c * wi);
    }
    let a_h = a.t().mapv(|c| c.conj());
    a_h.dot(&weighted_a).mapv(|c| c / n_blks as f64)
}

/// Diagonalize `M_f`, returning eigenvalues sorted by descending value and
/// a matching eigenvector matrix.
fn eigen_descending(m: &Array2<Complex64>) -> (Array1<f64>, Array2<Complex64>) {
    let n = m.nrows();
    let dm = ndarray_to_nalgebra(m);
    let eig = nalgebra::linalg::SymmetricEigen::new(dm);

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| eig.eigenvalues[j].partial_cmp(&eig.eigenvalues[i]).unwrap());

    let lambda = Array1::from_shape_fn(n, |k| eig.eigenvalues[order[k]]);
    let theta = Array2::from_shape_fn((n, n), |(r, c)| eig.eigenvectors[(r, order[c])]);
    (lambda, theta)
}

/// Solve one frequency: CSD assembly, eigendecomposition, mode
/// reconstruction.
pub fn solve_frequency(
    a: &Array2<Complex64>,
    weight: &Array1<f64>,
    n_blks: usize,
    conf_level: Option<f64>,
) -> (Array1<f64>, Option<(Array1<f64>, Array1<f64>)>, Array2<Complex64>) {
    let m = assemble_csd(a, weight, n_blks);
    let m = hermitian_symmetrize(&m);
    let (lambda, theta) = eigen_descending(&m);

    let energies = lambda.mapv(f64::abs);

    let lambda_max = lambda.iter().cloned().fold(f64::MIN, f64::max);
    let eps = f64::EPSILON * lambda_max.max(0.0);
    if lambda.iter().any(|&v| v <= 0.0) {
        tracing::warn!("non-positive eigenvalues clamped in SPOD solve");
    }
    let lambda_plus = lambda.mapv(|v| v.max(eps).max(f64::MIN_POSITIVE));

    let mut psi = a.dot(&theta);
    for j in 0..n_blks {
        let scale = 1.0 / (n_blks as f64 * lambda_plus[j]).sqrt();
        let mut col = psi.column_mut(j);
        col.mapv_inplace(|c| c * scale);
    }

    let bounds = conf_level.map(|level| {
        let (lo, hi) = confidence_bounds(energies.as_slice().unwrap(), n_blks, level);
        (Array1::from_vec(lo), Array1::from_vec(hi))
    });

    (energies, bounds, psi)
}

/// Solve every frequency in `freqs` against `store`, in parallel (each
/// frequency is independent once the block pass has completed).
pub fn solve_all(
    store: &dyn BlockStore,
    freqs: &[usize],
    weight: &Array1<f64>,
    n_blks: usize,
    conf_level: Option<f64>,
) -> Result<Vec<FrequencyResult>> {
    freqs
        .par_iter()
        .map(|&i| {
            tracing::debug!(frequency = i, "solving SPOD frequency");
            let a = store.read_frequency(i)?;
            let (energies, bounds, modes) = solve_frequency(&a, weight, n_blks, conf_level);
            Ok(FrequencyResult {
                freq_index: i,
                energies,
                bounds,
                modes,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use num_complex::Complex64;

    /// Build a synthetic cross-spectral snapshot matrix dominated by a
    /// single rank-1 direction, simulating a pure tone concentrated in one
    /// mode.
    fn rank_one_dominant(n_x: usize, n_blks: usize) -> Array2<Complex64> {
        let direction: Vec<Complex64> = (0..n_x)
            .map(|i| Complex64::new(((i % 5) as f64 - 2.0), 0.0))
            .collect();
        Array2::from_shape_fn((n_x, n_blks), |(x, b)| {
            let phase = Complex64::from_polar(1.0, 0.1 * b as f64);
            direction[x] * phase + Complex64::new(1e-6 * ((x + b) as f64), 0.0)
        })
    }

    #[test]
    fn energies_are_ranked_non_increasing() {
        let a = rank_one_dominant(16, 6);
        let weight = Array1::from_elem(16, 1.0);
        let (energies, _, _) = solve_frequency(&a, &weight, 6, None);
        for k in 1..energies.len() {
            assert!(energies[k - 1] >= energies[k] - 1e-9);
        }
    }

    #[test]
    fn dominant_mode_carries_most_energy() {
        let a = rank_one_dominant(16, 6);
        let weight = Array1::from_elem(16, 1.0);
        let (energies, _, _) = solve_frequency(&a, &weight, 6, None);
        let total: f64 = energies.sum();
        assert!(energies[0] / total > 0.95);
    }

    #[test]
    fn weighted_orthonormality_holds_for_nondegenerate_modes() {
        let n_x = 20;
        let n_blks = 6;
        let a = rank_one_dominant(n_x, n_blks);
        let weight = Array1::from_shape_fn(n_x, |i| 1.0 + (i % 3) as f64);
        let (energies, _, psi) = solve_frequency(&a, &weight, n_blks, None);

        // Psi^H diag(w) Psi ~= I restricted to columns with Lambda > 0.
        let mut weighted_psi = psi.clone();
        for i in 0..n_x {
            let wi = weight[i];
            let mut row = weighted_psi.row_mut(i);
            row.mapv_inplace(|c| c * wi);
        }
        let psi_h = psi.t().mapv(|c| c.conj());
        let gram = psi_h.dot(&weighted_psi);

        for j in 0..n_blks {
            if energies[j] < 1e-8 {
                continue;
            }
            for k in 0..n_blks {
                if energies[k] < 1e-8 {
                    continue;
                }
                let expected = if j == k { 1.0 } else { 0.0 };
                assert!(
                    (gram[[j, k]].norm() - expected).abs() < 1e-6,
                    "gram[{j},{k}] = {:?}, expected {}",
                    gram[[j, k]],
                    expected
                );
            }
        }
    }

    #[test]
    fn confidence_bounds_straddle_energies() {
        let a = rank_one_dominant(16, 10);
        let weight = Array1::from_elem(16, 1.0);
        let (energies, bounds, _) = solve_frequency(&a, &weight, 10, Some(0.95));
        let (lower, upper) = bounds.unwrap();
        for k in 0..energies.len() {
            assert!(lower[k] >= energies[k] - 1e-9);
            assert!(energies[k] >= upper[k] - 1e-9);
        }
    }
}
