//! Block FFT stage: extracts, demeans, windows, transforms, and
//! one-sided-normalizes each Welch segment.

use crate::flatten::flatten_col_major;
use crate::params::SpodParams;
use crate::provider::SnapshotProvider;
use ndarray::{s, Array2};
use num_complex::Complex64;
use rayon::prelude::*;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// Time offset (segment start) for block `b`; the final block is flushed
/// right against the end of the series rather than left-aligned.
pub fn block_offset(params: &SpodParams, b: usize) -> usize {
    let stride = params.n_dft - params.n_ovlp;
    let end = if b == params.n_blks - 1 {
        params.n_t
    } else {
        (b * stride + params.n_dft).min(params.n_t)
    };
    end - params.n_dft
}

/// Shared forward FFT plan for segments of length `n_dft`.
pub fn make_plan(n_dft: usize) -> Arc<dyn Fft<f64>> {
    let mut planner = FftPlanner::new();
    planner.plan_fft_forward(n_dft)
}

/// Compute the one-sided-normalized Fourier block `Q_hat` (shape `N_f x
/// Nx`) for block index `b`.
pub fn compute_block(
    provider: &dyn SnapshotProvider,
    params: &SpodParams,
    b: usize,
    fft: &Arc<dyn Fft<f64>>,
) -> crate::error::Result<Array2<Complex64>> {
    let n_dft = params.n_dft;
    let n_x = params.n_x;
    let offset = block_offset(params, b);

    tracing::debug!(block = b, total = params.n_blks, offset, "computing FFT block");

    // Assemble the demeaned, windowed segment: row k = flatten(snapshot[offset+k]) - mean.
    let mut q = Array2::<Complex64>::zeros((n_dft, n_x));
    for k in 0..n_dft {
        let snap = provider.get(offset + k)?;
        let flat = flatten_col_major(&params.shape, &snap);
        let demeaned = &flat - &params.mean;
        let w = params.window[k];
        let windowed = demeaned.mapv(|c| c * w);
        q.row_mut(k).assign(&windowed);
    }

    // DFT along the time axis, independently per spatial point, in parallel.
    let columns: Vec<Vec<Complex64>> = (0..n_x)
        .into_par_iter()
        .map(|col| {
            let mut buf: Vec<Complex64> = (0..n_dft).map(|k| q[[k, col]]).collect();
            fft.process(&mut buf);
            buf
        })
        .collect();
    for (col, buf) in columns.into_iter().enumerate() {
        for (k, value) in buf.into_iter().enumerate() {
            q[[k, col]] = value;
        }
    }

    // Normalize: (gain / N_DFT) * DFT(Q).
    let scale = params.window_gain / n_dft as f64;
    q.mapv_inplace(|c| c * scale);

    // Truncate to N_f rows.
    let n_f = params.n_freq();
    let mut q_hat = q.slice(s![0..n_f, ..]).to_owned();

    // One-sided doubling of strict-interior bins for real data only.
    if !params.is_complex && n_f > 2 {
        for k in 1..n_f - 1 {
            let mut row = q_hat.row_mut(k);
            row.mapv_inplace(|c| c * 2.0);
        }
    }

    Ok(q_hat)
}
