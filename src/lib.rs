//! Spectral Proper Orthogonal Decomposition (SPOD) core.
//!
//! Given a time-ordered sequence of spatially-indexed snapshots, SPOD
//! produces, at each temporal frequency, an orthonormal basis of spatial
//! modes ranked by expected energy, their energy spectrum, and
//! (optionally) confidence bounds.

pub mod block_store;
pub mod confidence;
pub mod error;
pub mod fft_stage;
pub mod flatten;
pub mod freq;
pub mod metadata;
pub mod modes;
pub mod params;
pub mod provider;
pub mod solver;
pub mod window;

pub use error::{Result, SpodError};
pub use modes::ModeAccessor;
pub use params::{resolve, SpodOptions, SpodParams, WindowSpec};
pub use provider::{EagerProvider, LazyProvider, SnapshotProvider};

use block_store::{BlockStore, InMemoryStore, StreamingStore};
use fft_stage::{compute_block, make_plan};
use metadata::RunMetadata;
use ndarray::{Array1, Array2, Array3};

/// Full result of a SPOD run: ranked energies, confidence bounds (if
/// requested), the frequency axis, and a mode accessor.
pub struct SpodOutput {
    /// `L[i, j]`: energy of mode `j` at the `i`-th *selected* frequency.
    pub l: Array2<f64>,
    /// `Lc[i, j, 0..1]`: lower/upper confidence bounds, if requested.
    pub lc: Option<Array3<f64>>,
    /// Frequency value for each selected row of `l`/`lc`.
    pub f: Array1<f64>,
    /// Frequency *index* (into the full grid) for each row of `l`/`lc`.
    pub freq_indices: Vec<usize>,
    /// Accessor for the `j`-th mode at selected-row `i`.
    pub modes: ModeAccessor,
}

/// Run the SPOD pipeline end to end: parameter resolution, the Welch/FFT
/// block pass, and the per-frequency solve, returning ranked energies,
/// the frequency axis, and a mode accessor.
pub fn run_spod(
    provider: &dyn SnapshotProvider,
    options: SpodOptions,
) -> Result<SpodOutput> {
    let params = resolve(provider, &options)?;
    let n_f = params.n_freq();
    let f_axis = freq::frequency_axis(params.n_dft, params.dt, params.is_complex);

    tracing::info!(
        n_dft = params.n_dft,
        n_ovlp = params.n_ovlp,
        n_blks = params.n_blks,
        n_freq = n_f,
        streaming = params.save_blocks,
        "resolved SPOD parameters"
    );

    let run_dir = params.run_dir();
    let save_freqs: Vec<usize> = match &params.save_freqs {
        Some(set) => {
            let mut v: Vec<usize> = set.iter().copied().collect();
            v.sort_unstable();
            v
        }
        None => (0..n_f).collect(),
    };

    let mut store: Box<dyn BlockStore> = if params.save_blocks {
        Box::new(StreamingStore::new(
            run_dir.clone(),
            save_freqs.clone(),
            n_f,
            params.n_x,
            params.n_blks,
        )?)
    } else {
        Box::new(InMemoryStore::new(n_f, params.n_x, params.n_blks))
    };

    // Block FFT pass. Blocks are processed sequentially (bounding peak
    // memory to one segment at a time); the FFT plan is shared and the
    // per-column transform within a block is parallelized.
    let fft = make_plan(params.n_dft);
    for b in 0..params.n_blks {
        let q_hat = compute_block(provider, &params, b, &fft)?;
        store.put(b, &q_hat)?;
    }

    let freqs = store.list_frequencies();
    let results = solver::solve_all(
        store.as_ref(),
        &freqs,
        &params.weight,
        params.n_blks,
        params.confidence_intervals.then_some(params.conf_level),
    )?;

    let n_selected = results.len();
    let mut l = Array2::<f64>::zeros((n_selected, params.n_blks));
    let mut lc = params
        .confidence_intervals
        .then(|| Array3::<f64>::zeros((n_selected, params.n_blks, 2)));
    let mut freq_values = Array1::<f64>::zeros(n_selected);
    let mut freq_indices = Vec::with_capacity(n_selected);

    let mut in_memory_modes: Vec<Array2<num_complex::Complex64>> = Vec::with_capacity(n_selected);

    for (row, result) in results.into_iter().enumerate() {
        l.row_mut(row).assign(&result.energies);
        if let (Some((lower, upper)), Some(lc)) = (&result.bounds, lc.as_mut()) {
            lc.index_axis_mut(ndarray::Axis(0), row)
                .index_axis_mut(ndarray::Axis(1), 0)
                .assign(lower);
            lc.index_axis_mut(ndarray::Axis(0), row)
                .index_axis_mut(ndarray::Axis(1), 1)
                .assign(upper);
        }
        freq_values[row] = f_axis[result.freq_index];
        freq_indices.push(result.freq_index);

        if params.save_blocks {
            modes::write_mode_file(&run_dir, result.freq_index, params.n_save, &result.modes)?;
        } else {
            in_memory_modes.push(result.modes);
        }
    }

    let accessor = if params.save_blocks {
        RunMetadata::from_params(&params, &freqs).write(&run_dir)?;
        ModeAccessor::streaming(params.shape.clone(), run_dir.clone(), params.n_save)
    } else {
        ModeAccessor::in_memory(params.shape.clone(), in_memory_modes)
    };

    if params.save_blocks && params.delete_blocks {
        for b in 0..params.n_blks {
            let path = run_dir.join(format!("fft_block{:04}", b + 1));
            let _ = std::fs::remove_file(path);
        }
        tracing::info!(dir = %run_dir.display(), "deleted intermediate FFT block files");
    }

    Ok(SpodOutput {
        l,
        lc,
        f: freq_values,
        freq_indices,
        modes: accessor,
    })
}
