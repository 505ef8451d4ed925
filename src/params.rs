//! Parameter resolution: fills in defaults for window, overlap,
//! timestep, and weight, and validates feasibility.

use crate::error::{Result, SpodError};
use crate::flatten::n_points;
use crate::provider::SnapshotProvider;
use crate::window::{hamming, window_gain};
use ndarray::Array1;
use num_complex::Complex64;
use std::collections::HashSet;
use std::path::PathBuf;

/// User-supplied window override: either an explicit vector, used
/// verbatim, or a scalar length from which a Hamming window is built.
#[derive(Debug, Clone)]
pub enum WindowSpec {
    Length(usize),
    Vector(Vec<f64>),
}

/// Raw, nullable user overrides. Every field defaults when left `None`.
#[derive(Debug, Clone)]
pub struct SpodOptions {
    pub window: Option<WindowSpec>,
    pub weight: Option<Vec<f64>>,
    pub n_ovlp: Option<usize>,
    pub dt: Option<f64>,
    /// Per-point mean to subtract before windowing, `Complex64` so a
    /// complex-valued dataset's (possibly complex) mean can be overridden
    /// exactly, matching the type `temporal_mean` produces by default.
    pub mean: Option<Vec<Complex64>>,
    pub is_complex: Option<bool>,
    pub n_t: Option<usize>,
    pub conf_level: Option<f64>,
    /// Whether to compute confidence bounds `Lc` at all.
    pub confidence_intervals: bool,

    pub save_blocks: bool,
    pub delete_blocks: bool,
    pub save_dir: Option<PathBuf>,
    pub save_freqs: Option<HashSet<usize>>,
    pub n_save: Option<usize>,
}

impl Default for SpodOptions {
    /// Matches `new()`: `delete_blocks` and `confidence_intervals` default
    /// to `true` per spec.md §6, so the derived-`Default` idiom
    /// (`SpodOptions::default()` or `..Default::default()`) cannot produce
    /// non-spec-compliant defaults silently.
    fn default() -> Self {
        Self {
            window: None,
            weight: None,
            n_ovlp: None,
            dt: None,
            mean: None,
            is_complex: None,
            n_t: None,
            conf_level: None,
            confidence_intervals: true,
            save_blocks: false,
            delete_blocks: true,
            save_dir: None,
            save_freqs: None,
            n_save: None,
        }
    }
}

impl SpodOptions {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Fully resolved, immutable spectral parameters.
#[derive(Debug, Clone)]
pub struct SpodParams {
    pub n_dft: usize,
    pub n_ovlp: usize,
    pub n_blks: usize,
    pub dt: f64,
    pub window: Array1<f64>,
    pub window_gain: f64,
    pub weight: Array1<f64>,
    pub mean: Array1<Complex64>,
    pub is_complex: bool,
    pub n_t: usize,
    pub n_x: usize,
    pub shape: Vec<usize>,
    pub conf_level: f64,
    pub n_save: usize,
    pub save_blocks: bool,
    pub delete_blocks: bool,
    pub save_dir: PathBuf,
    pub save_freqs: Option<HashSet<usize>>,
    pub confidence_intervals: bool,
}

impl SpodParams {
    /// Number of one- or two-sided frequency bins implied by `n_dft` and
    /// `is_complex`.
    pub fn n_freq(&self) -> usize {
        if self.is_complex {
            self.n_dft
        } else {
            crate::freq::n_freq_real(self.n_dft)
        }
    }

    /// The effective on-disk run directory: `save_dir/nfft{N}_novlp{O}_nblks{B}`.
    pub fn run_dir(&self) -> PathBuf {
        self.save_dir.join(format!(
            "nfft{}_novlp{}_nblks{}",
            self.n_dft, self.n_ovlp, self.n_blks
        ))
    }

    /// Re-express the resolved parameters as explicit options: re-feeding
    /// these must reproduce bit-identical resolution.
    pub fn to_explicit_options(&self) -> SpodOptions {
        SpodOptions {
            window: Some(WindowSpec::Vector(self.window.to_vec())),
            weight: Some(self.weight.to_vec()),
            n_ovlp: Some(self.n_ovlp),
            dt: Some(self.dt),
            mean: Some(self.mean.to_vec()),
            is_complex: Some(self.is_complex),
            n_t: Some(self.n_t),
            conf_level: Some(self.conf_level),
            confidence_intervals: self.confidence_intervals,
            save_blocks: self.save_blocks,
            delete_blocks: self.delete_blocks,
            save_dir: Some(self.save_dir.clone()),
            save_freqs: self.save_freqs.clone(),
            n_save: Some(self.n_save),
        }
    }
}

/// Resolve spectral parameters for `provider` given `options`, applying
/// the window/overlap/timestep/weight/mean/block-count resolution rules
/// in order.
pub fn resolve(provider: &dyn SnapshotProvider, options: &SpodOptions) -> Result<SpodParams> {
    let shape = provider.shape().to_vec();
    let n_x = n_points(&shape);

    let n_t = if provider.is_eager() {
        provider.count()
    } else {
        match options.n_t {
            Some(n) => n,
            None => {
                tracing::warn!(
                    "no n_t supplied for a lazy snapshot provider; defaulting to 10000"
                );
                10000
            }
        }
    };

    // 1. Window.
    let (n_dft, window) = match &options.window {
        None => {
            let exponent = (n_t as f64 / 10.0).max(1.0).log2().floor() as u32;
            let n_dft = 1usize << exponent;
            (n_dft, hamming(n_dft))
        }
        Some(WindowSpec::Length(n)) => (*n, hamming(*n)),
        Some(WindowSpec::Vector(v)) => (v.len(), Array1::from_vec(v.clone())),
    };
    if n_dft < 4 {
        return Err(SpodError::Parameter(format!(
            "N_DFT must be >= 4, got {n_dft}"
        )));
    }
    let gain = window_gain(&window);

    // 2. Overlap.
    let n_ovlp = options.n_ovlp.unwrap_or(n_dft / 2);
    if n_ovlp > n_dft - 1 {
        return Err(SpodError::Parameter(format!(
            "N_ovlp ({n_ovlp}) must be <= N_DFT - 1 ({})",
            n_dft - 1
        )));
    }

    // 3. Timestep.
    let dt = options.dt.unwrap_or(1.0);
    if dt <= 0.0 {
        return Err(SpodError::Parameter(format!(
            "dt must be strictly positive, got {dt}"
        )));
    }

    // 4. Weight.
    let weight = match &options.weight {
        None => Array1::from_elem(n_x, 1.0),
        Some(w) => {
            if w.len() != n_x {
                return Err(SpodError::Parameter(format!(
                    "weight must have {n_x} elements, got {}",
                    w.len()
                )));
            }
            Array1::from_vec(w.clone())
        }
    };

    // 5. Mean.
    let mean = match &options.mean {
        Some(m) => {
            if m.len() != n_x {
                return Err(SpodError::Parameter(format!(
                    "mean must have {n_x} elements, got {}",
                    m.len()
                )));
            }
            Array1::from_vec(m.clone())
        }
        None => {
            if provider.is_eager() {
                temporal_mean(provider, &shape, n_x)?
            } else {
                tracing::warn!(
                    "no mean supplied to a lazy snapshot provider; using zero mean, \
                     low-frequency accuracy may degrade"
                );
                Array1::from_elem(n_x, Complex64::new(0.0, 0.0))
            }
        }
    };

    // is_complex override/inference.
    let is_complex = match options.is_complex {
        Some(b) => b,
        None => match provider.is_complex() {
            Some(b) => b,
            None => {
                let first = provider.get(0)?;
                first.iter().any(|c| c.im != 0.0)
            }
        },
    };

    // 6. Block count.
    if n_t < n_ovlp + 1 {
        return Err(SpodError::Parameter(format!(
            "N_t ({n_t}) too small for N_ovlp ({n_ovlp})"
        )));
    }
    let n_blks = (n_t - n_ovlp) / (n_dft - n_ovlp);
    if n_blks < 2 {
        return Err(SpodError::Parameter(format!(
            "N_blks must be >= 2, got {n_blks} (N_t={n_t}, N_DFT={n_dft}, N_ovlp={n_ovlp})"
        )));
    }

    let conf_level = options.conf_level.unwrap_or(0.95);
    if !(conf_level > 0.0 && conf_level < 1.0) {
        return Err(SpodError::Parameter(format!(
            "conf_level must be in (0, 1), got {conf_level}"
        )));
    }

    let n_save = options.n_save.unwrap_or(n_blks);
    let save_dir = options.save_dir.clone().unwrap_or_else(|| PathBuf::from("results"));

    Ok(SpodParams {
        n_dft,
        n_ovlp,
        n_blks,
        dt,
        window,
        window_gain: gain,
        weight,
        mean,
        is_complex,
        n_t,
        n_x,
        shape,
        conf_level,
        n_save,
        save_blocks: options.save_blocks,
        delete_blocks: options.delete_blocks,
        save_dir,
        save_freqs: options.save_freqs.clone(),
        confidence_intervals: options.confidence_intervals,
    })
}

fn temporal_mean(
    provider: &dyn SnapshotProvider,
    shape: &[usize],
    n_x: usize,
) -> Result<Array1<Complex64>> {
    let n_t = provider.count();
    let mut sum = Array1::<Complex64>::zeros(n_x);
    for i in 0..n_t {
        let snap = provider.get(i)?;
        let flat = crate::flatten::flatten_col_major(shape, &snap);
        sum = sum + flat;
    }
    Ok(sum / Complex64::new(n_t as f64, 0.0))
}
