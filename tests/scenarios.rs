//! End-to-end scenario tests exercising `run_spod` as a whole, rather
//! than individual pipeline stages in isolation.

use ndarray::Array;
use num_complex::Complex64;
use spod_core::{run_spod, EagerProvider, SpodOptions};

fn white_noise(n_t: usize, n_x: usize) -> EagerProvider {
    // Deterministic pseudo-noise: no RNG state to thread through, but
    // with enough spread across (t, x) to avoid degenerate energies.
    let data = Array::from_shape_fn((n_t, n_x), |(t, x)| {
        let v = ((t * 48271 + x * 19937) % 10007) as f64 / 10007.0 - 0.5;
        v
    });
    EagerProvider::from_real(data.into_dyn())
}

fn tone(n_t: usize, n_x: usize, f0_bin: f64, n_dft: usize) -> EagerProvider {
    use std::f64::consts::PI;
    let data = Array::from_shape_fn((n_t, n_x), |(t, _x)| {
        (2.0 * PI * f0_bin / n_dft as f64 * t as f64).cos()
    });
    EagerProvider::from_real(data.into_dyn())
}

#[test]
fn s1_white_noise_sanity() {
    let provider = white_noise(1024, 8);
    let mut opts = SpodOptions::new();
    opts.mean = Some(vec![Complex64::new(0.0, 0.0); 8]);
    let out = run_spod(&provider, opts).unwrap();

    assert_eq!(out.l.nrows(), 33);
    assert_eq!(out.l.ncols(), 31);

    // Energy should be roughly flat across frequency and mode index: no
    // single bin or mode should dominate the total by more than an order
    // of magnitude relative to the mean.
    let total: f64 = out.l.sum();
    let mean_cell = total / (out.l.nrows() * out.l.ncols()) as f64;
    let max_cell = out.l.iter().cloned().fold(0.0_f64, f64::max);
    assert!(max_cell < 50.0 * mean_cell, "max={max_cell}, mean={mean_cell}");
}

#[test]
fn s2_pure_tone_dominates_one_bin_and_mode() {
    let n_dft = 64;
    let f0_bin = 5.0;
    let provider = tone(2048, 6, f0_bin, n_dft);
    let mut opts = SpodOptions::new();
    opts.window = Some(spod_core::WindowSpec::Length(n_dft));
    opts.mean = Some(vec![Complex64::new(0.0, 0.0); 6]);
    let out = run_spod(&provider, opts).unwrap();

    let i0 = f0_bin as usize;
    let row = out.l.row(i0);
    let total: f64 = row.sum();
    assert!(row[0] / total > 0.95, "L[i0,0]/total = {}", row[0] / total);

    // Away from the tone's bin, energy should be much smaller.
    let other_row_total: f64 = out.l.row(i0 + 3).sum();
    assert!(row[0] > 20.0 * other_row_total);
}

#[test]
fn s4_weighted_inner_product_invariance() {
    let n_t = 1024;
    let n_x = 6;
    let provider = white_noise(n_t, n_x);

    let mut baseline_opts = SpodOptions::new();
    baseline_opts.mean = Some(vec![Complex64::new(0.0, 0.0); n_x]);
    let baseline = run_spod(&provider, baseline_opts).unwrap();

    // Rescale each spatial point by sqrt(1/w) and solve again with weight
    // w; the weighted inner product on the rescaled data should recover
    // the same energies as the uniform-weight baseline on the original.
    let weight: Vec<f64> = (0..n_x).map(|i| 1.0 + i as f64).collect();
    let flat: Vec<f64> = (0..n_t)
        .flat_map(|t| {
            let snap = provider.get(t).unwrap();
            (0..n_x).map(move |x| snap[[x]].re / weight[x].sqrt())
        })
        .collect();
    let rescaled = EagerProvider::from_real_vec(flat, n_t, vec![n_x]).unwrap();
    let mut opts_weighted = SpodOptions::new();
    opts_weighted.weight = Some(weight);
    opts_weighted.mean = Some(vec![Complex64::new(0.0, 0.0); n_x]);
    let out_weighted = run_spod(&rescaled, opts_weighted).unwrap();

    for i in [1usize, 5, 10] {
        let a = baseline.l.row(i)[0];
        let b = out_weighted.l.row(i)[0];
        let rel = (a - b).abs() / a.max(b).max(1e-12);
        assert!(rel < 0.05, "frequency {i}: baseline={a}, weighted={b}");
    }
}

#[test]
fn s5_streaming_matches_in_memory() {
    let provider = white_noise(1024, 8);

    let mut in_memory_opts = SpodOptions::new();
    in_memory_opts.mean = Some(vec![Complex64::new(0.0, 0.0); 8]);
    let in_memory = run_spod(&provider, in_memory_opts).unwrap();

    let mut save_freqs = std::collections::HashSet::new();
    save_freqs.insert(5usize);
    save_freqs.insert(17usize);

    let dir = std::env::temp_dir().join(format!(
        "spod_core_test_{}_s5_streaming",
        std::process::id()
    ));
    let mut streaming_opts = SpodOptions::new();
    streaming_opts.mean = Some(vec![Complex64::new(0.0, 0.0); 8]);
    streaming_opts.save_blocks = true;
    streaming_opts.save_freqs = Some(save_freqs);
    streaming_opts.save_dir = Some(dir.clone());
    streaming_opts.delete_blocks = false;
    let streaming = run_spod(&provider, streaming_opts).unwrap();

    for (row, &freq_index) in streaming.freq_indices.iter().enumerate() {
        assert!(freq_index == 5 || freq_index == 17);
        let in_memory_row = in_memory.l.row(freq_index);
        let streaming_row = streaming.l.row(row);
        for j in 0..in_memory_row.len() {
            assert!(
                (in_memory_row[j] - streaming_row[j]).abs() < 1e-9,
                "freq {freq_index}, mode {j}: in_memory={}, streaming={}",
                in_memory_row[j],
                streaming_row[j]
            );
        }

        let mode_in_memory = in_memory.modes.mode(freq_index, 0).unwrap();
        let mode_streaming = streaming.modes.mode(freq_index, 0).unwrap();
        for (a, b) in mode_in_memory.iter().zip(mode_streaming.iter()) {
            assert!((a - b).norm() < 1e-9);
        }
    }

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn s6_confidence_bounds_match_closed_form() {
    let provider = white_noise(1024, 8);
    let mut opts = SpodOptions::new();
    opts.mean = Some(vec![Complex64::new(0.0, 0.0); 8]);
    opts.conf_level = Some(0.95);
    let out = run_spod(&provider, opts).unwrap();
    let lc = out.lc.expect("confidence intervals requested");

    let (lo_factor, hi_factor) = spod_core::confidence::bound_factors(31, 0.95);
    for i in 0..out.l.nrows() {
        for j in 0..out.l.ncols() {
            let l = out.l[[i, j]];
            let expected_lo = l * lo_factor;
            let expected_hi = l * hi_factor;
            assert!((lc[[i, j, 0]] - expected_lo).abs() < 1e-9);
            assert!((lc[[i, j, 1]] - expected_hi).abs() < 1e-9);
        }
    }
}

#[test]
fn s3_complex_two_tone_resolves_both_bins() {
    use std::f64::consts::PI;
    let n_t = 2048usize;
    let n_dft = 64usize;
    let f_pos = 5.0;
    let f_neg = -7.0;
    let data = Array::from_shape_fn((n_t, 4usize), |(t, _x)| {
        let phase_pos = 2.0 * PI * f_pos / n_dft as f64 * t as f64;
        let phase_neg = 2.0 * PI * f_neg / n_dft as f64 * t as f64;
        Complex64::from_polar(1.0, phase_pos) + Complex64::from_polar(1.0, phase_neg)
    });
    let provider = EagerProvider::from_complex(data.into_dyn());

    let mut opts = SpodOptions::new();
    opts.window = Some(spod_core::WindowSpec::Length(n_dft));
    opts.is_complex = Some(true);
    opts.mean = Some(vec![Complex64::new(0.0, 0.0); 4]);
    let out = run_spod(&provider, opts).unwrap();

    assert_eq!(out.l.nrows(), n_dft);

    let bin_pos = f_pos as usize;
    let bin_neg = (n_dft as i64 + f_neg as i64) as usize;
    let total: f64 = out.l.sum();
    let energy_pos = out.l.row(bin_pos).sum::<f64>();
    let energy_neg = out.l.row(bin_neg).sum::<f64>();
    assert!((energy_pos + energy_neg) / total > 0.8);
}
