//! Metadata sidecar (`meta.json`) for streaming runs: lets a
//! `ModeAccessor` reconstruct spatial shape and mode counts from a run
//! directory alone, without the original `SpodParams`.

use crate::error::Result;
use crate::params::SpodParams;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub shape: Vec<usize>,
    pub n_dft: usize,
    pub n_ovlp: usize,
    pub n_blks: usize,
    pub dt: f64,
    pub n_save: usize,
    pub is_complex: bool,
    pub conf_level: f64,
    pub save_freqs: Vec<usize>,
}

impl RunMetadata {
    pub fn from_params(params: &SpodParams, save_freqs: &[usize]) -> Self {
        Self {
            shape: params.shape.clone(),
            n_dft: params.n_dft,
            n_ovlp: params.n_ovlp,
            n_blks: params.n_blks,
            dt: params.dt,
            n_save: params.n_save,
            is_complex: params.is_complex,
            conf_level: params.conf_level,
            save_freqs: save_freqs.to_vec(),
        }
    }

    pub fn write(&self, dir: &Path) -> Result<()> {
        let path = dir.join("meta.json");
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn read(dir: &Path) -> Result<Self> {
        let path = dir.join("meta.json");
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}
