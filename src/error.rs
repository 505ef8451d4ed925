//! Typed error taxonomy for the SPOD pipeline.
//!
//! `ParameterError` and `ShapeError` are raised before any I/O occurs;
//! `IoError` surfaces block-store/mode-store failures; `Lookup` covers
//! out-of-range or unsaved-frequency mode requests. `NumericWarning` is
//! advisory rather than fatal and is emitted as a `tracing::warn!` event
//! at its call sites instead of a variant here.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpodError {
    #[error("invalid spectral parameters: {0}")]
    Parameter(String),

    #[error("snapshot shape mismatch: expected {expected:?}, got {got:?}")]
    Shape {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("block store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON metadata error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("mode lookup out of range: frequency index {freq}, mode index {mode}")]
    Lookup { freq: usize, mode: usize },
}

pub type Result<T> = std::result::Result<T, SpodError>;
