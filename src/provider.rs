//! Snapshot provider abstraction: a polymorphic capability over an eager
//! in-memory array or a lazy per-snapshot callback.

use crate::error::{Result, SpodError};
use ndarray::{ArrayD, Axis, IxDyn};
use num_complex::Complex64;

/// Capability set for a time-ordered sequence of spatially-indexed
/// snapshots. Implementors must return snapshots of identical shape for
/// every index; a mismatch is a fatal `SpodError::Shape`.
pub trait SnapshotProvider: Send + Sync {
    /// Spatial shape `S = (s1, .., sd)`.
    fn shape(&self) -> &[usize];

    /// Total snapshot count `N_t`.
    fn count(&self) -> usize;

    /// Fetch snapshot `i`, flattened internally to `Complex64` regardless
    /// of whether the underlying data is real.
    fn get(&self, i: usize) -> Result<ArrayD<Complex64>>;

    /// Whether the source data is genuinely complex-valued. `None` means
    /// unknown; the resolver infers it by peeking at `get(0)`.
    fn is_complex(&self) -> Option<bool> {
        None
    }

    /// Whether this provider already holds every snapshot in memory
    /// (governs whether the temporal mean can be computed by default).
    fn is_eager(&self) -> bool {
        false
    }
}

fn check_shape(expected: &[usize], snapshot: &ArrayD<Complex64>) -> Result<()> {
    if snapshot.shape() != expected {
        return Err(SpodError::Shape {
            expected: expected.to_vec(),
            got: snapshot.shape().to_vec(),
        });
    }
    Ok(())
}

/// An eager provider that already holds all `N_t` snapshots, time-major:
/// shape `[N_t, s1, .., sd]`.
pub struct EagerProvider {
    data: ArrayD<Complex64>,
    shape: Vec<usize>,
    is_complex: bool,
}

impl EagerProvider {
    /// Build from a complex time-major tensor.
    pub fn from_complex(data: ArrayD<Complex64>) -> Self {
        let shape = data.shape()[1..].to_vec();
        Self {
            data,
            shape,
            is_complex: true,
        }
    }

    /// Build from a real time-major tensor; imaginary parts are zero.
    pub fn from_real(data: ArrayD<f64>) -> Self {
        let shape = data.shape()[1..].to_vec();
        let complex = data.mapv(|x| Complex64::new(x, 0.0));
        Self {
            data: complex,
            shape,
            is_complex: false,
        }
    }

    /// Build from a flat `Vec<f64>` laid out `[N_t, Nx]` plus an explicit
    /// spatial shape, for callers without an existing `ndarray` array.
    pub fn from_real_vec(flat: Vec<f64>, n_t: usize, shape: Vec<usize>) -> Result<Self> {
        let nx = crate::flatten::n_points(&shape);
        if flat.len() != n_t * nx {
            return Err(SpodError::Parameter(format!(
                "expected {} values ({} snapshots x {} spatial points), got {}",
                n_t * nx,
                n_t,
                nx,
                flat.len()
            )));
        }
        let mut full_shape = vec![n_t];
        full_shape.extend_from_slice(&shape);
        let arr = ArrayD::from_shape_vec(IxDyn(&full_shape), flat)
            .map_err(|e| SpodError::Parameter(e.to_string()))?;
        Ok(Self::from_real(arr))
    }

    /// Build from a flat `Vec<Complex64>` laid out `[N_t, Nx]` plus an
    /// explicit spatial shape.
    pub fn from_complex_vec(
        flat: Vec<Complex64>,
        n_t: usize,
        shape: Vec<usize>,
    ) -> Result<Self> {
        let nx = crate::flatten::n_points(&shape);
        if flat.len() != n_t * nx {
            return Err(SpodError::Parameter(format!(
                "expected {} values ({} snapshots x {} spatial points), got {}",
                n_t * nx,
                n_t,
                nx,
                flat.len()
            )));
        }
        let mut full_shape = vec![n_t];
        full_shape.extend_from_slice(&shape);
        let arr = ArrayD::from_shape_vec(IxDyn(&full_shape), flat)
            .map_err(|e| SpodError::Parameter(e.to_string()))?;
        Ok(Self::from_complex(arr))
    }
}

impl SnapshotProvider for EagerProvider {
    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn count(&self) -> usize {
        self.data.shape()[0]
    }

    fn get(&self, i: usize) -> Result<ArrayD<Complex64>> {
        if i >= self.count() {
            return Err(SpodError::Lookup { freq: i, mode: 0 });
        }
        let snap = self.data.index_axis(Axis(0), i).to_owned();
        check_shape(&self.shape, &snap)?;
        Ok(snap)
    }

    fn is_complex(&self) -> Option<bool> {
        Some(self.is_complex)
    }

    fn is_eager(&self) -> bool {
        true
    }
}

/// A lazy provider that materializes one snapshot at a time via a
/// user-supplied callback. `N_t` must be supplied up front (it cannot be
/// discovered by peeking).
pub struct LazyProvider<F>
where
    F: Fn(usize) -> Result<ArrayD<Complex64>> + Send + Sync,
{
    getter: F,
    shape: Vec<usize>,
    count: usize,
    is_complex: Option<bool>,
}

impl<F> LazyProvider<F>
where
    F: Fn(usize) -> Result<ArrayD<Complex64>> + Send + Sync,
{
    pub fn new(shape: Vec<usize>, count: usize, is_complex: Option<bool>, getter: F) -> Self {
        Self {
            getter,
            shape,
            count,
            is_complex,
        }
    }
}

impl<F> SnapshotProvider for LazyProvider<F>
where
    F: Fn(usize) -> Result<ArrayD<Complex64>> + Send + Sync,
{
    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn count(&self) -> usize {
        self.count
    }

    fn get(&self, i: usize) -> Result<ArrayD<Complex64>> {
        if i >= self.count {
            return Err(SpodError::Lookup { freq: i, mode: 0 });
        }
        let snap = (self.getter)(i)?;
        check_shape(&self.shape, &snap)?;
        Ok(snap)
    }

    fn is_complex(&self) -> Option<bool> {
        self.is_complex
    }
}
