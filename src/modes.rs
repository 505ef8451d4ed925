//! Mode accessor: returns the j-th SPOD mode at frequency i, either from
//! an in-memory tensor or by lazy disk read.

use crate::error::{Result, SpodError};
use crate::flatten::unflatten_col_major;
use crate::metadata::RunMetadata;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use ndarray::{Array1, Array2, ArrayD, Axis};
use num_complex::Complex64;
use std::fs::File;
use std::io::{BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const MODE_MAGIC: u32 = 0x5350_4446; // "SPDF"

fn mode_path(dir: &Path, freq_index: usize) -> PathBuf {
    dir.join(format!("spod_f{:04}", freq_index + 1))
}

/// Write the leading `n_save` columns of `psi` (`Nx x N_blks`) to
/// `dir/spod_f{NNNN}`.
pub fn write_mode_file(
    dir: &Path,
    freq_index: usize,
    n_save: usize,
    psi: &Array2<Complex64>,
) -> Result<()> {
    let n_x = psi.nrows();
    let n_save = n_save.min(psi.ncols());
    let path = mode_path(dir, freq_index);
    let mut w = BufWriter::new(File::create(&path)?);
    w.write_u32::<LittleEndian>(MODE_MAGIC)?;
    w.write_u32::<LittleEndian>(n_x as u32)?;
    w.write_u32::<LittleEndian>(n_save as u32)?;
    for j in 0..n_save {
        for i in 0..n_x {
            let c = psi[[i, j]];
            w.write_f64::<LittleEndian>(c.re)?;
            w.write_f64::<LittleEndian>(c.im)?;
        }
    }
    w.flush()?;
    Ok(())
}

enum Storage {
    InMemory {
        /// One `Nx x N_blks` mode matrix per frequency, indexed by
        /// frequency index.
        modes: Array1<Array2<Complex64>>,
    },
    Streaming {
        dir: PathBuf,
        n_save: usize,
    },
}

/// Accessor object exposing modes by positional `(frequency, rank)`
/// index, backed by either an in-memory tensor or on-disk mode files.
pub struct ModeAccessor {
    shape: Vec<usize>,
    storage: Storage,
}

impl ModeAccessor {
    /// Build an in-memory accessor from one `Nx x N_blks` mode matrix per
    /// frequency (index `i` into the outer vector is the frequency index).
    pub fn in_memory(shape: Vec<usize>, modes_by_freq: Vec<Array2<Complex64>>) -> Self {
        Self {
            shape,
            storage: Storage::InMemory {
                modes: Array1::from_vec(modes_by_freq),
            },
        }
    }

    /// Build a streaming accessor directly from a run's resolved
    /// parameters (used right after a run completes).
    pub fn streaming(shape: Vec<usize>, dir: PathBuf, n_save: usize) -> Self {
        Self {
            shape,
            storage: Storage::Streaming { dir, n_save },
        }
    }

    /// Reopen a streaming accessor from a run directory alone, reading
    /// `meta.json` for shape and mode-count metadata.
    pub fn open(dir: &Path) -> Result<Self> {
        let meta = RunMetadata::read(dir)?;
        Ok(Self {
            shape: meta.shape,
            storage: Storage::Streaming {
                dir: dir.to_path_buf(),
                n_save: meta.n_save,
            },
        })
    }

    /// Return the `j`-th mode at frequency `i`, reshaped to the spatial
    /// shape `S`.
    pub fn mode(&self, i: usize, j: usize) -> Result<ArrayD<Complex64>> {
        match &self.storage {
            Storage::InMemory { modes } => {
                let block = modes.get(i).ok_or(SpodError::Lookup { freq: i, mode: j })?;
                if j >= block.ncols() {
                    return Err(SpodError::Lookup { freq: i, mode: j });
                }
                let col = block.index_axis(Axis(1), j).to_owned();
                Ok(unflatten_col_major(&self.shape, &col))
            }
            Storage::Streaming { dir, n_save } => {
                if j >= *n_save {
                    return Err(SpodError::Lookup { freq: i, mode: j });
                }
                let path = mode_path(dir, i);
                let mut r = BufReader::new(
                    File::open(&path).map_err(|_| SpodError::Lookup { freq: i, mode: j })?,
                );
                let _magic = r.read_u32::<LittleEndian>()?;
                let n_x = r.read_u32::<LittleEndian>()? as usize;
                let n_save_file = r.read_u32::<LittleEndian>()? as usize;
                if j >= n_save_file {
                    return Err(SpodError::Lookup { freq: i, mode: j });
                }
                r.seek(SeekFrom::Current((j * n_x * 16) as i64))?;
                let mut col = Array1::<Complex64>::zeros(n_x);
                for k in 0..n_x {
                    let re = r.read_f64::<LittleEndian>()?;
                    let im = r.read_f64::<LittleEndian>()?;
                    col[k] = Complex64::new(re, im);
                }
                Ok(unflatten_col_major(&self.shape, &col))
            }
        }
    }
}
