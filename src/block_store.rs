//! Block store: an in-memory tensor, or on-disk sparse-frequency block
//! files, behind a uniform `put`/`read_frequency` interface.

use crate::error::{Result, SpodError};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use ndarray::Array2;
use num_complex::Complex64;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Seek, SeekFrom};
use std::path::{Path, PathBuf};

const BLOCK_MAGIC: u32 = 0x5350_4246; // "SPBF"

/// Uniform capability set for per-frequency Fourier data, shared by the
/// in-memory and streaming variants.
pub trait BlockStore: Send + Sync {
    /// Persist block `block_index`'s one-sided Fourier coefficients
    /// (shape `N_f x Nx`).
    fn put(&mut self, block_index: usize, q_hat: &Array2<Complex64>) -> Result<()>;

    /// Assemble the `Nx x N_blks` cross-spectral snapshot matrix at
    /// frequency `freq_index`.
    fn read_frequency(&self, freq_index: usize) -> Result<Array2<Complex64>>;

    /// Frequencies for which data is available.
    fn list_frequencies(&self) -> Vec<usize>;
}

/// Dense in-memory store: one `N_f x Nx` matrix per block.
pub struct InMemoryStore {
    blocks: Vec<Option<Array2<Complex64>>>,
    n_f: usize,
    n_x: usize,
    n_blks: usize,
}

impl InMemoryStore {
    pub fn new(n_f: usize, n_x: usize, n_blks: usize) -> Self {
        Self {
            blocks: vec![None; n_blks],
            n_f,
            n_x,
            n_blks,
        }
    }
}

impl BlockStore for InMemoryStore {
    fn put(&mut self, block_index: usize, q_hat: &Array2<Complex64>) -> Result<()> {
        self.blocks[block_index] = Some(q_hat.clone());
        Ok(())
    }

    fn read_frequency(&self, freq_index: usize) -> Result<Array2<Complex64>> {
        if freq_index >= self.n_f {
            return Err(SpodError::Lookup {
                freq: freq_index,
                mode: 0,
            });
        }
        let mut a = Array2::<Complex64>::zeros((self.n_x, self.n_blks));
        for b in 0..self.n_blks {
            let block = self.blocks[b].as_ref().ok_or(SpodError::Lookup {
                freq: freq_index,
                mode: 0,
            })?;
            a.column_mut(b).assign(&block.row(freq_index));
        }
        Ok(a)
    }

    fn list_frequencies(&self) -> Vec<usize> {
        (0..self.n_f).collect()
    }
}

/// On-disk store: one binary file per block under `dir`, storing only
/// the rows in `save_freqs` (a compact sparse encoding). Files are named
/// `fft_block{NNNN}`, 1-based, zero-padded to four digits.
pub struct StreamingStore {
    dir: PathBuf,
    save_freqs: Vec<usize>,
    n_f: usize,
    n_x: usize,
    n_blks: usize,
}

impl StreamingStore {
    pub fn new(
        dir: PathBuf,
        mut save_freqs: Vec<usize>,
        n_f: usize,
        n_x: usize,
        n_blks: usize,
    ) -> Result<Self> {
        fs::create_dir_all(&dir)?;
        save_freqs.sort_unstable();
        save_freqs.dedup();
        Ok(Self {
            dir,
            save_freqs,
            n_f,
            n_x,
            n_blks,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn block_path(&self, block_index: usize) -> PathBuf {
        self.dir.join(format!("fft_block{:04}", block_index + 1))
    }
}

impl BlockStore for StreamingStore {
    fn put(&mut self, block_index: usize, q_hat: &Array2<Complex64>) -> Result<()> {
        let path = self.block_path(block_index);
        tracing::debug!(block = block_index, path = %path.display(), "writing FFT block");
        let mut w = BufWriter::new(File::create(&path)?);
        w.write_u32::<LittleEndian>(BLOCK_MAGIC)?;
        w.write_u32::<LittleEndian>(1)?; // format version
        w.write_u32::<LittleEndian>(self.n_f as u32)?;
        w.write_u32::<LittleEndian>(self.n_x as u32)?;
        w.write_u32::<LittleEndian>(self.save_freqs.len() as u32)?;
        for &row in &self.save_freqs {
            w.write_u32::<LittleEndian>(row as u32)?;
            for col in 0..self.n_x {
                let c = q_hat[[row, col]];
                w.write_f64::<LittleEndian>(c.re)?;
                w.write_f64::<LittleEndian>(c.im)?;
            }
        }
        w.flush()?;
        Ok(())
    }

    fn read_frequency(&self, freq_index: usize) -> Result<Array2<Complex64>> {
        if !self.save_freqs.contains(&freq_index) {
            return Err(SpodError::Lookup {
                freq: freq_index,
                mode: 0,
            });
        }
        let mut a = Array2::<Complex64>::zeros((self.n_x, self.n_blks));
        for b in 0..self.n_blks {
            let path = self.block_path(b);
            let mut r = BufReader::new(File::open(&path)?);
            let _magic = r.read_u32::<LittleEndian>()?;
            let _version = r.read_u32::<LittleEndian>()?;
            let _n_f = r.read_u32::<LittleEndian>()?;
            let n_x = r.read_u32::<LittleEndian>()? as usize;
            let n_rows = r.read_u32::<LittleEndian>()?;
            let mut found = false;
            for _ in 0..n_rows {
                let row = r.read_u32::<LittleEndian>()? as usize;
                if row == freq_index {
                    for col in 0..n_x {
                        let re = r.read_f64::<LittleEndian>()?;
                        let im = r.read_f64::<LittleEndian>()?;
                        a[[col, b]] = Complex64::new(re, im);
                    }
                    found = true;
                    break;
                } else {
                    r.seek(SeekFrom::Current((n_x as i64) * 16))?;
                }
            }
            if !found {
                return Err(SpodError::Lookup {
                    freq: freq_index,
                    mode: 0,
                });
            }
        }
        Ok(a)
    }

    fn list_frequencies(&self) -> Vec<usize> {
        self.save_freqs.clone()
    }
}
