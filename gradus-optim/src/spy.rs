//! Text dumps of sparsity patterns.
//!
//! Each matrix is written as one line per row with `+` for a positive entry,
//! `-` for a negative one and `.` otherwise. Successive matrices in a file are
//! separated by a blank line.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use sprs::CsMat;

use crate::error::SpyError;

/// Write the pattern of `mat` to `out`.
pub fn write_pattern<W: Write>(out: &mut W, mat: &CsMat<f64>) -> io::Result<()> {
    let (rows, cols) = mat.shape();
    let mut grid = vec![b'.'; rows * cols];
    for (&v, (r, c)) in mat.iter() {
        grid[r * cols + c] = if v > 0.0 {
            b'+'
        } else if v < 0.0 {
            b'-'
        } else {
            b'.'
        };
    }
    for r in 0..rows {
        out.write_all(&grid[r * cols..(r + 1) * cols])?;
        out.write_all(b"\n")?;
    }
    out.write_all(b"\n")
}

/// One spy file, appended to once per iteration.
pub struct Spy {
    path: PathBuf,
    out: BufWriter<File>,
}

impl Spy {
    /// Create (or truncate) `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, SpyError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|source| SpyError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Spy {
            path,
            out: BufWriter::new(file),
        })
    }

    pub fn add(&mut self, mat: &CsMat<f64>) -> Result<(), SpyError> {
        write_pattern(&mut self.out, mat)
            .and_then(|()| self.out.flush())
            .map_err(|source| SpyError::Io {
                path: self.path.display().to_string(),
                source,
            })
    }
}

/// The `H.spy`, `A_e.spy` and `A_i.spy` files of one solve.
///
/// I/O failures are logged once and stop further spying; they never abort
/// the solve.
pub(crate) struct SpyFiles {
    files: Option<[Spy; 3]>,
}

impl SpyFiles {
    pub(crate) fn open(enabled: bool) -> Self {
        if !enabled {
            return SpyFiles { files: None };
        }
        let opened = (|| -> Result<[Spy; 3], SpyError> {
            Ok([
                Spy::create("H.spy")?,
                Spy::create("A_e.spy")?,
                Spy::create("A_i.spy")?,
            ])
        })();
        match opened {
            Ok(files) => SpyFiles { files: Some(files) },
            Err(e) => {
                tracing::warn!("{e}; spy output disabled");
                SpyFiles { files: None }
            }
        }
    }

    pub(crate) fn record(&mut self, h: &CsMat<f64>, a_e: &CsMat<f64>, a_i: &CsMat<f64>) {
        let Some([h_spy, a_e_spy, a_i_spy]) = self.files.as_mut() else {
            return;
        };
        let result = h_spy
            .add(h)
            .and_then(|()| a_e_spy.add(a_e))
            .and_then(|()| a_i_spy.add(a_i));
        if let Err(e) = result {
            tracing::warn!("{e}; spy output disabled");
            self.files = None;
        }
    }
}
