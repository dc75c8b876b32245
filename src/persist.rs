//! On-disk persistence for similarity indices.
//!
//! A persisted index is a single binary file: a four-byte format tag
//! followed by a bincode-encoded archive. The archive always carries `q`;
//! presence of `z` distinguishes the long form from the short form, and
//! presence of the node list distinguishes a bound index from a plain one.
//! No content sniffing: the tag at the head of the file is the dispatch
//! mechanism.
//!
//! Files written before the tag was introduced are still readable: an
//! untagged file is decoded through the legacy layout (`q` plus optional
//! `z`, no node list).

use std::fs;
use std::path::Path;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::arrays::{Array, Array2};
use smartcore::linalg::basic::matrix::DenseMatrix;

use crate::error::SimError;
use crate::index::{BoundIndex, SimIndex};

/// Format tag written at the head of every archive.
pub const MAGIC: &[u8; 4] = b"SDX1";

#[derive(Serialize, Deserialize)]
struct MatrixData {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl MatrixData {
    fn from_matrix(m: &DenseMatrix<f64>) -> Self {
        let (rows, cols) = m.shape();
        let mut data = Vec::with_capacity(rows * cols);
        for i in 0..rows {
            for j in 0..cols {
                data.push(*m.get((i, j)));
            }
        }
        Self { rows, cols, data }
    }

    fn into_matrix(self, path: &Path, name: &str) -> Result<DenseMatrix<f64>, SimError> {
        if self.data.len() != self.rows * self.cols {
            return Err(SimError::format(
                path.display().to_string(),
                format!(
                    "array '{}' claims {}x{} but holds {} values",
                    name,
                    self.rows,
                    self.cols,
                    self.data.len()
                ),
            ));
        }
        Ok(DenseMatrix::from_iterator(
            self.data.into_iter(),
            self.rows,
            self.cols,
            0,
        ))
    }
}

#[derive(Serialize, Deserialize)]
struct Archive {
    q: MatrixData,
    q_im: Option<MatrixData>,
    z: Option<MatrixData>,
    z_im: Option<MatrixData>,
    nodes: Option<Vec<String>>,
    imag_tol: f64,
}

/// Pre-tag layout: `q` plus optional `z`, plain indices only.
#[derive(Deserialize)]
struct LegacyArchive {
    q: MatrixData,
    z: Option<MatrixData>,
}

/// What a file turned out to contain.
pub enum Loaded {
    Plain(SimIndex),
    Bound(BoundIndex),
}

impl Loaded {
    /// The index either way, discarding the node mapping if present.
    pub fn into_index(self) -> SimIndex {
        match self {
            Loaded::Plain(index) => index,
            Loaded::Bound(bound) => bound.into_inner(),
        }
    }
}

fn write_archive(archive: &Archive, path: &Path) -> Result<(), SimError> {
    let payload = bincode::serialize(archive)
        .map_err(|e| SimError::format(path.display().to_string(), e.to_string()))?;
    let mut bytes = MAGIC.to_vec();
    bytes.extend_from_slice(&payload);
    fs::write(path, bytes)
        .map_err(|e| SimError::io(format!("writing index file '{}'", path.display()), e))?;
    debug!("Wrote {} byte archive to '{}'", payload.len() + MAGIC.len(), path.display());
    Ok(())
}

fn archive_of(index: &SimIndex, nodes: Option<Vec<String>>) -> Archive {
    Archive {
        q: MatrixData::from_matrix(index.q()),
        q_im: index.q_im().map(MatrixData::from_matrix),
        z: index.z().map(MatrixData::from_matrix),
        z_im: index.z_im().map(MatrixData::from_matrix),
        nodes,
        imag_tol: index.imag_tol(),
    }
}

/// Saves an unbound index.
pub fn save_plain(index: &SimIndex, path: impl AsRef<Path>) -> Result<(), SimError> {
    let path = path.as_ref();
    info!("Saving plain index ({} nodes) to '{}'", index.len(), path.display());
    write_archive(&archive_of(index, None), path)
}

/// Saves an index together with its node mapping.
pub fn save_bound(bound: &BoundIndex, path: impl AsRef<Path>) -> Result<(), SimError> {
    let path = path.as_ref();
    info!("Saving bound index ({} nodes) to '{}'", bound.len(), path.display());
    write_archive(&archive_of(bound.inner(), Some(bound.node_list().to_vec())), path)
}

fn index_from_parts(
    path: &Path,
    q: MatrixData,
    q_im: Option<MatrixData>,
    z: Option<MatrixData>,
    z_im: Option<MatrixData>,
    imag_tol: f64,
) -> Result<SimIndex, SimError> {
    let q = q.into_matrix(path, "q")?;
    match z {
        Some(z) => {
            let z = z.into_matrix(path, "z")?;
            let q_im = q_im.map(|m| m.into_matrix(path, "q_im")).transpose()?;
            let z_im = z_im.map(|m| m.into_matrix(path, "z_im")).transpose()?;
            Ok(SimIndex::long_complex(q, q_im, z, z_im).with_imag_tol(imag_tol))
        }
        None => {
            if q_im.is_some() || z_im.is_some() {
                return Err(SimError::format(
                    path.display().to_string(),
                    "imaginary arrays present without 'z'; short form must be real",
                ));
            }
            Ok(SimIndex::short(q).with_imag_tol(imag_tol))
        }
    }
}

/// Loads an index file, dispatching on the format tag.
pub fn load(path: impl AsRef<Path>) -> Result<Loaded, SimError> {
    let path = path.as_ref();
    let bytes = fs::read(path)
        .map_err(|e| SimError::io(format!("reading index file '{}'", path.display()), e))?;

    if let Some(payload) = bytes.strip_prefix(MAGIC) {
        let archive: Archive = bincode::deserialize(payload)
            .map_err(|e| SimError::format(path.display().to_string(), e.to_string()))?;
        let index = index_from_parts(
            path,
            archive.q,
            archive.q_im,
            archive.z,
            archive.z_im,
            archive.imag_tol,
        )?;
        return match archive.nodes {
            Some(nodes) => {
                info!(
                    "Loaded bound index with {} nodes from '{}'",
                    nodes.len(),
                    path.display()
                );
                Ok(Loaded::Bound(BoundIndex::bind(index, nodes)?))
            }
            None => {
                info!("Loaded plain index with {} nodes from '{}'", index.len(), path.display());
                Ok(Loaded::Plain(index))
            }
        };
    }

    // Untagged file: legacy plain layout.
    debug!("No format tag in '{}', trying legacy layout", path.display());
    let legacy: LegacyArchive = bincode::deserialize(&bytes).map_err(|e| {
        SimError::format(
            path.display().to_string(),
            format!("neither tagged nor legacy layout: {}", e),
        )
    })?;
    let index = index_from_parts(path, legacy.q, None, legacy.z, None, crate::index::IMAG_TOL)?;
    info!(
        "Loaded legacy plain index with {} nodes from '{}'",
        index.len(),
        path.display()
    );
    Ok(Loaded::Plain(index))
}

/// Serializes a plain index through the legacy untagged layout. Kept for
/// interoperability tests and for producing files older readers accept.
pub fn save_legacy(index: &SimIndex, path: impl AsRef<Path>) -> Result<(), SimError> {
    #[derive(Serialize)]
    struct LegacyOut {
        q: MatrixData,
        z: Option<MatrixData>,
    }
    let path = path.as_ref();
    let out = LegacyOut {
        q: MatrixData::from_matrix(index.q()),
        z: index.z().map(MatrixData::from_matrix),
    };
    let payload = bincode::serialize(&out)
        .map_err(|e| SimError::format(path.display().to_string(), e.to_string()))?;
    fs::write(path, payload)
        .map_err(|e| SimError::io(format!("writing index file '{}'", path.display()), e))?;
    Ok(())
}
