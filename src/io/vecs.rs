//! Readers and writers for the `.fvecs` / `.ivecs` dataset formats.
//!
//! Both formats are a plain sequence of records with no file header:
//!
//! ```text
//! [dim: i32 LE][dim elements, 4 bytes each, LE]
//! ```
//!
//! `.fvecs` elements are `f32`, `.ivecs` elements are `i32`. Base and query
//! sets are fvecs with one dimension for every record. Ground-truth files
//! are ivecs whose rows may differ in length.
//!
//! Files are memory-mapped, validated, then decoded into owned buffers, so
//! the mapping is released before the reader returns.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use thiserror::Error;
use tracing::debug;

use crate::vector::{VectorDimension, VectorError, VectorId, VectorStore};

const WORD: usize = 4;

#[derive(Error, Debug)]
pub enum VecsError {
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(
        "'{path}' contains no records\nSuggestion: Check that the dataset was downloaded completely"
    )]
    Empty { path: PathBuf },

    #[error(
        "Record {record} in '{path}' is truncated\nSuggestion: The file is incomplete or not in vecs format"
    )]
    Truncated { path: PathBuf, record: usize },

    #[error("Record {record} in '{path}' has dimension {actual}, expected {expected}")]
    InconsistentDimension {
        path: PathBuf,
        record: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Record {record} in '{path}' declares invalid dimension {dimension}")]
    InvalidDimension {
        path: PathBuf,
        record: usize,
        dimension: i32,
    },

    #[error("Record {record} in '{path}' holds negative id {id}")]
    NegativeId { path: PathBuf, record: usize, id: i32 },

    #[error("Vector error: {0}")]
    Vector(#[from] VectorError),
}

/// Nearest-neighbor id lists, one row per query. Rows may differ in length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroundTruth {
    offsets: Vec<usize>,
    ids: Vec<VectorId>,
}

impl GroundTruth {
    /// Builds ground truth from per-query id rows.
    pub fn from_rows<I, R>(rows: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: AsRef<[VectorId]>,
    {
        let mut offsets = vec![0];
        let mut ids = Vec::new();
        for row in rows {
            ids.extend_from_slice(row.as_ref());
            offsets.push(ids.len());
        }
        Self { offsets, ids }
    }

    /// Number of queries covered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Neighbor ids for query `index`, nearest first.
    ///
    /// # Panics
    /// Panics if `index >= len()`.
    #[must_use]
    pub fn row(&self, index: usize) -> &[VectorId] {
        &self.ids[self.offsets[index]..self.offsets[index + 1]]
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &[VectorId]> + '_ {
        self.offsets.windows(2).map(|w| &self.ids[w[0]..w[1]])
    }
}

/// One decoded record header plus its raw payload.
struct Record<'a> {
    dimension: usize,
    payload: &'a [u8],
}

/// Walks the records of a mapped file, checking each length prefix.
struct Records<'a> {
    bytes: &'a [u8],
    path: &'a Path,
    offset: usize,
    index: usize,
}

impl<'a> Records<'a> {
    fn new(bytes: &'a [u8], path: &'a Path) -> Self {
        Self {
            bytes,
            path,
            offset: 0,
            index: 0,
        }
    }

    fn truncated(&self) -> VecsError {
        VecsError::Truncated {
            path: self.path.to_path_buf(),
            record: self.index,
        }
    }
}

impl<'a> Iterator for Records<'a> {
    type Item = Result<Record<'a>, VecsError>;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = &self.bytes[self.offset..];
        if rest.is_empty() {
            return None;
        }
        let Some(prefix) = rest.first_chunk::<WORD>() else {
            self.offset = self.bytes.len();
            return Some(Err(self.truncated()));
        };

        let declared = i32::from_le_bytes(*prefix);
        let Ok(dimension) = usize::try_from(declared) else {
            self.offset = self.bytes.len();
            return Some(Err(VecsError::InvalidDimension {
                path: self.path.to_path_buf(),
                record: self.index,
                dimension: declared,
            }));
        };

        let end = WORD + dimension * WORD;
        if rest.len() < end {
            self.offset = self.bytes.len();
            return Some(Err(self.truncated()));
        }

        self.offset += end;
        self.index += 1;
        Some(Ok(Record {
            dimension,
            payload: &rest[WORD..end],
        }))
    }
}

fn map_file(path: &Path) -> Result<Mmap, VecsError> {
    let io_error = |source| VecsError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(io_error)?;
    if file.metadata().map_err(io_error)?.len() == 0 {
        return Err(VecsError::Empty {
            path: path.to_path_buf(),
        });
    }
    // SAFETY: the mapping is read-only and dropped before returning to the
    // caller; concurrent truncation by another process is not supported.
    unsafe { Mmap::map(&file) }.map_err(io_error)
}

fn words(payload: &[u8]) -> impl Iterator<Item = [u8; WORD]> + '_ {
    payload
        .chunks_exact(WORD)
        .map(|chunk| [chunk[0], chunk[1], chunk[2], chunk[3]])
}

/// Reads an `.fvecs` file into an aligned store.
///
/// Every record must declare the same non-zero dimension.
pub fn read_fvecs(path: impl AsRef<Path>) -> Result<VectorStore, VecsError> {
    let path = path.as_ref();
    let mmap = map_file(path)?;

    let mut dimension = None;
    let mut count = 0;
    for (index, record) in Records::new(&mmap, path).enumerate() {
        let record = record?;
        let expected = *dimension.get_or_insert(record.dimension);
        if record.dimension != expected {
            return Err(VecsError::InconsistentDimension {
                path: path.to_path_buf(),
                record: index,
                expected,
                actual: record.dimension,
            });
        }
        count += 1;
    }

    let dim = dimension.unwrap_or(0);
    if dim == 0 {
        return Err(VecsError::InvalidDimension {
            path: path.to_path_buf(),
            record: 0,
            dimension: 0,
        });
    }

    let mut store = VectorStore::zeroed(VectorDimension::new(dim)?, count)?;
    let values = store.as_flat_mut();
    for (row, record) in Records::new(&mmap, path).enumerate() {
        let record = record?;
        let out = &mut values[row * dim..(row + 1) * dim];
        for (slot, word) in out.iter_mut().zip(words(record.payload)) {
            *slot = f32::from_le_bytes(word);
        }
    }

    debug!(path = %path.display(), vectors = count, dimension = dim, "loaded fvecs");
    Ok(store)
}

/// Reads an `.ivecs` ground-truth file.
pub fn read_ivecs(path: impl AsRef<Path>) -> Result<GroundTruth, VecsError> {
    let path = path.as_ref();
    let mmap = map_file(path)?;

    let mut offsets = vec![0];
    let mut ids = Vec::new();
    for (index, record) in Records::new(&mmap, path).enumerate() {
        let record = record?;
        ids.reserve(record.dimension);
        for word in words(record.payload) {
            let id = i32::from_le_bytes(word);
            let id = u32::try_from(id).map_err(|_| VecsError::NegativeId {
                path: path.to_path_buf(),
                record: index,
                id,
            })?;
            ids.push(VectorId::new(id));
        }
        offsets.push(ids.len());
    }

    debug!(path = %path.display(), queries = offsets.len() - 1, "loaded ivecs");
    Ok(GroundTruth { offsets, ids })
}

fn create(path: &Path) -> Result<BufWriter<File>, VecsError> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|source| VecsError::Io {
            path: path.to_path_buf(),
            source,
        })
}

fn write_record<W: Write>(out: &mut W, words: &[[u8; WORD]]) -> io::Result<()> {
    out.write_all(&(words.len() as i32).to_le_bytes())?;
    for word in words {
        out.write_all(word)?;
    }
    Ok(())
}

/// Writes every vector of `store` as one `.fvecs` record.
pub fn write_fvecs(path: impl AsRef<Path>, store: &VectorStore) -> Result<(), VecsError> {
    let path = path.as_ref();
    let mut out = create(path)?;
    let result = store
        .iter()
        .try_for_each(|(_, row)| {
            let words: Vec<_> = row.iter().map(|v| v.to_le_bytes()).collect();
            write_record(&mut out, &words)
        })
        .and_then(|()| out.flush());
    result.map_err(|source| VecsError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes ground-truth rows as `.ivecs` records.
pub fn write_ivecs(path: impl AsRef<Path>, truth: &GroundTruth) -> Result<(), VecsError> {
    let path = path.as_ref();
    let mut out = create(path)?;
    let result = truth
        .iter()
        .try_for_each(|row| {
            let words: Vec<_> = row.iter().map(|id| (id.get() as i32).to_le_bytes()).collect();
            write_record(&mut out, &words)
        })
        .and_then(|()| out.flush());
    result.map_err(|source| VecsError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn raw_record(dim: i32, values: &[[u8; 4]]) -> Vec<u8> {
        let mut bytes = dim.to_le_bytes().to_vec();
        for v in values {
            bytes.extend_from_slice(v);
        }
        bytes
    }

    #[test]
    fn test_fvecs_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("base.fvecs");
        let store = VectorStore::from_flat(
            VectorDimension::new(3).unwrap(),
            &[1.0, 2.0, 3.0, -4.5, 0.25, 1e-3],
        )
        .unwrap();

        write_fvecs(&path, &store).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 2 * (4 + 12));

        let loaded = read_fvecs(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.dimension().get(), 3);
        assert_eq!(loaded.as_flat(), store.as_flat());
    }

    #[test]
    fn test_ivecs_rows_may_differ_in_length() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("gt.ivecs");
        let id = VectorId::new;
        let truth = GroundTruth::from_rows([vec![id(3), id(1), id(4)], vec![id(1)], vec![]]);

        write_ivecs(&path, &truth).unwrap();
        let loaded = read_ivecs(&path).unwrap();

        assert_eq!(loaded, truth);
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.row(0), &[id(3), id(1), id(4)]);
        assert!(loaded.row(2).is_empty());
    }

    #[test]
    fn test_truncated_record_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.fvecs");
        let mut bytes = raw_record(2, &[1.0f32.to_le_bytes(), 2.0f32.to_le_bytes()]);
        bytes.extend(raw_record(2, &[1.0f32.to_le_bytes()]));
        std::fs::write(&path, bytes).unwrap();

        assert!(matches!(
            read_fvecs(&path),
            Err(VecsError::Truncated { record: 1, .. })
        ));
    }

    #[test]
    fn test_dangling_prefix_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.fvecs");
        let mut bytes = raw_record(1, &[1.0f32.to_le_bytes()]);
        bytes.extend_from_slice(&[0, 0]);
        std::fs::write(&path, bytes).unwrap();

        assert!(matches!(
            read_fvecs(&path),
            Err(VecsError::Truncated { record: 1, .. })
        ));
    }

    #[test]
    fn test_inconsistent_dimension_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("mixed.fvecs");
        let mut bytes = raw_record(1, &[1.0f32.to_le_bytes()]);
        bytes.extend(raw_record(2, &[1.0f32.to_le_bytes(), 2.0f32.to_le_bytes()]));
        std::fs::write(&path, bytes).unwrap();

        assert!(matches!(
            read_fvecs(&path),
            Err(VecsError::InconsistentDimension {
                record: 1,
                expected: 1,
                actual: 2,
                ..
            })
        ));
    }

    #[test]
    fn test_negative_dimension_and_ids_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("neg.ivecs");
        std::fs::write(&path, raw_record(-1, &[])).unwrap();
        assert!(matches!(
            read_ivecs(&path),
            Err(VecsError::InvalidDimension { dimension: -1, .. })
        ));

        std::fs::write(&path, raw_record(1, &[(-5i32).to_le_bytes()])).unwrap();
        assert!(matches!(
            read_ivecs(&path),
            Err(VecsError::NegativeId { id: -5, .. })
        ));
    }

    #[test]
    fn test_empty_and_missing_files() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("empty.fvecs");
        std::fs::write(&path, b"").unwrap();
        assert!(matches!(read_fvecs(&path), Err(VecsError::Empty { .. })));

        let missing = temp_dir.path().join("missing.fvecs");
        assert!(matches!(read_fvecs(&missing), Err(VecsError::Io { .. })));
    }

    #[test]
    fn test_zero_dimension_fvecs_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("zero.fvecs");
        std::fs::write(&path, raw_record(0, &[])).unwrap();
        assert!(matches!(
            read_fvecs(&path),
            Err(VecsError::InvalidDimension { dimension: 0, .. })
        ));
    }
}
