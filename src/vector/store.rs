//! Contiguous, SIMD-aligned vector storage.
//!
//! A [`VectorStore`] owns `N` vectors of dimension `D` in one row-major
//! buffer whose base address sits on a 32-byte boundary. It is created once
//! (usually by the file reader), never mutated by searches, and shared by
//! reference across worker threads. Centroid arrays reuse the same type so
//! the distance kernel sees one layout everywhere.
//!
//! # Storage Format
//! - Row `i` occupies floats `[i * D, (i + 1) * D)`.
//! - Rows are 32-byte aligned whenever `D` is a multiple of 8; otherwise only
//!   the buffer base is, and the kernel falls back to unaligned loads.

use crate::vector::types::{SIMD_ALIGNMENT, SIMD_LANES, VectorDimension, VectorError, VectorId};

/// One aligned block of floats. The buffer is a run of these.
#[derive(Debug, Clone, Copy)]
#[repr(C, align(32))]
struct Block([f32; SIMD_LANES]);

const _: () = assert!(std::mem::size_of::<Block>() == SIMD_ALIGNMENT);
const _: () = assert!(std::mem::align_of::<Block>() == SIMD_ALIGNMENT);

/// Owned, fixed-size float buffer aligned for 256-bit loads.
///
/// Memory is released when the buffer is dropped. Allocation failures are
/// reported instead of aborting.
#[derive(Debug, Clone)]
pub struct AlignedBuffer {
    blocks: Vec<Block>,
    len: usize,
}

impl AlignedBuffer {
    /// Allocates `len` zeroed floats.
    pub fn zeroed(len: usize) -> Result<Self, VectorError> {
        let block_count = len.div_ceil(SIMD_LANES);
        let mut blocks = Vec::new();
        blocks
            .try_reserve_exact(block_count)
            .map_err(|_| VectorError::Allocation {
                bytes: block_count.saturating_mul(SIMD_ALIGNMENT),
            })?;
        blocks.resize(block_count, Block([0.0; SIMD_LANES]));
        Ok(Self { blocks, len })
    }

    /// Copies `data` into a freshly allocated aligned buffer.
    pub fn from_slice(data: &[f32]) -> Result<Self, VectorError> {
        let mut buffer = Self::zeroed(data.len())?;
        buffer.as_mut_slice().copy_from_slice(data);
        Ok(buffer)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        // SAFETY: `Block` is `repr(C)` around `[f32; 8]` with no padding
        // (size asserted above), so the blocks form `8 * blocks.len()`
        // contiguous initialized floats and `len` never exceeds that.
        unsafe { std::slice::from_raw_parts(self.blocks.as_ptr().cast::<f32>(), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        // SAFETY: see `as_slice`; the exclusive borrow of `self` guarantees
        // no other view of the blocks exists.
        unsafe { std::slice::from_raw_parts_mut(self.blocks.as_mut_ptr().cast::<f32>(), self.len) }
    }
}

/// Immutable collection of equal-dimension vectors addressed by [`VectorId`].
#[derive(Debug, Clone)]
pub struct VectorStore {
    dimension: VectorDimension,
    count: usize,
    data: AlignedBuffer,
}

impl VectorStore {
    /// Builds a store from a flat row-major buffer of `N * D` floats.
    pub fn from_flat(dimension: VectorDimension, data: &[f32]) -> Result<Self, VectorError> {
        let dim = dimension.get();
        if data.len() % dim != 0 {
            return Err(VectorError::RaggedBuffer {
                len: data.len(),
                dimension: dim,
            });
        }
        let count = data.len() / dim;
        Self::check_count(count)?;

        Ok(Self {
            dimension,
            count,
            data: AlignedBuffer::from_slice(data)?,
        })
    }

    /// Builds a store from individual rows, validating each row's length.
    ///
    /// Nested rows exist only at the loading boundary; they are copied into
    /// the flat aligned layout immediately.
    pub fn from_rows<I, R>(dimension: VectorDimension, rows: I) -> Result<Self, VectorError>
    where
        I: IntoIterator<Item = R>,
        R: AsRef<[f32]>,
    {
        let mut flat = Vec::new();
        for row in rows {
            let row = row.as_ref();
            dimension.validate_vector(row)?;
            flat.extend_from_slice(row);
        }
        Self::from_flat(dimension, &flat)
    }

    /// Allocates `count` zero vectors. Used for centroid arrays.
    pub fn zeroed(dimension: VectorDimension, count: usize) -> Result<Self, VectorError> {
        Self::check_count(count)?;
        let len = count
            .checked_mul(dimension.get())
            .ok_or(VectorError::TooManyVectors(count))?;
        Ok(Self {
            dimension,
            count,
            data: AlignedBuffer::zeroed(len)?,
        })
    }

    fn check_count(count: usize) -> Result<(), VectorError> {
        if u32::try_from(count).is_err() {
            return Err(VectorError::TooManyVectors(count));
        }
        Ok(())
    }

    /// Number of vectors held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    /// Returns the vector with the given id, if it exists.
    #[must_use]
    pub fn get(&self, id: VectorId) -> Option<&[f32]> {
        (id.index() < self.count).then(|| self.row(id.index()))
    }

    /// Returns the vector with the given id or a `VectorNotFound` error.
    pub fn try_get(&self, id: VectorId) -> Result<&[f32], VectorError> {
        self.get(id).ok_or(VectorError::VectorNotFound {
            id: id.get(),
            len: self.count,
        })
    }

    /// Row access by index.
    ///
    /// # Panics
    /// Panics if `index >= len()`.
    #[inline]
    #[must_use]
    pub fn row(&self, index: usize) -> &[f32] {
        let dim = self.dimension.get();
        &self.data.as_slice()[index * dim..(index + 1) * dim]
    }

    #[inline]
    pub(crate) fn row_mut(&mut self, index: usize) -> &mut [f32] {
        let dim = self.dimension.get();
        &mut self.data.as_mut_slice()[index * dim..(index + 1) * dim]
    }

    /// The whole store as one row-major slice.
    #[must_use]
    pub fn as_flat(&self) -> &[f32] {
        self.data.as_slice()
    }

    pub(crate) fn as_flat_mut(&mut self) -> &mut [f32] {
        self.data.as_mut_slice()
    }

    /// Iterates over `(id, vector)` pairs in id order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (VectorId, &[f32])> + '_ {
        self.data
            .as_slice()
            .chunks_exact(self.dimension.get())
            .enumerate()
            .map(|(i, row)| (VectorId::new(i as u32), row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dim(d: usize) -> VectorDimension {
        VectorDimension::new(d).unwrap()
    }

    #[test]
    fn test_buffer_is_aligned() {
        for len in [0, 1, 7, 8, 9, 1000] {
            let buffer = AlignedBuffer::zeroed(len).unwrap();
            assert_eq!(buffer.len(), len);
            assert_eq!(buffer.as_slice().as_ptr() as usize % SIMD_ALIGNMENT, 0);
            assert!(buffer.as_slice().iter().all(|&x| x == 0.0));
        }
    }

    #[test]
    fn test_from_flat_layout() {
        let data: Vec<f32> = (0..12).map(|i| i as f32).collect();
        let store = VectorStore::from_flat(dim(4), &data).unwrap();

        assert_eq!(store.len(), 3);
        assert_eq!(store.dimension().get(), 4);
        assert_eq!(store.row(1), &[4.0, 5.0, 6.0, 7.0]);
        assert_eq!(store.get(VectorId::new(2)).unwrap(), &[8.0, 9.0, 10.0, 11.0]);
        assert!(store.get(VectorId::new(3)).is_none());
        assert_eq!(store.as_flat(), data.as_slice());
    }

    #[test]
    fn test_rows_aligned_when_dimension_is_lane_multiple() {
        let data = vec![1.0; 16 * 5];
        let store = VectorStore::from_flat(dim(16), &data).unwrap();
        for i in 0..store.len() {
            assert_eq!(store.row(i).as_ptr() as usize % SIMD_ALIGNMENT, 0);
        }
    }

    #[test]
    fn test_ragged_buffer_rejected() {
        let data = vec![0.0; 10];
        assert!(matches!(
            VectorStore::from_flat(dim(4), &data),
            Err(VectorError::RaggedBuffer { len: 10, dimension: 4 })
        ));
    }

    #[test]
    fn test_from_rows_validates_dimension() {
        let rows = vec![vec![1.0, 2.0], vec![3.0, 4.0, 5.0]];
        assert!(matches!(
            VectorStore::from_rows(dim(2), &rows),
            Err(VectorError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));

        let rows = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        let store = VectorStore::from_rows(dim(2), &rows).unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_iter_yields_ids_in_order() {
        let store = VectorStore::from_flat(dim(2), &[0.0, 0.0, 1.0, 1.0, 2.0, 2.0]).unwrap();
        let ids: Vec<u32> = store.iter().map(|(id, _)| id.get()).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_empty_store() {
        let store = VectorStore::from_flat(dim(3), &[]).unwrap();
        assert!(store.is_empty());
        assert_eq!(store.iter().count(), 0);
    }
}
