//! Row-major index arithmetic over a D-dimensional sample lattice.
//!
//! Image tensors store the last axis fastest, so a voxel's flat offset is
//! `Σ index[i] * stride[i]` with `stride[D-1] == 1`. Per-voxel algorithms work
//! on flat buffers extracted from an [`Image`](super::Image) and use this type
//! to move between offsets and indices and to reach face neighbours.

/// Shape and strides of a dense row-major lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lattice<const D: usize> {
    shape: [usize; D],
    strides: [usize; D],
    len: usize,
}

impl<const D: usize> Lattice<D> {
    /// Create a lattice for the given shape.
    pub fn new(shape: [usize; D]) -> Self {
        let mut strides = [0usize; D];
        let mut stride = 1usize;
        for axis in (0..D).rev() {
            strides[axis] = stride;
            stride *= shape[axis];
        }
        Self {
            shape,
            strides,
            len: stride,
        }
    }

    pub fn shape(&self) -> [usize; D] {
        self.shape
    }

    pub fn strides(&self) -> [usize; D] {
        self.strides
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Flat offset of an in-bounds index.
    pub fn offset(&self, index: [usize; D]) -> usize {
        index
            .iter()
            .zip(self.strides.iter())
            .map(|(i, s)| i * s)
            .sum()
    }

    /// Multi-index of a flat offset.
    pub fn index(&self, offset: usize) -> [usize; D] {
        let mut index = [0usize; D];
        for axis in 0..D {
            index[axis] = (offset / self.strides[axis]) % self.shape[axis];
        }
        index
    }

    /// Coordinate of `offset` along a single axis.
    #[inline]
    pub fn coordinate(&self, offset: usize, axis: usize) -> usize {
        (offset / self.strides[axis]) % self.shape[axis]
    }

    /// Checked conversion of a signed index.
    pub fn checked_offset(&self, index: [i64; D]) -> Option<usize> {
        let mut offset = 0usize;
        for axis in 0..D {
            let i = index[axis];
            if i < 0 || i as usize >= self.shape[axis] {
                return None;
            }
            offset += i as usize * self.strides[axis];
        }
        Some(offset)
    }

    /// Face neighbour `step` samples away along `axis`, if inside the lattice.
    #[inline]
    pub fn neighbor(&self, offset: usize, axis: usize, step: isize) -> Option<usize> {
        let c = self.coordinate(offset, axis) as isize + step;
        if c < 0 || c >= self.shape[axis] as isize {
            return None;
        }
        Some((offset as isize + step * self.strides[axis] as isize) as usize)
    }

    /// Face neighbour with replicated borders: out-of-range steps are clamped
    /// to the first/last sample along the axis.
    #[inline]
    pub fn clamped(&self, offset: usize, axis: usize, step: isize) -> usize {
        let c = self.coordinate(offset, axis) as isize;
        let target = (c + step).clamp(0, self.shape[axis] as isize - 1);
        (offset as isize + (target - c) * self.strides[axis] as isize) as usize
    }

    /// All in-bounds face neighbours (at most `2 * D`).
    pub fn face_neighbors(&self, offset: usize) -> impl Iterator<Item = usize> + '_ {
        (0..D).flat_map(move |axis| {
            [-1isize, 1]
                .into_iter()
                .filter_map(move |step| self.neighbor(offset, axis, step))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_roundtrip_row_major() {
        let lattice = Lattice::new([2, 3, 4]);
        assert_eq!(lattice.len(), 24);
        assert_eq!(lattice.strides(), [12, 4, 1]);
        assert_eq!(lattice.offset([1, 2, 3]), 23);
        assert_eq!(lattice.index(23), [1, 2, 3]);
        assert_eq!(lattice.index(5), [0, 1, 1]);
    }

    #[test]
    fn test_neighbors_respect_borders() {
        let lattice = Lattice::new([3, 3]);
        let corner = lattice.offset([0, 0]);
        assert_eq!(lattice.neighbor(corner, 0, -1), None);
        assert_eq!(lattice.neighbor(corner, 1, 1), Some(1));
        assert_eq!(lattice.face_neighbors(corner).count(), 2);
        let centre = lattice.offset([1, 1]);
        assert_eq!(lattice.face_neighbors(centre).count(), 4);
        // last sample of row 0 must not wrap into row 1
        assert_eq!(lattice.neighbor(lattice.offset([0, 2]), 1, 1), None);
    }

    #[test]
    fn test_clamped_replicates_border() {
        let lattice = Lattice::new([4, 5]);
        let edge = lattice.offset([3, 0]);
        assert_eq!(lattice.clamped(edge, 0, 1), edge);
        assert_eq!(lattice.clamped(edge, 1, -2), edge);
        assert_eq!(lattice.clamped(edge, 0, -1), lattice.offset([2, 0]));
    }

    #[test]
    fn test_checked_offset() {
        let lattice = Lattice::new([4, 4, 4]);
        assert_eq!(lattice.checked_offset([1, 2, 3]), Some(lattice.offset([1, 2, 3])));
        assert_eq!(lattice.checked_offset([-1, 2, 3]), None);
        assert_eq!(lattice.checked_offset([1, 4, 3]), None);
    }
}
