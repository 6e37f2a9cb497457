use nalgebra::{DMatrix, DMatrixView, DMatrixViewMut, RealField};

/// Dense block matrix of a cellwise HHO system.
///
/// The matrix has `n_face_blocks + 1` row and column blocks: one block of
/// size `face_block_size` per face of the cell, followed by a single trailing
/// block of size `cell_block_size` for the cell unknowns. Sub-blocks are
/// addressed through typed accessors; the offset bookkeeping never leaks to
/// callers.
///
/// After static condensation the matrix is truncated to its leading
/// face-only square; the cell row and column become inaccessible.
#[derive(Debug, Clone)]
pub struct BlockMatrix<T: RealField> {
    data: DMatrix<T>,
    n_face_blocks: usize,
    face_block_size: usize,
    cell_block_size: usize,
    condensed: bool,
}

impl<T: RealField + Copy> BlockMatrix<T> {
    pub fn new(n_face_blocks: usize, face_block_size: usize, cell_block_size: usize) -> Self {
        let n = n_face_blocks * face_block_size + cell_block_size;
        Self {
            data: DMatrix::zeros(n, n),
            n_face_blocks,
            face_block_size,
            cell_block_size,
            condensed: false,
        }
    }

    /// Resets the matrix to zero for a cell with `n_face_blocks` faces and
    /// clears the condensed state.
    pub fn reset(&mut self, n_face_blocks: usize) {
        self.n_face_blocks = n_face_blocks;
        self.condensed = false;
        let n = self.full_dim();
        self.data.resize_mut(n, n, T::zero());
        self.data.fill(T::zero());
    }

    pub fn n_face_blocks(&self) -> usize {
        self.n_face_blocks
    }

    pub fn face_block_size(&self) -> usize {
        self.face_block_size
    }

    pub fn cell_block_size(&self) -> usize {
        self.cell_block_size
    }

    /// Row/column count of the uncondensed matrix.
    pub fn full_dim(&self) -> usize {
        self.n_face_blocks * self.face_block_size + self.cell_block_size
    }

    /// Current logical row/column count.
    pub fn dim(&self) -> usize {
        if self.condensed {
            self.face_dim()
        } else {
            self.full_dim()
        }
    }

    fn face_dim(&self) -> usize {
        self.n_face_blocks * self.face_block_size
    }

    pub fn is_condensed(&self) -> bool {
        self.condensed
    }

    fn face_offset(&self, block: usize) -> usize {
        assert!(
            block < self.n_face_blocks,
            "face block index {block} out of bounds ({} face blocks)",
            self.n_face_blocks
        );
        block * self.face_block_size
    }

    fn cell_offset(&self) -> usize {
        assert!(!self.condensed, "cell block was eliminated by condensation");
        self.face_dim()
    }

    /// Face-face block (i, j).
    pub fn ff(&self, i: usize, j: usize) -> DMatrixView<'_, T> {
        let (fd, (ri, cj)) = (self.face_block_size, (self.face_offset(i), self.face_offset(j)));
        self.data.view((ri, cj), (fd, fd))
    }

    pub fn ff_mut(&mut self, i: usize, j: usize) -> DMatrixViewMut<'_, T> {
        let (fd, (ri, cj)) = (self.face_block_size, (self.face_offset(i), self.face_offset(j)));
        self.data.view_mut((ri, cj), (fd, fd))
    }

    /// Face-cell coupling block of face `i`.
    pub fn fc(&self, i: usize) -> DMatrixView<'_, T> {
        let (ri, cj) = (self.face_offset(i), self.cell_offset());
        self.data.view((ri, cj), (self.face_block_size, self.cell_block_size))
    }

    pub fn fc_mut(&mut self, i: usize) -> DMatrixViewMut<'_, T> {
        let (ri, cj) = (self.face_offset(i), self.cell_offset());
        self.data.view_mut((ri, cj), (self.face_block_size, self.cell_block_size))
    }

    /// Cell-face coupling block of face `j`.
    pub fn cf(&self, j: usize) -> DMatrixView<'_, T> {
        let (ri, cj) = (self.cell_offset(), self.face_offset(j));
        self.data.view((ri, cj), (self.cell_block_size, self.face_block_size))
    }

    pub fn cf_mut(&mut self, j: usize) -> DMatrixViewMut<'_, T> {
        let (ri, cj) = (self.cell_offset(), self.face_offset(j));
        self.data.view_mut((ri, cj), (self.cell_block_size, self.face_block_size))
    }

    /// Cell-cell block.
    pub fn cc(&self) -> DMatrixView<'_, T> {
        let o = self.cell_offset();
        self.data.view((o, o), (self.cell_block_size, self.cell_block_size))
    }

    pub fn cc_mut(&mut self) -> DMatrixViewMut<'_, T> {
        let o = self.cell_offset();
        self.data.view_mut((o, o), (self.cell_block_size, self.cell_block_size))
    }

    /// View of the whole matrix at its current logical size.
    pub fn as_view(&self) -> DMatrixView<'_, T> {
        let n = self.dim();
        self.data.view((0, 0), (n, n))
    }

    pub fn as_view_mut(&mut self) -> DMatrixViewMut<'_, T> {
        let n = self.dim();
        self.data.view_mut((0, 0), (n, n))
    }

    /// Adds `other` entrywise into the matrix at its current logical size.
    pub fn add_assign_view(&mut self, other: DMatrixView<'_, T>) {
        let n = self.dim();
        assert_eq!(other.nrows(), n);
        assert_eq!(other.ncols(), n);
        let mut view = self.data.view_mut((0, 0), (n, n));
        view += other;
    }

    /// Discards the cell row and column. Because the face blocks occupy the
    /// leading square of the storage, this is a pure bookkeeping operation.
    pub fn condense(&mut self) {
        assert!(!self.condensed, "matrix is already condensed");
        self.condensed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matrixcompare::assert_matrix_eq;
    use nalgebra::DMatrix;

    fn filled(n_fc: usize, fd: usize, cd: usize) -> BlockMatrix<f64> {
        let mut m = BlockMatrix::new(n_fc, fd, cd);
        let n = m.full_dim();
        for i in 0..n {
            for j in 0..n {
                m.data[(i, j)] = (i * n + j) as f64;
            }
        }
        m
    }

    #[test]
    fn block_accessors_address_the_expected_entries() {
        let m = filled(2, 3, 4);
        let n = m.full_dim();
        assert_eq!(n, 10);

        assert_eq!(m.ff(1, 0)[(0, 0)], (3 * n) as f64);
        assert_eq!(m.fc(0)[(0, 0)], 6.0);
        assert_eq!(m.cf(1)[(0, 2)], (6 * n + 5) as f64);
        assert_eq!(m.cc()[(3, 3)], (9 * n + 9) as f64);
    }

    #[test]
    fn condense_truncates_to_the_face_square() {
        let mut m = filled(2, 3, 4);
        let expected = DMatrix::from_fn(6, 6, |i, j| m.data[(i, j)]);
        m.condense();
        assert_eq!(m.dim(), 6);
        assert_matrix_eq!(m.as_view(), expected);
    }

    #[test]
    #[should_panic(expected = "eliminated by condensation")]
    fn cell_block_is_unreachable_after_condensation() {
        let mut m = filled(2, 3, 4);
        m.condense();
        let _ = m.cc();
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn face_block_bounds_are_checked() {
        let m = filled(2, 3, 4);
        let _ = m.ff(2, 0);
    }

    #[test]
    fn reset_rescales_for_a_new_face_count() {
        let mut m = filled(2, 3, 4);
        m.condense();
        m.reset(5);
        assert!(!m.is_condensed());
        assert_eq!(m.dim(), 5 * 3 + 4);
        assert_eq!(m.as_view().sum(), 0.0);
    }
}
