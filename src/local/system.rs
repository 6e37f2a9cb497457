use nalgebra::{DVector, RealField};

use crate::degree::Degree;
use crate::local::BlockMatrix;

/// Boundary classification of one local face.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FaceBc {
    /// Interior face, or a face of a cell away from the boundary.
    Interior,
    /// Boundary face with a homogeneous Dirichlet condition.
    HomogeneousDirichlet,
    /// Boundary face with a non-homogeneous Dirichlet condition; the
    /// projected boundary value is stored in `dir_values`.
    Dirichlet,
}

/// Per-DOF boundary flags, mirroring the face classification on each of the
/// face's unknowns.
pub type DofBcFlags = u8;

pub const DOF_BC_HMG_DIRICHLET: DofBcFlags = 1 << 0;
pub const DOF_BC_DIRICHLET: DofBcFlags = 1 << 1;

/// Cellwise view of the algebraic system.
///
/// One instance lives per worker and is reset at the start of every cell;
/// nothing here survives from one cell to the next.
#[derive(Debug, Clone)]
pub struct CellSystem<T: RealField> {
    /// Block matrix with `n_fc` face blocks and one trailing cell block.
    pub mat: BlockMatrix<T>,
    /// Right-hand side, laid out as the matrix rows.
    pub rhs: DVector<T>,
    /// Global DOF id of each local DOF (face DOFs in the global face
    /// numbering, cell DOFs in the cell numbering).
    pub dof_ids: Vec<usize>,
    /// Boundary flags per local DOF.
    pub dof_flags: Vec<DofBcFlags>,
    /// Values of the previous iterate, gathered at bind time.
    pub val_n: DVector<T>,
    /// Projected Dirichlet values, per face DOF.
    pub dir_values: DVector<T>,
    /// Classification of each local face.
    pub face_bc: Vec<FaceBc>,
    pub cell_id: usize,
    pub has_dirichlet: bool,
    n_fc: usize,
    n_dofs: usize,
}

impl<T: RealField + Copy> CellSystem<T> {
    /// Allocates a system large enough for `max_faces_per_cell` faces at the
    /// given degree.
    pub fn new(degree: Degree, max_faces_per_cell: usize) -> Self {
        let fd = degree.face_dofs();
        let cd = degree.cell_dofs();
        let n_max = degree.local_dofs(max_faces_per_cell);
        Self {
            mat: BlockMatrix::new(max_faces_per_cell, fd, cd),
            rhs: DVector::zeros(n_max),
            dof_ids: vec![0; n_max],
            dof_flags: vec![0; n_max],
            val_n: DVector::zeros(n_max),
            dir_values: DVector::zeros(max_faces_per_cell * fd),
            face_bc: vec![FaceBc::Interior; max_faces_per_cell],
            cell_id: 0,
            has_dirichlet: false,
            n_fc: max_faces_per_cell,
            n_dofs: n_max,
        }
    }

    /// Resets the system for a new cell with `n_fc` faces.
    pub fn reset(&mut self, cell_id: usize, n_fc: usize) {
        let fd = self.mat.face_block_size();
        let cd = self.mat.cell_block_size();
        let n_dofs = n_fc * fd + cd;

        self.mat.reset(n_fc);
        self.rhs.resize_vertically_mut(n_dofs, T::zero());
        self.rhs.fill(T::zero());
        self.dof_ids.resize(n_dofs, 0);
        self.dof_flags.resize(n_dofs, 0);
        self.dof_flags.fill(0);
        self.val_n.resize_vertically_mut(n_dofs, T::zero());
        self.val_n.fill(T::zero());
        self.dir_values.resize_vertically_mut(n_fc * fd, T::zero());
        self.dir_values.fill(T::zero());
        self.face_bc.resize(n_fc, FaceBc::Interior);
        self.face_bc.fill(FaceBc::Interior);
        self.cell_id = cell_id;
        self.has_dirichlet = false;
        self.n_fc = n_fc;
        self.n_dofs = n_dofs;

        debug_assert_eq!(self.n_dofs, self.mat.full_dim());
    }

    pub fn n_faces(&self) -> usize {
        self.n_fc
    }

    /// Current number of local DOFs; shrinks to the face DOFs once the
    /// system is condensed.
    pub fn n_dofs(&self) -> usize {
        self.n_dofs
    }

    /// Offset of the cell block in the local DOF layout.
    pub fn cell_block_offset(&self) -> usize {
        self.n_fc * self.mat.face_block_size()
    }

    /// Marks the interior block as eliminated and shrinks the system to its
    /// face-only part.
    pub fn mark_condensed(&mut self) {
        self.mat.condense();
        self.n_dofs = self.cell_block_offset();
    }

    /// Right-hand side entries of face block `f`.
    pub fn face_rhs(&self, f: usize) -> &[T] {
        let fd = self.mat.face_block_size();
        &self.rhs.as_slice()[f * fd..(f + 1) * fd]
    }

    /// Dirichlet reduction of face block `f`.
    pub fn face_dir_values(&self, f: usize) -> &[T] {
        let fd = self.mat.face_block_size();
        &self.dir_values.as_slice()[f * fd..(f + 1) * fd]
    }

    pub fn face_dir_values_mut(&mut self, f: usize) -> &mut [T] {
        let fd = self.mat.face_block_size();
        &mut self.dir_values.as_mut_slice()[f * fd..(f + 1) * fd]
    }
}
