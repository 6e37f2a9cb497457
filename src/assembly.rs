//! Global side of the assembly: the per-degree sparsity structure of the
//! face-only system, the global face-DOF numbering, and the scatter of
//! condensed local systems into the shared CSR matrix and right-hand side.

use std::collections::BTreeSet;

use nalgebra::{DVector, RealField};
use nalgebra_sparse::pattern::SparsityPattern;
use nalgebra_sparse::CsrMatrix;

use crate::degree::Degree;
use crate::error::HhoError;
use crate::local::CellSystem;
use crate::mesh::MeshTopology;

/// Global numbering of face DOFs for one degree.
///
/// Face `f` owns the contiguous DOF range
/// `f * dofs_per_face .. (f + 1) * dofs_per_face`. The numbering depends
/// only on the face ordering, so every worker translates local ids the same
/// way regardless of scheduling.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FaceDofNumbering {
    n_faces: usize,
    dofs_per_face: usize,
}

impl FaceDofNumbering {
    pub fn new(topo: &MeshTopology, degree: Degree) -> Self {
        Self {
            n_faces: topo.num_faces(),
            dofs_per_face: degree.face_dofs(),
        }
    }

    pub fn num_dofs(&self) -> usize {
        self.n_faces * self.dofs_per_face
    }

    pub fn dofs_per_face(&self) -> usize {
        self.dofs_per_face
    }

    pub fn global_dof(&self, face: usize, k: usize) -> usize {
        debug_assert!(face < self.n_faces && k < self.dofs_per_face);
        face * self.dofs_per_face + k
    }
}

/// Builds the sparsity pattern of the condensed face-only operator at the
/// given degree: two face DOFs couple exactly when their faces share a cell.
///
/// Entries are collected into sorted sets first, so the pattern stores each
/// coupling once however many cells contribute to it.
pub fn build_face_pattern(topo: &MeshTopology, degree: Degree) -> Result<SparsityPattern, HhoError> {
    let fd = degree.face_dofs();
    let n_faces = topo.num_faces();

    let mut face_adjacency: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n_faces];
    for cell in 0..topo.num_cells() {
        let faces = topo.cell_faces(cell);
        for &fi in faces {
            for &fj in faces {
                face_adjacency[fi].insert(fj);
            }
        }
    }

    let n_rows = n_faces * fd;
    let mut offsets = Vec::with_capacity(n_rows + 1);
    let mut indices = Vec::new();
    offsets.push(0);
    for adjacency in &face_adjacency {
        // Same columns for each of the face's DOF rows.
        for _ in 0..fd {
            for &fj in adjacency {
                for l in 0..fd {
                    indices.push(fj * fd + l);
                }
            }
            offsets.push(indices.len());
        }
    }

    SparsityPattern::try_from_offsets_and_indices(n_rows, n_rows, offsets, indices)
        .map_err(|err| HhoError::config(format!("face sparsity pattern is malformed: {err}")))
}

/// Per-worker buffer of global contributions.
///
/// Workers scatter into private buffers during the parallel cell loop; the
/// buffers are merged into the shared matrix and rhs once the loop is done.
/// Summation order across cells is irrelevant up to floating-point
/// round-off, so the merge order does not need to be fixed.
#[derive(Debug, Clone)]
pub(crate) struct ScatterBuffer<T> {
    entries: Vec<(usize, usize, T)>,
    rhs: Vec<(usize, T)>,
}

impl<T> Default for ScatterBuffer<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            rhs: Vec::new(),
        }
    }
}

impl<T: RealField + Copy> ScatterBuffer<T> {
    /// Records the condensed face-only system of one cell, translating the
    /// local face-block DOF ids to the global numbering.
    pub fn push_cell_system(&mut self, sys: &CellSystem<T>) {
        debug_assert!(sys.mat.is_condensed(), "scatter expects a condensed system");
        let n = sys.n_dofs();
        let mat = sys.mat.as_view();
        for i in 0..n {
            let gi = sys.dof_ids[i];
            for j in 0..n {
                self.entries.push((gi, sys.dof_ids[j], mat[(i, j)]));
            }
            self.rhs.push((gi, sys.rhs[i]));
        }
    }

    /// Adds the buffered contributions into the shared system.
    pub fn apply(
        &self,
        matrix: &mut CsrMatrix<T>,
        rhs: &mut DVector<T>,
    ) -> Result<(), HhoError> {
        for &(i, j, v) in &self.entries {
            add_to_csr_entry(matrix, i, j, v)?;
        }
        for &(i, v) in &self.rhs {
            rhs[i] += v;
        }
        Ok(())
    }
}

fn add_to_csr_entry<T: RealField + Copy>(
    matrix: &mut CsrMatrix<T>,
    i: usize,
    j: usize,
    v: T,
) -> Result<(), HhoError> {
    let mut row = matrix.row_mut(i);
    let (cols, values) = row.cols_and_values_mut();
    // Column indices within a row are sorted.
    match cols.binary_search(&j) {
        Ok(pos) => {
            values[pos] += v;
            Ok(())
        }
        Err(_) => Err(HhoError::config(format!(
            "entry ({i}, {j}) is outside the shared sparsity pattern"
        ))),
    }
}
