use serde::{Deserialize, Serialize};

use crate::error::HhoError;

/// Cell/face connectivity of a polyhedral mesh, as consumed by the assembly
/// engine.
///
/// Geometry (face areas, cell centers, quadrature) stays with the external
/// basis evaluator; the engine only needs the incidence structure. Faces are
/// numbered with all interior faces first, so a face `f` lies on the domain
/// boundary exactly when `f >= n_interior_faces`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshTopology {
    n_cells: usize,
    n_interior_faces: usize,
    n_faces: usize,
    /// Cell-to-face adjacency in CSR form: faces of cell `c` are
    /// `c2f_faces[c2f_offsets[c]..c2f_offsets[c + 1]]`.
    c2f_offsets: Vec<usize>,
    c2f_faces: Vec<usize>,
    boundary_cells: Vec<bool>,
    max_faces_per_cell: usize,
}

impl MeshTopology {
    /// Builds the topology from per-cell face lists.
    ///
    /// `cell_faces[c]` lists the global face ids of cell `c`, interior faces
    /// numbered `0..n_interior_faces` and boundary faces
    /// `n_interior_faces..n_interior_faces + n_boundary_faces`.
    pub fn from_cell_faces(
        n_interior_faces: usize,
        n_boundary_faces: usize,
        cell_faces: &[Vec<usize>],
    ) -> Result<Self, HhoError> {
        let n_faces = n_interior_faces + n_boundary_faces;
        let n_cells = cell_faces.len();
        if n_cells == 0 {
            return Err(HhoError::config("mesh has no cells"));
        }

        let mut c2f_offsets = Vec::with_capacity(n_cells + 1);
        let mut c2f_faces = Vec::new();
        let mut boundary_cells = vec![false; n_cells];
        let mut max_faces_per_cell = 0;

        c2f_offsets.push(0);
        for (c, faces) in cell_faces.iter().enumerate() {
            if faces.is_empty() {
                return Err(HhoError::config(format!("cell {c} has no faces")));
            }
            for &f in faces {
                if f >= n_faces {
                    return Err(HhoError::config(format!(
                        "cell {c} references face {f}, but the mesh has only {n_faces} faces"
                    )));
                }
                if f >= n_interior_faces {
                    boundary_cells[c] = true;
                }
            }
            max_faces_per_cell = max_faces_per_cell.max(faces.len());
            c2f_faces.extend_from_slice(faces);
            c2f_offsets.push(c2f_faces.len());
        }

        Ok(Self {
            n_cells,
            n_interior_faces,
            n_faces,
            c2f_offsets,
            c2f_faces,
            boundary_cells,
            max_faces_per_cell,
        })
    }

    pub fn num_cells(&self) -> usize {
        self.n_cells
    }

    pub fn num_faces(&self) -> usize {
        self.n_faces
    }

    pub fn num_interior_faces(&self) -> usize {
        self.n_interior_faces
    }

    pub fn num_boundary_faces(&self) -> usize {
        self.n_faces - self.n_interior_faces
    }

    pub fn max_faces_per_cell(&self) -> usize {
        self.max_faces_per_cell
    }

    /// Global face ids of the given cell, in local face order.
    pub fn cell_faces(&self, cell: usize) -> &[usize] {
        &self.c2f_faces[self.c2f_offsets[cell]..self.c2f_offsets[cell + 1]]
    }

    /// Offset of the cell's first (cell, face) incidence in the global
    /// cell-face enumeration. The condensation cache is addressed with this.
    pub fn cell_face_offset(&self, cell: usize) -> usize {
        self.c2f_offsets[cell]
    }

    /// Total number of (cell, face) incidences.
    pub fn num_cell_face_incidences(&self) -> usize {
        *self.c2f_offsets.last().unwrap_or(&0)
    }

    pub fn is_boundary_cell(&self, cell: usize) -> bool {
        self.boundary_cells[cell]
    }

    pub fn is_boundary_face(&self, face: usize) -> bool {
        face >= self.n_interior_faces
    }

    /// Index of a face in the boundary numbering, or `None` for an interior
    /// face.
    pub fn boundary_index(&self, face: usize) -> Option<usize> {
        face.checked_sub(self.n_interior_faces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Two unit cubes sharing face 0; faces 1..=10 are boundary faces.
    pub(crate) fn two_cube_topology() -> MeshTopology {
        MeshTopology::from_cell_faces(
            1,
            10,
            &[vec![0, 1, 2, 3, 4, 5], vec![0, 6, 7, 8, 9, 10]],
        )
        .unwrap()
    }

    #[test]
    fn adjacency_and_boundary_classification() {
        let topo = two_cube_topology();
        assert_eq!(topo.num_cells(), 2);
        assert_eq!(topo.num_faces(), 11);
        assert_eq!(topo.cell_faces(1), &[0, 6, 7, 8, 9, 10]);
        assert_eq!(topo.cell_face_offset(1), 6);
        assert_eq!(topo.num_cell_face_incidences(), 12);
        assert!(topo.is_boundary_cell(0));
        assert!(!topo.is_boundary_face(0));
        assert_eq!(topo.boundary_index(3), Some(2));
        assert_eq!(topo.boundary_index(0), None);
        assert_eq!(topo.max_faces_per_cell(), 6);
    }

    #[test]
    fn out_of_range_face_is_rejected() {
        let result = MeshTopology::from_cell_faces(0, 4, &[vec![0, 1, 2, 4]]);
        assert!(matches!(result, Err(HhoError::Configuration(_))));
    }
}
