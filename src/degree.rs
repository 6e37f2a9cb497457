use serde::{Deserialize, Serialize};

use crate::error::HhoError;

/// Polynomial degree of an HHO space.
///
/// The scheme supports exactly three degrees. Face unknowns are polynomials
/// of degree `k` on each face, cell unknowns polynomials of degree `k` in the
/// cell, and the reconstruction operator works with cell polynomials of
/// degree `k + 1`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Degree {
    /// Piecewise-constant unknowns (1 cell DOF, 1 DOF per face).
    P0,
    /// Piecewise-linear unknowns (4 cell DOFs, 3 DOFs per face).
    P1,
    /// Piecewise-quadratic unknowns (10 cell DOFs, 6 DOFs per face).
    P2,
}

impl Degree {
    pub fn from_order(order: usize) -> Result<Self, HhoError> {
        match order {
            0 => Ok(Degree::P0),
            1 => Ok(Degree::P1),
            2 => Ok(Degree::P2),
            _ => Err(HhoError::config(format!(
                "polynomial order {order} is not supported (supported orders: 0, 1, 2)"
            ))),
        }
    }

    pub fn order(&self) -> usize {
        match self {
            Degree::P0 => 0,
            Degree::P1 => 1,
            Degree::P2 => 2,
        }
    }

    /// Number of scalar unknowns attached to the cell interior.
    pub fn cell_dofs(&self) -> usize {
        match self {
            Degree::P0 => 1,
            Degree::P1 => 4,
            Degree::P2 => 10,
        }
    }

    /// Number of scalar unknowns attached to each face.
    pub fn face_dofs(&self) -> usize {
        match self {
            Degree::P0 => 1,
            Degree::P1 => 3,
            Degree::P2 => 6,
        }
    }

    /// Dimension of the degree `k + 1` cell polynomial space used by the
    /// gradient reconstruction.
    pub fn reconstruction_dofs(&self) -> usize {
        match self {
            Degree::P0 => 4,
            Degree::P1 => 10,
            Degree::P2 => 20,
        }
    }

    /// Local system size for a cell with `n_fc` faces.
    pub fn local_dofs(&self, n_fc: usize) -> usize {
        n_fc * self.face_dofs() + self.cell_dofs()
    }
}

/// Sizes of the per-worker scratch buffers for a given degree and mesh.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScratchSizes {
    /// Number of scalar slots.
    pub values: usize,
    /// Number of 3-vector slots.
    pub vectors: usize,
}

/// Length of a packed lower-triangular LDLT factor of size `n`.
pub(crate) fn ldlt_packed_len(n: usize) -> usize {
    n * (n + 1) / 2
}

/// Computes the scratch sizes needed for cellwise work at the given degree on
/// a mesh whose cells have at most `max_faces_per_cell` faces.
///
/// The scalar buffer must be able to hold the largest of:
/// - the packed factorization of the reconstruction stiffness block
///   (dimension `reconstruction_dofs - 1`) plus its elimination workspace,
/// - the packed factorization of the cell-cell block plus a solve workspace,
/// - one round of face and cell basis evaluations for every face of the cell.
///
/// The vector buffer stores quadrature points and face-normal products.
pub fn scratch_sizes(degree: Degree, max_faces_per_cell: usize) -> ScratchSizes {
    let n_fc = max_faces_per_cell;
    let fd = degree.face_dofs();
    let cd = degree.cell_dofs();

    // Gradient reconstruction factors out the constant mode.
    let g = degree.reconstruction_dofs() - 1;
    let reco_facto = ldlt_packed_len(g) + g;
    let cc_facto = ldlt_packed_len(cd) + cd;
    let basis_eval = 2 * (fd * n_fc + cd);

    let values = match degree {
        // For P0 the dominant scalar demand is the error post-processing
        // workspace (38 slots) and the dense hybrid operator.
        Degree::P0 => (n_fc * (n_fc + 1)).max(38),
        Degree::P1 | Degree::P2 => reco_facto.max(cc_facto).max(basis_eval),
    };

    // 15 covers the largest fixed quadrature rule; each face additionally
    // stores a tensor-normal product.
    let vectors = match degree {
        Degree::P0 => (2 * n_fc).max(15),
        Degree::P1 => (5 + n_fc).max(15),
        Degree::P2 => 15 + n_fc,
    };

    ScratchSizes { values, vectors }
}
