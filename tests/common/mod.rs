//! Shared fixtures: a small two-cell topology and a manufactured operator
//! evaluator with a known exact solution.

use std::sync::Arc;

use nalgebra::DVector;

use hho::boundary::DirichletValue;
use hho::local::BlockMatrix;
use hho::operator::EquationParams;
use hho::{CellEvaluator, Degree, HhoError, MeshTopology};

/// Two hexahedral cells sharing face 0; faces 1..=10 lie on the boundary.
pub fn two_cube_topology() -> Arc<MeshTopology> {
    Arc::new(
        MeshTopology::from_cell_faces(
            1,
            10,
            &[vec![0, 1, 2, 3, 4, 5], vec![0, 6, 7, 8, 9, 10]],
        )
        .unwrap(),
    )
}

fn lcg_entries(n: usize, seed: u64) -> Vec<f64> {
    let mut state = seed;
    (0..n)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((state >> 33) as f64) / (u32::MAX as f64) - 0.5
        })
        .collect()
}

/// Evaluator built around a prescribed exact coefficient vector `u`.
///
/// For every cell it produces the symmetric positive semi-definite operator
/// `d (I - u_loc u_loc^T / |u_loc|^2)`, whose kernel is exactly the local
/// restriction of `u`. The exact solution therefore satisfies the assembled
/// equations with zero residual, and with Dirichlet data taken from `u`
/// itself the penalized face system reproduces `u` up to solver round-off.
pub struct ManufacturedEvaluator {
    topo: Arc<MeshTopology>,
    degree: Degree,
    /// Exact face coefficients, `face_dofs` per face.
    pub u_face: Vec<f64>,
    /// Exact interior coefficients, `cell_dofs` per cell.
    pub u_cell: Vec<f64>,
}

impl ManufacturedEvaluator {
    pub fn new(degree: Degree, topo: Arc<MeshTopology>) -> Self {
        let fd = degree.face_dofs();
        let cd = degree.cell_dofs();
        // Entries in [0.5, 1.5]: bounded away from zero so that no face or
        // cell restriction of the exact solution vanishes.
        let u_face = lcg_entries(topo.num_faces() * fd, 17)
            .into_iter()
            .map(|v| 1.0 + v)
            .collect();
        let u_cell = lcg_entries(topo.num_cells() * cd, 43)
            .into_iter()
            .map(|v| 1.0 + v)
            .collect();
        Self::with_solution(degree, topo, u_face, u_cell)
    }

    /// Evaluator around explicitly prescribed exact coefficients.
    pub fn with_solution(
        degree: Degree,
        topo: Arc<MeshTopology>,
        u_face: Vec<f64>,
        u_cell: Vec<f64>,
    ) -> Self {
        assert_eq!(u_face.len(), topo.num_faces() * degree.face_dofs());
        assert_eq!(u_cell.len(), topo.num_cells() * degree.cell_dofs());
        Self {
            topo,
            degree,
            u_face,
            u_cell,
        }
    }

    /// Local restriction of the exact solution, faces first.
    pub fn local_solution(&self, cell: usize) -> DVector<f64> {
        let fd = self.degree.face_dofs();
        let cd = self.degree.cell_dofs();
        let faces = self.topo.cell_faces(cell);
        let mut u = DVector::zeros(self.degree.local_dofs(faces.len()));
        for (f, &face) in faces.iter().enumerate() {
            for k in 0..fd {
                u[f * fd + k] = self.u_face[face * fd + k];
            }
        }
        for i in 0..cd {
            u[faces.len() * fd + i] = self.u_cell[cell * cd + i];
        }
        u
    }

    /// Deterministic source coefficients of one cell.
    pub fn source_coefficients(&self, cell: usize, out: &mut [f64]) {
        for (i, v) in out.iter_mut().enumerate() {
            *v = 0.1 * (cell + 1) as f64 + 0.01 * i as f64;
        }
    }
}

impl CellEvaluator<f64> for ManufacturedEvaluator {
    fn assemble_diffusion(
        &self,
        cell: usize,
        params: &EquationParams<f64>,
        mat: &mut BlockMatrix<f64>,
    ) -> Result<(), HhoError> {
        let u = self.local_solution(cell);
        let n = u.len();
        let norm2 = u.dot(&u);
        let mut view = mat.as_view_mut();
        for i in 0..n {
            for j in 0..n {
                let mut a = -u[i] * u[j] / norm2;
                if i == j {
                    a += 1.0;
                }
                view[(i, j)] += params.diffusivity * a;
            }
        }
        Ok(())
    }

    fn project_source(&self, cell: usize, out: &mut [f64]) -> Result<(), HhoError> {
        self.source_coefficients(cell, out);
        Ok(())
    }

    fn project_dirichlet(
        &self,
        _value: &DirichletValue<f64>,
        cell: usize,
        local_face: usize,
        out: &mut [f64],
    ) -> Result<(), HhoError> {
        let fd = self.degree.face_dofs();
        let face = self.topo.cell_faces(cell)[local_face];
        out.copy_from_slice(&self.u_face[face * fd..(face + 1) * fd]);
        Ok(())
    }

    fn eval_cell_basis_at_center(&self, _cell: usize, out: &mut [f64]) -> Result<(), HhoError> {
        // Only the constant mode is nonzero at the center in this fixture,
        // so the reconstructed center value is the leading interior
        // coefficient.
        out.fill(0.0);
        out[0] = 1.0;
        Ok(())
    }
}
