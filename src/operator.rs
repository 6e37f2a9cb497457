use nalgebra::RealField;

use crate::boundary::{BoundaryDef, DirichletValue};
use crate::degree::Degree;
use crate::error::HhoError;
use crate::local::BlockMatrix;

/// How Dirichlet conditions are enforced on the algebraic system.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum BcEnforcement<T> {
    /// Weak enforcement through a penalty operator added to the condensed
    /// face blocks.
    WeakPenalty {
        /// Penalty coefficient; large relative to the operator scale.
        coefficient: T,
    },
    /// Strong (algebraic) enforcement. Declared for completeness but not
    /// implemented by the builder.
    Strong,
}

/// Parameters of one scalar HHO equation.
pub struct EquationParams<T: RealField> {
    pub name: String,
    /// Dimension of the unknown; only scalar (`1`) equations are handled.
    pub dim: usize,
    pub degree: Degree,
    /// Uniform diffusion coefficient, forwarded to the operator evaluator.
    pub diffusivity: T,
    pub enforcement: BcEnforcement<T>,
    /// Whether a source term is present; enables the per-cell source cache.
    pub has_source: bool,
    /// Capability flags. Both are rejected at build time; they exist so that
    /// the surrounding framework can describe the equation it wants and get
    /// a definite refusal rather than a silent omission.
    pub has_convection: bool,
    pub is_transient: bool,
    /// Boundary-condition definitions; boundary faces are mapped to these by
    /// zone membership.
    pub bc_defs: Vec<BoundaryDef<T>>,
}

impl<T: RealField + Copy> EquationParams<T> {
    /// Steady pure-diffusion equation with weak-penalty Dirichlet
    /// enforcement and no source.
    pub fn diffusion(name: impl Into<String>, degree: Degree, diffusivity: T) -> Self {
        Self {
            name: name.into(),
            dim: 1,
            degree,
            diffusivity,
            enforcement: BcEnforcement::WeakPenalty {
                coefficient: nalgebra::convert(1e13),
            },
            has_source: false,
            has_convection: false,
            is_transient: false,
            bc_defs: Vec::new(),
        }
    }

    pub fn with_source(mut self) -> Self {
        self.has_source = true;
        self
    }

    pub fn with_bc_defs(mut self, defs: Vec<BoundaryDef<T>>) -> Self {
        self.bc_defs = defs;
        self
    }
}

/// Basis-evaluation and operator service consumed by the assembly engine.
///
/// Implementations own the polynomial bases, quadrature and gradient
/// reconstruction for the configured degree. They are shared between
/// workers, so any mutable scratch they need must be theirs to manage
/// (typically thread-local).
pub trait CellEvaluator<T: RealField>: Sync {
    /// Adds the diffusion stiffness operator of `cell` into the local block
    /// matrix (all four block kinds).
    fn assemble_diffusion(
        &self,
        cell: usize,
        params: &EquationParams<T>,
        mat: &mut BlockMatrix<T>,
    ) -> Result<(), HhoError>;

    /// Projects the source term onto the cell basis of `cell`.
    /// `out` has length `degree.cell_dofs()`.
    fn project_source(&self, cell: usize, out: &mut [T]) -> Result<(), HhoError>;

    /// Projects a Dirichlet boundary value onto the basis of the local face
    /// `local_face` of `cell`. `out` has length `degree.face_dofs()`.
    fn project_dirichlet(
        &self,
        value: &DirichletValue<T>,
        cell: usize,
        local_face: usize,
        out: &mut [T],
    ) -> Result<(), HhoError>;

    /// Evaluates all cell basis functions of `cell` at the cell center.
    /// `out` has length `degree.cell_dofs()`.
    fn eval_cell_basis_at_center(&self, cell: usize, out: &mut [T]) -> Result<(), HhoError>;
}
