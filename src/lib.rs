//! Cellwise assembly engine for Hybrid High-Order (HHO) discretizations of
//! scalar diffusion problems on general polyhedral meshes.
//!
//! The crate covers the algebraic side of the method: the block-structured
//! cellwise systems, their static condensation onto the face unknowns, the
//! parallel scatter into a shared sparse system, weak-penalty Dirichlet
//! enforcement, and the recovery of interior unknowns and cell-center field
//! values after an external linear solve. The polynomial bases, quadrature
//! and gradient reconstruction are supplied by the caller through the
//! [`CellEvaluator`](operator::CellEvaluator) trait.
//!
//! Typical usage sets up an [`HhoScheme`](scheme::HhoScheme) for the
//! requested degrees, creates one [`ScalarHhoContext`](scheme::ScalarHhoContext)
//! per equation, and drives the `compute_source` / `initialize_system` /
//! `build_system` / `update_field` cycle from the outer solver loop.

pub mod assembly;
pub mod boundary;
pub mod condensation;
pub mod degree;
pub mod error;
pub mod local;
pub mod mesh;
pub mod operator;
pub mod scheme;

pub use crate::degree::Degree;
pub use crate::error::HhoError;
pub use crate::mesh::MeshTopology;
pub use crate::operator::{BcEnforcement, CellEvaluator, EquationParams};
pub use crate::scheme::{HhoScheme, ScalarHhoContext};
