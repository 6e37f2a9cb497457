use std::fmt;
use std::sync::Arc;

use nalgebra::{Point3, RealField};

use crate::error::HhoError;
use crate::local::{CellSystem, FaceBc, DOF_BC_DIRICHLET, DOF_BC_HMG_DIRICHLET};
use crate::mesh::MeshTopology;
use crate::operator::CellEvaluator;

/// Value prescribed by a Dirichlet boundary condition.
#[derive(Clone)]
pub enum DirichletValue<T: RealField> {
    Homogeneous,
    Constant(T),
    /// Pointwise value; the evaluator projects it onto each face basis.
    Function(Arc<dyn Fn(&Point3<T>) -> T + Send + Sync>),
}

impl<T: RealField> fmt::Debug for DirichletValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirichletValue::Homogeneous => write!(f, "Homogeneous"),
            DirichletValue::Constant(c) => write!(f, "Constant({c:?})"),
            DirichletValue::Function(_) => write!(f, "Function(..)"),
        }
    }
}

impl<T: RealField> DirichletValue<T> {
    pub fn is_homogeneous(&self) -> bool {
        matches!(self, DirichletValue::Homogeneous)
    }
}

/// One boundary-condition definition: a Dirichlet value applied to a zone of
/// boundary faces.
///
/// Faces are given in the boundary numbering (`0..n_boundary_faces`), as
/// provided by the external boundary-zone membership service.
#[derive(Debug, Clone)]
pub struct BoundaryDef<T: RealField> {
    pub faces: Vec<usize>,
    pub value: DirichletValue<T>,
}

impl<T: RealField> BoundaryDef<T> {
    pub fn new(faces: Vec<usize>, value: DirichletValue<T>) -> Self {
        Self { faces, value }
    }
}

/// Builds the boundary-face-to-definition map.
///
/// Returns one entry per boundary face; `None` means no definition covers
/// the face. Later definitions win where zones overlap.
pub fn build_bf2def<T: RealField>(
    topo: &MeshTopology,
    defs: &[BoundaryDef<T>],
) -> Result<Vec<Option<usize>>, HhoError> {
    let n_b_faces = topo.num_boundary_faces();
    let mut bf2def = vec![None; n_b_faces];
    for (def_id, def) in defs.iter().enumerate() {
        for &bf in &def.faces {
            if bf >= n_b_faces {
                return Err(HhoError::config(format!(
                    "boundary definition {def_id} references boundary face {bf}, \
                     but the mesh has only {n_b_faces} boundary faces"
                )));
            }
            bf2def[bf] = Some(def_id);
        }
    }
    Ok(bf2def)
}

/// Classifies the boundary faces of the bound cell and stores Dirichlet
/// reductions.
///
/// For each local face lying on the domain boundary, looks up its
/// definition: homogeneous Dirichlet tags the face DOFs, non-homogeneous
/// Dirichlet additionally computes the projected boundary value through the
/// evaluator. A boundary face with no definition is a fatal error; no face
/// is silently skipped.
pub(crate) fn classify_cell_boundary<T, E>(
    sys: &mut CellSystem<T>,
    topo: &MeshTopology,
    bf2def: &[Option<usize>],
    defs: &[BoundaryDef<T>],
    evaluator: &E,
) -> Result<(), HhoError>
where
    T: RealField + Copy,
    E: CellEvaluator<T> + ?Sized,
{
    let cell = sys.cell_id;
    let fd = sys.mat.face_block_size();

    for (f, &face) in topo.cell_faces(cell).iter().enumerate() {
        let Some(bf) = topo.boundary_index(face) else {
            continue;
        };
        let def_id = bf2def[bf].ok_or(HhoError::UnresolvedBoundaryDefinition { face })?;
        let def = &defs[def_id];

        if def.value.is_homogeneous() {
            sys.face_bc[f] = FaceBc::HomogeneousDirichlet;
            sys.has_dirichlet = true;
            for k in 0..fd {
                sys.dof_flags[f * fd + k] |= DOF_BC_HMG_DIRICHLET;
            }
        } else {
            sys.face_bc[f] = FaceBc::Dirichlet;
            sys.has_dirichlet = true;
            for k in 0..fd {
                sys.dof_flags[f * fd + k] |= DOF_BC_DIRICHLET;
            }
            evaluator.project_dirichlet(&def.value, cell, f, sys.face_dir_values_mut(f))?;
        }
    }

    // A homogeneous face must carry a zero reduction.
    if cfg!(debug_assertions) {
        for f in 0..sys.n_faces() {
            if sys.face_bc[f] == FaceBc::HomogeneousDirichlet {
                debug_assert!(
                    sys.face_dir_values(f).iter().all(|v| v.abs() <= T::default_epsilon()),
                    "non-zero Dirichlet reduction on a homogeneous face"
                );
            }
        }
    }

    Ok(())
}

/// Weak Dirichlet enforcement on the condensed face-only system.
///
/// Adds `coefficient` to the diagonal of every Dirichlet face block and
/// `coefficient * g` to the matching rhs entries, `g` being the projected
/// boundary value (zero for homogeneous faces).
pub(crate) fn apply_weak_penalty<T: RealField + Copy>(sys: &mut CellSystem<T>, coefficient: T) {
    debug_assert!(sys.mat.is_condensed(), "penalty targets the condensed face blocks");

    let fd = sys.mat.face_block_size();
    for f in 0..sys.n_faces() {
        match sys.face_bc[f] {
            FaceBc::Interior => continue,
            FaceBc::HomogeneousDirichlet => {
                let mut ff = sys.mat.ff_mut(f, f);
                for k in 0..fd {
                    ff[(k, k)] += coefficient;
                }
            }
            FaceBc::Dirichlet => {
                {
                    let mut ff = sys.mat.ff_mut(f, f);
                    for k in 0..fd {
                        ff[(k, k)] += coefficient;
                    }
                }
                for k in 0..fd {
                    let g = sys.dir_values[f * fd + k];
                    sys.rhs[f * fd + k] += coefficient * g;
                }
            }
        }
    }
}
