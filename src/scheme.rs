//! Scheme-level shared structures and the per-equation assembly context.
//!
//! [`HhoScheme`] owns what every equation of a given degree shares: the mesh
//! topology and the per-degree face sparsity patterns. Each equation then
//! gets its own [`ScalarHhoContext`] holding the condensation cache, the
//! boundary map and the current field values.

use std::cell::RefCell;
use std::sync::Arc;

use nalgebra::{DVector, RealField};
use nalgebra_sparse::pattern::SparsityPattern;
use nalgebra_sparse::CsrMatrix;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use thread_local::ThreadLocal;

use crate::assembly::{build_face_pattern, FaceDofNumbering, ScatterBuffer};
use crate::boundary::{build_bf2def, classify_cell_boundary};
use crate::condensation::{condense_and_store, reconstruct_cell_dofs, CondensationCache};
use crate::degree::Degree;
use crate::error::HhoError;
use crate::local::CellWorker;
use crate::mesh::MeshTopology;
use crate::operator::{BcEnforcement, CellEvaluator, EquationParams};

struct DegreeStructure {
    pattern: Arc<SparsityPattern>,
    numbering: FaceDofNumbering,
}

/// Shared structures of the HHO discretization, set up once per mesh.
pub struct HhoScheme<T: RealField> {
    topology: Arc<MeshTopology>,
    structures: FxHashMap<Degree, DegreeStructure>,
    marker: std::marker::PhantomData<T>,
}

impl<T: RealField + Copy> HhoScheme<T> {
    /// Builds the shared structures for every degree in `degrees`.
    pub fn new(degrees: &[Degree], topology: Arc<MeshTopology>) -> Result<Self, HhoError> {
        if degrees.is_empty() {
            return Err(HhoError::config(
                "at least one polynomial degree must be requested",
            ));
        }
        let mut structures = FxHashMap::default();
        for &degree in degrees {
            let pattern = Arc::new(build_face_pattern(&topology, degree)?);
            let numbering = FaceDofNumbering::new(&topology, degree);
            log::debug!(
                "face system structure for degree {}: {} dofs, {} nonzeros",
                degree.order(),
                numbering.num_dofs(),
                pattern.nnz()
            );
            structures.insert(degree, DegreeStructure { pattern, numbering });
        }
        Ok(Self {
            topology,
            structures,
            marker: std::marker::PhantomData,
        })
    }

    pub fn topology(&self) -> &Arc<MeshTopology> {
        &self.topology
    }

    /// Creates the assembly context of one scalar equation.
    pub fn create_context(
        &self,
        params: EquationParams<T>,
    ) -> Result<ScalarHhoContext<T>, HhoError> {
        if params.dim != 1 {
            return Err(HhoError::config(format!(
                "equation '{}' has dimension {}; only scalar equations are handled",
                params.name, params.dim
            )));
        }
        let structure = self.structures.get(&params.degree).ok_or_else(|| {
            HhoError::config(format!(
                "degree {} was not initialized on this scheme",
                params.degree.order()
            ))
        })?;

        let topo = &self.topology;
        let bf2def = build_bf2def(topo, &params.bc_defs)?;
        let cache = CondensationCache::new(params.degree, topo);
        let cd = params.degree.cell_dofs();
        let source_terms = params
            .has_source
            .then(|| vec![T::zero(); topo.num_cells() * cd]);

        log::debug!(
            "context for equation '{}': degree {}, {} cells, {} face dofs",
            params.name,
            params.degree.order(),
            topo.num_cells(),
            structure.numbering.num_dofs()
        );

        Ok(ScalarHhoContext {
            params,
            topology: Arc::clone(topo),
            pattern: Arc::clone(&structure.pattern),
            numbering: structure.numbering,
            bf2def,
            cache,
            face_values: vec![T::zero(); structure.numbering.num_dofs()],
            cell_values: vec![T::zero(); topo.num_cells() * cd],
            source_terms,
        })
    }
}

struct BuildWorker<T: RealField> {
    worker: CellWorker<T>,
    scatter: ScatterBuffer<T>,
}

impl<T: RealField + Copy> BuildWorker<T> {
    fn new(degree: Degree, max_faces_per_cell: usize) -> Self {
        Self {
            worker: CellWorker::new(degree, max_faces_per_cell),
            scatter: ScatterBuffer::default(),
        }
    }
}

/// Assembly context of one scalar equation: everything the build and
/// reconstruction passes need besides the evaluator.
pub struct ScalarHhoContext<T: RealField> {
    params: EquationParams<T>,
    topology: Arc<MeshTopology>,
    pattern: Arc<SparsityPattern>,
    numbering: FaceDofNumbering,
    bf2def: Vec<Option<usize>>,
    cache: CondensationCache<T>,
    face_values: Vec<T>,
    cell_values: Vec<T>,
    source_terms: Option<Vec<T>>,
}

impl<T: RealField + Copy + Send + Sync> ScalarHhoContext<T> {
    pub fn params(&self) -> &EquationParams<T> {
        &self.params
    }

    /// Number of unknowns of the condensed face-only system.
    pub fn num_face_dofs(&self) -> usize {
        self.numbering.num_dofs()
    }

    /// Current face coefficients, in the global face-DOF numbering.
    pub fn face_values(&self) -> &[T] {
        &self.face_values
    }

    /// Current interior (cell) coefficients, `cell_dofs` per cell.
    pub fn cell_values(&self) -> &[T] {
        &self.cell_values
    }

    /// Projects the source term of every cell into the persistent source
    /// cache. Recomputes from scratch, so calling it repeatedly between two
    /// builds does not accumulate. A no-op when the equation has no source.
    pub fn compute_source<E>(&mut self, evaluator: &E) -> Result<(), HhoError>
    where
        E: CellEvaluator<T> + ?Sized,
    {
        let Some(source) = &mut self.source_terms else {
            return Ok(());
        };
        let cd = self.params.degree.cell_dofs();
        source
            .par_chunks_mut(cd)
            .enumerate()
            .try_for_each(|(cell, chunk)| {
                chunk.fill(T::zero());
                evaluator.project_source(cell, chunk)
            })
    }

    /// Allocates the zeroed global system matching the shared sparsity
    /// pattern.
    pub fn initialize_system(&self) -> Result<(CsrMatrix<T>, DVector<T>), HhoError> {
        let nnz = self.pattern.nnz();
        let matrix = CsrMatrix::try_from_pattern_and_values(
            (*self.pattern).clone(),
            vec![T::zero(); nnz],
        )
        .map_err(|err| HhoError::config(format!("invalid global system structure: {err}")))?;
        Ok((matrix, DVector::zeros(self.numbering.num_dofs())))
    }

    /// Assembles the condensed face-only system of the equation.
    ///
    /// Runs the cellwise pipeline in parallel: bind, boundary classification,
    /// diffusion operator, source fold-in, static condensation, weak penalty,
    /// scatter. Worker buffers are merged into `matrix` and `rhs` afterwards;
    /// the result does not depend on the scheduling beyond floating-point
    /// summation order.
    pub fn build_system<E>(
        &mut self,
        evaluator: &E,
        rhs: &mut DVector<T>,
        matrix: &mut CsrMatrix<T>,
    ) -> Result<(), HhoError>
    where
        E: CellEvaluator<T> + ?Sized,
    {
        if self.params.has_convection {
            return Err(HhoError::UnimplementedCapability("convection term"));
        }
        if self.params.is_transient {
            return Err(HhoError::UnimplementedCapability("transient term"));
        }
        let BcEnforcement::WeakPenalty { coefficient } = self.params.enforcement else {
            return Err(HhoError::config(
                "strong Dirichlet enforcement is not implemented; use the weak penalty",
            ));
        };
        if rhs.len() != self.numbering.num_dofs() {
            return Err(HhoError::config(format!(
                "right-hand side has {} entries, expected {}",
                rhs.len(),
                self.numbering.num_dofs()
            )));
        }

        let degree = self.params.degree;
        let fd = degree.face_dofs();
        let cd = degree.cell_dofs();
        let max_faces = self.topology.max_faces_per_cell();

        let params = &self.params;
        let topo = self.topology.as_ref();
        let numbering = self.numbering;
        let bf2def = self.bf2def.as_slice();
        let source = self.source_terms.as_deref();
        let face_values = self.face_values.as_slice();
        let cell_values = self.cell_values.as_slice();
        let parts = self.cache.cell_parts(topo);

        let workers: ThreadLocal<RefCell<BuildWorker<T>>> = ThreadLocal::new();

        parts
            .into_par_iter()
            .enumerate()
            .try_for_each(|(cell, mut part)| {
                let mut guard = workers
                    .get_or(|| RefCell::new(BuildWorker::new(degree, max_faces)))
                    .borrow_mut();
                let BuildWorker { worker, scatter } = &mut *guard;
                let sys = &mut worker.system;

                let faces = topo.cell_faces(cell);
                sys.reset(cell, faces.len());

                for (f, &face) in faces.iter().enumerate() {
                    for k in 0..fd {
                        let g = numbering.global_dof(face, k);
                        sys.dof_ids[f * fd + k] = g;
                        sys.val_n[f * fd + k] = face_values[g];
                    }
                }
                let c_off = sys.cell_block_offset();
                for i in 0..cd {
                    sys.dof_ids[c_off + i] = cell * cd + i;
                    sys.val_n[c_off + i] = cell_values[cell * cd + i];
                }

                if topo.is_boundary_cell(cell) {
                    classify_cell_boundary(sys, topo, bf2def, &params.bc_defs, evaluator)?;
                }

                evaluator.assemble_diffusion(cell, params, &mut sys.mat)?;

                if let Some(source) = source {
                    for i in 0..cd {
                        sys.rhs[c_off + i] += source[cell * cd + i];
                    }
                }

                condense_and_store(sys, &mut part, &mut worker.scratch)?;

                if sys.has_dirichlet {
                    crate::boundary::apply_weak_penalty(sys, coefficient);
                }

                scatter.push_cell_system(sys);
                Ok(())
            })?;

        for worker in workers.into_iter() {
            worker.into_inner().scatter.apply(matrix, rhs)?;
        }

        log::debug!(
            "assembled equation '{}': {} cells into {} face dofs",
            self.params.name,
            self.topology.num_cells(),
            self.numbering.num_dofs()
        );
        Ok(())
    }

    /// Updates the stored field from the solved face unknowns.
    ///
    /// Recovers the interior coefficients of every cell from the
    /// condensation cache, evaluates the reconstructed field at each cell
    /// center into `field_out`, and adopts `solution` as the current face
    /// values.
    pub fn update_field<E>(
        &mut self,
        solution: &[T],
        evaluator: &E,
        field_out: &mut [T],
    ) -> Result<(), HhoError>
    where
        E: CellEvaluator<T> + ?Sized,
    {
        if solution.len() != self.numbering.num_dofs() {
            return Err(HhoError::config(format!(
                "solution has {} entries, expected {}",
                solution.len(),
                self.numbering.num_dofs()
            )));
        }
        if field_out.len() != self.topology.num_cells() {
            return Err(HhoError::config(format!(
                "field output has {} entries, expected one per cell ({})",
                field_out.len(),
                self.topology.num_cells()
            )));
        }

        let cd = self.params.degree.cell_dofs();
        let topo = self.topology.as_ref();
        let cache = &self.cache;
        let workspaces: ThreadLocal<RefCell<(Vec<T>, Vec<T>)>> = ThreadLocal::new();

        self.cell_values
            .par_chunks_mut(cd)
            .zip(field_out.par_iter_mut())
            .enumerate()
            .try_for_each(|(cell, (x_c, center_value))| {
                let mut guard = workspaces
                    .get_or(|| RefCell::new((vec![T::zero(); cd], vec![T::zero(); cd])))
                    .borrow_mut();
                let (f_contrib, basis) = &mut *guard;

                reconstruct_cell_dofs(cache, topo, cell, solution, f_contrib, x_c);
                evaluator.eval_cell_basis_at_center(cell, basis)?;
                let mut value = T::zero();
                for i in 0..cd {
                    value += basis[i] * x_c[i];
                }
                *center_value = value;
                Ok(())
            })?;

        self.face_values.copy_from_slice(solution);
        Ok(())
    }
}
