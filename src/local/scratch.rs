use nalgebra::{RealField, Vector3};

use crate::degree::{scratch_sizes, Degree, ScratchSizes};
use crate::local::CellSystem;

/// Reusable scalar/vector buffers for one worker.
///
/// Sized once at construction from [`scratch_sizes`]; cellwise work then
/// never allocates. The scalar buffer is large enough for the biggest
/// factorization or basis-evaluation temporary of the configured degree.
#[derive(Debug, Clone)]
pub struct CellScratch<T: RealField> {
    pub values: Vec<T>,
    pub vectors: Vec<Vector3<T>>,
    sizes: ScratchSizes,
}

impl<T: RealField + Copy> CellScratch<T> {
    pub fn new(degree: Degree, max_faces_per_cell: usize) -> Self {
        let sizes = scratch_sizes(degree, max_faces_per_cell);
        Self {
            values: vec![T::zero(); sizes.values],
            vectors: vec![Vector3::zeros(); sizes.vectors],
            sizes,
        }
    }

    pub fn sizes(&self) -> ScratchSizes {
        self.sizes
    }

    /// Two disjoint scalar sub-buffers of the given lengths.
    ///
    /// Panics if the combined length exceeds the scratch sizing, which would
    /// mean the sizing formula and a caller disagree.
    pub fn split_values(&mut self, first: usize, second: usize) -> (&mut [T], &mut [T]) {
        assert!(
            first + second <= self.values.len(),
            "scratch buffer too small: requested {} + {}, sized {}",
            first,
            second,
            self.values.len()
        );
        let (a, rest) = self.values.split_at_mut(first);
        (a, &mut rest[..second])
    }
}

/// Explicit per-worker context for the build/condense and reconstruction
/// passes: the cellwise system plus its scratch buffers.
///
/// Workers are created per thread and passed explicitly to every cellwise
/// routine; there is no ambient thread-id lookup.
#[derive(Debug, Clone)]
pub struct CellWorker<T: RealField> {
    pub system: CellSystem<T>,
    pub scratch: CellScratch<T>,
}

impl<T: RealField + Copy> CellWorker<T> {
    pub fn new(degree: Degree, max_faces_per_cell: usize) -> Self {
        Self {
            system: CellSystem::new(degree, max_faces_per_cell),
            scratch: CellScratch::new(degree, max_faces_per_cell),
        }
    }
}
