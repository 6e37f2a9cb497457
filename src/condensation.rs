//! Static condensation of the cellwise system and the persistent coefficient
//! cache used to recover interior values after the global solve.

use nalgebra::{DMatrixView, RealField};

use crate::degree::{ldlt_packed_len, Degree};
use crate::error::HhoError;
use crate::local::{CellScratch, CellSystem};
use crate::mesh::MeshTopology;

/// Coefficients recorded during condensation, one slot per cell.
///
/// `rc_tilda` holds `A_CC^-1 rhs_C` per cell. `acf_tilda` holds one block
/// per (cell, face) incidence, addressed through the topology's cell-face
/// offsets: the block for local face `f` of cell `c` sits at incidence
/// `cell_face_offset(c) + f`. Each block is `A_CC^-1 A_CF` for that face,
/// stored transposed (face-DOF major) so that both the Schur product and the
/// reconstruction read it row by row.
#[derive(Debug, Clone)]
pub struct CondensationCache<T: RealField> {
    rc_tilda: Vec<T>,
    acf_tilda: Vec<T>,
    cell_dofs: usize,
    face_dofs: usize,
}

/// Mutable slice of the cache owned by exactly one cell.
///
/// The build pass hands one of these to each worker, so concurrent workers
/// never alias a slot.
pub(crate) struct CellCacheMut<'a, T> {
    pub rc: &'a mut [T],
    pub acf: &'a mut [T],
}

impl<T: RealField + Copy> CondensationCache<T> {
    pub fn new(degree: Degree, topo: &MeshTopology) -> Self {
        let cd = degree.cell_dofs();
        let fd = degree.face_dofs();
        Self {
            rc_tilda: vec![T::zero(); topo.num_cells() * cd],
            acf_tilda: vec![T::zero(); topo.num_cell_face_incidences() * fd * cd],
            cell_dofs: cd,
            face_dofs: fd,
        }
    }

    fn block_len(&self) -> usize {
        self.cell_dofs * self.face_dofs
    }

    /// Post-elimination interior right-hand side of `cell`.
    pub fn rc_cell(&self, cell: usize) -> &[T] {
        &self.rc_tilda[cell * self.cell_dofs..(cell + 1) * self.cell_dofs]
    }

    /// Transposed interior transform of local face `f` of `cell`
    /// (`face_dofs` rows of `cell_dofs` entries).
    pub fn acf_block(&self, topo: &MeshTopology, cell: usize, f: usize) -> &[T] {
        debug_assert!(f < topo.cell_faces(cell).len());
        let blk = self.block_len();
        let start = (topo.cell_face_offset(cell) + f) * blk;
        &self.acf_tilda[start..start + blk]
    }

    /// Splits the cache into disjoint per-cell mutable parts, in cell order.
    pub(crate) fn cell_parts(&mut self, topo: &MeshTopology) -> Vec<CellCacheMut<'_, T>> {
        let blk = self.block_len();
        let mut parts = Vec::with_capacity(topo.num_cells());
        let mut rc_rest = self.rc_tilda.as_mut_slice();
        let mut acf_rest = self.acf_tilda.as_mut_slice();
        for cell in 0..topo.num_cells() {
            let (rc, rc_tail) = rc_rest.split_at_mut(self.cell_dofs);
            rc_rest = rc_tail;
            let (acf, acf_tail) = acf_rest.split_at_mut(topo.cell_faces(cell).len() * blk);
            acf_rest = acf_tail;
            parts.push(CellCacheMut { rc, acf });
        }
        parts
    }
}

/// Factorizes the cell-cell block into `facto` using the degree-specific
/// kernel. `facto` is packed lower-triangular storage of length
/// `n (n + 1) / 2` with the pivots `d_i` on the diagonal slots.
fn cc_factor<T: RealField + Copy>(cc: DMatrixView<'_, T>, facto: &mut [T]) -> Result<(), HhoError> {
    match cc.nrows() {
        1 => {
            facto[0] = T::one() / cc[(0, 0)];
            Ok(())
        }
        4 => {
            ldlt44_factor(cc, facto);
            Ok(())
        }
        10 => {
            ldlt_factor(cc, facto);
            Ok(())
        }
        n => Err(HhoError::UnsupportedBlockSize(n)),
    }
}

/// Solves `A_CC x = b` from the packed factor produced by [`cc_factor`].
fn cc_solve<T: RealField + Copy>(n: usize, facto: &[T], b: &[T], x: &mut [T]) {
    match n {
        // Size-1 factor stores the inverse directly.
        1 => x[0] = facto[0] * b[0],
        4 => ldlt44_solve(facto, b, x),
        _ => ldlt_solve(n, facto, b, x),
    }
}

/// Packed LDLT factorization of a symmetric positive definite matrix.
///
/// `facto[i (i + 1) / 2 + j]` holds `L[i][j]` for `j < i` and the pivot
/// `d_i` at `j == i`. No pivoting and no singularity check: the cell block
/// of a diffusion operator is expected SPD.
fn ldlt_factor<T: RealField + Copy>(a: DMatrixView<'_, T>, facto: &mut [T]) {
    let n = a.nrows();
    debug_assert_eq!(a.ncols(), n);
    debug_assert!(facto.len() >= ldlt_packed_len(n));

    for i in 0..n {
        let row_i = ldlt_packed_len(i);
        for j in 0..i {
            let row_j = ldlt_packed_len(j);
            let mut s = a[(i, j)];
            for k in 0..j {
                s -= facto[row_i + k] * facto[row_j + k] * facto[ldlt_packed_len(k) + k];
            }
            facto[row_i + j] = s / facto[row_j + j];
        }
        let mut d = a[(i, i)];
        for k in 0..i {
            let l_ik = facto[row_i + k];
            d -= l_ik * l_ik * facto[ldlt_packed_len(k) + k];
        }
        facto[row_i + i] = d;
    }
}

/// Forward/diagonal/backward substitution on a packed LDLT factor.
fn ldlt_solve<T: RealField + Copy>(n: usize, facto: &[T], b: &[T], x: &mut [T]) {
    // L z = b
    for i in 0..n {
        let row_i = ldlt_packed_len(i);
        let mut s = b[i];
        for j in 0..i {
            s -= facto[row_i + j] * x[j];
        }
        x[i] = s;
    }
    // D w = z
    for i in 0..n {
        x[i] /= facto[ldlt_packed_len(i) + i];
    }
    // L^T x = w
    for i in (0..n).rev() {
        let mut s = x[i];
        for j in (i + 1)..n {
            s -= facto[ldlt_packed_len(j) + i] * x[j];
        }
        x[i] = s;
    }
}

/// Modified-Cholesky factorization specialized for the 4x4 cell block of the
/// degree-1 scheme (10 packed entries).
fn ldlt44_factor<T: RealField + Copy>(a: DMatrixView<'_, T>, facto: &mut [T]) {
    let d0 = a[(0, 0)];
    facto[0] = d0;

    let l10 = a[(1, 0)] / d0;
    let d1 = a[(1, 1)] - l10 * l10 * d0;
    facto[1] = l10;
    facto[2] = d1;

    let l20 = a[(2, 0)] / d0;
    let l21 = (a[(2, 1)] - l20 * l10 * d0) / d1;
    let d2 = a[(2, 2)] - l20 * l20 * d0 - l21 * l21 * d1;
    facto[3] = l20;
    facto[4] = l21;
    facto[5] = d2;

    let l30 = a[(3, 0)] / d0;
    let l31 = (a[(3, 1)] - l30 * l10 * d0) / d1;
    let l32 = (a[(3, 2)] - l30 * l20 * d0 - l31 * l21 * d1) / d2;
    let d3 = a[(3, 3)] - l30 * l30 * d0 - l31 * l31 * d1 - l32 * l32 * d2;
    facto[6] = l30;
    facto[7] = l31;
    facto[8] = l32;
    facto[9] = d3;
}

fn ldlt44_solve<T: RealField + Copy>(facto: &[T], b: &[T], x: &mut [T]) {
    let z0 = b[0];
    let z1 = b[1] - facto[1] * z0;
    let z2 = b[2] - facto[3] * z0 - facto[4] * z1;
    let z3 = b[3] - facto[6] * z0 - facto[7] * z1 - facto[8] * z2;

    let w0 = z0 / facto[0];
    let w1 = z1 / facto[2];
    let w2 = z2 / facto[5];
    let w3 = z3 / facto[9];

    x[3] = w3;
    x[2] = w2 - facto[8] * x[3];
    x[1] = w1 - facto[4] * x[2] - facto[7] * x[3];
    x[0] = w0 - facto[1] * x[1] - facto[3] * x[2] - facto[6] * x[3];
}

/// Eliminates the interior block of the assembled local system and records
/// the transform coefficients for the bound cell.
///
/// Must run exactly once per cell per assembly pass, after all volumetric
/// contributions have been folded in and before any face-only boundary
/// penalty. On return the local system holds the Schur complement on the
/// face unknowns only.
pub(crate) fn condense_and_store<T: RealField + Copy>(
    sys: &mut CellSystem<T>,
    cache: &mut CellCacheMut<'_, T>,
    scratch: &mut CellScratch<T>,
) -> Result<(), HhoError> {
    let nf = sys.n_faces();
    let fd = sys.mat.face_block_size();
    let cd = sys.mat.cell_block_size();
    let blk = fd * cd;
    debug_assert_eq!(cache.rc.len(), cd);
    debug_assert_eq!(cache.acf.len(), nf * blk);

    {
        let (facto, col) = scratch.split_values(ldlt_packed_len(cd), cd);
        cc_factor(sys.mat.cc(), facto)?;

        // rc_tilda = A_CC^-1 rhs_C
        let c_off = sys.cell_block_offset();
        cc_solve(cd, facto, &sys.rhs.as_slice()[c_off..c_off + cd], cache.rc);

        // acf = A_CC^-1 A_CF, solved columnwise and stored transposed.
        for f in 0..nf {
            let cf = sys.mat.cf(f);
            for f_dof in 0..fd {
                for c_dof in 0..cd {
                    col[c_dof] = cf[(c_dof, f_dof)];
                }
                let slot = &mut cache.acf[f * blk + f_dof * cd..f * blk + (f_dof + 1) * cd];
                cc_solve(cd, facto, col, slot);
            }
        }
    }

    // Schur complement: A_FF -= A_FC acf, rhs_F -= A_FC rc_tilda.
    let (fc_buf, bf_tilda) = scratch.split_values(blk, fd);
    for fi in 0..nf {
        {
            let fc = sys.mat.fc(fi);
            for i in 0..fd {
                for k in 0..cd {
                    fc_buf[i * cd + k] = fc[(i, k)];
                }
            }
        }

        for i in 0..fd {
            let mut s = T::zero();
            for k in 0..cd {
                s += fc_buf[i * cd + k] * cache.rc[k];
            }
            bf_tilda[i] = s;
        }
        for i in 0..fd {
            sys.rhs[fi * fd + i] -= bf_tilda[i];
        }

        for fj in 0..nf {
            let acf_j = &cache.acf[fj * blk..(fj + 1) * blk];
            let mut ff = sys.mat.ff_mut(fi, fj);
            for i in 0..fd {
                for j in 0..fd {
                    let mut s = T::zero();
                    for k in 0..cd {
                        s += fc_buf[i * cd + k] * acf_j[j * cd + k];
                    }
                    ff[(i, j)] -= s;
                }
            }
        }
    }

    sys.mark_condensed();
    Ok(())
}

/// Recovers the interior coefficients of one cell from the condensation
/// cache and the solved face unknowns:
/// `x_C = rc_tilda - sum_f acf_f^T x_F[f]`.
///
/// `f_contrib` is a scratch slice of `cell_dofs` entries; `x_c` receives the
/// interior coefficients.
pub(crate) fn reconstruct_cell_dofs<T: RealField + Copy>(
    cache: &CondensationCache<T>,
    topo: &MeshTopology,
    cell: usize,
    solution: &[T],
    f_contrib: &mut [T],
    x_c: &mut [T],
) {
    let fd = cache.face_dofs;
    let cd = cache.cell_dofs;
    f_contrib.fill(T::zero());

    for (f, &face) in topo.cell_faces(cell).iter().enumerate() {
        let acf = cache.acf_block(topo, cell, f);
        let x_f = &solution[face * fd..(face + 1) * fd];
        for f_dof in 0..fd {
            for c_dof in 0..cd {
                f_contrib[c_dof] += acf[f_dof * cd + c_dof] * x_f[f_dof];
            }
        }
    }

    let rc = cache.rc_cell(cell);
    for c_dof in 0..cd {
        x_c[c_dof] = rc[c_dof] - f_contrib[c_dof];
    }
}
