//! End-to-end tests of the assembly pipeline: build, external solve,
//! reconstruction, sources and scheduling independence.

mod common;

use std::sync::Arc;

use matrixcompare::assert_matrix_eq;
use nalgebra::{DMatrix, DVector, Point3};

use common::{two_cube_topology, ManufacturedEvaluator};
use hho::boundary::{BoundaryDef, DirichletValue};
use hho::{BcEnforcement, Degree, EquationParams, HhoError, HhoScheme};

fn dirichlet_defs() -> Vec<BoundaryDef<f64>> {
    // One zone covering the whole boundary; the evaluator supplies the
    // projected values, so the pointwise function is never sampled here.
    vec![BoundaryDef::new(
        (0..10).collect(),
        DirichletValue::Function(Arc::new(|_: &Point3<f64>| 0.0)),
    )]
}

fn diffusion_params(degree: Degree) -> EquationParams<f64> {
    let mut params =
        EquationParams::diffusion("potential", degree, 2.0).with_bc_defs(dirichlet_defs());
    // Moderate penalty keeps the dense reference solve well conditioned.
    params.enforcement = BcEnforcement::WeakPenalty { coefficient: 1e6 };
    params
}

/// The manufactured operator annihilates the exact solution, so with exact
/// Dirichlet data the penalized face system must reproduce it, and the
/// reconstruction must recover the exact interior coefficients.
#[test]
fn exact_solution_survives_condensation_solve_and_reconstruction() {
    for degree in [Degree::P0, Degree::P1, Degree::P2] {
        let topo = two_cube_topology();
        let evaluator = ManufacturedEvaluator::new(degree, Arc::clone(&topo));
        let scheme = HhoScheme::new(&[degree], Arc::clone(&topo)).unwrap();
        let mut ctx = scheme.create_context(diffusion_params(degree)).unwrap();

        let (mut matrix, mut rhs) = ctx.initialize_system().unwrap();
        ctx.build_system(&evaluator, &mut rhs, &mut matrix).unwrap();

        let dense = DMatrix::from(&matrix);
        let x = dense.lu().solve(&rhs).unwrap();

        let expected = DVector::from_column_slice(&evaluator.u_face);
        assert_matrix_eq!(x, expected, comp = abs, tol = 1e-7);

        let mut field = vec![0.0; topo.num_cells()];
        ctx.update_field(x.as_slice(), &evaluator, &mut field)
            .unwrap();

        let cd = degree.cell_dofs();
        for cell in 0..topo.num_cells() {
            assert!(
                (field[cell] - evaluator.u_cell[cell * cd]).abs() < 1e-7,
                "center value mismatch in cell {cell} for {degree:?}"
            );
        }
        for (got, expected) in ctx.cell_values().iter().zip(&evaluator.u_cell) {
            assert!((got - expected).abs() < 1e-7);
        }
        assert_eq!(ctx.face_values(), x.as_slice());
    }
}

/// Single unit cube at degree 1 with Dirichlet data `g(x, y, z) = x` on all
/// six faces: the solved face values equal the projection of `x` onto each
/// face basis and the cell center reconstructs `x` at the center, within
/// 1e-10.
#[test]
fn single_cube_with_linear_dirichlet_data_reproduces_x() {
    let degree = Degree::P1;
    let topo = Arc::new(
        hho::MeshTopology::from_cell_faces(0, 6, &[vec![0, 1, 2, 3, 4, 5]]).unwrap(),
    );

    // Face-basis coefficients of x: constant mode carries the face-center
    // x-coordinate (faces at x = 0 and x = 1, four side faces at x = 1/2;
    // the in-plane linear modes of x vanish except on the side faces, where
    // the first tangential mode is aligned with x).
    let face_centers_x = [0.0, 1.0, 0.5, 0.5, 0.5, 0.5];
    let mut u_face = vec![0.0; 6 * 3];
    for (f, &xc) in face_centers_x.iter().enumerate() {
        u_face[f * 3] = xc;
        if f >= 2 {
            u_face[f * 3 + 1] = 1.0;
        }
    }
    // Cell-basis coefficients of x about the center (1/2, 1/2, 1/2).
    let u_cell = vec![0.5, 1.0, 0.0, 0.0];

    let evaluator = ManufacturedEvaluator::with_solution(
        degree,
        Arc::clone(&topo),
        u_face.clone(),
        u_cell.clone(),
    );
    let scheme = HhoScheme::new(&[degree], Arc::clone(&topo)).unwrap();
    let mut params = EquationParams::diffusion("potential", degree, 1.0).with_bc_defs(vec![
        BoundaryDef::new(
            (0..6).collect(),
            DirichletValue::Function(Arc::new(|p: &Point3<f64>| p.x)),
        ),
    ]);
    params.enforcement = BcEnforcement::WeakPenalty { coefficient: 1e4 };
    let mut ctx = scheme.create_context(params).unwrap();

    let (mut matrix, mut rhs) = ctx.initialize_system().unwrap();
    ctx.build_system(&evaluator, &mut rhs, &mut matrix).unwrap();

    let dense = DMatrix::from(&matrix);
    let x = dense.lu().solve(&rhs).unwrap();
    let expected = DVector::from_column_slice(&u_face);
    assert_matrix_eq!(x, expected, comp = abs, tol = 1e-10);

    let mut field = vec![0.0; 1];
    ctx.update_field(x.as_slice(), &evaluator, &mut field)
        .unwrap();
    assert!((field[0] - 0.5).abs() < 1e-10);
    for (got, expected) in ctx.cell_values().iter().zip(&u_cell) {
        assert!((got - expected).abs() < 1e-10);
    }
}

#[test]
fn assembly_is_independent_of_the_thread_count() {
    let degree = Degree::P1;
    let topo = two_cube_topology();
    let evaluator = ManufacturedEvaluator::new(degree, Arc::clone(&topo));
    let scheme = HhoScheme::new(&[degree], Arc::clone(&topo)).unwrap();
    let mut ctx = scheme.create_context(diffusion_params(degree)).unwrap();

    let mut results = Vec::new();
    for threads in [1usize, 4] {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .unwrap();
        let (mut matrix, mut rhs) = ctx.initialize_system().unwrap();
        pool.install(|| ctx.build_system(&evaluator, &mut rhs, &mut matrix))
            .unwrap();
        results.push((DMatrix::from(&matrix), rhs));
    }

    let (matrix_parallel, rhs_parallel) = results.pop().unwrap();
    let (matrix_serial, rhs_serial) = results.pop().unwrap();
    assert_matrix_eq!(matrix_serial, matrix_parallel, comp = abs, tol = 1e-12);
    assert_matrix_eq!(rhs_serial, rhs_parallel, comp = abs, tol = 1e-12);
}

#[test]
fn source_projection_is_idempotent_and_feeds_only_the_rhs() {
    let degree = Degree::P1;
    let topo = two_cube_topology();
    let evaluator = ManufacturedEvaluator::new(degree, Arc::clone(&topo));
    let scheme = HhoScheme::new(&[degree], Arc::clone(&topo)).unwrap();

    let mut plain = scheme.create_context(diffusion_params(degree)).unwrap();
    let (mut m_plain, mut r_plain) = plain.initialize_system().unwrap();
    plain
        .build_system(&evaluator, &mut r_plain, &mut m_plain)
        .unwrap();

    // Projecting twice must not accumulate.
    let mut sourced = scheme
        .create_context(diffusion_params(degree).with_source())
        .unwrap();
    sourced.compute_source(&evaluator).unwrap();
    sourced.compute_source(&evaluator).unwrap();
    let (mut m_sourced, mut r_sourced) = sourced.initialize_system().unwrap();
    sourced
        .build_system(&evaluator, &mut r_sourced, &mut m_sourced)
        .unwrap();

    let mut once = scheme
        .create_context(diffusion_params(degree).with_source())
        .unwrap();
    once.compute_source(&evaluator).unwrap();
    let (mut m_once, mut r_once) = once.initialize_system().unwrap();
    once.build_system(&evaluator, &mut r_once, &mut m_once)
        .unwrap();

    assert_matrix_eq!(r_sourced, r_once, comp = abs, tol = 1e-14);
    // The eliminated interior source reaches the face rhs but never the
    // operator.
    assert_matrix_eq!(
        DMatrix::from(&m_plain),
        DMatrix::from(&m_sourced),
        comp = abs,
        tol = 1e-14
    );
    assert!((r_sourced[0] - r_plain[0]).abs() > 1e-8);
}

#[test]
fn missing_boundary_definition_aborts_the_build() {
    let degree = Degree::P0;
    let topo = two_cube_topology();
    let evaluator = ManufacturedEvaluator::new(degree, Arc::clone(&topo));
    let scheme = HhoScheme::new(&[degree], Arc::clone(&topo)).unwrap();

    // Only the first five boundary faces are covered.
    let mut params = diffusion_params(degree);
    params.bc_defs = vec![BoundaryDef::new(
        (0..5).collect(),
        DirichletValue::Homogeneous,
    )];
    let mut ctx = scheme.create_context(params).unwrap();
    let (mut matrix, mut rhs) = ctx.initialize_system().unwrap();

    let err = ctx
        .build_system(&evaluator, &mut rhs, &mut matrix)
        .unwrap_err();
    assert!(matches!(err, HhoError::UnresolvedBoundaryDefinition { .. }));
}
