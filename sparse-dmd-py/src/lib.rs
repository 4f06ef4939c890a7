use numpy::ndarray::{Array1, Array2, ArrayView2, ArrayViewD, Ix2};
use numpy::{Complex64, IntoPyArray, PyReadonlyArray1, PyReadonlyArray2, PyReadonlyArrayDyn};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDict;

use ::sparse_dmd as spdmd;
use spdmd::C64;

// ============================================================================
// Helper conversions
// ============================================================================

fn mat_to_faer(arr: ArrayView2<'_, f64>) -> faer::Mat<f64> {
    let (nrows, ncols) = arr.dim();
    faer::Mat::from_fn(nrows, ncols, |i, j| arr[[i, j]])
}

fn faer_to_array2(m: &faer::Mat<f64>) -> Array2<f64> {
    Array2::from_shape_fn((m.nrows(), m.ncols()), |(i, j)| m[(i, j)])
}

fn to_py_complex(z: C64) -> Complex64 {
    Complex64::new(z.re, z.im)
}

fn cmat_to_array2(m: &faer::Mat<C64>) -> Array2<Complex64> {
    Array2::from_shape_fn((m.nrows(), m.ncols()), |(i, j)| to_py_complex(m[(i, j)]))
}

fn cvec_to_array1(v: &[C64]) -> Array1<Complex64> {
    v.iter().copied().map(to_py_complex).collect()
}

/// Singular values from either a vector or a diagonal Σ matrix.
fn singular_values(s: ArrayViewD<'_, f64>) -> PyResult<Vec<f64>> {
    match s.ndim() {
        1 => Ok(s.iter().copied().collect()),
        2 => {
            let m = s
                .into_dimensionality::<Ix2>()
                .map_err(|e| PyValueError::new_err(e.to_string()))?;
            spdmd::utils::diagonal_values(&mat_to_faer(m)).map_err(spdmd_err_to_py)
        }
        d => Err(PyValueError::new_err(format!(
            "S must be 1-D or 2-D, got {d} dimensions"
        ))),
    }
}

fn spdmd_err_to_py(e: spdmd::SpdmdError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

fn sweep_config(
    rho: f64,
    max_iter: usize,
    eps_abs: f64,
    eps_rel: f64,
    parallel: bool,
) -> spdmd::SweepConfig {
    spdmd::SweepConfig {
        admm: spdmd::AdmmConfig {
            rho,
            max_iter,
            eps_abs,
            eps_rel,
            ..Default::default()
        },
        parallel,
    }
}

/// Pack a sweep result into the answer dict.
///
/// Per-gamma arrays hold NaN (and Nz = -1) for grid points whose solve
/// failed; the messages are listed under "errors".
fn answer_dict<'py>(py: Python<'py>, result: &spdmd::SweepResult) -> PyResult<Bound<'py, PyDict>> {
    let r = result.reduction.rank;
    let ng = result.entries.len();
    let nan = Complex64::new(f64::NAN, f64::NAN);

    let mut gamma = Array1::<f64>::from_elem(ng, f64::NAN);
    let mut nz = Array1::<i64>::from_elem(ng, -1);
    let mut jsp = Array1::<f64>::from_elem(ng, f64::NAN);
    let mut jpol = Array1::<f64>::from_elem(ng, f64::NAN);
    let mut ploss = Array1::<f64>::from_elem(ng, f64::NAN);
    let mut loss = Array1::<f64>::from_elem(ng, f64::NAN);
    let mut xsp = Array2::<Complex64>::from_elem((r, ng), nan);
    let mut xpol = Array2::<Complex64>::from_elem((r, ng), nan);
    let mut errors: Vec<(usize, String)> = Vec::new();

    for (k, entry) in result.entries.iter().enumerate() {
        match entry {
            Ok(res) => {
                gamma[k] = res.gamma;
                nz[k] = res.nonzero_count as i64;
                jsp[k] = res.j_sparse;
                jpol[k] = res.j_polished;
                ploss[k] = res.percent_loss;
                loss[k] = res.performance_loss;
                for i in 0..r {
                    xsp[[i, k]] = to_py_complex(res.sparse[i]);
                    xpol[[i, k]] = to_py_complex(res.polished[i]);
                }
            }
            Err(e) => errors.push((k, e.to_string())),
        }
    }

    let products = &result.products;
    let dict = PyDict::new(py);
    dict.set_item("Fdmd", faer_to_array2(&products.fdmd).into_pyarray(py))?;
    dict.set_item("Edmd", cvec_to_array1(&products.edmd).into_pyarray(py))?;
    dict.set_item("Ydmd", cmat_to_array2(&products.ydmd).into_pyarray(py))?;
    dict.set_item("xdmd", cvec_to_array1(&products.xdmd).into_pyarray(py))?;
    dict.set_item("gamma", gamma.into_pyarray(py))?;
    dict.set_item("Nz", nz.into_pyarray(py))?;
    dict.set_item("Jsp", jsp.into_pyarray(py))?;
    dict.set_item("Jpol", jpol.into_pyarray(py))?;
    dict.set_item("Ploss", ploss.into_pyarray(py))?;
    dict.set_item("performance_loss", loss.into_pyarray(py))?;
    dict.set_item("xsp", xsp.into_pyarray(py))?;
    dict.set_item("xpol", xpol.into_pyarray(py))?;
    dict.set_item("errors", errors)?;
    Ok(dict)
}

// ============================================================================
// Reduction
// ============================================================================

/// Reduce a snapshot matrix to its DMD operator and eigen-pairs.
///
/// Parameters
/// ----------
/// x : numpy.ndarray
///     Snapshot matrix (n_vars x n_time).
/// rank : int, optional
///     Truncation rank cap. None for automatic.
/// rel_tol : float
///     Relative singular value cutoff.
///
/// Returns
/// -------
/// dict
///     U, S, V, UstarX1, Fdmd, Edmd, Ydmd, modes and rank.
#[pyfunction]
#[pyo3(signature = (x, rank=None, rel_tol=1e-10))]
fn reduce_snapshots<'py>(
    py: Python<'py>,
    x: PyReadonlyArray2<f64>,
    rank: Option<usize>,
    rel_tol: f64,
) -> PyResult<Bound<'py, PyDict>> {
    let mat = mat_to_faer(x.as_array());
    let config = spdmd::ReductionConfig { rank, rel_tol };
    let red = spdmd::reduce_snapshots(&mat, &config).map_err(spdmd_err_to_py)?;

    let dict = PyDict::new(py);
    if let Some(u) = &red.basis {
        dict.set_item("U", faer_to_array2(u).into_pyarray(py))?;
    }
    if let Some(modes) = &red.modes {
        dict.set_item("modes", cmat_to_array2(modes).into_pyarray(py))?;
    }
    dict.set_item("S", Array1::from(red.singular_values.clone()).into_pyarray(py))?;
    dict.set_item("V", faer_to_array2(&red.right_vectors).into_pyarray(py))?;
    dict.set_item("UstarX1", faer_to_array2(&red.projected_future).into_pyarray(py))?;
    dict.set_item("Fdmd", faer_to_array2(&red.reduced_operator).into_pyarray(py))?;
    dict.set_item("Edmd", cvec_to_array1(&red.eigenvalues).into_pyarray(py))?;
    dict.set_item("Ydmd", cmat_to_array2(&red.eigenvectors).into_pyarray(py))?;
    dict.set_item("rank", red.rank)?;
    Ok(dict)
}

// ============================================================================
// Sparse sweeps
// ============================================================================

/// Sparsity-promoting DMD on a snapshot matrix.
///
/// Parameters
/// ----------
/// x : numpy.ndarray
///     Snapshot matrix (n_vars x n_time).
/// gammas : numpy.ndarray
///     Strictly ascending, nonnegative regularization weights.
/// rank : int, optional
///     Truncation rank cap.
/// rho, max_iter, eps_abs, eps_rel : ADMM settings.
/// parallel : bool
///     Solve grid points in parallel.
///
/// Returns
/// -------
/// dict
///     Fdmd, Edmd, Ydmd, xdmd, gamma, Nz, Jsp, Jpol, Ploss, xsp, xpol.
#[pyfunction]
#[pyo3(signature = (x, gammas, rank=None, rho=1.0, max_iter=10000, eps_abs=1e-6, eps_rel=1e-4, parallel=true))]
#[allow(clippy::too_many_arguments)]
fn run_sparse_dmd<'py>(
    py: Python<'py>,
    x: PyReadonlyArray2<f64>,
    gammas: PyReadonlyArray1<f64>,
    rank: Option<usize>,
    rho: f64,
    max_iter: usize,
    eps_abs: f64,
    eps_rel: f64,
    parallel: bool,
) -> PyResult<Bound<'py, PyDict>> {
    let mat = mat_to_faer(x.as_array());
    let grid = gammas.as_array().to_vec();
    let config = spdmd::SparseDmdConfig {
        reduction: spdmd::ReductionConfig {
            rank,
            ..Default::default()
        },
        sweep: sweep_config(rho, max_iter, eps_abs, eps_rel, parallel),
    };

    let result = py
        .allow_threads(|| spdmd::run_sparse_dmd(&mat, &grid, &config))
        .map_err(spdmd_err_to_py)?;
    answer_dict(py, &result)
}

/// Sparsity-promoting DMD from precomputed projections.
///
/// Parameters
/// ----------
/// ustar_x1 : numpy.ndarray
///     U* X1 (r x N).
/// s : numpy.ndarray
///     Singular values, either a vector (r) or the diagonal Σ matrix (r x r).
/// v : numpy.ndarray
///     Right singular vectors (N x r).
/// gammas : numpy.ndarray
///     Strictly ascending, nonnegative regularization weights.
///
/// Returns
/// -------
/// dict
///     Same keys as `run_sparse_dmd`.
#[pyfunction]
#[pyo3(signature = (ustar_x1, s, v, gammas, rho=1.0, max_iter=10000, eps_abs=1e-6, eps_rel=1e-4, parallel=true))]
#[allow(clippy::too_many_arguments)]
fn run_dmdsp<'py>(
    py: Python<'py>,
    ustar_x1: PyReadonlyArray2<f64>,
    s: PyReadonlyArrayDyn<f64>,
    v: PyReadonlyArray2<f64>,
    gammas: PyReadonlyArray1<f64>,
    rho: f64,
    max_iter: usize,
    eps_abs: f64,
    eps_rel: f64,
    parallel: bool,
) -> PyResult<Bound<'py, PyDict>> {
    let projected = mat_to_faer(ustar_x1.as_array());
    let sigma = singular_values(s.as_array())?;
    let right = mat_to_faer(v.as_array());
    let grid = gammas.as_array().to_vec();
    let config = spdmd::SparseDmdConfig {
        sweep: sweep_config(rho, max_iter, eps_abs, eps_rel, parallel),
        ..Default::default()
    };

    let result = py
        .allow_threads(|| {
            let red = spdmd::Reduction::from_projection(&projected, &sigma, &right)?;
            spdmd::run_sparse_dmd_on(&red, &grid, &config)
        })
        .map_err(spdmd_err_to_py)?;
    answer_dict(py, &result)
}

// ============================================================================
// Module
// ============================================================================

#[pymodule]
fn sparse_dmd_py(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(reduce_snapshots, m)?)?;
    m.add_function(wrap_pyfunction!(run_sparse_dmd, m)?)?;
    m.add_function(wrap_pyfunction!(run_dmdsp, m)?)?;
    Ok(())
}
