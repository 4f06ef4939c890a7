use faer::Mat;

use crate::types::{SpdmdError, C64};

/// Validate that a matrix meets minimum dimension requirements and contains no NaN/Inf.
pub fn validate_matrix(x: &Mat<f64>, min_rows: usize, min_cols: usize) -> Result<(), SpdmdError> {
    let (rows, cols) = (x.nrows(), x.ncols());
    if rows < min_rows {
        return Err(SpdmdError::InvalidInput(format!(
            "matrix has {rows} rows, need at least {min_rows}"
        )));
    }
    if cols < min_cols {
        return Err(SpdmdError::InvalidInput(format!(
            "matrix has {cols} columns, need at least {min_cols}"
        )));
    }
    for j in 0..cols {
        for i in 0..rows {
            if !x[(i, j)].is_finite() {
                return Err(SpdmdError::InvalidInput(
                    "matrix contains NaN or Inf values".to_string(),
                ));
            }
        }
    }
    Ok(())
}

/// Number of singular values to keep.
///
/// Values at or below `rel_tol * sigma_max` are dropped; `rank`, if given,
/// caps the result. Returns 0 for a numerically zero spectrum.
pub fn truncation_rank(singular_values: &[f64], rank: Option<usize>, rel_tol: f64) -> usize {
    let sigma_max = singular_values.iter().cloned().fold(0.0_f64, f64::max);
    if sigma_max <= 0.0 || !sigma_max.is_finite() {
        return 0;
    }
    let cutoff = rel_tol * sigma_max;
    let significant = singular_values.iter().filter(|&&s| s > cutoff).count();
    match rank {
        Some(r) => significant.min(r),
        None => significant,
    }
}

/// Diagonal of a square matrix whose off-diagonal entries are all zero,
/// e.g. a Σ factor handed over as a matrix rather than a vector.
pub fn diagonal_values(sigma: &Mat<f64>) -> Result<Vec<f64>, SpdmdError> {
    let n = sigma.nrows();
    if sigma.ncols() != n {
        return Err(SpdmdError::InvalidInput(format!(
            "Σ must be square, got {}x{}",
            n,
            sigma.ncols()
        )));
    }
    for j in 0..n {
        for i in 0..n {
            if i != j && sigma[(i, j)] != 0.0 {
                return Err(SpdmdError::InvalidInput(format!(
                    "Σ must be diagonal, entry ({i}, {j}) is {}",
                    sigma[(i, j)]
                )));
            }
        }
    }
    Ok((0..n).map(|i| sigma[(i, i)]).collect())
}

/// Promote a real matrix to complex.
pub fn to_complex(x: &Mat<f64>) -> Mat<C64> {
    Mat::from_fn(x.nrows(), x.ncols(), |i, j| C64::new(x[(i, j)], 0.0))
}

/// Pack a vector into an n × 1 matrix.
pub fn column(v: &[C64]) -> Mat<C64> {
    Mat::from_fn(v.len(), 1, |i, _| v[i])
}

/// Enforce exact Hermitian symmetry: (A + Aᴴ)/2 with a real diagonal.
pub fn symmetrize_hermitian(a: &Mat<C64>) -> Mat<C64> {
    let n = a.nrows();
    debug_assert_eq!(n, a.ncols(), "matrix must be square");

    let mut h = a.clone();
    for i in 0..n {
        h[(i, i)] = C64::new(a[(i, i)].re, 0.0);
        for j in (i + 1)..n {
            let avg = (a[(i, j)] + a[(j, i)].conj()) * 0.5;
            h[(i, j)] = avg;
            h[(j, i)] = avg.conj();
        }
    }
    h
}

/// Euclidean norm of a complex vector.
pub fn norm2(v: &[C64]) -> f64 {
    v.iter().map(|z| z.norm_sqr()).sum::<f64>().sqrt()
}

/// Whether every entry is finite.
pub fn all_finite(v: &[C64]) -> bool {
    v.iter().all(|z| z.re.is_finite() && z.im.is_finite())
}

/// Frobenius norm of a real matrix.
pub fn frobenius(x: &Mat<f64>) -> f64 {
    let mut sum_sq = 0.0;
    for j in 0..x.ncols() {
        for i in 0..x.nrows() {
            sum_sq += x[(i, j)] * x[(i, j)];
        }
    }
    sum_sq.sqrt()
}

/// Compute the Moore-Penrose pseudo-inverse via SVD.
pub fn pinv(a: &Mat<f64>, tol: Option<f64>) -> Result<Mat<f64>, SpdmdError> {
    let svd = a
        .svd()
        .map_err(|e| SpdmdError::SvdFailed(format!("{e:?}")))?;
    let u = svd.U();
    let s_col = svd.S().column_vector();
    let v = svd.V();

    let k = s_col.nrows();
    let max_sv = (0..k).map(|i| s_col[i].abs()).fold(0.0_f64, f64::max);
    let tol = tol.unwrap_or_else(|| {
        let max_dim = a.nrows().max(a.ncols()) as f64;
        max_sv * max_dim * f64::EPSILON
    });

    // pinv(A) = V S⁻¹ Uᵀ over the retained singular triplets
    let (m, n) = (a.nrows(), a.ncols());
    let mut result = Mat::<f64>::zeros(n, m);
    for idx in 0..k {
        let si = s_col[idx];
        if si.abs() <= tol {
            continue;
        }
        let si_inv = 1.0 / si;
        for i in 0..m {
            let ui = u[(i, idx)] * si_inv;
            for j in 0..n {
                result[(j, i)] += v[(j, idx)] * ui;
            }
        }
    }

    Ok(result)
}

/// Real embedding `[[Re A, −Im A], [Im A, Re A]]` of a complex matrix.
///
/// The embedding commutes with products and pseudo-inverses, so complex
/// least-squares problems can be solved with real decompositions.
pub fn real_embedding(a: &Mat<C64>) -> Mat<f64> {
    let (m, n) = (a.nrows(), a.ncols());
    Mat::from_fn(2 * m, 2 * n, |i, j| {
        let z = a[(i % m, j % n)];
        match (i < m, j < n) {
            (true, true) | (false, false) => z.re,
            (true, false) => -z.im,
            (false, true) => z.im,
        }
    })
}

/// Minimum-norm least-squares solution of `A x = b` for complex `A`.
pub fn complex_pinv_solve(a: &Mat<C64>, b: &Mat<C64>) -> Result<Mat<C64>, SpdmdError> {
    let (m, n) = (a.nrows(), a.ncols());
    let a_inv = pinv(&real_embedding(a), None)?;
    let b_real = Mat::from_fn(2 * m, b.ncols(), |i, j| {
        if i < m {
            b[(i, j)].re
        } else {
            b[(i - m, j)].im
        }
    });
    let x_real = &a_inv * &b_real;
    Ok(Mat::from_fn(n, b.ncols(), |i, j| {
        C64::new(x_real[(i, j)], x_real[(i + n, j)])
    }))
}
