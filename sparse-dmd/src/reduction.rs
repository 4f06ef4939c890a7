use faer::Mat;

use crate::types::{Reduction, ReductionConfig, SpdmdError, C64};
use crate::utils::{truncation_rank, validate_matrix};

/// Reduce a snapshot sequence to its DMD operator, eigen-pairs and modes.
///
/// # Arguments
/// * `x` - Snapshot matrix (m variables × n snapshots), columns are time-ordered.
/// * `config` - Truncation settings.
///
/// # Algorithm
/// 1. Split X into X0 = X[:, 0..n-1] and X1 = X[:, 1..n]
/// 2. Economy SVD: X0 = U Σ Vᵀ, truncated at `rel_tol · σ_max`
/// 3. Reduced operator: Fdmd = Uᵀ X1 V Σ⁻¹
/// 4. Eigendecomposition: Fdmd Ydmd = Ydmd diag(μ)
/// 5. Modes: Φ = U Ydmd
pub fn reduce_snapshots(x: &Mat<f64>, config: &ReductionConfig) -> Result<Reduction, SpdmdError> {
    validate_matrix(x, 1, 2)?;
    let n = x.ncols();
    let past = x.subcols(0, n - 1).to_owned();
    let future = x.subcols(1, n - 1).to_owned();
    reduce_blocks(&past, &future, config)
}

/// Reduce explicit past/future snapshot blocks, column k of `future` being
/// the successor of column k of `past`.
pub fn reduce_blocks(
    past: &Mat<f64>,
    future: &Mat<f64>,
    config: &ReductionConfig,
) -> Result<Reduction, SpdmdError> {
    if past.nrows() != future.nrows() || past.ncols() != future.ncols() {
        return Err(SpdmdError::DimensionMismatch {
            past: (past.nrows(), past.ncols()),
            future: (future.nrows(), future.ncols()),
        });
    }
    validate_matrix(past, 1, 1)?;
    validate_matrix(future, 1, 1)?;

    let svd = past
        .thin_svd()
        .map_err(|e| SpdmdError::SvdFailed(format!("{e:?}")))?;
    let s_col = svd.S().column_vector();
    let s_vals: Vec<f64> = (0..s_col.nrows()).map(|i| s_col[i]).collect();

    let rank = truncation_rank(&s_vals, config.rank, config.rel_tol);
    if rank == 0 {
        return Err(SpdmdError::DegenerateRank);
    }
    tracing::debug!(
        rank,
        available = s_vals.len(),
        sigma_max = s_vals[0],
        "truncated snapshot SVD"
    );

    let u = svd.U().subcols(0, rank).to_owned();
    let v = svd.V().subcols(0, rank).to_owned();
    let s = s_vals[..rank].to_vec();

    let projected_future = u.transpose() * future;
    let mut reduction = build_reduction(projected_future, s, v)?;
    reduction.modes = Some(&crate::utils::to_complex(&u) * &reduction.eigenvectors);
    reduction.basis = Some(u);
    Ok(reduction)
}

impl Reduction {
    /// Build a reduction from precomputed projections.
    ///
    /// # Arguments
    /// * `projected_future` - Uᵀ X1 (r × N).
    /// * `singular_values` - Diagonal of Σ (r), all strictly positive.
    /// * `right_vectors` - V (N × r).
    ///
    /// The full-state basis is unknown, so `modes` and full-state
    /// reconstructions are unavailable.
    pub fn from_projection(
        projected_future: &Mat<f64>,
        singular_values: &[f64],
        right_vectors: &Mat<f64>,
    ) -> Result<Reduction, SpdmdError> {
        let r = singular_values.len();
        if r == 0 {
            return Err(SpdmdError::DegenerateRank);
        }
        validate_matrix(projected_future, 1, 1)?;
        validate_matrix(right_vectors, 1, 1)?;
        if projected_future.nrows() != r || right_vectors.ncols() != r {
            return Err(SpdmdError::InvalidInput(format!(
                "rank mismatch: Σ has {r} entries, UᵀX1 has {} rows, V has {} columns",
                projected_future.nrows(),
                right_vectors.ncols()
            )));
        }
        if right_vectors.nrows() != projected_future.ncols() {
            return Err(SpdmdError::DimensionMismatch {
                past: (r, right_vectors.nrows()),
                future: (projected_future.nrows(), projected_future.ncols()),
            });
        }
        if singular_values.iter().any(|&s| !(s > 0.0) || !s.is_finite()) {
            return Err(SpdmdError::InvalidInput(
                "singular values must be positive and finite".into(),
            ));
        }
        build_reduction(
            projected_future.clone(),
            singular_values.to_vec(),
            right_vectors.clone(),
        )
    }
}

fn build_reduction(
    projected_future: Mat<f64>,
    s: Vec<f64>,
    v: Mat<f64>,
) -> Result<Reduction, SpdmdError> {
    let rank = s.len();
    let n_time = v.nrows();

    // Fdmd = Uᵀ X1 V Σ⁻¹ (scale columns)
    let x1_v = &projected_future * &v;
    let mut fdmd = Mat::<f64>::zeros(rank, rank);
    for j in 0..rank {
        for i in 0..rank {
            fdmd[(i, j)] = x1_v[(i, j)] / s[j];
        }
    }

    let eigen = fdmd
        .as_ref()
        .eigen()
        .map_err(|e| SpdmdError::EigenFailed(format!("{e:?}")))?;
    let eig_diag = eigen.S().column_vector();
    let eig_vecs = eigen.U();

    let eigenvalues: Vec<C64> = (0..rank)
        .map(|j| C64::new(eig_diag[j].re, eig_diag[j].im))
        .collect();
    // faer leaves eigenvectors unscaled; the l1 penalty needs unit columns
    let mut eigenvectors =
        Mat::from_fn(rank, rank, |i, j| C64::new(eig_vecs[(i, j)].re, eig_vecs[(i, j)].im));
    for j in 0..rank {
        let norm = (0..rank)
            .map(|i| eigenvectors[(i, j)].norm_sqr())
            .sum::<f64>()
            .sqrt();
        if !(norm > 0.0) || !norm.is_finite() {
            return Err(SpdmdError::EigenFailed(format!(
                "eigenvector {j} has norm {norm}"
            )));
        }
        for i in 0..rank {
            eigenvectors[(i, j)] /= norm;
        }
    }

    // Uᵀ X0 = Σ Vᵀ
    let projected_past = Mat::from_fn(rank, n_time, |i, k| s[i] * v[(k, i)]);

    Ok(Reduction {
        basis: None,
        singular_values: s,
        right_vectors: v,
        projected_past,
        projected_future,
        reduced_operator: fdmd,
        eigenvalues,
        eigenvectors,
        modes: None,
        rank,
        n_time,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn assert_near(a: f64, b: f64, eps: f64) {
        assert!(
            (a - b).abs() < eps,
            "expected {a} ≈ {b} (diff = {})",
            (a - b).abs()
        );
    }

    /// Two sinusoids in quadrature: a single rotating pair of eigenvalues.
    fn make_rotation_data(n_time: usize, omega: f64) -> Mat<f64> {
        let mut x = Mat::<f64>::zeros(3, n_time);
        for t in 0..n_time {
            let theta = omega * t as f64;
            x[(0, t)] = theta.cos();
            x[(1, t)] = theta.sin();
            x[(2, t)] = 0.5 * theta.cos() - 0.25 * theta.sin();
        }
        x
    }

    #[test]
    fn test_reduce_rank_and_shapes() {
        let x = make_rotation_data(60, 2.0 * PI / 20.0);
        let red = reduce_snapshots(&x, &ReductionConfig::default()).unwrap();

        assert_eq!(red.rank, 2);
        assert_eq!(red.n_time, 59);
        assert_eq!(red.eigenvalues.len(), 2);
        assert_eq!(red.projected_past.nrows(), 2);
        assert_eq!(red.projected_past.ncols(), 59);
        assert_eq!(red.n_vars(), Some(3));
        let modes = red.modes.as_ref().unwrap();
        assert_eq!((modes.nrows(), modes.ncols()), (3, 2));
    }

    #[test]
    fn test_reduce_recovers_rotation_eigenvalues() {
        let omega = 2.0 * PI / 20.0;
        let x = make_rotation_data(60, omega);
        let red = reduce_snapshots(&x, &ReductionConfig::default()).unwrap();

        for mu in &red.eigenvalues {
            assert_near(mu.norm(), 1.0, 1e-8);
            assert_near(mu.arg().abs(), omega, 1e-8);
        }
    }

    #[test]
    fn test_reduce_operator_maps_past_to_future() {
        let x = make_rotation_data(40, 0.3);
        let red = reduce_snapshots(&x, &ReductionConfig::default()).unwrap();

        // Fdmd · UᵀX0 ≈ UᵀX1 for exactly linear dynamics
        let mapped = &red.reduced_operator * &red.projected_past;
        for k in 0..red.n_time {
            for i in 0..red.rank {
                assert_near(mapped[(i, k)], red.projected_future[(i, k)], 1e-9);
            }
        }
    }

    #[test]
    fn test_reduce_eigenvectors_have_unit_norm() {
        // Non-normal operator so the raw Schur back-substitution is unscaled
        let mut x = Mat::<f64>::zeros(3, 40);
        x[(0, 0)] = 1.0;
        x[(1, 0)] = -0.5;
        x[(2, 0)] = 2.0;
        for t in 1..40 {
            let (a, b, c) = (x[(0, t - 1)], x[(1, t - 1)], x[(2, t - 1)]);
            x[(0, t)] = 0.9 * a + 3.0 * b - 1.5 * c;
            x[(1, t)] = 0.7 * b + 2.0 * c;
            x[(2, t)] = 0.5 * c;
        }
        let red = reduce_snapshots(&x, &ReductionConfig::default()).unwrap();
        assert_eq!(red.rank, 3);

        for j in 0..red.rank {
            let norm: f64 = (0..red.rank)
                .map(|i| red.eigenvectors[(i, j)].norm_sqr())
                .sum::<f64>()
                .sqrt();
            assert_near(norm, 1.0, 1e-12);
        }
        // F y = μ y still holds after rescaling
        let f = crate::utils::to_complex(&red.reduced_operator);
        let fy = &f * &red.eigenvectors;
        for j in 0..red.rank {
            for i in 0..red.rank {
                let diff = fy[(i, j)] - red.eigenvectors[(i, j)] * red.eigenvalues[j];
                assert!(diff.norm() < 1e-8);
            }
        }
    }

    #[test]
    fn test_reduce_explicit_rank_cap() {
        let x = make_rotation_data(30, 0.4);
        let config = ReductionConfig {
            rank: Some(1),
            ..Default::default()
        };
        let red = reduce_snapshots(&x, &config).unwrap();
        assert_eq!(red.rank, 1);
    }

    #[test]
    fn test_reduce_zero_snapshots_is_degenerate() {
        let x = Mat::<f64>::zeros(4, 10);
        let err = reduce_snapshots(&x, &ReductionConfig::default()).unwrap_err();
        assert_eq!(err, SpdmdError::DegenerateRank);
    }

    #[test]
    fn test_reduce_blocks_shape_mismatch() {
        let past = Mat::<f64>::identity(3, 4);
        let future = Mat::<f64>::identity(3, 5);
        let err = reduce_blocks(&past, &future, &ReductionConfig::default()).unwrap_err();
        assert!(matches!(err, SpdmdError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_reduce_single_column_rejected() {
        let x = Mat::<f64>::zeros(3, 1);
        assert!(reduce_snapshots(&x, &ReductionConfig::default()).is_err());
    }

    #[test]
    fn test_from_projection_matches_snapshot_path() {
        let x = make_rotation_data(50, 0.25);
        let red = reduce_snapshots(&x, &ReductionConfig::default()).unwrap();
        let again = Reduction::from_projection(
            &red.projected_future,
            &red.singular_values,
            &red.right_vectors,
        )
        .unwrap();

        assert!(again.basis.is_none());
        assert!(again.modes.is_none());
        for i in 0..red.rank {
            for j in 0..red.rank {
                assert_near(again.reduced_operator[(i, j)], red.reduced_operator[(i, j)], 1e-14);
            }
        }
    }

    #[test]
    fn test_from_projection_rejects_bad_sigma() {
        let ux1 = Mat::<f64>::identity(2, 3);
        let v = Mat::<f64>::identity(3, 2);
        assert!(Reduction::from_projection(&ux1, &[1.0, 0.0], &v).is_err());
        assert!(Reduction::from_projection(&ux1, &[1.0], &v).is_err());
        assert_eq!(
            Reduction::from_projection(&ux1, &[], &v).unwrap_err(),
            SpdmdError::DegenerateRank
        );
    }
}
