use faer::Mat;
use rayon::prelude::*;

use crate::admm::AdmmWorkspace;
use crate::quadratic::{build_quadratic_form_with, vandermonde};
use crate::reconstruct::reconstruct;
use crate::reduction::reduce_snapshots;
use crate::types::{
    DmdProducts, GammaOutcome, GammaResult, QuadraticForm, Reconstruction, Reduction,
    SparseDmdConfig, SpdmdError, SweepConfig, SweepResult, TradeoffPoint,
};

/// `n` logarithmically spaced points from `lo` to `hi` inclusive.
pub fn logspace(lo: f64, hi: f64, n: usize) -> Result<Vec<f64>, SpdmdError> {
    if !(lo > 0.0 && hi > 0.0) || !lo.is_finite() || !hi.is_finite() {
        return Err(SpdmdError::InvalidInput(format!(
            "logspace bounds must be positive and finite, got [{lo}, {hi}]"
        )));
    }
    if n < 2 {
        return Ok(vec![lo; n]);
    }
    let (a, b) = (lo.log10(), hi.log10());
    let step = (b - a) / (n - 1) as f64;
    let mut grid: Vec<f64> = (0..n).map(|i| 10f64.powf(a + step * i as f64)).collect();
    grid[0] = lo;
    grid[n - 1] = hi;
    Ok(grid)
}

/// Check that a gamma grid is nonempty, finite, nonnegative and strictly ascending.
pub fn validate_grid(gammas: &[f64]) -> Result<(), SpdmdError> {
    if gammas.is_empty() {
        return Err(SpdmdError::EmptyGrid);
    }
    if let Some(g) = gammas.iter().find(|g| !(**g >= 0.0) || !g.is_finite()) {
        return Err(SpdmdError::InvalidInput(format!(
            "gamma values must be nonnegative and finite, got {g}"
        )));
    }
    if gammas.windows(2).any(|w| w[1] <= w[0]) {
        return Err(SpdmdError::InvalidInput(
            "gamma grid must be strictly ascending".into(),
        ));
    }
    Ok(())
}

/// Solve the sparse amplitude problem at every grid point.
///
/// Each gamma is independent; a failure at one grid point is recorded in
/// its entry and does not abort the sweep. The output order matches
/// `gammas` regardless of `config.parallel`.
pub fn sweep(
    form: &QuadraticForm,
    gammas: &[f64],
    config: &SweepConfig,
) -> Result<Vec<GammaOutcome>, SpdmdError> {
    validate_grid(gammas)?;
    let workspace = AdmmWorkspace::new(form, &config.admm)?;
    Ok(sweep_with(&workspace, gammas, config.parallel))
}

fn sweep_with(workspace: &AdmmWorkspace<'_>, gammas: &[f64], parallel: bool) -> Vec<GammaOutcome> {
    tracing::info!(points = gammas.len(), parallel, "starting gamma sweep");

    let entries: Vec<GammaOutcome> = if parallel {
        gammas.par_iter().map(|&g| workspace.solve(g)).collect()
    } else {
        gammas.iter().map(|&g| workspace.solve(g)).collect()
    };

    let failed = entries.iter().filter(|e| e.is_err()).count();
    for (gamma, err) in gammas
        .iter()
        .zip(&entries)
        .filter_map(|(g, e)| e.as_ref().err().map(|err| (g, err)))
    {
        tracing::warn!(gamma = *gamma, error = %err, "sparse solve failed");
    }
    tracing::info!(points = gammas.len(), failed, "gamma sweep finished");
    entries
}

/// Run the full sparsity-promoting DMD pipeline on a snapshot matrix.
///
/// # Arguments
/// * `snapshots` - Snapshot matrix (m variables × n snapshots).
/// * `gammas` - Strictly ascending, nonnegative regularization weights.
/// * `config` - Reduction and ADMM settings.
///
/// Reduction failures are returned as errors; per-gamma failures are
/// recorded in [`SweepResult::entries`].
pub fn run_sparse_dmd(
    snapshots: &Mat<f64>,
    gammas: &[f64],
    config: &SparseDmdConfig,
) -> Result<SweepResult, SpdmdError> {
    validate_grid(gammas)?;
    let reduction = reduce_snapshots(snapshots, &config.reduction)?;
    run_sparse_dmd_on(&reduction, gammas, config)
}

/// Run the sweep on an existing reduction, e.g. one built with
/// [`Reduction::from_projection`].
pub fn run_sparse_dmd_on(
    reduction: &Reduction,
    gammas: &[f64],
    config: &SparseDmdConfig,
) -> Result<SweepResult, SpdmdError> {
    validate_grid(gammas)?;

    let vand = vandermonde(&reduction.eigenvalues, reduction.n_time);
    let form = build_quadratic_form_with(reduction, &vand);

    let (entries, xdmd) = {
        let workspace = AdmmWorkspace::new(&form, &config.sweep.admm)?;
        let entries = sweep_with(&workspace, gammas, config.sweep.parallel);
        (entries, workspace.unconstrained().amplitudes.clone())
    };

    let reconstruction = reconstruct(reduction, &vand, &xdmd)?;
    let products = DmdProducts {
        fdmd: reduction.reduced_operator.clone(),
        edmd: reduction.eigenvalues.clone(),
        ydmd: reduction.eigenvectors.clone(),
        xdmd,
        reconstruction,
    };

    Ok(SweepResult {
        products,
        entries,
        reduction: reduction.clone(),
        form,
        vandermonde: vand,
    })
}

impl SweepResult {
    /// Successful per-gamma results, in grid order.
    pub fn results(&self) -> impl Iterator<Item = &GammaResult> {
        self.entries.iter().filter_map(|e| e.as_ref().ok())
    }

    /// Points of the sparsity/fidelity trade-off curve.
    pub fn tradeoff(&self) -> Vec<TradeoffPoint> {
        self.results()
            .map(|r| TradeoffPoint {
                gamma: r.gamma,
                nonzero_count: r.nonzero_count,
                performance_loss: r.performance_loss,
                percent_loss: r.percent_loss,
            })
            .collect()
    }

    /// Reconstruction products for the polished amplitudes of entry `index`.
    pub fn select(&self, index: usize) -> Result<Reconstruction, SpdmdError> {
        match self.entries.get(index) {
            Some(Ok(result)) => reconstruct(&self.reduction, &self.vandermonde, &result.polished),
            Some(Err(e)) => Err(e.clone()),
            None => Err(SpdmdError::InvalidInput(format!(
                "entry {index} out of range ({} entries)",
                self.entries.len()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::C64;

    fn assert_near(a: f64, b: f64, eps: f64) {
        assert!(
            (a - b).abs() < eps,
            "expected {a} ≈ {b} (diff = {})",
            (a - b).abs()
        );
    }

    fn diag_form(p: &[f64], q: &[C64], s: f64) -> QuadraticForm {
        let n = p.len();
        let pm = Mat::from_fn(n, n, |i, j| {
            if i == j {
                C64::new(p[i], 0.0)
            } else {
                C64::new(0.0, 0.0)
            }
        });
        QuadraticForm {
            p: pm,
            q: q.to_vec(),
            s,
        }
    }

    #[test]
    fn test_logspace_endpoints() {
        let g = logspace(0.15, 160.0, 20).unwrap();
        assert_eq!(g.len(), 20);
        assert_eq!(g[0], 0.15);
        assert_eq!(g[19], 160.0);
        assert!(g.windows(2).all(|w| w[1] > w[0]));
        let ratio = g[1] / g[0];
        assert_near(g[10] / g[9], ratio, 1e-12);
    }

    #[test]
    fn test_logspace_rejects_nonpositive() {
        assert!(logspace(0.0, 1.0, 5).is_err());
        assert_eq!(logspace(2.0, 3.0, 1).unwrap(), vec![2.0]);
    }

    #[test]
    fn test_validate_grid() {
        assert_eq!(validate_grid(&[]).unwrap_err(), SpdmdError::EmptyGrid);
        assert!(validate_grid(&[0.0, 1.0, 2.0]).is_ok());
        assert!(validate_grid(&[1.0, 1.0]).is_err());
        assert!(validate_grid(&[-1.0, 1.0]).is_err());
        assert!(validate_grid(&[0.5, f64::NAN]).is_err());
    }

    #[test]
    fn test_sweep_empty_grid() {
        let form = diag_form(&[1.0], &[C64::new(1.0, 0.0)], 2.0);
        let err = sweep(&form, &[], &SweepConfig::default()).unwrap_err();
        assert_eq!(err, SpdmdError::EmptyGrid);
    }

    #[test]
    fn test_sweep_rejects_mismatched_form() {
        let form = QuadraticForm {
            p: Mat::<C64>::identity(3, 3),
            q: vec![C64::new(1.0, 0.0); 2],
            s: 1.0,
        };
        let err = sweep(&form, &[0.1], &SweepConfig::default()).unwrap_err();
        assert!(matches!(err, SpdmdError::InvalidInput(_)));

        let mut nan_p = diag_form(&[1.0, 1.0], &[C64::new(1.0, 0.0); 2], 3.0);
        nan_p.p[(1, 1)] = C64::new(f64::NAN, 0.0);
        let err = sweep(&nan_p, &[0.1, 1.0], &SweepConfig::default()).unwrap_err();
        assert!(matches!(err, SpdmdError::InvalidInput(_)));
    }

    #[test]
    fn test_sweep_parallel_matches_sequential() {
        let form = diag_form(
            &[1.0, 2.0, 0.5],
            &[C64::new(2.0, 1.0), C64::new(0.0, -1.5), C64::new(0.3, 0.0)],
            12.0,
        );
        let gammas = logspace(0.1, 10.0, 8).unwrap();
        let par = sweep(&form, &gammas, &SweepConfig::default()).unwrap();
        let seq = sweep(
            &form,
            &gammas,
            &SweepConfig {
                parallel: false,
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(par.len(), gammas.len());
        for ((p, s), &g) in par.iter().zip(&seq).zip(&gammas) {
            let (p, s) = (p.as_ref().unwrap(), s.as_ref().unwrap());
            assert_eq!(p.gamma, g);
            assert_eq!(p.support, s.support);
            assert_eq!(p.polished, s.polished);
            assert_eq!(p.iterations, s.iterations);
        }
    }

    #[test]
    fn test_sweep_monotone_tradeoff() {
        let form = diag_form(
            &[1.0, 1.0, 2.0, 0.5],
            &[
                C64::new(5.0, 0.0),
                C64::new(0.0, 2.2),
                C64::new(-0.9, 0.0),
                C64::new(0.25, 0.25),
            ],
            40.0,
        );
        let gammas = logspace(0.15, 160.0, 20).unwrap();
        let entries = sweep(&form, &gammas, &SweepConfig::default()).unwrap();
        let results: Vec<&GammaResult> = entries.iter().map(|e| e.as_ref().unwrap()).collect();

        for w in results.windows(2) {
            assert!(w[1].nonzero_count <= w[0].nonzero_count);
            assert!(w[1].performance_loss >= w[0].performance_loss);
        }
        assert_eq!(results[0].nonzero_count, 4);
        assert_eq!(results[19].nonzero_count, 0);
    }
}
