//! Sparsity-promoting amplitude selection.
//!
//! For a fixed weight γ the problem
//!
//! ```text
//! minimize   J(x) + γ ‖x‖₁,     J(x) = xᴴPx − qᴴx − xᴴq + s
//! ```
//!
//! is solved with ADMM in scaled-dual form on the splitting x = z:
//!
//! ```text
//! x ← (P + ρ/2 I)⁻¹ (q + ρ/2 (z − λ))
//! z ← S_{γ/ρ}(x + λ)
//! λ ← λ + x − z
//! ```
//!
//! The sparsity pattern of z is then kept fixed and the amplitudes are
//! re-optimized on it ("polishing"), removing the shrinkage bias.
//!
//! Reference: Jovanović, Schmid & Nichols (2014), *Phys. Fluids* 26, 024103.

use std::time::Instant;

use faer::Mat;

use crate::quadratic::HermitianSolver;
use crate::types::{
    AdmmConfig, Factorization, GammaResult, QuadraticForm, SpdmdError, Unconstrained, C64,
};
use crate::utils::{all_finite, column, norm2};

/// Complex soft-thresholding, the proximal operator of `kappa · ‖·‖₁`.
///
/// Each entry keeps its phase and has its magnitude reduced by `kappa`;
/// entries with magnitude at or below `kappa` become exactly zero.
pub fn soft_threshold(v: &[C64], kappa: f64) -> Vec<C64> {
    v.iter()
        .map(|&vi| {
            let mag = vi.norm();
            if mag > kappa {
                vi * ((mag - kappa) / mag)
            } else {
                C64::new(0.0, 0.0)
            }
        })
        .collect()
}

/// Precomputed state shared by every gamma of a sweep.
///
/// The factorization of `P + ρ/2 I` depends only on ρ, so it is computed
/// once and reused read-only across (possibly parallel) solves.
pub struct AdmmWorkspace<'a> {
    form: &'a QuadraticForm,
    config: AdmmConfig,
    shifted: HermitianSolver,
    unconstrained: Unconstrained,
}

impl<'a> AdmmWorkspace<'a> {
    pub fn new(form: &'a QuadraticForm, config: &AdmmConfig) -> Result<Self, SpdmdError> {
        if !(config.rho > 0.0) || !config.rho.is_finite() {
            return Err(SpdmdError::InvalidInput(format!(
                "rho must be positive and finite, got {}",
                config.rho
            )));
        }
        if config.max_iter == 0 {
            return Err(SpdmdError::InvalidInput("max_iter must be positive".into()));
        }
        form.validate()?;

        let n = form.dim();
        let half_rho = 0.5 * config.rho;
        let mut shifted_p = form.p.clone();
        for i in 0..n {
            shifted_p[(i, i)] += C64::new(half_rho, 0.0);
        }
        let shifted = HermitianSolver::factor(&shifted_p)?;
        let unconstrained = form.unconstrained()?;
        tracing::debug!(
            dim = n,
            rho = config.rho,
            factorization = %shifted.factorization(),
            j_star = unconstrained.objective,
            "prepared ADMM workspace"
        );

        Ok(Self {
            form,
            config: config.clone(),
            shifted,
            unconstrained,
        })
    }

    /// The gamma = 0 solution used as the performance-loss reference.
    pub fn unconstrained(&self) -> &Unconstrained {
        &self.unconstrained
    }

    /// Solve the sparse amplitude problem for one gamma.
    pub fn solve(&self, gamma: f64) -> Result<GammaResult, SpdmdError> {
        if !(gamma >= 0.0) || !gamma.is_finite() {
            return Err(SpdmdError::InvalidInput(format!(
                "gamma must be nonnegative and finite, got {gamma}"
            )));
        }

        let form = self.form;
        let cfg = &self.config;
        let n = form.dim();
        let rho = cfg.rho;
        let half_rho = 0.5 * rho;
        let kappa = gamma / rho;
        let sqrt_n = (n as f64).sqrt();
        let started = Instant::now();

        let mut z = vec![C64::new(0.0, 0.0); n];
        let mut lambda = vec![C64::new(0.0, 0.0); n];
        let mut converged = false;
        let mut iterations = 0;

        for iter in 1..=cfg.max_iter {
            iterations = iter;

            // x-update
            let mut rhs = Mat::<C64>::zeros(n, 1);
            for i in 0..n {
                rhs[(i, 0)] = form.q[i] + (z[i] - lambda[i]) * half_rho;
            }
            let sol = self.shifted.solve(&rhs);
            let x: Vec<C64> = (0..n).map(|i| sol[(i, 0)]).collect();

            // z-update
            let v: Vec<C64> = (0..n).map(|i| x[i] + lambda[i]).collect();
            let z_new = soft_threshold(&v, kappa);

            // dual update
            for i in 0..n {
                lambda[i] += x[i] - z_new[i];
            }

            if !all_finite(&x) || !all_finite(&z_new) || !all_finite(&lambda) {
                return Err(SpdmdError::SolverDiverged {
                    gamma,
                    iteration: iter,
                });
            }

            let diff_xz: Vec<C64> = (0..n).map(|i| x[i] - z_new[i]).collect();
            let diff_z: Vec<C64> = (0..n).map(|i| z_new[i] - z[i]).collect();
            let res_prim = norm2(&diff_xz);
            let res_dual = rho * norm2(&diff_z);
            let eps_prim = sqrt_n * cfg.eps_abs + cfg.eps_rel * norm2(&x).max(norm2(&z_new));
            let eps_dual = sqrt_n * cfg.eps_abs + cfg.eps_rel * rho * norm2(&lambda);

            z = z_new;

            if res_prim < eps_prim && res_dual < eps_dual {
                converged = true;
                break;
            }
            if let Some(limit) = cfg.time_limit {
                if started.elapsed() >= limit {
                    tracing::warn!(gamma, iterations = iter, "ADMM stopped at time limit");
                    break;
                }
            }
        }

        if !converged {
            tracing::warn!(gamma, iterations, "ADMM did not converge");
        }

        let support: Vec<usize> = (0..n).filter(|&i| z[i].norm() > cfg.zero_tol).collect();
        let (polished, factorization) = polish(form, &support)?;

        let j_sparse = form.objective(&z)?;
        let j_polished = form.objective(&polished)?;
        let performance_loss = relative_loss(j_polished, self.unconstrained.objective, form.s);
        let percent_loss = if form.s > 0.0 {
            100.0 * (j_polished.max(0.0) / form.s).sqrt()
        } else {
            0.0
        };

        tracing::debug!(
            gamma,
            iterations,
            converged,
            nonzero = support.len(),
            performance_loss,
            "solved sparse amplitudes"
        );

        Ok(GammaResult {
            gamma,
            sparse: z,
            nonzero_count: support.len(),
            support,
            polished,
            performance_loss,
            percent_loss,
            j_sparse,
            j_polished,
            iterations,
            converged,
            factorization,
        })
    }
}

/// Solve the sparse amplitude problem for a single gamma.
pub fn solve(
    form: &QuadraticForm,
    gamma: f64,
    config: &AdmmConfig,
) -> Result<GammaResult, SpdmdError> {
    AdmmWorkspace::new(form, config)?.solve(gamma)
}

/// Minimize J with the amplitudes outside `support` fixed to zero.
///
/// The KKT system `[P Eᵀ; E 0] [x; ν] = [q; 0]`, E selecting the
/// off-support coordinates, reduces to `P_SS x_S = q_S` after eliminating
/// the constraint.
pub fn polish(
    form: &QuadraticForm,
    support: &[usize],
) -> Result<(Vec<C64>, Factorization), SpdmdError> {
    let n = form.dim();
    if let Some(&i) = support.iter().find(|&&i| i >= n) {
        return Err(SpdmdError::InvalidInput(format!(
            "support index {i} out of range for {n} amplitudes"
        )));
    }
    if support.windows(2).any(|w| w[1] <= w[0]) {
        return Err(SpdmdError::InvalidInput(
            "support indices must be strictly ascending".into(),
        ));
    }
    form.validate()?;

    let mut x = vec![C64::new(0.0, 0.0); n];
    if support.is_empty() {
        return Ok((x, Factorization::Cholesky));
    }

    let k = support.len();
    let p_ss = Mat::from_fn(k, k, |a, b| form.p[(support[a], support[b])]);
    let q_s: Vec<C64> = support.iter().map(|&i| form.q[i]).collect();

    let solver = HermitianSolver::factor(&p_ss)?;
    let sol = solver.solve(&column(&q_s));
    for (a, &i) in support.iter().enumerate() {
        x[i] = sol[(a, 0)];
    }
    if !all_finite(&x) {
        return Err(SpdmdError::IllConditionedForm(
            "polishing produced non-finite amplitudes".into(),
        ));
    }
    Ok((x, solver.factorization()))
}

/// Below this fraction of `s`, J* is rounding noise from the expanded form.
const LOSS_FLOOR: f64 = 1e-10;

/// `(J − J*) / J*`, measured against `s` when `J*` vanishes.
fn relative_loss(j: f64, j_star: f64, s: f64) -> f64 {
    let denom = if j_star > LOSS_FLOOR * s { j_star } else { s };
    if !(denom > 0.0) {
        return 0.0;
    }
    ((j - j_star) / denom).max(0.0)
}
