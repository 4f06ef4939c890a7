use std::time::Duration;

use faer::Mat;

/// Complex number type used for eigenvalues, modes and amplitudes.
pub type C64 = faer::c64;

/// Error types for sparse DMD operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SpdmdError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("past block is {past:?} but future block is {future:?}")]
    DimensionMismatch {
        past: (usize, usize),
        future: (usize, usize),
    },

    #[error("snapshot matrix is numerically zero (truncated rank 0)")]
    DegenerateRank,

    #[error("quadratic form is not positive definite: {0}")]
    IllConditionedForm(String),

    #[error("ADMM produced non-finite values at gamma = {gamma} (iteration {iteration})")]
    SolverDiverged { gamma: f64, iteration: usize },

    #[error("gamma grid is empty")]
    EmptyGrid,

    #[error("SVD computation failed: {0}")]
    SvdFailed(String),

    #[error("eigendecomposition failed: {0}")]
    EigenFailed(String),
}

/// Configuration for the SVD-based reduction.
#[derive(Debug, Clone)]
pub struct ReductionConfig {
    /// Optional cap on the truncation rank.
    pub rank: Option<usize>,
    /// Singular values below `rel_tol * sigma_max` are discarded.
    pub rel_tol: f64,
}

impl Default for ReductionConfig {
    fn default() -> Self {
        Self {
            rank: None,
            rel_tol: 1e-10,
        }
    }
}

/// Configuration for the ADMM solver.
#[derive(Debug, Clone)]
pub struct AdmmConfig {
    /// Augmented Lagrangian parameter.
    pub rho: f64,
    /// Maximum number of ADMM iterations per gamma.
    pub max_iter: usize,
    /// Absolute tolerance on the primal and dual residuals.
    pub eps_abs: f64,
    /// Relative tolerance on the primal and dual residuals.
    pub eps_rel: f64,
    /// Magnitudes at or below this value are outside the support.
    pub zero_tol: f64,
    /// Optional wall-clock budget per gamma.
    pub time_limit: Option<Duration>,
}

impl Default for AdmmConfig {
    fn default() -> Self {
        Self {
            rho: 1.0,
            max_iter: 10_000,
            eps_abs: 1e-6,
            eps_rel: 1e-4,
            zero_tol: 1e-12,
            time_limit: None,
        }
    }
}

/// Configuration for a sweep over the regularization grid.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub admm: AdmmConfig,
    /// Solve grid points on the rayon thread pool.
    pub parallel: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            admm: AdmmConfig::default(),
            parallel: true,
        }
    }
}

/// Top-level configuration for [`crate::run_sparse_dmd`].
#[derive(Debug, Clone, Default)]
pub struct SparseDmdConfig {
    pub reduction: ReductionConfig,
    pub sweep: SweepConfig,
}

/// Linear solver path taken for a Hermitian system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Factorization {
    Cholesky,
    Lu,
    PseudoInverse,
}

impl std::fmt::Display for Factorization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Factorization::Cholesky => write!(f, "cholesky"),
            Factorization::Lu => write!(f, "lu"),
            Factorization::PseudoInverse => write!(f, "pseudo-inverse"),
        }
    }
}

/// Standard DMD reduction of a snapshot sequence.
///
/// With `X0 = U Σ Vᵀ` the truncated SVD of the past block, the reduced
/// operator is `Fdmd = Uᵀ X1 V Σ⁻¹` and the modes are `Φ = U Ydmd`, so that
/// `X0 ≈ Φ diag(x) Vand` for an amplitude vector `x`.
#[derive(Debug, Clone)]
pub struct Reduction {
    /// POD basis U (m × r). `None` when built from precomputed projections.
    pub basis: Option<Mat<f64>>,
    /// Singular values Σ (r).
    pub singular_values: Vec<f64>,
    /// Right singular vectors V (N × r).
    pub right_vectors: Mat<f64>,
    /// Projected past block Uᵀ X0 = Σ Vᵀ (r × N).
    pub projected_past: Mat<f64>,
    /// Projected future block Uᵀ X1 (r × N).
    pub projected_future: Mat<f64>,
    /// Reduced operator Fdmd (r × r).
    pub reduced_operator: Mat<f64>,
    /// Eigenvalues of the reduced operator, Edmd (r).
    pub eigenvalues: Vec<C64>,
    /// Eigenvectors of the reduced operator, Ydmd (r × r), columns.
    pub eigenvectors: Mat<C64>,
    /// Full-state DMD modes Φ = U Ydmd (m × r).
    pub modes: Option<Mat<C64>>,
    /// Truncation rank r.
    pub rank: usize,
    /// Number of snapshot pairs N.
    pub n_time: usize,
}

impl Reduction {
    /// State dimension m, if the full-state basis is known.
    pub fn n_vars(&self) -> Option<usize> {
        self.basis.as_ref().map(|u| u.nrows())
    }
}

/// Quadratic form `J(x) = xᴴPx − qᴴx − xᴴq + s` of the amplitude problem.
#[derive(Debug, Clone)]
pub struct QuadraticForm {
    /// Hermitian positive semidefinite matrix P (r × r).
    pub p: Mat<C64>,
    /// Linear term q (r).
    pub q: Vec<C64>,
    /// Constant term s = ‖Uᵀ X0‖²_F.
    pub s: f64,
}

/// The unconstrained (gamma = 0) amplitude solution.
#[derive(Debug, Clone)]
pub struct Unconstrained {
    /// x* = P⁻¹ q.
    pub amplitudes: Vec<C64>,
    /// J(x*).
    pub objective: f64,
    pub factorization: Factorization,
}

/// Outcome of the sparse amplitude problem at a single gamma.
#[derive(Debug, Clone)]
pub struct GammaResult {
    pub gamma: f64,
    /// ADMM sparse iterate z.
    pub sparse: Vec<C64>,
    /// Indices of the nonzero amplitudes.
    pub support: Vec<usize>,
    /// Amplitudes re-optimized on the support, zero elsewhere.
    pub polished: Vec<C64>,
    pub nonzero_count: usize,
    /// (J(x_polished) − J(x*)) / J(x*).
    pub performance_loss: f64,
    /// 100 · sqrt(J(x_polished) / s).
    pub percent_loss: f64,
    /// J(x_sparse).
    pub j_sparse: f64,
    /// J(x_polished).
    pub j_polished: f64,
    pub iterations: usize,
    pub converged: bool,
    /// Solver path used for polishing.
    pub factorization: Factorization,
}

/// Per-gamma entry of a sweep. Failures are recorded, not propagated.
pub type GammaOutcome = Result<GammaResult, SpdmdError>;

/// Reconstruction products for one amplitude vector.
#[derive(Debug, Clone)]
pub struct Reconstruction {
    /// Amplitudes used.
    pub amplitudes: Vec<C64>,
    /// diag(x) Vand (r × N).
    pub amplitude_history: Mat<C64>,
    /// Ydmd diag(x) Vand ≈ Uᵀ X0 (r × N).
    pub reduced: Mat<C64>,
    /// Φ diag(x) (m × r), if the basis is known.
    pub scaled_modes: Option<Mat<C64>>,
    /// Re(Φ diag(x) Vand) ≈ X0 (m × N), if the basis is known.
    pub full_state: Option<Mat<f64>>,
}

/// Unconstrained DMD products: Fdmd, Edmd, Ydmd, xdmd.
#[derive(Debug, Clone)]
pub struct DmdProducts {
    pub fdmd: Mat<f64>,
    pub edmd: Vec<C64>,
    pub ydmd: Mat<C64>,
    pub xdmd: Vec<C64>,
    pub reconstruction: Reconstruction,
}

/// Information about a single DMD mode.
#[derive(Debug, Clone)]
pub struct ModeInfo {
    /// Mode index.
    pub index: usize,
    /// Complex eigenvalue.
    pub eigenvalue: C64,
    /// Eigenvalue magnitude |μ|.
    pub magnitude: f64,
    /// Oscillation frequency (cycles per dt).
    pub frequency: f64,
    /// Growth rate (log|μ|/dt).
    pub growth_rate: f64,
    /// Mode amplitude |x|.
    pub amplitude: f64,
}

/// Result of a sparsity-promoting sweep over the regularization grid.
#[derive(Debug, Clone)]
pub struct SweepResult {
    /// Unconstrained products Fdmd, Edmd, Ydmd, xdmd.
    pub products: DmdProducts,
    /// One entry per grid point, in grid order.
    pub entries: Vec<GammaOutcome>,
    /// The reduction the sweep was run on.
    pub reduction: Reduction,
    /// Quadratic form (P, q, s).
    pub form: QuadraticForm,
    /// Vandermonde matrix of the eigenvalues (r × N).
    pub vandermonde: Mat<C64>,
}

/// One point of the sparsity/fidelity trade-off curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeoffPoint {
    pub gamma: f64,
    pub nonzero_count: usize,
    pub performance_loss: f64,
    pub percent_loss: f64,
}
