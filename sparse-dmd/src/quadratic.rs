use faer::linalg::solvers::{Llt, PartialPivLu};
use faer::prelude::Solve;
use faer::{Mat, Side};

use crate::types::{Factorization, QuadraticForm, Reduction, SpdmdError, Unconstrained, C64};
use crate::utils::{all_finite, column, complex_pinv_solve, symmetrize_hermitian, to_complex};

/// Vandermonde matrix of the eigenvalues: `V[i, k] = μᵢᵏ`, k = 0..n_time.
pub fn vandermonde(eigenvalues: &[C64], n_time: usize) -> Mat<C64> {
    let r = eigenvalues.len();
    let mut vand = Mat::<C64>::zeros(r, n_time);
    for (i, &mu) in eigenvalues.iter().enumerate() {
        let mut power = C64::new(1.0, 0.0);
        for k in 0..n_time {
            vand[(i, k)] = power;
            power *= mu;
        }
    }
    vand
}

/// Assemble the amplitude quadratic form of a reduction.
///
/// With Y the eigenvectors, Vand the Vandermonde matrix and G = Uᵀ X0:
///
/// * `P = (Yᴴ Y) ∘ conj(Vand Vandᴴ)`
/// * `qᵢ = (Yᴴ G Vandᴴ)ᵢᵢ`
/// * `s = ‖G‖²_F`
///
/// so that `J(x) = ‖G − Y diag(x) Vand‖²_F`.
pub fn build_quadratic_form(reduction: &Reduction) -> QuadraticForm {
    let vand = vandermonde(&reduction.eigenvalues, reduction.n_time);
    build_quadratic_form_with(reduction, &vand)
}

pub(crate) fn build_quadratic_form_with(reduction: &Reduction, vand: &Mat<C64>) -> QuadraticForm {
    let r = reduction.rank;
    let y = &reduction.eigenvectors;

    let yhy = y.adjoint() * y;
    let vvh = vand.as_ref() * vand.adjoint();
    let p_raw = Mat::from_fn(r, r, |i, j| yhy[(i, j)] * vvh[(i, j)].conj());
    let p = symmetrize_hermitian(&p_raw);

    let g = to_complex(&reduction.projected_past);
    let yhg = y.adjoint() * &g;
    let q: Vec<C64> = (0..r)
        .map(|i| {
            let mut acc = C64::new(0.0, 0.0);
            for k in 0..vand.ncols() {
                acc += yhg[(i, k)] * vand[(i, k)].conj();
            }
            acc
        })
        .collect();

    let s = crate::utils::frobenius(&reduction.projected_past).powi(2);

    QuadraticForm { p, q, s }
}

impl QuadraticForm {
    /// Number of amplitudes.
    pub fn dim(&self) -> usize {
        self.q.len()
    }

    /// Check that P is square and matches q, and that every entry is finite.
    pub fn validate(&self) -> Result<(), SpdmdError> {
        let n = self.dim();
        if self.p.nrows() != n || self.p.ncols() != n {
            return Err(SpdmdError::InvalidInput(format!(
                "P is {}x{} but q has {n} entries",
                self.p.nrows(),
                self.p.ncols()
            )));
        }
        if n == 0 {
            return Err(SpdmdError::InvalidInput("quadratic form is empty".into()));
        }
        let p_finite = (0..n).all(|j| {
            (0..n).all(|i| {
                let z = self.p[(i, j)];
                z.re.is_finite() && z.im.is_finite()
            })
        });
        if !p_finite || !all_finite(&self.q) {
            return Err(SpdmdError::InvalidInput(
                "quadratic form contains NaN or Inf values".into(),
            ));
        }
        if !(self.s >= 0.0) || !self.s.is_finite() {
            return Err(SpdmdError::InvalidInput(format!(
                "s must be nonnegative and finite, got {}",
                self.s
            )));
        }
        Ok(())
    }

    /// Evaluate `J(x) = xᴴPx − 2 Re(qᴴx) + s`.
    pub fn objective(&self, x: &[C64]) -> Result<f64, SpdmdError> {
        let n = self.dim();
        if x.len() != n || self.p.nrows() != n || self.p.ncols() != n {
            return Err(SpdmdError::InvalidInput(format!(
                "expected {n} amplitudes for a {}x{} form, got {}",
                self.p.nrows(),
                self.p.ncols(),
                x.len()
            )));
        }
        let mut quad = 0.0;
        for i in 0..n {
            let mut px = C64::new(0.0, 0.0);
            for j in 0..n {
                px += self.p[(i, j)] * x[j];
            }
            quad += (x[i].conj() * px).re;
        }
        let lin: f64 = (0..n).map(|i| (self.q[i].conj() * x[i]).re).sum();
        Ok(quad - 2.0 * lin + self.s)
    }

    /// Cholesky factor of P.
    ///
    /// Fails with [`SpdmdError::IllConditionedForm`] when P is not numerically
    /// positive definite.
    pub fn cholesky(&self) -> Result<Llt<C64>, SpdmdError> {
        self.validate()?;
        self.p
            .as_ref()
            .llt(Side::Lower)
            .map_err(|e| SpdmdError::IllConditionedForm(format!("{e:?}")))
    }

    /// Solve `P x* = q` for the standard (non-sparse) DMD amplitudes.
    pub fn unconstrained(&self) -> Result<Unconstrained, SpdmdError> {
        self.validate()?;
        let solver = HermitianSolver::factor(&self.p)?;
        let amplitudes = solver.solve_vec(&self.q)?;
        let objective = self.objective(&amplitudes)?;
        Ok(Unconstrained {
            amplitudes,
            objective,
            factorization: solver.factorization(),
        })
    }
}

/// Factorization of a Hermitian system with graceful degradation.
///
/// Cholesky is tried first; if it fails the matrix is LU-factored, and if the
/// LU factors are singular the system is solved in the least-squares sense
/// through a pseudo-inverse.
pub(crate) enum HermitianSolver {
    Cholesky(Llt<C64>),
    Lu(PartialPivLu<C64>),
    PseudoInverse(Mat<C64>),
}

impl HermitianSolver {
    pub(crate) fn factor(a: &Mat<C64>) -> Result<Self, SpdmdError> {
        let n = a.nrows();
        match a.as_ref().llt(Side::Lower) {
            Ok(llt) => return Ok(Self::Cholesky(llt)),
            Err(e) => {
                tracing::warn!(dim = n, error = ?e, "Cholesky failed, falling back to LU");
            }
        }

        let lu = a.as_ref().partial_piv_lu();
        let inverse = lu.solve(&Mat::<C64>::identity(n, n));
        let finite = (0..n).all(|j| (0..n).all(|i| {
            let z = inverse[(i, j)];
            z.re.is_finite() && z.im.is_finite()
        }));
        if finite {
            return Ok(Self::Lu(lu));
        }

        tracing::warn!(dim = n, "LU factors are singular, using pseudo-inverse");
        let pinv = complex_pinv_solve(a, &Mat::<C64>::identity(n, n))?;
        Ok(Self::PseudoInverse(pinv))
    }

    pub(crate) fn factorization(&self) -> Factorization {
        match self {
            Self::Cholesky(_) => Factorization::Cholesky,
            Self::Lu(_) => Factorization::Lu,
            Self::PseudoInverse(_) => Factorization::PseudoInverse,
        }
    }

    pub(crate) fn solve(&self, rhs: &Mat<C64>) -> Mat<C64> {
        match self {
            Self::Cholesky(llt) => llt.solve(rhs),
            Self::Lu(lu) => lu.solve(rhs),
            Self::PseudoInverse(pinv) => pinv * rhs,
        }
    }

    pub(crate) fn solve_vec(&self, rhs: &[C64]) -> Result<Vec<C64>, SpdmdError> {
        let sol = self.solve(&column(rhs));
        let x: Vec<C64> = (0..sol.nrows()).map(|i| sol[(i, 0)]).collect();
        if !all_finite(&x) {
            return Err(SpdmdError::IllConditionedForm(format!(
                "{} solve produced non-finite values",
                self.factorization()
            )));
        }
        Ok(x)
    }
}
