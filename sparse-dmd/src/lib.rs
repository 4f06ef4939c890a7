//! # sparse-dmd
//!
//! Sparsity-promoting Dynamic Mode Decomposition.
//!
//! Standard DMD explains a snapshot sequence with one mode per retained
//! singular value. This library selects a small subset of those modes that
//! still reproduces the data well, trading fidelity for sparsity over a grid
//! of regularization weights γ:
//!
//! - **Reduction** ([`reduce_snapshots`], [`Reduction::from_projection`]):
//!   truncated SVD of the past block, reduced operator Fdmd and its eigenpairs
//! - **Quadratic form** ([`build_quadratic_form`], [`vandermonde`]): the
//!   amplitude least-squares problem as `J(x) = xᴴPx − 2Re(qᴴx) + s`
//! - **ADMM** ([`solve`], [`AdmmWorkspace`], [`soft_threshold`], [`polish`]):
//!   ℓ1-regularized amplitudes followed by re-optimization on the support
//! - **Sweep** ([`sweep()`], [`run_sparse_dmd`]): the full γ grid, in parallel
//!   via rayon, with per-point failures recorded rather than propagated
//! - **Reconstruction** ([`reconstruct`], [`mode_spectrum`]): reduced and
//!   full-state reconstructions for any amplitude vector
//!
//! ## Quick Start
//!
//! ```rust
//! use sparse_dmd::{logspace, run_sparse_dmd, SparseDmdConfig};
//!
//! let n = 120;
//! let mut data = faer::Mat::<f64>::zeros(4, n);
//! for j in 0..n {
//!     let t = j as f64;
//!     for i in 0..4 {
//!         let w = (i + 1) as f64;
//!         data[(i, j)] = (0.3 * t + w).sin() + 0.1 * w * (0.9 * t).cos();
//!     }
//! }
//!
//! let gammas = logspace(0.01, 100.0, 10).unwrap();
//! let result = run_sparse_dmd(&data, &gammas, &SparseDmdConfig::default()).unwrap();
//!
//! for point in result.tradeoff() {
//!     println!("γ = {:.3}: {} modes, {:.2}% loss", point.gamma, point.nonzero_count, point.percent_loss);
//! }
//! ```
//!
//! ## References
//!
//! - Jovanović, Schmid & Nichols (2014), *Phys. Fluids*, 26, 024103
//! - Schmid (2010), *J. Fluid Mech.*, 656, 5-28
//! - Boyd et al. (2011), *Found. Trends Mach. Learn.*, 3(1), 1-122

pub mod types;

pub mod admm;
pub mod quadratic;
pub mod reconstruct;
pub mod reduction;
pub mod sweep;
pub mod utils;

pub use admm::{polish, soft_threshold, solve, AdmmWorkspace};
pub use quadratic::{build_quadratic_form, vandermonde};
pub use reconstruct::{amplitude_history, mode_spectrum, reconstruct, relative_error};
pub use reduction::{reduce_blocks, reduce_snapshots};
pub use sweep::{logspace, run_sparse_dmd, run_sparse_dmd_on, sweep, validate_grid};
pub use types::*;
