use faer::Mat;

use crate::types::{ModeInfo, Reconstruction, Reduction, SpdmdError, C64};
use crate::utils::frobenius;

/// Amplitude history `diag(x) Vand`: row i is the time series xᵢ μᵢᵏ.
pub fn amplitude_history(vand: &Mat<C64>, amplitudes: &[C64]) -> Mat<C64> {
    Mat::from_fn(vand.nrows(), vand.ncols(), |i, k| amplitudes[i] * vand[(i, k)])
}

/// Reconstruction products of a reduction for one amplitude vector.
///
/// X0[:, k] ≈ Σᵢ φᵢ · xᵢ · μᵢᵏ
pub fn reconstruct(
    reduction: &Reduction,
    vand: &Mat<C64>,
    amplitudes: &[C64],
) -> Result<Reconstruction, SpdmdError> {
    if amplitudes.len() != reduction.rank {
        return Err(SpdmdError::InvalidInput(format!(
            "expected {} amplitudes, got {}",
            reduction.rank,
            amplitudes.len()
        )));
    }
    if vand.nrows() != reduction.rank {
        return Err(SpdmdError::InvalidInput(format!(
            "Vandermonde matrix has {} rows, rank is {}",
            vand.nrows(),
            reduction.rank
        )));
    }

    let history = amplitude_history(vand, amplitudes);
    let reduced = &reduction.eigenvectors * &history;

    let (scaled_modes, full_state) = match &reduction.modes {
        Some(modes) => {
            let scaled = Mat::from_fn(modes.nrows(), modes.ncols(), |i, j| {
                modes[(i, j)] * amplitudes[j]
            });
            let full = modes * &history;
            let real = Mat::from_fn(full.nrows(), full.ncols(), |i, k| full[(i, k)].re);
            (Some(scaled), Some(real))
        }
        None => (None, None),
    };

    Ok(Reconstruction {
        amplitudes: amplitudes.to_vec(),
        amplitude_history: history,
        reduced,
        scaled_modes,
        full_state,
    })
}

/// Relative Frobenius error ‖X − X̂‖ / ‖X‖.
pub fn relative_error(original: &Mat<f64>, approx: &Mat<f64>) -> Result<f64, SpdmdError> {
    if original.nrows() != approx.nrows() || original.ncols() != approx.ncols() {
        return Err(SpdmdError::InvalidInput(format!(
            "shape mismatch: {}x{} vs {}x{}",
            original.nrows(),
            original.ncols(),
            approx.nrows(),
            approx.ncols()
        )));
    }
    let diff = original - approx;
    let norm = frobenius(original);
    if norm == 0.0 {
        return Ok(frobenius(&diff));
    }
    Ok(frobenius(&diff) / norm)
}

/// Per-mode spectral summary, sorted by descending amplitude.
///
/// Modes with zero amplitude are left out, so for a polished sparse
/// solution only the surviving modes are reported.
pub fn mode_spectrum(eigenvalues: &[C64], amplitudes: &[C64], dt: f64) -> Vec<ModeInfo> {
    let mut info: Vec<ModeInfo> = eigenvalues
        .iter()
        .zip(amplitudes)
        .enumerate()
        .filter(|(_, (_, x))| x.norm() > 0.0)
        .map(|(index, (&mu, x))| {
            let magnitude = mu.norm();
            ModeInfo {
                index,
                eigenvalue: mu,
                magnitude,
                frequency: mu.arg().abs() / (2.0 * std::f64::consts::PI * dt),
                growth_rate: magnitude.ln() / dt,
                amplitude: x.norm(),
            }
        })
        .collect();
    info.sort_by(|a, b| b.amplitude.total_cmp(&a.amplitude));
    info
}
