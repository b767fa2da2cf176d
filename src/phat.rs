//! GCC-PHAT for a single microphone pair.
//!
//! C. Knapp, G. Carter, "The generalized cross-correlation method for
//! estimation of time delay", IEEE Transactions on Acoustics, Speech and
//! Signal Processing, 24(4):320-327, 1976.
use std::f64::consts::PI;

use ndarray::{Array1, Array2, ArrayView2, Zip};
use num::Zero;

use crate::{C, F};

/// Cross power spectrum `X1 * conj(X2)` normalised to unit magnitude.
///
/// Bins whose cross power has zero (or non finite) magnitude carry no phase
/// and are set to `0`, so they add nothing to any delay hypothesis.
#[must_use]
pub fn whiten(x1: ArrayView2<C>, x2: ArrayView2<C>) -> Array2<C> {
    let mut p = Array2::zeros(x1.raw_dim());
    Zip::from(&mut p)
        .and(&x1)
        .and(&x2)
        .for_each(|p, &x1, &x2| {
            let cross = x1 * x2.conj();
            let magnitude = cross.norm();
            *p = if magnitude > 0. && magnitude.is_finite() {
                cross / magnitude
            } else {
                C::zero()
            };
        });
    p
}

/// Computes the GCC-PHAT angular spectrum of one pair.
///
/// `x1` and `x2` are `bins x frames` STFT coefficients of both microphones,
/// `freqs` the center frequency of every bin in Hz and `tau_grid` the
/// candidate delays in seconds.
///
/// Returns `taus x frames`, already summed over all bins:
/// `sum_f real(P(f) * exp(-2i * pi * tau * f))`.
#[must_use]
pub fn phat_spectrum(
    x1: ArrayView2<C>,
    x2: ArrayView2<C>,
    freqs: &[F],
    tau_grid: &[F],
) -> Array2<F> {
    assert_eq!(x1.dim(), x2.dim(), "both channels need the same shape");
    assert_eq!(x1.nrows(), freqs.len(), "one frequency per bin");

    let p = whiten(x1, x2);
    let n_frames = p.ncols();

    let mut spec = Array2::zeros((tau_grid.len(), n_frames));
    for (mut row, &tau) in spec.rows_mut().into_iter().zip(tau_grid) {
        let steering: Array1<C> = freqs
            .iter()
            .map(|&f| C::from_polar(1., -2. * PI * tau * f))
            .collect();
        // real(P .* EXP) summed over bins, for every frame at once
        row.assign(&p.t().dot(&steering).mapv(|c| c.re));
    }
    spec
}
