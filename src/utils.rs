use std::ops::Index;

use crate::F;

/// Smallest value, `F::INFINITY` for an empty input.
pub fn min<'a>(iter: impl IntoIterator<Item = &'a F>) -> F {
    iter.into_iter().copied().fold(F::INFINITY, F::min)
}

/// Largest value, `F::NEG_INFINITY` for an empty input.
pub fn max<'a>(iter: impl IntoIterator<Item = &'a F>) -> F {
    iter.into_iter().copied().fold(F::NEG_INFINITY, F::max)
}

/// Sorts `indices` by descending value in `list`, equal values keep their
/// order.
pub fn sort_i_dec<I: Index<usize, Output = F> + ?Sized>(list: &I, indices: &mut [usize]) {
    indices.sort_by(|&a, &b| list[b].total_cmp(&list[a]));
}

/// Block RMS in dBFS, `-inf` for silence or an empty block.
pub fn rms_db<'a>(samples: impl IntoIterator<Item = &'a F>) -> F {
    let (sum, count) = samples
        .into_iter()
        .fold((0., 0usize), |(sum, count), &x| (sum + x * x, count + 1));
    if count == 0 {
        return F::NEG_INFINITY;
    }
    // Convert value to decibels
    20.0 * (sum / count as F).sqrt().log10()
}
