//! Peak search on the fused spatial spectrum.
use itertools::Itertools;
use ndarray::{s, Array2, ArrayView2, Zip};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::geometry::DirectionGrid;
use crate::utils::{min, sort_i_dec};
use crate::{Direction, F};

/// A located source.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Estimate {
    pub direction: Direction,
    /// Peak value above the spectrum minimum.
    pub strength: F,
}

/// Calculate the distance in degrees between two directions using curvilinear
/// abscissa
///
/// ref. : <http://geodesie.ign.fr/contenu/fichiers/Distance_longitude_latitude.pdf>
#[must_use]
pub fn angular_distance(a: impl Into<Direction>, b: impl Into<Direction>) -> F {
    let a = a.into();
    let b = b.into();
    let (el_a, el_b) = (a.elevation.to_radians(), b.elevation.to_radians());
    (el_a.sin() * el_b.sin()
        + el_a.cos() * el_b.cos() * (b.azimuth - a.azimuth).to_radians().cos())
    .clamp(-1., 1.)
    .acos()
    .to_degrees()
}

/// Marks every cell that is not smaller than any of its 8 neighbours.
///
/// Cells outside of the spectrum count as `-inf`, so plateaus are made up
/// entirely of maxima.
#[must_use]
pub fn local_maxima(spec: ArrayView2<F>) -> Array2<bool> {
    let (rows, cols) = spec.dim();
    let mut padded = Array2::from_elem((rows + 2, cols + 2), F::NEG_INFINITY);
    padded.slice_mut(s![1isize..-1, 1isize..-1]).assign(&spec);

    let mut peaks = Array2::from_elem(spec.dim(), true);
    for (dr, dc) in (0..3).cartesian_product(0..3) {
        if (dr, dc) == (1, 1) {
            continue;
        }
        let neighbour = padded.slice(s![dr..dr + rows, dc..dc + cols]);
        Zip::from(&mut peaks)
            .and(&spec)
            .and(&neighbour)
            .for_each(|peak, &value, &neighbour| *peak &= value >= neighbour);
    }
    peaks
}

/// Searches up to `nsrc` peaks of an `elevation x azimuth` spectrum that are at
/// least `min_angle` degrees apart.
///
/// The global maximum is always the first source. Remaining local maxima are
/// visited by descending value and accepted when they keep `min_angle` to all
/// sources found so far. Fewer than `nsrc` estimates are returned when the
/// local maxima run out.
///
/// # Panics
/// If `spec` is not `grid.n_elevation() x grid.n_azimuth()`, use
/// [`Localizer::find_sources`](crate::Localizer::find_sources) for a checked
/// search.
#[must_use]
pub fn find_peaks(
    spec: ArrayView2<F>,
    grid: &DirectionGrid,
    nsrc: usize,
    min_angle: F,
) -> Vec<Estimate> {
    assert_eq!(
        spec.dim(),
        (grid.n_elevation(), grid.n_azimuth()),
        "spectrum must match the grid"
    );
    if nsrc == 0 {
        return Vec::new();
    }

    let peaks = local_maxima(spec);
    // substract min value : avoid issues (when sorting peaks) if some peaks values are negatives
    let floor = min(&spec);
    let shifted = spec.iter().map(|v| v - floor).collect_vec();

    let mut candidates = peaks
        .iter()
        .positions(|&peak| peak)
        .collect_vec();
    sort_i_dec(&shifted[..], &mut candidates);
    trace!(local_maxima = candidates.len(), "searching peaks");

    let mut sources: Vec<usize> = Vec::with_capacity(nsrc);
    for candidate in candidates {
        if sources.len() == nsrc {
            break;
        }
        let direction = grid.direction(candidate);
        if sources
            .iter()
            .all(|&source| angular_distance(grid.direction(source), direction) >= min_angle)
        {
            trace!(?direction, value = shifted[candidate], "accepted peak");
            sources.push(candidate);
        }
    }

    sources
        .into_iter()
        .map(|i| Estimate {
            direction: grid.direction(i),
            strength: shifted[i],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn plateau_and_border_maxima() {
        let spec = array![[1., 1., 0.], [0., 0., 0.], [0., 2., 0.]];
        let peaks = local_maxima(spec.view());
        assert_eq!(
            peaks,
            array![[true, true, false], [false, false, false], [false, true, false]]
        );
    }

    #[test]
    fn distance_along_equator_and_meridian() {
        assert!((angular_distance((0., 0.), (10., 0.)) - 10.).abs() < 1e-9);
        assert!((angular_distance((30., -5.), (30., 5.)) - 10.).abs() < 1e-9);
        assert!((angular_distance((-179., 0.), (180., 0.)) - 1.).abs() < 1e-9);
        assert!(angular_distance((12., 34.), (12., 34.)) < 1e-6);
        assert!((angular_distance((0., 90.), (123., 90.))).abs() < 1e-6);
    }
}
