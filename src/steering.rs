//! Per microphone pair steering tables.
//!
//! For every pair the angle between its baseline and each grid direction is
//! computed once. Correlation is only evaluated on a coarse sampling of that
//! angle and interpolated back onto the fine grid afterwards.
use itertools::{Itertools, MinMaxResult};
use tracing::debug;

use crate::geometry::{DirectionGrid, MicArray, MicPair};
use crate::{Error, Position, Result, F};

/// Angles and delays for a single microphone pair, all angles in degrees.
#[derive(Debug, Clone, PartialEq)]
pub struct PairSteeringTable {
    alpha: Vec<F>,
    alpha_sampled: Vec<F>,
    tau_grid: Vec<F>,
}

impl PairSteeringTable {
    /// `directions` are unit vectors in grid order.
    #[must_use]
    pub fn new(pair: &MicPair, directions: &[Position], speed_of_sound: F, alpha_res: F) -> Self {
        let alpha = directions
            .iter()
            .map(|direction| {
                (direction.dot(&pair.baseline) / pair.distance)
                    .clamp(-1., 1.)
                    .acos()
                    .to_degrees()
            })
            .collect_vec();

        // The coarse sampling only needs to span the angles the grid reaches,
        // anything beyond would be wasted correlation work.
        let (min, max) = match alpha.iter().copied().minmax_by(F::total_cmp) {
            MinMaxResult::NoElements => (0., 180.),
            MinMaxResult::OneElement(a) => (a, a),
            MinMaxResult::MinMax(min, max) => (min, max),
        };
        let min = (min / alpha_res).floor() * alpha_res;
        let max = (max / alpha_res).ceil() * alpha_res;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let steps = ((max - min) / alpha_res).round() as usize;
        let alpha_sampled = (0..=steps)
            .map(|i| min + i as F * alpha_res)
            .collect_vec();

        let tau_grid = alpha_sampled
            .iter()
            .map(|alpha| pair.distance * alpha.to_radians().cos() / speed_of_sound)
            .collect();

        Self {
            alpha,
            alpha_sampled,
            tau_grid,
        }
    }

    /// Angle between the pair baseline and every grid direction.
    #[must_use]
    pub fn alpha(&self) -> &[F] {
        &self.alpha
    }

    /// Coarse, strictly increasing angle sampling covering [`Self::alpha`].
    #[must_use]
    pub fn alpha_sampled(&self) -> &[F] {
        &self.alpha_sampled
    }

    /// Time difference of arrival in seconds for each entry of
    /// [`Self::alpha_sampled`].
    #[must_use]
    pub fn tau_grid(&self) -> &[F] {
        &self.tau_grid
    }
}

/// Builds one [`PairSteeringTable`] per pair of `array`, in pair order.
///
/// # Errors
/// Fails on non positive speed of sound or angular resolution and on an empty
/// grid.
pub fn preprocess(
    array: &MicArray,
    grid: &DirectionGrid,
    speed_of_sound: F,
    alpha_res: F,
) -> Result<Vec<PairSteeringTable>> {
    if !(speed_of_sound.is_finite() && speed_of_sound > 0.) {
        return Err(Error::InvalidSpeedOfSound(speed_of_sound));
    }
    if !(alpha_res.is_finite() && alpha_res > 0.) {
        return Err(Error::InvalidConfig(format!(
            "alpha resolution must be positive, got {alpha_res}"
        )));
    }
    if grid.is_empty() {
        return Err(Error::InvalidGrid("grid has no directions".into()));
    }

    // Convert all potential {azimuth, elevation} on the sphere grid in cartesian coordinates
    let directions = grid.iter().map(|d| d.to_unit_vec()).collect_vec();

    let tables = array
        .pairs()
        .iter()
        .map(|pair| PairSteeringTable::new(pair, &directions, speed_of_sound, alpha_res))
        .collect_vec();
    debug!(
        pairs = tables.len(),
        directions = directions.len(),
        taus = tables.iter().map(|t| t.tau_grid.len()).sum::<usize>(),
        "built steering tables"
    );
    Ok(tables)
}
