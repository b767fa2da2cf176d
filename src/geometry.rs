//! Microphone array geometry and the spherical direction grid.
use itertools::Itertools;
use nalgebra::Vector3;

use crate::{Direction, Error, Position, Result, F};

/// Reference geometry: two 4-channel capture devices mounted on a cube of
/// roughly 17 cm, positions in meters.
#[rustfmt::skip]
pub const REFERENCE_MICS: [[F; 3]; 8] = [
    [  0.055,  0.085, -0.055 ],
    [ -0.053,  0.085,  0.053 ],
    [ -0.085,  0.052, -0.054 ],
    [ -0.085, -0.055,  0.052 ],
    [ -0.054, -0.085, -0.054 ],
    [  0.051, -0.085,  0.054 ],
    [  0.085, -0.054, -0.055 ],
    [  0.085,  0.054,  0.052 ],
];

/// One unordered microphone pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MicPair {
    pub first: usize,
    pub second: usize,
    /// `mics[first] - mics[second]`
    pub baseline: Position,
    pub distance: F,
}

/// Fixed microphone positions and all pairs derived from them.
#[derive(Debug, Clone, PartialEq)]
pub struct MicArray {
    mics: Vec<Position>,
    pairs: Vec<MicPair>,
}

impl MicArray {
    /// # Errors
    /// Fails for fewer than 2 microphones, non finite coordinates or two
    /// microphones at the same position.
    pub fn new(mics: impl IntoIterator<Item = impl Into<Position>>) -> Result<Self> {
        let mics = mics.into_iter().map(Into::into).collect_vec();
        if mics.len() < 2 {
            return Err(Error::TooFewMicrophones(mics.len()));
        }
        if let Some(mic) = mics.iter().position(|m| m.iter().any(|c| !c.is_finite())) {
            return Err(Error::NonFiniteMicrophone(mic));
        }

        // Find all microphone pair indexes
        let pairs = (0..mics.len())
            .tuple_combinations()
            .map(|(first, second)| {
                let baseline = mics[first] - mics[second];
                let distance = baseline.magnitude();
                if distance > 0. {
                    Ok(MicPair {
                        first,
                        second,
                        baseline,
                        distance,
                    })
                } else {
                    Err(Error::CoincidentMicrophones(first, second))
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { mics, pairs })
    }

    #[must_use]
    pub fn mics(&self) -> &[Position] {
        &self.mics
    }

    #[must_use]
    pub fn pairs(&self) -> &[MicPair] {
        &self.pairs
    }

    /// Number of microphones, and therefore expected channels.
    #[must_use]
    pub fn channels(&self) -> usize {
        self.mics.len()
    }

    #[must_use]
    pub fn centroid(&self) -> Position {
        self.mics
            .iter()
            .fold(Vector3::zeros(), |a, v| a + v / self.mics.len() as F)
    }
}

/// Lattice of candidate directions, elevation major.
///
/// Direction `i` has elevation `elevations()[i / n_azimuth()]` and azimuth
/// `azimuths()[i % n_azimuth()]`, which matches an `elevation x azimuth`
/// row-major spectrum.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionGrid {
    azimuth: Vec<F>,
    elevation: Vec<F>,
    resolution: F,
}

impl Default for DirectionGrid {
    fn default() -> Self {
        Self::new((-179., 180.), (-90., 90.), 1.).expect("default grid is valid")
    }
}

fn sample_range((start, end): (F, F), step: F) -> Vec<F> {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let n = ((end - start) / step + 1e-9).floor() as usize;
    (0..=n).map(|i| start + i as F * step).collect()
}

impl DirectionGrid {
    /// Samples both inclusive ranges (in degrees) with `resolution`.
    ///
    /// # Errors
    /// Fails on non positive resolution, reversed or non finite ranges and
    /// elevations outside of `[-90, 90]`.
    pub fn new(azimuth_range: (F, F), elevation_range: (F, F), resolution: F) -> Result<Self> {
        if !(resolution.is_finite() && resolution > 0.) {
            return Err(Error::InvalidGrid(format!(
                "resolution must be positive, got {resolution}"
            )));
        }
        for (name, (start, end)) in [("azimuth", azimuth_range), ("elevation", elevation_range)] {
            if !(start.is_finite() && end.is_finite() && start <= end) {
                return Err(Error::InvalidGrid(format!(
                    "{name} range {start}..={end} is empty"
                )));
            }
        }
        if elevation_range.0 < -90. || elevation_range.1 > 90. {
            return Err(Error::InvalidGrid(format!(
                "elevation range {}..={} exceeds [-90, 90]",
                elevation_range.0, elevation_range.1
            )));
        }
        Ok(Self {
            azimuth: sample_range(azimuth_range, resolution),
            elevation: sample_range(elevation_range, resolution),
            resolution,
        })
    }

    #[must_use]
    pub fn azimuths(&self) -> &[F] {
        &self.azimuth
    }

    #[must_use]
    pub fn elevations(&self) -> &[F] {
        &self.elevation
    }

    #[must_use]
    pub fn resolution(&self) -> F {
        self.resolution
    }

    #[must_use]
    pub fn n_azimuth(&self) -> usize {
        self.azimuth.len()
    }

    #[must_use]
    pub fn n_elevation(&self) -> usize {
        self.elevation.len()
    }

    /// Total number of directions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.n_azimuth() * self.n_elevation()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn direction(&self, index: usize) -> Direction {
        Direction::new(
            self.azimuth[index % self.n_azimuth()],
            self.elevation[index / self.n_azimuth()],
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = Direction> + '_ {
        self.elevation.iter().flat_map(move |&elevation| {
            self.azimuth
                .iter()
                .map(move |&azimuth| Direction::new(azimuth, elevation))
        })
    }

    /// Index of the grid point closest to `direction` along each axis.
    #[must_use]
    pub fn nearest_index(&self, direction: Direction) -> usize {
        let nearest = |values: &[F], target: F| {
            values
                .iter()
                .position_min_by(|a, b| (*a - target).abs().total_cmp(&(*b - target).abs()))
                .unwrap_or_default()
        };
        nearest(&self.elevation, direction.elevation) * self.n_azimuth()
            + nearest(&self.azimuth, direction.azimuth)
    }
}
