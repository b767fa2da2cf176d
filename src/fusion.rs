//! Fusion of per pair spectra onto the direction grid.
use std::fmt::{self, Display};
use std::str::FromStr;

use ndarray::{Array1, Array2, ArrayView2, ArrayViewMut2, Axis, Zip};
use serde::{Deserialize, Serialize};

use crate::utils::{max, min};
use crate::F;

/// How the instantaneous spectra of all frames in a block are combined.
#[derive(Clone, Copy, Default, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Pooling {
    /// Keeps transient peaks that only show up in a single frame.
    #[default]
    Max,
    Sum,
}

impl Display for Pooling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pooling::Max => write!(f, "max"),
            Pooling::Sum => write!(f, "sum"),
        }
    }
}

impl FromStr for Pooling {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "max" => Self::Max,
            "sum" => Self::Sum,
            e => return Err(format!("Unsupported pooling mode {e:?}")),
        })
    }
}

/// Piecewise linear interpolation of every frame.
///
/// `sample_points` must be sorted ascending and `sample_data` is
/// `points x frames`. Returns `queries x frames`. Queries outside of the
/// sampled range take the value of the closest end point.
#[must_use]
pub fn interp1q(sample_points: &[F], sample_data: ArrayView2<F>, query_points: &[F]) -> Array2<F> {
    assert_eq!(
        sample_points.len(),
        sample_data.nrows(),
        "sample_points and sample_data need to have the same length"
    );
    debug_assert!(
        sample_points.windows(2).all(|w| w[0] < w[1]),
        "sample_points need to be strictly increasing"
    );

    let mut out = Array2::zeros((query_points.len(), sample_data.ncols()));
    if sample_points.is_empty() {
        return out;
    }
    if sample_points.len() == 1 {
        out.rows_mut()
            .into_iter()
            .for_each(|mut row| row.assign(&sample_data.row(0)));
        return out;
    }

    for (mut row, &q) in out.rows_mut().into_iter().zip(query_points) {
        // index of the upper neighbour, kept inside so both neighbours exist
        let b = sample_points
            .partition_point(|&p| p <= q)
            .clamp(1, sample_points.len() - 1);
        let a = b - 1;
        let lerp = ((q - sample_points[a]) / (sample_points[b] - sample_points[a])).clamp(0., 1.);
        Zip::from(&mut row)
            .and(sample_data.row(a))
            .and(sample_data.row(b))
            .for_each(|out, &a, &b| *out = a + lerp * (b - a));
    }
    out
}

/// Rescales every frame (column) to `[0, 1]`.
///
/// Frames with a flat spectrum are only shifted to `0`.
pub fn normalize_frames(mut spec_inst: ArrayViewMut2<F>) {
    for mut frame in spec_inst.columns_mut() {
        let min = min(&frame);
        frame.mapv_inplace(|v| v - min);
        let max = max(&frame);
        if max > 0. {
            frame.mapv_inplace(|v| v / max);
        }
    }
}

/// Pools `directions x frames` into one value per direction.
#[must_use]
pub fn pool(spec_inst: ArrayView2<F>, pooling: Pooling) -> Array1<F> {
    match pooling {
        Pooling::Max => spec_inst.map_axis(Axis(1), |a| a.iter().copied().fold(F::MIN, F::max)),
        Pooling::Sum => spec_inst.sum_axis(Axis(1)),
    }
}
