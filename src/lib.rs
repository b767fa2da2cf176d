#![warn(clippy::pedantic)]
#![allow(
    clippy::missing_panics_doc,
    clippy::cast_lossless,
    clippy::cast_precision_loss
)]
// TODO https://github.com/rust-ndarray/ndarray/pull/1279
#![allow(clippy::reversed_empty_ranges)]
//! Direction of arrival estimation for fixed microphone arrays.
//!
//! The pipeline computes GCC-PHAT for every microphone pair over a spherical
//! direction grid, fuses the pairs, pools the analysis frames of a block and
//! extracts well separated peaks.
//!
//! ```no_run
//! # fn block() -> doaloc::Audio { unimplemented!() }
//! use doaloc::{LocalizerConfig, REFERENCE_MICS};
//!
//! let localizer = LocalizerConfig::default().create(REFERENCE_MICS)?;
//! for estimate in localizer.locate(&block())? {
//!     println!("{} {}", estimate.direction.azimuth, estimate.direction.elevation);
//! }
//! # Ok::<(), doaloc::Error>(())
//! ```
#[cfg(feature = "image")]
use std::fmt::Write;

use derive_more::Constructor;
use nalgebra::{Complex, UnitQuaternion, Vector3};
#[cfg(feature = "image")]
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "realtime")]
mod realtime;
#[cfg(feature = "realtime")]
pub use realtime::*;
mod error;
pub use error::{Error, Result};
pub mod fusion;
pub use fusion::Pooling;
pub mod gate;
pub use gate::{Always, EnergyGate, Gate};
pub mod geometry;
pub use geometry::{DirectionGrid, MicArray, MicPair, REFERENCE_MICS};
mod localizer;
pub use localizer::{Localizer, LocalizerConfig};
pub mod peaks;
pub use peaks::{angular_distance, Estimate};
pub mod phat;
pub mod steering;
pub use steering::PairSteeringTable;
pub mod stft;
mod utils;

mod audio;
pub use audio::*;

pub type F = f64;
pub type C = Complex<F>;
pub type Position = Vector3<F>;

/// Azimuth and elevation in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Constructor, Deserialize, Serialize)]
pub struct Direction {
    pub azimuth: F,
    pub elevation: F,
}

impl From<(F, F)> for Direction {
    fn from((azimuth, elevation): (F, F)) -> Self {
        Self::new(azimuth, elevation)
    }
}

impl Direction {
    /// Converts angles azimuth and elevation to the respective position on a
    /// unitsphere around the microphone array.
    #[must_use]
    pub fn to_unit_vec(self) -> Position {
        self.to_quaternion()
            .transform_vector(&Position::new(1., 0., 0.))
    }

    /// Converts angles azimuth and elevation to the matching quaternion
    #[must_use]
    pub fn to_quaternion(self) -> UnitQuaternion<F> {
        UnitQuaternion::from_euler_angles(
            0.,
            -self.elevation.to_radians(),
            self.azimuth.to_radians(),
        )
    }
}

/// Renders an `elevation x azimuth` spectrum as a gray scale heat map, top row
/// is the highest elevation.
#[cfg(feature = "image")]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
#[must_use]
pub fn spec_to_image(spectrum: ArrayView2<F>) -> image::GrayImage {
    use image::{GrayImage, Luma};
    let (min, max) = spectrum
        .iter()
        .copied()
        .fold((F::INFINITY, F::NEG_INFINITY), |(min, max), v| {
            (min.min(v), max.max(v))
        });
    let range = if max > min { max - min } else { 1. };
    let mut img = GrayImage::new(spectrum.ncols() as u32, spectrum.nrows() as u32);
    for ((y, x), value) in spectrum.indexed_iter() {
        img.put_pixel(
            x as u32,
            (spectrum.nrows() - 1 - y) as u32,
            Luma([((value - min) / range * u8::MAX as F) as u8]),
        );
    }
    img
}

#[cfg(feature = "image")]
#[must_use]
pub fn spec_to_csv(spectrum: ArrayView2<F>) -> String {
    let mut out = String::new();
    for row in spectrum.rows() {
        for col in row.iter() {
            write!(out, "{col},").expect("string writing does not fail");
        }
        writeln!(out).expect("string writing does not fail");
    }
    out
}
