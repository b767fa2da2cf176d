#![allow(clippy::module_name_repetitions)]
use ndarray::{s, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;
use tracing::{debug, debug_span, trace};

use crate::fusion::{interp1q, normalize_frames, pool, Pooling};
use crate::geometry::{DirectionGrid, MicArray};
use crate::peaks::{find_peaks, Estimate};
use crate::phat::phat_spectrum;
use crate::steering::{preprocess, PairSteeringTable};
use crate::stft::{frequency_axis, FrameTransformer};
use crate::{Audio, Error, Position, Result, F};

/// Everything that is fixed at startup. Angles are in degrees.
#[derive(SmartDefault, Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LocalizerConfig {
    #[default = 343.0]
    pub speed_of_sound: F,
    #[default = 16000.0]
    pub sample_rate: F,
    /// STFT window, frames overlap by half of it
    #[default = 1024]
    pub window_len: usize,
    /// uses tuple, because `Range` doesn't implement Copy
    #[default((-179., 180.))]
    pub azimuth_range: (F, F),
    /// uses tuple, because `Range` doesn't implement Copy
    #[default((-90., 90.))]
    pub elevation_range: (F, F),
    #[default = 1.0]
    pub grid_res: F,
    /// resolution of the per pair angle sampling the correlation is computed on
    #[default = 5.0]
    pub alpha_res: F,
    /// minimum great circle distance between two reported sources
    #[default = 10.0]
    pub min_angle: F,
    /// sources reported by [`Localizer::locate`]
    #[default = 1]
    pub sources: usize,
    pub pooling: Pooling,
    /// instantaneous local angular spectra normalization
    pub normalize_spectra: bool,
}

impl LocalizerConfig {
    /// Validates the configuration and precomputes all steering tables.
    ///
    /// # Errors
    /// Any invalid geometry, grid or parameter is reported here, never while
    /// processing blocks.
    pub fn create(self, mics: impl IntoIterator<Item = impl Into<Position>>) -> Result<Localizer> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.) {
            return Err(Error::InvalidConfig(format!(
                "sample rate must be positive, got {}",
                self.sample_rate
            )));
        }
        if self.sources > 1 && (self.min_angle < self.grid_res || self.min_angle.is_nan()) {
            return Err(Error::InvalidConfig(format!(
                "minimum angle between two peaks ({}) has to be at least the grid resolution ({})",
                self.min_angle, self.grid_res
            )));
        }
        let array = MicArray::new(mics)?;
        let grid = DirectionGrid::new(self.azimuth_range, self.elevation_range, self.grid_res)?;
        let tables = preprocess(&array, &grid, self.speed_of_sound, self.alpha_res)?;
        let frames = FrameTransformer::new(self.window_len)?;
        // DC carries no phase difference, it is dropped from every spectrum
        let freqs = frequency_axis(self.sample_rate, self.window_len);

        debug!(
            mics = array.channels(),
            directions = grid.len(),
            window = self.window_len,
            "localizer ready"
        );
        Ok(Localizer {
            config: self,
            array,
            grid,
            tables,
            frames,
            freqs,
        })
    }
}

/// Immutable localization context, shareable between threads.
#[derive(Debug, Clone)]
pub struct Localizer {
    config: LocalizerConfig,
    array: MicArray,
    grid: DirectionGrid,
    tables: Vec<PairSteeringTable>,
    frames: FrameTransformer,
    freqs: Vec<F>,
}

impl Localizer {
    #[must_use]
    pub fn config(&self) -> &LocalizerConfig {
        &self.config
    }

    #[must_use]
    pub fn array(&self) -> &MicArray {
        &self.array
    }

    #[must_use]
    pub fn grid(&self) -> &DirectionGrid {
        &self.grid
    }

    /// One table per pair, in the order of [`MicArray::pairs`].
    #[must_use]
    pub fn tables(&self) -> &[PairSteeringTable] {
        &self.tables
    }

    /// Frequencies of the bins used for correlation.
    #[must_use]
    pub fn frequencies(&self) -> &[F] {
        &self.freqs
    }

    #[allow(clippy::float_cmp)]
    fn check_block(&self, audio: &Audio) -> Result<()> {
        if audio.channels() != self.array.channels() {
            return Err(Error::ChannelMismatch {
                expected: self.array.channels(),
                actual: audio.channels(),
            });
        }
        if audio.sample_rate() != self.config.sample_rate {
            return Err(Error::SampleRateMismatch {
                expected: self.config.sample_rate,
                actual: audio.sample_rate(),
            });
        }
        Ok(())
    }

    /// Spatial spectrum of every analysis frame, `directions x frames`.
    ///
    /// # Errors
    /// Fails if the block does not match the array, the sample rate or is
    /// shorter than one window.
    pub fn instantaneous_spectrum(&self, audio: &Audio) -> Result<Array2<F>> {
        self.check_block(audio)?;

        let x_ft = self.frames.transform(audio.data.view())?;
        let x_ft = x_ft.slice(s![1usize.., .., ..]);
        let n_frames = x_ft.dim().1;

        let mut spec_inst = Array2::zeros((self.grid.len(), n_frames));
        for (pair, table) in self.array.pairs().iter().zip(&self.tables) {
            let spec = phat_spectrum(
                x_ft.index_axis(Axis(2), pair.first),
                x_ft.index_axis(Axis(2), pair.second),
                &self.freqs,
                table.tau_grid(),
            );
            // Order 1 interpolation on the entire grid
            spec_inst += &interp1q(table.alpha_sampled(), spec.view(), table.alpha());
        }

        if self.config.normalize_spectra {
            normalize_frames(spec_inst.view_mut());
        }
        Ok(spec_inst)
    }

    /// Pooled spatial spectrum of a block, `elevation x azimuth`.
    ///
    /// # Errors
    /// See [`Self::instantaneous_spectrum`].
    pub fn analyze_spectrum(&self, audio: &Audio) -> Result<Array2<F>> {
        let _span = debug_span!("block", samples = audio.samples()).entered();
        let spec_inst = self.instantaneous_spectrum(audio)?;
        trace!(frames = spec_inst.ncols(), pooling = %self.config.pooling, "pooling");
        Ok(pool(spec_inst.view(), self.config.pooling)
            .into_shape((self.grid.n_elevation(), self.grid.n_azimuth()))
            .expect("one value per grid direction"))
    }

    /// Up to `nsrc` separated peaks of an `elevation x azimuth` spectrum,
    /// strongest first.
    ///
    /// # Errors
    /// Fails if `spec` does not have one value per grid direction.
    pub fn find_sources(&self, spec: ArrayView2<F>, nsrc: usize) -> Result<Vec<Estimate>> {
        let expected = (self.grid.n_elevation(), self.grid.n_azimuth());
        if spec.dim() != expected {
            return Err(Error::SpectrumShape {
                expected,
                actual: spec.dim(),
            });
        }
        Ok(find_peaks(spec, &self.grid, nsrc, self.config.min_angle))
    }

    /// Locates the configured number of sources.
    ///
    /// # Errors
    /// See [`Self::instantaneous_spectrum`].
    pub fn locate(&self, audio: &Audio) -> Result<Vec<Estimate>> {
        self.locate_n(audio, self.config.sources)
    }

    /// Locates up to `nsrc` sources.
    ///
    /// # Errors
    /// See [`Self::instantaneous_spectrum`].
    pub fn locate_n(&self, audio: &Audio, nsrc: usize) -> Result<Vec<Estimate>> {
        let spec = self.analyze_spectrum(audio)?;
        let sources = self.find_sources(spec.view(), nsrc)?;
        debug!(found = sources.len(), requested = nsrc, "located");
        Ok(sources)
    }
}
