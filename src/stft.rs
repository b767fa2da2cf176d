//! Short time Fourier transform of multichannel blocks.
use std::f64::consts::PI;
use std::fmt::{self, Debug};
use std::sync::Arc;

use ndarray::{s, Array1, Array3, ArrayView2, Axis};
use realfft::{RealFftPlanner, RealToComplex};

use crate::{Error, Result, C, F};

/// Center frequency of every bin except DC for a window of `wlen` samples.
#[must_use]
pub fn frequency_axis(sample_rate: F, wlen: usize) -> Vec<F> {
    (1..=(wlen / 2))
        .map(|v| v as F * sample_rate / wlen as F)
        .collect()
}

/// Sine windowed STFT with 50% overlap.
///
/// The FFT is planned once, so a single transformer can be shared by every
/// block.
#[derive(Clone)]
pub struct FrameTransformer {
    wlen: usize,
    window: Array1<F>,
    fft: Arc<dyn RealToComplex<F>>,
}

impl Debug for FrameTransformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameTransformer")
            .field("wlen", &self.wlen)
            .finish_non_exhaustive()
    }
}

impl FrameTransformer {
    /// # Errors
    /// The window length must be even and non zero, frames hop by half of it.
    pub fn new(wlen: usize) -> Result<Self> {
        if wlen == 0 || wlen % 2 != 0 {
            return Err(Error::InvalidConfig(format!(
                "the window length must be even and non zero, got {wlen}"
            )));
        }
        let window = (0..wlen)
            .map(|i| ((i as F + 0.5) / wlen as F * PI).sin())
            .collect();
        let fft = RealFftPlanner::<F>::new().plan_fft_forward(wlen);
        Ok(Self { wlen, window, fft })
    }

    #[must_use]
    pub fn window_len(&self) -> usize {
        self.wlen
    }

    #[must_use]
    pub fn hop(&self) -> usize {
        self.wlen / 2
    }

    #[must_use]
    pub fn window(&self) -> &Array1<F> {
        &self.window
    }

    /// Non redundant bins including DC and Nyquist.
    #[must_use]
    pub fn n_bins(&self) -> usize {
        self.wlen / 2 + 1
    }

    /// Number of frames produced for `samples`, `0` when not even one window fits.
    #[must_use]
    pub fn n_frames(&self, samples: usize) -> usize {
        (samples / self.wlen * 2).saturating_sub(1)
    }

    /// Transforms a `channels x samples` block.
    ///
    /// Returns `bins x frames x channels`. Samples after the last complete
    /// frame are ignored.
    ///
    /// # Errors
    /// Fails if the block is shorter than one window.
    pub fn transform(&self, x: ArrayView2<F>) -> Result<Array3<C>> {
        let nfram = self.n_frames(x.ncols());
        if nfram == 0 {
            return Err(Error::BlockTooShort {
                samples: x.ncols(),
                window: self.wlen,
            });
        }
        let hop = self.hop();

        let mut x_ft = Array3::zeros((self.n_bins(), nfram, x.nrows()));
        let mut frame = self.fft.make_input_vec();
        let mut frame_ft = self.fft.make_output_vec();

        for (channel, mut x_ft) in x.rows().into_iter().zip(x_ft.axis_iter_mut(Axis(2))) {
            for (t, mut bins) in x_ft.axis_iter_mut(Axis(1)).enumerate() {
                // Framing
                let samples = channel.slice(s![t * hop..t * hop + self.wlen]);
                for ((out, &sample), &w) in frame.iter_mut().zip(samples).zip(&self.window) {
                    *out = sample * w;
                }
                self.fft
                    .process(&mut frame, &mut frame_ft)
                    .map_err(|e| Error::Fft(e.to_string()))?;
                bins.assign(&ndarray::aview1(&frame_ft));
            }
        }
        Ok(x_ft)
    }
}

#[cfg(test)]
mod tests {
    use float_cmp::assert_approx_eq;
    use ndarray::Array2;

    use super::*;

    #[test]
    fn frame_count() {
        let stft = FrameTransformer::new(1024).unwrap();
        assert_eq!(stft.n_frames(1023), 0);
        assert_eq!(stft.n_frames(1024), 1);
        assert_eq!(stft.n_frames(2048), 3);
        assert_eq!(stft.n_frames(3000), 3);
        assert_eq!(stft.n_bins(), 513);
    }

    #[test]
    fn half_sine_window() {
        let stft = FrameTransformer::new(8).unwrap();
        for (k, &w) in stft.window().iter().enumerate() {
            assert_approx_eq!(F, w, ((k as F + 0.5) * PI / 8.).sin(), ulps = 2);
        }
        assert!(FrameTransformer::new(6).is_err());
        assert!(FrameTransformer::new(0).is_err());
    }

    #[test]
    fn bin_centred_tone_lands_in_its_bin() {
        let wlen = 64;
        let stft = FrameTransformer::new(wlen).unwrap();
        let x = Array2::from_shape_fn((2, 2 * wlen), |(c, n)| {
            (2. * PI * 8. * n as F / wlen as F).cos() * (c + 1) as F
        });
        let x_ft = stft.transform(x.view()).unwrap();
        assert_eq!(x_ft.dim(), (wlen / 2 + 1, 3, 2));
        for frame in 0..3 {
            let strongest = (0..x_ft.dim().0)
                .max_by(|&a, &b| x_ft[(a, frame, 0)].norm().total_cmp(&x_ft[(b, frame, 0)].norm()))
                .unwrap();
            assert_eq!(strongest, 8);
            assert_approx_eq!(
                F,
                x_ft[(8, frame, 1)].norm(),
                2. * x_ft[(8, frame, 0)].norm(),
                epsilon = 1e-9
            );
        }
    }

    #[test]
    fn short_block_is_rejected() {
        let stft = FrameTransformer::new(1024).unwrap();
        assert!(matches!(
            stft.transform(Array2::zeros((2, 1000)).view()),
            Err(Error::BlockTooShort { samples: 1000, window: 1024 })
        ));
    }

    #[test]
    fn any_even_window() {
        let stft = FrameTransformer::new(6).unwrap();
        assert_eq!(stft.hop(), 3);
        assert_eq!(stft.n_frames(12), 3);
        let x_ft = stft.transform(Array2::ones((1, 12)).view()).unwrap();
        assert_eq!(x_ft.dim(), (4, 3, 1));
        assert!(matches!(FrameTransformer::new(7), Err(Error::InvalidConfig(_))));
        assert!(matches!(FrameTransformer::new(0), Err(Error::InvalidConfig(_))));
    }
}
