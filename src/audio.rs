use std::str::FromStr;
#[cfg(feature = "wav")]
use std::path::Path;
use std::iter;

use float_cmp::{ApproxEq, F64Margin};
#[cfg(feature = "wav")]
pub use hound::SampleFormat as WavFormat;
use itertools::Itertools;
use ndarray::{concatenate, s, Array2, ArrayView2, Axis};
use num::{Float, NumCast};

use crate::{Error, Result, F};

/// Multichannel audio, stored as `channels x samples` with samples in
/// `[-1, 1]`.
#[must_use]
#[derive(Debug, Clone, PartialEq)]
pub struct Audio {
    pub(crate) sample_rate: F,
    pub(crate) data: Array2<F>,
}

impl Audio {
    /// Wraps `channels x samples` data.
    pub fn new(sample_rate: F, data: Array2<F>) -> Self {
        Self { sample_rate, data }
    }

    /// Takes `samples x channels` data, the layout capture devices deliver.
    pub fn from_frames(sample_rate: F, frames: ArrayView2<F>) -> Self {
        Self::new(sample_rate, frames.t().to_owned())
    }

    #[must_use]
    pub fn channels(&self) -> usize {
        self.data.dim().0
    }

    #[must_use]
    pub fn samples(&self) -> usize {
        self.data.dim().1
    }

    #[must_use]
    pub fn sample_rate(&self) -> F {
        self.sample_rate
    }

    /// `channels x samples`
    #[must_use]
    pub fn data(&self) -> ArrayView2<F> {
        self.data.view()
    }

    #[cfg(feature = "wav")]
    #[allow(clippy::missing_errors_doc)]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_wav(std::io::BufReader::new(
            std::fs::File::open(path).map_err(hound::Error::IoError)?,
        ))
    }

    #[cfg(feature = "wav")]
    #[allow(clippy::missing_errors_doc)]
    pub fn from_wav<R: std::io::Read>(data: R) -> Result<Self> {
        let reader = hound::WavReader::new(data)?;
        let spec = reader.spec();
        Ok(match spec.sample_format {
            hound::SampleFormat::Float => {
                let data = reader.into_samples();
                Self::from_interleaved(
                    spec.sample_rate as F,
                    spec.channels as usize,
                    data.collect::<Result<Vec<f32>, _>>()?,
                )
            }
            hound::SampleFormat::Int => {
                // https://web.archive.org/web/20230605122301/https://gist.github.com/endolith/e8597a58bcd11a6462f33fa8eb75c43d
                let data = reader.into_samples();
                Self::from_interleaved(
                    spec.sample_rate as F,
                    spec.channels as usize,
                    data.map_ok(normalize_pcm_wav(spec.bits_per_sample))
                        .collect::<Result<Vec<F>, _>>()?,
                )
            }
        })
    }

    /// Incomplete trailing frames are dropped.
    pub fn from_interleaved(
        sample_rate: F,
        channels: usize,
        data: impl IntoIterator<Item = impl Into<F>>,
    ) -> Self {
        let data: Vec<F> = data.into_iter().map_into().collect();
        let samples = data.len().checked_div(channels).unwrap_or_default();
        Self {
            sample_rate,
            data: Array2::from_shape_fn((channels, samples), |(c, s)| data[c + s * channels]),
        }
    }

    pub fn from_channels(
        sample_rate: F,
        channels: impl IntoIterator<Item = impl IntoIterator<Item = impl Into<F>>>,
    ) -> Self {
        let mut channels = channels
            .into_iter()
            .map(IntoIterator::into_iter)
            .collect_vec();
        let count = channels.len();
        let mut channel = count.wrapping_sub(1);
        Self::from_interleaved(
            sample_rate,
            count,
            iter::from_fn(|| {
                channel = channel.wrapping_add(1) % count.max(1);
                channels.get_mut(channel)?.next()
            }),
        )
    }

    /// Interleaved float samples, still in `[-1, 1]`.
    pub fn to_interleaved<T: Float>(&self) -> impl Iterator<Item = T> + '_ {
        self.data
            .t()
            .into_iter()
            .map(|&d| <T as NumCast>::from(d).expect("floats convert from f64"))
    }

    /// Decodes raw interleaved PCM without header.
    pub fn from_pcm_bytes(format: PcmFormat, sample_rate: F, channels: usize, data: &[u8]) -> Self {
        Self::from_interleaved(sample_rate, channels, format.from_data(data))
    }

    /// New audio containing `order[i]` as channel `i`.
    ///
    /// # Errors
    /// Fails if `order` references a missing channel.
    pub fn select_channels(&self, order: &[usize]) -> Result<Self> {
        if let Some(&missing) = order.iter().find(|&&c| c >= self.channels()) {
            return Err(Error::ChannelMismatch {
                expected: missing + 1,
                actual: self.channels(),
            });
        }
        Ok(Self::new(self.sample_rate, self.data.select(Axis(0), order)))
    }

    /// Stacks the channels of all `parts`, truncated to the shortest part.
    ///
    /// # Errors
    /// Fails without parts or if sample rates differ.
    pub fn concat_channels<'a>(parts: impl IntoIterator<Item = &'a Audio>) -> Result<Self> {
        let parts = parts.into_iter().collect_vec();
        let first = parts
            .first()
            .ok_or_else(|| Error::InvalidConfig("no audio to concatenate".into()))?;
        if let Some(other) = parts.iter().find(|p| p.sample_rate != first.sample_rate) {
            return Err(Error::SampleRateMismatch {
                expected: first.sample_rate,
                actual: other.sample_rate,
            });
        }
        let samples = parts.iter().map(|p| p.samples()).min().unwrap_or_default();
        let views = parts
            .iter()
            .map(|p| p.data.slice(s![.., ..samples]))
            .collect_vec();
        let data = concatenate(Axis(0), &views)
            .map_err(|e| Error::InvalidConfig(format!("cannot concatenate channels: {e}")))?;
        Ok(Self::new(first.sample_rate, data))
    }

    /// Splits into consecutive blocks of `len` samples, a trailing partial
    /// block is dropped.
    pub fn blocks(&self, len: usize) -> impl Iterator<Item = Audio> + '_ {
        let count = self.samples().checked_div(len).unwrap_or_default();
        (0..count).map(move |i| {
            Self::new(
                self.sample_rate,
                self.data.slice(s![.., i * len..(i + 1) * len]).to_owned(),
            )
        })
    }
}

impl ApproxEq for &Audio {
    type Margin = F64Margin;

    fn approx_eq<M: Into<Self::Margin>>(self, other: Self, margin: M) -> bool {
        let margin = margin.into();
        self.sample_rate.approx_eq(other.sample_rate, margin)
            && self.data.dim() == other.data.dim()
            && self
                .data
                .iter()
                .zip(other.data.iter())
                .all(|(a, b)| (*a).approx_eq(*b, margin))
    }
}

/// Scales signed integer wav samples of `bits_per_sample` to `[-1, 1]`.
///
/// hound already delivers 8 bit samples centred on zero, so every width is
/// treated the same.
#[must_use]
pub fn normalize_pcm_wav(bits_per_sample: u16) -> impl Fn(i32) -> F {
    let full_scale = 2f64.powi(<i32 as From<u16>>::from(bits_per_sample.max(1)) - 1);
    move |s: i32| <F as From<i32>>::from(s) / full_scale
}

/// Raw PCM sample layout, parsed from names like `S16LE`, `U8` or `F32BE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcmFormat {
    Float {
        bytes: u8,
        lower_endian: bool,
    },
    Int {
        signed: bool,
        bytes: u8,
        lower_endian: bool,
    },
}

impl FromStr for PcmFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::PcmFormat(s.to_owned());
        let upper = s.to_ascii_uppercase();
        let kind = upper.get(0..1).ok_or_else(invalid)?;
        let rest = &upper[1..];
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        let bits = rest[..digits].parse::<u8>().map_err(|_| invalid())?;
        if bits % 8 != 0 {
            return Err(invalid());
        }
        let bytes = bits / 8;
        let lower_endian = match &rest[digits..] {
            "" | "LE" => true,
            "BE" => false,
            _ => return Err(invalid()),
        };
        Ok(match (kind, bytes) {
            ("F", 4 | 8) => Self::Float {
                bytes,
                lower_endian,
            },
            ("S" | "U", 1..=4) => Self::Int {
                signed: kind == "S",
                bytes,
                lower_endian,
            },
            _ => return Err(invalid()),
        })
    }
}

impl PcmFormat {
    /// Amount of bytes `PcmFormat` has.
    #[must_use]
    pub fn bytes(self) -> u8 {
        match self {
            PcmFormat::Float { bytes, .. } | PcmFormat::Int { bytes, .. } => bytes,
        }
    }

    /// Returns whether `PcmFormat` uses lower endian.
    #[must_use]
    pub fn lower_endian(self) -> bool {
        match self {
            PcmFormat::Int { lower_endian, .. } | PcmFormat::Float { lower_endian, .. } => {
                lower_endian
            }
        }
    }

    /// Returns whether the `PcmFormat` is signed.
    #[must_use]
    pub fn signed(self) -> bool {
        !matches!(self, Self::Int { signed: false, .. })
    }

    /// Decodes samples to `[-1, 1]`, trailing bytes not filling a sample are
    /// ignored.
    #[allow(clippy::cast_possible_wrap, clippy::cast_precision_loss)]
    pub fn from_data(self, data: &[u8]) -> impl Iterator<Item = F> + '_ {
        data.chunks_exact(self.bytes().into()).map(move |data| {
            let mut raw = [0u8; 8];
            let width = data.len();
            if self.lower_endian() {
                raw[..width].copy_from_slice(data);
            } else {
                raw[..width].iter_mut().zip(data.iter().rev()).for_each(|(r, &d)| *r = d);
            }
            match self {
                PcmFormat::Float { bytes: 4, .. } => {
                    f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]).into()
                }
                PcmFormat::Float { .. } => f64::from_le_bytes(raw),
                PcmFormat::Int { signed, bytes, .. } => {
                    let bits = <u32 as From<_>>::from(bytes) * 8;
                    let value = u64::from_le_bytes(raw);
                    let half = (1u64 << (bits - 1)) as F;
                    if signed {
                        // sign extend
                        let shift = 64 - bits;
                        (((value << shift) as i64) >> shift) as F / half
                    } else {
                        (value as F - half) / half
                    }
                }
            }
        })
    }
}
