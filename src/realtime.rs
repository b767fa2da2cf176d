use std::str::FromStr;

use alsa::pcm::{self, Access, HwParams, IoFormat};
use alsa::{Direction, ValueOr, PCM};
use derive_more::Display;
use forr::forr;
use num::{Num, ToPrimitive};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{Audio, Error, F};

/// Channel order of two 4-channel devices when combined into
/// [`REFERENCE_MICS`](crate::REFERENCE_MICS) order.
pub const REFERENCE_CHANNEL_MAP: [usize; 8] = [0, 1, 4, 5, 3, 2, 7, 6];

#[derive(Clone, Copy, Display, Deserialize, Serialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum Format {
    S8,
    U8,
    S16,
    U16,
    S32,
    U32,
    F32,
    F64,
}
impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "s8" => Format::S8,
            "u8" => Format::U8,
            "s16" => Format::S16,
            "u16" => Format::U16,
            "s32" => Format::S32,
            "u32" => Format::U32,
            "f32" => Format::F32,
            "f64" => Format::F64,
            e => return Err(format!("Unsupported audio format {e:?}")),
        })
    }
}

impl From<Format> for pcm::Format {
    fn from(value: Format) -> Self {
        match value {
            Format::S8 => Self::S8,
            Format::U8 => Self::U8,
            Format::S16 => Self::s16(),
            Format::U16 => Self::u16(),
            Format::S32 => Self::s32(),
            Format::U32 => Self::u32(),
            Format::F32 => Self::float(),
            Format::F64 => Self::float64(),
        }
    }
}

/// Capture of fixed size blocks from one ALSA device.
pub struct AudioRecorder<T> {
    name: String,
    pcm: PCM,
    channels: usize,
    rate: u32,
    buffer: Vec<T>,
}

/// Trait for normalizing recorded samples.
pub trait Normalize {
    /// Normalizes sample to [`F`] between `-1` and `1`.
    fn normalize(self) -> F;
}

impl Normalize for f32 {
    fn normalize(self) -> F {
        self.into()
    }
}

impl Normalize for F {
    fn normalize(self) -> F {
        self
    }
}

forr! { $signed:ty, $unsigned:ty in [i8, u8, i16, u16, i32, u32] $*
    impl Normalize for $signed {
        fn normalize(self) -> F {
            self as F / -(Self::MIN as F)
        }
    }
    impl Normalize for $unsigned {
        fn normalize(self) -> F {
            (self as F + $signed::MIN as F) / -($signed::MIN as F)
        }
    }
}

impl<T: Copy + IoFormat + Num + ToPrimitive + Normalize> AudioRecorder<T> {
    #[allow(clippy::missing_errors_doc)]
    /// Opens `name` for interleaved capture of `block_len` frames per
    /// [`Self::record`].
    pub fn new(
        name: impl AsRef<str>,
        channels: usize,
        rate: u32,
        format: Format,
        block_len: usize,
    ) -> Result<Self, alsa::Error> {
        let pcm = PCM::new(name.as_ref(), Direction::Capture, false)?;
        {
            let hwp = HwParams::any(&pcm)?;
            #[allow(clippy::cast_possible_truncation)]
            hwp.set_channels(channels as u32)?;
            hwp.set_rate(rate, ValueOr::Nearest)?;
            hwp.set_format(format.into())?;
            hwp.set_access(Access::RWInterleaved)?;
            pcm.hw_params(&hwp)?;
        }
        pcm.start()?;
        debug!(device = name.as_ref(), channels, rate, %format, block_len, "capture started");
        Ok(AudioRecorder {
            name: name.as_ref().to_owned(),
            pcm,
            channels,
            rate,
            buffer: vec![T::zero(); block_len * channels],
        })
    }

    #[must_use]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Blocks until one block is captured.
    ///
    /// A block cut short by the device is returned shorter and rejected by the
    /// localizer.
    #[allow(clippy::missing_errors_doc)]
    pub fn record(&mut self) -> Result<Audio, alsa::Error> {
        _ = self.pcm.prepare();
        let io = self.pcm.io_checked()?;

        let len = io.readi(&mut self.buffer)? * self.channels;
        if len < self.buffer.len() {
            warn!(device = %self.name, read = len, expected = self.buffer.len(), "short read");
        }
        Ok(Audio::from_interleaved(
            self.rate.into(),
            self.channels,
            self.buffer[..len].iter().copied().map(Normalize::normalize),
        ))
    }
}

/// Several capture devices forming one microphone array.
pub struct ArrayRecorder<T> {
    devices: Vec<AudioRecorder<T>>,
    channel_map: Option<Vec<usize>>,
}

impl<T: Copy + IoFormat + Num + ToPrimitive + Normalize> ArrayRecorder<T> {
    /// `channel_map[i]` selects which of the concatenated device channels
    /// becomes channel `i`, without a map devices are simply concatenated.
    ///
    /// # Errors
    /// Fails without devices or if the map references a missing channel.
    pub fn new(
        devices: Vec<AudioRecorder<T>>,
        channel_map: Option<Vec<usize>>,
    ) -> crate::Result<Self> {
        let channels = devices.iter().map(AudioRecorder::channels).sum::<usize>();
        if devices.is_empty() {
            return Err(Error::InvalidConfig("no capture devices".into()));
        }
        if let Some(&missing) = channel_map.iter().flatten().find(|&&c| c >= channels) {
            return Err(Error::ChannelMismatch {
                expected: missing + 1,
                actual: channels,
            });
        }
        Ok(Self {
            devices,
            channel_map,
        })
    }

    /// Channels of the combined blocks.
    #[must_use]
    pub fn channels(&self) -> usize {
        match &self.channel_map {
            Some(map) => map.len(),
            None => self.devices.iter().map(AudioRecorder::channels).sum(),
        }
    }

    /// Records one block from every device, in device order.
    ///
    /// # Errors
    /// Fails if any device fails to capture.
    pub fn record(&mut self) -> crate::Result<Audio> {
        let parts = self
            .devices
            .iter_mut()
            .map(AudioRecorder::record)
            .collect::<Result<Vec<_>, _>>()?;
        let audio = Audio::concat_channels(&parts)?;
        Ok(match &self.channel_map {
            Some(map) => audio.select_channels(map)?,
            None => audio,
        })
    }
}

#[macro_export]
/// Allows implementing code for any format supported by [`AudioRecorder`].
///
/// The type alias `FORMAT` contains the format as a type e.g. `i8` for `Format::S8`.
///
/// ```
/// let format = doaloc::Format::S8;
/// doaloc::for_format!(format, assert_eq!(FORMAT::default(), 0 as FORMAT));
/// ```
macro_rules! for_format {
    ($format:expr, $expr:expr) => {
        match $format {
            $crate::Format::S8 => {
                type FORMAT = i8;
                $expr
            }
            $crate::Format::U8 => {
                type FORMAT = u8;
                $expr
            }
            $crate::Format::S16 => {
                type FORMAT = i16;
                $expr
            }
            $crate::Format::U16 => {
                type FORMAT = u16;
                $expr
            }
            $crate::Format::S32 => {
                type FORMAT = i32;
                $expr
            }
            $crate::Format::U32 => {
                type FORMAT = u32;
                $expr
            }
            $crate::Format::F32 => {
                type FORMAT = f32;
                $expr
            }
            $crate::Format::F64 => {
                type FORMAT = f64;
                $expr
            }
        }
    };
}
