//! Decides which blocks are worth localizing.
//!
//! Localization itself never classifies audio, a [`Gate`] sits in front of it
//! and skipped blocks are simply never processed.
use std::ops::Range;

use tracing::trace;

use crate::utils::rms_db;
use crate::{Audio, F};

pub trait Gate {
    /// Whether `block` should be localized.
    fn is_open(&mut self, block: &Audio) -> bool;
}

impl<T: FnMut(&Audio) -> bool> Gate for T {
    fn is_open(&mut self, block: &Audio) -> bool {
        self(block)
    }
}

/// Lets every block through.
#[derive(Debug, Clone, Copy, Default)]
pub struct Always;

impl Gate for Always {
    fn is_open(&mut self, _: &Audio) -> bool {
        true
    }
}

/// Opens when the RMS level of one channel reaches a threshold in dBFS.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyGate {
    threshold_db: F,
    channel: usize,
    window: Option<Range<usize>>,
}

impl EnergyGate {
    /// Gate on the whole block of channel `0`.
    #[must_use]
    pub fn new(threshold_db: F) -> Self {
        Self {
            threshold_db,
            channel: 0,
            window: None,
        }
    }

    #[must_use]
    pub fn with_channel(mut self, channel: usize) -> Self {
        self.channel = channel;
        self
    }

    /// Only measure the samples in `window`, e.g. the center 20ms of a block.
    #[must_use]
    pub fn with_window(mut self, window: Range<usize>) -> Self {
        self.window = Some(window);
        self
    }

    /// Level of `block` as measured by this gate, `-inf` if the channel or
    /// window is out of range or the window is reversed.
    #[must_use]
    pub fn level(&self, block: &Audio) -> F {
        if self.channel >= block.channels() {
            return F::NEG_INFINITY;
        }
        let channel = block.data.row(self.channel);
        match &self.window {
            Some(window) if window.start <= window.end && window.end <= channel.len() => {
                rms_db(channel.slice(ndarray::s![window.clone()]))
            }
            Some(_) => F::NEG_INFINITY,
            None => rms_db(channel),
        }
    }
}

impl Gate for EnergyGate {
    fn is_open(&mut self, block: &Audio) -> bool {
        let level = self.level(block);
        trace!(level, threshold = self.threshold_db, "energy gate");
        level >= self.threshold_db
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(amplitude: F) -> Audio {
        Audio::from_channels(16000., [vec![amplitude; 1024], vec![0.; 1024]])
    }

    #[test]
    fn energy_threshold() {
        let mut gate = EnergyGate::new(-30.);
        assert!(gate.is_open(&block(0.1)));
        assert!(!gate.is_open(&block(0.01)));
        assert!(!gate.with_channel(1).is_open(&block(0.1)));
        assert!(!EnergyGate::new(-30.).with_channel(2).is_open(&block(0.1)));
    }

    #[test]
    fn window_and_closures() {
        let mut quiet_start = Audio::from_channels(
            16000.,
            [(0..1024).map(|i| if i < 512 { 0. } else { 0.5 })],
        );
        let mut gate = EnergyGate::new(-20.).with_window(352..672);
        assert!(gate.is_open(&quiet_start));
        assert!(!EnergyGate::new(-20.).with_window(0..352).is_open(&quiet_start));
        assert!(!EnergyGate::new(-20.).with_window(1000..2000).is_open(&quiet_start));
        let reversed = EnergyGate::new(-20.).with_window(600..400);
        assert_eq!(reversed.level(&quiet_start), F::NEG_INFINITY);

        let mut long_blocks = |block: &Audio| block.samples() >= 1024;
        assert!(long_blocks.is_open(&quiet_start));
        assert!(Always.is_open(&quiet_start));
        quiet_start = Audio::from_channels(16000., [[0.; 10]]);
        assert!(!long_blocks.is_open(&quiet_start));
    }
}
