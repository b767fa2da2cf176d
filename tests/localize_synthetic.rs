use std::f64::consts::PI;

use doaloc::{
    angular_distance, Audio, Direction, Error, LocalizerConfig, Pooling, REFERENCE_MICS, F,
};
use nalgebra::Vector3;

const FS: F = 16000.;
const C: F = 343.;

/// Sum of every bin centred tone of a 1024 sample window with spread phases,
/// white enough that PHAT sees a single unambiguous delay.
fn broadband(t: F) -> F {
    (1..512)
        .map(|k| {
            let k = k as F;
            (2. * PI * k * FS / 1024. * t + (k * k * 0.7) % (2. * PI)).sin()
        })
        .sum::<F>()
        / 64.
}

/// Far field plane wave arriving from `direction` at every microphone.
fn plane_wave(direction: Direction, samples: usize) -> Audio {
    let u = direction.to_unit_vec();
    Audio::from_channels(
        FS,
        REFERENCE_MICS.iter().map(|&mic| {
            let lead = u.dot(&Vector3::from(mic)) / C;
            (0..samples).map(move |n| broadband(n as F / FS + lead))
        }),
    )
}

const SOURCES: [(F, F); 5] = [
    (45., 20.),
    (-120., -10.),
    (100., 40.),
    (0., 0.),
    (170., -60.),
];

#[test]
fn locates_plane_wave_on_grid() {
    let localizer = LocalizerConfig {
        alpha_res: 1.,
        ..LocalizerConfig::default()
    }
    .create(REFERENCE_MICS)
    .unwrap();
    let grid = localizer.grid();
    for source in SOURCES.map(Direction::from) {
        let found = localizer.locate(&plane_wave(source, 1024)).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(
            found[0].direction,
            grid.direction(grid.nearest_index(source)),
            "{source:?}"
        );
        assert!(found[0].strength > 0.);
    }
}

#[test]
fn coarse_sampling_stays_within_one_step() {
    let localizer = LocalizerConfig::default().create(REFERENCE_MICS).unwrap();
    let step = localizer.grid().resolution();
    for source in SOURCES.map(Direction::from) {
        let found = localizer.locate(&plane_wave(source, 1024)).unwrap();
        let Direction {
            azimuth,
            elevation,
        } = found[0].direction;
        assert!(
            (azimuth - source.azimuth).abs() <= step + 1e-9
                && (elevation - source.elevation).abs() <= step + 1e-9,
            "{source:?}: {found:?}"
        );
    }
}

#[test]
fn pooling_and_normalization_agree_on_stationary_source() {
    let source = Direction::new(-120., -10.);
    let block = plane_wave(source, 2048);
    for (pooling, normalize_spectra) in [(Pooling::Max, true), (Pooling::Sum, false)] {
        let localizer = LocalizerConfig {
            pooling,
            normalize_spectra,
            ..LocalizerConfig::default()
        }
        .create(REFERENCE_MICS)
        .unwrap();
        let found = localizer.locate(&block).unwrap();
        assert!(
            angular_distance(found[0].direction, source) <= 5.,
            "{pooling}: {found:?}"
        );
    }
}

#[test]
fn repeated_blocks_give_identical_results() {
    let block = plane_wave(Direction::new(100., 40.), 2048);
    let localizer = LocalizerConfig {
        sources: 3,
        ..LocalizerConfig::default()
    }
    .create(REFERENCE_MICS)
    .unwrap();
    let first = localizer.locate(&block).unwrap();
    let second = localizer.locate(&block).unwrap();
    assert_eq!(first, second);
    assert!(!first.is_empty() && first.len() <= 3);
    for (i, a) in first.iter().enumerate() {
        for b in &first[i + 1..] {
            assert!(angular_distance(a.direction, b.direction) >= 10.);
            assert!(a.strength >= b.strength);
        }
    }
}

#[test]
fn spectrum_matches_grid() {
    let localizer = LocalizerConfig {
        azimuth_range: (-90., 90.),
        elevation_range: (0., 60.),
        grid_res: 2.,
        ..LocalizerConfig::default()
    }
    .create(REFERENCE_MICS)
    .unwrap();
    let block = plane_wave(Direction::new(30., 30.), 1024);
    let spec = localizer.analyze_spectrum(&block).unwrap();
    assert_eq!(spec.dim(), (31, 91));
    assert!(spec.iter().all(|v| v.is_finite()));

    let inst = localizer.instantaneous_spectrum(&block).unwrap();
    assert_eq!(inst.dim(), (31 * 91, 1));
    assert_eq!(localizer.tables().len(), 28);
    assert_eq!(localizer.frequencies().len(), 512);
}

#[test]
fn silent_block_is_finite() {
    let localizer = LocalizerConfig::default().create(REFERENCE_MICS).unwrap();
    let silence = Audio::from_channels(FS, REFERENCE_MICS.map(|_| [0.; 1024]));
    let spec = localizer.analyze_spectrum(&silence).unwrap();
    assert!(spec.iter().all(|&v| v == 0.));
    assert_eq!(localizer.locate(&silence).unwrap().len(), 1);
}

#[test]
fn rejects_mismatched_blocks() {
    let localizer = LocalizerConfig::default().create(REFERENCE_MICS).unwrap();

    let short = plane_wave(Direction::default(), 1000);
    assert!(matches!(
        localizer.locate(&short),
        Err(Error::BlockTooShort { samples: 1000, .. })
    ));

    let stereo = Audio::from_channels(FS, [[0.; 2048], [0.; 2048]]);
    assert!(matches!(
        localizer.locate(&stereo),
        Err(Error::ChannelMismatch {
            expected: 8,
            actual: 2
        })
    ));

    let resampled = Audio::new(
        48000.,
        plane_wave(Direction::default(), 2048).data().to_owned(),
    );
    assert!(matches!(
        localizer.locate(&resampled),
        Err(Error::SampleRateMismatch { .. })
    ));
}

#[test]
fn rejects_invalid_configuration() {
    let create = |config: LocalizerConfig| config.create(REFERENCE_MICS);

    assert!(matches!(
        LocalizerConfig::default().create([[0., 0., 0.]]),
        Err(Error::TooFewMicrophones(1))
    ));
    assert!(matches!(
        LocalizerConfig::default().create([[0., 0., 0.], [0.1, 0., 0.], [0., 0., 0.]]),
        Err(Error::CoincidentMicrophones(0, 2))
    ));
    assert!(matches!(
        LocalizerConfig::default().create([[0., F::NAN, 0.], [0.1, 0., 0.]]),
        Err(Error::NonFiniteMicrophone(0))
    ));
    assert!(matches!(
        create(LocalizerConfig {
            speed_of_sound: 0.,
            ..LocalizerConfig::default()
        }),
        Err(Error::InvalidSpeedOfSound(_))
    ));
    assert!(matches!(
        create(LocalizerConfig {
            grid_res: -1.,
            ..LocalizerConfig::default()
        }),
        Err(Error::InvalidGrid(_))
    ));
    assert!(matches!(
        create(LocalizerConfig {
            elevation_range: (-100., 0.),
            ..LocalizerConfig::default()
        }),
        Err(Error::InvalidGrid(_))
    ));
    assert!(matches!(
        create(LocalizerConfig {
            alpha_res: 0.,
            ..LocalizerConfig::default()
        }),
        Err(Error::InvalidConfig(_))
    ));
    assert!(matches!(
        create(LocalizerConfig {
            window_len: 1001,
            ..LocalizerConfig::default()
        }),
        Err(Error::InvalidConfig(_))
    ));
    assert!(matches!(
        create(LocalizerConfig {
            sources: 2,
            min_angle: 0.5,
            ..LocalizerConfig::default()
        }),
        Err(Error::InvalidConfig(_))
    ));
    assert!(create(LocalizerConfig {
        sources: 1,
        min_angle: 0.5,
        ..LocalizerConfig::default()
    })
    .is_ok());
}

#[test]
fn rejects_foreign_spectrum() {
    let localizer = LocalizerConfig {
        grid_res: 10.,
        min_angle: 20.,
        ..LocalizerConfig::default()
    }
    .create(REFERENCE_MICS)
    .unwrap();
    let spec = ndarray::Array2::zeros((19, 36));
    let wrong = ndarray::Array2::zeros((36, 19));
    assert!(matches!(
        localizer.find_sources(wrong.view(), 1),
        Err(Error::SpectrumShape {
            expected: (19, 36),
            actual: (36, 19)
        })
    ));
    assert_eq!(localizer.find_sources(spec.view(), 1).unwrap().len(), 1);
}

#[test]
fn localizer_is_shareable() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<doaloc::Localizer>();
}
