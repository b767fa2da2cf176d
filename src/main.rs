use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use confique::Config;
use doaloc::{
    for_format, spec_to_csv, spec_to_image, Always, ArrayRecorder, Audio, AudioRecorder,
    EnergyGate, Estimate, Format, Gate, Localizer, LocalizerConfig, PcmFormat, Pooling,
    REFERENCE_CHANNEL_MAP, REFERENCE_MICS, F,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Config)]
struct Conf {
    #[config(default = 343.0)]
    speed_of_sound: F,
    #[config(default = 16000)]
    sample_rate: u32,
    /// Samples per localized block.
    #[config(default = 1024)]
    block_len: usize,
    #[config(default = 1024)]
    window_len: usize,
    #[config(default = 1.0)]
    grid_res: F,
    #[config(default = 5.0)]
    alpha_res: F,
    #[config(default = 10.0)]
    min_angle: F,
    #[config(default = 1)]
    sources: usize,
    #[config(default = "max")]
    pooling: Pooling,
    #[config(default = false)]
    normalize_spectra: bool,
    /// Microphone positions in meters, the reference array if unset.
    mics: Option<Vec<[F; 3]>>,
    /// Blocks quieter than this (dBFS) are skipped.
    gate_db: Option<F>,
    #[config(nested)]
    capture: CaptureConf,
}

#[derive(Config)]
struct CaptureConf {
    /// ALSA devices, their channels are concatenated in this order.
    devices: Option<Vec<String>>,
    #[config(default = 4)]
    channels_per_device: usize,
    #[config(default = "s16")]
    format: Format,
    /// Concatenated device channel for every microphone.
    channel_map: Option<Vec<usize>>,
}

/// Estimates the direction of arrival of sound sources.
///
/// Prints `block azimuth elevation strength` for every located source.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Number of sources to report per block.
    #[arg(short = 'n', long)]
    sources: Option<usize>,
    /// Skip blocks quieter than this level in dBFS.
    #[arg(long, allow_hyphen_values = true)]
    gate_db: Option<F>,
    #[command(subcommand)]
    input: Input,
}

#[derive(Subcommand)]
enum Input {
    /// Localize a wav file block by block.
    File {
        path: PathBuf,
        /// Write a PNG and CSV of every block's spectrum to this directory.
        #[arg(long)]
        spectrum: Option<PathBuf>,
    },
    /// Localize raw interleaved PCM from stdin.
    Raw {
        #[arg(long, default_value = "S16LE")]
        format: PcmFormat,
    },
    /// Localize live capture from the configured ALSA devices.
    Live,
}

fn load_config(path: Option<&Path>) -> Result<Conf> {
    let mut builder = Conf::builder();
    if let Some(path) = path {
        if !path.exists() {
            bail!("configuration file {} does not exist", path.display());
        }
        builder = builder.file(path);
    }
    builder.load().context("loading configuration")
}

fn process(
    localizer: &Localizer,
    gate: &mut dyn Gate,
    index: usize,
    block: &Audio,
    spectrum: Option<&Path>,
) -> Result<()> {
    if !gate.is_open(block) {
        debug!(block = index, "gate closed");
        return Ok(());
    }
    let spec = localizer.analyze_spectrum(block)?;
    if let Some(dir) = spectrum {
        spec_to_image(spec.view()).save(dir.join(format!("{index:05}.png")))?;
        fs::write(dir.join(format!("{index:05}.csv")), spec_to_csv(spec.view()))?;
    }
    for Estimate {
        direction,
        strength,
    } in localizer.find_sources(spec.view(), localizer.config().sources)?
    {
        println!(
            "{index}\t{:.0}\t{:.0}\t{strength:.3}",
            direction.azimuth, direction.elevation
        );
    }
    Ok(())
}

fn live(conf: &Conf, localizer: &Localizer, gate: &mut dyn Gate) -> Result<()> {
    let capture = &conf.capture;
    let devices = capture
        .devices
        .clone()
        .unwrap_or_else(|| vec!["default".to_owned()]);
    let channel_map = capture.channel_map.clone().or_else(|| {
        (conf.mics.is_none() && devices.len() * capture.channels_per_device == 8)
            .then(|| REFERENCE_CHANNEL_MAP.to_vec())
    });

    for_format!(capture.format, {
        let recorders = devices
            .iter()
            .map(|name| {
                AudioRecorder::<FORMAT>::new(
                    name,
                    capture.channels_per_device,
                    conf.sample_rate,
                    capture.format,
                    conf.block_len,
                )
                .with_context(|| format!("opening {name}"))
            })
            .collect::<Result<Vec<_>>>()?;
        let mut recorder = ArrayRecorder::new(recorders, channel_map)?;
        info!(?devices, channels = recorder.channels(), "capturing");
        for index in 0.. {
            let block = recorder.record()?;
            process(localizer, gate, index, &block, None)?;
        }
    });
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let conf = load_config(args.config.as_deref())?;

    let localizer = LocalizerConfig {
        speed_of_sound: conf.speed_of_sound,
        sample_rate: F::from(conf.sample_rate),
        window_len: conf.window_len,
        grid_res: conf.grid_res,
        alpha_res: conf.alpha_res,
        min_angle: conf.min_angle,
        sources: args.sources.unwrap_or(conf.sources),
        pooling: conf.pooling,
        normalize_spectra: conf.normalize_spectra,
        ..LocalizerConfig::default()
    }
    .create(conf.mics.clone().unwrap_or_else(|| REFERENCE_MICS.to_vec()))?;

    let mut gate: Box<dyn Gate> = match args.gate_db.or(conf.gate_db) {
        Some(threshold) => Box::new(EnergyGate::new(threshold)),
        None => Box::new(Always),
    };

    match args.input {
        Input::File { path, spectrum } => {
            if let Some(dir) = &spectrum {
                fs::create_dir_all(dir)?;
            }
            let audio =
                Audio::from_file(&path).with_context(|| format!("reading {}", path.display()))?;
            info!(
                channels = audio.channels(),
                samples = audio.samples(),
                "localizing file"
            );
            for (index, block) in audio.blocks(conf.block_len).enumerate() {
                process(&localizer, gate.as_mut(), index, &block, spectrum.as_deref())?;
            }
        }
        Input::Raw { format } => {
            let channels = localizer.array().channels();
            let mut buffer = vec![0; conf.block_len * channels * usize::from(format.bytes())];
            let mut stdin = io::stdin().lock();
            for index in 0.. {
                match stdin.read_exact(&mut buffer) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                    Err(e) => return Err(e.into()),
                }
                let block =
                    Audio::from_pcm_bytes(format, F::from(conf.sample_rate), channels, &buffer);
                process(&localizer, gate.as_mut(), index, &block, None)?;
            }
        }
        Input::Live => live(&conf, &localizer, gate.as_mut())?,
    }
    Ok(())
}
