use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;

use rusty_spinal::aggregate::{
    boxplot_shadows_from_traces, envelope_shadows, write_json, FeatureCloud,
};
use rusty_spinal::comparator::Comparator;
use rusty_spinal::config::AnalysisConfig;
use rusty_spinal::error::SpinalError;
use rusty_spinal::trace::TraceStore;

const LOG_PATTERN: &str = "{d(%H:%M:%S)} {l} [{M}] - {m}{n}";

#[derive(Parser, Debug)]
#[command(version, about = "Analysis of spinal-cord simulation traces")]
struct Cli {
    /// The analysis configuration (JSON), defaults are used for missing fields
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// The log level, one of: off, error, warn, info, debug, trace
    #[arg(long, global = true, default_value = "info")]
    log_level: LevelFilter,
    /// Also write the logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

/// The traces to analyze and where to save the results.
#[derive(Args, Debug)]
struct DatasetArgs {
    /// The traces (JSON object mapping each test to its samples)
    #[arg(short, long)]
    input: PathBuf,
    /// The output folder
    #[arg(short, long, default_value = ".")]
    output: PathBuf,
    /// The base name of the output file, defaults to the input file stem
    #[arg(long)]
    basename: Option<String>,
}

impl DatasetArgs {
    fn name(&self) -> String {
        self.input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "dataset".to_string())
    }

    fn basename(&self, prefix: &str) -> String {
        self.basename
            .clone()
            .unwrap_or_else(|| format!("{}_{}", prefix, self.name()))
    }

    fn load(&self, config: &AnalysisConfig) -> Result<TraceStore, SpinalError> {
        TraceStore::load_from(&self.input, self.name(), config.step)
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert the simulator dumps `*{muscle}.dat` of a folder into a JSON trace file
    Convert {
        /// The folder of the dumps
        #[arg(short, long)]
        folder: PathBuf,
        /// The muscle suffix of the dumps, e.g., MN_E
        #[arg(short, long)]
        muscle: String,
    },
    /// Boxplot shadows of the slices defined by the stimulation frequency
    Shadows {
        #[command(flatten)]
        dataset: DatasetArgs,
        /// Average blocks of this many samples first
        #[arg(long, default_value = "1")]
        chunk: usize,
    },
    /// Min/max/mean envelopes of the slices
    Envelope {
        #[command(flatten)]
        dataset: DatasetArgs,
        /// Transform the traces to the extracellular form first
        #[arg(long)]
        extracellular: bool,
    },
    /// Latency, amplitude area and number of extrema of every slice
    Features {
        #[command(flatten)]
        dataset: DatasetArgs,
        /// One feature vector per test instead of one per slice
        #[arg(long)]
        per_test: bool,
    },
    /// PCA ellipsoid similarity of the features of two datasets
    Compare {
        /// The traces of the first dataset
        #[arg(long)]
        first: PathBuf,
        /// The traces of the second dataset
        #[arg(long)]
        second: PathBuf,
        /// The output folder
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
        /// The base name of the output file
        #[arg(long, default_value = "similarity")]
        basename: String,
    },
}

fn init_logging(level: LevelFilter, log_file: Option<&Path>) -> Result<(), SpinalError> {
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build();
    let mut builder =
        Config::builder().appender(Appender::builder().build("stdout", Box::new(stdout)));
    let mut root = Root::builder().appender("stdout");

    if let Some(path) = log_file {
        let logfile = FileAppender::builder()
            .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
            .build(path)
            .map_err(|e| SpinalError::IOError(e.to_string()))?;
        builder = builder.appender(Appender::builder().build("logfile", Box::new(logfile)));
        root = root.appender("logfile");
    }

    let config = builder
        .build(root.build(level))
        .map_err(|e| SpinalError::IOError(e.to_string()))?;
    log4rs::init_config(config).map_err(|e| SpinalError::IOError(e.to_string()))?;
    Ok(())
}

fn run(command: Command, config: &AnalysisConfig) -> Result<(), SpinalError> {
    match command {
        Command::Convert { folder, muscle } => {
            let store = TraceStore::from_dat_folder(&folder, &muscle, config.step)?;
            let path = folder.join(format!("{}.json", muscle));
            store.save_to(&path)?;
            log::info!("Converted {} tests into {}", store.num_tests(), path.display());
        }
        Command::Shadows { dataset, chunk } => {
            let store = dataset.load(config)?;
            log::info!("Slimming data from {}", dataset.input.display());
            let store = store.slim(chunk)?;
            let config = AnalysisConfig {
                step: store.step(),
                ..config.clone()
            };
            let traces = store
                .traces()
                .values()
                .map(|trace| trace.as_slice())
                .collect::<Vec<&[f64]>>();
            let shadows = boxplot_shadows_from_traces(&traces, &config)?;
            write_json(&shadows, &dataset.output, &dataset.basename("shadow"))?;
        }
        Command::Envelope {
            dataset,
            extracellular,
        } => {
            let mut store = dataset.load(config)?;
            if extracellular {
                store = store.to_extracellular();
            }
            let sliced = store.sliced(config.slice_duration)?;
            let envelopes = envelope_shadows(&sliced, config)?;
            write_json(&envelopes, &dataset.output, &dataset.basename("envelope"))?;
        }
        Command::Features { dataset, per_test } => {
            let sliced = dataset.load(config)?.sliced(config.slice_duration)?;
            let cloud = if per_test {
                FeatureCloud::per_test(&sliced, config)?
            } else {
                FeatureCloud::per_slice(&sliced, config)?
            };
            log::info!("Computed {} feature vectors", cloud.len());
            write_json(&cloud, &dataset.output, &dataset.basename("features"))?;
        }
        Command::Compare {
            first,
            second,
            output,
            basename,
        } => {
            let clouds = [first, second]
                .iter()
                .map(|path| {
                    let name = path
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    let sliced =
                        TraceStore::load_from(path, name, config.step)?.sliced(config.slice_duration)?;
                    FeatureCloud::per_slice(&sliced, config)
                })
                .collect::<Result<Vec<FeatureCloud>, SpinalError>>()?;

            let comparator = Comparator::new(config.surface_resolution);
            let comparison = comparator.compare(&clouds[0].points(), &clouds[1].points())?;
            write_json(&comparison, &output, &basename)?;
        }
    }
    Ok(())
}

fn main() -> Result<(), SpinalError> {
    let cli = Cli::parse();
    init_logging(cli.log_level, cli.log_file.as_deref())?;

    let config = match cli.config.as_ref() {
        Some(path) => AnalysisConfig::load_from(path)?,
        None => AnalysisConfig::default(),
    };
    log::debug!("{:?}", config);

    run(cli.command, &config).map_err(|e| {
        log::error!("{}", e);
        e
    })
}
