//! Taxi fare feature pipeline CLI
//!
//! Inspect trip files, stream batches and build serving inputs.

use clap::{Parser, Subcommand};
use taxifare::{Config, Result};

#[derive(Parser)]
#[command(name = "taxifare")]
#[command(about = "Feature pipeline for taxi fare regression", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file
    Init,
    /// Print engineered features for the first records of some files
    Inspect {
        /// File pattern (defaults to the configured training pattern)
        pattern: Option<String>,
        /// Number of records to show
        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// Stream batches and report their sizes
    Batches {
        /// File pattern (defaults to the configured pattern for the mode)
        pattern: Option<String>,
        /// Batch mode
        #[arg(long, default_value = "eval")]
        mode: ModeArg,
        /// Stop after this many batches (required in train mode)
        #[arg(long)]
        steps: Option<usize>,
        /// Override the configured batch size
        #[arg(long)]
        batch_size: Option<usize>,
    },
    /// Load an evaluation set and summarise labels and tensor shapes
    Stats {
        /// File pattern (defaults to the configured evaluation pattern)
        pattern: Option<String>,
    },
    /// Build serving feature vectors from a JSON request
    Features {
        /// Inline JSON request
        #[arg(long)]
        json: Option<String>,
        /// File holding a JSON request
        #[arg(long)]
        file: Option<String>,
    },
}

#[derive(Clone, Copy, Debug)]
enum ModeArg {
    Train,
    Eval,
}

impl std::str::FromStr for ModeArg {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "train" => Ok(ModeArg::Train),
            "eval" => Ok(ModeArg::Eval),
            _ => Err(format!("Unknown mode: {}. Use train or eval.", s)),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load or create config
    let config = if std::path::Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    let result = match cli.command {
        Commands::Init => commands::init(&cli.config),
        Commands::Inspect { pattern, limit } => commands::inspect(&config, pattern, limit),
        Commands::Batches {
            pattern,
            mode,
            steps,
            batch_size,
        } => commands::batches(&config, pattern, mode, steps, batch_size),
        Commands::Stats { pattern } => commands::stats(&config, pattern),
        Commands::Features { json, file } => commands::features(&config, json, file),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use burn::data::dataloader::batcher::Batcher;
    use burn::data::dataset::Dataset;
    use taxifare::data::{BatchAssembler, CsvSource, Mode, TripDataset, TripSource, TripTensorBatcher};
    use taxifare::features::{EngineeredFeatures, FeatureEncoder, TripSample};
    use taxifare::predict::{ServingReceiver, ServingRequest};
    use taxifare::TaxiFareError;

    pub fn init(config_path: &str) -> Result<()> {
        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        println!("\nNext steps:");
        println!("  1. Edit {} to point at your trip CSV files", config_path);
        println!("  2. Run 'taxifare inspect' to check parsing");
        println!("  3. Run 'taxifare batches --mode eval' to stream batches");

        Ok(())
    }

    pub fn inspect(config: &Config, pattern: Option<String>, limit: usize) -> Result<()> {
        let pattern = pattern.unwrap_or_else(|| config.data.train_pattern.clone());
        let source = CsvSource::from_pattern(&pattern, config.schema.clone())?;

        for (i, trip) in source.open()?.take(limit).enumerate() {
            let trip = trip?;
            let features = EngineeredFeatures::from_trip(&trip);

            println!("#{} {}", i + 1, trip);
            let named: Vec<String> = features
                .named()
                .iter()
                .map(|(name, value)| format!("{}={:.5}", name, value))
                .collect();
            println!("    {}", named.join(" "));
        }

        Ok(())
    }

    pub fn batches(
        config: &Config,
        pattern: Option<String>,
        mode: ModeArg,
        steps: Option<usize>,
        batch_size: Option<usize>,
    ) -> Result<()> {
        let (mode, default_pattern) = match mode {
            ModeArg::Train => (Mode::Train, &config.data.train_pattern),
            ModeArg::Eval => (Mode::Eval, &config.data.eval_pattern),
        };
        if mode == Mode::Train && steps.is_none() {
            return Err(TaxiFareError::Config(
                "train mode repeats forever; pass --steps".to_string(),
            ));
        }

        let pattern = pattern.unwrap_or_else(|| default_pattern.clone());
        let source = CsvSource::from_pattern(&pattern, config.schema.clone())?;

        let mut batching = config.batching.clone();
        if let Some(size) = batch_size {
            batching.batch_size = size;
        }

        let encoder = FeatureEncoder::new(&config.features);
        log::info!(
            "Streaming {:?} batches of {} with {:?} features (width {})",
            mode,
            batching.batch_size,
            encoder.variant(),
            encoder.width()
        );
        let assembler = BatchAssembler::new(source, encoder, batching, mode)?;

        let mut total = 0;
        let stream = assembler.stream().take(steps.unwrap_or(usize::MAX));
        for (step, batch) in stream.enumerate() {
            let batch = batch?;
            let mean = batch.labels.iter().sum::<f32>() / batch.len() as f32;
            total += batch.len();
            println!("batch {:>5}: {:>5} rows, mean fare {:.2}", step + 1, batch.len(), mean);
        }
        println!("{} rows total", total);

        Ok(())
    }

    pub fn stats(config: &Config, pattern: Option<String>) -> Result<()> {
        use burn::backend::NdArray;

        let pattern = pattern.unwrap_or_else(|| config.data.eval_pattern.clone());
        let source = CsvSource::from_pattern(&pattern, config.schema.clone())?;
        let encoder = FeatureEncoder::new(&config.features);
        let dataset = TripDataset::from_source(&source, &encoder)?;

        println!("Dataset");
        println!("───────────────────────────────");
        println!("  Files:    {}", source.files().len());
        println!("  Samples:  {}", dataset.len());
        println!("  Width:    {}", dataset.width());
        if let Some(summary) = dataset.fare_summary() {
            println!(
                "  Fare:     mean {:.2}, min {:.2}, max {:.2}",
                summary.mean, summary.min, summary.max
            );
        }

        let batcher = TripTensorBatcher::<NdArray<f32>>::new(Default::default(), &encoder);
        let batch_size = config.batching.batch_size.min(dataset.len());
        if batch_size > 0 {
            let items: Vec<TripSample> = (0..batch_size).filter_map(|i| dataset.get(i)).collect();
            let batch = batcher.batch(items, &Default::default());
            println!(
                "  Tensors:  features {:?}, labels {:?}",
                batch.features.dims(),
                batch.labels.dims()
            );
        }

        Ok(())
    }

    pub fn features(config: &Config, json: Option<String>, file: Option<String>) -> Result<()> {
        let json = match (json, file) {
            (Some(j), _) => j,
            (None, Some(path)) => std::fs::read_to_string(path)?,
            (None, None) => {
                return Err(TaxiFareError::Config(
                    "pass a request with --json or --file".to_string(),
                ))
            }
        };

        let request = ServingRequest::from_json(&json)?;
        let receiver = ServingReceiver::new(FeatureEncoder::new(&config.features));
        let vectors = receiver.receive(&request)?;

        println!("{}", serde_json::to_string_pretty(&vectors)?);
        Ok(())
    }
}
