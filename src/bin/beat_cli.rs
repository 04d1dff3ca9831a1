use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use beat_analysis::analysis::{AnalysisCapability, FeatureExtractor};
use beat_analysis::config::AppConfig;
use beat_analysis::error::ExperimentError;
use beat_analysis::experiment::{expected_layout, BeatExperiment, DatasetLayout};
use beat_analysis::http;
use beat_analysis::logging::init_logging;
use clap::{Parser, Subcommand};

/// Features echoed after an extraction, one per family where available
const SAMPLE_FEATURES: [&str; 9] = [
    "tempo",
    "rms_mean",
    "spectral_centroid_mean",
    "mfcc_1_mean",
    "chroma_stft_1_mean",
    "tonnetz_1_mean",
    "harmonic_ratio",
    "mel_spectrogram_mean",
    "onset_rate",
];

#[derive(Parser, Debug)]
#[command(
    name = "beat_cli",
    about = "Tempo/key analysis service and beat classification experiments"
)]
struct Cli {
    /// JSON config file (defaults to $BEAT_ANALYSIS_CONFIG or config/beat_analysis.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP analysis service
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        /// Run without decoding; every upload gets the fallback estimate
        #[arg(long)]
        fallback: bool,
    },
    /// Print tempo, key and confidence for one file as JSON
    Analyze { file: PathBuf },
    /// Extract the full feature vector of one file and save it as JSON and CSV
    Extract {
        file: PathBuf,
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },
    /// Train and compare classifiers on a labeled beats folder
    Experiment {
        #[arg(default_value = "beats")]
        root: PathBuf,
    },
}

fn main() -> ExitCode {
    init_logging();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path),
        None => AppConfig::load(),
    };

    match cli.command {
        Commands::Serve {
            host,
            port,
            fallback,
        } => run_serve(config, host, port, fallback),
        Commands::Analyze { file } => run_analyze(&config, &file),
        Commands::Extract { file, output_dir } => run_extract(&config, &file, &output_dir),
        Commands::Experiment { root } => run_experiment(&config, &root),
    }
}

fn run_serve(
    mut config: AppConfig,
    host: Option<String>,
    port: Option<u16>,
    fallback: bool,
) -> Result<ExitCode> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    let capability = AnalysisCapability::detect(fallback || config.server.force_fallback);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;
    runtime.block_on(http::serve(&config.server, capability))?;
    Ok(ExitCode::SUCCESS)
}

fn run_analyze(config: &AppConfig, file: &Path) -> Result<ExitCode> {
    let size = std::fs::metadata(file)
        .with_context(|| format!("reading {}", file.display()))?
        .len();
    let result = AnalysisCapability::detect(config.server.force_fallback)
        .analyze_file(file, size)
        .with_context(|| format!("analyzing {}", file.display()))?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(ExitCode::SUCCESS)
}

fn run_extract(config: &AppConfig, file: &Path, output_dir: &Path) -> Result<ExitCode> {
    let capability = AnalysisCapability::detect(config.server.force_fallback);
    let extractor = FeatureExtractor::from_capability(config.extraction.clone(), &capability)
        .context("feature extraction needs an audio decoder")?;
    let report = extractor
        .extract_file(file)
        .with_context(|| format!("extracting features from {}", file.display()))?;

    println!("FEATURE EXTRACTION SUMMARY");
    println!("{}", "=".repeat(60));
    println!("File: {}", report.file_path);
    println!("Total Features: {}", report.total_features_extracted());
    if let Some(duration) = report.features.get("duration") {
        println!("Duration: {:.2} seconds", duration.as_f64());
    }
    println!("Sample Rate: {} Hz", report.extraction_params.sample_rate);

    println!();
    println!("FEATURE CATEGORIES:");
    println!("{}", "-".repeat(30));
    for (family, count) in extractor.category_counts() {
        println!("{}: {} features", family.label(), count);
    }

    println!();
    println!("SAMPLE FEATURE VALUES:");
    println!("{}", "-".repeat(40));
    for name in SAMPLE_FEATURES {
        if let Some(value) = report.features.get(name) {
            println!("{:25}: {:.4}", name, value.as_f64());
        }
    }

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;
    let (json_path, csv_path) = report
        .save(output_dir)
        .with_context(|| format!("saving features into {}", output_dir.display()))?;
    println!();
    println!("Features saved to:");
    println!("   - {}", json_path.display());
    println!("   - {}", csv_path.display());
    Ok(ExitCode::SUCCESS)
}

fn run_experiment(config: &AppConfig, root: &Path) -> Result<ExitCode> {
    println!("BEAT CLASSIFICATION ML EXPERIMENT");
    println!("{}", "=".repeat(50));

    let layout = match DatasetLayout::open(root) {
        Ok(layout) => layout,
        Err(ExperimentError::MissingFolder { path }) => {
            eprintln!("Folder not found: {}", path);
            eprintln!();
            eprintln!("Please create the following folder structure:");
            eprintln!("{}", expected_layout(&root.display().to_string()));
            return Ok(ExitCode::from(1));
        }
        Err(err) => return Err(err.into()),
    };

    let counts = layout.counts();
    println!("Dataset Summary:");
    println!(
        "   Training - Good: {}, Bad: {}",
        counts.train_good, counts.train_bad
    );
    println!(
        "   Test     - Good: {}, Bad: {}",
        counts.test_good, counts.test_bad
    );
    println!("   Total    - {} beats", counts.total());
    if counts.train_missing_class() {
        println!();
        println!("Warning: You need both good and bad beats in training!");
        println!("   The model needs examples of both classes to learn.");
    }
    if counts.test_missing_class() {
        println!();
        println!("Warning: You need both good and bad beats in test!");
        println!("   This will affect evaluation metrics.");
    }

    println!();
    println!("Starting ML experiment in {}", root.display());
    let experiment = BeatExperiment::new(
        layout,
        FeatureExtractor::with_config(config.extraction.clone()),
        config.experiment.clone(),
    );

    match experiment.run() {
        Ok(run) => {
            println!();
            println!("{}", run.results.summary(config.experiment.top_features));
            println!();
            println!("Results saved to {}", root.display());
            println!(
                "Main results: {}",
                run.saved
                    .main
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default()
            );
            println!("EXPERIMENT COMPLETED SUCCESSFULLY!");
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            eprintln!("Experiment failed: {}", err);
            Ok(ExitCode::from(1))
        }
    }
}
