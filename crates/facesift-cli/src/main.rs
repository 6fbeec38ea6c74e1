use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use facesift_core::DistanceComparator;
use facesift_detect::{default_model_dir, DetectionModel, FaceScanner};

mod outputs;
mod run;

#[derive(Parser)]
#[command(name = "facesift", about = "Cluster an unlabeled photo archive by face identity")]
struct Cli {
    /// Directory of images to process
    input_dir: PathBuf,

    /// Output directory for the cluster blob, bucket lists, and crops
    #[arg(long, default_value = "out")]
    out: PathBuf,

    /// Member count a cluster must exceed to be reported as frequent
    #[arg(long, default_value_t = 20)]
    threshold: usize,

    /// Euclidean distance tolerance for the same-identity comparator
    #[arg(long, default_value_t = DistanceComparator::DEFAULT_TOLERANCE)]
    tolerance: f32,

    /// Detection upsampling steps; each doubles the detector input size
    #[arg(long, default_value_t = 1)]
    upsample: u32,

    /// Detection model variant
    #[arg(long, value_enum, default_value_t = ModelArg::Fast)]
    model: ModelArg,

    /// Directory containing the ONNX models (also: FACESIFT_MODEL_DIR)
    #[arg(long)]
    model_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModelArg {
    /// det_500m — cheaper per image
    Fast,
    /// det_10g — finds more small and off-angle faces
    Accurate,
}

impl From<ModelArg> for DetectionModel {
    fn from(arg: ModelArg) -> Self {
        match arg {
            ModelArg::Fast => DetectionModel::Fast,
            ModelArg::Accurate => DetectionModel::Accurate,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if !cli.input_dir.is_dir() {
        anyhow::bail!(
            "input directory does not exist: {}",
            cli.input_dir.display()
        );
    }

    let model_dir = cli.model_dir.unwrap_or_else(default_model_dir);
    let mut scanner = FaceScanner::new(&model_dir, cli.model.into(), cli.upsample)?;
    let comparator = DistanceComparator::new(cli.tolerance);

    let (store, buckets) = run::process_directory(&mut scanner, &comparator, &cli.input_dir)?;
    outputs::write_all(&store, &buckets, cli.threshold, &cli.out)?;

    Ok(())
}
