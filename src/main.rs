// SPDX-License-Identifier: MPL-2.0
use std::path::PathBuf;
use std::process::ExitCode;

use esrgan_export::config::{self, ExportConfig};
use esrgan_export::pipeline;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const HELP: &str = "\
esrgan-export: convert the Real-ESRGAN x4 checkpoint to a TensorFlow.js graph model

USAGE:
  esrgan-export [OPTIONS]

OPTIONS:
  --config <PATH>    Load settings from a TOML file
  --weights <PATH>   Checkpoint path (default: weights/RealESRGAN_x4.pth)
  --output <PATH>    ONNX artifact path (default: model.onnx)
  --dest <PATH>      TensorFlow.js output directory
                     (default: ../public/models/real-esrgan)
  --skip-validate    Skip re-running the exported artifact
  -h, --help         Print this help
";

struct CliArgs {
    config_path: Option<PathBuf>,
    weights: Option<PathBuf>,
    output: Option<PathBuf>,
    dest: Option<PathBuf>,
    skip_validate: bool,
    help: bool,
}

fn parse_args() -> Result<CliArgs, pico_args::Error> {
    let mut args = pico_args::Arguments::from_env();
    Ok(CliArgs {
        help: args.contains(["-h", "--help"]),
        config_path: args.opt_value_from_str("--config")?,
        weights: args.opt_value_from_str("--weights")?,
        output: args.opt_value_from_str("--output")?,
        dest: args.opt_value_from_str("--dest")?,
        skip_validate: args.contains("--skip-validate"),
    })
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    init_logging();

    let cli = match parse_args() {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!("{HELP}");
            return ExitCode::FAILURE;
        }
    };
    if cli.help {
        print!("{HELP}");
        return ExitCode::SUCCESS;
    }

    let mut export_config = match &cli.config_path {
        Some(path) => match config::load_from_path(path) {
            Ok(loaded) => loaded,
            Err(e) => {
                error!("{e}");
                return ExitCode::FAILURE;
            }
        },
        None => ExportConfig::default(),
    };

    if let Some(weights) = cli.weights {
        export_config.weights_path = weights;
    }
    if let Some(output) = cli.output {
        export_config.artifact_path = output;
    }
    if let Some(dest) = cli.dest {
        export_config.converter.output_dir = dest;
    }
    if cli.skip_validate {
        export_config.skip_validation = true;
    }

    match pipeline::run(&export_config) {
        Ok(report) => {
            info!(
                artifact = %report.artifact_path.display(),
                digest = %report.artifact_digest,
                "done"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
