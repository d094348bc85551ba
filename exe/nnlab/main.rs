mod app_config;

use app_config::AppConfig;
use clap::{Parser, Subcommand};
use nnlab::{subcommands, utils};
use std::{error::Error, path::PathBuf, str::FromStr};
use tracing::Level;

#[derive(Parser)]
struct Cli {
  /// Log debug output
  #[arg(short, long, global = true)]
  verbose: bool,
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Train a network on the Iris dataset and test it
  Train {
    /// YAML file with training settings; flags override it
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Hidden layer size, repeat for more layers
    #[arg(long = "hidden", value_name = "INT")]
    hidden: Vec<usize>,
    #[arg(long, value_name = "FLOAT")]
    learning_rate: Option<f64>,
    /// Shuffle rows every epoch
    #[arg(long)]
    shuffle: bool,
    /// Min-max normalize input columns
    #[arg(long)]
    scale: bool,
    #[arg(long, value_name = "FLOAT")]
    desired_error: Option<f64>,
    /// Cancel training after this many seconds
    #[arg(long, value_name = "FLOAT")]
    max_seconds: Option<f64>,
    /// Dataset file, 4 features and a class label per line
    #[arg(short, long, value_name = "PATH")]
    data: Option<PathBuf>,
    /// Comma separated input to classify after training, repeatable
    #[arg(long = "test", value_name = "A,B,C,D")]
    tests: Vec<InputVector>,
    /// Print every neuron's weights after training
    #[arg(long)]
    show_weights: bool,
  },
}

#[derive(Debug, Clone)]
struct InputVector(Vec<f64>);

impl FromStr for InputVector {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    s.split(',')
      .map(|v| v.trim().parse::<f64>().map_err(|e| format!("{:?}: {}", v, e)))
      .collect::<Result<Vec<_>, _>>()
      .map(InputVector)
  }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
  let args = Cli::parse();
  let level = if args.verbose { Level::DEBUG } else { Level::INFO };
  utils::init_logging(level)?;

  match args.command {
    Command::Train {
      config,
      hidden,
      learning_rate,
      shuffle,
      scale,
      desired_error,
      max_seconds,
      data,
      tests,
      show_weights,
    } => {
      let file_config = match config {
        Some(path) => AppConfig::from_file(&path)?,
        None => AppConfig::default(),
      };
      let cli_config = AppConfig {
        hidden: (!hidden.is_empty()).then_some(hidden),
        learning_rate,
        shuffle: shuffle.then_some(true),
        scale: scale.then_some(true),
        desired_error,
        max_seconds,
        data,
      };
      let mut params = file_config.merge(cli_config).into_params()?;
      params.tests = tests.into_iter().map(|InputVector(v)| v).collect();
      params.show_weights = show_weights;

      let app = subcommands::Train::new(params);
      app.run().await?;
    }
  }
  Ok(())
}
