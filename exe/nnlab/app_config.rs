use std::{error::Error, path::PathBuf, time::Duration};

use nnlab::{subcommands::TrainParams, training::TrainingConfig};
use serde::Deserialize;

/// Training settings that may come from a YAML file and from the command line.
/// Also defines the config file format (every field can be omitted).
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
  /// Hidden layer sizes
  pub hidden: Option<Vec<usize>>,
  pub learning_rate: Option<f64>,
  pub shuffle: Option<bool>,
  pub scale: Option<bool>,
  /// Stop once the summed epoch error reaches this value
  pub desired_error: Option<f64>,
  /// Cancel training after this many seconds
  pub max_seconds: Option<f64>,
  /// Whitespace separated dataset file
  pub data: Option<PathBuf>,
}

impl AppConfig {
  pub fn from_file(path: &std::path::Path) -> Result<Self, Box<dyn Error>> {
    let content = std::fs::read_to_string(path)
      .map_err(|e| format!("Failed to read config {:?}: {}", path, e))?;
    Ok(serde_yaml::from_str(&content)?)
  }

  // merge configs where the second overwrites the first
  pub fn merge(self, other: Self) -> Self {
    Self {
      hidden: other.hidden.or(self.hidden),
      learning_rate: other.learning_rate.or(self.learning_rate),
      shuffle: other.shuffle.or(self.shuffle),
      scale: other.scale.or(self.scale),
      desired_error: other.desired_error.or(self.desired_error),
      max_seconds: other.max_seconds.or(self.max_seconds),
      data: other.data.or(self.data),
    }
  }

  pub fn into_params(self) -> Result<TrainParams, Box<dyn Error>> {
    let defaults = TrainParams::default();
    let max_duration = match self.max_seconds {
      Some(secs) => Some(Duration::try_from_secs_f64(secs).map_err(|e| format!("max_seconds: {}", e))?),
      None => None,
    };
    Ok(TrainParams {
      hidden: self.hidden.unwrap_or(defaults.hidden),
      config: TrainingConfig {
        learning_rate: self.learning_rate.unwrap_or(defaults.config.learning_rate),
        shuffle: self.shuffle.unwrap_or(defaults.config.shuffle),
        scale: self.scale.unwrap_or(defaults.config.scale),
      },
      desired_error: self.desired_error.unwrap_or(defaults.desired_error),
      max_duration,
      data: self.data,
      ..defaults
    })
  }
}
