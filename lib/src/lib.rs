pub mod dataset;
pub mod error;
pub mod model;
pub mod subcommands;
pub mod training;
pub mod utils;

pub use error::{Error, Result};
pub use training::TrainingController;
