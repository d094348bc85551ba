pub mod config;
pub mod controller;
pub mod history;
pub mod preprocess;

pub use config::*;
pub use controller::*;
pub use history::*;
pub use preprocess::*;
