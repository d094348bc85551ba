pub use train::*;

pub mod train;
