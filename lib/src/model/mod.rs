pub mod backprop;
pub mod network;
pub mod types;

pub use backprop::*;
pub use network::*;
pub use types::*;
