//! Shared value types for the wake-steering engine

mod optimization;
mod prediction;
mod range;
mod validation;
mod wind;
mod yaw;

pub use optimization::*;
pub use prediction::*;
pub use range::*;
pub use validation::*;
pub use wind::*;
pub use yaw::*;
