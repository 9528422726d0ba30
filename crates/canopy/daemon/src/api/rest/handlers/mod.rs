//! REST handler modules.

mod deployments;
mod health;
mod system;

pub use deployments::*;
pub use health::*;
pub use system::*;
