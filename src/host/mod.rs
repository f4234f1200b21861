//! Boundary with the trading platform that hosts the strategies.
//!
//! - `traits`: the [`Host`] operations the core consumes
//! - `types`: order, status, fee and account value types
//! - `mock`: an in-process paper host for simulation and tests

pub mod mock;
mod traits;
mod types;

pub use mock::{PaperHost, Submission};
#[cfg(test)]
pub use traits::MockHost;
pub use traits::Host;
pub use types::*;
