//! Batch runtime: parallel package workers, ctrl-c cancellation, tracing setup.

mod error;
mod runtime;

pub use error::RuntimeError;
pub use runtime::{init_tracing, run, start_blocking, RunOptions};
