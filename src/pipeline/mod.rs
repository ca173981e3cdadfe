//! Polling pipeline.
//!
//! - `SourceWorker`: one fetch, filter and deliver cycle for a source
//! - `Scheduler`: independent polling loops for all sources

pub mod cycle;
pub mod scheduler;

#[cfg(test)]
mod testing;

pub use cycle::{CycleReport, CycleState, SourceWorker};
pub use scheduler::Scheduler;
