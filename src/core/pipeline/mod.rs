//! Measurement Pipeline Module
//!
//! Orchestrates the per-branch measurement pass.
//!
//! ## Key Components
//!
//! - **BatchCoordinator**: runs the enabled tool adapters over one revision and
//!   reconciles their outputs into measured and faulty files
//! - **MeasurementPass**: walks a branch's revisions in order, scoring each file,
//!   computing deltas against its predecessor and committing through a store
//!
//! ## Usage
//!
//! ```ignore
//! use quale_rs::core::pipeline::{MeasurementPass, PassMode};
//!
//! let mut pass = MeasurementPass::new(config, checkout)?;
//! let summary = pass.run(&mut branch, &mut store, PassMode::Resume).await?;
//! println!("{} revisions measured", summary.revisions_measured);
//! ```

mod coordinator;
mod measure;

pub use coordinator::BatchCoordinator;
pub use measure::{MeasurementPass, PassMode, PassSummary, ProgressCallback};
