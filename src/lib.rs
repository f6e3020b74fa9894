//! # Quale-RS: Revision-by-Revision Quality Indicators
//!
//! Drives external static-analysis tools over every revision of a branch and
//! turns their raw output into comparable quality indicators:
//!
//! - **Tool Adapters**: Checkstyle, JHawk and complexity-report behind one
//!   `configure -> run -> parse` contract
//! - **Scoring**: calibrated 0.0-3.0 marks and SQUALE-style log-domain aggregation
//! - **History**: per-file deltas along the identity chain of each file
//! - **Packages**: nested-set package tree with subtree roll-ups
//! - **Fault Tracking**: files a tool rejected or silently skipped
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Measurement Pass                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Core          │  Adapters         │  I/O                   │
//! │                │                   │                        │
//! │ • Ingest       │ • Checkstyle      │ • History files        │
//! │ • Scoring      │ • JHawk           │ • Checkout             │
//! │ • History      │ • ComplexityReport│ • Metric stores        │
//! │ • Packages     │ • Subprocesses    │                        │
//! │ • Config       │ • XML recovery    │                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use quale_rs::core::config::QualeConfig;
//! use quale_rs::core::ingest::Ingestor;
//! use quale_rs::core::pipeline::{MeasurementPass, PassMode};
//! use quale_rs::io::{load_history, JsonStore, StaticCheckout};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = QualeConfig::default();
//!     let history = load_history("history.yml".as_ref())?;
//!     let mut branch = Ingestor::new(&config.ingest)?.ingest(&history)?;
//!
//!     let mut store = JsonStore::new(".quale/main.json");
//!     let mut pass = MeasurementPass::new(config, Arc::new(StaticCheckout::new("./checkout")))?;
//!     let summary = pass.run(&mut branch, &mut store, PassMode::Fresh).await?;
//!
//!     println!("{} revisions measured", summary.revisions_measured);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[cfg(feature = "mimalloc")]
#[global_allocator]
static ALLOC: mimalloc::MiMalloc = mimalloc::MiMalloc;

// Measurement engine
pub mod core {
    //! Scoring, history and package algorithms and the data they work on.

    pub mod config;
    pub mod errors;
    pub mod faults;
    pub mod history;
    pub mod ingest;
    pub mod model;
    pub mod packages;
    pub mod pipeline;
    pub mod scoring;
}

// External analysis tools
pub mod adapters;

// History input, checkouts and persistence
pub mod io;

pub use core::config::QualeConfig;
pub use core::errors::{QualeError, Result, ResultExt};
pub use core::pipeline::{MeasurementPass, PassMode, PassSummary};

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
