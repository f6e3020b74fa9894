//! Input and persistence collaborators of the measurement pass.
//!
//! ## Key Components
//!
//! - **checkout**: bringing a revision's files into a readable directory
//! - **history_file**: loading the revision history handed over by the walker
//! - **store**: persisting records, package tables and branch state
//!
//! ## Usage
//!
//! ```rust,no_run
//! use quale_rs::io::{load_history, JsonStore, StaticCheckout};
//!
//! # fn demo() -> quale_rs::core::errors::Result<()> {
//! let history = load_history(std::path::Path::new("history.yml"))?;
//! let checkout = StaticCheckout::new("/srv/export");
//! let store = JsonStore::new(JsonStore::path_for(".quale".as_ref(), &history.branch));
//! # Ok(())
//! # }
//! ```

pub mod checkout;
pub mod history_file;
pub mod store;

pub use checkout::{Checkout, CommandCheckout, StaticCheckout};
pub use history_file::load_history;
pub use store::{JsonStore, MemoryStore, MetricStore};
