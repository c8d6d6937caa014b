//! # Quarry
//!
//! Ask business questions in plain language and get answers from your SQL
//! database, informed by your business-policy notes.
//!
//! Each question runs through a fixed pipeline:
//!
//! - **Retrieve**: read the database schema and the most relevant policy passages
//! - **Synthesize query**: have a language model write SQL for the question
//! - **Execute**: run the query; failures become data, not crashes
//! - **Answer**: have the model answer from the results
//!
//! ## Quick Start
//!
//! ```bash
//! export QUARRY_DATABASE_URL=postgres://analyst@localhost/sales
//! export OPENAI_API_KEY=sk-...
//!
//! # Interactive session
//! quarry
//!
//! # One question
//! quarry ask "How many open opportunities?"
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::format_push_string)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::redundant_closure_for_method_calls)]

pub mod ai;
pub mod app;
pub mod core;
pub mod index;
pub mod pipeline;
pub mod repl;
pub mod store;

// Re-export commonly used types
pub use app::App;
pub use core::Config;
pub use pipeline::{CompletedSession, ExecutionOutcome, PipelineError, WorkflowEngine};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "quarry";
