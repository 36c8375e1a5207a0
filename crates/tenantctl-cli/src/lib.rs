#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::redundant_pub_crate)]

//! Administrative CLI for a hosted identity tenant's management API.
//!
//! Layout:
//! - `cli.rs`: argument parsing and command dispatch
//! - `commands/`: command handlers grouped by concern
//! - `client.rs`: shared context, errors, credentials, and cancellation
//! - `request.rs`: validation of raw `api` command inputs
//! - `dispatch.rs`: authenticated request execution behind a busy indicator
//! - `pagination.rs`: budget-bounded page accumulation
//! - `reconcile.rs`: add/remove option computation and selection
//! - `prompt.rs`: interactive terminal prompts
//! - `output.rs`: renderers and formatting helpers
//! - `logging.rs`: tracing subscriber setup
//! - `main.rs`: thin entrypoint delegating to `run()`

pub(crate) mod cli;
pub(crate) mod client;
pub(crate) mod commands;
pub(crate) mod dispatch;
pub(crate) mod logging;
pub(crate) mod models;
pub(crate) mod output;
pub(crate) mod pagination;
pub(crate) mod prompt;
pub(crate) mod reconcile;
pub(crate) mod request;

pub use cli::run;
