//! Offline-first sync engine for a multi-tenant small-business ledger.
//!
//! Transactions are written to a local SQLite mirror first and reconciled
//! with a remote store whenever connectivity allows.
//!
//! # Architecture
//!
//! - [`storage`] - Local store: SQLite mirror with dirty tracking and cursors
//! - [`tenant`] - Company resolution from an ordered chain of identity sources
//! - [`remote`] - Remote store gateway (HTTP, plus an in-memory double)
//! - [`sync`] - Push/pull reconcilers, conflict policy, engine and scheduler
//! - [`model`] - Records and tenant ids
//! - [`config`] - Data directory, `config.json` and tunables
//! - [`cli`] - Command-line interface using clap
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod remote;
pub mod storage;
pub mod sync;
pub mod tenant;
pub mod validate;

pub use error::{Error, Result};
