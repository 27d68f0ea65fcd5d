//! KotaDB - local-first code intelligence with git-native sync
//!
//! This crate provides the core functionality for the `kota` CLI tool.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`model`] - Data types (Repository, IndexedFile, Symbol, Dependency, IndexJob)
//! - [`storage`] - SQLite database layer and queries
//! - [`sync`] - JSONL export/import, deletion manifest, watcher, merge driver
//! - [`store`] - Per-project context tying storage and sync together
//! - [`config`] - Path resolution and sync configuration
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod storage;
pub mod store;
pub mod sync;

pub use error::{Error, Result};
pub use store::{PollOutcome, Store};
