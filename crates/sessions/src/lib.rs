//! Session registry and session log files.
//!
//! Sessions live only in memory, inside a single worker task (see
//! [`registry`]). Each session owns one append-only log file at
//! `<log_dir>/<name>-<created>-<id prefix>`.

pub mod error;
pub mod log_file;
pub mod record;
pub mod registry;

pub use {
    error::RegistryError,
    log_file::{FsLogWriter, LogWriter},
    record::SessionRecord,
    registry::{RegistryConfig, RegistryHandle},
};
