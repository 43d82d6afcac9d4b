//! Configuration loading for sesh.
//!
//! Config files: `sesh.toml`, `sesh.yaml`, or `sesh.json`, searched in the
//! working directory and then `~/.config/sesh/`. `${VAR}` placeholders are
//! expanded from the environment before parsing.

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    loader::{discover_and_load, load_config, set_config_dir},
    schema::{SeshConfig, ServerConfig, SessionsConfig},
};
