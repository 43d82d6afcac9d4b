//! Gateway: the HTTP server in front of the session registry.
//!
//! Lifecycle:
//! 1. Create the log directory and bind the listener
//! 2. Spawn the registry worker
//! 3. Serve `/create-session`, `/list-sessions`, `/close-session`,
//!    `/write-session` and `/health`
//! 4. On SIGINT/SIGTERM, drain in-flight requests, then stop the worker
//!
//! Session state lives in `sesh-sessions`; handlers only validate input,
//! call the registry and render the result.

pub mod error;
pub mod server;
pub mod sessions;
pub mod state;
