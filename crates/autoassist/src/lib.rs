//! An autonomous assistant that works toward an objective, one turn after
//! another.
//!
//! The crate includes a CLI tool for running the assistant in the terminal.
//! And you can also use it as a library to assemble the same session with
//! your own tools or assistant service.

#![deny(missing_docs)]

#[allow(unused_imports)]
#[macro_use]
extern crate tracing;

mod bootstrap;
mod config;
pub mod maintenance;
mod profile;
mod session;
pub mod tools;

pub use bootstrap::{BootstrapError, bootstrap};
pub use config::{
    AppConfig, ConfigError, DEFAULT_CONFIG_PATH, env_setting,
};
pub use profile::{KNOWLEDGE_STORE_NAME, build_profile};
pub use session::{SessionBuilder, SessionError};

/// Re-exports of [`autoassist_core`] crate.
pub mod core {
    pub use autoassist_core::*;
}
