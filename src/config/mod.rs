// (c) 2024 Ross Younger
//! # Configuration management
//!
//! skiff obtains run-time configuration from the following sources, in order:
//! 1. Command-line options
//! 2. The user's configuration file (`~/.skiff.toml`)
//! 3. The system-wide configuration file (`/etc/skiff.toml`)
//! 4. Hard-wired defaults
//!
//! Each option may appear in multiple places; the highest-priority source
//! that sets it wins.
//!
//! ## File format
//!
//! Configuration files are TOML. Only the fields of [Configuration] are
//! recognised; everything else in the file is ignored.
//!
//! ### Example
//!
//! ```text
//! port = 2222
//! timeout = 30
//! username = "deploy"
//! identity = "/home/me/.ssh/deploy_ed25519"
//! ```

mod structure;
pub use structure::Configuration;

mod manager;
pub use manager::Manager;

pub(crate) const BASE_CONFIG_FILENAME: &str = "skiff.toml";
