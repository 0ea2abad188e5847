//! skiff library: glob-selected file transfer over SSH
// (c) 2024 Ross Younger

mod cli;
pub use cli::cli;
/// Run-time configuration
pub mod config;
/// Copy job orchestration
pub mod copy;
/// Remote file operations
pub mod remote;
/// File selection: pattern classification, tree walk, matching
pub mod select;
/// Utilities
pub mod util;
