//! Remote file operations
// (c) 2024 Ross Younger

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;

mod sftp;
pub use sftp::{ConnectOptions, SftpSession};

/// The file operations a copy run needs from the remote side.
///
/// Implementations hold whatever session state the transport requires; the
/// copy engine only ever drives these calls. All paths are slash-separated
/// remote paths as produced by the mapping stage.
#[async_trait]
pub trait RemoteFs {
    /// Does anything exist at this remote path?
    async fn exists(&self, remote: &str) -> Result<bool>;

    /// Creates a directory, and any missing ancestors, if absent.
    /// An existing directory is success.
    async fn make_directory(&self, remote: &str) -> Result<()>;

    /// Uploads one local file to the given remote path, replacing any
    /// existing file there.
    async fn upload_file(&self, local: &Path, remote: &str) -> Result<()>;

    /// Uploads an entire local directory tree below `remote`, returning
    /// the remote root actually written.
    async fn upload_directory(&self, local: &Path, remote: &str) -> Result<String>;

    /// Runs a shell command on the remote, failing on non-zero exit.
    async fn run_command(&self, command: &str) -> Result<()>;

    /// Releases the session. Idempotent; errors are not interesting at
    /// this point and are swallowed.
    async fn close(&self);
}
