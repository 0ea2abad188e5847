//! SFTP-backed remote session over libssh2
// (c) 2024 Ross Younger

use std::io::{Read as _, Write as _};
use std::net::{TcpStream, ToSocketAddrs as _};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use ssh2::{DisconnectCode, Session, Sftp};
use tracing::{debug, trace, warn};
use walkdir::WalkDir;

use super::RemoteFs;

const COPY_BUFFER_SIZE: usize = 1024 * 1024;

/// Connection parameters for [`SftpSession::connect`].
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Remote hostname or address.
    pub host: String,
    /// SSH port.
    pub port: u16,
    /// Login name.
    pub username: String,
    /// Password, if password authentication is wanted.
    pub password: Option<String>,
    /// Explicit private key file. When unset, the ssh agent and the
    /// standard key files in `~/.ssh` are tried.
    pub identity: Option<PathBuf>,
    /// Socket timeout applied to connect, reads and writes.
    pub timeout: Duration,
}

/// An authenticated SSH session with an open SFTP channel.
///
/// libssh2 is a blocking library; every operation hops onto the blocking
/// thread pool and the session serialises concurrent calls internally.
/// The session is released at most once, by [`RemoteFs::close`] or as a
/// last resort when dropped.
pub struct SftpSession {
    inner: Arc<Inner>,
}

struct Inner {
    session: Session,
    sftp: Sftp,
    host: String,
    closed: AtomicBool,
}

impl SftpSession {
    /// Establishes a TCP connection, performs the SSH handshake,
    /// authenticates, and opens the SFTP channel.
    pub async fn connect(options: ConnectOptions) -> Result<Self> {
        let inner = tokio::task::spawn_blocking(move || Inner::connect(&options)).await??;
        Ok(Self {
            inner: Arc::new(inner),
        })
    }
}

fn authenticate(session: &Session, options: &ConnectOptions) -> Result<()> {
    if let Some(password) = &options.password {
        if let Err(e) = session.userauth_password(&options.username, password) {
            warn!("password authentication failed: {e}");
        }
    }
    if !session.authenticated() {
        if let Some(identity) = &options.identity {
            session
                .userauth_pubkey_file(&options.username, None, identity, None)
                .with_context(|| format!("authenticating with key {}", identity.display()))?;
        }
    }
    if !session.authenticated() {
        if let Err(e) = session.userauth_agent(&options.username) {
            trace!("agent authentication failed: {e}");
        }
    }
    if !session.authenticated() {
        if let Some(home) = dirs::home_dir() {
            for name in ["id_ed25519", "id_rsa", "id_ecdsa"] {
                let key = home.join(".ssh").join(name);
                if key.exists()
                    && session
                        .userauth_pubkey_file(&options.username, None, &key, None)
                        .is_ok()
                {
                    debug!("authenticated with {}", key.display());
                    break;
                }
            }
        }
    }
    anyhow::ensure!(
        session.authenticated(),
        "SSH authentication failed for {}@{}",
        options.username,
        options.host
    );
    Ok(())
}

impl Inner {
    fn connect(options: &ConnectOptions) -> Result<Self> {
        let address = format!("{}:{}", options.host, options.port);
        let socket = address
            .to_socket_addrs()
            .with_context(|| format!("resolving {address}"))?
            .next()
            .with_context(|| format!("no address found for {address}"))?;
        let tcp = TcpStream::connect_timeout(&socket, options.timeout)
            .with_context(|| format!("connecting to {address}"))?;
        tcp.set_read_timeout(Some(options.timeout))?;
        tcp.set_write_timeout(Some(options.timeout))?;

        let mut session = Session::new().context("creating SSH session")?;
        session.set_tcp_stream(tcp);
        session
            .handshake()
            .with_context(|| format!("SSH handshake with {address}"))?;
        authenticate(&session, options)?;
        let sftp = session.sftp().context("opening SFTP channel")?;
        debug!("connected to {address}");
        Ok(Self {
            session,
            sftp,
            host: options.host.clone(),
            closed: AtomicBool::new(false),
        })
    }

    fn exists(&self, remote: &str) -> bool {
        self.sftp.stat(Path::new(remote)).is_ok()
    }

    /// Creates each missing segment of `remote` in turn, so the call works
    /// like `mkdir -p` and an existing directory is not an error.
    fn make_directory(&self, remote: &str) -> Result<()> {
        let mut accumulated = String::new();
        for part in remote.split('/') {
            if part.is_empty() {
                if accumulated.is_empty() {
                    accumulated.push('/');
                }
                continue;
            }
            if !accumulated.is_empty() && !accumulated.ends_with('/') {
                accumulated.push('/');
            }
            accumulated.push_str(part);
            if part == "." {
                continue;
            }
            if self.sftp.stat(Path::new(&accumulated)).is_err() {
                if let Err(e) = self.sftp.mkdir(Path::new(&accumulated), 0o755) {
                    // A concurrent upload may have won the race; only
                    // report if the directory genuinely is not there.
                    if self.sftp.stat(Path::new(&accumulated)).is_err() {
                        return Err(e)
                            .with_context(|| format!("creating remote directory {accumulated}"));
                    }
                }
            }
        }
        Ok(())
    }

    fn upload_file(&self, local: &Path, remote: &str) -> Result<()> {
        if let Some((parent, _)) = remote.rsplit_once('/') {
            if !parent.is_empty() {
                self.make_directory(parent)?;
            }
        }
        let mut source = std::fs::File::open(local)
            .with_context(|| format!("opening {}", local.display()))?;
        let mut destination = self
            .sftp
            .create(Path::new(remote))
            .with_context(|| format!("creating remote file {remote}"))?;
        let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
        loop {
            let n = source
                .read(&mut buffer)
                .with_context(|| format!("reading {}", local.display()))?;
            if n == 0 {
                break;
            }
            destination
                .write_all(&buffer[..n])
                .with_context(|| format!("writing {remote}"))?;
        }
        trace!("uploaded {} -> {remote}", local.display());
        Ok(())
    }

    fn upload_directory(&self, local: &Path, remote: &str) -> Result<String> {
        self.make_directory(remote)?;
        for entry in WalkDir::new(local).sort_by_file_name() {
            let entry = entry.with_context(|| format!("walking {}", local.display()))?;
            if entry.file_type().is_dir() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(local)
                .expect("walked entries live under their root");
            let destination = format!(
                "{}/{}",
                remote.trim_end_matches('/'),
                relative.to_string_lossy().replace('\\', "/")
            );
            self.upload_file(entry.path(), &destination)?;
        }
        Ok(remote.to_owned())
    }

    fn run_command(&self, command: &str) -> Result<()> {
        let mut channel = self
            .session
            .channel_session()
            .context("opening command channel")?;
        channel
            .exec(command)
            .with_context(|| format!("running `{command}`"))?;
        let mut output = String::new();
        let _ = channel.read_to_string(&mut output);
        let _ = channel.wait_close();
        let status = channel.exit_status().context("reading exit status")?;
        anyhow::ensure!(
            status == 0,
            "`{command}` exited with status {status}: {}",
            output.trim()
        );
        Ok(())
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self
            .session
            .disconnect(Some(DisconnectCode::ByApplication), "finished", None);
        trace!("disconnected from {}", self.host);
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.close();
    }
}

#[async_trait]
impl RemoteFs for SftpSession {
    async fn exists(&self, remote: &str) -> Result<bool> {
        let inner = self.inner.clone();
        let remote = remote.to_owned();
        Ok(tokio::task::spawn_blocking(move || inner.exists(&remote)).await?)
    }

    async fn make_directory(&self, remote: &str) -> Result<()> {
        let inner = self.inner.clone();
        let remote = remote.to_owned();
        tokio::task::spawn_blocking(move || inner.make_directory(&remote)).await?
    }

    async fn upload_file(&self, local: &Path, remote: &str) -> Result<()> {
        let inner = self.inner.clone();
        let local = local.to_owned();
        let remote = remote.to_owned();
        tokio::task::spawn_blocking(move || inner.upload_file(&local, &remote)).await?
    }

    async fn upload_directory(&self, local: &Path, remote: &str) -> Result<String> {
        let inner = self.inner.clone();
        let local = local.to_owned();
        let remote = remote.to_owned();
        tokio::task::spawn_blocking(move || inner.upload_directory(&local, &remote)).await?
    }

    async fn run_command(&self, command: &str) -> Result<()> {
        let inner = self.inner.clone();
        let command = command.to_owned();
        tokio::task::spawn_blocking(move || inner.run_command(&command)).await?
    }

    async fn close(&self) {
        let inner = self.inner.clone();
        let _ = tokio::task::spawn_blocking(move || inner.close()).await;
    }
}
