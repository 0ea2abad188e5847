//! Job specifications for a copy run
// (c) 2024 Ross Younger

use std::path::PathBuf;
use std::str::FromStr;

/// Number of files dispatched concurrently in one upload batch.
///
/// Not exposed on the command line; tests construct jobs with smaller
/// values to exercise the batching behaviour.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// The remote destination specified by the user: `[user@]host[:folder]`.
///
/// The host may be a hostname, an IPv4 address, or a bracketed raw IPv6
/// address (`[1:2:3::4]:folder`). When no folder is given the remote
/// working directory (`./`) is used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteSpec {
    /// Login name on the remote, if given.
    pub user: Option<String>,
    /// The remote host.
    pub host: String,
    /// Target folder on the remote; empty means unset.
    pub folder: String,
}

impl FromStr for RemoteSpec {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // user@ applies only before any colon, so a folder may contain @.
        let at = s.find('@');
        let (user, rest) = match at {
            Some(i) if s.find(':').map_or(true, |c| i < c) => {
                (Some(s[..i].to_owned()), &s[i + 1..])
            }
            _ => (None, s),
        };
        let (host, folder) = if rest.starts_with('[') {
            // Raw IPv6 address [1:2:3::4]:folder
            match rest.split_once("]:") {
                // lose the leading bracket as well so it can be looked up as if a hostname
                Some((hostish, folder)) => (hostish[1..].to_owned(), folder.to_owned()),
                None => (rest.trim_start_matches('[').trim_end_matches(']').to_owned(), String::new()),
            }
        } else {
            match rest.split_once(':') {
                Some((host, folder)) => (host.to_owned(), folder.to_owned()),
                None => (rest.to_owned(), String::new()),
            }
        };
        anyhow::ensure!(!host.is_empty(), "destination has no host part");
        Ok(Self {
            user: user.filter(|u| !u.is_empty()),
            host,
            folder,
        })
    }
}

/// Policy for a run whose patterns match no files at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum OnEmpty {
    /// Log a warning and finish successfully having copied nothing.
    #[default]
    Warn,
    /// Treat an empty selection as a run failure.
    Fail,
}

/// Everything a single copy run needs to know.
///
/// Built once per invocation and immutable thereafter.
#[derive(Debug, Clone)]
pub struct CopyJob {
    /// Local directory the patterns are anchored to.
    pub source_root: PathBuf,
    /// Raw glob patterns; a leading `!` excludes.
    pub patterns: Vec<String>,
    /// Normalized target folder on the remote.
    pub target_folder: String,
    /// Discard directory structure, placing every file directly in the
    /// target folder by name.
    pub flatten: bool,
    /// Replace files that already exist on the remote. When off, an
    /// existing destination fails that file's transfer.
    pub overwrite: bool,
    /// Empty the target folder before copying anything.
    pub clean_target: bool,
    /// What to do when nothing matches.
    pub on_empty: OnEmpty,
    /// Files per concurrent upload batch.
    pub batch_size: usize,
}

/// Per-file outcome of the upload phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The file reached the remote.
    Uploaded {
        /// Payload size, for the summary.
        bytes: u64,
    },
    /// Destination already exists and overwriting is disallowed.
    SkippedExists,
    /// The transfer failed.
    Failed(String),
}

impl TransferOutcome {
    /// The failure message, if this outcome fails its file.
    ///
    /// A skipped-exists outcome counts as a failure: the file the user
    /// asked for was not copied.
    #[must_use]
    pub fn failure(&self) -> Option<&str> {
        match self {
            TransferOutcome::Uploaded { .. } => None,
            TransferOutcome::SkippedExists => Some("target file already exists"),
            TransferOutcome::Failed(reason) => Some(reason),
        }
    }
}

/// Terminal verdict of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopySummary {
    /// Individually selected files were uploaded.
    Files {
        /// How many files were copied.
        copied: usize,
        /// Total payload bytes.
        bytes: u64,
    },
    /// The whole source tree was handed to the transport in one call.
    Tree {
        /// The remote root as echoed back by the transport.
        remote_root: String,
    },
}
