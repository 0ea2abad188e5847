//! Local-to-remote path mapping and directory planning
// (c) 2024 Ross Younger

use std::path::{Path, PathBuf};

/// A selected local file and the remote path it will be written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedFile {
    pub local: PathBuf,
    pub remote: String,
}

/// Rewrites the user-supplied target folder into the form the remote side
/// accepts: unset means `./`, and a `~/`-rooted path becomes `./`-rooted
/// since home-relative paths are not supported remotely (the SFTP working
/// directory is the home directory anyway).
#[must_use]
pub fn normalize_target(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() || raw == "~" {
        return "./".to_owned();
    }
    match raw.strip_prefix("~/") {
        Some(rest) => format!("./{rest}"),
        None => raw.to_owned(),
    }
}

/// Maps one selected local file to its remote destination path.
///
/// The remote side is conventionally slash-separated whatever the local
/// platform, so the result uses forward slashes throughout. A result that
/// is neither absolute nor a UNC share path is prefixed with `./`.
///
/// This is a pure string transform; a `local` that does not actually live
/// under `root` produces a nonsensical (but harmless) result.
#[must_use]
pub fn map_remote_path(local: &Path, root: &Path, target: &str, flatten: bool) -> String {
    let relative = if flatten {
        local
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    } else {
        let local = local.to_string_lossy();
        let root_len = root.to_string_lossy().len();
        let mut rest = local.get(root_len..).unwrap_or_default().to_owned();
        if rest.starts_with(['/', '\\']) {
            rest.remove(0);
        }
        rest
    };

    let unc = target.starts_with("\\\\");
    let target = target.trim_end_matches(['/', '\\']);
    let target = target.strip_prefix("./").unwrap_or(target);
    let joined = if target.is_empty() || target == "." {
        relative
    } else if relative.is_empty() {
        target.to_owned()
    } else {
        format!("{target}/{relative}")
    };

    let remote = joined.replace('\\', "/");
    if unc || remote.starts_with('/') {
        remote
    } else {
        format!("./{remote}")
    }
}

fn is_path_prefix(ancestor: &str, path: &str) -> bool {
    path == ancestor
        || (path.starts_with(ancestor)
            && (ancestor.ends_with('/')
                || path.as_bytes().get(ancestor.len()) == Some(&b'/')))
}

/// Derives the directories to create for a set of mapped remote paths.
///
/// Callers sort the paths lexicographically first so that shallower
/// directories are considered before their descendants. Each path
/// contributes its directory portion, skipped when an already-planned
/// directory is a path-prefix ancestor of it; the upload step ensures any
/// remaining intermediate directories, so planned entries only need to
/// cover each distinct subtree once.
#[must_use]
pub fn plan_directories<'a>(remote_paths: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut directories: Vec<String> = Vec::new();
    for path in remote_paths {
        let parent = match path.rsplit_once('/') {
            Some(("", _)) => "/",
            Some((parent, _)) => parent,
            None => continue,
        };
        if directories.iter().any(|d| is_path_prefix(d, parent)) {
            continue;
        }
        directories.push(parent.to_owned());
    }
    directories
}
