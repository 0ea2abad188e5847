//! Copy run event loop
// (c) 2024 Ross Younger

use std::path::Path;

use anyhow::{Context as _, Result};
use futures_util::future::join_all;
use indicatif::{MultiProgress, ProgressBar};
use tracing::{debug, info, warn};

use crate::remote::RemoteFs;
use crate::select::{self, classify, enumerate_files, select_files};

use super::job::{CopyJob, CopySummary, OnEmpty, TransferOutcome};
use super::mapping::{map_remote_path, plan_directories, MappedFile};

/// Runs one copy job against an open remote session.
///
/// Phases: validate the source root, select files, map them to remote
/// paths, create the needed directories (sequentially), then upload in
/// concurrent batches. The session is borrowed; acquiring and releasing
/// it belongs to the caller, which must close it on every exit path.
pub async fn run<R: RemoteFs + Sync + ?Sized>(
    remote: &R,
    job: &CopyJob,
    display: &MultiProgress,
    quiet: bool,
) -> Result<CopySummary> {
    let root = &job.source_root;
    let meta = tokio::fs::metadata(root)
        .await
        .with_context(|| format!("source path {} not found", root.display()))?;
    anyhow::ensure!(
        meta.is_dir(),
        "source path {} is not a directory",
        root.display()
    );

    if job.clean_target {
        info!("cleaning target folder {}", job.target_folder);
        remote
            .run_command(&format!(r#"rm -rf "{}"/*"#, job.target_folder))
            .await
            .with_context(|| format!("cleaning target folder {}", job.target_folder))?;
    }

    // A lone "**" selects the whole tree; there is nothing to filter, so
    // hand the entire directory to the transport in one operation.
    if select::is_match_everything(&job.patterns) {
        debug!("single wildcard pattern; uploading the whole source tree");
        let remote_root = remote
            .upload_directory(root, &job.target_folder)
            .await
            .with_context(|| format!("uploading {} as a tree", root.display()))?;
        return Ok(CopySummary::Tree { remote_root });
    }

    let patterns = classify(&job.patterns, root);
    let listing = enumerate_files(root)?;
    let selected = select_files(&patterns, &listing)?;
    if selected.is_empty() {
        match job.on_empty {
            OnEmpty::Fail => anyhow::bail!(
                "nothing under {} matched the given patterns",
                root.display()
            ),
            OnEmpty::Warn => {
                warn!(
                    "nothing under {} matched the given patterns; nothing to copy",
                    root.display()
                );
                return Ok(CopySummary::Files {
                    copied: 0,
                    bytes: 0,
                });
            }
        }
    }
    debug!("selected {} file(s)", selected.len());

    let mut files: Vec<MappedFile> = selected
        .into_iter()
        .map(|local| {
            let remote = map_remote_path(&local, root, &job.target_folder, job.flatten);
            MappedFile { local, remote }
        })
        .collect();
    files.sort_by(|a, b| a.remote.cmp(&b.remote));

    let directories = plan_directories(files.iter().map(|f| f.remote.as_str()));
    for directory in &directories {
        debug!("creating remote directory {directory}");
        remote
            .make_directory(directory)
            .await
            .with_context(|| format!("creating remote directory {directory}"))?;
    }

    upload_in_batches(remote, job, &files, display, quiet).await
}

async fn upload_in_batches<R: RemoteFs + Sync + ?Sized>(
    remote: &R,
    job: &CopyJob,
    files: &[MappedFile],
    display: &MultiProgress,
    quiet: bool,
) -> Result<CopySummary> {
    let progress = if quiet {
        ProgressBar::hidden()
    } else {
        display.add(ProgressBar::new(files.len() as u64))
    };

    let mut copied = 0usize;
    let mut bytes = 0u64;
    for batch in files.chunks(job.batch_size.max(1)) {
        let outcomes = join_all(
            batch
                .iter()
                .map(|file| transfer_one(remote, file, job.overwrite)),
        )
        .await;

        let mut failures = 0usize;
        for (file, outcome) in batch.iter().zip(outcomes) {
            progress.inc(1);
            if let Some(reason) = outcome.failure() {
                failures += 1;
                tracing::error!("{}: {reason}", file.remote);
            } else if let TransferOutcome::Uploaded { bytes: n } = outcome {
                copied += 1;
                bytes += n;
            }
        }
        // A settled batch with any failure stops the run; later batches
        // never start, but every file in this batch got its chance.
        if failures > 0 {
            progress.abandon();
            anyhow::bail!("{failures} file(s) failed to copy");
        }
    }
    progress.finish_and_clear();
    Ok(CopySummary::Files { copied, bytes })
}

/// Transfers a single file, reporting the outcome as data. Nothing in
/// here propagates an error: a failure must not disturb the other
/// transfers in flight in the same batch.
async fn transfer_one<R: RemoteFs + Sync + ?Sized>(
    remote: &R,
    file: &MappedFile,
    overwrite: bool,
) -> TransferOutcome {
    if !overwrite {
        match remote.exists(&file.remote).await {
            Ok(true) => return TransferOutcome::SkippedExists,
            Ok(false) => (),
            Err(e) => return TransferOutcome::Failed(format!("checking destination: {e:#}")),
        }
    }
    let size = match tokio::fs::metadata(&file.local).await {
        Ok(meta) => meta.len(),
        Err(e) => {
            return TransferOutcome::Failed(format!("reading {}: {e}", file.local.display()))
        }
    };
    match remote.upload_file(&file.local, &file.remote).await {
        Ok(()) => TransferOutcome::Uploaded { bytes: size },
        Err(e) => TransferOutcome::Failed(format!("{e:#}")),
    }
}

#[cfg(test)]
mod test {
    use super::run;
    use crate::copy::job::{CopyJob, CopySummary, OnEmpty, DEFAULT_BATCH_SIZE};
    use crate::remote::RemoteFs;
    use crate::util::make_test_tree;

    use anyhow::Result;
    use async_trait::async_trait;
    use indicatif::MultiProgress;
    use std::collections::HashSet;
    use std::path::Path;
    use std::sync::Mutex;

    /// Scripted stand-in for the SFTP session, recording every call.
    #[derive(Default)]
    struct FakeRemote {
        ops: Mutex<Vec<String>>,
        existing: Mutex<HashSet<String>>,
        fail_uploads: Mutex<HashSet<String>>,
    }

    impl FakeRemote {
        fn log(&self, op: String) {
            self.ops.lock().unwrap().push(op);
        }

        fn ops(&self) -> Vec<String> {
            self.ops.lock().unwrap().clone()
        }

        fn pre_existing(self, paths: &[&str]) -> Self {
            self.existing
                .lock()
                .unwrap()
                .extend(paths.iter().map(ToString::to_string));
            self
        }

        fn failing(self, paths: &[&str]) -> Self {
            self.fail_uploads
                .lock()
                .unwrap()
                .extend(paths.iter().map(ToString::to_string));
            self
        }
    }

    #[async_trait]
    impl RemoteFs for FakeRemote {
        async fn exists(&self, remote: &str) -> Result<bool> {
            self.log(format!("exists {remote}"));
            Ok(self.existing.lock().unwrap().contains(remote))
        }

        async fn make_directory(&self, remote: &str) -> Result<()> {
            self.log(format!("mkdir {remote}"));
            Ok(())
        }

        async fn upload_file(&self, _local: &Path, remote: &str) -> Result<()> {
            self.log(format!("upload {remote}"));
            if self.fail_uploads.lock().unwrap().contains(remote) {
                anyhow::bail!("injected failure");
            }
            Ok(())
        }

        async fn upload_directory(&self, _local: &Path, remote: &str) -> Result<String> {
            self.log(format!("tree {remote}"));
            Ok(remote.to_owned())
        }

        async fn run_command(&self, command: &str) -> Result<()> {
            self.log(format!("exec {command}"));
            Ok(())
        }

        async fn close(&self) {
            self.log("close".to_owned());
        }
    }

    fn job(root: &Path, patterns: &[&str]) -> CopyJob {
        CopyJob {
            source_root: root.to_owned(),
            patterns: patterns.iter().map(ToString::to_string).collect(),
            target_folder: "dest".to_owned(),
            flatten: false,
            overwrite: true,
            clean_target: false,
            on_empty: OnEmpty::Warn,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    async fn run_job(remote: &FakeRemote, job: &CopyJob) -> Result<CopySummary> {
        run(remote, job, &MultiProgress::new(), true).await
    }

    #[tokio::test]
    async fn directories_before_uploads() {
        let dir = make_test_tree(&["a.txt", "sub/b.txt"]);
        let remote = FakeRemote::default();
        let summary = run_job(&remote, &job(dir.path(), &["**/*.txt"])).await.unwrap();
        assert_eq!(summary, CopySummary::Files { copied: 2, bytes: 2 });

        let ops = remote.ops();
        let last_mkdir = ops.iter().rposition(|o| o.starts_with("mkdir")).unwrap();
        let first_upload = ops.iter().position(|o| o.starts_with("upload")).unwrap();
        assert!(last_mkdir < first_upload, "ops: {ops:?}");
        assert!(ops.contains(&"upload ./dest/a.txt".to_owned()));
        assert!(ops.contains(&"upload ./dest/sub/b.txt".to_owned()));
    }

    #[tokio::test]
    async fn failure_stops_later_batches_but_not_siblings() {
        let names: Vec<String> = (0..25).map(|i| format!("f{i:02}.dat")).collect();
        let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let dir = make_test_tree(&name_refs);

        // Sorted remote order puts f12 in the second batch of ten.
        let remote = FakeRemote::default().failing(&["./dest/f12.dat"]);
        let mut j = job(dir.path(), &["*.dat"]);
        j.batch_size = 10;
        let error = run_job(&remote, &j).await.unwrap_err();
        assert_eq!(error.to_string(), "1 file(s) failed to copy");

        let uploads: Vec<String> = remote
            .ops()
            .into_iter()
            .filter(|o| o.starts_with("upload"))
            .collect();
        // Both full batches were dispatched, including f12's siblings;
        // the third batch never started.
        assert_eq!(uploads.len(), 20);
        assert!(uploads.contains(&"upload ./dest/f19.dat".to_owned()));
        assert!(!uploads.contains(&"upload ./dest/f20.dat".to_owned()));
    }

    #[tokio::test]
    async fn existing_destination_without_overwrite_fails_that_file() {
        let dir = make_test_tree(&["a.txt", "b.txt"]);
        let remote = FakeRemote::default().pre_existing(&["./dest/a.txt"]);
        let mut j = job(dir.path(), &["*.txt"]);
        j.overwrite = false;
        let error = run_job(&remote, &j).await.unwrap_err();
        assert_eq!(error.to_string(), "1 file(s) failed to copy");

        let ops = remote.ops();
        assert!(!ops.contains(&"upload ./dest/a.txt".to_owned()));
        assert!(ops.contains(&"upload ./dest/b.txt".to_owned()));
    }

    #[tokio::test]
    async fn overwrite_skips_the_existence_check() {
        let dir = make_test_tree(&["a.txt"]);
        let remote = FakeRemote::default().pre_existing(&["./dest/a.txt"]);
        let summary = run_job(&remote, &job(dir.path(), &["*.txt"])).await.unwrap();
        assert_eq!(summary, CopySummary::Files { copied: 1, bytes: 1 });
        assert!(remote.ops().iter().all(|o| !o.starts_with("exists")));
    }

    #[tokio::test]
    async fn empty_selection_warns_by_default() {
        let dir = make_test_tree(&["a.txt"]);
        let remote = FakeRemote::default();
        let summary = run_job(&remote, &job(dir.path(), &["*.zip"])).await.unwrap();
        assert_eq!(summary, CopySummary::Files { copied: 0, bytes: 0 });
        assert!(remote.ops().is_empty());
    }

    #[tokio::test]
    async fn empty_selection_can_be_fatal() {
        let dir = make_test_tree(&["a.txt"]);
        let remote = FakeRemote::default();
        let mut j = job(dir.path(), &["*.zip"]);
        j.on_empty = OnEmpty::Fail;
        assert!(run_job(&remote, &j).await.is_err());
    }

    #[tokio::test]
    async fn single_wildcard_delegates_to_tree_upload() {
        let dir = make_test_tree(&["a.txt", "sub/b.txt"]);
        let remote = FakeRemote::default();
        let summary = run_job(&remote, &job(dir.path(), &["**"])).await.unwrap();
        assert_eq!(
            summary,
            CopySummary::Tree {
                remote_root: "dest".to_owned()
            }
        );
        assert_eq!(remote.ops(), ["tree dest"]);
    }

    #[tokio::test]
    async fn clean_target_runs_before_anything_else() {
        let dir = make_test_tree(&["a.txt"]);
        let remote = FakeRemote::default();
        let mut j = job(dir.path(), &["*.txt"]);
        j.clean_target = true;
        run_job(&remote, &j).await.unwrap();
        let ops = remote.ops();
        assert_eq!(ops[0], r#"exec rm -rf "dest"/*"#);
    }

    #[tokio::test]
    async fn missing_source_root_fails_fast() {
        let dir = make_test_tree(&[]);
        let remote = FakeRemote::default();
        let j = job(&dir.path().join("nope"), &["**/*"]);
        assert!(run_job(&remote, &j).await.is_err());
        assert!(remote.ops().is_empty());
    }

    #[tokio::test]
    async fn flatten_drops_the_subtree() {
        let dir = make_test_tree(&["deep/nested/a.txt"]);
        let remote = FakeRemote::default();
        let mut j = job(dir.path(), &["**/*.txt"]);
        j.flatten = true;
        run_job(&remote, &j).await.unwrap();
        assert!(remote.ops().contains(&"upload ./dest/a.txt".to_owned()));
    }
}
