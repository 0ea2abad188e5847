//! General utility code that didn't fit anywhere else
// (c) 2024 Ross Younger

mod tracing;
pub use tracing::setup as setup_tracing;

/// Creates a temporary directory tree holding the given relative file
/// paths, each one byte long. Parent directories are created as needed.
#[cfg(test)]
pub(crate) fn make_test_tree(files: &[&str]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for file in files {
        let path = dir.path().join(file);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("unable to create test directory");
        }
        std::fs::write(&path, b"x").expect("unable to write test file");
    }
    dir
}
