// Utility Functions
// Job file discovery from the current directory or repository root

use std::path::{Path, PathBuf};

/// File name looked up when no job file is given
pub const JOB_FILE_NAME: &str = "chartpub.yml";

/// Find the root of a git repository by walking up from the given starting path.
///
/// Returns `None` if no ancestor holds a `.git` entry.
pub fn find_repo_root(start: &Path) -> Option<PathBuf> {
    let start = start.canonicalize().ok()?;
    start
        .ancestors()
        .find(|ancestor| ancestor.join(".git").exists())
        .map(Path::to_path_buf)
}

/// Locate `chartpub.yml` in `start`, falling back to the repository root
pub fn find_job_file(start: &Path) -> Option<PathBuf> {
    let local = start.join(JOB_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }
    let root = find_repo_root(start)?.join(JOB_FILE_NAME);
    root.is_file().then_some(root)
}
