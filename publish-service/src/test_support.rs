// Test Support
// Scratch git repositories: a bare remote with a publishing branch plus a workspace

use crate::git::GitRepo;

use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

pub const BRANCH: &str = "gh-pages";

/// Bare remote with a seeded `gh-pages`, a second clone standing in for
/// other writers, and an empty workspace pointing at the remote.
pub struct GitFixture {
    _temp: TempDir,
    remote: PathBuf,
    seed: PathBuf,
    workspace: PathBuf,
}

impl GitFixture {
    pub fn new(files: &[(&str, &str)]) -> Self {
        let temp = tempfile::tempdir().unwrap();
        let remote = temp.path().join("remote.git");
        let seed = temp.path().join("seed");
        let workspace = temp.path().join("workspace");

        git(temp.path(), &["init", "--quiet", "--bare", "remote.git"]);

        std::fs::create_dir(&seed).unwrap();
        git(&seed, &["init", "--quiet"]);
        git(&seed, &["checkout", "--quiet", "-b", BRANCH]);
        for (name, content) in files {
            std::fs::write(seed.join(name), content).unwrap();
        }
        std::fs::write(seed.join("index.html"), "<html>site</html>").unwrap();
        git(&seed, &["add", "--all"]);
        commit(&seed, "Initial site");
        git(&seed, &["remote", "add", "origin", path_str(&remote)]);
        git(&seed, &["push", "--quiet", "origin", BRANCH]);

        std::fs::create_dir(&workspace).unwrap();
        git(&workspace, &["init", "--quiet"]);
        git(&workspace, &["remote", "add", "origin", path_str(&remote)]);

        Self {
            _temp: temp,
            remote,
            seed,
            workspace,
        }
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn repo(&self) -> GitRepo {
        GitRepo::new(&self.workspace, "origin", BRANCH)
    }

    pub fn write(&self, name: &str, content: &str) {
        std::fs::write(self.workspace.join(name), content).unwrap();
    }

    pub fn remote_tip(&self) -> String {
        self.remote_git(&["rev-parse", BRANCH])
    }

    pub fn remote_commit_count(&self) -> usize {
        self.remote_git(&["rev-list", "--count", BRANCH])
            .parse()
            .unwrap()
    }

    pub fn remote_author(&self) -> String {
        self.remote_git(&["log", "-1", "--format=%an <%ae>", BRANCH])
    }

    pub fn remote_subject(&self) -> String {
        self.remote_git(&["log", "-1", "--format=%s", BRANCH])
    }

    /// Files touched by the commit at the remote tip
    pub fn remote_tip_files(&self) -> Vec<String> {
        self.remote_git(&["diff-tree", "--no-commit-id", "--name-only", "-r", BRANCH])
            .lines()
            .map(String::from)
            .collect()
    }

    pub fn remote_file(&self, name: &str) -> String {
        self.remote_git(&["show", &format!("{}:{}", BRANCH, name)])
    }

    /// Commit and push from the second clone, moving the remote tip
    pub fn push_concurrent_commit(&self, name: &str, content: &str) {
        git(&self.seed, &["fetch", "--quiet", "origin"]);
        git(&self.seed, &["reset", "--quiet", "--hard", "origin/gh-pages"]);
        std::fs::write(self.seed.join(name), content).unwrap();
        git(&self.seed, &["add", "--", name]);
        commit(&self.seed, "Concurrent update");
        git(&self.seed, &["push", "--quiet", "origin", "HEAD:gh-pages"]);
    }

    /// Shell snippet doing `push_concurrent_commit` from inside a generator
    pub fn concurrent_push_script(&self, name: &str) -> String {
        format!(
            "(cd '{seed}' && git fetch --quiet origin && git reset --quiet --hard origin/gh-pages \
             && echo concurrent > '{name}' && git add -- '{name}' \
             && git -c user.name=other -c user.email=other@example.com -c commit.gpgsign=false \
             commit --quiet -m 'Concurrent update' && git push --quiet origin HEAD:gh-pages)",
            seed = path_str(&self.seed),
            name = name,
        )
    }

    fn remote_git(&self, args: &[&str]) -> String {
        let mut full = vec!["--git-dir", path_str(&self.remote)];
        full.extend_from_slice(args);
        git(&self.remote, &full)
    }
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

fn commit(dir: &Path, message: &str) {
    git(
        dir,
        &[
            "-c",
            "user.name=seed",
            "-c",
            "user.email=seed@example.com",
            "-c",
            "commit.gpgsign=false",
            "commit",
            "--quiet",
            "-m",
            message,
        ],
    );
}

fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}
