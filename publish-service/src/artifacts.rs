// Artifact Selection
// Glob matching for generated files, e.g. `0050_*.html`

use crate::{ServiceError, ServiceResult};

use serde::Serialize;
use std::path::{Component, Path, PathBuf};

/// A generated file the publisher may stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    /// Path relative to the workspace, `/` separated
    pub name: String,
    #[serde(skip)]
    pub path: PathBuf,
    pub size: u64,
}

/// Validated artifact glob, relative to the workspace
#[derive(Debug, Clone)]
pub struct ArtifactPattern {
    raw: String,
    pattern: glob::Pattern,
}

impl ArtifactPattern {
    pub fn new(raw: &str) -> ServiceResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ServiceError::InvalidInput(
                "Artifact pattern must not be empty".to_string(),
            ));
        }

        let escapes = Path::new(raw)
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(ServiceError::InvalidInput(format!(
                "Artifact pattern '{}' must stay inside the workspace",
                raw
            )));
        }

        let pattern = glob::Pattern::new(raw).map_err(|e| {
            ServiceError::InvalidInput(format!("Invalid artifact pattern '{}': {}", raw, e))
        })?;

        Ok(Self {
            raw: raw.to_string(),
            pattern,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Match a workspace-relative path
    pub fn matches(&self, relative: &str) -> bool {
        self.pattern.matches_with(relative, match_options())
    }

    /// List the files in `workspace` matching the pattern, sorted by name
    pub fn collect(&self, workspace: &Path) -> ServiceResult<Vec<Artifact>> {
        let root = glob::Pattern::escape(&workspace.to_string_lossy());
        let full = format!("{}/{}", root.trim_end_matches('/'), self.raw);

        let paths = glob::glob_with(&full, match_options()).map_err(|e| {
            ServiceError::InvalidInput(format!("Invalid artifact pattern '{}': {}", self.raw, e))
        })?;

        let mut artifacts = Vec::new();
        for entry in paths {
            let path = entry.map_err(|e| ServiceError::Io(e.into_error()))?;
            let metadata = std::fs::metadata(&path)?;
            if !metadata.is_file() {
                continue;
            }
            let name = relative_name(workspace, &path);
            if !self.matches(&name) {
                continue;
            }
            artifacts.push(Artifact {
                name,
                path,
                size: metadata.len(),
            });
        }

        artifacts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(artifacts)
    }
}

fn match_options() -> glob::MatchOptions {
    glob::MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: true,
    }
}

fn relative_name(workspace: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(workspace).unwrap_or(path);
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    #[test]
    fn test_pattern_matches_ticker_files() {
        let pattern = ArtifactPattern::new("0050_*.html").unwrap();

        assert!(pattern.matches("0050_charts.html"));
        assert!(pattern.matches("0050_volume.html"));
        assert!(!pattern.matches("0051_charts.html"));
        assert!(!pattern.matches("0050_charts.htm"));
        assert!(!pattern.matches("sub/0050_charts.html"));
        assert!(!pattern.matches("index.html"));
    }

    #[test]
    fn test_pattern_rejects_escapes() {
        assert!(ArtifactPattern::new("../0050_*.html").is_err());
        assert!(ArtifactPattern::new("/tmp/0050_*.html").is_err());
        assert!(ArtifactPattern::new("charts/../../x.html").is_err());
        assert!(ArtifactPattern::new("").is_err());
        assert!(ArtifactPattern::new("charts/0050_*.html").is_ok());
    }

    #[test]
    fn test_collect_only_matching_files() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        fs::write(root.join("TICKER_chart1.html"), "<html>1</html>").unwrap();
        fs::write(root.join("TICKER_chart2.html"), "<html>22</html>").unwrap();
        fs::write(root.join("index.html"), "<html></html>").unwrap();
        fs::write(root.join("notes.txt"), "scratch").unwrap();
        fs::create_dir(root.join("TICKER_dir.html")).unwrap();

        let pattern = ArtifactPattern::new("TICKER_*.html").unwrap();
        let artifacts = pattern.collect(root).unwrap();

        let names: Vec<&str> = artifacts.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["TICKER_chart1.html", "TICKER_chart2.html"]);
        assert_eq!(artifacts[0].size, 14);
        assert_eq!(artifacts[1].size, 15);
    }

    #[test]
    fn test_collect_nested_pattern() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        fs::create_dir(root.join("charts")).unwrap();
        fs::write(root.join("charts").join("0050_kd.html"), "kd").unwrap();
        fs::write(root.join("0050_root.html"), "root").unwrap();

        let pattern = ArtifactPattern::new("charts/0050_*.html").unwrap();
        let artifacts = pattern.collect(root).unwrap();

        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].name, "charts/0050_kd.html");
    }

    #[test]
    fn test_collect_empty_workspace() {
        let temp = tempfile::tempdir().unwrap();
        let pattern = ArtifactPattern::new("0050_*.html").unwrap();
        assert!(pattern.collect(temp.path()).unwrap().is_empty());
    }
}
