use std::path::{Component, Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::error::{Error, Result};

/// Compiled watch patterns plus the directories that must be watched to see them.
///
/// Relative patterns are matched against paths relative to `base`; absolute patterns
/// against absolute paths. `*` stops at path separators, `**` crosses them.
#[derive(Debug, Clone)]
pub struct WatchSet {
    patterns: Vec<String>,
    base: PathBuf,
    relative: GlobSet,
    absolute: GlobSet,
    roots: Vec<PathBuf>,
}

impl WatchSet {
    pub fn new(patterns: &[String], base: &Path) -> Result<Self> {
        let mut relative = GlobSetBuilder::new();
        let mut absolute = GlobSetBuilder::new();
        let mut roots: Vec<PathBuf> = Vec::new();

        for pattern in patterns {
            let glob = GlobBuilder::new(pattern)
                .literal_separator(true)
                .build()
                .map_err(|e| Error::Watch {
                    target: pattern.clone(),
                    reason: e.to_string(),
                })?;

            let prefix = literal_prefix(pattern);
            let root = if Path::new(pattern).is_absolute() {
                absolute.add(glob);
                prefix
            } else {
                relative.add(glob);
                base.join(prefix)
            };
            if !roots.contains(&root) {
                roots.push(root);
            }
        }

        let build = |builder: GlobSetBuilder| {
            builder.build().map_err(|e| Error::Watch {
                target: patterns.join(","),
                reason: e.to_string(),
            })
        };

        Ok(Self {
            patterns: patterns.to_vec(),
            base: base.to_path_buf(),
            relative: build(relative)?,
            absolute: build(absolute)?,
            roots,
        })
    }

    /// Whether a changed path is covered by any pattern.
    pub fn matches(&self, path: &Path) -> bool {
        if self.absolute.is_match(path) {
            return true;
        }
        path.strip_prefix(&self.base)
            .map(|rel| self.relative.is_match(rel))
            .unwrap_or(false)
    }

    /// Directories (or files) to register with the OS watcher, one per distinct literal prefix.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn base(&self) -> &Path {
        &self.base
    }
}

/// Leading components of a pattern that contain no glob syntax.
fn literal_prefix(pattern: &str) -> PathBuf {
    let mut prefix = PathBuf::new();
    for component in Path::new(pattern).components() {
        if let Component::Normal(part) = component {
            if part.to_string_lossy().contains(['*', '?', '[', '{']) {
                break;
            }
        }
        prefix.push(component);
    }
    prefix
}
