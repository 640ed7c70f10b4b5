use crate::error::{Error, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use walkdir::WalkDir;

/// An input file picked for translation, with the root it was found under.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SourceFile {
    pub path: PathBuf,
    pub root: PathBuf,
}

impl SourceFile {
    /// Path of the file below its root.
    pub fn relative_path(&self) -> &Path {
        self.path.strip_prefix(&self.root).unwrap_or(&self.path)
    }

    /// Where the up-to-date marker for this file lives under `marker_root`.
    pub fn marker_path(&self, marker_root: &Path) -> PathBuf {
        marker_root.join(self.relative_path())
    }
}

/// Decides which files under a root need (re)translation.
///
/// A file is stale when its marker is missing, or when the source was modified
/// more than `stale_millis` after the marker.
#[derive(Debug, Clone)]
pub struct StaleSourceSet {
    includes: GlobSet,
    excludes: GlobSet,
    tolerance: Duration,
}

fn build_globs(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| Error::InvalidPattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| Error::InvalidPattern {
        pattern: patterns.join(", "),
        message: e.to_string(),
    })
}

impl StaleSourceSet {
    pub fn new(includes: &[String], excludes: &[String], stale_millis: u64) -> Result<Self> {
        Ok(StaleSourceSet {
            includes: build_globs(includes)?,
            excludes: build_globs(excludes)?,
            tolerance: Duration::from_millis(stale_millis),
        })
    }

    pub fn compute(&self, root_dir: &Path, marker_root: &Path) -> Result<BTreeSet<SourceFile>> {
        let mut stale = BTreeSet::new();
        if !root_dir.is_dir() {
            return Ok(stale);
        }

        for entry in WalkDir::new(root_dir).follow_links(true) {
            let entry = entry.map_err(|source| Error::Scan {
                root: root_dir.to_path_buf(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let file = SourceFile {
                path: entry.path().to_path_buf(),
                root: root_dir.to_path_buf(),
            };
            if !self.is_selected(file.relative_path()) {
                continue;
            }
            if self.needs_translation(&file, marker_root)? {
                stale.insert(file);
            }
        }
        Ok(stale)
    }

    fn is_selected(&self, relative: &Path) -> bool {
        let candidate = relative.to_string_lossy().replace('\\', "/");
        self.includes.is_match(&candidate) && !self.excludes.is_match(&candidate)
    }

    fn needs_translation(&self, file: &SourceFile, marker_root: &Path) -> Result<bool> {
        let marker = file.marker_path(marker_root);
        if !marker.exists() {
            return Ok(true);
        }
        let source_time = fs::metadata(&file.path)?.modified()?;
        let marker_time = fs::metadata(&marker)?.modified()?;
        let threshold = source_time
            .checked_sub(self.tolerance)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        Ok(threshold > marker_time)
    }
}
