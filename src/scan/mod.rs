//! Finds dataset files to validate under a path.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

const DEFAULT_EXCLUDES: [&str; 6] = [
    "**/node_modules",
    "**/node_modules/**",
    "**/.git",
    "**/.git/**",
    "**/target",
    "**/target/**",
];

#[derive(Debug, Clone, Default)]
pub struct DatasetScan {
    pub files: Vec<PathBuf>,
    /// Entries that could not be read while walking.
    pub error_count: u64,
}

/// A file path is returned as-is. A directory is walked for files matching
/// `include` (default `**/*.json`) that no `exclude` glob matches; results
/// are sorted.
pub fn find_datasets(root: &Path, include: &[String], exclude: &[String]) -> Result<DatasetScan> {
    if root.is_file() {
        return Ok(DatasetScan {
            files: vec![root.to_path_buf()],
            error_count: 0,
        });
    }
    if !root.is_dir() {
        anyhow::bail!("path not found: {}", root.display());
    }

    let include_set = if include.is_empty() {
        build_set(&["**/*.json".to_string()])?
    } else {
        build_set(include)?
    };
    let mut excludes: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
    excludes.extend(exclude.iter().cloned());
    let exclude_set = build_set(&excludes)?;

    let mut out = DatasetScan::default();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| {
            let rel = e.path().strip_prefix(root).unwrap_or(e.path());
            !exclude_set.is_match(rel)
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::debug!(error = %err, "skipping unreadable entry");
                out.error_count += 1;
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
        if include_set.is_match(rel) {
            out.files.push(entry.into_path());
        }
    }
    out.files.sort();
    Ok(out)
}

pub fn validate_globs(globs: &[String]) -> Result<()> {
    build_set(globs).map(|_| ())
}

fn build_set(globs: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in globs {
        builder.add(Glob::new(pat).with_context(|| format!("invalid glob: {pat}"))?);
    }
    Ok(builder.build()?)
}
