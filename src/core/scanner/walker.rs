//! Directory walking built on walkdir.

use super::{FileCandidate, FileFilter, ScanConfig};
use crate::error::ScanError;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Outcome of a full discovery pass
#[derive(Debug, Default)]
pub struct DiscoveryResult {
    pub candidates: Vec<FileCandidate>,
    pub errors: Vec<ScanError>,
}

/// Recursive image-file discovery
pub struct Walker {
    config: ScanConfig,
    filter: FileFilter,
}

impl Walker {
    pub fn new(config: ScanConfig) -> Self {
        let filter = FileFilter::new(config.include_hidden);
        Self { config, filter }
    }

    /// Walk all roots, collecting every candidate
    pub fn discover(&self, roots: &[PathBuf]) -> DiscoveryResult {
        let mut result = DiscoveryResult::default();
        self.walk(roots, |candidate| {
            result.candidates.push(candidate);
            ControlFlow::Continue(())
        }, &mut result.errors);
        result
    }

    /// Walk all roots, handing each candidate to `visit`. The visitor can
    /// stop the walk early (cancellation). Per-file errors accumulate in
    /// `errors` and never abort the walk.
    pub fn walk<F>(&self, roots: &[PathBuf], mut visit: F, errors: &mut Vec<ScanError>)
    where
        F: FnMut(FileCandidate) -> ControlFlow<()>,
    {
        for root in roots {
            if !root.exists() || !root.is_dir() {
                errors.push(ScanError::DirectoryNotFound { path: root.clone() });
                continue;
            }
            if self.walk_root(root, &mut visit, errors).is_break() {
                return;
            }
        }
    }

    fn walk_root<F>(
        &self,
        root: &Path,
        visit: &mut F,
        errors: &mut Vec<ScanError>,
    ) -> ControlFlow<()>
    where
        F: FnMut(FileCandidate) -> ControlFlow<()>,
    {
        let mut walker = WalkDir::new(root).follow_links(self.config.follow_symlinks);
        if let Some(depth) = self.config.max_depth {
            walker = walker.max_depth(depth);
        }

        let iter = walker.into_iter().filter_entry(|entry| {
            if entry.file_type().is_dir() {
                !self.is_excluded_dir(entry.path(), root)
            } else {
                true
            }
        });

        for entry in iter {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    errors.push(convert_walk_error(e));
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if !self.filter.should_include(path) {
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    errors.push(ScanError::Read {
                        path: path.to_path_buf(),
                        source: std::io::Error::other(e.to_string()),
                    });
                    continue;
                }
            };

            let size = metadata.len();
            if size > self.config.max_file_size {
                tracing::debug!(path = %path.display(), size, "skipping oversized file");
                errors.push(ScanError::FileTooLarge {
                    path: path.to_path_buf(),
                    size,
                    limit: self.config.max_file_size,
                });
                continue;
            }

            let candidate = FileCandidate {
                path: path.to_path_buf(),
                size,
                modified: metadata.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH),
                format: self
                    .filter
                    .format_of(path)
                    .unwrap_or("other")
                    .to_string(),
            };

            if visit(candidate).is_break() {
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn is_excluded_dir(&self, path: &Path, root: &Path) -> bool {
        if path == root {
            return false;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        if !self.config.include_hidden && name.starts_with('.') {
            return true;
        }
        self.config
            .exclude_dirs
            .iter()
            .any(|excluded| excluded.eq_ignore_ascii_case(name))
    }
}

fn convert_walk_error(error: walkdir::Error) -> ScanError {
    let path = error.path().map(|p| p.to_path_buf()).unwrap_or_default();
    if error.io_error().map(|e| e.kind()) == Some(std::io::ErrorKind::PermissionDenied) {
        ScanError::PermissionDenied { path }
    } else {
        ScanError::Read {
            path,
            source: std::io::Error::other(error.to_string()),
        }
    }
}
