//! Path resolution and the include DAG check.
//!
//! An include path resolves, in order: relative to the including file,
//! through the `DB_PATH` search paths, the user repository root, the
//! global repository root, and as an absolute (or cwd-relative) path.
//! First hit wins; no hit is *FileNotFound*.

use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;
use tracing::warn;

use crate::error::{OksError, Result};
use crate::file::FileId;

use super::Kernel;

/// Canonical form used as the identity of loaded files.
pub(crate) fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf())
        }
    })
}

impl Kernel {
    /// Resolve a file name against the search order. `parent` is the
    /// including file, when resolution happens for an include.
    pub fn get_file_path(&self, name: &str, parent: Option<FileId>) -> Result<PathBuf> {
        let path = Path::new(name);

        if path.is_absolute() {
            if path.is_file() {
                return Ok(canonical(path));
            }
            return Err(OksError::FileNotFound(name.to_string()));
        }

        if let Some(parent) = parent {
            if let Ok(file) = self.file(parent) {
                if let Some(dir) = file.full_name().parent() {
                    let candidate = dir.join(path);
                    if candidate.is_file() {
                        return Ok(canonical(&candidate));
                    }
                }
            }
        }

        for search_path in &self.config.search_paths {
            let candidate = search_path.join(path);
            if candidate.is_file() {
                return Ok(canonical(&candidate));
            }
        }

        if let Some(root) = &self.config.user_repository_root {
            let candidate = root.join(path);
            if candidate.is_file() {
                return Ok(canonical(&candidate));
            }
        }

        if let Some(root) = &self.config.repository_root {
            let candidate = root.join(path);
            if candidate.is_file() {
                return Ok(canonical(&candidate));
            }
        }

        if path.is_file() {
            return Ok(canonical(path));
        }

        Err(OksError::FileNotFound(name.to_string()))
    }

    /// The repository-relative name of a path, when it lies below a
    /// repository root.
    pub(crate) fn repository_name_of(&self, path: &Path) -> String {
        for root in [
            self.config.user_repository_root.as_deref(),
            self.config.repository_root.as_deref(),
        ]
        .into_iter()
        .flatten()
        {
            if let Ok(relative) = path.strip_prefix(canonical(root)) {
                return relative.display().to_string();
            }
        }
        String::new()
    }

    /// Transitive closure of a file's includes.
    pub fn all_include_files(&self, file: FileId) -> FxHashSet<FileId> {
        let mut out = FxHashSet::default();
        let mut frontier = vec![file];
        while let Some(current) = frontier.pop() {
            let Ok(descriptor) = self.file(current) else {
                continue;
            };
            for included in &descriptor.resolved_includes {
                if out.insert(*included) {
                    frontier.push(*included);
                }
            }
        }
        out
    }

    /// DFS over the resolved include graph; every detected cycle is a
    /// line in the report. An empty report means the DAG holds.
    pub(crate) fn include_cycle_report(&self, root: FileId) -> String {
        let mut report = String::new();
        let mut visited: FxHashSet<FileId> = FxHashSet::default();
        let mut stack: Vec<FileId> = Vec::new();

        fn visit(
            kernel: &Kernel,
            file: FileId,
            visited: &mut FxHashSet<FileId>,
            stack: &mut Vec<FileId>,
            report: &mut String,
        ) {
            if let Some(position) = stack.iter().position(|f| *f == file) {
                let names: Vec<String> = stack[position..]
                    .iter()
                    .chain(std::iter::once(&file))
                    .filter_map(|f| kernel.file(*f).ok())
                    .map(|f| f.well_formed_name())
                    .collect();
                report.push_str(&names.join(" includes "));
                report.push('\n');
                return;
            }
            if !visited.insert(file) {
                return;
            }
            stack.push(file);
            let includes = kernel
                .file(file)
                .map(|f| f.resolved_includes.clone())
                .unwrap_or_default();
            for included in includes {
                visit(kernel, included, visited, stack, report);
            }
            stack.pop();
        }

        visit(self, root, &mut visited, &mut stack, &mut report);
        report
    }

    /// Enforce the include-DAG policy for a freshly loaded root.
    pub(crate) fn check_include_dag(&self, root: FileId) -> Result<()> {
        let report = self.include_cycle_report(root);
        if report.is_empty() {
            return Ok(());
        }
        if self.config.strict_circular_includes {
            return Err(OksError::IncludeCycle(report));
        }
        warn!("circular include dependency:\n{report}");
        Ok(())
    }

    /// Close included files no loaded file references anymore. Runs
    /// until a fixed point: closing one include can orphan another.
    pub fn close_dangling_includes(&mut self) -> Result<()> {
        loop {
            let mut referenced: FxHashSet<FileId> = FxHashSet::default();
            for (_, file) in self.files.iter() {
                referenced.extend(file.resolved_includes.iter().copied());
            }
            let dangling: Vec<FileId> = self
                .files
                .iter()
                .filter(|(id, file)| file.parent().is_some() && !referenced.contains(id))
                .map(|(id, _)| id)
                .collect();
            if dangling.is_empty() {
                return Ok(());
            }
            for file in dangling {
                self.close_any(file)?;
            }
        }
    }
}
