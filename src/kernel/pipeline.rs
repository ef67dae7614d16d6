//! The parallel validation pipeline.
//!
//! A fixed-size worker pool takes one job per file set: load it into a
//! private kernel clone — copy-constructed, sharing no mutable state
//! with the parent — and collect a per-file diagnostic string. The
//! join at the end is the completion barrier. This is the only place
//! loads run in parallel; the main kernel stays single-writer.

use std::path::PathBuf;

use rayon::prelude::*;
use tracing::debug;

use crate::error::{OksError, Result};

use super::Kernel;

/// Outcome of validating one file: an empty diagnostic string means
/// the file loaded and bound cleanly.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub file: PathBuf,
    pub diagnostics: String,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Load each file into a private clone of `base` on a pool of
/// `workers` threads and report per-file diagnostics.
///
/// `base` usually carries a preloaded schema so data files validate
/// against it; an empty kernel works for self-contained files.
pub fn validate_files(
    base: &Kernel,
    paths: &[PathBuf],
    workers: usize,
) -> Result<Vec<ValidationReport>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()
        .map_err(|e| OksError::io(PathBuf::new(), std::io::Error::other(e)))?;

    // clone up front: the clones move into the workers, the parent is
    // never shared
    let jobs: Vec<(PathBuf, Kernel)> = paths
        .iter()
        .map(|path| (path.clone(), base.clone()))
        .collect();

    let reports = pool.install(|| {
        jobs.into_par_iter()
            .map(|(path, mut kernel)| {
                debug!("validating {}", path.display());
                let mut diagnostics = String::new();
                match kernel.load_file(&path.display().to_string(), true) {
                    Ok(_) => {
                        for error in kernel.load_errors() {
                            diagnostics.push_str(error);
                            diagnostics.push('\n');
                        }
                        diagnostics.push_str(kernel.get_bind_classes_status());
                        diagnostics.push_str(kernel.get_bind_objects_status());
                    }
                    Err(error) => {
                        diagnostics.push_str(&error.to_string());
                        diagnostics.push('\n');
                    }
                }
                ValidationReport { file: path, diagnostics }
            })
            .collect()
    });
    Ok(reports)
}
