//! Kernel configuration.
//!
//! All runtime toggles are carried by a [`KernelConfig`] value threaded
//! through the kernel at construction. Environment variables are read in
//! exactly one place, [`KernelConfig::from_env`]; library code never
//! touches the environment on its own.

use std::env;
use std::path::PathBuf;

/// Colon-separated include search paths.
pub const ENV_DB_PATH: &str = "DB_PATH";
/// Global (read-only, shared) repository root.
pub const ENV_DB_REPOSITORY: &str = "DB_REPOSITORY";
/// User (writable) repository root; may be empty.
pub const ENV_DB_USER_REPOSITORY: &str = "DB_USER_REPOSITORY";

pub const ENV_SILENCE: &str = "KERNEL_SILENCE";
pub const ENV_VERBOSE: &str = "KERNEL_VERBOSE";
pub const ENV_ALLOW_DUPLICATED_CLASSES: &str = "KERNEL_ALLOW_DUPLICATED_CLASSES";
pub const ENV_ALLOW_DUPLICATED_OBJECTS: &str = "KERNEL_ALLOW_DUPLICATED_OBJECTS";
pub const ENV_TEST_DUPLICATED_OBJECTS_VIA_INHERITANCE: &str =
    "KERNEL_TEST_DUPLICATED_OBJECTS_VIA_INHERITANCE";
pub const ENV_SKIP_STRING_RANGE: &str = "KERNEL_SKIP_STRING_RANGE";

/// What to do with an object whose id already exists in its class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatedObjectsPolicy {
    /// Abort the load of the offending file.
    #[default]
    Reject,
    /// Keep the first object, log a warning and skip the duplicate.
    KeepFirst,
    /// Give the duplicate a generated id and keep loading.
    AutoRename,
}

/// Runtime toggles of one kernel instance.
#[derive(Debug, Clone)]
pub struct KernelConfig {
    /// Suppress informational output.
    pub silence: bool,
    /// Trace file-engine internals.
    pub verbose: bool,
    /// Keep the first of two classes with the same name instead of
    /// failing the load.
    pub allow_duplicated_classes: bool,
    /// Policy for objects with duplicated ids within one class.
    pub duplicated_objects: DuplicatedObjectsPolicy,
    /// Reject ids duplicated anywhere in a class inheritance cone, not
    /// just within the exact class.
    pub test_duplicated_objects_via_inheritance: bool,
    /// Bypass regular-expression range checks on string values.
    pub skip_string_range: bool,
    /// Escalate include cycles from a warning to an error.
    pub strict_circular_includes: bool,
    /// Include search paths tried after the including file's directory.
    pub search_paths: Vec<PathBuf>,
    /// Global repository root; files under it are repository files.
    pub repository_root: Option<PathBuf>,
    /// User repository root; takes precedence over the global one when
    /// resolving includes.
    pub user_repository_root: Option<PathBuf>,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            silence: false,
            verbose: false,
            allow_duplicated_classes: false,
            duplicated_objects: DuplicatedObjectsPolicy::Reject,
            test_duplicated_objects_via_inheritance: false,
            skip_string_range: false,
            strict_circular_includes: false,
            search_paths: Vec::new(),
            repository_root: None,
            user_repository_root: None,
        }
    }
}

/// Any value except `no` means true.
fn env_flag(name: &str) -> bool {
    match env::var(name) {
        Ok(v) => v != "no",
        Err(_) => false,
    }
}

fn env_path(name: &str) -> Option<PathBuf> {
    env::var_os(name)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

impl KernelConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Self {
        let search_paths = env::var(ENV_DB_PATH)
            .map(|v| v.split(':').filter(|s| !s.is_empty()).map(PathBuf::from).collect())
            .unwrap_or_default();

        let duplicated_objects = if env_flag(ENV_ALLOW_DUPLICATED_OBJECTS) {
            DuplicatedObjectsPolicy::AutoRename
        } else {
            DuplicatedObjectsPolicy::Reject
        };

        Self {
            silence: env_flag(ENV_SILENCE),
            verbose: env_flag(ENV_VERBOSE),
            allow_duplicated_classes: env_flag(ENV_ALLOW_DUPLICATED_CLASSES),
            duplicated_objects,
            test_duplicated_objects_via_inheritance: env_flag(
                ENV_TEST_DUPLICATED_OBJECTS_VIA_INHERITANCE,
            ),
            skip_string_range: env_flag(ENV_SKIP_STRING_RANGE),
            strict_circular_includes: false,
            search_paths,
            repository_root: env_path(ENV_DB_REPOSITORY),
            user_repository_root: env_path(ENV_DB_USER_REPOSITORY),
        }
    }
}
