//! Path spelling shared by all backends.

use std::fs;
use std::path::{Path, PathBuf};

/// Converts Windows separators to the forward slashes the compilers expect.
pub fn fix_separator(path: &str) -> String {
    path.replace('\\', "/")
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Spells `target` relative to `working_dir` when it lies below it.
///
/// A relative `target` is first resolved against `working_dir`. Returns `.`
/// when both name the same directory and the absolute path when they share
/// no prefix.
pub fn relative_to_working_dir(working_dir: &Path, target: &Path) -> String {
    let target = if target.is_absolute() {
        target.to_path_buf()
    } else {
        working_dir.join(target)
    };
    let base = canonical(working_dir);
    let absolute = canonical(&target);

    let relative = if absolute == base {
        ".".to_string()
    } else {
        match absolute.strip_prefix(&base) {
            Ok(rest) => rest.to_string_lossy().into_owned(),
            Err(_) => absolute.to_string_lossy().into_owned(),
        }
    };
    fix_separator(&relative)
}

/// A single filesystem-safe token naming `target`, e.g. `target-generated-idl`.
pub fn flattened_label(working_dir: &Path, target: &Path) -> String {
    relative_to_working_dir(working_dir, target).replace(['/', ':'], "-")
}

/// Forward-slash spelling of any path handed to a compiler.
pub fn display_arg(path: &Path) -> String {
    fix_separator(&path.to_string_lossy())
}
