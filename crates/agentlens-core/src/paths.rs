//! Path helpers shared by the scanner, import resolver and definition lookup.

use std::io;
use std::path::{Component, Path, PathBuf};

/// Read a source file as text. Invalid UTF-8 sequences become U+FFFD so a
/// stray Latin-1 byte in a comment does not hide the rest of the file.
pub fn read_source(path: &Path) -> io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Render `path` relative to `root` with `/` separators.
///
/// Paths outside `root` are rendered in full so they stay unambiguous.
pub fn display_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let parts: Vec<String> = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::RootDir => Some(String::new()),
            Component::Prefix(prefix) => Some(prefix.as_os_str().to_string_lossy().into_owned()),
            Component::CurDir => None,
            Component::ParentDir => Some("..".to_string()),
        })
        .collect();
    if parts.len() == 1 && parts[0].is_empty() {
        return "/".to_string();
    }
    parts.join("/")
}

/// Resolve a root-relative display path back to a filesystem path.
pub fn from_display(root: &Path, display: &str) -> PathBuf {
    let candidate = Path::new(display);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        display.split('/').fold(root.to_path_buf(), |acc, part| acc.join(part))
    }
}

/// Last path component as a string, or the whole path if there is none.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Join dotted module components onto `base` (`a.b.c` -> `base/a/b/c`).
pub fn join_module(base: &Path, components: &[&str]) -> PathBuf {
    components
        .iter()
        .fold(base.to_path_buf(), |acc, part| acc.join(part))
}

/// `base/a/b/c.py` for module components `[a, b, c]`.
pub fn module_file(base: &Path, components: &[&str]) -> PathBuf {
    match components.split_last() {
        Some((last, init)) => join_module(base, init).join(format!("{last}.py")),
        None => base.join("__init__.py"),
    }
}
