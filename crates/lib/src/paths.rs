//! Path helpers: searching directory lists, canonical forms, file name conventions.

use std::path::{Path, PathBuf};

use crate::consts::COMPONENT_DEF_FILE;

/// Canonical absolute form of a path, without Windows verbatim prefixes.
///
/// Paths that cannot be canonicalized (e.g. they don't exist yet) are made
/// absolute against the current directory instead.
pub fn canonical(path: &Path) -> PathBuf {
  match dunce::canonicalize(path) {
    Ok(p) => p,
    Err(_) if path.is_absolute() => path.to_path_buf(),
    Err(_) => std::env::current_dir()
      .map(|cwd| cwd.join(path))
      .unwrap_or_else(|_| path.to_path_buf()),
  }
}

/// Finds a regular file. Absolute paths are checked directly; relative ones against each dir in turn.
pub fn find_file<'a>(name: &str, dirs: impl IntoIterator<Item = &'a PathBuf>) -> Option<PathBuf> {
  find(name, dirs, |p| p.is_file())
}

/// Finds a directory containing a component definition file.
pub fn find_component<'a>(name: &str, dirs: impl IntoIterator<Item = &'a PathBuf>) -> Option<PathBuf> {
  find(name, dirs, |p| p.join(COMPONENT_DEF_FILE).is_file())
}

fn find<'a>(name: &str, dirs: impl IntoIterator<Item = &'a PathBuf>, accept: impl Fn(&Path) -> bool) -> Option<PathBuf> {
  let path = Path::new(name);
  if path.is_absolute() {
    return accept(path).then(|| canonical(path));
  }
  dirs
    .into_iter()
    .map(|dir| dir.join(path))
    .find(|candidate| accept(candidate.as_path()))
    .map(|p| canonical(&p))
}

/// The last component of a path or dotted spec, e.g. `foo` for `apps/foo`.
pub fn last_node(path: &str) -> String {
  Path::new(path.trim_end_matches('/'))
    .file_name()
    .map(|s| s.to_string_lossy().into_owned())
    .unwrap_or_else(|| path.to_string())
}

pub fn has_suffix(path: &str, suffix: &str) -> bool {
  path.len() > suffix.len() && path.ends_with(suffix)
}

pub fn remove_suffix<'a>(path: &'a str, suffix: &str) -> &'a str {
  path.strip_suffix(suffix).unwrap_or(path)
}

const CXX_SUFFIXES: &[&str] = &[".cpp", ".cc", ".cxx", ".C", ".c++"];

pub fn is_c_source(path: &str) -> bool {
  has_suffix(path, ".c")
}

pub fn is_cxx_source(path: &str) -> bool {
  CXX_SUFFIXES.iter().any(|s| has_suffix(path, s))
}

/// `libfoo.so.1` -> `foo`, as used in `-lfoo`.
pub fn lib_short_name(lib: &str) -> String {
  let name = last_node(lib);
  let name = name.strip_prefix("lib").unwrap_or(&name);
  match name.find(".so") {
    Some(pos) => name[..pos].to_string(),
    None => name.to_string(),
  }
}

/// `<root>` -> `root`.
pub fn remove_angle_brackets(name: &str) -> &str {
  name
    .strip_prefix('<')
    .and_then(|n| n.strip_suffix('>'))
    .unwrap_or(name)
}
