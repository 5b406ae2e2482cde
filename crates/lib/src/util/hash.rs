//! Hashing helpers for generated file names.

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::consts::OBJ_HASH_PREFIX_LEN;

/// Truncated SHA-256 of a path, used to give each source file a unique object file name.
pub fn path_hash(path: &Path) -> String {
  let mut hasher = Sha256::new();
  hasher.update(path.to_string_lossy().as_bytes());
  let full = format!("{:x}", hasher.finalize());
  full[..OBJ_HASH_PREFIX_LEN].to_string()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn hash_is_truncated_hex() {
    let hash = path_hash(Path::new("/src/comp/foo.c"));
    assert_eq!(hash.len(), OBJ_HASH_PREFIX_LEN);
    assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
  }

  #[test]
  fn hash_is_deterministic_and_distinct() {
    let a = path_hash(Path::new("/src/a/foo.c"));
    let b = path_hash(Path::new("/src/b/foo.c"));
    assert_eq!(a, path_hash(Path::new("/src/a/foo.c")));
    assert_ne!(a, b);
  }
}
