use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{AdefFile, CdefFile, Location, MdefFile, SdefFile};

/// Errors raised by a [`DefinitionParser`].
#[derive(Debug, Error)]
pub enum ParseError {
  #[error("failed to read {}: {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("{location}: {message}")]
  Syntax { location: Location, message: String },
}

/// What the modeller needs to know about an `.api` file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiHeader {
  /// Prefix used when a declaration gives no alias: the file name without `.api`.
  pub default_prefix: String,
  /// Files named by `USETYPES` statements, in declaration order.
  pub usetypes: Vec<String>,
}

/// Turns definition files into parse trees.
///
/// Implementations must hand back trees whose tokens carry their source
/// locations; the modeller reports every error against them.
pub trait DefinitionParser {
  fn parse_cdef(&self, path: &Path) -> Result<CdefFile, ParseError>;

  fn parse_adef(&self, path: &Path) -> Result<AdefFile, ParseError>;

  fn parse_mdef(&self, path: &Path) -> Result<MdefFile, ParseError>;

  fn parse_sdef(&self, path: &Path) -> Result<SdefFile, ParseError>;

  fn parse_api(&self, path: &Path) -> Result<ApiHeader, ParseError> {
    scan_api_header(path)
  }
}

/// Reads an `.api` file and collects its `USETYPES` statements.
pub fn scan_api_header(path: &Path) -> Result<ApiHeader, ParseError> {
  let content = fs::read_to_string(path).map_err(|source| ParseError::Read {
    path: path.to_path_buf(),
    source,
  })?;

  Ok(ApiHeader {
    default_prefix: api_default_prefix(path),
    usetypes: scan_usetypes(&content),
  })
}

pub fn api_default_prefix(path: &Path) -> String {
  path
    .file_stem()
    .map(|s| s.to_string_lossy().into_owned())
    .unwrap_or_default()
}

fn scan_usetypes(content: &str) -> Vec<String> {
  let mut usetypes = Vec::new();
  let mut in_block_comment = false;

  for raw in content.lines() {
    let mut line = String::new();
    let mut rest = raw;

    // Strip /* */ comments, which may span lines.
    loop {
      if in_block_comment {
        match rest.find("*/") {
          Some(end) => {
            rest = &rest[end + 2..];
            in_block_comment = false;
          }
          None => break,
        }
      } else {
        match rest.find("/*") {
          Some(start) => {
            line.push_str(&rest[..start]);
            rest = &rest[start + 2..];
            in_block_comment = true;
          }
          None => {
            line.push_str(rest);
            break;
          }
        }
      }
    }

    let line = match line.find("//") {
      Some(pos) => &line[..pos],
      None => line.as_str(),
    };

    let Some(tail) = line.trim().strip_prefix("USETYPES") else {
      continue;
    };
    if !tail.starts_with(char::is_whitespace) {
      continue;
    }

    let name = tail.trim().trim_end_matches(';').trim();
    if name.is_empty() {
      continue;
    }
    if name.ends_with(".api") {
      usetypes.push(name.to_string());
    } else {
      usetypes.push(format!("{}.api", name));
    }
  }

  usetypes
}
