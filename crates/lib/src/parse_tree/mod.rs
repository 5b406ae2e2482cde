//! Parse trees handed to the modeller by a definition parser.
//!
//! The modeller never scans or parses definition files itself. A
//! [`DefinitionParser`] turns each file into one of the per-file trees below,
//! and the modeller walks those trees read-only.
//!
//! - [`cdef`]: component definitions (`Component.cdef`)
//! - [`adef`]: application definitions (`.adef`) and the app settings shared with `.sdef` overrides
//! - [`mdef`]: kernel module definitions (`.mdef`)
//! - [`sdef`]: system definitions (`.sdef`)
//! - [`memory`]: an in-memory parser that serves pre-built trees

pub mod adef;
pub mod cdef;
pub mod mdef;
pub mod memory;
mod parser;
pub mod sdef;

pub use adef::*;
pub use cdef::*;
pub use mdef::*;
pub use parser::*;
pub use sdef::*;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A position inside a definition file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
  pub file: PathBuf,
  pub line: usize,
  pub column: usize,
}

impl Location {
  pub fn new(file: impl Into<PathBuf>, line: usize, column: usize) -> Self {
    Self {
      file: file.into(),
      line,
      column,
    }
  }

  /// Location pointing at a whole file rather than a token in it.
  pub fn file(path: &Path) -> Self {
    Self::new(path, 0, 0)
  }
}

impl fmt::Display for Location {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.line == 0 {
      write!(f, "{}", self.file.display())
    } else {
      write!(f, "{}:{}:{}", self.file.display(), self.line, self.column)
    }
  }
}

/// The lexical class of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
  Name,
  FilePath,
  /// An app name or a `<user>` name on either side of a binding.
  IpcAgent,
  /// The `*` placeholder for a pre-built interface's executable and component.
  Star,
  ServerIpcOption,
  ClientIpcOption,
  /// Permission flags such as `[rw]`.
  FilePermissions,
  Integer,
  Boolean,
  Text,
  EnvVarName,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
  pub kind: TokenKind,
  pub text: String,
  pub location: Location,
}

impl Token {
  pub fn new(kind: TokenKind, text: impl Into<String>, location: Location) -> Self {
    Self {
      kind,
      text: text.into(),
      location,
    }
  }

  pub fn is(&self, kind: TokenKind) -> bool {
    self.kind == kind
  }
}

/// A keyword followed by a braced list of items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section<T> {
  pub keyword: Token,
  pub items: Vec<T>,
}

impl<T> Section<T> {
  pub fn new(keyword: Token, items: Vec<T>) -> Self {
    Self { keyword, items }
  }

  pub fn location(&self) -> &Location {
    &self.keyword.location
  }
}

/// A section whose items are plain tokens.
pub type TokenList = Section<Token>;

/// A `keyword: value` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleSection {
  pub keyword: Token,
  pub value: Token,
}

impl SimpleSection {
  pub fn new(keyword: Token, value: Token) -> Self {
    Self { keyword, value }
  }

  pub fn text(&self) -> &str {
    &self.value.text
  }

  pub fn location(&self) -> &Location {
    &self.keyword.location
  }
}

/// One line of a section whose shape depends on the section kind.
///
/// Bindings, interface declarations and bundled items are handed over as flat
/// token sequences; the modeller checks their shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
  pub location: Location,
  pub tokens: Vec<Token>,
}

impl Entry {
  pub fn new(location: Location, tokens: Vec<Token>) -> Self {
    Self { location, tokens }
  }
}

/// `NAME = value`, used by build variables, process environment variables and module params.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
  pub name: Token,
  pub value: Token,
}

impl Assignment {
  pub fn new(name: Token, value: Token) -> Self {
    Self { name, value }
  }
}
