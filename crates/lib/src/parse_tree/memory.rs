//! A [`DefinitionParser`] that serves trees registered ahead of time.
//!
//! Useful when trees come from somewhere other than a grammar, such as a
//! cache of earlier parses, and for driving the modeller in tests. Paths are
//! keyed by their canonical form, so the files themselves must exist on disk
//! when a tree is registered for them.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use super::{AdefFile, ApiHeader, CdefFile, DefinitionParser, MdefFile, ParseError, SdefFile, scan_api_header};

#[derive(Debug, Default, Clone)]
pub struct MemoryParser {
  cdefs: HashMap<PathBuf, CdefFile>,
  adefs: HashMap<PathBuf, AdefFile>,
  mdefs: HashMap<PathBuf, MdefFile>,
  sdefs: HashMap<PathBuf, SdefFile>,
  apis: HashMap<PathBuf, ApiHeader>,
}

fn key(path: &Path) -> PathBuf {
  dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn lookup<T: Clone>(map: &HashMap<PathBuf, T>, path: &Path) -> Result<T, ParseError> {
  map.get(&key(path)).cloned().ok_or_else(|| ParseError::Read {
    path: path.to_path_buf(),
    source: io::Error::new(io::ErrorKind::NotFound, "no parse tree registered"),
  })
}

impl MemoryParser {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_cdef(mut self, file: CdefFile) -> Self {
    self.cdefs.insert(key(&file.path), file);
    self
  }

  pub fn with_adef(mut self, file: AdefFile) -> Self {
    self.adefs.insert(key(&file.path), file);
    self
  }

  pub fn with_mdef(mut self, file: MdefFile) -> Self {
    self.mdefs.insert(key(&file.path), file);
    self
  }

  pub fn with_sdef(mut self, file: SdefFile) -> Self {
    self.sdefs.insert(key(&file.path), file);
    self
  }

  /// Registers a header for an `.api` file instead of scanning it from disk.
  pub fn with_api(mut self, path: &Path, header: ApiHeader) -> Self {
    self.apis.insert(key(path), header);
    self
  }
}

impl DefinitionParser for MemoryParser {
  fn parse_cdef(&self, path: &Path) -> Result<CdefFile, ParseError> {
    lookup(&self.cdefs, path)
  }

  fn parse_adef(&self, path: &Path) -> Result<AdefFile, ParseError> {
    lookup(&self.adefs, path)
  }

  fn parse_mdef(&self, path: &Path) -> Result<MdefFile, ParseError> {
    lookup(&self.mdefs, path)
  }

  fn parse_sdef(&self, path: &Path) -> Result<SdefFile, ParseError> {
    lookup(&self.sdefs, path)
  }

  fn parse_api(&self, path: &Path) -> Result<ApiHeader, ParseError> {
    match self.apis.get(&key(path)) {
      Some(header) => Ok(header.clone()),
      None => scan_api_header(path),
    }
  }
}
