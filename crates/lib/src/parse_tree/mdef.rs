//! Kernel module definition trees.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::{Assignment, Section, SimpleSection, TokenList};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MdefFile {
  pub path: PathBuf,
  pub sections: Vec<MdefSection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MdefSection {
  /// Pre-built `.ko` object files.
  PreBuilt(TokenList),
  Params(Section<Assignment>),
  Load(SimpleSection),
}
