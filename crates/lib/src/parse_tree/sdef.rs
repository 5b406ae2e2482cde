//! System definition trees.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::{AppSetting, Assignment, Entry, Location, Section, Token, TokenList};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdefFile {
  pub path: PathBuf,
  pub sections: Vec<SdefSection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SdefSection {
  Apps(Section<AppSpec>),
  /// One of:
  /// - `<user> if agent if`
  /// - `app * if agent if`
  /// - `app if agent if`
  /// - `app exe comp if agent if`
  Bindings(Section<Entry>),
  BuildVars(Section<Assignment>),
  Commands(Section<CommandSpec>),
  InterfaceSearch(TokenList),
  KernelModules(TokenList),
  LibSearch(TokenList),
}

/// An app named in the `apps:` section, with its override settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSpec {
  pub spec: Token,
  pub overrides: Vec<AppSetting>,
}

/// `name = app:/path/to/exe`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandSpec {
  pub location: Location,
  pub name: Token,
  pub app: Token,
  pub exe_path: Token,
}
