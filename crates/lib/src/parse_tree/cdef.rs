//! Component definition trees.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::{Entry, Section, Token, TokenList};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CdefFile {
  pub path: PathBuf,
  pub sections: Vec<CdefSection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CdefSection {
  Sources(TokenList),
  JavaPackage(TokenList),
  CFlags(TokenList),
  CxxFlags(TokenList),
  LdFlags(TokenList),
  Bundles(Section<BundlesSubsection>),
  Provides(Section<ProvidesSubsection>),
  Requires(Section<RequiresSubsection>),
  Assets(Section<AssetDef>),
}

/// Items are `[permissions] source destination`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BundlesSubsection {
  File(Section<Entry>),
  Dir(Section<Entry>),
}

/// Items are `[alias] api_file [options...]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProvidesSubsection {
  Api(Section<Entry>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RequiresSubsection {
  /// `[alias] api_file [options...]`
  Api(Section<Entry>),
  /// `source destination`
  File(Section<Entry>),
  /// `source destination`
  Dir(Section<Entry>),
  /// `[permissions] source destination`
  Device(Section<Entry>),
  Component(TokenList),
  Lib(TokenList),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetDef {
  pub name: Token,
  pub subsections: Vec<AssetSubsection>,
}

/// Settings and variables are `type name [default]`; commands are bare names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AssetSubsection {
  Settings(Section<Entry>),
  Variables(Section<Entry>),
  Commands(TokenList),
}
