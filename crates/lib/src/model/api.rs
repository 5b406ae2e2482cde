use std::path::PathBuf;

use serde::Serialize;

use super::{ApiFileId, ComponentId};
use crate::parse_tree::Location;

/// An `.api` file, shared by every interface declared on it.
#[derive(Debug, Clone, Serialize)]
pub struct ApiFile {
  pub path: PathBuf,
  pub default_prefix: String,
  /// Files named by `USETYPES`, directly.
  pub includes: Vec<ApiFileId>,
}

impl ApiFile {
  pub fn new(path: PathBuf, default_prefix: String) -> Self {
    Self {
      path,
      default_prefix,
      includes: Vec::new(),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InterfaceKind {
  Server { is_async: bool, manual_start: bool },
  Client { manual_start: bool, optional: bool },
  TypesOnly,
}

/// One component's use of one API file.
#[derive(Debug, Clone, Serialize)]
pub struct Interface {
  pub kind: InterfaceKind,
  pub internal_name: String,
  pub component: ComponentId,
  pub api_file: ApiFileId,
  pub location: Location,
}

impl Interface {
  pub fn is_optional(&self) -> bool {
    matches!(self.kind, InterfaceKind::Client { optional: true, .. })
  }
}
