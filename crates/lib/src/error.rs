//! Errors raised while building the model.
//!
//! Every variant carries the location of the token that caused it. The first
//! error aborts the run; nothing is recovered.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::parse_tree::{Location, ParseError};
use crate::vars::VarError;

/// Coarse classification of a [`ModelError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
  NotFound,
  Duplicate,
  Conflict,
  Internal,
  Cycle,
  Invalid,
  Io,
  Parse,
}

/// Directories tried by a failed search, rendered one per line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchedDirs(pub Vec<PathBuf>);

impl fmt::Display for SearchedDirs {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.0.is_empty() {
      return Ok(());
    }
    write!(f, "\n  searched:")?;
    for dir in &self.0 {
      write!(f, "\n    '{}'", dir.display())?;
    }
    Ok(())
  }
}

/// A client-side interface left without a binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnboundInterface {
  /// `app.exe.component.interface`, or `app.*.interface` for pre-built interfaces.
  pub name: String,
  pub location: Location,
}

fn list_unbound(interfaces: &[UnboundInterface]) -> String {
  interfaces
    .iter()
    .map(|i| format!("\n  {} (declared at {})", i.name, i.location))
    .collect()
}

#[derive(Debug, Error)]
pub enum ModelError {
  #[error("{location}: {what} '{name}' not found{searched}")]
  NotFound {
    location: Location,
    what: &'static str,
    name: String,
    searched: SearchedDirs,
  },

  #[error("{location}: {owner} has no {side} interface named '{interface}'")]
  InterfaceNotFound {
    location: Location,
    owner: String,
    side: &'static str,
    interface: String,
  },

  #[error("{location}: {what} '{name}' added to the system more than once. Previously added at line {}", previous.line)]
  Duplicate {
    location: Location,
    what: &'static str,
    name: String,
    previous: Location,
  },

  #[error(
    "{location}: duplicate binding of '<{user}>.{interface}'. Previously bound at line {}",
    previous.line
  )]
  DuplicateUserBinding {
    location: Location,
    user: String,
    interface: String,
    previous: Location,
  },

  #[error("{location}: component '{component}' mixes C/C++ code with Java code")]
  MixedLanguage { location: Location, component: String },

  #[error("{location}: {message}")]
  Conflict { location: Location, message: String },

  #[error("client interfaces must be bound:{}", list_unbound(interfaces))]
  UnboundInterfaces { interfaces: Vec<UnboundInterface> },

  #[error("{location}: {what} dependency cycle: {chain}")]
  Cycle {
    location: Location,
    what: &'static str,
    chain: String,
  },

  #[error("{location}: invalid {setting} '{value}': {reason}")]
  Invalid {
    location: Location,
    setting: &'static str,
    value: String,
    reason: String,
  },

  #[error("{location}: {source}")]
  Variable {
    location: Location,
    #[source]
    source: VarError,
  },

  #[error("{location}: internal error: {message}")]
  Internal { location: Location, message: String },

  #[error("{location}: failed to access {}: {source}", path.display())]
  Io {
    location: Location,
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("{location}: failed to extract {}: {message}", archive.display())]
  Extraction {
    location: Location,
    archive: PathBuf,
    message: String,
  },

  #[error(transparent)]
  Parse(#[from] ParseError),
}

impl ModelError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      ModelError::NotFound { .. } | ModelError::InterfaceNotFound { .. } => ErrorKind::NotFound,
      ModelError::Duplicate { .. } | ModelError::DuplicateUserBinding { .. } => ErrorKind::Duplicate,
      ModelError::MixedLanguage { .. } | ModelError::Conflict { .. } | ModelError::UnboundInterfaces { .. } => {
        ErrorKind::Conflict
      }
      ModelError::Cycle { .. } => ErrorKind::Cycle,
      ModelError::Invalid { .. } | ModelError::Variable { .. } => ErrorKind::Invalid,
      ModelError::Internal { .. } => ErrorKind::Internal,
      ModelError::Io { .. } | ModelError::Extraction { .. } => ErrorKind::Io,
      ModelError::Parse(_) => ErrorKind::Parse,
    }
  }

  /// The location the error is reported against, if it has a single one.
  pub fn location(&self) -> Option<&Location> {
    match self {
      ModelError::NotFound { location, .. }
      | ModelError::InterfaceNotFound { location, .. }
      | ModelError::Duplicate { location, .. }
      | ModelError::DuplicateUserBinding { location, .. }
      | ModelError::MixedLanguage { location, .. }
      | ModelError::Conflict { location, .. }
      | ModelError::Cycle { location, .. }
      | ModelError::Invalid { location, .. }
      | ModelError::Variable { location, .. }
      | ModelError::Internal { location, .. }
      | ModelError::Io { location, .. }
      | ModelError::Extraction { location, .. } => Some(location),
      ModelError::UnboundInterfaces { interfaces } => interfaces.first().map(|i| &i.location),
      ModelError::Parse(ParseError::Syntax { location, .. }) => Some(location),
      ModelError::Parse(ParseError::Read { .. }) => None,
    }
  }

  pub(crate) fn internal(location: &Location, message: impl Into<String>) -> Self {
    ModelError::Internal {
      location: location.clone(),
      message: message.into(),
    }
  }

  pub(crate) fn invalid(
    location: &Location,
    setting: &'static str,
    value: impl Into<String>,
    reason: impl Into<String>,
  ) -> Self {
    ModelError::Invalid {
      location: location.clone(),
      setting,
      value: value.into(),
      reason: reason.into(),
    }
  }

  pub(crate) fn not_found(location: &Location, what: &'static str, name: impl Into<String>) -> Self {
    ModelError::NotFound {
      location: location.clone(),
      what,
      name: name.into(),
      searched: SearchedDirs::default(),
    }
  }
}
