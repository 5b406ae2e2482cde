//! Builds the conceptual model from parse trees.
//!
//! A [`Modeller`] owns the registries and the variable context for one
//! modelling run. Its methods are split by concern:
//!
//! - [`component`]: one `.cdef` into one [`Component`](crate::model::Component)
//! - [`api`]: `.api` file lookup, memoisation and `USETYPES` closures
//! - [`instance`]: ordered component instances per executable
//! - [`app`]: `.adef` files, binary app archives and `.sdef` overrides
//! - [`module`]: `.mdef` files
//! - [`binding`]: system and app bindings and the completeness check
//! - [`system`]: the pass ordering that produces a [`System`]

pub mod api;
pub mod app;
pub mod binding;
pub mod component;
pub mod instance;
pub mod module;
mod summary;
pub mod system;

pub use instance::add_component_instance;
pub use system::model_system;

use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

use crate::error::ModelError;
use crate::model::Model;
use crate::params::BuildParams;
use crate::parse_tree::{DefinitionParser, Token};
use crate::vars::Vars;

pub struct Modeller<'p> {
  params: BuildParams,
  parser: &'p dyn DefinitionParser,
  vars: Vars,
  model: Model,
}

impl<'p> Modeller<'p> {
  pub fn new(params: BuildParams, parser: &'p dyn DefinitionParser) -> Self {
    Self {
      vars: Vars::new(&params),
      params,
      parser,
      model: Model::default(),
    }
  }

  pub fn params(&self) -> &BuildParams {
    &self.params
  }

  pub fn vars(&self) -> &Vars {
    &self.vars
  }

  pub fn vars_mut(&mut self) -> &mut Vars {
    &mut self.vars
  }

  pub fn model(&self) -> &Model {
    &self.model
  }

  pub fn into_model(self) -> Model {
    self.model
  }

  pub fn into_params(self) -> BuildParams {
    self.params
  }

  /// Unquotes a token and expands the variables in it.
  pub(crate) fn expand(&self, token: &Token) -> Result<String, ModelError> {
    self.vars.expand(&token.text).map_err(|source| ModelError::Variable {
      location: token.location.clone(),
      source,
    })
  }

  /// Sets `CURDIR` to `dir` until the returned scope is dropped.
  pub(crate) fn enter_dir(&mut self, dir: &Path) -> DirScope<'_, 'p> {
    let previous = self.vars.replace_curdir(Some(dir.to_path_buf()));
    DirScope {
      modeller: self,
      previous,
    }
  }
}

/// Restores the previous `CURDIR` when dropped, on success and error paths alike.
pub(crate) struct DirScope<'m, 'p> {
  modeller: &'m mut Modeller<'p>,
  previous: Option<PathBuf>,
}

impl<'p> Deref for DirScope<'_, 'p> {
  type Target = Modeller<'p>;

  fn deref(&self) -> &Self::Target {
    self.modeller
  }
}

impl DerefMut for DirScope<'_, '_> {
  fn deref_mut(&mut self) -> &mut Self::Target {
    self.modeller
  }
}

impl Drop for DirScope<'_, '_> {
  fn drop(&mut self) {
    let previous = self.previous.take();
    self.modeller.vars.replace_curdir(previous);
  }
}
