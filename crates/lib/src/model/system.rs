use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

use super::{App, BindingId, Model};
use crate::parse_tree::Location;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ClientType {
  /// A component instance (or pre-built interface) inside an app.
  Internal,
  /// An app's extern client interface.
  ExternalApp,
  /// A non-app user.
  ExternalUser,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ServerType {
  ExternalApp,
  ExternalUser,
}

/// A client-side interface connected to a server-side interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Binding {
  pub client_type: ClientType,
  pub client_agent: String,
  pub client_interface: String,
  pub server_type: ServerType,
  pub server_agent: String,
  pub server_interface: String,
  pub location: Location,
}

/// A non-app user account that has bindings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct User {
  pub name: String,
  /// Client interface name to binding.
  pub bindings: BTreeMap<String, BindingId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum LoadTrigger {
  #[default]
  Auto,
  Manual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Module {
  pub name: String,
  pub def_path: PathBuf,
  pub declared_at: Location,
  pub objects: Vec<PathBuf>,
  pub params: BTreeMap<String, String>,
  pub load: LoadTrigger,
}

/// A command-line tool exposed from an app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Command {
  pub name: String,
  pub app: String,
  pub exe_path: String,
  pub location: Location,
}

/// The fully modelled system.
#[derive(Debug, Serialize)]
pub struct System {
  pub name: String,
  pub def_path: PathBuf,
  pub apps: BTreeMap<String, App>,
  pub users: BTreeMap<String, User>,
  pub modules: BTreeMap<String, Module>,
  pub commands: BTreeMap<String, Command>,
  pub bindings: Vec<Binding>,
  /// Variables set by `buildVars` sections, for the build-script emitter.
  pub build_vars: BTreeMap<String, String>,
  pub model: Model,
}

impl System {
  pub fn new(name: impl Into<String>, def_path: PathBuf) -> Self {
    Self {
      name: name.into(),
      def_path,
      apps: BTreeMap::new(),
      users: BTreeMap::new(),
      modules: BTreeMap::new(),
      commands: BTreeMap::new(),
      bindings: Vec::new(),
      build_vars: BTreeMap::new(),
      model: Model::default(),
    }
  }

  pub fn binding(&self, id: BindingId) -> &Binding {
    &self.bindings[id.0]
  }

  /// The model as pretty-printed JSON, for build-script and code generators.
  pub fn to_json(&self) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(self)
  }

  pub(crate) fn add_binding(&mut self, binding: Binding) -> BindingId {
    let id = BindingId(self.bindings.len());
    self.bindings.push(binding);
    id
  }

  /// Stores `binding` for a client slot. A slot that is already bound keeps its id and the
  /// earlier binding is returned, so each client interface has one entry in `bindings`.
  pub(crate) fn rebind(&mut self, current: Option<BindingId>, binding: Binding) -> (BindingId, Option<Binding>) {
    match current {
      Some(id) => (id, Some(std::mem::replace(&mut self.bindings[id.0], binding))),
      None => (self.add_binding(binding), None),
    }
  }
}
