//! The conceptual model: everything the code generator and build-script
//! emitter need to know about a system.
//!
//! Components, API files and interfaces live in arenas owned by [`Model`] and
//! refer to each other through typed ids. Apps, users, modules, commands and
//! bindings are owned by [`System`].
//!
//! - [`component`]: components and what they build, bundle and require
//! - [`api`]: API files and the interfaces components declare on them
//! - [`app`]: apps, executables, component instances and process environments
//! - [`system`]: the assembled system, bindings, users, modules and commands

mod api;
mod app;
mod component;
mod system;

pub use api::*;
pub use app::*;
pub use component::*;
pub use system::*;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;

use crate::error::ModelError;
use crate::parse_tree::Location;

macro_rules! arena_id {
  ($(#[$meta:meta])* $name:ident) => {
    $(#[$meta])*
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
    pub struct $name(usize);

    impl $name {
      pub fn index(self) -> usize {
        self.0
      }
    }
  };
}

arena_id!(
  /// Handle to a [`Component`] in a [`Model`].
  ComponentId
);
arena_id!(
  /// Handle to an [`ApiFile`] in a [`Model`].
  ApiFileId
);
arena_id!(
  /// Handle to an [`Interface`] in a [`Model`].
  InterfaceId
);
arena_id!(
  /// Handle to a [`Binding`] in a [`System`].
  BindingId
);

/// Registries of components, API files and interfaces.
///
/// A component or API file is registered once per canonical path; looking it
/// up again hands back the same id.
#[derive(Debug, Default, Serialize)]
pub struct Model {
  components: Vec<Component>,
  api_files: Vec<ApiFile>,
  interfaces: Vec<Interface>,
  #[serde(skip)]
  component_index: HashMap<PathBuf, ComponentId>,
  #[serde(skip)]
  api_index: HashMap<PathBuf, ApiFileId>,
}

impl Model {
  pub fn component(&self, id: ComponentId) -> &Component {
    &self.components[id.0]
  }

  pub(crate) fn component_mut(&mut self, id: ComponentId) -> &mut Component {
    &mut self.components[id.0]
  }

  pub fn components(&self) -> impl Iterator<Item = (ComponentId, &Component)> {
    self.components.iter().enumerate().map(|(i, c)| (ComponentId(i), c))
  }

  pub fn component_by_dir(&self, dir: &Path) -> Option<ComponentId> {
    self.component_index.get(dir).copied()
  }

  /// Registers a component under its directory. An already-registered directory keeps its id.
  pub(crate) fn insert_component(&mut self, component: Component) -> ComponentId {
    if let Some(id) = self.component_index.get(&component.dir) {
      return *id;
    }
    let id = ComponentId(self.components.len());
    self.component_index.insert(component.dir.clone(), id);
    self.components.push(component);
    id
  }

  pub fn api_file(&self, id: ApiFileId) -> &ApiFile {
    &self.api_files[id.0]
  }

  pub(crate) fn api_file_mut(&mut self, id: ApiFileId) -> &mut ApiFile {
    &mut self.api_files[id.0]
  }

  pub fn api_files(&self) -> impl Iterator<Item = (ApiFileId, &ApiFile)> {
    self.api_files.iter().enumerate().map(|(i, a)| (ApiFileId(i), a))
  }

  pub fn api_file_by_path(&self, path: &Path) -> Option<ApiFileId> {
    self.api_index.get(path).copied()
  }

  pub(crate) fn insert_api_file(&mut self, api_file: ApiFile) -> ApiFileId {
    if let Some(id) = self.api_index.get(&api_file.path) {
      return *id;
    }
    let id = ApiFileId(self.api_files.len());
    self.api_index.insert(api_file.path.clone(), id);
    self.api_files.push(api_file);
    id
  }

  pub fn interface(&self, id: InterfaceId) -> &Interface {
    &self.interfaces[id.0]
  }

  pub fn interfaces(&self) -> impl Iterator<Item = (InterfaceId, &Interface)> {
    self.interfaces.iter().enumerate().map(|(i, f)| (InterfaceId(i), f))
  }

  pub(crate) fn insert_interface(&mut self, interface: Interface) -> InterfaceId {
    let id = InterfaceId(self.interfaces.len());
    self.interfaces.push(interface);
    id
  }

  /// Components ordered so that every component comes after its sub-components.
  ///
  /// # Errors
  ///
  /// Returns a cycle error naming one component on the cycle.
  pub fn component_build_order(&self) -> Result<Vec<ComponentId>, ModelError> {
    let mut graph: DiGraph<ComponentId, ()> = DiGraph::new();
    let nodes: Vec<NodeIndex> = (0..self.components.len())
      .map(|i| graph.add_node(ComponentId(i)))
      .collect();

    for (i, component) in self.components.iter().enumerate() {
      for sub in &component.sub_components {
        // Edge from dependency to dependent
        graph.add_edge(nodes[sub.0], nodes[i], ());
      }
    }

    let sorted = toposort(&graph, None).map_err(|cycle| {
      let component = self.component(graph[cycle.node_id()]);
      ModelError::Cycle {
        location: Location::file(&component.def_path),
        what: "component",
        chain: component.name.clone(),
      }
    })?;

    Ok(sorted.into_iter().map(|idx| graph[idx]).collect())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn component(name: &str) -> Component {
    Component::new(PathBuf::from(format!("/src/{name}")))
  }

  mod registry {
    use super::*;

    #[test]
    fn one_component_per_dir() {
      let mut model = Model::default();
      let a = model.insert_component(component("a"));
      let again = model.insert_component(component("a"));
      assert_eq!(a, again);
      assert_eq!(model.components().count(), 1);
      assert_eq!(model.component_by_dir(Path::new("/src/a")), Some(a));
    }

    #[test]
    fn one_api_file_per_path() {
      let mut model = Model::default();
      let a = model.insert_api_file(ApiFile::new(PathBuf::from("/if/a.api"), "a".into()));
      let b = model.insert_api_file(ApiFile::new(PathBuf::from("/if/a.api"), "a".into()));
      assert_eq!(a, b);
      assert_eq!(model.api_files().count(), 1);
    }
  }

  mod build_order {
    use super::*;

    #[test]
    fn sub_components_come_first() {
      let mut model = Model::default();
      let top = model.insert_component(component("top"));
      let left = model.insert_component(component("left"));
      let right = model.insert_component(component("right"));
      let base = model.insert_component(component("base"));
      model.component_mut(top).sub_components = vec![left, right];
      model.component_mut(left).sub_components = vec![base];
      model.component_mut(right).sub_components = vec![base];

      let order = model.component_build_order().unwrap();
      let pos = |id| order.iter().position(|x| *x == id).unwrap();
      assert!(pos(base) < pos(left));
      assert!(pos(base) < pos(right));
      assert!(pos(left) < pos(top));
      assert!(pos(right) < pos(top));
    }

    #[test]
    fn cycle_is_reported() {
      let mut model = Model::default();
      let a = model.insert_component(component("a"));
      let b = model.insert_component(component("b"));
      model.component_mut(a).sub_components = vec![b];
      model.component_mut(b).sub_components = vec![a];

      let err = model.component_build_order().unwrap_err();
      assert_eq!(err.kind(), crate::error::ErrorKind::Cycle);
    }
  }
}
