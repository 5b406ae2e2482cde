//! Component instances inside executables.
//!
//! An executable holds each component at most once, with every component
//! placed after the sub-components it depends on.

use tracing::trace;

use crate::error::ModelError;
use crate::model::{
  ClientInterfaceInstance, ComponentId, ComponentInstance, Executable, InterfaceKind, Model, ServerInterfaceInstance,
};
use crate::parse_tree::Location;

/// Adds `component` and, before it, everything it depends on.
///
/// Adding a component that is already present does nothing.
///
/// # Errors
///
/// Returns a cycle error naming the chain if a component depends on itself.
pub fn add_component_instance(model: &Model, exe: &mut Executable, component: ComponentId) -> Result<(), ModelError> {
  let mut in_progress = Vec::new();
  instantiate(model, exe, component, &mut in_progress)
}

fn instantiate(
  model: &Model,
  exe: &mut Executable,
  id: ComponentId,
  in_progress: &mut Vec<ComponentId>,
) -> Result<(), ModelError> {
  if exe.instances.iter().any(|i| i.component == id) {
    return Ok(());
  }

  if let Some(pos) = in_progress.iter().position(|c| *c == id) {
    let chain = in_progress[pos..]
      .iter()
      .chain(std::iter::once(&id))
      .map(|c| model.component(*c).name.as_str())
      .collect::<Vec<_>>()
      .join(" -> ");
    return Err(ModelError::Cycle {
      location: Location::file(&model.component(id).def_path),
      what: "component",
      chain,
    });
  }

  in_progress.push(id);
  for sub in &model.component(id).sub_components {
    instantiate(model, exe, *sub, in_progress)?;
  }
  in_progress.pop();

  let component = model.component(id);
  let server_apis = component
    .server_apis
    .iter()
    .map(|iface| ServerInterfaceInstance {
      interface: *iface,
      name: format!("{}.{}.{}", exe.name, component.name, model.interface(*iface).internal_name),
    })
    .collect();
  let client_apis = component
    .client_apis
    .iter()
    .filter(|iface| !matches!(model.interface(**iface).kind, InterfaceKind::TypesOnly))
    .map(|iface| ClientInterfaceInstance {
      interface: *iface,
      name: None,
      binding: None,
    })
    .collect();

  trace!(exe = %exe.name, component = %component.name, "adding component instance");
  exe.instances.push(ComponentInstance {
    component: id,
    server_apis,
    client_apis,
  });
  Ok(())
}
