//! Verbose-mode summaries of what was modelled.

use tracing::debug;

use crate::model::{App, ComponentId, Model, System};

pub(crate) fn log_component(model: &Model, id: ComponentId) {
  let component = model.component(id);
  debug!(
    component = %component.name,
    dir = %component.dir.display(),
    c_sources = component.c_object_files.len(),
    cxx_sources = component.cxx_object_files.len(),
    java_packages = component.java_packages.len(),
    provides = component.server_apis.len(),
    requires = component.client_apis.len() + component.types_only_apis.len(),
    sub_components = component.sub_components.len(),
    "component modelled"
  );

  if let Some(lib) = &component.lib {
    debug!(component = %component.name, lib = %lib.display(), "component library");
  }
  for sub in &component.sub_components {
    debug!(component = %component.name, requires = %model.component(*sub).name, "sub-component");
  }
}

pub(crate) fn log_app(model: &Model, system: &System, app: &App) {
  debug!(
    app = %app.name,
    system = %system.name,
    executables = app.executables.len(),
    processes = app.process_envs.iter().map(|e| e.processes.len()).sum::<usize>(),
    sandboxed = app.is_sandboxed,
    start = ?app.start_trigger,
    "app modelled"
  );

  for exe in &app.executables {
    let components = exe
      .instances
      .iter()
      .map(|i| model.component(i.component).name.as_str())
      .collect::<Vec<_>>()
      .join(", ");
    debug!(app = %app.name, exe = %exe.name, components = %components, "executable");
  }
}

pub(crate) fn log_system(system: &System) {
  debug!(
    system = %system.name,
    apps = system.apps.len(),
    users = system.users.len(),
    bindings = system.bindings.len(),
    commands = system.commands.len(),
    modules = system.modules.len(),
    "system modelled"
  );

  for binding in &system.bindings {
    debug!(
      client = %format!("{}.{}", binding.client_agent, binding.client_interface),
      server = %format!("{}.{}", binding.server_agent, binding.server_interface),
      "binding"
    );
  }
}
