//! Bindings between client-side and server-side interfaces.
//!
//! System bindings come in four shapes, told apart by their tokens:
//!
//! | tokens                          | client                         |
//! |---------------------------------|--------------------------------|
//! | `<user> if agent if`            | a non-app user                 |
//! | `app * if agent if`             | an app's pre-built interface   |
//! | `app if agent if`               | an app's extern client         |
//! | `app exe comp if agent if`      | a component instance's client  |
//!
//! Rebinding an app's interface replaces the earlier binding. Rebinding a
//! user's interface is an error.

use tracing::{debug, trace};

use super::Modeller;
use crate::error::{ModelError, UnboundInterface};
use crate::model::{App, Binding, BindingId, ClientType, InterfaceRef, ServerType, System, User};
use crate::parse_tree::{Entry, Location, Token, TokenKind};
use crate::paths::remove_angle_brackets;

/// Where a client-side interface lives inside an app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ClientSlot {
  Instance(InterfaceRef),
  PreBuilt(String),
}

impl ClientSlot {
  pub(crate) fn binding(&self, app: &App) -> Option<BindingId> {
    match self {
      ClientSlot::Instance(r) => app.client_instance(*r).binding,
      ClientSlot::PreBuilt(key) => app.pre_built_client_interfaces.get(key).and_then(|p| p.binding),
    }
  }

  /// Records `id` as this slot's binding.
  pub(crate) fn set_binding(&self, app: &mut App, name: String, id: BindingId) {
    match self {
      ClientSlot::Instance(r) => {
        let client = app.client_instance_mut(*r);
        client.name = Some(name);
        client.binding = Some(id);
      }
      ClientSlot::PreBuilt(key) => {
        if let Some(p) = app.pre_built_client_interfaces.get_mut(key) {
          p.binding = Some(id);
        }
      }
    }
  }
}

/// Reads a server agent token: `<name>` is a user, anything else an app.
pub(crate) fn server_agent(agent: &Token) -> (ServerType, String) {
  if agent.text.starts_with('<') {
    (ServerType::ExternalUser, remove_angle_brackets(&agent.text).to_string())
  } else {
    (ServerType::ExternalApp, agent.text.clone())
  }
}

fn is_user(token: &Token) -> bool {
  token.is(TokenKind::IpcAgent) && token.text.starts_with('<')
}

fn find_app<'s>(system: &'s System, token: &Token) -> Result<&'s App, ModelError> {
  system
    .apps
    .get(&token.text)
    .ok_or_else(|| ModelError::not_found(&token.location, "app", token.text.clone()))
}

impl<'p> Modeller<'p> {
  /// Adds one entry of a system `bindings:` section.
  pub fn resolve_binding(&self, system: &mut System, entry: &Entry) -> Result<(), ModelError> {
    match entry.tokens.as_slice() {
      [user, iface, agent, server_if] if is_user(user) => self.bind_user(system, entry, user, iface, agent, server_if),
      [app, star, iface, agent, server_if] if star.is(TokenKind::Star) => {
        if !find_app(system, app)?.pre_built_client_interfaces.contains_key(&iface.text) {
          return Err(ModelError::InterfaceNotFound {
            location: iface.location.clone(),
            owner: format!("app '{}'", app.text),
            side: "pre-built client-side",
            interface: iface.text.clone(),
          });
        }
        let slot = ClientSlot::PreBuilt(iface.text.clone());
        let name = format!("*.{}", iface.text);
        self.bind_app(system, entry, app, slot, ClientType::Internal, name, agent, server_if)
      }
      [app, iface, agent, server_if] => {
        let Some(r) = find_app(system, app)?.extern_client_interfaces.get(&iface.text).copied() else {
          return Err(ModelError::InterfaceNotFound {
            location: iface.location.clone(),
            owner: format!("app '{}'", app.text),
            side: "extern client-side",
            interface: iface.text.clone(),
          });
        };
        let name = iface.text.clone();
        self.bind_app(system, entry, app, ClientSlot::Instance(r), ClientType::ExternalApp, name, agent, server_if)
      }
      [app, exe, comp, iface, agent, server_if] => {
        let r = self.find_client_interface(find_app(system, app)?, exe, comp, iface)?;
        let name = format!("{}.{}.{}", exe.text, comp.text, iface.text);
        self.bind_app(system, entry, app, ClientSlot::Instance(r), ClientType::Internal, name, agent, server_if)
      }
      _ => Err(ModelError::internal(&entry.location, "malformed binding")),
    }
  }

  #[allow(clippy::too_many_arguments)]
  fn bind_app(
    &self,
    system: &mut System,
    entry: &Entry,
    app: &Token,
    slot: ClientSlot,
    client_type: ClientType,
    client_interface: String,
    agent: &Token,
    server_if: &Token,
  ) -> Result<(), ModelError> {
    let (server_type, server_agent) = binding_server_side(system, agent, server_if)?;
    let current = slot.binding(find_app(system, app)?);
    let (id, previous) = system.rebind(
      current,
      Binding {
        client_type,
        client_agent: app.text.clone(),
        client_interface: client_interface.clone(),
        server_type,
        server_agent,
        server_interface: server_if.text.clone(),
        location: entry.location.clone(),
      },
    );

    let Some(client_app) = system.apps.get_mut(&app.text) else {
      return Err(ModelError::internal(&app.location, format!("app '{}' vanished", app.text)));
    };
    slot.set_binding(client_app, client_interface.clone(), id);

    if let Some(previous) = previous
      && self.params.verbose
    {
      debug!(
        app = %app.text,
        interface = %client_interface,
        previous = %previous.location,
        "binding overrides an earlier binding"
      );
    }
    trace!(app = %app.text, interface = %client_interface, "bound client interface");
    Ok(())
  }

  fn bind_user(
    &self,
    system: &mut System,
    entry: &Entry,
    user: &Token,
    iface: &Token,
    agent: &Token,
    server_if: &Token,
  ) -> Result<(), ModelError> {
    let user_name = remove_angle_brackets(&user.text).to_string();
    let (server_type, server_agent) = binding_server_side(system, agent, server_if)?;

    if let Some(previous) = system.users.get(&user_name).and_then(|u| u.bindings.get(&iface.text)) {
      return Err(ModelError::DuplicateUserBinding {
        location: entry.location.clone(),
        user: user_name,
        interface: iface.text.clone(),
        previous: system.binding(*previous).location.clone(),
      });
    }

    let id = system.add_binding(Binding {
      client_type: ClientType::ExternalUser,
      client_agent: user_name.clone(),
      client_interface: iface.text.clone(),
      server_type,
      server_agent,
      server_interface: server_if.text.clone(),
      location: entry.location.clone(),
    });

    system
      .users
      .entry(user_name.clone())
      .or_insert_with(|| User {
        name: user_name,
        ..User::default()
      })
      .bindings
      .insert(iface.text.clone(), id);
    Ok(())
  }

  /// Checks that every app named as a server by a binding in effect exports that interface.
  pub fn check_app_binding_servers(&self, system: &System) -> Result<(), ModelError> {
    for binding in &system.bindings {
      if binding.server_type == ServerType::ExternalApp {
        check_server(system, &binding.server_agent, &binding.server_interface, &binding.location)?;
      }
    }
    Ok(())
  }

  /// Lists the client-side interfaces that must be bound but are not.
  pub fn unbound_interfaces(&self, system: &System) -> Vec<UnboundInterface> {
    let mut unbound = Vec::new();
    for app in system.apps.values() {
      for exe in &app.executables {
        for instance in &exe.instances {
          let component = self.model.component(instance.component);
          for client in &instance.client_apis {
            let interface = self.model.interface(client.interface);
            if client.binding.is_none() && !interface.is_optional() {
              unbound.push(UnboundInterface {
                name: format!("{}.{}.{}.{}", app.name, exe.name, component.name, interface.internal_name),
                location: interface.location.clone(),
              });
            }
          }
        }
      }

      for pre_built in app.pre_built_client_interfaces.values() {
        if pre_built.binding.is_none() && !pre_built.optional {
          unbound.push(UnboundInterface {
            name: format!("{}.*.{}", app.name, pre_built.name),
            location: pre_built.location.clone(),
          });
        }
      }
    }
    unbound
  }

  /// Fails with every unbound interface when any required client interface is unbound.
  pub fn check_bindings_complete(&self, system: &System) -> Result<(), ModelError> {
    let interfaces = self.unbound_interfaces(system);
    if interfaces.is_empty() {
      Ok(())
    } else {
      Err(ModelError::UnboundInterfaces { interfaces })
    }
  }
}

fn binding_server_side(system: &System, agent: &Token, server_if: &Token) -> Result<(ServerType, String), ModelError> {
  let (server_type, name) = server_agent(agent);
  if server_type == ServerType::ExternalApp {
    check_server(system, &name, &server_if.text, &agent.location)?;
  }
  Ok((server_type, name))
}

fn check_server(system: &System, app: &str, interface: &str, location: &Location) -> Result<(), ModelError> {
  let Some(server) = system.apps.get(app) else {
    return Err(ModelError::not_found(location, "server app", app));
  };
  if !server.extern_server_interfaces.contains_key(interface) {
    return Err(ModelError::InterfaceNotFound {
      location: location.clone(),
      owner: format!("app '{}'", app),
      side: "extern server-side",
      interface: interface.to_string(),
    });
  }
  Ok(())
}
